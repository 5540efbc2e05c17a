//! Common test utilities and helpers

#![allow(dead_code)]

use anyhow::Result;
use osworkflow::workflow::{BclMeasure, MeasureType};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Builder for a workflow root directory with measures and files
pub struct WorkflowFixtureBuilder {
    temp_dir: TempDir,
    measures: Vec<(String, MeasureType)>,
    files: Vec<(PathBuf, String)>,
}

impl WorkflowFixtureBuilder {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp_dir: TempDir::new()?,
            measures: Vec::new(),
            files: Vec::new(),
        })
    }

    /// Add a measure under `measures/<dir_name>`
    pub fn with_measure(mut self, dir_name: &str, measure_type: MeasureType) -> Self {
        self.measures.push((dir_name.to_string(), measure_type));
        self
    }

    /// Add a file relative to the root
    pub fn with_file(mut self, path: impl AsRef<Path>, content: &str) -> Self {
        self.files
            .push((path.as_ref().to_path_buf(), content.to_string()));
        self
    }

    pub fn build(self) -> Result<WorkflowFixture> {
        let root = fs::canonicalize(self.temp_dir.path())?;

        let mut measures = Vec::new();
        for (dir_name, measure_type) in self.measures {
            let measure = BclMeasure::create(
                root.join("measures").join(&dir_name),
                &dir_name,
                &dir_name,
                measure_type,
                "Envelope.Form",
            )?;
            measures.push(measure);
        }

        for (file_path, content) in self.files {
            let full_path = root.join(file_path);
            if let Some(parent) = full_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(full_path, content)?;
        }

        Ok(WorkflowFixture {
            _temp_dir: self.temp_dir,
            root,
            measures,
        })
    }
}

/// A temporary workflow root that is removed on drop
pub struct WorkflowFixture {
    _temp_dir: TempDir,
    root: PathBuf,
    measures: Vec<BclMeasure>,
}

impl WorkflowFixture {
    /// Canonical root path
    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn join(&self, path: impl AsRef<Path>) -> PathBuf {
        self.root.join(path)
    }

    pub fn measure(&self, dir_name: &str) -> &BclMeasure {
        self.measures
            .iter()
            .find(|m| m.directory_name() == dir_name)
            .unwrap_or_else(|| panic!("fixture has no measure {}", dir_name))
    }

    /// Write `content` to `path` under the root, creating parents
    pub fn create_file(&self, path: impl AsRef<Path>, content: &str) -> Result<PathBuf> {
        let full_path = self.root.join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&full_path, content)?;
        Ok(full_path)
    }

    pub fn read_file(&self, path: impl AsRef<Path>) -> Result<String> {
        Ok(fs::read_to_string(self.root.join(path))?)
    }
}

/// A representative OSW document with two measure steps and run options
pub const SAMPLE_OSW: &str = r#"{
   "created_at": "20240105T101500Z",
   "seed_file": "example.osm",
   "weather_file": "USA_CO_Golden-NREL.724666_TMY3.epw",
   "run_options": {
      "debug": true,
      "preserve_run_dir": false
   },
   "steps": [
      {
         "arguments": {
            "wwr": 0.4,
            "sillHeight": 30,
            "facade": "South",
            "apply": true
         },
         "measure_dir_name": "SetWindowToWallRatioByFacade",
         "name": "Set WWR"
      },
      {
         "measure_dir_name": "ReportingMeasure"
      }
   ]
}"#;
