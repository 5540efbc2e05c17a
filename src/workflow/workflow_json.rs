//! The OSW document: steps, run options, cursor, paths and change tracking.

use super::json::{kind_name, parse_object, to_pretty_string};
use super::measure::{BclMeasure, MeasureLoader, MeasureType, XmlMeasureLoader};
use super::paths::{
    canonical_or_absolute, current_dir, remove_trailing_separator, strip_file_url,
    DEFAULT_FILE_PATHS, DEFAULT_MEASURE_PATHS,
};
use super::run_options::RunOptions;
use super::step::{MeasureStep, StepId, WorkflowStep};
use super::step_result::WorkflowStepResult;
use super::timestamp;
use crate::error::{common, ErrorCode, OswError, Result};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

type ChangeListener = Box<dyn Fn() + Send + Sync>;

/// Completion status recorded when a workflow stops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletedStatus {
    Success,
    Fail,
    Invalid,
    Cancel,
}

impl CompletedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletedStatus::Success => "Success",
            CompletedStatus::Fail => "Fail",
            CompletedStatus::Invalid => "Invalid",
            CompletedStatus::Cancel => "Cancel",
        }
    }
}

impl fmt::Display for CompletedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<CompletedStatus> for String {
    fn from(status: CompletedStatus) -> Self {
        status.as_str().to_string()
    }
}

/// An OSW workflow document.
///
/// Every mutating call stamps `updated_at` and notifies the registered
/// change listeners once before returning. Unknown top-level keys are kept
/// and written back unchanged.
pub struct WorkflowJson {
    created_at: Option<String>,
    started_at: Option<String>,
    updated_at: Option<String>,
    completed_at: Option<String>,
    completed_status: Option<String>,
    current_step: Option<usize>,
    hash: Option<String>,
    root: Option<String>,
    run_directory: Option<String>,
    out_name: Option<String>,
    file_paths: Option<Vec<String>>,
    measure_paths: Option<Vec<String>>,
    seed_file: Option<String>,
    weather_file: Option<String>,
    eplusout_err: Option<String>,
    run_options: Option<RunOptions>,
    steps: Vec<WorkflowStep>,
    extra: Map<String, Value>,

    osw_dir: Option<PathBuf>,
    osw_filename: Option<PathBuf>,
    loader: Arc<dyn MeasureLoader>,
    listeners: Vec<ChangeListener>,
    // resolved measure types by measure_dir_name; cleared on every mutation
    measure_types: Mutex<HashMap<String, MeasureType>>,
}

impl Default for WorkflowJson {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowJson {
    /// Empty workflow stamped with the current time
    pub fn new() -> Self {
        let mut workflow = Self::blank();
        workflow.created_at = Some(timestamp::now());
        workflow
    }

    fn blank() -> Self {
        Self {
            created_at: None,
            started_at: None,
            updated_at: None,
            completed_at: None,
            completed_status: None,
            current_step: None,
            hash: None,
            root: None,
            run_directory: None,
            out_name: None,
            file_paths: None,
            measure_paths: None,
            seed_file: None,
            weather_file: None,
            eplusout_err: None,
            run_options: None,
            steps: Vec::new(),
            extra: Map::new(),
            osw_dir: None,
            osw_filename: None,
            loader: Arc::new(XmlMeasureLoader),
            listeners: Vec::new(),
            measure_types: Mutex::new(HashMap::new()),
        }
    }

    /// Read and parse an OSW file, binding the workflow to its location
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(OswError::storage_with_code(
                ErrorCode::STORAGE_NOT_FOUND,
                "Path is not a WorkflowJSON file",
                Some(path.to_path_buf()),
            ));
        }
        let text = fs::read_to_string(path).map_err(|e| OswError::from(e).with_path(path))?;
        let mut workflow = Self::from_json_text(&text)
            .map_err(|e| e.with_context(format!("in '{}'", path.display())))?;
        workflow.bind_osw_path(path);
        debug!("Loaded workflow from {}", path.display());
        Ok(workflow)
    }

    /// Probing variant of `from_str`
    pub fn load(text: &str) -> Option<Self> {
        text.parse().ok()
    }

    /// Probing variant of [`WorkflowJson::from_path`]
    pub fn load_path(path: impl AsRef<Path>) -> Option<Self> {
        Self::from_path(path).ok()
    }

    fn from_json_text(text: &str) -> Result<Self> {
        let mut root = parse_object(text)?;
        let mut workflow = Self::blank();

        workflow.created_at = take_string(&mut root, "created_at")?;
        workflow.started_at = take_string(&mut root, "started_at")?;
        workflow.updated_at = take_string(&mut root, "updated_at")?;
        workflow.completed_at = take_string(&mut root, "completed_at")?;
        workflow.completed_status = take_string(&mut root, "completed_status")?;
        workflow.hash = take_string(&mut root, "hash")?;
        workflow.root = take_string(&mut root, "root")?;
        workflow.run_directory = take_string(&mut root, "run_directory")?;
        workflow.out_name = take_string(&mut root, "out_name")?;
        workflow.seed_file = take_string(&mut root, "seed_file")?;
        workflow.weather_file = take_string(&mut root, "weather_file")?;
        workflow.eplusout_err = take_string(&mut root, "eplusout_err")?;
        workflow.file_paths = take_string_list(&mut root, "file_paths")?;
        workflow.measure_paths = take_string_list(&mut root, "measure_paths")?;

        workflow.current_step = match root.remove("current_step") {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => match n.as_u64().and_then(|n| usize::try_from(n).ok()) {
                Some(index) => Some(index),
                None => return Err(invalid_field("current_step", "a non-negative integer")),
            },
            Some(_) => return Err(invalid_field("current_step", "a non-negative integer")),
        };

        match root.remove("steps") {
            None | Some(Value::Null) => {}
            Some(Value::Array(steps)) => {
                for (i, step) in steps.iter().enumerate() {
                    let step = WorkflowStep::from_json(step)
                        .map_err(|e| e.with_context(format!("step {} cannot be processed", i)))?;
                    workflow.steps.push(step);
                }
            }
            Some(other) => {
                return Err(invalid_field(
                    "steps",
                    &format!("an array, found {}", kind_name(&other)),
                ))
            }
        }

        workflow.run_options = match root.remove("run_options") {
            None | Some(Value::Null) => None,
            Some(value) => Some(RunOptions::from_json(value)?),
        };

        workflow.extra = root;
        Ok(workflow)
    }

    /// Use `loader` to resolve measure directories to descriptors
    pub fn set_measure_loader(&mut self, loader: Arc<dyn MeasureLoader>) {
        self.loader = loader;
        self.cached_measure_types().clear();
    }

    /// Register a callback fired after every mutation
    pub fn on_change(&mut self, listener: impl Fn() + Send + Sync + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn on_update(&mut self) {
        self.cached_measure_types().clear();
        self.updated_at = Some(timestamp::now());
        for listener in &self.listeners {
            listener();
        }
    }

    pub fn to_json(&self, include_hash: bool) -> Value {
        let mut root: BTreeMap<String, Value> = self
            .extra
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut put = |key: &str, value: &Option<String>| {
            if let Some(value) = value {
                root.insert(key.to_string(), Value::String(value.clone()));
            }
        };
        put("created_at", &self.created_at);
        put("started_at", &self.started_at);
        put("updated_at", &self.updated_at);
        put("completed_at", &self.completed_at);
        put("completed_status", &self.completed_status);
        put("root", &self.root);
        put("run_directory", &self.run_directory);
        put("out_name", &self.out_name);
        put("seed_file", &self.seed_file);
        put("weather_file", &self.weather_file);
        put("eplusout_err", &self.eplusout_err);
        if include_hash {
            put("hash", &self.hash);
        }

        if let Some(index) = self.current_step {
            root.insert("current_step".into(), Value::from(index));
        }
        if let Some(paths) = &self.file_paths {
            root.insert("file_paths".into(), Value::from(paths.clone()));
        }
        if let Some(paths) = &self.measure_paths {
            root.insert("measure_paths".into(), Value::from(paths.clone()));
        }
        if let Some(options) = &self.run_options {
            root.insert("run_options".into(), options.to_json());
        }
        root.insert(
            "steps".into(),
            Value::Array(self.steps.iter().map(WorkflowStep::to_json).collect()),
        );

        Value::Object(root.into_iter().collect())
    }

    /// Serialized document, with or without the stored hash
    pub fn string(&self, include_hash: bool) -> String {
        to_pretty_string(&self.to_json(include_hash))
    }

    /// Hash stored at the last [`WorkflowJson::check_for_updates`]
    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    /// SHA-256 of the document serialized without its hash
    pub fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.string(false).as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Refresh `updated_at` and the stored hash if the content changed
    pub fn check_for_updates(&mut self) -> bool {
        let stored = self.hash.clone();
        let current = self.compute_hash();
        if stored.as_deref() == Some(current.as_str()) {
            return false;
        }
        self.on_update();
        // updated_at moved, so hash again
        self.hash = Some(self.compute_hash());
        true
    }

    /// Write to the bound osw path
    pub fn save(&self) -> Result<()> {
        let path = self.osw_path().ok_or_else(common::no_osw_path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                OswError::from(e)
                    .with_path(parent)
                    .with_context("could not create parent directory")
            })?;
        }

        let mut temp_name = path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_file = PathBuf::from(temp_name);
        fs::write(&temp_file, self.string(true))
            .map_err(|e| OswError::from(e).with_path(&temp_file))?;
        fs::rename(&temp_file, &path).map_err(|e| OswError::from(e).with_path(&path))?;

        info!("Saved workflow to {}", path.display());
        Ok(())
    }

    /// Bind to `path`, refresh the hash and save
    pub fn save_as(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.set_osw_path(path);
        self.check_for_updates();
        self.save()
    }

    /// Clear run state: start and completion stamps, status and cursor
    pub fn reset(&mut self) {
        self.started_at = None;
        self.completed_at = None;
        self.completed_status = None;
        self.current_step = None;
        self.on_update();
    }

    /// Stamp `started_at`, rewind the cursor and clear every step result
    pub fn start(&mut self) {
        self.started_at = Some(timestamp::now());
        self.current_step = Some(0);
        for step in &mut self.steps {
            step.reset_result();
        }
        self.on_update();
    }

    pub fn current_step_index(&self) -> usize {
        self.current_step.unwrap_or(0)
    }

    pub fn current_step(&self) -> Option<&WorkflowStep> {
        self.steps.get(self.current_step_index())
    }

    /// Advance the cursor; true if a step exists at the new position
    pub fn increment_step(&mut self) -> bool {
        self.current_step = Some(self.current_step_index().saturating_add(1));
        self.on_update();
        self.current_step().is_some()
    }

    /// Attach `result` to the step under the cursor
    pub fn set_current_step_result(&mut self, result: WorkflowStepResult) -> bool {
        let Some(id) = self.current_step().map(WorkflowStep::id) else {
            return false;
        };
        self.update_step(id, move |step| step.set_result(result))
            .is_some()
    }

    pub fn completed_status(&self) -> Option<&str> {
        self.completed_status.as_deref().filter(|s| !s.is_empty())
    }

    /// Record the completion status and stamp `completed_at`
    pub fn set_completed_status(&mut self, status: impl Into<String>) {
        self.completed_status = Some(status.into());
        self.completed_at = Some(timestamp::now());
        self.on_update();
    }

    pub fn reset_completed_status(&mut self) {
        self.completed_status = None;
        self.completed_at = None;
        self.on_update();
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at.as_deref().and_then(timestamp::parse)
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at.as_deref().and_then(timestamp::parse)
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at.as_deref().and_then(timestamp::parse)
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at.as_deref().and_then(timestamp::parse)
    }

    pub fn eplusout_err(&self) -> Option<&str> {
        self.eplusout_err.as_deref().filter(|s| !s.is_empty())
    }

    pub fn set_eplusout_err(&mut self, text: impl Into<String>) {
        self.eplusout_err = Some(text.into());
        self.on_update();
    }

    /// Location of the OSW file, if bound
    pub fn osw_path(&self) -> Option<PathBuf> {
        match (&self.osw_dir, &self.osw_filename) {
            (Some(dir), Some(name)) => Some(dir.join(name)),
            _ => None,
        }
    }

    fn bind_osw_path(&mut self, path: &Path) {
        self.cached_measure_types().clear();
        let p = canonical_or_absolute(path, &current_dir());
        self.osw_filename = p.file_name().map(PathBuf::from);
        self.osw_dir = p.parent().map(Path::to_path_buf);
    }

    pub fn set_osw_path(&mut self, path: impl AsRef<Path>) {
        self.bind_osw_path(path.as_ref());
        self.on_update();
    }

    /// Directory of the OSW file, or the process working directory if unbound
    pub fn osw_dir(&self) -> PathBuf {
        self.osw_dir.clone().unwrap_or_else(current_dir)
    }

    pub fn set_osw_dir(&mut self, path: impl AsRef<Path>) {
        self.osw_dir = Some(canonical_or_absolute(path.as_ref(), &current_dir()));
        self.on_update();
    }

    pub fn root_dir(&self) -> PathBuf {
        remove_trailing_separator(self.root.as_deref().unwrap_or("."))
    }

    pub fn absolute_root_dir(&self) -> PathBuf {
        canonical_or_absolute(&self.root_dir(), &self.osw_dir())
    }

    pub fn set_root_dir(&mut self, path: impl AsRef<Path>) {
        self.root = Some(path.as_ref().to_string_lossy().into_owned());
        self.on_update();
    }

    pub fn reset_root_dir(&mut self) {
        self.root = None;
        self.on_update();
    }

    pub fn run_dir(&self) -> PathBuf {
        remove_trailing_separator(self.run_directory.as_deref().unwrap_or("./run"))
    }

    pub fn absolute_run_dir(&self) -> PathBuf {
        canonical_or_absolute(&self.run_dir(), &self.absolute_root_dir())
    }

    pub fn out_path(&self) -> PathBuf {
        PathBuf::from(self.out_name.as_deref().unwrap_or("out.osw"))
    }

    pub fn absolute_out_path(&self) -> PathBuf {
        canonical_or_absolute(&self.out_path(), &self.osw_dir())
    }

    /// Configured file search paths followed by the fixed fallbacks
    pub fn file_paths(&self) -> Vec<PathBuf> {
        self.file_paths
            .iter()
            .flatten()
            .map(String::as_str)
            .chain(DEFAULT_FILE_PATHS)
            .map(PathBuf::from)
            .collect()
    }

    pub fn absolute_file_paths(&self) -> Vec<PathBuf> {
        let root = self.absolute_root_dir();
        self.file_paths()
            .iter()
            .map(|p| canonical_or_absolute(p, &root))
            .collect()
    }

    pub fn add_file_path(&mut self, path: impl AsRef<Path>) {
        self.file_paths
            .get_or_insert_with(Vec::new)
            .push(path.as_ref().to_string_lossy().into_owned());
        self.on_update();
    }

    pub fn reset_file_paths(&mut self) {
        self.file_paths = None;
        self.on_update();
    }

    /// Resolve a file against the file search paths; first match wins
    pub fn find_file(&self, file: impl AsRef<Path>) -> Option<PathBuf> {
        let file = file.as_ref();
        if file.is_absolute() {
            return file.exists().then(|| file.to_path_buf());
        }

        for dir in self.absolute_file_paths() {
            let candidate = dir.join(file);
            if candidate.is_file() {
                return Some(canonical_or_absolute(&candidate, &current_dir()));
            }
        }

        let stripped = file.to_str().and_then(strip_file_url)?;
        self.find_file(stripped)
    }

    /// Configured measure search paths followed by the fixed fallbacks
    pub fn measure_paths(&self) -> Vec<PathBuf> {
        self.measure_paths
            .iter()
            .flatten()
            .map(String::as_str)
            .chain(DEFAULT_MEASURE_PATHS)
            .map(remove_trailing_separator)
            .collect()
    }

    pub fn absolute_measure_paths(&self) -> Vec<PathBuf> {
        let root = self.absolute_root_dir();
        self.measure_paths()
            .iter()
            .map(|p| canonical_or_absolute(p, &root))
            .collect()
    }

    pub fn add_measure_path(&mut self, path: impl AsRef<Path>) {
        self.measure_paths
            .get_or_insert_with(Vec::new)
            .push(path.as_ref().to_string_lossy().into_owned());
        self.on_update();
    }

    pub fn reset_measure_paths(&mut self) {
        self.measure_paths = None;
        self.on_update();
    }

    /// Resolve a measure directory against the measure search paths
    pub fn find_measure(&self, measure_dir: impl AsRef<Path>) -> Option<PathBuf> {
        let measure_dir = measure_dir.as_ref();
        if measure_dir.is_absolute() {
            return measure_dir.exists().then(|| measure_dir.to_path_buf());
        }

        self.absolute_measure_paths()
            .into_iter()
            .map(|dir| dir.join(measure_dir))
            .find(|candidate| candidate.is_dir())
            .map(|candidate| canonical_or_absolute(&candidate, &current_dir()))
    }

    pub fn seed_file(&self) -> Option<PathBuf> {
        self.seed_file
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
    }

    pub fn set_seed_file(&mut self, path: impl AsRef<Path>) {
        self.seed_file = Some(path.as_ref().to_string_lossy().into_owned());
        self.on_update();
    }

    pub fn reset_seed_file(&mut self) {
        self.seed_file = None;
        self.on_update();
    }

    pub fn weather_file(&self) -> Option<PathBuf> {
        self.weather_file
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
    }

    pub fn set_weather_file(&mut self, path: impl AsRef<Path>) {
        self.weather_file = Some(path.as_ref().to_string_lossy().into_owned());
        self.on_update();
    }

    pub fn reset_weather_file(&mut self) {
        self.weather_file = None;
        self.on_update();
    }

    pub fn workflow_steps(&self) -> &[WorkflowStep] {
        &self.steps
    }

    pub fn set_workflow_steps(&mut self, steps: Vec<WorkflowStep>) {
        self.steps = steps;
        self.on_update();
    }

    pub fn reset_workflow_steps(&mut self) {
        self.set_workflow_steps(Vec::new());
    }

    pub fn step(&self, id: StepId) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.id() == id)
    }

    /// Mutate the step with `id` in place; `None` if no such step
    pub fn update_step<R>(&mut self, id: StepId, f: impl FnOnce(&mut WorkflowStep) -> R) -> Option<R> {
        let step = self.steps.iter_mut().find(|s| s.id() == id)?;
        let out = f(step);
        self.on_update();
        Some(out)
    }

    pub fn run_options(&self) -> Option<&RunOptions> {
        self.run_options.as_ref()
    }

    pub fn set_run_options(&mut self, options: RunOptions) {
        self.run_options = Some(options);
        self.on_update();
    }

    pub fn reset_run_options(&mut self) {
        self.run_options = None;
        self.on_update();
    }

    /// Edit the run options in place, creating defaults if none are set
    pub fn update_run_options<R>(&mut self, f: impl FnOnce(&mut RunOptions) -> R) -> R {
        let out = f(self.run_options.get_or_insert_with(RunOptions::new));
        self.on_update();
        out
    }

    /// Resolve and load the descriptor of the measure `step` refers to
    pub fn try_bcl_measure(&self, step: &MeasureStep) -> Result<BclMeasure> {
        let dir = self
            .find_measure(step.measure_dir_name())
            .ok_or_else(|| common::measure_not_found(step.measure_dir_name()))?;
        self.loader.load(&dir)
    }

    pub fn get_bcl_measure(&self, step: &MeasureStep) -> Option<BclMeasure> {
        self.try_bcl_measure(step).ok()
    }

    /// Descriptor of the first step whose measure has uid `uid`
    pub fn get_bcl_measure_by_uuid(&self, uid: &str) -> Option<BclMeasure> {
        self.steps
            .iter()
            .filter_map(WorkflowStep::as_measure)
            .filter_map(|step| self.get_bcl_measure(step))
            .find(|measure| measure.uid().eq_ignore_ascii_case(uid))
    }

    /// Declared type of the measure a step refers to, if it resolves.
    ///
    /// Resolved types are remembered until the workflow is next modified.
    pub fn measure_type(&self, step: &WorkflowStep) -> Option<MeasureType> {
        let measure_step = step.as_measure()?;
        let dir_name = measure_step.measure_dir_name();
        if let Some(measure_type) = self.cached_measure_types().get(dir_name) {
            return Some(*measure_type);
        }
        let measure_type = self.get_bcl_measure(measure_step)?.measure_type();
        self.cached_measure_types()
            .insert(dir_name.to_string(), measure_type);
        Some(measure_type)
    }

    fn cached_measure_types(&self) -> MutexGuard<'_, HashMap<String, MeasureType>> {
        self.measure_types
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get_measure_steps(&self, measure_type: MeasureType) -> Vec<&WorkflowStep> {
        self.get_measure_steps_with_index(measure_type)
            .into_iter()
            .map(|(_, step)| step)
            .collect()
    }

    pub fn get_measure_steps_with_index(
        &self,
        measure_type: MeasureType,
    ) -> Vec<(usize, &WorkflowStep)> {
        self.steps
            .iter()
            .enumerate()
            .filter(|(_, step)| self.measure_type(step) == Some(measure_type))
            .collect()
    }

    /// Replace the steps of one measure type.
    ///
    /// Every incoming step must resolve to a measure of `measure_type`,
    /// otherwise nothing changes. The new list is ordered Model, then
    /// EnergyPlus, then Reporting measures; steps of any other type or
    /// that do not resolve are dropped.
    pub fn set_measure_steps(
        &mut self,
        measure_type: MeasureType,
        steps: Vec<WorkflowStep>,
    ) -> Result<()> {
        for step in &steps {
            let Some(measure_step) = step.as_measure() else {
                continue;
            };
            let measure = self.try_bcl_measure(measure_step)?;
            if measure.measure_type() != measure_type {
                return Err(OswError::measure(
                    ErrorCode::MEASURE_TYPE_MISMATCH,
                    format!(
                        "Measure '{}' is a {}, expected {}",
                        measure_step.measure_dir_name(),
                        measure.measure_type(),
                        measure_type
                    ),
                    Some(measure_step.measure_dir_name().to_string()),
                ));
            }
        }

        let mut incoming = Some(steps);
        let mut new_steps = Vec::new();
        for bucket in [
            MeasureType::ModelMeasure,
            MeasureType::EnergyPlusMeasure,
            MeasureType::ReportingMeasure,
        ] {
            if bucket == measure_type {
                new_steps.extend(incoming.take().unwrap_or_default());
            } else {
                new_steps.extend(self.get_measure_steps(bucket).into_iter().cloned());
            }
        }

        self.set_workflow_steps(new_steps);
        Ok(())
    }

    /// Copy `measure` into the first measure path.
    ///
    /// A measure with the same uid already used by a step is deleted
    /// first. The copy goes under the measure's directory name, or its
    /// class name when that directory name is a UUID, suffixed with ` 1`,
    /// ` 2`, ... until unused. Steps referring to the replaced measure's
    /// directory are renamed to the new directory.
    pub fn add_measure(&mut self, measure: &BclMeasure) -> Result<BclMeasure> {
        let existing = self.get_bcl_measure_by_uuid(measure.uid());
        if let Some(existing) = &existing {
            if existing.directory() == measure.directory() {
                debug!("Measure '{}' is already in place", existing.directory_name());
                return Ok(existing.clone());
            }
            fs::remove_dir_all(existing.directory())
                .map_err(|e| OswError::from(e).with_path(existing.directory()))?;
        }

        let target_root = self
            .absolute_measure_paths()
            .into_iter()
            .next()
            .ok_or_else(|| {
                OswError::measure(
                    ErrorCode::MEASURE_NO_MEASURE_PATH,
                    "No measure path available",
                    None,
                )
            })?;

        let mut base = measure.directory_name();
        if uuid::Uuid::parse_str(&base).is_ok() {
            base = measure.class_name().to_string();
        }
        let mut dir_name = base.clone();
        let mut suffix = 1;
        while target_root.join(&dir_name).exists() {
            dir_name = format!("{} {}", base, suffix);
            suffix += 1;
        }

        if let Some(existing) = &existing {
            let old_name = existing.directory_name();
            if old_name != dir_name {
                info!("Renaming measure steps '{}' to '{}'", old_name, dir_name);
                for step in &mut self.steps {
                    if let Some(m) = step.as_measure_mut() {
                        if m.measure_dir_name() == old_name {
                            m.set_measure_dir_name(dir_name.clone());
                        }
                    }
                }
            }
        }

        self.on_update();
        measure.copy_to(target_root.join(&dir_name))
    }

    /// Check that every measure resolves and that measure types appear
    /// in Model, EnergyPlus, Reporting order. Problems are logged.
    pub fn validate_measures(&self) -> bool {
        let mut valid = true;
        let mut state = MeasureType::ModelMeasure;

        for (i, step) in self.steps.iter().enumerate() {
            debug!("Validating step {}", i);
            let Some(measure_step) = step.as_measure() else {
                continue;
            };
            let dir_name = measure_step.measure_dir_name();
            let Some(dir) = self.find_measure(dir_name) else {
                error!("Cannot find measure '{}'", dir_name);
                valid = false;
                continue;
            };
            let measure = match self.loader.load(&dir) {
                Ok(measure) => measure,
                Err(e) => {
                    error!(
                        "Cannot load measure '{}' at '{}': {}",
                        dir_name,
                        dir.display(),
                        e
                    );
                    valid = false;
                    continue;
                }
            };

            match measure.measure_type() {
                MeasureType::ModelMeasure => {
                    if state == MeasureType::EnergyPlusMeasure {
                        error!(
                            "OpenStudio measure '{}' called after transition to EnergyPlus.",
                            dir_name
                        );
                        valid = false;
                    }
                    if state == MeasureType::ReportingMeasure {
                        error!(
                            "OpenStudio measure '{}' called after Energyplus simulation.",
                            dir_name
                        );
                        valid = false;
                    }
                }
                MeasureType::EnergyPlusMeasure => {
                    if state == MeasureType::ReportingMeasure {
                        error!(
                            "EnergyPlus measure '{}' called after Energyplus simulation.",
                            dir_name
                        );
                        valid = false;
                    }
                    if state == MeasureType::ModelMeasure {
                        state = MeasureType::EnergyPlusMeasure;
                    }
                }
                MeasureType::ReportingMeasure => state = MeasureType::ReportingMeasure,
                other => {
                    error!(
                        "MeasureType {} of measure '{}' is not supported",
                        other, dir_name
                    );
                    valid = false;
                }
            }
        }

        valid
    }
}

impl FromStr for WorkflowJson {
    type Err = OswError;

    /// Parse JSON text; text that is not JSON is tried as a file path
    fn from_str(text: &str) -> Result<Self> {
        match Self::from_json_text(text) {
            Ok(workflow) => Ok(workflow),
            Err(parse_err) => {
                let path = Path::new(text);
                if path.is_file() {
                    Self::from_path(path)
                } else {
                    Err(parse_err.with_context("WorkflowJSON cannot be processed"))
                }
            }
        }
    }
}

impl Clone for WorkflowJson {
    /// Deep copy with fresh step identities; listeners are not copied
    fn clone(&self) -> Self {
        Self {
            created_at: self.created_at.clone(),
            started_at: self.started_at.clone(),
            updated_at: self.updated_at.clone(),
            completed_at: self.completed_at.clone(),
            completed_status: self.completed_status.clone(),
            current_step: self.current_step,
            hash: self.hash.clone(),
            root: self.root.clone(),
            run_directory: self.run_directory.clone(),
            out_name: self.out_name.clone(),
            file_paths: self.file_paths.clone(),
            measure_paths: self.measure_paths.clone(),
            seed_file: self.seed_file.clone(),
            weather_file: self.weather_file.clone(),
            eplusout_err: self.eplusout_err.clone(),
            run_options: self.run_options.clone(),
            steps: self.steps.iter().map(WorkflowStep::detached_copy).collect(),
            extra: self.extra.clone(),
            osw_dir: self.osw_dir.clone(),
            osw_filename: self.osw_filename.clone(),
            loader: Arc::clone(&self.loader),
            listeners: Vec::new(),
            measure_types: Mutex::new(HashMap::new()),
        }
    }
}

impl fmt::Debug for WorkflowJson {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowJson")
            .field("osw_path", &self.osw_path())
            .field("current_step", &self.current_step)
            .field("steps", &self.steps.len())
            .field("completed_status", &self.completed_status)
            .finish_non_exhaustive()
    }
}

fn invalid_field(key: &str, expected: &str) -> OswError {
    OswError::parse(format!("Field '{}' must be {}", key, expected))
}

fn take_string(root: &mut Map<String, Value>, key: &str) -> Result<Option<String>> {
    match root.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => {
            warn!("Field '{}' holds {}", key, kind_name(&other));
            Err(invalid_field(key, "a string"))
        }
    }
}

fn take_string_list(root: &mut Map<String, Value>, key: &str) -> Result<Option<Vec<String>>> {
    match root.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                _ => Err(invalid_field(key, "an array of strings")),
            })
            .collect::<Result<Vec<_>>>()
            .map(Some),
        Some(_) => Err(invalid_field(key, "an array of strings")),
    }
}
