//! Measure descriptors resolved from measure directories.
//!
//! A measure directory carries a `measure.xml` file describing the measure.
//! This layer only needs a handful of its fields: the uid, class name and
//! declared measure type, plus the version metadata stamped into step
//! results.

use crate::error::{common, ErrorCode, ErrorExt, OswError, Result};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;
use walkdir::WalkDir;

pub const MEASURE_XML: &str = "measure.xml";

/// Declared type of a measure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeasureType {
    ModelMeasure,
    EnergyPlusMeasure,
    UtilityMeasure,
    ReportingMeasure,
}

impl MeasureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasureType::ModelMeasure => "ModelMeasure",
            MeasureType::EnergyPlusMeasure => "EnergyPlusMeasure",
            MeasureType::UtilityMeasure => "UtilityMeasure",
            MeasureType::ReportingMeasure => "ReportingMeasure",
        }
    }
}

impl fmt::Display for MeasureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeasureType {
    type Err = OswError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "ModelMeasure" => Ok(MeasureType::ModelMeasure),
            "EnergyPlusMeasure" => Ok(MeasureType::EnergyPlusMeasure),
            "UtilityMeasure" => Ok(MeasureType::UtilityMeasure),
            "ReportingMeasure" => Ok(MeasureType::ReportingMeasure),
            other => Err(OswError::parse_with_code(
                ErrorCode::PARSE_INVALID_VALUE,
                format!("Unknown measure type '{}'", other),
            )),
        }
    }
}

/// Descriptor of a measure directory
#[derive(Debug, Clone, PartialEq)]
pub struct BclMeasure {
    directory: PathBuf,
    uid: String,
    version_id: String,
    version_modified: Option<String>,
    xml_checksum: String,
    name: String,
    display_name: String,
    class_name: String,
    taxonomy: String,
    measure_type: MeasureType,
}

impl BclMeasure {
    /// Load the descriptor of the measure in `dir`
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        XmlMeasureLoader.load(dir.as_ref())
    }

    /// Create a new measure directory containing only a `measure.xml`.
    ///
    /// `dir` must not exist or must be an empty directory.
    pub fn create(
        dir: impl AsRef<Path>,
        name: &str,
        class_name: &str,
        measure_type: MeasureType,
        taxonomy: &str,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        if dir.exists() && fs::read_dir(dir)?.next().is_some() {
            return Err(OswError::storage_with_code(
                ErrorCode::STORAGE_ALREADY_EXISTS,
                "Directory exists but is not empty",
                Some(dir.to_path_buf()),
            ));
        }
        fs::create_dir_all(dir)?;

        let uid = uuid::Uuid::new_v4().to_string();
        let mut measure = Self {
            directory: fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf()),
            uid,
            version_id: uuid::Uuid::new_v4().to_string(),
            version_modified: Some(super::timestamp::now()),
            xml_checksum: String::new(),
            name: name.to_string(),
            display_name: name.to_string(),
            class_name: class_name.to_string(),
            taxonomy: taxonomy.to_string(),
            measure_type,
        };
        measure.xml_checksum = measure.compute_checksum();
        fs::write(measure.directory.join(MEASURE_XML), measure.to_xml())?;
        debug!(
            "Created {} '{}' at {}",
            measure_type,
            class_name,
            measure.directory.display()
        );
        Ok(measure)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Directory name the measure lives under
    pub fn directory_name(&self) -> String {
        self.directory
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn version_id(&self) -> &str {
        &self.version_id
    }

    pub fn version_modified(&self) -> Option<&str> {
        self.version_modified.as_deref()
    }

    pub fn xml_checksum(&self) -> &str {
        &self.xml_checksum
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn taxonomy(&self) -> &str {
        &self.taxonomy
    }

    pub fn measure_type(&self) -> MeasureType {
        self.measure_type
    }

    /// Recursively copy the measure into `dest` and return the copy's descriptor
    pub fn copy_to(&self, dest: impl AsRef<Path>) -> Result<Self> {
        let dest = dest.as_ref();
        for entry in WalkDir::new(&self.directory) {
            let entry = entry.to_storage_error("Failed to walk measure directory")?;
            let relative = entry
                .path()
                .strip_prefix(&self.directory)
                .to_storage_error("Measure file outside of measure directory")?;
            let target = dest.join(relative);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&target)?;
            } else {
                fs::copy(entry.path(), &target).map_err(|e| {
                    OswError::storage_with_code(
                        ErrorCode::STORAGE_COPY_FAILED,
                        format!("Failed to copy {}", entry.path().display()),
                        Some(target.clone()),
                    )
                    .with_source(e)
                })?;
            }
        }

        let mut copy = self.clone();
        copy.directory = fs::canonicalize(dest).unwrap_or_else(|_| dest.to_path_buf());
        Ok(copy)
    }

    fn compute_checksum(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.name.as_bytes());
        hasher.update(self.class_name.as_bytes());
        hasher.update(self.measure_type.as_str().as_bytes());
        let digest = format!("{:X}", hasher.finalize());
        digest[..8].to_string()
    }

    fn to_xml(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\"?>\n<measure>\n");
        xml.push_str("  <schema_version>3.0</schema_version>\n");
        let mut tag = |name: &str, value: &str| {
            xml.push_str(&format!("  <{0}>{1}</{0}>\n", name, escape_xml(value)));
        };
        tag("name", &self.name);
        tag("uid", &self.uid);
        tag("version_id", &self.version_id);
        if let Some(modified) = &self.version_modified {
            tag("version_modified", modified);
        }
        tag("xml_checksum", &self.xml_checksum);
        tag("class_name", &self.class_name);
        tag("display_name", &self.display_name);
        xml.push_str("  <arguments/>\n");
        xml.push_str(&format!(
            "  <tags>\n    <tag>{}</tag>\n  </tags>\n",
            escape_xml(&self.taxonomy)
        ));
        xml.push_str(&format!(
            "  <attributes>\n    <attribute>\n      <name>Measure Type</name>\n      <value>{}</value>\n      <datatype>string</datatype>\n    </attribute>\n  </attributes>\n",
            self.measure_type
        ));
        xml.push_str("</measure>\n");
        xml
    }
}

/// Resolves a measure directory to its descriptor
pub trait MeasureLoader: Send + Sync {
    fn load(&self, dir: &Path) -> Result<BclMeasure>;
}

/// Reads the descriptor from `measure.xml`
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlMeasureLoader;

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|c| c.is_element() && c.has_tag_name(name))
}

/// Trimmed text content of the first `name` child, CDATA included
fn child_text(node: Node<'_, '_>, name: &str) -> Option<String> {
    let element = child(node, name)?;
    let text: String = element
        .descendants()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect();
    Some(text.trim().to_string())
}

fn measure_type_attribute(root: Node<'_, '_>) -> Option<String> {
    child(root, "attributes")?
        .children()
        .filter(|n| n.is_element() && n.has_tag_name("attribute"))
        .find(|attr| child_text(*attr, "name").as_deref() == Some("Measure Type"))
        .and_then(|attr| child_text(attr, "value"))
}

impl MeasureLoader for XmlMeasureLoader {
    fn load(&self, dir: &Path) -> Result<BclMeasure> {
        let xml_path = dir.join(MEASURE_XML);
        if !xml_path.is_file() {
            return Err(common::measure_unloadable(dir, "missing measure.xml"));
        }
        let raw = fs::read_to_string(&xml_path).map_err(|e| {
            OswError::from(e)
                .with_path(&xml_path)
                .with_context("reading measure.xml")
        })?;
        let doc = Document::parse(&raw).map_err(|e| {
            common::measure_unloadable(dir, format!("malformed measure.xml: {}", e))
        })?;
        let root = doc.root_element();
        if !root.has_tag_name("measure") {
            return Err(common::measure_unloadable(dir, "root element is not <measure>"));
        }

        let measure_type = measure_type_attribute(root)
            .ok_or_else(|| {
                common::measure_unloadable(dir, "missing required attribute \"Measure Type\"")
            })?
            .parse::<MeasureType>()
            .map_err(|e| common::measure_unloadable(dir, e.message().to_string()))?;

        let required = |name: &str| {
            child_text(root, name)
                .filter(|text| !text.is_empty())
                .ok_or_else(|| common::measure_unloadable(dir, format!("missing {}", name)))
        };
        let uid = required("uid")?;
        let class_name = required("class_name")?;
        let name = child_text(root, "name")
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| class_name.clone());
        let display_name = child_text(root, "display_name")
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| name.clone());
        let taxonomy = child(root, "tags")
            .and_then(|tags| child_text(tags, "tag"))
            .unwrap_or_default();

        Ok(BclMeasure {
            directory: fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf()),
            uid,
            version_id: child_text(root, "version_id").unwrap_or_default(),
            version_modified: child_text(root, "version_modified").filter(|v| !v.is_empty()),
            xml_checksum: child_text(root, "xml_checksum").unwrap_or_default(),
            name,
            display_name,
            class_name,
            taxonomy,
            measure_type,
        })
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
