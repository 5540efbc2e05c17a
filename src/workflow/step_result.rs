//! Outcome record of a single workflow step.

use super::json::{parse_object, to_pretty_string};
use super::measure::{BclMeasure, MeasureType};
use super::timestamp;
use crate::error::{ErrorCode, OswError, Result};
use crate::variant::Variant;
use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Overall status of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepResult {
    Skip,
    #[serde(rename = "NA")]
    NotApplicable,
    Success,
    Fail,
}

impl StepResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepResult::Skip => "Skip",
            StepResult::NotApplicable => "NA",
            StepResult::Success => "Success",
            StepResult::Fail => "Fail",
        }
    }
}

impl fmt::Display for StepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named value reported by a measure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStepValue {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    pub value: Variant,
}

impl WorkflowStepValue {
    pub fn new(name: impl Into<String>, value: impl Into<Variant>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            units: None,
            value: value.into(),
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }
}

/// Metadata of the measure that produced a result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasureMetadata {
    #[serde(rename = "measure_type", default, skip_serializing_if = "Option::is_none")]
    pub measure_type: Option<MeasureType>,
    #[serde(rename = "measure_name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "measure_uid", default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(rename = "measure_version_id", default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    #[serde(
        rename = "measure_version_modified",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub version_modified: Option<String>,
    #[serde(rename = "measure_xml_checksum", default, skip_serializing_if = "Option::is_none")]
    pub xml_checksum: Option<String>,
    #[serde(rename = "measure_class_name", default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(rename = "measure_display_name", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(rename = "measure_taxonomy", default, skip_serializing_if = "Option::is_none")]
    pub taxonomy: Option<String>,
}

impl From<&BclMeasure> for MeasureMetadata {
    fn from(measure: &BclMeasure) -> Self {
        Self {
            measure_type: Some(measure.measure_type()),
            name: Some(measure.name().to_string()),
            uid: Some(measure.uid().to_string()),
            version_id: Some(measure.version_id().to_string()),
            version_modified: measure.version_modified().map(str::to_string),
            xml_checksum: Some(measure.xml_checksum().to_string()),
            class_name: Some(measure.class_name().to_string()),
            display_name: Some(measure.display_name().to_string()),
            taxonomy: Some(measure.taxonomy().to_string()),
        }
    }
}

/// Per-step outcome: timestamps, status, messages, values, produced files
/// and captured output.
///
/// A result counts as complete once `completed_at` is set. Complete results
/// always serialize their status and message arrays; incomplete ones omit
/// the status and any empty array.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowStepResult {
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    measure: MeasureMetadata,
    step_result: Option<StepResult>,
    initial_condition: Option<String>,
    final_condition: Option<String>,
    errors: Vec<String>,
    warnings: Vec<String>,
    info: Vec<String>,
    values: Vec<WorkflowStepValue>,
    files: Vec<PathBuf>,
    stdout: Option<String>,
    stderr: Option<String>,
}

impl WorkflowStepResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn set_started_at(&mut self, at: DateTime<Utc>) {
        self.started_at = Some(at);
    }

    pub fn reset_started_at(&mut self) {
        self.started_at = None;
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn set_completed_at(&mut self, at: DateTime<Utc>) {
        self.completed_at = Some(at);
    }

    pub fn reset_completed_at(&mut self) {
        self.completed_at = None;
    }

    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn measure(&self) -> &MeasureMetadata {
        &self.measure
    }

    pub fn measure_mut(&mut self) -> &mut MeasureMetadata {
        &mut self.measure
    }

    /// Record the descriptor of the measure this step ran
    pub fn set_measure_descriptor(&mut self, measure: &BclMeasure) {
        self.measure = MeasureMetadata::from(measure);
    }

    pub fn step_result(&self) -> Option<StepResult> {
        self.step_result
    }

    pub fn set_step_result(&mut self, result: StepResult) {
        self.step_result = Some(result);
    }

    pub fn reset_step_result(&mut self) {
        self.step_result = None;
    }

    pub fn initial_condition(&self) -> Option<&str> {
        self.initial_condition.as_deref()
    }

    pub fn set_initial_condition(&mut self, text: impl Into<String>) {
        self.initial_condition = Some(text.into());
    }

    pub fn reset_initial_condition(&mut self) {
        self.initial_condition = None;
    }

    pub fn final_condition(&self) -> Option<&str> {
        self.final_condition.as_deref()
    }

    pub fn set_final_condition(&mut self, text: impl Into<String>) {
        self.final_condition = Some(text.into());
    }

    pub fn reset_final_condition(&mut self) {
        self.final_condition = None;
    }

    pub fn step_errors(&self) -> &[String] {
        &self.errors
    }

    pub fn add_step_error(&mut self, text: impl Into<String>) {
        self.errors.push(text.into());
    }

    pub fn reset_step_errors(&mut self) {
        self.errors.clear();
    }

    pub fn step_warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn add_step_warning(&mut self, text: impl Into<String>) {
        self.warnings.push(text.into());
    }

    pub fn reset_step_warnings(&mut self) {
        self.warnings.clear();
    }

    pub fn step_info(&self) -> &[String] {
        &self.info
    }

    pub fn add_step_info(&mut self, text: impl Into<String>) {
        self.info.push(text.into());
    }

    pub fn reset_step_info(&mut self) {
        self.info.clear();
    }

    pub fn step_values(&self) -> &[WorkflowStepValue] {
        &self.values
    }

    /// Append a value. Earlier values with the same name are kept; NaN and
    /// infinite doubles are rejected.
    pub fn add_step_value(&mut self, value: WorkflowStepValue) -> Result<()> {
        value.value.ensure_finite(&value.name)?;
        self.values.push(value);
        Ok(())
    }

    pub fn reset_step_values(&mut self) {
        self.values.clear();
    }

    pub fn step_files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Record a produced file; a path already present is not added twice
    pub fn add_step_file(&mut self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        if !self.files.iter().any(|f| f == path) {
            self.files.push(path.to_path_buf());
        }
    }

    pub fn reset_step_files(&mut self) {
        self.files.clear();
    }

    pub fn stdout(&self) -> Option<&str> {
        self.stdout.as_deref()
    }

    pub fn set_stdout(&mut self, text: impl Into<String>) {
        self.stdout = Some(text.into());
    }

    pub fn reset_stdout(&mut self) {
        self.stdout = None;
    }

    pub fn stderr(&self) -> Option<&str> {
        self.stderr.as_deref()
    }

    pub fn set_stderr(&mut self, text: impl Into<String>) {
        self.stderr = Some(text.into());
    }

    pub fn reset_stderr(&mut self) {
        self.stderr = None;
    }

    pub fn to_json(&self) -> Value {
        let mut root = Map::new();
        let complete = self.is_complete();

        if let Some(at) = &self.started_at {
            root.insert("started_at".into(), Value::String(timestamp::format(at)));
        }
        if let Some(at) = &self.completed_at {
            root.insert("completed_at".into(), Value::String(timestamp::format(at)));
        }
        if let Ok(Value::Object(measure)) = serde_json::to_value(&self.measure) {
            root.extend(measure);
        }
        if complete {
            if let Some(result) = self.step_result {
                root.insert("step_result".into(), Value::String(result.as_str().into()));
            }
        }
        if let Some(text) = &self.initial_condition {
            root.insert("step_initial_condition".into(), Value::String(text.clone()));
        }
        if let Some(text) = &self.final_condition {
            root.insert("step_final_condition".into(), Value::String(text.clone()));
        }

        let strings = |items: &[String]| Value::from(items.to_vec());
        if complete || !self.errors.is_empty() {
            root.insert("step_errors".into(), strings(&self.errors));
        }
        if complete || !self.warnings.is_empty() {
            root.insert("step_warnings".into(), strings(&self.warnings));
        }
        if complete || !self.info.is_empty() {
            root.insert("step_info".into(), strings(&self.info));
        }
        if complete || !self.values.is_empty() {
            let values = self
                .values
                .iter()
                .filter_map(|v| serde_json::to_value(v).ok())
                .collect();
            root.insert("step_values".into(), Value::Array(values));
        }
        if complete || !self.files.is_empty() {
            let files = self
                .files
                .iter()
                .map(|f| Value::String(f.to_string_lossy().into_owned()))
                .collect();
            root.insert("step_files".into(), Value::Array(files));
        }

        if let Some(text) = &self.stdout {
            root.insert("stdout".into(), Value::String(text.clone()));
        }
        if let Some(text) = &self.stderr {
            root.insert("stderr".into(), Value::String(text.clone()));
        }

        Value::Object(root)
    }

    pub fn from_json(value: Value) -> Result<Self> {
        let raw: RawStepResult = serde_json::from_value(value).map_err(|e| {
            OswError::parse_with_code(ErrorCode::PARSE_INVALID_RESULT, "Invalid step result")
                .with_source(e)
        })?;
        raw.try_into()
    }

    pub fn string(&self) -> String {
        to_pretty_string(&self.to_json())
    }
}

impl FromStr for WorkflowStepResult {
    type Err = OswError;

    fn from_str(text: &str) -> Result<Self> {
        Self::from_json(Value::Object(parse_object(text)?))
    }
}

#[derive(Deserialize)]
struct RawStepResult {
    #[serde(default)]
    started_at: Option<String>,
    #[serde(default)]
    completed_at: Option<String>,
    #[serde(flatten)]
    measure: MeasureMetadata,
    #[serde(default)]
    step_result: Option<StepResult>,
    #[serde(default, alias = "initial_condition")]
    step_initial_condition: Option<String>,
    #[serde(default, alias = "final_condition")]
    step_final_condition: Option<String>,
    #[serde(default)]
    step_errors: Vec<String>,
    #[serde(default)]
    step_warnings: Vec<String>,
    #[serde(default)]
    step_info: Vec<String>,
    #[serde(default)]
    step_values: Vec<WorkflowStepValue>,
    #[serde(default)]
    step_files: Vec<PathBuf>,
    #[serde(default, alias = "std_out")]
    stdout: Option<String>,
    #[serde(default, alias = "std_err")]
    stderr: Option<String>,
}

fn parse_timestamp(field: &str, text: Option<String>) -> Result<Option<DateTime<Utc>>> {
    match text {
        None => Ok(None),
        Some(text) => timestamp::parse(&text).map(Some).ok_or_else(|| {
            OswError::parse_with_code(
                ErrorCode::PARSE_INVALID_TIMESTAMP,
                format!("Invalid {} timestamp '{}'", field, text),
            )
        }),
    }
}

impl TryFrom<RawStepResult> for WorkflowStepResult {
    type Error = OswError;

    fn try_from(raw: RawStepResult) -> Result<Self> {
        Ok(Self {
            started_at: parse_timestamp("started_at", raw.started_at)?,
            completed_at: parse_timestamp("completed_at", raw.completed_at)?,
            measure: raw.measure,
            step_result: raw.step_result,
            initial_condition: raw.step_initial_condition,
            final_condition: raw.step_final_condition,
            errors: raw.step_errors,
            warnings: raw.step_warnings,
            info: raw.step_info,
            values: raw.step_values,
            files: raw.step_files,
            stdout: raw.stdout,
            stderr: raw.stderr,
        })
    }
}

impl Serialize for WorkflowStepResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for WorkflowStepResult {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = RawStepResult::deserialize(deserializer)?;
        WorkflowStepResult::try_from(raw).map_err(|e| de::Error::custom(e.message().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn test_incomplete_result_omits_status_and_empty_arrays() {
        let mut result = WorkflowStepResult::new();
        result.set_started_at(at(1));
        result.set_step_result(StepResult::Success);
        result.add_step_warning("check units");

        let json = result.to_json();
        assert_eq!(json["started_at"], "20240301T010000Z");
        assert!(json.get("step_result").is_none());
        assert!(json.get("step_errors").is_none());
        assert_eq!(json["step_warnings"], json!(["check units"]));
    }

    #[test]
    fn test_complete_result_writes_every_array() {
        let mut result = WorkflowStepResult::new();
        result.set_started_at(at(1));
        result.set_completed_at(at(2));
        result.set_step_result(StepResult::NotApplicable);

        let json = result.to_json();
        assert_eq!(json["step_result"], "NA");
        for key in [
            "step_errors",
            "step_warnings",
            "step_info",
            "step_values",
            "step_files",
        ] {
            assert_eq!(json[key], json!([]), "{} should be an empty array", key);
        }
    }

    #[test]
    fn test_duplicate_values_are_kept_in_order() {
        let mut result = WorkflowStepResult::new();
        result.add_step_value(WorkflowStepValue::new("area", 10.0)).unwrap();
        result
            .add_step_value(WorkflowStepValue::new("area", 12.5).with_units("m^2"))
            .unwrap();

        assert_eq!(result.step_values().len(), 2);
        assert_eq!(result.step_values()[1].value, Variant::Double(12.5));
        assert_eq!(result.step_values()[1].units.as_deref(), Some("m^2"));
    }

    #[test]
    fn test_non_finite_value_is_rejected() {
        let mut result = WorkflowStepResult::new();
        let err = result
            .add_step_value(WorkflowStepValue::new("ratio", f64::NAN))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::VALIDATION_INVALID_INPUT);
        assert!(result.step_values().is_empty());
    }

    #[test]
    fn test_step_files_are_unique() {
        let mut result = WorkflowStepResult::new();
        result.add_step_file("/run/report.html");
        result.add_step_file("/run/report.html");
        result.add_step_file("/run/data.csv");
        assert_eq!(result.step_files().len(), 2);
    }

    #[test]
    fn test_string_round_trip() {
        let mut result = WorkflowStepResult::new();
        result.set_started_at(at(4));
        result.set_completed_at(at(5));
        result.set_step_result(StepResult::Fail);
        result.set_initial_condition("12 zones");
        result.set_final_condition("10 zones");
        result.add_step_error("zone 'Attic' has no floor");
        result.add_step_info("merged plenums");
        result.add_step_value(
            WorkflowStepValue::new("removed_zones", 2)
                .with_display_name("Removed Zones")
                .with_units("count"),
        )
        .unwrap();
        result.add_step_value(WorkflowStepValue::new("ok", false)).unwrap();
        result.add_step_file("/tmp/run/zones.csv");
        result.set_stdout("hello\n");
        result.set_stderr("");
        result.measure_mut().measure_type = Some(MeasureType::ModelMeasure);
        result.measure_mut().class_name = Some("MergePlenums".into());

        let text = result.string();
        let parsed = WorkflowStepResult::from_str(&text).unwrap();
        assert_eq!(parsed, result);
        assert_eq!(parsed.string(), text);
    }

    #[test]
    fn test_reads_alternate_key_names() {
        let parsed = WorkflowStepResult::from_str(
            r#"{"initial_condition": "a", "final_condition": "b", "std_out": "o", "std_err": "e"}"#,
        )
        .unwrap();
        assert_eq!(parsed.initial_condition(), Some("a"));
        assert_eq!(parsed.final_condition(), Some("b"));
        assert_eq!(parsed.stdout(), Some("o"));
        assert_eq!(parsed.stderr(), Some("e"));
    }

    #[test]
    fn test_rejects_bad_timestamp_and_status() {
        let err = WorkflowStepResult::from_str(r#"{"started_at": "soon"}"#).unwrap_err();
        assert_eq!(err.code(), ErrorCode::PARSE_INVALID_TIMESTAMP);

        let err = WorkflowStepResult::from_str(r#"{"step_result": "Maybe"}"#).unwrap_err();
        assert_eq!(err.code(), ErrorCode::PARSE_INVALID_RESULT);
    }
}
