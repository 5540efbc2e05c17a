//! Workflow steps.
//!
//! A step pairs a stable identity with a kind-specific payload and an
//! optional result. Equality is identity: two steps are equal when they
//! carry the same [`StepId`], whatever their content.

use super::json::{kind_name, parse_object, to_pretty_string};
use super::step_result::WorkflowStepResult;
use crate::error::{ErrorCode, OswError, Result};
use crate::variant::Variant;
use indexmap::IndexMap;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use tracing::warn;
use uuid::Uuid;

/// Stable identity of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StepId(Uuid);

impl StepId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StepId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payload of a step
#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    Measure(MeasureStep),
}

/// A step that applies the measure found under `measure_dir_name`
#[derive(Debug, Clone, PartialEq)]
pub struct MeasureStep {
    measure_dir_name: String,
    name: Option<String>,
    description: Option<String>,
    modeler_description: Option<String>,
    arguments: IndexMap<String, Variant>,
}

impl MeasureStep {
    pub fn new(measure_dir_name: impl Into<String>) -> Self {
        Self {
            measure_dir_name: measure_dir_name.into(),
            name: None,
            description: None,
            modeler_description: None,
            arguments: IndexMap::new(),
        }
    }

    pub fn measure_dir_name(&self) -> &str {
        &self.measure_dir_name
    }

    pub fn set_measure_dir_name(&mut self, dir_name: impl Into<String>) {
        self.measure_dir_name = dir_name.into();
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn reset_name(&mut self) {
        self.name = None;
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    pub fn reset_description(&mut self) {
        self.description = None;
    }

    pub fn modeler_description(&self) -> Option<&str> {
        self.modeler_description.as_deref()
    }

    pub fn set_modeler_description(&mut self, description: impl Into<String>) {
        self.modeler_description = Some(description.into());
    }

    pub fn reset_modeler_description(&mut self) {
        self.modeler_description = None;
    }

    pub fn argument(&self, name: &str) -> Option<&Variant> {
        self.arguments.get(name)
    }

    pub fn arguments(&self) -> &IndexMap<String, Variant> {
        &self.arguments
    }

    /// Set an argument, replacing any previous value under the same name.
    ///
    /// NaN and infinite doubles are rejected and leave the step unchanged.
    pub fn set_argument(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Variant>,
    ) -> Result<()> {
        let name = name.into();
        let value = value.into();
        value.ensure_finite(&name)?;
        self.arguments.insert(name, value);
        Ok(())
    }

    pub fn remove_argument(&mut self, name: &str) -> bool {
        self.arguments.shift_remove(name).is_some()
    }

    pub fn clear_arguments(&mut self) {
        self.arguments.clear();
    }

    fn write_json(&self, root: &mut Map<String, Value>) {
        let arguments: Map<String, Value> = self
            .arguments
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        root.insert("arguments".into(), Value::Object(arguments));
        if let Some(description) = &self.description {
            root.insert("description".into(), Value::String(description.clone()));
        }
        root.insert(
            "measure_dir_name".into(),
            Value::String(self.measure_dir_name.clone()),
        );
        if let Some(description) = &self.modeler_description {
            root.insert(
                "modeler_description".into(),
                Value::String(description.clone()),
            );
        }
        if let Some(name) = &self.name {
            root.insert("name".into(), Value::String(name.clone()));
        }
    }

    fn read_json(root: &Map<String, Value>) -> Result<Self> {
        let dir_name = match root.get("measure_dir_name") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => {
                return Err(invalid_step(format!(
                    "measure_dir_name must be a string, found {}",
                    kind_name(other)
                )))
            }
            None => return Err(invalid_step("Step is missing measure_dir_name")),
        };

        let mut step = MeasureStep::new(dir_name);
        step.name = optional_string(root, "name")?;
        step.description = optional_string(root, "description")?;
        step.modeler_description = optional_string(root, "modeler_description")?;

        match root.get("arguments") {
            None | Some(Value::Null) => {}
            Some(Value::Object(arguments)) => {
                for (name, value) in arguments {
                    match Variant::from_json(value) {
                        Ok(variant) => {
                            step.arguments.insert(name.clone(), variant);
                        }
                        Err(_) => warn!(
                            "Ignoring argument '{}' of step '{}': unsupported value {}",
                            name,
                            step.measure_dir_name,
                            kind_name(value)
                        ),
                    }
                }
            }
            Some(other) => {
                return Err(invalid_step(format!(
                    "arguments must be an object, found {}",
                    kind_name(other)
                )))
            }
        }
        Ok(step)
    }
}

fn invalid_step(message: impl Into<String>) -> OswError {
    OswError::parse_with_code(ErrorCode::PARSE_INVALID_STEP, message)
}

fn optional_string(root: &Map<String, Value>, key: &str) -> Result<Option<String>> {
    match root.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(invalid_step(format!(
            "{} must be a string, found {}",
            key,
            kind_name(other)
        ))),
    }
}

/// One entry of a workflow's ordered step list
#[derive(Debug, Clone)]
pub struct WorkflowStep {
    id: StepId,
    kind: StepKind,
    result: Option<WorkflowStepResult>,
}

impl PartialEq for WorkflowStep {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for WorkflowStep {}

impl From<MeasureStep> for WorkflowStep {
    fn from(step: MeasureStep) -> Self {
        Self::new(StepKind::Measure(step))
    }
}

impl WorkflowStep {
    pub fn new(kind: StepKind) -> Self {
        Self {
            id: StepId::new(),
            kind,
            result: None,
        }
    }

    pub fn id(&self) -> StepId {
        self.id
    }

    /// Copy of this step under a fresh identity
    pub fn detached_copy(&self) -> Self {
        Self {
            id: StepId::new(),
            kind: self.kind.clone(),
            result: self.result.clone(),
        }
    }

    pub fn kind(&self) -> &StepKind {
        &self.kind
    }

    pub fn as_measure(&self) -> Option<&MeasureStep> {
        match &self.kind {
            StepKind::Measure(step) => Some(step),
        }
    }

    pub fn as_measure_mut(&mut self) -> Option<&mut MeasureStep> {
        match &mut self.kind {
            StepKind::Measure(step) => Some(step),
        }
    }

    pub fn result(&self) -> Option<&WorkflowStepResult> {
        self.result.as_ref()
    }

    pub fn set_result(&mut self, result: WorkflowStepResult) {
        self.result = Some(result);
    }

    pub fn reset_result(&mut self) {
        self.result = None;
    }

    pub fn to_json(&self) -> Value {
        let mut root = Map::new();
        match &self.kind {
            StepKind::Measure(step) => step.write_json(&mut root),
        }
        if let Some(result) = &self.result {
            root.insert("result".into(), result.to_json());
        }
        Value::Object(root)
    }

    /// Build a step from a JSON object.
    ///
    /// An object without `measure_dir_name` is rejected; its `result` is
    /// never read.
    pub fn from_json(value: &Value) -> Result<Self> {
        let root = match value {
            Value::Object(map) => map,
            other => {
                return Err(invalid_step(format!(
                    "Step must be an object, found {}",
                    kind_name(other)
                )))
            }
        };

        let kind = StepKind::Measure(MeasureStep::read_json(root)?);
        let result = match root.get("result") {
            None | Some(Value::Null) => None,
            Some(value) => Some(WorkflowStepResult::from_json(value.clone())?),
        };
        Ok(Self {
            id: StepId::new(),
            kind,
            result,
        })
    }

    pub fn string(&self) -> String {
        to_pretty_string(&self.to_json())
    }
}

impl FromStr for WorkflowStep {
    type Err = OswError;

    fn from_str(text: &str) -> Result<Self> {
        Self::from_json(&Value::Object(parse_object(text)?))
    }
}

impl Serialize for WorkflowStep {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for WorkflowStep {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        WorkflowStep::from_json(&value).map_err(|e| de::Error::custom(e.message().to_string()))
    }
}
