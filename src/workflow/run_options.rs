//! Run options stored under `run_options` in an OSW document.

use super::json::{parse_object, to_pretty_string};
use crate::error::{ErrorCode, OswError, Result};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::str::FromStr;

/// User-supplied output adapter loaded by the run manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomOutputAdapter {
    custom_file_name: String,
    class_name: String,
    options: String,
}

impl CustomOutputAdapter {
    pub fn new(custom_file_name: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            custom_file_name: custom_file_name.into(),
            class_name: class_name.into(),
            options: String::new(),
        }
    }

    /// Adapter with free-form options given as JSON text
    pub fn with_options(mut self, options: impl Into<String>) -> Self {
        self.options = options.into();
        self
    }

    pub fn custom_file_name(&self) -> &str {
        &self.custom_file_name
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Options as JSON text; empty when none were given
    pub fn options(&self) -> &str {
        &self.options
    }

    /// Options parsed as JSON, `None` when empty or not valid JSON
    pub fn options_json(&self) -> Option<Value> {
        if self.options.trim().is_empty() {
            return None;
        }
        serde_json::from_str(&self.options).ok()
    }

    fn to_json(&self) -> Value {
        let mut root = Map::new();
        root.insert(
            "custom_file_name".into(),
            Value::String(self.custom_file_name.clone()),
        );
        root.insert("class_name".into(), Value::String(self.class_name.clone()));
        if let Some(options) = self.options_json() {
            root.insert("options".into(), options);
        } else if !self.options.is_empty() {
            root.insert("options".into(), Value::String(self.options.clone()));
        }
        Value::Object(root)
    }

    fn from_json(value: &Value) -> Result<Self> {
        let invalid = |message: &str| {
            OswError::parse_with_code(ErrorCode::PARSE_INVALID_RUN_OPTIONS, message.to_string())
        };
        let root = value
            .as_object()
            .ok_or_else(|| invalid("output_adapter must be an object"))?;
        let custom_file_name = root
            .get("custom_file_name")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("output_adapter is missing custom_file_name"))?;
        let class_name = root
            .get("class_name")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("output_adapter is missing class_name"))?;
        let options = match root.get("options") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text.clone(),
            Some(nested) => nested.to_string(),
        };
        Ok(Self::new(custom_file_name, class_name).with_options(options))
    }
}

/// Flags controlling a simulation run.
///
/// Flags left unset report their default and are not serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    debug: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    epjson: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fast: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    preserve_run_dir: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    skip_expand_objects: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    skip_energyplus_preprocess: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    skip_zip_results: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cleanup: Option<bool>,
    #[serde(
        rename = "output_adapter",
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_adapter",
        deserialize_with = "deserialize_adapter"
    )]
    custom_output_adapter: Option<CustomOutputAdapter>,
}

fn serialize_adapter<S: Serializer>(
    adapter: &Option<CustomOutputAdapter>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    adapter.as_ref().map(CustomOutputAdapter::to_json).serialize(serializer)
}

fn deserialize_adapter<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<CustomOutputAdapter>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => CustomOutputAdapter::from_json(&value)
            .map(Some)
            .map_err(|e| de::Error::custom(e.message().to_string())),
    }
}

impl RunOptions {
    pub const DEFAULT_DEBUG: bool = false;
    pub const DEFAULT_EPJSON: bool = false;
    pub const DEFAULT_FAST: bool = false;
    pub const DEFAULT_PRESERVE_RUN_DIR: bool = false;
    pub const DEFAULT_SKIP_EXPAND_OBJECTS: bool = false;
    pub const DEFAULT_SKIP_ENERGYPLUS_PREPROCESS: bool = false;
    pub const DEFAULT_SKIP_ZIP_RESULTS: bool = false;
    pub const DEFAULT_CLEANUP: bool = true;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn debug(&self) -> bool {
        self.debug.unwrap_or(Self::DEFAULT_DEBUG)
    }

    pub fn is_debug_defaulted(&self) -> bool {
        self.debug.is_none()
    }

    pub fn set_debug(&mut self, value: bool) {
        self.debug = Some(value);
    }

    pub fn reset_debug(&mut self) {
        self.debug = None;
    }

    pub fn epjson(&self) -> bool {
        self.epjson.unwrap_or(Self::DEFAULT_EPJSON)
    }

    pub fn is_epjson_defaulted(&self) -> bool {
        self.epjson.is_none()
    }

    pub fn set_epjson(&mut self, value: bool) {
        self.epjson = Some(value);
    }

    pub fn reset_epjson(&mut self) {
        self.epjson = None;
    }

    pub fn fast(&self) -> bool {
        self.fast.unwrap_or(Self::DEFAULT_FAST)
    }

    pub fn is_fast_defaulted(&self) -> bool {
        self.fast.is_none()
    }

    pub fn set_fast(&mut self, value: bool) {
        self.fast = Some(value);
    }

    pub fn reset_fast(&mut self) {
        self.fast = None;
    }

    pub fn preserve_run_dir(&self) -> bool {
        self.preserve_run_dir.unwrap_or(Self::DEFAULT_PRESERVE_RUN_DIR)
    }

    pub fn is_preserve_run_dir_defaulted(&self) -> bool {
        self.preserve_run_dir.is_none()
    }

    pub fn set_preserve_run_dir(&mut self, value: bool) {
        self.preserve_run_dir = Some(value);
    }

    pub fn reset_preserve_run_dir(&mut self) {
        self.preserve_run_dir = None;
    }

    pub fn skip_expand_objects(&self) -> bool {
        self.skip_expand_objects.unwrap_or(Self::DEFAULT_SKIP_EXPAND_OBJECTS)
    }

    pub fn is_skip_expand_objects_defaulted(&self) -> bool {
        self.skip_expand_objects.is_none()
    }

    pub fn set_skip_expand_objects(&mut self, value: bool) {
        self.skip_expand_objects = Some(value);
    }

    pub fn reset_skip_expand_objects(&mut self) {
        self.skip_expand_objects = None;
    }

    pub fn skip_energyplus_preprocess(&self) -> bool {
        self.skip_energyplus_preprocess.unwrap_or(Self::DEFAULT_SKIP_ENERGYPLUS_PREPROCESS)
    }

    pub fn is_skip_energyplus_preprocess_defaulted(&self) -> bool {
        self.skip_energyplus_preprocess.is_none()
    }

    pub fn set_skip_energyplus_preprocess(&mut self, value: bool) {
        self.skip_energyplus_preprocess = Some(value);
    }

    pub fn reset_skip_energyplus_preprocess(&mut self) {
        self.skip_energyplus_preprocess = None;
    }

    pub fn skip_zip_results(&self) -> bool {
        self.skip_zip_results.unwrap_or(Self::DEFAULT_SKIP_ZIP_RESULTS)
    }

    pub fn is_skip_zip_results_defaulted(&self) -> bool {
        self.skip_zip_results.is_none()
    }

    pub fn set_skip_zip_results(&mut self, value: bool) {
        self.skip_zip_results = Some(value);
    }

    pub fn reset_skip_zip_results(&mut self) {
        self.skip_zip_results = None;
    }

    pub fn cleanup(&self) -> bool {
        self.cleanup.unwrap_or(Self::DEFAULT_CLEANUP)
    }

    pub fn is_cleanup_defaulted(&self) -> bool {
        self.cleanup.is_none()
    }

    pub fn set_cleanup(&mut self, value: bool) {
        self.cleanup = Some(value);
    }

    pub fn reset_cleanup(&mut self) {
        self.cleanup = None;
    }

    pub fn custom_output_adapter(&self) -> Option<&CustomOutputAdapter> {
        self.custom_output_adapter.as_ref()
    }

    pub fn set_custom_output_adapter(&mut self, adapter: CustomOutputAdapter) {
        self.custom_output_adapter = Some(adapter);
    }

    pub fn reset_custom_output_adapter(&mut self) {
        self.custom_output_adapter = None;
    }

    /// Copy every explicitly set flag of `other`, and its adapter if any
    pub fn override_values_with(&mut self, other: &RunOptions) {
        let flags = [
            (&mut self.debug, other.debug),
            (&mut self.epjson, other.epjson),
            (&mut self.fast, other.fast),
            (&mut self.preserve_run_dir, other.preserve_run_dir),
            (&mut self.skip_expand_objects, other.skip_expand_objects),
            (
                &mut self.skip_energyplus_preprocess,
                other.skip_energyplus_preprocess,
            ),
            (&mut self.skip_zip_results, other.skip_zip_results),
            (&mut self.cleanup, other.cleanup),
        ];
        for (mine, theirs) in flags {
            if theirs.is_some() {
                *mine = theirs;
            }
        }
        if let Some(adapter) = &other.custom_output_adapter {
            self.custom_output_adapter = Some(adapter.clone());
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }

    pub fn from_json(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| {
            OswError::parse_with_code(ErrorCode::PARSE_INVALID_RUN_OPTIONS, "Invalid run options")
                .with_source(e)
        })
    }

    pub fn string(&self) -> String {
        to_pretty_string(&self.to_json())
    }
}

impl FromStr for RunOptions {
    type Err = OswError;

    fn from_str(text: &str) -> Result<Self> {
        Self::from_json(Value::Object(parse_object(text)?))
    }
}
