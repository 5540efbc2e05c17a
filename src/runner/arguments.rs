//! Measure arguments and their validation against user input.

use super::{ArtifactLoader, OsRunner};
use crate::error::{common, ErrorCode, OswError, Result};
use crate::variant::Variant;
use crate::workflow::WorkflowStepValue;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgumentType {
    Boolean,
    Double,
    Integer,
    String,
    Choice,
    Path,
}

impl ArgumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArgumentType::Boolean => "Boolean",
            ArgumentType::Double => "Double",
            ArgumentType::Integer => "Integer",
            ArgumentType::String => "String",
            ArgumentType::Choice => "Choice",
            ArgumentType::Path => "Path",
        }
    }

    fn is_textual(&self) -> bool {
        matches!(
            self,
            ArgumentType::String | ArgumentType::Choice | ArgumentType::Path
        )
    }

    /// Normalize `value` for this type; `None` if it cannot hold it
    fn coerce(&self, value: Variant) -> Option<Variant> {
        match (self, value) {
            (ArgumentType::Boolean, v @ Variant::Boolean(_)) => Some(v),
            (ArgumentType::Integer, v @ Variant::Integer(_)) => Some(v),
            (ArgumentType::Double, v @ Variant::Double(_)) => Some(v),
            (ArgumentType::Double, Variant::Integer(i)) => Some(Variant::Double(f64::from(i))),
            (t, v @ Variant::String(_)) if t.is_textual() => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ArgumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A measure argument as declared by a measure or supplied by a user
#[derive(Debug, Clone, PartialEq)]
pub struct OsArgument {
    name: String,
    display_name: String,
    argument_type: ArgumentType,
    required: bool,
    value: Option<Variant>,
    default_value: Option<Variant>,
    domain: Vec<Variant>,
    choices: Vec<String>,
}

impl OsArgument {
    pub fn new(name: impl Into<String>, argument_type: ArgumentType, required: bool) -> Self {
        Self {
            name: name.into(),
            display_name: String::new(),
            argument_type,
            required,
            value: None,
            default_value: None,
            domain: Vec::new(),
            choices: Vec::new(),
        }
    }

    pub fn boolean(name: impl Into<String>, required: bool) -> Self {
        Self::new(name, ArgumentType::Boolean, required)
    }

    pub fn double(name: impl Into<String>, required: bool) -> Self {
        Self::new(name, ArgumentType::Double, required)
    }

    pub fn integer(name: impl Into<String>, required: bool) -> Self {
        Self::new(name, ArgumentType::Integer, required)
    }

    pub fn string(name: impl Into<String>, required: bool) -> Self {
        Self::new(name, ArgumentType::String, required)
    }

    pub fn path(name: impl Into<String>, required: bool) -> Self {
        Self::new(name, ArgumentType::Path, required)
    }

    pub fn choice<I, S>(name: impl Into<String>, choices: I, required: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            choices: choices.into_iter().map(Into::into).collect(),
            ..Self::new(name, ArgumentType::Choice, required)
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn argument_type(&self) -> ArgumentType {
        self.argument_type
    }

    pub fn required(&self) -> bool {
        self.required
    }

    pub fn value(&self) -> Option<&Variant> {
        self.value.as_ref()
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    pub fn default_value(&self) -> Option<&Variant> {
        self.default_value.as_ref()
    }

    pub fn has_default_value(&self) -> bool {
        self.default_value.is_some()
    }

    /// The value if set, else the default
    pub fn effective_value(&self) -> Option<&Variant> {
        self.value.as_ref().or(self.default_value.as_ref())
    }

    pub fn domain(&self) -> &[Variant] {
        &self.domain
    }

    pub fn has_domain(&self) -> bool {
        !self.domain.is_empty()
    }

    pub fn choices(&self) -> &[String] {
        &self.choices
    }

    /// Set the value; false if the value does not fit the argument type or choices
    pub fn set_value(&mut self, value: impl Into<Variant>) -> bool {
        match self.accept(value.into()) {
            Some(value) => {
                self.value = Some(value);
                true
            }
            None => false,
        }
    }

    pub fn clear_value(&mut self) {
        self.value = None;
    }

    pub fn set_default_value(&mut self, value: impl Into<Variant>) -> bool {
        match self.accept(value.into()) {
            Some(value) => {
                self.default_value = Some(value);
                true
            }
            None => false,
        }
    }

    /// Closed interval `[low, high]` for numeric arguments
    pub fn set_min_max(&mut self, low: impl Into<Variant>, high: impl Into<Variant>) -> bool {
        if !matches!(
            self.argument_type,
            ArgumentType::Double | ArgumentType::Integer
        ) {
            return false;
        }
        match (
            self.argument_type.coerce(low.into()),
            self.argument_type.coerce(high.into()),
        ) {
            (Some(low), Some(high)) => {
                self.domain = vec![low, high];
                true
            }
            _ => false,
        }
    }

    pub fn clear_domain(&mut self) {
        self.domain.clear();
    }

    fn accept(&self, value: Variant) -> Option<Variant> {
        let value = self.argument_type.coerce(value)?;
        if self.argument_type == ArgumentType::Choice && !self.choices.is_empty() {
            let text = value.value_as_string().ok()?;
            if !self.choices.iter().any(|c| c == text) {
                return None;
            }
        }
        Some(value)
    }

    /// Numeric interval, if this is a numeric argument with a domain
    fn interval(&self) -> Option<(f64, f64)> {
        match self.domain.as_slice() {
            [low, high] => Some((low.value_as_double().ok()?, high.value_as_double().ok()?)),
            _ => None,
        }
    }
}

impl fmt::Display for OsArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.display_name.is_empty() {
            write!(f, " ({})", self.display_name)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{}, {}",
            self.argument_type,
            if self.required { "Required" } else { "Optional" }
        )?;
        write!(f, "Value: ")?;
        if let Some(value) = &self.value {
            write!(f, "{} ", value)?;
        }
        if let Some(default_value) = &self.default_value {
            write!(f, "({})", default_value)?;
        }
        writeln!(f)?;
        if !self.choices.is_empty() {
            writeln!(f, "Choices:")?;
            for choice in &self.choices {
                writeln!(f, "  {}", choice)?;
            }
        }
        if let [low, high] = self.domain.as_slice() {
            writeln!(f, "Interval Domain: [{}, {}]", low, high)?;
        }
        Ok(())
    }
}

/// User-supplied arguments keyed by name
pub type ArgumentMap = BTreeMap<String, OsArgument>;

pub fn argument_map(arguments: impl IntoIterator<Item = OsArgument>) -> ArgumentMap {
    arguments
        .into_iter()
        .map(|argument| (argument.name.clone(), argument))
        .collect()
}

impl<L: ArtifactLoader> OsRunner<L> {
    /// Cross-check user arguments against the measure's declared arguments.
    ///
    /// Mismatches in name, default or domain are warnings. A missing
    /// required argument, a type mismatch or an out-of-domain value is an
    /// error. Argument values are recorded on the result only when every
    /// argument passes.
    pub fn validate_user_arguments(
        &mut self,
        script_arguments: &[OsArgument],
        user_arguments: &ArgumentMap,
    ) -> bool {
        let mut valid = true;
        let mut step_values = Vec::new();

        for script_argument in script_arguments {
            let name = script_argument.name();
            let Some(user_argument) = user_arguments.get(name) else {
                if script_argument.required() || script_argument.has_default_value() {
                    self.register_error(format!(
                        "Argument '{}' is required or has a default value, but is not in user_arguments.",
                        name
                    ));
                    valid = false;
                }
                continue;
            };

            if user_argument.name() != name {
                self.register_warning(format!(
                    "User argument name '{}' does not match map key ",
                    user_argument.name()
                ));
            }

            let same_type = user_argument.argument_type() == script_argument.argument_type();
            if !same_type {
                self.register_error(format!(
                    "User argument type {} does not match script argument type {}.",
                    user_argument.argument_type(),
                    script_argument.argument_type()
                ));
                valid = false;
            }

            if script_argument.required() && user_argument.effective_value().is_none() {
                self.register_error(format!(
                    "Script argument '{}' is required, but the user argument does not have a value or default value set.",
                    name
                ));
                valid = false;
            }

            match (
                script_argument.has_default_value(),
                user_argument.has_default_value(),
            ) {
                (true, false) => {
                    self.register_warning(format!(
                        "Script argument '{}' has a default value, but the user-supplied version does not.",
                        name
                    ));
                }
                (false, true) => {
                    self.register_warning(format!(
                        "Script argument '{}' does not have a default value, but the user-supplied version does.",
                        name
                    ));
                }
                (true, true) if same_type => {
                    if script_argument.default_value() != user_argument.default_value() {
                        self.register_warning(format!(
                            "The default value of script argument \n{}\ndoes not match that of the corresponding user argument \n{}.",
                            script_argument, user_argument
                        ));
                    }
                }
                _ => {}
            }

            match (script_argument.has_domain(), user_argument.has_domain()) {
                (true, false) => {
                    self.register_warning(format!(
                        "Script argument '{}' has a specified domain, but the user-supplied version does not.",
                        name
                    ));
                }
                (false, true) => {
                    self.register_warning(format!(
                        "Script argument '{}' does not have a specified domain, but the user-supplied version does.",
                        name
                    ));
                }
                (true, true) if same_type => {
                    if script_argument.domain() != user_argument.domain() {
                        self.register_warning(format!(
                            "The domain of script argument \n{}\ndoes not match that of the corresponding user argument \n{}.",
                            script_argument, user_argument
                        ));
                    }
                }
                _ => {}
            }

            if !valid {
                continue;
            }
            let Some(value) = user_argument.effective_value() else {
                continue;
            };

            if let Err(e) = value.ensure_finite(name) {
                self.register_error(e.message());
                valid = false;
                continue;
            }

            if let Some((low, high)) = script_argument.interval() {
                let numeric = value.value_as_double().ok();
                if let Some(number) = numeric.filter(|n| *n < low || *n > high) {
                    let err = OswError::validation_with_code(
                        ErrorCode::VALIDATION_OUT_OF_RANGE,
                        format!(
                            "{} User argument '{}' has a value '{}' that is not in the domain [{}, {}].",
                            user_argument.argument_type(),
                            name,
                            number,
                            low,
                            high
                        ),
                        Some(name.to_string()),
                    );
                    self.register_error(err.message());
                    valid = false;
                    continue;
                }
            }

            step_values.push(WorkflowStepValue::new(user_argument.name(), value.clone()));
        }

        if valid {
            for step_value in step_values {
                if let Err(e) = self.result.add_step_value(step_value) {
                    self.register_error(e.message());
                    valid = false;
                }
            }
        } else {
            debug!("User arguments failed validation, no values recorded");
        }
        valid
    }

    /// Validate, then collect each argument's value (or default) as JSON
    pub fn get_argument_values(
        &mut self,
        script_arguments: &[OsArgument],
        user_arguments: &ArgumentMap,
    ) -> Result<Map<String, Value>> {
        if !self.validate_user_arguments(script_arguments, user_arguments) {
            self.register_error("Invalid argument values.");
            return Err(OswError::validation_with_code(
                ErrorCode::VALIDATION_GENERIC,
                "Invalid argument values.",
                None,
            ));
        }

        let mut values = Map::new();
        for script_argument in script_arguments {
            let name = script_argument.name();
            if let Some(value) = user_arguments.get(name).and_then(OsArgument::effective_value) {
                values.insert(name.to_string(), value.to_json());
            }
        }
        Ok(values)
    }

    /// Look up `name`, registering and returning an error if it has no value.
    fn required_argument(
        &mut self,
        name: &str,
        user_arguments: &ArgumentMap,
    ) -> Result<Variant> {
        let argument = user_arguments.get(name);
        if let Some(value) = argument.and_then(OsArgument::effective_value) {
            return Ok(value.clone());
        }

        let mut message = common::missing_argument(name).message().to_string();
        if let Some(argument) = argument {
            message.push_str(&format!(" Full argument as passed in by user:\n{}", argument));
        }
        self.register_error(message.clone());
        Err(OswError::validation_with_code(
            ErrorCode::VALIDATION_MISSING_ARGUMENT,
            message,
            Some(name.to_string()),
        ))
    }

    fn convert_argument<T>(
        &mut self,
        name: &str,
        expected: &str,
        value: Variant,
        convert: impl FnOnce(&Variant) -> Result<T>,
    ) -> Result<T> {
        convert(&value).map_err(|_| {
            let err = common::argument_type_mismatch(name, expected);
            self.register_error(err.message().to_string());
            err
        })
    }

    pub fn get_bool_argument_value(
        &mut self,
        name: &str,
        user_arguments: &ArgumentMap,
    ) -> Result<bool> {
        let value = self.required_argument(name, user_arguments)?;
        self.convert_argument(name, "Boolean", value, Variant::value_as_boolean)
    }

    pub fn get_double_argument_value(
        &mut self,
        name: &str,
        user_arguments: &ArgumentMap,
    ) -> Result<f64> {
        let value = self.required_argument(name, user_arguments)?;
        self.convert_argument(name, "Double", value, Variant::value_as_double)
    }

    pub fn get_integer_argument_value(
        &mut self,
        name: &str,
        user_arguments: &ArgumentMap,
    ) -> Result<i32> {
        let value = self.required_argument(name, user_arguments)?;
        self.convert_argument(name, "Integer", value, Variant::value_as_integer)
    }

    pub fn get_string_argument_value(
        &mut self,
        name: &str,
        user_arguments: &ArgumentMap,
    ) -> Result<String> {
        Ok(self.required_argument(name, user_arguments)?.to_string())
    }

    pub fn get_path_argument_value(
        &mut self,
        name: &str,
        user_arguments: &ArgumentMap,
    ) -> Result<PathBuf> {
        let value = self.required_argument(name, user_arguments)?;
        self.convert_argument(name, "Path", value, |v| {
            v.value_as_string().map(PathBuf::from)
        })
    }

    pub fn get_optional_bool_argument_value(
        &self,
        name: &str,
        user_arguments: &ArgumentMap,
    ) -> Option<bool> {
        optional_value(name, user_arguments)?.value_as_boolean().ok()
    }

    pub fn get_optional_double_argument_value(
        &self,
        name: &str,
        user_arguments: &ArgumentMap,
    ) -> Option<f64> {
        optional_value(name, user_arguments)?.value_as_double().ok()
    }

    pub fn get_optional_integer_argument_value(
        &self,
        name: &str,
        user_arguments: &ArgumentMap,
    ) -> Option<i32> {
        optional_value(name, user_arguments)?.value_as_integer().ok()
    }

    pub fn get_optional_string_argument_value(
        &self,
        name: &str,
        user_arguments: &ArgumentMap,
    ) -> Option<String> {
        optional_value(name, user_arguments).map(Variant::to_string)
    }

    pub fn get_optional_path_argument_value(
        &self,
        name: &str,
        user_arguments: &ArgumentMap,
    ) -> Option<PathBuf> {
        optional_value(name, user_arguments)?
            .value_as_string()
            .ok()
            .map(PathBuf::from)
    }
}

fn optional_value<'a>(name: &str, user_arguments: &'a ArgumentMap) -> Option<&'a Variant> {
    user_arguments.get(name)?.effective_value()
}
