//! Normalization of registered value names.

use once_cell::sync::Lazy;
use regex::Regex;

static DISALLOWED_CHARACTERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^0-9a-zA-Z]").expect("Valid regex pattern"));
static LEADING_UNDERSCORES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^_+").expect("Valid regex pattern"));
static TRAILING_UNDERSCORES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_+$").expect("Valid regex pattern"));
static LEADING_DIGIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9])").expect("Valid regex pattern"));
static UNDERSCORE_RUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_+").expect("Valid regex pattern"));
static ACRONYM_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Z]+)([A-Z][a-z])").expect("Valid regex pattern"));
static WORD_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("Valid regex pattern"));

/// Turn an arbitrary label into a snake_case identifier usable as a value name.
///
/// ```
/// use osworkflow::runner::clean_value_name;
///
/// assert_eq!(clean_value_name("ValueTwo"), "value_two");
/// assert_eq!(clean_value_name("4ValueFour"), "_4_value_four");
/// ```
pub fn clean_value_name(name: &str) -> String {
    let result = DISALLOWED_CHARACTERS.replace_all(name, "_");
    let result = LEADING_UNDERSCORES.replace(&result, "");
    let result = TRAILING_UNDERSCORES.replace(&result, "");
    let result = LEADING_DIGIT.replace(&result, "_${1}");
    let result = UNDERSCORE_RUNS.replace_all(&result, "_");
    to_underscore_case(&result)
}

fn to_underscore_case(s: &str) -> String {
    let result = ACRONYM_BOUNDARY.replace_all(s, "${1}_${2}");
    let result = WORD_BOUNDARY.replace_all(&result, "${1}_${2}");
    result.to_lowercase()
}
