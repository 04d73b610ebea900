//! `$NAME$` placeholder expansion

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

#[allow(clippy::expect_used)]
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(\w+)\$").expect("placeholder pattern is valid"));

/// Expand placeholders against Stepfile variables, then the process environment
pub fn expand_variables(text: &str, variables: &BTreeMap<String, String>) -> String {
    expand_with(text, variables, |name| std::env::var(name).ok())
}

/// Expand placeholders with an explicit fallback lookup.
///
/// Empty values count as unresolved. Unresolved placeholders are kept verbatim.
pub fn expand_with<F>(text: &str, variables: &BTreeMap<String, String>, fallback: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    PLACEHOLDER
        .replace_all(text, |caps: &Captures<'_>| {
            let name = &caps[1];
            variables
                .get(name)
                .filter(|value| !value.is_empty())
                .cloned()
                .or_else(|| fallback(name).filter(|value| !value.is_empty()))
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_expand_simple_variable() {
        let variables = vars(&[("NAME", "world")]);
        assert_eq!(expand_with("Hello $NAME$", &variables, no_env), "Hello world");
    }

    #[test]
    fn test_expand_multiple_variables() {
        let variables = vars(&[("FIRST", "John"), ("LAST", "Doe")]);
        assert_eq!(expand_with("$FIRST$ $LAST$", &variables, no_env), "John Doe");
    }

    #[test]
    fn test_variables_take_precedence_over_environment() {
        let variables = vars(&[("HOME", "from_stepfile")]);
        let env = |_: &str| Some("from_env".to_string());
        assert_eq!(expand_with("$HOME$", &variables, env), "from_stepfile");
    }

    #[test]
    fn test_environment_fallback() {
        let env = |name: &str| (name == "TEST_VAR").then(|| "from_env".to_string());
        assert_eq!(
            expand_with("Value: $TEST_VAR$", &BTreeMap::new(), env),
            "Value: from_env"
        );
    }

    #[test]
    fn test_empty_value_falls_through() {
        let variables = vars(&[("EMPTY", "")]);
        let env = |_: &str| Some("env".to_string());
        assert_eq!(expand_with("$EMPTY$", &variables, env), "env");
        assert_eq!(expand_with("$EMPTY$", &variables, no_env), "$EMPTY$");
    }

    #[test]
    fn test_undefined_variable_unchanged() {
        assert_eq!(expand_with("$UNDEFINED$", &BTreeMap::new(), no_env), "$UNDEFINED$");
        assert_eq!(expand_with("cost $5 and $", &BTreeMap::new(), no_env), "cost $5 and $");
    }

    #[test]
    fn test_process_environment_lookup() {
        let path = std::env::var("PATH").unwrap_or_default();
        if !path.is_empty() {
            assert_eq!(expand_variables("$PATH$", &BTreeMap::new()), path);
        }
    }
}
