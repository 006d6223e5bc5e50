//! LM-017: YAML parsing and validation.
//!
//! Parses lamina.yaml and validates structural constraints:
//! - Version must be "1.0"
//! - Service name must not be empty
//! - Store ids must be legal logical ids of a store kind
//! - `uses` references must name declared stores
//! - Handler names must yield distinct function ids
//! - Memory and timeout within provider limits

use super::hasher;
use super::identifier;
use super::types::*;
use std::collections::BTreeMap;
use std::path::Path;

pub const MEMORY_RANGE: std::ops::RangeInclusive<u32> = 128..=10240;
pub const TIMEOUT_RANGE: std::ops::RangeInclusive<u32> = 1..=900;

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

fn err(errors: &mut Vec<ValidationError>, message: String) {
    errors.push(ValidationError { message });
}

/// Parse a lamina.yaml file from disk.
pub fn parse_config_file(path: &Path) -> Result<LaminaConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    parse_config(&content)
}

/// Parse a lamina.yaml from a string.
pub fn parse_config(yaml: &str) -> Result<LaminaConfig, String> {
    serde_yaml_ng::from_str(yaml).map_err(|e| format!("YAML parse error: {}", e))
}

/// Validate a parsed config. Returns a list of errors (empty = valid).
pub fn validate_config(config: &LaminaConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if config.version != "1.0" {
        err(
            &mut errors,
            format!("version must be \"1.0\", got \"{}\"", config.version),
        );
    }

    if config.service.trim().is_empty() {
        err(&mut errors, "service must not be empty".to_string());
    }

    for (id, store) in &config.stores {
        if let Err(e) = identifier::validate_logical_id(id) {
            err(&mut errors, format!("store '{}': {}", id, e));
        }
        if !store.kind.is_store() {
            err(
                &mut errors,
                format!("store '{}' has kind '{}', which is not a store kind", id, store.kind),
            );
        }
        for dep in &store.depends_on {
            if dep == id {
                err(&mut errors, format!("store '{}' depends on itself", id));
            }
        }
    }

    let mut function_ids: BTreeMap<String, Verb> = BTreeMap::new();
    for (verb, function) in &config.functions {
        if function.handler.trim().is_empty() {
            err(&mut errors, format!("function {} has an empty handler", verb));
        } else {
            match identifier::function_id(&HandlerRef::new(function.handler.clone())) {
                Ok(id) => {
                    if let Some(other) = function_ids.insert(id.clone(), *verb) {
                        err(
                            &mut errors,
                            format!(
                                "functions {} and {} both derive logical id '{}'",
                                other, verb, id
                            ),
                        );
                    }
                }
                Err(e) => err(&mut errors, format!("function {}: {}", verb, e)),
            }
        }

        for store in &function.uses {
            if !config.stores.contains_key(store) {
                err(
                    &mut errors,
                    format!("function {} uses unknown store '{}'", verb, store),
                );
            }
        }

        if !MEMORY_RANGE.contains(&function.memory) {
            err(
                &mut errors,
                format!(
                    "function {} memory {} MB outside {}..={}",
                    verb,
                    function.memory,
                    MEMORY_RANGE.start(),
                    MEMORY_RANGE.end()
                ),
            );
        }
        if !TIMEOUT_RANGE.contains(&function.timeout) {
            err(
                &mut errors,
                format!(
                    "function {} timeout {} s outside {}..={}",
                    verb,
                    function.timeout,
                    TIMEOUT_RANGE.start(),
                    TIMEOUT_RANGE.end()
                ),
            );
        }
    }

    errors
}

/// Build identifier: explicit override, then config, then a digest of the
/// config text so identical input yields an identical artifact.
pub fn build_id(explicit: Option<&str>, config: &LaminaConfig, raw: &str) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| config.build_id.clone())
        .unwrap_or_else(|| hasher::short_digest(&[raw]))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
version: "1.0"
service: SpartaDDB
stores:
  MyAppTable:
    kind: table
functions:
  GET:
    handler: hello_world::get
    uses: [MyAppTable]
  DELETE:
    handler: hello_world::delete
    uses: [MyAppTable]
    memory: 256
    timeout: 30
"#;

    fn messages(config: &LaminaConfig) -> Vec<String> {
        validate_config(config).into_iter().map(|e| e.message).collect()
    }

    #[test]
    fn test_lm017_parse_valid() {
        let config = parse_config(VALID).unwrap();
        assert_eq!(config.service, "SpartaDDB");
        assert_eq!(config.functions[&Verb::Get].memory, 128);
        assert_eq!(config.functions[&Verb::Delete].timeout, 30);
        let errors = messages(&config);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    }

    #[test]
    fn test_lm017_bad_version() {
        let config = parse_config("version: \"2.0\"\nservice: s\n").unwrap();
        assert!(messages(&config).iter().any(|m| m.contains("version")));
    }

    #[test]
    fn test_lm017_empty_service() {
        let config = parse_config("version: \"1.0\"\nservice: \"  \"\n").unwrap();
        assert!(messages(&config).iter().any(|m| m.contains("service")));
    }

    #[test]
    fn test_lm017_unknown_store() {
        let yaml = r#"
version: "1.0"
service: s
functions:
  GET:
    handler: get
    uses: [Missing]
"#;
        let config = parse_config(yaml).unwrap();
        assert!(messages(&config)
            .iter()
            .any(|m| m.contains("unknown store 'Missing'")));
    }

    #[test]
    fn test_lm017_non_store_kind() {
        let yaml = r#"
version: "1.0"
service: s
stores:
  Worker:
    kind: function
"#;
        let config = parse_config(yaml).unwrap();
        assert!(messages(&config)
            .iter()
            .any(|m| m.contains("not a store kind")));
    }

    #[test]
    fn test_lm017_unknown_kind_rejected_by_parser() {
        let yaml = r#"
version: "1.0"
service: s
stores:
  Thing:
    kind: spaceship
"#;
        assert!(parse_config(yaml).unwrap_err().contains("YAML parse error"));
    }

    #[test]
    fn test_lm017_illegal_store_id() {
        let yaml = r#"
version: "1.0"
service: s
stores:
  my-table:
    kind: table
"#;
        let config = parse_config(yaml).unwrap();
        assert!(messages(&config).iter().any(|m| m.contains("my-table")));
    }

    #[test]
    fn test_lm017_limits_out_of_range() {
        let yaml = r#"
version: "1.0"
service: s
functions:
  GET:
    handler: get
    memory: 64
    timeout: 0
"#;
        let config = parse_config(yaml).unwrap();
        let errors = messages(&config);
        assert!(errors.iter().any(|m| m.contains("memory 64")));
        assert!(errors.iter().any(|m| m.contains("timeout 0")));
    }

    #[test]
    fn test_lm017_colliding_handlers() {
        let yaml = r#"
version: "1.0"
service: s
functions:
  GET:
    handler: hello_world
  POST:
    handler: hello-world
"#;
        let config = parse_config(yaml).unwrap();
        assert!(messages(&config)
            .iter()
            .any(|m| m.contains("both derive logical id 'HelloWorld'")));
    }

    #[test]
    fn test_lm017_verb_keys_any_case() {
        let yaml = r#"
version: "1.0"
service: s
stores:
  Jobs:
    kind: queue
functions:
  get:
    handler: x::get
    uses: [Jobs]
  Delete:
    handler: x::delete
"#;
        let config = parse_config(yaml).unwrap();
        let verbs: Vec<_> = config.functions.keys().copied().collect();
        assert_eq!(verbs, vec![Verb::Get, Verb::Delete]);
        assert!(messages(&config).is_empty());

        let yaml = "version: \"1.0\"\nservice: s\nfunctions:\n  trace:\n    handler: x\n";
        let err = parse_config(yaml).unwrap_err();
        assert!(err.contains("unknown verb"));
    }

    #[test]
    fn test_lm017_custom_store_kind_parses_but_is_not_a_store() {
        let yaml = r#"
version: "1.0"
service: s
stores:
  Seeder:
    kind: Custom::Seeder
"#;
        let config = parse_config(yaml).unwrap();
        assert_eq!(
            config.stores["Seeder"].kind,
            ResourceKind::Custom("Custom::Seeder".into())
        );
        assert!(messages(&config)
            .iter()
            .any(|m| m.contains("'Custom::Seeder', which is not a store kind")));
    }

    #[test]
    fn test_lm017_build_id_precedence() {
        let mut config = parse_config(VALID).unwrap();
        let derived = build_id(None, &config, VALID);
        assert_eq!(derived.len(), hasher::SHORT_DIGEST_LEN);
        assert_eq!(derived, build_id(None, &config, VALID));

        config.build_id = Some("from-config".into());
        assert_eq!(build_id(None, &config, VALID), "from-config");
        assert_eq!(build_id(Some("cli"), &config, VALID), "cli");
    }

    #[test]
    fn test_lm017_parse_file_missing() {
        let err = parse_config_file(Path::new("/nonexistent/lamina.yaml")).unwrap_err();
        assert!(err.contains("failed to read"));
    }
}
