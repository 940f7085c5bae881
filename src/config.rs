//! Suite configuration parsing.
//!
//! A suite is described by a line-oriented `suite.conf`: `#` comments,
//! `key=value` pairs, and trailing-backslash continuation lines. Keys are
//! either suite-level (`suite=<name>`, `toolVersion=<semver>`,
//! `include=<dir>,...`) or three `@`-separated parts naming an entity
//! attribute: `{project|library|distribution}@<name>@<attribute>`.
//!
//! Values may reference environment variables as `${NAME}`; an unresolved
//! reference is a fatal configuration error. The loader produces raw
//! per-entity attribute maps; typing them is the registry's job.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static ENV_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

/// Error while parsing a suite configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{file}:{line}: non-comment line does not contain an \"=\" character")]
    NotKeyValue { file: String, line: usize },

    #[error("{file}:{line}: property name does not have 3 parts separated by \"@\": {key}")]
    BadKey { file: String, line: usize, key: String },

    #[error(
        "{file}:{line}: property name does not start with \"project@\", \"library@\" or \"distribution@\": {key}"
    )]
    UnknownKind { file: String, line: usize, key: String },

    #[error("{file}:{line}: single-part property must be \"suite\", \"toolVersion\" or \"include\": {key}")]
    UnknownSuiteKey { file: String, line: usize, key: String },

    #[error("{file}:{line}: unresolved environment variable `${{{name}}}`")]
    UnresolvedEnv { file: String, line: usize, name: String },

    #[error("{file}: missing \"suite=<name>\" declaration")]
    MissingSuiteName { file: String },

    #[error("{file}:{line}: {kind} {name} requires the \"{attr}\" attribute")]
    MissingAttribute {
        file: String,
        line: usize,
        kind: &'static str,
        name: String,
        attr: &'static str,
    },

    #[error("failed to read {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },
}

/// Raw attributes of one declared entity, in first-seen order per suite.
#[derive(Debug, Clone)]
pub struct RawEntity {
    pub name: String,
    pub attrs: BTreeMap<String, String>,
    /// Line where the entity was first mentioned, for error reporting.
    pub line: usize,
}

/// The parsed (but untyped) content of one suite.conf.
#[derive(Debug, Default)]
pub struct RawSuite {
    pub name: String,
    pub tool_version: Option<String>,
    pub includes: Vec<String>,
    pub projects: Vec<RawEntity>,
    pub libraries: Vec<RawEntity>,
    pub distributions: Vec<RawEntity>,
}

/// Parse the suite configuration at `path`.
pub fn parse_suite_file(path: &Path) -> Result<RawSuite, ConfigError> {
    let file = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        file: file.clone(),
        source,
    })?;
    parse_suite_str(&content, &file)
}

/// Parse suite configuration text; `file` is used in error messages only.
pub fn parse_suite_str(content: &str, file: &str) -> Result<RawSuite, ConfigError> {
    let mut suite_name: Option<String> = None;
    let mut raw = RawSuite::default();
    let mut prefix = String::new();

    for (idx, raw_line) in content.lines().enumerate() {
        let line_num = idx + 1;
        let mut line = raw_line.trim().to_string();
        if let Some(stripped) = line.strip_suffix('\\') {
            prefix.push_str(stripped);
            continue;
        }
        if !prefix.is_empty() {
            line = format!("{}{}", prefix, line);
            prefix.clear();
        }
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            return Err(ConfigError::NotKeyValue {
                file: file.to_string(),
                line: line_num,
            });
        };
        let value = expand_env(value, file, line_num)?;

        let parts: Vec<&str> = key.split('@').collect();
        match parts.as_slice() {
            [single] => match *single {
                "suite" => suite_name = Some(value),
                "toolVersion" => raw.tool_version = Some(value),
                "include" => raw.includes.extend(split_list(&value)),
                _ => {
                    return Err(ConfigError::UnknownSuiteKey {
                        file: file.to_string(),
                        line: line_num,
                        key: key.to_string(),
                    })
                }
            },
            [kind, name, attr] => {
                let entities = match *kind {
                    "project" => &mut raw.projects,
                    "library" => &mut raw.libraries,
                    "distribution" => &mut raw.distributions,
                    _ => {
                        return Err(ConfigError::UnknownKind {
                            file: file.to_string(),
                            line: line_num,
                            key: key.to_string(),
                        })
                    }
                };
                let idx = match entities.iter().position(|e| e.name == *name) {
                    Some(idx) => idx,
                    None => {
                        entities.push(RawEntity {
                            name: name.to_string(),
                            attrs: BTreeMap::new(),
                            line: line_num,
                        });
                        entities.len() - 1
                    }
                };
                entities[idx].attrs.insert(attr.to_string(), value);
            }
            _ => {
                return Err(ConfigError::BadKey {
                    file: file.to_string(),
                    line: line_num,
                    key: key.to_string(),
                })
            }
        }
    }

    raw.name = suite_name.ok_or_else(|| ConfigError::MissingSuiteName {
        file: file.to_string(),
    })?;
    Ok(raw)
}

/// Split a comma-separated list value into trimmed entries.
///
/// Empty and whitespace-only values yield an empty sequence.
pub fn split_list(value: &str) -> Vec<String> {
    if value.trim().is_empty() {
        return Vec::new();
    }
    value.split(',').map(|s| s.trim().to_string()).collect()
}

/// Substitute `${NAME}` environment references in `value`.
fn expand_env(value: &str, file: &str, line: usize) -> Result<String, ConfigError> {
    let mut result = String::with_capacity(value.len());
    let mut last = 0;
    for cap in ENV_REF_RE.captures_iter(value) {
        let whole = cap.get(0).unwrap();
        let name = &cap[1];
        result.push_str(&value[last..whole.start()]);
        match std::env::var(name) {
            Ok(v) => result.push_str(&v),
            Err(_) => {
                return Err(ConfigError::UnresolvedEnv {
                    file: file.to_string(),
                    line,
                    name: name.to_string(),
                })
            }
        }
        last = whole.end();
    }
    result.push_str(&value[last..]);
    Ok(result)
}
