//! Run configuration loaded from a YAML file

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::resolver::ResolutionContext;
use crate::tasks::BuiltinModules;

const DEFAULT_ROLES_PATH: &[&str] = &[
    "~/.ansible/roles",
    "/usr/share/ansible/roles",
    "/etc/ansible/roles",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {error}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error("Invalid config {}: {error}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        error: serde_yaml::Error,
    },

    #[error("Invalid exclude pattern '{pattern}': {error}")]
    Pattern {
        pattern: String,
        #[source]
        error: regex::Error,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ansible: AnsibleConfig,
    pub rules: RulesConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnsibleConfig {
    /// Module names accepted as action keys in addition to the builtins.
    pub custom_modules: Vec<String>,
    /// Role search locations tried after the playbook-relative ones.
    pub roles_path: Vec<PathBuf>,
    /// Variables available to templated include paths.
    pub template_vars: Map<String, Value>,
}

impl Default for AnsibleConfig {
    fn default() -> Self {
        Self {
            custom_modules: Vec::new(),
            roles_path: default_roles_path(),
            template_vars: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Glob patterns for files that are resolved but not inspected.
    pub exclude_files: Vec<String>,
}

/// `ANSIBLE_ROLES_PATH` when set, else the framework's default locations.
pub fn default_roles_path() -> Vec<PathBuf> {
    match std::env::var("ANSIBLE_ROLES_PATH") {
        Ok(value) if !value.trim().is_empty() => value
            .split(':')
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .collect(),
        _ => DEFAULT_ROLES_PATH.iter().map(PathBuf::from).collect(),
    }
}

impl Config {
    /// Loads `path`, or the defaults when no path is given or the file
    /// does not exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            debug!("Config {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path).map_err(|error| ConfigError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        let config = Self::from_yaml(&text).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })?;
        config.exclude_matchers()?;

        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// A fresh resolution context carrying the configured roles path and
    /// template variables.
    pub fn resolution_context(&self) -> ResolutionContext {
        ResolutionContext::new()
            .with_roles_path(&self.ansible.roles_path)
            .with_variables(self.ansible.template_vars.clone())
    }

    pub fn builtin_modules(&self) -> BuiltinModules {
        BuiltinModules::new(&self.ansible.custom_modules)
    }

    pub fn exclude_matchers(&self) -> Result<Vec<Regex>, ConfigError> {
        self.rules
            .exclude_files
            .iter()
            .map(|pattern| {
                Regex::new(&glob_to_regex(pattern)).map_err(|error| ConfigError::Pattern {
                    pattern: pattern.clone(),
                    error,
                })
            })
            .collect()
    }
}

/// Translates a gitignore-style glob into a regex matching it at any path
/// component boundary, together with everything below it.
fn glob_to_regex(pattern: &str) -> String {
    let pattern = pattern.trim().trim_end_matches('/');
    let mut regex = String::from("(^|/)");
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                regex.push_str(".*");
            }
            '*' => regex.push_str("[^/]*"),
            '?' => regex.push_str("[^/]"),
            other => regex.push_str(&regex::escape(&other.to_string())),
        }
    }

    regex.push_str("(/|$)");
    regex
}

/// Whether `path` matches any of the compiled exclude patterns.
pub fn is_excluded(path: &Path, matchers: &[Regex]) -> bool {
    let text = path.to_string_lossy();
    matchers.iter().any(|m| m.is_match(&text))
}
