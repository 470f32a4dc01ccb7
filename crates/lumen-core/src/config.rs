//! Engine configuration.
//!
//! The configuration is fixed when a [`ScriptEngine`](crate::ScriptEngine) is
//! constructed; nothing here is a process-wide switch.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Environment variable selecting the engine mode.
pub const MODE_ENV: &str = "LUMEN_MODE";
/// Environment variable overriding the unit name prefix.
pub const UNIT_PREFIX_ENV: &str = "LUMEN_UNIT_PREFIX";
/// Environment variable overriding the pseudo-filename used in diagnostics.
pub const PSEUDO_FILENAME_ENV: &str = "LUMEN_PSEUDO_FILENAME";

/// How the engine resolves shared state and how much it logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Shared state comes from the session registry; values are never logged.
    #[default]
    Production,
    /// Shared state is a private empty map; results and bindings are logged.
    LocalDev,
}

impl std::str::FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Mode::Production),
            "local-dev" | "local_dev" | "localdev" | "dev" => Ok(Mode::LocalDev),
            other => Err(Error::Config(format!("unknown mode '{}'", other))),
        }
    }
}

/// Configuration for a [`ScriptEngine`](crate::ScriptEngine).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Local development or production behaviour.
    pub mode: Mode,
    /// Prefix of generated unit names.
    pub unit_prefix: String,
    /// Name shown in place of the unit name in diagnostics.
    pub pseudo_filename: String,
    /// Reserved variable the session's shared state is bound to.
    pub shared_state_var: String,
    /// Optional recursion limit for script function calls.
    pub max_call_levels: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Production,
            unit_prefix: "unit_".to_string(),
            pseudo_filename: "this cell".to_string(),
            shared_state_var: "beaker".to_string(),
            max_call_levels: None,
        }
    }
}

impl EngineConfig {
    /// Default configuration in local development mode.
    pub fn local_dev() -> Self {
        Self::default().with_mode(Mode::LocalDev)
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_unit_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.unit_prefix = prefix.into();
        self
    }

    pub fn with_pseudo_filename(mut self, name: impl Into<String>) -> Self {
        self.pseudo_filename = name.into();
        self
    }

    pub fn with_shared_state_var(mut self, name: impl Into<String>) -> Self {
        self.shared_state_var = name.into();
        self
    }

    pub fn with_max_call_levels(mut self, levels: usize) -> Self {
        self.max_call_levels = Some(levels);
        self
    }

    /// Parse a JSON configuration document. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("malformed configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Defaults overridden by `LUMEN_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().apply_env(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a variable lookup. Split out from [`from_env`](Self::from_env)
    /// so overrides can be tested without touching the process environment.
    pub fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(mode) = lookup(MODE_ENV) {
            self.mode = mode.parse()?;
        }
        if let Some(prefix) = lookup(UNIT_PREFIX_ENV) {
            self.unit_prefix = prefix;
        }
        if let Some(name) = lookup(PSEUDO_FILENAME_ENV) {
            self.pseudo_filename = name;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check invariants the engine relies on.
    pub fn validate(&self) -> Result<()> {
        if !is_identifier(&self.unit_prefix) {
            return Err(Error::Config(format!(
                "unit prefix '{}' must be a non-empty identifier",
                self.unit_prefix
            )));
        }
        if !is_identifier(&self.shared_state_var) {
            return Err(Error::Config(format!(
                "shared state variable '{}' must be a non-empty identifier",
                self.shared_state_var
            )));
        }
        if is_reserved_word(&self.shared_state_var) {
            return Err(Error::Config(format!(
                "shared state variable '{}' is a reserved word",
                self.shared_state_var
            )));
        }
        if self.pseudo_filename.trim().is_empty() {
            return Err(Error::Config("pseudo filename must not be empty".to_string()));
        }
        if self.max_call_levels == Some(0) {
            return Err(Error::Config("max_call_levels must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn is_local_dev(&self) -> bool {
        self.mode == Mode::LocalDev
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Whether scripts cannot declare `name` as a variable.
fn is_reserved_word(name: &str) -> bool {
    rhai::Engine::new_raw()
        .compile(format!("let {} = ();", name))
        .is_err()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.mode, Mode::Production);
        assert_eq!(config.pseudo_filename, "this cell");
    }

    #[test]
    fn test_json_partial_document() {
        let config = EngineConfig::from_json_str(r#"{ "mode": "local-dev", "unit_prefix": "cell_" }"#)
            .unwrap();
        assert_eq!(config.mode, Mode::LocalDev);
        assert_eq!(config.unit_prefix, "cell_");
        assert_eq!(config.shared_state_var, "beaker");
    }

    #[test]
    fn test_json_rejects_unknown_fields() {
        let err = EngineConfig::from_json_str(r#"{ "timeout": 5 }"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_invalid_prefix_rejected() {
        let err = EngineConfig::default().with_unit_prefix("9bad").validate().unwrap_err();
        assert!(err.to_string().contains("9bad"));
        assert!(EngineConfig::default().with_unit_prefix("").validate().is_err());
    }

    #[test]
    fn test_reserved_shared_state_var_rejected() {
        for word in ["shared", "let", "fn", "this", "true"] {
            let err = EngineConfig::default()
                .with_shared_state_var(word)
                .validate()
                .unwrap_err();
            assert!(err.to_string().contains("reserved"), "{}: {}", word, err);
        }
        assert!(EngineConfig::default().with_shared_state_var("ctx").validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [(MODE_ENV, "dev"), (PSEUDO_FILENAME_ENV, "cell [3]")]
            .into_iter()
            .collect();
        let config = EngineConfig::default()
            .apply_env(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert!(config.is_local_dev());
        assert_eq!(config.pseudo_filename, "cell [3]");
        assert_eq!(config.unit_prefix, "unit_");
    }

    #[test]
    fn test_env_unknown_mode() {
        let result = EngineConfig::default()
            .apply_env(|key| (key == MODE_ENV).then(|| "staging".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("lumen.json");
        std::fs::write(&path, r#"{ "pseudo_filename": "notebook" }"#).unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.pseudo_filename, "notebook");

        let missing = EngineConfig::from_file(dir.path().join("absent.json"));
        assert!(matches!(missing, Err(Error::Io(_))));
    }
}
