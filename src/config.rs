//! Scan configuration: project options, config file loading, and
//! token/server resolution.
//!
//! The configuration is assembled once at startup and never mutated
//! afterwards. Ambient state (environment variables) is read at the CLI
//! edge and passed into the resolvers explicitly so that resolution is a
//! pure function of its inputs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Server URL used when nothing else is configured.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:9000";

/// Placeholder substituted when no token is configured anywhere. The
/// server will reject it, but submission still happens so the failure
/// surfaces server-side rather than as a missing-config error here.
pub const PLACEHOLDER_TOKEN: &str = "squ_your_token_here";

/// Environment variable holding the authentication token.
pub const TOKEN_ENV_VAR: &str = "SONAR_TOKEN";

/// Environment variable overriding the server URL.
pub const SERVER_URL_ENV_VAR: &str = "SONAR_HOST_URL";

/// Errors that can occur while loading or validating a configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid exclusion glob {pattern:?}: {source}")]
    InvalidGlob {
        pattern: String,
        source: globset::Error,
    },
}

/// Project-level scan options.
///
/// These flatten into the fixed `sonar.*` property set via
/// [`ProjectOptions::to_properties`]. The key set is known at construction
/// time; no dynamic keys are ever added.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProjectOptions {
    /// Project identifier on the server.
    pub key: String,
    /// Human-readable project name.
    pub name: String,
    /// Source directory path.
    pub sources: String,
    /// Test directory path.
    pub tests: String,
    /// Glob patterns excluded from analysis.
    pub exclusions: Vec<String>,
    /// Path to the LCOV coverage report.
    pub coverage_report: String,
    /// Glob patterns excluded from coverage calculation.
    pub coverage_exclusions: Vec<String>,
}

impl Default for ProjectOptions {
    fn default() -> Self {
        Self {
            key: "my-project".to_string(),
            name: "My Project".to_string(),
            sources: "src".to_string(),
            tests: "test".to_string(),
            exclusions: vec![
                "**/node_modules/**".to_string(),
                "**/dist/**".to_string(),
                "**/*.spec.ts".to_string(),
                "**/*.e2e-spec.ts".to_string(),
            ],
            coverage_report: "coverage/lcov.info".to_string(),
            coverage_exclusions: vec![
                "**/*.spec.ts".to_string(),
                "**/*.e2e-spec.ts".to_string(),
                "**/main.ts".to_string(),
                "**/*.module.ts".to_string(),
            ],
        }
    }
}

impl ProjectOptions {
    /// Flatten into the `sonar.*` property map sent to the server.
    ///
    /// Glob sets are comma-joined, matching the scanner property format.
    pub fn to_properties(&self) -> BTreeMap<String, String> {
        let mut props = BTreeMap::new();
        props.insert("sonar.projectKey".to_string(), self.key.clone());
        props.insert("sonar.projectName".to_string(), self.name.clone());
        props.insert("sonar.sources".to_string(), self.sources.clone());
        props.insert("sonar.tests".to_string(), self.tests.clone());
        props.insert("sonar.exclusions".to_string(), self.exclusions.join(","));
        props.insert(
            "sonar.typescript.lcov.reportPaths".to_string(),
            self.coverage_report.clone(),
        );
        props.insert(
            "sonar.coverage.exclusions".to_string(),
            self.coverage_exclusions.join(","),
        );
        props
    }

    /// Validate that every exclusion pattern is a well-formed glob.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for pattern in self.exclusions.iter().chain(&self.coverage_exclusions) {
            globset::Glob::new(pattern).map_err(|source| ConfigError::InvalidGlob {
                pattern: pattern.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

/// Top-level scan configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Scan server endpoint.
    pub server_url: String,
    /// Token from the config file. Lowest-precedence source; prefer the
    /// environment variable or the CLI flag.
    pub token: Option<String>,
    pub project: ProjectOptions,
    /// When false (the default) the process exits 0 no matter how the
    /// scan ends, matching the historical fire-and-forget behavior.
    /// When true, a failed or unreachable scan produces a non-zero exit.
    pub fail_on_error: bool,
    /// How often to poll the compute engine task, in milliseconds.
    pub poll_interval_ms: u64,
    /// Give up polling after this many seconds.
    pub poll_timeout_secs: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            token: None,
            project: ProjectOptions::default(),
            fail_on_error: false,
            poll_interval_ms: 500,
            poll_timeout_secs: 300,
        }
    }
}

impl ScanConfig {
    /// Parse a configuration from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: ScanConfig = serde_yaml::from_str(&content)?;
        config.project.validate()?;
        Ok(config)
    }
}

/// Resolve the authentication token from its sources in precedence order:
/// CLI flag, then environment, then config file, then the placeholder.
pub fn resolve_token(
    cli: Option<&str>,
    env: Option<&str>,
    file: Option<&str>,
) -> String {
    cli.or(env)
        .or(file)
        .unwrap_or(PLACEHOLDER_TOKEN)
        .to_string()
}

/// Resolve the server URL: CLI flag, then environment, then config file
/// value. The config file value defaults to [`DEFAULT_SERVER_URL`].
pub fn resolve_server_url(cli: Option<&str>, env: Option<&str>, file: &str) -> String {
    cli.or(env).unwrap_or(file).trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_from_env() {
        assert_eq!(resolve_token(None, Some("abc123"), None), "abc123");
    }

    #[test]
    fn test_token_falls_back_to_placeholder() {
        assert_eq!(resolve_token(None, None, None), PLACEHOLDER_TOKEN);
    }

    #[test]
    fn test_token_precedence() {
        assert_eq!(
            resolve_token(Some("from-cli"), Some("from-env"), Some("from-file")),
            "from-cli"
        );
        assert_eq!(
            resolve_token(None, Some("from-env"), Some("from-file")),
            "from-env"
        );
        assert_eq!(resolve_token(None, None, Some("from-file")), "from-file");
    }

    #[test]
    fn test_server_url_default_and_trailing_slash() {
        let config = ScanConfig::default();
        assert_eq!(
            resolve_server_url(None, None, &config.server_url),
            "http://localhost:9000"
        );
        assert_eq!(
            resolve_server_url(Some("https://sonar.example.com/"), None, &config.server_url),
            "https://sonar.example.com"
        );
    }

    #[test]
    fn test_properties_key_set_is_fixed() {
        let props = ProjectOptions::default().to_properties();
        let keys: Vec<&str> = props.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "sonar.coverage.exclusions",
                "sonar.exclusions",
                "sonar.projectKey",
                "sonar.projectName",
                "sonar.sources",
                "sonar.tests",
                "sonar.typescript.lcov.reportPaths",
            ]
        );
    }

    #[test]
    fn test_properties_default_values() {
        let props = ProjectOptions::default().to_properties();
        assert_eq!(props["sonar.sources"], "src");
        assert_eq!(props["sonar.tests"], "test");
        assert_eq!(
            props["sonar.exclusions"],
            "**/node_modules/**,**/dist/**,**/*.spec.ts,**/*.e2e-spec.ts"
        );
        assert_eq!(props["sonar.typescript.lcov.reportPaths"], "coverage/lcov.info");
        assert_eq!(
            props["sonar.coverage.exclusions"],
            "**/*.spec.ts,**/*.e2e-spec.ts,**/main.ts,**/*.module.ts"
        );
    }

    #[test]
    fn test_invalid_glob_rejected() {
        let mut options = ProjectOptions::default();
        options.exclusions.push("**/[unclosed".to_string());
        let err = options.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidGlob { .. }));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "project:\n  key: backend\n  name: Backend\nfail_on_error: true\n";
        let config: ScanConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.project.key, "backend");
        assert!(config.fail_on_error);
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
        assert_eq!(config.project.sources, "src");
        assert_eq!(config.poll_interval_ms, 500);
    }
}
