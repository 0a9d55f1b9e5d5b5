//! Configuration management for buildtidy
//!
//! Configuration lives in ~/.buildtidy/config.toml unless --config names
//! another file. Every field has a default matching the directory layout the
//! tools were written for, so an empty file is a valid configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::downgrade::{Downgrader, FileKind};
use crate::error_helpers;
use crate::rules::Rule;

/// buildtidy configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Line ending normalization settings
    #[serde(default)]
    pub normalize: NormalizeConfig,

    /// Project downgrade settings
    #[serde(default)]
    pub downgrade: DowngradeConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizeConfig {
    /// Directories to search
    #[serde(default = "default_normalize_roots")]
    pub roots: Vec<PathBuf>,

    /// File extensions to rewrite, without the leading dot
    #[serde(default = "default_normalize_extensions")]
    pub extensions: Vec<String>,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            roots: default_normalize_roots(),
            extensions: default_normalize_extensions(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DowngradeConfig {
    /// Directory to search
    #[serde(default = "default_downgrade_root")]
    pub root: PathBuf,

    /// Suffix appended to the file stem of every converted copy
    #[serde(default = "default_marker")]
    pub marker: String,

    /// Directory names never descended into
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,

    #[serde(default = "default_project")]
    pub project: KindConfig,

    #[serde(default = "default_csproject")]
    pub csproject: KindConfig,

    #[serde(default = "default_solution")]
    pub solution: KindConfig,
}

impl Default for DowngradeConfig {
    fn default() -> Self {
        Self {
            root: default_downgrade_root(),
            marker: default_marker(),
            exclude_dirs: default_exclude_dirs(),
            project: default_project(),
            csproject: default_csproject(),
            solution: default_solution(),
        }
    }
}

impl DowngradeConfig {
    pub fn kind(&self, kind: FileKind) -> &KindConfig {
        match kind {
            FileKind::Project => &self.project,
            FileKind::CsProject => &self.csproject,
            FileKind::Solution => &self.solution,
        }
    }

    fn kind_mut(&mut self, kind: FileKind) -> &mut KindConfig {
        match kind {
            FileKind::Project => &mut self.project,
            FileKind::CsProject => &mut self.csproject,
            FileKind::Solution => &mut self.solution,
        }
    }

    /// Rules for `kind`: the configured list, or the built-in table
    pub fn rules_for(&self, kind: FileKind) -> Vec<Rule> {
        match &self.kind(kind).rules {
            Some(rules) => rules.clone(),
            None => kind.default_rules(self),
        }
    }

    /// Copy with every built-in rule table written out explicitly
    pub fn with_resolved_rules(&self) -> Self {
        let mut resolved = self.clone();
        for kind in FileKind::ALL {
            let rules = self.rules_for(kind);
            resolved.kind_mut(kind).rules = Some(rules);
        }
        resolved
    }
}

/// Per file kind settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindConfig {
    /// Extension that selects this kind, without the leading dot
    pub extension: String,

    /// Extension of the converted copy, if it differs from `extension`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_extension: Option<String>,

    /// Replacement rules, replacing the built-in table when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Rule>>,
}

impl KindConfig {
    fn for_extension(extension: &str) -> Self {
        Self {
            extension: extension.to_string(),
            output_extension: None,
            rules: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Write a debug log to ~/.buildtidy/buildtidy.log
    #[serde(default)]
    pub debug: bool,
}

// Default functions for serde
fn default_normalize_roots() -> Vec<PathBuf> { vec![PathBuf::from("../src"), PathBuf::from("../test")] }
fn default_normalize_extensions() -> Vec<String> { vec!["h".to_string(), "cpp".to_string()] }
fn default_downgrade_root() -> PathBuf { PathBuf::from("..") }
fn default_marker() -> String { ".vc8".to_string() }
fn default_exclude_dirs() -> Vec<String> { vec![".svn".to_string()] }
fn default_project() -> KindConfig { KindConfig::for_extension("vcproj") }
fn default_csproject() -> KindConfig { KindConfig::for_extension("csproj") }
fn default_solution() -> KindConfig { KindConfig::for_extension("sln") }

/// Get the configuration directory (~/.buildtidy), creating it if needed
pub fn config_dir() -> Result<PathBuf> {
    let home_dir = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("Cannot determine home directory"))?;

    let config_dir = home_dir.join(".buildtidy");
    fs::create_dir_all(&config_dir)
        .map_err(|e| anyhow::anyhow!(error_helpers::dir_create_error(&config_dir, &e)))?;

    Ok(config_dir)
}

/// Get the default configuration file path
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Get the default configuration file content with comments
fn get_default_config_content() -> &'static str {
    r#"# buildtidy configuration file
#
# Values set here can be overridden by command-line flags.
# Relative paths are resolved against the working directory.

[normalize]
# Directories searched by `buildtidy eol`
roots = ["../src", "../test"]

# Extensions whose CRLF line endings are converted to LF
extensions = ["h", "cpp"]

[downgrade]
# Directory searched by `buildtidy downgrade`
root = ".."

# Suffix added to the stem of each converted copy: Foo.vcproj -> Foo.vc8.vcproj
marker = ".vc8"

# Directories that are never descended into
exclude_dirs = [".svn"]

# Each file kind can set its own extension, an output extension and a rule
# list. A rule list replaces the built-in table for that kind. Example:
#
# [downgrade.project]
# extension = "vcproj"
#
# [[downgrade.project.rules]]
# pattern = 'Version="9.00"'
# replacement = 'Version="8.00"'
#
# [[downgrade.project.rules]]
# pattern = '^\s*<?\w*FrameworkVersion\b.*\n?$'
# replacement = ''
# regex = true
#
# Run `buildtidy config --show` to print the built-in tables.

[logging]
# Write a debug log to ~/.buildtidy/buildtidy.log (default: false)
debug = false
"#
}

/// Save the default commented configuration file
pub fn save_default_config(config_path: &Path) -> Result<()> {
    fs::write(config_path, get_default_config_content())
        .with_context(|| format!("Failed to write default config file: {}", config_path.display()))?;

    Ok(())
}

/// Parse configuration text
pub fn parse_config(text: &str) -> Result<Config> {
    let config: Config = toml::from_str(text).context("Failed to parse configuration")?;
    Ok(config)
}

/// Load configuration
///
/// An explicit path must exist and parse. Without one, the default file is
/// used: if it doesn't exist it is created with defaults, and if it is
/// malformed it is recreated with defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    if let Some(path) = explicit {
        let config_str = fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!(error_helpers::io_error(path, "reading config file", &e))
        })?;
        return parse_config(&config_str)
            .with_context(|| format!("Invalid config file: {}", path.display()));
    }

    let config_path = config_file_path()?;

    // Create default config file if it doesn't exist
    if !config_path.exists() {
        save_default_config(&config_path)?;
    }

    let config_str = fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

    match parse_config(&config_str) {
        Ok(config) => Ok(config),
        Err(e) => {
            // Logging is not up yet; the config decides where it goes
            eprintln!(
                "Warning: {} is malformed ({:#}), restoring defaults",
                config_path.display(),
                e
            );
            save_default_config(&config_path)?;
            Ok(Config::default())
        }
    }
}

/// Serialize configuration, with built-in rule tables written out
pub fn render_config(config: &Config) -> Result<String> {
    let mut effective = config.clone();
    effective.downgrade = config.downgrade.with_resolved_rules();
    toml::to_string_pretty(&effective).context("Failed to serialize config")
}

fn validate_extension(what: &str, ext: &str) -> Result<()> {
    if ext.is_empty() || ext.contains(['.', '/', '\\']) {
        anyhow::bail!("Invalid {}: {:?} (must be non-empty, without dots or path separators)", what, ext);
    }
    Ok(())
}

/// Validate configuration values
pub fn validate_config(config: &Config) -> Result<()> {
    // Validate normalize settings
    if config.normalize.roots.is_empty() {
        anyhow::bail!("Invalid normalize.roots: at least one root directory is required");
    }
    if config.normalize.extensions.is_empty() {
        anyhow::bail!("Invalid normalize.extensions: at least one extension is required");
    }
    for ext in &config.normalize.extensions {
        validate_extension("normalize extension", ext)?;
    }

    // Validate downgrade settings
    let marker = &config.downgrade.marker;
    let marker_ok = marker.len() > 1
        && marker.starts_with('.')
        && marker
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if !marker_ok {
        anyhow::bail!(
            "Invalid marker: {:?} (must start with '.' and contain only letters, digits, '.', '_' or '-')",
            marker
        );
    }

    let mut seen = Vec::new();
    for kind in FileKind::ALL {
        let kind_config = config.downgrade.kind(kind);
        validate_extension("downgrade extension", &kind_config.extension)?;
        if let Some(output) = &kind_config.output_extension {
            validate_extension("downgrade output extension", output)?;
        }
        if seen.contains(&kind_config.extension) {
            anyhow::bail!(
                "Invalid downgrade extension: {:?} is used by more than one file kind",
                kind_config.extension
            );
        }
        seen.push(kind_config.extension.clone());
    }

    // Compiling checks every rule pattern
    Downgrader::new(&config.downgrade)?;

    Ok(())
}
