//! Configuration resolution for the CLI.
//!
//! Settings come from an optional JSON file holding a
//! [`EvalConfig`](tripeval_core::EvalConfig), then command-line flags on top.
//!
//! File search order:
//! 1. `--config <FILE>`
//! 2. `$TRIPEVAL_CONFIG`
//! 3. `config.json` in the platform config directory
//! 4. Built-in defaults

use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use directories::ProjectDirs;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tripeval_core::alignment::OversizePolicy;
use tripeval_core::compare::{CountPenalty, TripOrder};
use tripeval_core::config::{ANALYSIS_TOLERANCE, DEFAULT_TOLERANCE};
use tripeval_core::EvalConfig;

/// Config file name inside the platform config directory
const CONFIG_FILENAME: &str = "config.json";

/// Environment variable naming a config file
const CONFIG_ENV: &str = "TRIPEVAL_CONFIG";

/// Where a config file was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Flag(PathBuf),
    Env(PathBuf),
    Platform(PathBuf),
    Defaults,
}

impl ConfigSource {
    fn path(&self) -> Option<&Path> {
        match self {
            ConfigSource::Flag(p) | ConfigSource::Env(p) | ConfigSource::Platform(p) => Some(p.as_path()),
            ConfigSource::Defaults => None,
        }
    }
}

/// Returns the platform config directory.
///
/// - macOS: `~/Library/Application Support/dev.tripeval.tripeval/`
/// - Linux: `~/.config/tripeval/`
/// - Windows: `%APPDATA%\tripeval\tripeval\config\`
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("dev", "tripeval", "tripeval").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Picks the config source from its candidates.
///
/// An explicit flag or environment path is used even if missing, so that
/// loading reports it. The platform file is only used if it exists.
pub fn resolve_source(
    flag: Option<&Path>,
    env: Option<OsString>,
    platform_dir: Option<PathBuf>,
) -> ConfigSource {
    if let Some(path) = flag {
        return ConfigSource::Flag(path.to_path_buf());
    }
    if let Some(value) = env.filter(|v| !v.is_empty()) {
        return ConfigSource::Env(PathBuf::from(value));
    }
    match platform_dir.map(|dir| dir.join(CONFIG_FILENAME)) {
        Some(path) if path.is_file() => ConfigSource::Platform(path),
        _ => ConfigSource::Defaults,
    }
}

/// Loads the effective config file, before flag overrides.
pub fn load_config(flag: Option<&Path>) -> Result<(EvalConfig, ConfigSource)> {
    let source = resolve_source(flag, std::env::var_os(CONFIG_ENV), config_dir());
    let config = match source.path() {
        Some(path) => read_config(path)?,
        None => EvalConfig::default(),
    };
    Ok((config, source))
}

fn read_config(path: &Path) -> Result<EvalConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: EvalConfig = serde_json::from_str(&text)
        .with_context(|| format!("Invalid config file: {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid config file: {}", path.display()))?;
    Ok(config)
}

// ============================================================================
// Flag overrides
// ============================================================================

/// `--order` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OrderArg {
    /// Align trips for the best match, ignoring order
    Optimal,
    /// Compare trip i with trip i
    Strict,
}

impl From<OrderArg> for TripOrder {
    fn from(arg: OrderArg) -> Self {
        match arg {
            OrderArg::Optimal => TripOrder::Optimal,
            OrderArg::Strict => TripOrder::Strict,
        }
    }
}

/// `--oversize` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OversizeArg {
    /// Fail on records above the exact alignment limit
    Reject,
    /// Align such records greedily
    Greedy,
}

impl From<OversizeArg> for OversizePolicy {
    fn from(arg: OversizeArg) -> Self {
        match arg {
            OversizeArg::Reject => OversizePolicy::Reject,
            OversizeArg::Greedy => OversizePolicy::Greedy,
        }
    }
}

/// Parses `--tolerance`: `lenient`, `exact` or a non-negative number.
pub fn parse_tolerance(value: &str) -> Result<f64, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "lenient" => Ok(DEFAULT_TOLERANCE),
        "exact" => Ok(ANALYSIS_TOLERANCE),
        other => match other.parse::<f64>() {
            Ok(t) if t.is_finite() && t >= 0.0 => Ok(t),
            _ => Err(format!(
                "expected 'lenient', 'exact' or a non-negative number, got '{}'",
                value
            )),
        },
    }
}

/// Command-line settings that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub tolerance: Option<f64>,
    pub order: Option<OrderArg>,
    pub oversize: Option<OversizeArg>,
    pub max_exact_trips: Option<usize>,
    pub missing_only: bool,
}

impl Overrides {
    /// Applies the flags. `--tolerance` sets the scoring tolerance, or the
    /// analysis tolerance when `analysis` is set.
    pub fn apply(&self, mut config: EvalConfig, analysis: bool) -> Result<EvalConfig> {
        if let Some(t) = self.tolerance {
            if analysis {
                config.analysis_tolerance = t;
            } else {
                config.tolerance = t;
            }
        }
        if let Some(order) = self.order {
            config.trip_order = order.into();
        }
        if let Some(oversize) = self.oversize {
            config.oversize = oversize.into();
        }
        if let Some(max) = self.max_exact_trips {
            config.max_exact_trips = max;
        }
        if self.missing_only {
            config.count_penalty = CountPenalty::MissingOnly;
        }
        config
            .validate()
            .map_err(|e| anyhow!("Invalid command-line settings: {}", e))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_source_precedence() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME), "{}").unwrap();
        let flag = PathBuf::from("/tmp/flag.json");

        assert_eq!(
            resolve_source(Some(flag.as_path()), Some("env.json".into()), Some(dir.path().to_path_buf())),
            ConfigSource::Flag(flag.clone())
        );
        assert_eq!(
            resolve_source(None, Some("env.json".into()), Some(dir.path().to_path_buf())),
            ConfigSource::Env(PathBuf::from("env.json"))
        );
        assert_eq!(
            resolve_source(None, Some(OsString::new()), Some(dir.path().to_path_buf())),
            ConfigSource::Platform(dir.path().join(CONFIG_FILENAME))
        );
    }

    #[test]
    fn test_missing_platform_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            resolve_source(None, None, Some(dir.path().to_path_buf())),
            ConfigSource::Defaults
        );
        assert_eq!(resolve_source(None, None, None), ConfigSource::Defaults);
    }

    #[test]
    fn test_read_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("eval.json");
        std::fs::write(&path, r#"{"trip_order": "strict", "tolerance": 0.05}"#).unwrap();

        let config = read_config(&path).unwrap();
        assert_eq!(config.trip_order, TripOrder::Strict);
        assert_eq!(config.tolerance, 0.05);
        assert_eq!(config.max_exact_trips, EvalConfig::default().max_exact_trips);
    }

    #[test]
    fn test_read_config_errors_name_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"max_exact_trips": 64}"#).unwrap();
        let err = format!("{:#}", read_config(&path).unwrap_err());
        assert!(err.contains("bad.json"), "{}", err);

        assert!(read_config(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_parse_tolerance() {
        assert_eq!(parse_tolerance("lenient"), Ok(DEFAULT_TOLERANCE));
        assert_eq!(parse_tolerance("EXACT"), Ok(0.0));
        assert_eq!(parse_tolerance("0.5"), Ok(0.5));
        assert!(parse_tolerance("-1").is_err());
        assert!(parse_tolerance("loose").is_err());
        assert!(parse_tolerance("NaN").is_err());
    }

    #[test]
    fn test_overrides() {
        let overrides = Overrides {
            tolerance: Some(0.1),
            order: Some(OrderArg::Strict),
            oversize: Some(OversizeArg::Greedy),
            max_exact_trips: Some(8),
            missing_only: true,
        };

        let scoring = overrides.apply(EvalConfig::default(), false).unwrap();
        assert_eq!(scoring.tolerance, 0.1);
        assert_eq!(scoring.analysis_tolerance, ANALYSIS_TOLERANCE);
        assert_eq!(scoring.trip_order, TripOrder::Strict);
        assert_eq!(scoring.oversize, OversizePolicy::Greedy);
        assert_eq!(scoring.max_exact_trips, 8);
        assert_eq!(scoring.count_penalty, CountPenalty::MissingOnly);

        let analysis = overrides.apply(EvalConfig::default(), true).unwrap();
        assert_eq!(analysis.tolerance, DEFAULT_TOLERANCE);
        assert_eq!(analysis.analysis_tolerance, 0.1);
    }

    #[test]
    fn test_overrides_are_validated() {
        let overrides = Overrides {
            max_exact_trips: Some(1000),
            ..Default::default()
        };
        assert!(overrides.apply(EvalConfig::default(), false).is_err());
    }
}
