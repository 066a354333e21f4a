//! Application configuration loading for CLI defaults.
//!
//! The file is optional. Values given on the command line win over the
//! file, and the file wins over built-in defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::cli::{CliValueSources, ScrapeArgs};

/// Record store used when neither the command line nor the file names one.
pub const DEFAULT_DATA_DIR: &str = "output";

/// Listing directory used when neither the command line nor the file names one.
pub const DEFAULT_INPUT_DIR: &str = "data";

const APP_DIR: &str = "harvester";
const MAX_RETRIES_LIMIT: u64 = 10;

/// File configuration for harvester defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileConfig {
    /// Default record store directory.
    pub data_dir: Option<PathBuf>,
    /// Default CSV listing directory.
    pub input_dir: Option<PathBuf>,
    /// Default site root of the question endpoint.
    pub base_url: Option<String>,
    /// Default lower delay bound in seconds.
    pub delay_min: Option<f64>,
    /// Default upper delay bound in seconds.
    pub delay_max: Option<f64>,
    /// Default retry budget.
    pub max_retries: Option<u8>,
}

impl FileConfig {
    /// Validates config values against CLI constraints.
    pub fn validate(&self) -> Result<()> {
        validate_delay("delay_min", self.delay_min)?;
        validate_delay("delay_max", self.delay_max)?;
        if let (Some(min), Some(max)) = (self.delay_min, self.delay_max)
            && min > max
        {
            bail!("Invalid config: `delay_min` ({min}) is greater than `delay_max` ({max})");
        }
        if let Some(base_url) = &self.base_url
            && url::Url::parse(base_url).is_err()
        {
            bail!("Invalid config value for `base_url`: '{base_url}' is not an absolute URL");
        }
        Ok(())
    }
}

fn validate_delay(field: &str, value: Option<f64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !value.is_finite() || value < 0.0 {
        bail!("Invalid config value for `{field}`: {value}. Expected a non-negative number of seconds");
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/harvester/config.toml`
/// 2. `$HOME/.config/harvester/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join(APP_DIR).join("config.toml"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from the default path if present.
pub fn load_default_file_config() -> Result<LoadedConfig> {
    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(path_ref) if path_ref.exists() => Some(load_file_config(path_ref)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_number = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_number}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();

        match key {
            "data_dir" => {
                let parsed = parse_string_literal(value).with_context(|| {
                    format!("Invalid `data_dir` value on line {line_number}")
                })?;
                cfg.data_dir = Some(PathBuf::from(parsed));
            }
            "input_dir" => {
                let parsed = parse_string_literal(value).with_context(|| {
                    format!("Invalid `input_dir` value on line {line_number}")
                })?;
                cfg.input_dir = Some(PathBuf::from(parsed));
            }
            "base_url" => {
                let parsed = parse_string_literal(value).with_context(|| {
                    format!("Invalid `base_url` value on line {line_number}")
                })?;
                cfg.base_url = Some(parsed);
            }
            "delay_min" => {
                let parsed = parse_float(value).with_context(|| {
                    format!("Invalid `delay_min` value on line {line_number}")
                })?;
                cfg.delay_min = Some(parsed);
            }
            "delay_max" => {
                let parsed = parse_float(value).with_context(|| {
                    format!("Invalid `delay_max` value on line {line_number}")
                })?;
                cfg.delay_max = Some(parsed);
            }
            "max_retries" => {
                let parsed = parse_integer_u64(value).with_context(|| {
                    format!("Invalid `max_retries` value on line {line_number}")
                })?;
                if parsed > MAX_RETRIES_LIMIT {
                    bail!(
                        "Invalid config value for `max_retries` on line {line_number}: {parsed}. Expected range: 0..=10"
                    );
                }
                cfg.max_retries = u8::try_from(parsed).ok();
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_number}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_float(raw_value: &str) -> Result<f64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected number");
    }
    Ok(token.parse::<f64>()?)
}

/// Fills scrape options that were not given on the command line from the file.
pub fn apply_config_defaults(
    mut args: ScrapeArgs,
    cli_sources: &CliValueSources,
    file_config: Option<&FileConfig>,
) -> ScrapeArgs {
    let Some(file_config) = file_config else {
        return args;
    };

    if args.input_dir.is_none()
        && let Some(input_dir) = &file_config.input_dir
    {
        args.input_dir = Some(input_dir.clone());
    }

    if args.base_url.is_none()
        && let Some(base_url) = &file_config.base_url
    {
        args.base_url = Some(base_url.clone());
    }

    if !cli_sources.delay_min
        && let Some(delay_min) = file_config.delay_min
    {
        args.delay_min = delay_min;
    }

    if !cli_sources.delay_max
        && let Some(delay_max) = file_config.delay_max
    {
        args.delay_max = delay_max;
    }

    if !cli_sources.max_retries
        && let Some(max_retries) = file_config.max_retries
    {
        args.max_retries = max_retries;
    }

    args
}

/// Resolves the record store directory: command line, then file, then default.
#[must_use]
pub fn resolve_data_dir(cli_value: Option<&Path>, file_config: Option<&FileConfig>) -> PathBuf {
    cli_value
        .map(Path::to_path_buf)
        .or_else(|| file_config.and_then(|cfg| cfg.data_dir.clone()))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}
