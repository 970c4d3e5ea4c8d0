/// Configuration system for logtail.
///
/// Provides a layered configuration hierarchy:
///
/// 1. **Built-in defaults** from [`schema::LogtailConfig::default()`]
/// 2. **User global config** at `~/.logtail/config.toml`
/// 3. **Project local config** at `.logtail.toml` in the current directory
/// 4. **Environment variables**, the `LOGTAIL_*` overrides
///
/// Command-line flags are applied on top by the caller.
///
/// Layers are merged key by key: a file that sets only `tail.file` leaves
/// every other value from the layers below untouched.
///
/// # Usage
///
/// ```rust,ignore
/// use logtail::config;
///
/// let cfg = config::load();
/// let session = TailSession::new(cfg.session_options());
/// ```
pub mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

use crate::classifier::ClassifierMode;
pub use schema::LogtailConfig;

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the fully resolved configuration from the standard locations and
/// the process environment.
pub fn load() -> LogtailConfig {
    load_from(
        global_config_path().as_deref(),
        project_config_path().as_deref(),
        |key| std::env::var(key).ok(),
    )
}

/// Load configuration from explicit file locations and an environment
/// lookup. Missing files are skipped; malformed files are skipped with a
/// warning.
pub fn load_from(
    global: Option<&Path>,
    project: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> LogtailConfig {
    let mut merged = toml::Value::Table(toml::map::Map::new());

    for path in [global, project].into_iter().flatten() {
        if let Some(layer) = load_toml_file(path) {
            merge_values(&mut merged, layer);
        }
    }

    let mut config: LogtailConfig = match merged.try_into() {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "config layers do not fit the schema, using defaults");
            LogtailConfig::default()
        }
    };

    apply_env_overrides(&mut config, env);
    config
}

/// Read one TOML layer. Returns `None` if the file doesn't exist, cannot be
/// parsed, or holds a value the schema rejects. A bad layer never spoils the
/// others.
fn load_toml_file(path: &Path) -> Option<toml::Value> {
    let content = fs::read_to_string(path).ok()?;
    let value: toml::Value = match toml::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring malformed config file");
            return None;
        }
    };
    if let Err(e) = value.clone().try_into::<LogtailConfig>() {
        warn!(path = %path.display(), error = %e, "ignoring config file that does not fit the schema");
        return None;
    }
    Some(value)
}

/// Recursively merge `overlay` into `base`. Tables merge key by key; any
/// other value in the overlay replaces the base value.
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

// ---------------------------------------------------------------------------
// File paths
// ---------------------------------------------------------------------------

/// `~/.logtail`, home of the global config and the diagnostic log.
pub fn logtail_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".logtail"))
}

fn global_config_path() -> Option<PathBuf> {
    logtail_dir().map(|dir| dir.join("config.toml"))
}

fn project_config_path() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .map(|cwd| cwd.join(".logtail.toml"))
}

/// Return the path to the global config file for display/init purposes.
pub fn global_config_file() -> Option<PathBuf> {
    global_config_path()
}

/// Return the path to the project config file for display purposes.
pub fn project_config_file() -> Option<PathBuf> {
    project_config_path()
}

/// Expand a leading `~/` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides.
///
/// Supported variables:
/// - `LOGTAIL_URL` — websocket endpoint
/// - `LOGTAIL_FILE` — log file to open on start
/// - `LOGTAIL_AMOUNT` — amount with unit, e.g. `512kb`
/// - `LOGTAIL_FOLLOW` — follow mode (`1`/`true`/`yes`/`on`)
/// - `LOGTAIL_CLASSIFIER` — `error-only` or `multi-level`
/// - `LOGTAIL_LOG` — diagnostic log level
fn apply_env_overrides(config: &mut LogtailConfig, env: impl Fn(&str) -> Option<String>) {
    if let Some(val) = env("LOGTAIL_URL")
        && !val.is_empty()
    {
        config.connection.url = val;
    }
    if let Some(val) = env("LOGTAIL_FILE")
        && !val.is_empty()
    {
        config.tail.file = val;
    }
    if let Some(val) = env("LOGTAIL_AMOUNT") {
        match val.parse::<crate::connection::protocol::Amount>() {
            Ok(amount) => {
                config.tail.amount = amount.value;
                config.tail.unit = amount.unit;
            }
            Err(e) => warn!(value = %val, error = %e, "ignoring LOGTAIL_AMOUNT"),
        }
    }
    if let Some(val) = env("LOGTAIL_FOLLOW") {
        config.tail.follow = is_truthy(&val);
    }
    if let Some(val) = env("LOGTAIL_CLASSIFIER")
        && let Some(mode) = parse_classifier(&val)
    {
        config.tail.classifier = mode;
    }
    if let Some(val) = env("LOGTAIL_LOG")
        && !val.is_empty()
    {
        config.logging.level = val;
    }
}

/// Check if a string value represents a truthy boolean.
fn is_truthy(val: &str) -> bool {
    matches!(
        val.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_classifier(val: &str) -> Option<ClassifierMode> {
    match val.to_ascii_lowercase().as_str() {
        "error-only" | "error_only" | "error" => Some(ClassifierMode::ErrorOnly),
        "multi-level" | "multi_level" | "multi" => Some(ClassifierMode::MultiLevel),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Config init / set / reset
// ---------------------------------------------------------------------------

/// Write the default annotated config to `~/.logtail/config.toml`.
pub fn init_config(force: bool) -> Result<PathBuf> {
    let path = global_config_path().context("could not determine home directory")?;
    init_config_at(&path, force)?;
    Ok(path)
}

/// Write the default annotated config to `path`. Fails if the file exists
/// unless `force` is set.
pub fn init_config_at(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create config directory")?;
    }
    fs::write(path, LogtailConfig::default_toml()).context("failed to write config file")?;
    Ok(())
}

/// Set a single config key in the global config file.
pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let path = global_config_path().context("could not determine home directory")?;
    set_config_value_at(&path, key, value)
}

/// Set a dotted `key` (e.g. `tail.follow`) in the file at `path`, creating
/// it from the defaults if missing. The value is parsed to the type of the
/// value it replaces, and the result must still fit the schema.
pub fn set_config_value_at(path: &Path, key: &str, value: &str) -> Result<()> {
    let mut root: toml::Value = if path.exists() {
        let content = fs::read_to_string(path).context("failed to read config file")?;
        toml::from_str(&content).context("failed to parse config as TOML value")?
    } else {
        toml::Value::try_from(LogtailConfig::default())
            .context("failed to serialize default config")?
    };

    set_toml_value(&mut root, key, value)?;

    // Reject values the schema cannot read back, such as an unknown unit.
    root.clone()
        .try_into::<LogtailConfig>()
        .with_context(|| format!("invalid value '{value}' for '{key}'"))?;

    let output = toml::to_string_pretty(&root).context("failed to serialize updated config")?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create config directory")?;
    }
    fs::write(path, output).context("failed to write config file")?;
    Ok(())
}

/// Set a value in a TOML value tree using a dotted key path.
///
/// Sections missing from a sparse file are created; the leaf type comes
/// from the existing value or, failing that, from the defaults.
fn set_toml_value(root: &mut toml::Value, key: &str, raw_value: &str) -> Result<()> {
    let (section, leaf) = key
        .split_once('.')
        .with_context(|| format!("config key must be 'section.key', got '{key}'"))?;

    let defaults =
        toml::Value::try_from(LogtailConfig::default()).context("failed to serialize defaults")?;
    let template = defaults
        .get(section)
        .and_then(|s| s.get(leaf))
        .with_context(|| format!("unknown config key '{key}'"))?;

    let table = root
        .as_table_mut()
        .context("config root is not a table")?
        .entry(section.to_string())
        .or_insert_with(|| toml::Value::Table(toml::map::Map::new()))
        .as_table_mut()
        .with_context(|| format!("expected table at '{section}'"))?;

    let existing = table.get(leaf).unwrap_or(template);
    let new_value = match existing {
        toml::Value::Boolean(_) => toml::Value::Boolean(is_truthy(raw_value)),
        toml::Value::Integer(_) => {
            let n: i64 = raw_value
                .parse()
                .with_context(|| format!("expected integer for '{key}', got '{raw_value}'"))?;
            toml::Value::Integer(n)
        }
        toml::Value::Float(_) => {
            let f: f64 = raw_value
                .parse()
                .with_context(|| format!("expected number for '{key}', got '{raw_value}'"))?;
            toml::Value::Float(f)
        }
        _ => toml::Value::String(raw_value.to_string()),
    };

    table.insert(leaf.to_string(), new_value);
    Ok(())
}

/// Reset the global config to defaults (overwrite the file).
pub fn reset_config() -> Result<PathBuf> {
    init_config(true)
}

/// Show the effective (fully resolved) config as TOML.
pub fn show_effective_config() -> Result<String> {
    toml::to_string_pretty(&load()).context("failed to serialize effective config")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
