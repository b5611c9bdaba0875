//! Layered configuration loading.
//!
//! Layers, later ones winning:
//! 1. `appsettings.toml` in the content root (required)
//! 2. `appsettings.{environment}.toml` (optional)
//! 3. environment variables with `__` as the path separator,
//!    e.g. `ServiceConfigurationOptions__RequiredScopes__0=orders.read`

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use toml::{Table, Value};

use crate::config::validation::ValidationError;

const BASE_FILE: &str = "appsettings.toml";
const ENV_SEPARATOR: &str = "__";

/// Error type for configuration loading and binding.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("configuration section `{0}` is missing")]
    MissingSection(&'static str),

    #[error("configuration section `{section}` could not be bound: {source}")]
    Bind {
        section: &'static str,
        source: toml::de::Error,
    },

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

impl ConfigError {
    /// Short machine-readable kind, used as a telemetry property.
    pub fn kind(&self) -> &'static str {
        match self {
            ConfigError::Io { .. } => "io",
            ConfigError::Parse { .. } => "parse",
            ConfigError::MissingSection(_) => "missing_section",
            ConfigError::Bind { .. } => "bind",
            ConfigError::Validation(errors) => {
                if errors
                    .iter()
                    .all(|e| matches!(e, ValidationError::MissingField { .. }))
                {
                    "missing_field"
                } else {
                    "invalid_value"
                }
            }
        }
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Merged configuration tree for one environment.
///
/// Immutable once loaded; sections are bound on demand.
#[derive(Debug, Clone)]
pub struct ConfigurationSource {
    environment: String,
    root: Table,
    files: Vec<PathBuf>,
}

impl ConfigurationSource {
    /// Load the layered configuration using the process environment.
    pub fn load(content_root: &Path, environment: &str) -> Result<Self, ConfigError> {
        Self::load_with_env(content_root, environment, unicode_vars(std::env::vars_os()))
    }

    /// Load the layered configuration with an explicit set of variables.
    pub fn load_with_env<I>(content_root: &Path, environment: &str, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let base_path = content_root.join(BASE_FILE);
        let mut root = read_table(&base_path)?;
        let mut files = vec![base_path];

        let env_path = content_root.join(format!("appsettings.{}.toml", environment));
        if env_path.is_file() {
            merge_tables(&mut root, read_table(&env_path)?);
            files.push(env_path);
        } else {
            tracing::debug!(path = %env_path.display(), "No environment-specific configuration file");
        }

        apply_env_overrides(&mut root, vars);

        tracing::debug!(
            environment = %environment,
            files = ?files,
            "Configuration layers merged"
        );

        Ok(Self {
            environment: environment.to_string(),
            root,
            files,
        })
    }

    /// Build a source from a single TOML document.
    pub fn from_toml_str(environment: &str, content: &str) -> Result<Self, ConfigError> {
        let root = content.parse::<Table>().map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        Ok(Self {
            environment: environment.to_string(),
            root,
            files: Vec::new(),
        })
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Files that contributed to this configuration, in load order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Bind a required section.
    pub fn section<T: DeserializeOwned>(&self, name: &'static str) -> Result<T, ConfigError> {
        let value = self
            .root
            .get(name)
            .cloned()
            .ok_or(ConfigError::MissingSection(name))?;
        value
            .try_into::<T>()
            .map_err(|source| ConfigError::Bind { section: name, source })
    }

    /// Bind an optional section, falling back to its defaults.
    pub fn section_or_default<T: DeserializeOwned + Default>(
        &self,
        name: &'static str,
    ) -> Result<T, ConfigError> {
        match self.section(name) {
            Err(ConfigError::MissingSection(_)) => Ok(T::default()),
            other => other,
        }
    }
}

fn read_table(path: &Path) -> Result<Table, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    content.parse::<Table>().map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Keep the variables whose name and value are valid UTF-8.
fn unicode_vars<I>(vars: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
            (Ok(key), Ok(value)) => Some((key, value)),
            (key, _) => {
                tracing::debug!(
                    variable = ?key.map_or_else(|k| k.to_string_lossy().into_owned(), |k| k),
                    "Skipping environment variable that is not valid UTF-8"
                );
                None
            }
        })
        .collect()
}

/// Deep-merge `overlay` into `base`. Tables merge, everything else is replaced.
fn merge_tables(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(existing)), Value::Table(incoming)) => merge_tables(existing, incoming),
            (Some(slot), value) => *slot = value,
            (None, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn apply_env_overrides<I>(root: &mut Table, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, raw) in vars {
        if !key.contains(ENV_SEPARATOR) {
            continue;
        }
        let segments: Vec<&str> = key.split(ENV_SEPARATOR).collect();
        if segments.iter().any(|s| s.is_empty()) {
            continue;
        }
        if !set_in_table(root, &segments, &raw) {
            tracing::warn!(variable = %key, "Ignoring environment override that conflicts with configuration shape");
        }
    }
}

fn set_in_table(table: &mut Table, segments: &[&str], raw: &str) -> bool {
    let (head, rest) = match segments.split_first() {
        Some(split) => split,
        None => return false,
    };
    if rest.is_empty() {
        let value = coerce(table.get(*head), raw);
        table.insert((*head).to_string(), value);
        return true;
    }
    let child = table
        .entry((*head).to_string())
        .or_insert_with(|| empty_container(rest[0]));
    set_in_value(child, rest, raw)
}

fn set_in_value(value: &mut Value, segments: &[&str], raw: &str) -> bool {
    match value {
        Value::Table(table) => set_in_table(table, segments, raw),
        Value::Array(items) => {
            let (head, rest) = match segments.split_first() {
                Some(split) => split,
                None => return false,
            };
            let index: usize = match head.parse() {
                Ok(i) => i,
                Err(_) => return false,
            };
            if index > items.len() {
                return false;
            }
            if rest.is_empty() {
                let value = coerce(items.get(index), raw);
                if index == items.len() {
                    items.push(value);
                } else {
                    items[index] = value;
                }
                return true;
            }
            if index == items.len() {
                items.push(empty_container(rest[0]));
            }
            set_in_value(&mut items[index], rest, raw)
        }
        _ => false,
    }
}

fn empty_container(next_segment: &str) -> Value {
    if next_segment.parse::<usize>().is_ok() {
        Value::Array(Vec::new())
    } else {
        Value::Table(Table::new())
    }
}

/// Environment values are strings; follow the type already present at the
/// path, otherwise only boolean literals are converted.
fn coerce(existing: Option<&Value>, raw: &str) -> Value {
    match existing {
        Some(Value::Boolean(_)) | None if raw.eq_ignore_ascii_case("true") => Value::Boolean(true),
        Some(Value::Boolean(_)) | None if raw.eq_ignore_ascii_case("false") => Value::Boolean(false),
        Some(Value::Integer(_)) => raw
            .parse::<i64>()
            .map(Value::Integer)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        _ => Value::String(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{HostConfig, ServiceConfigurationOptions, SERVICE_SECTION};

    const BASE: &str = r#"
        [ServiceConfigurationOptions]
        RequiredScopes = ["orders.read"]
        ApiName = "orders"
        ApiSecret = "base-secret"
        Authority = "https://issuer.example"
        IsHttps = true

        [Host]
        RequestTimeoutSecs = 30
    "#;

    fn write_root(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(name), content).unwrap();
        }
        dir
    }

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_environment_file_overrides_base() {
        let dir = write_root(&[
            ("appsettings.toml", BASE),
            (
                "appsettings.Development.toml",
                "[ServiceConfigurationOptions]\nIsHttps = false\n",
            ),
        ]);
        let source = ConfigurationSource::load_with_env(dir.path(), "Development", vec![]).unwrap();
        let options: ServiceConfigurationOptions = source.section(SERVICE_SECTION).unwrap();

        assert!(!options.is_https);
        assert_eq!(options.api_name, "orders");
        assert_eq!(source.files().len(), 2);
    }

    #[test]
    fn test_missing_environment_file_is_optional() {
        let dir = write_root(&[("appsettings.toml", BASE)]);
        let source = ConfigurationSource::load_with_env(dir.path(), "Staging", vec![]).unwrap();
        assert_eq!(source.files().len(), 1);
        assert_eq!(source.environment(), "Staging");
    }

    #[test]
    fn test_missing_base_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigurationSource::load_with_env(dir.path(), "Production", vec![]).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert_eq!(err.kind(), "io");
    }

    #[test]
    fn test_env_overrides_follow_existing_types() {
        let dir = write_root(&[("appsettings.toml", BASE)]);
        let source = ConfigurationSource::load_with_env(
            dir.path(),
            "Production",
            vars(&[
                ("ServiceConfigurationOptions__IsHttps", "FALSE"),
                ("ServiceConfigurationOptions__ApiSecret", "12345"),
                ("ServiceConfigurationOptions__RequiredScopes__1", "orders.write"),
                ("Host__RequestTimeoutSecs", "5"),
                ("PATH", "/usr/bin"),
            ]),
        )
        .unwrap();

        let options: ServiceConfigurationOptions = source.section(SERVICE_SECTION).unwrap();
        assert!(!options.is_https);
        assert_eq!(options.api_secret.expose(), "12345");
        assert_eq!(options.required_scopes, vec!["orders.read", "orders.write"]);

        let host: HostConfig = source.section("Host").unwrap();
        assert_eq!(host.request_timeout_secs, 5);
    }

    #[test]
    fn test_env_can_create_sections() {
        let dir = write_root(&[("appsettings.toml", "")]);
        let source = ConfigurationSource::load_with_env(
            dir.path(),
            "Production",
            vars(&[
                ("Telemetry__InstrumentationKey", "ikey"),
                ("ServiceConfigurationOptions__RequiredScopes__0", "a"),
            ]),
        )
        .unwrap();

        let settings: crate::config::TelemetrySettings = source.section("Telemetry").unwrap();
        assert_eq!(settings.instrumentation_key.expose(), "ikey");

        let options: ServiceConfigurationOptions = source.section(SERVICE_SECTION).unwrap();
        assert_eq!(options.required_scopes, vec!["a"]);
    }

    #[test]
    fn test_sparse_array_index_is_ignored() {
        let mut root = Table::new();
        apply_env_overrides(&mut root, vars(&[("Section__List__3", "x")]));
        let list = root["Section"]["List"].as_array().unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn test_missing_and_malformed_sections_are_distinguished() {
        let source = ConfigurationSource::from_toml_str(
            "Production",
            "[ServiceConfigurationOptions]\nIsHttps = \"maybe\"\n",
        )
        .unwrap();

        let bind = source
            .section::<ServiceConfigurationOptions>(SERVICE_SECTION)
            .unwrap_err();
        assert_eq!(bind.kind(), "bind");

        let missing = source.section::<HostConfig>("Host").unwrap_err();
        assert!(matches!(missing, ConfigError::MissingSection("Host")));

        let host: HostConfig = source.section_or_default("Host").unwrap();
        assert_eq!(host.bind_address, HostConfig::default().bind_address);
    }

    #[test]
    fn test_parse_error_names_the_file() {
        let dir = write_root(&[("appsettings.toml", "[Telemetry\n")]);
        let err = ConfigurationSource::load_with_env(dir.path(), "Production", vec![]).unwrap_err();
        assert_eq!(err.kind(), "parse");
        assert!(err.to_string().contains("appsettings.toml"));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_unicode_variables_are_skipped() {
        use std::os::unix::ffi::OsStringExt;

        let vars = vec![
            (
                OsString::from("ServiceConfigurationOptions__ApiName"),
                OsString::from("billing"),
            ),
            (
                OsString::from("BROKEN_VALUE"),
                OsString::from_vec(vec![0xff, 0xfe]),
            ),
            (
                OsString::from_vec(vec![b'K', 0xff]),
                OsString::from("value"),
            ),
        ];

        let kept = unicode_vars(vars);
        assert_eq!(
            kept,
            vec![(
                "ServiceConfigurationOptions__ApiName".to_string(),
                "billing".to_string()
            )]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_load_survives_non_unicode_process_environment() {
        use std::os::unix::ffi::OsStrExt;

        let dir = write_root(&[("appsettings.toml", BASE)]);
        std::env::set_var(
            "API_BOOTSTRAP_LOADER_NON_UTF8",
            std::ffi::OsStr::from_bytes(&[0xff, 0xfe]),
        );

        let result = ConfigurationSource::load(dir.path(), "Production");
        std::env::remove_var("API_BOOTSTRAP_LOADER_NON_UTF8");

        let source = result.unwrap();
        let options: ServiceConfigurationOptions = source.section(SERVICE_SECTION).unwrap();
        assert_eq!(options.api_name, "orders");
    }
}
