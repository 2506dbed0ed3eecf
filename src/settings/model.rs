//! Typed settings snapshot.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;

use super::registry::{self, FieldSpec, FIELDS};
use super::validation::ValidationError;

/// Log level as accepted in `LOG_LEVEL`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            "CRITICAL" => Ok(LogLevel::Critical),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

/// Rotation period of the log file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Rotation {
    Never,
    Minutely,
    Hourly,
    #[default]
    Daily,
}

impl FromStr for Rotation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NEVER" => Ok(Rotation::Never),
            "MINUTELY" => Ok(Rotation::Minutely),
            "HOURLY" => Ok(Rotation::Hourly),
            "DAILY" => Ok(Rotation::Daily),
            other => Err(format!("unknown rotation '{other}'")),
        }
    }
}

/// HMAC algorithm used for bearer tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum JwtAlgorithm {
    #[default]
    HS256,
    HS384,
    HS512,
}

impl FromStr for JwtAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HS256" => Ok(JwtAlgorithm::HS256),
            "HS384" => Ok(JwtAlgorithm::HS384),
            "HS512" => Ok(JwtAlgorithm::HS512),
            other => Err(format!("unsupported algorithm '{other}'")),
        }
    }
}

/// Comma separated key roster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct KeyList(pub Vec<String>);

impl FromStr for KeyList {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(KeyList(
            s.split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect(),
        ))
    }
}

impl fmt::Display for KeyList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(","))
    }
}

/// Raw inputs a snapshot is built from.
///
/// Precedence: store, then environment, then declared defaults.
#[derive(Debug, Clone, Default)]
pub struct SettingsSources {
    pub env: BTreeMap<String, String>,
    pub store: BTreeMap<String, String>,
}

impl SettingsSources {
    /// Raw value for a field. Only the alias spelling is read.
    pub fn raw(&self, spec: &FieldSpec) -> Option<&str> {
        self.store
            .get(spec.alias)
            .or_else(|| self.env.get(spec.alias))
            .map(String::as_str)
    }
}

/// Capture the environment variables of every known field.
pub fn capture_env() -> BTreeMap<String, String> {
    FIELDS
        .iter()
        .filter_map(|f| std::env::var(f.alias).ok().map(|v| (f.alias.to_string(), v)))
        .collect()
}

/// All known configuration fields, fully typed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub reload: bool,
    pub log_level: LogLevel,
    pub log_file_path: String,
    pub log_file_rotation: Rotation,
    pub log_file_retention: usize,
    pub log_file_compression: String,
    pub admin_jwt_secret: String,
    pub user_jwt_secret: String,
    pub jwt_algorithm: JwtAlgorithm,
    pub immutable_keys: KeyList,
}

impl Default for Settings {
    /// Every field at its declared default.
    fn default() -> Self {
        match Self::from_sources(&SettingsSources::default()) {
            Ok(settings) => settings,
            // Declared defaults are covered by registry tests.
            Err(_) => Self {
                host: "0.0.0.0".to_string(),
                port: 8000,
                reload: false,
                log_level: LogLevel::Info,
                log_file_path: "logs/application.log".to_string(),
                log_file_rotation: Rotation::Daily,
                log_file_retention: 7,
                log_file_compression: "zip".to_string(),
                admin_jwt_secret: "change-me-admin".to_string(),
                user_jwt_secret: "change-me-user".to_string(),
                jwt_algorithm: JwtAlgorithm::HS256,
                immutable_keys: KeyList(vec![
                    "ADMIN_JWT_SECRET".to_string(),
                    "USER_JWT_SECRET".to_string(),
                    "IMMUTABLE_KEYS".to_string(),
                ]),
            },
        }
    }
}

struct FieldReader<'a> {
    sources: &'a SettingsSources,
    errors: Vec<ValidationError>,
}

impl FieldReader<'_> {
    fn read<T>(&mut self, alias: &str) -> T
    where
        T: FromStr + Default,
        T::Err: fmt::Display,
    {
        let Some(spec) = registry::by_alias(alias) else {
            self.errors.push(ValidationError::new(alias, "not a declared field"));
            return T::default();
        };
        let raw = self.sources.raw(spec).unwrap_or(spec.default);
        let parsed = spec
            .kind
            .coerce(&Value::String(raw.to_string()))
            .and_then(|canonical| canonical.parse::<T>().map_err(|e| e.to_string()));
        match parsed {
            Ok(value) => value,
            Err(reason) => {
                self.errors.push(ValidationError::new(spec.alias, reason));
                T::default()
            }
        }
    }
}

impl Settings {
    /// Build a snapshot, reporting every field that fails to parse.
    pub fn from_sources(sources: &SettingsSources) -> Result<Self, Vec<ValidationError>> {
        let mut reader = FieldReader {
            sources,
            errors: Vec::new(),
        };

        let settings = Settings {
            host: reader.read("HOST"),
            port: reader.read("PORT"),
            reload: reader.read("RELOAD"),
            log_level: reader.read("LOG_LEVEL"),
            log_file_path: reader.read("LOG_FILE_PATH"),
            log_file_rotation: reader.read("LOG_FILE_ROTATION"),
            log_file_retention: reader.read("LOG_FILE_RETENTION"),
            log_file_compression: reader.read("LOG_FILE_COMPRESSION"),
            admin_jwt_secret: reader.read("ADMIN_JWT_SECRET"),
            user_jwt_secret: reader.read("USER_JWT_SECRET"),
            jwt_algorithm: reader.read("JWT_ALGORITHM"),
            immutable_keys: reader.read("IMMUTABLE_KEYS"),
        };

        if reader.errors.is_empty() {
            Ok(settings)
        } else {
            Err(reader.errors)
        }
    }

    /// Build a snapshot, falling back to all defaults if any field is invalid.
    pub fn initialize(sources: &SettingsSources) -> Self {
        match Self::from_sources(sources) {
            Ok(settings) => settings,
            Err(errors) => {
                let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
                tracing::warn!(
                    errors = ?details,
                    "Invalid settings, falling back to declared defaults"
                );
                Self::default()
            }
        }
    }

    pub fn is_immutable(&self, key: &str) -> bool {
        self.immutable_keys.0.iter().any(|k| k == key)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Values by alias, with secrets redacted.
    pub fn to_values(&self) -> BTreeMap<String, Value> {
        let mut values = BTreeMap::new();
        for spec in FIELDS {
            let value = if spec.secret {
                Value::String(REDACTED.to_string())
            } else {
                self.value_of(spec.alias)
            };
            values.insert(spec.alias.to_string(), value);
        }
        values
    }

    fn value_of(&self, alias: &str) -> Value {
        match alias {
            "HOST" => Value::from(self.host.clone()),
            "PORT" => Value::from(self.port),
            "RELOAD" => Value::from(self.reload),
            "LOG_LEVEL" => serde_json::to_value(self.log_level).unwrap_or(Value::Null),
            "LOG_FILE_PATH" => Value::from(self.log_file_path.clone()),
            "LOG_FILE_ROTATION" => {
                serde_json::to_value(self.log_file_rotation).unwrap_or(Value::Null)
            }
            "LOG_FILE_RETENTION" => Value::from(self.log_file_retention),
            "LOG_FILE_COMPRESSION" => Value::from(self.log_file_compression.clone()),
            "ADMIN_JWT_SECRET" => Value::from(self.admin_jwt_secret.clone()),
            "USER_JWT_SECRET" => Value::from(self.user_jwt_secret.clone()),
            "JWT_ALGORITHM" => serde_json::to_value(self.jwt_algorithm).unwrap_or(Value::Null),
            "IMMUTABLE_KEYS" => Value::from(self.immutable_keys.0.clone()),
            _ => Value::Null,
        }
    }
}

pub const REDACTED: &str = "********";
