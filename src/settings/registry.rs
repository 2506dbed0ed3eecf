//! Static table of every known setting.
//!
//! Lookup by external key (alias) or by the lowercase field name. The
//! `Settings` struct and this table must list the same fields.

use serde_json::Value;

/// Declared type of a setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Str,
    Int { min: i64, max: i64 },
    Bool,
    /// One of the listed variants, stored uppercase.
    Enum(&'static [&'static str]),
    /// Comma separated list of strings.
    List,
}

impl FieldKind {
    /// Tag written to the table store's `value_type` column.
    pub fn tag(&self) -> &'static str {
        match self {
            FieldKind::Str => "str",
            FieldKind::Int { .. } => "int",
            FieldKind::Bool => "bool",
            FieldKind::Enum(_) => "enum",
            FieldKind::List => "list",
        }
    }

    /// Coerce a raw value into its canonical stored text.
    pub fn coerce(&self, value: &Value) -> Result<String, String> {
        match self {
            FieldKind::Str => match value {
                Value::String(s) => Ok(s.clone()),
                Value::Number(n) => Ok(n.to_string()),
                Value::Bool(b) => Ok(b.to_string()),
                _ => Err("expected a string".to_string()),
            },
            FieldKind::Int { min, max } => {
                let parsed = match value {
                    Value::Number(n) => n.as_i64(),
                    Value::String(s) => s.trim().parse::<i64>().ok(),
                    _ => None,
                };
                let Some(n) = parsed else {
                    return Err("expected an integer".to_string());
                };
                if n < *min || n > *max {
                    return Err(format!("must be between {min} and {max}"));
                }
                Ok(n.to_string())
            }
            FieldKind::Bool => {
                let parsed = match value {
                    Value::Bool(b) => Some(*b),
                    Value::Number(n) => match n.as_i64() {
                        Some(0) => Some(false),
                        Some(1) => Some(true),
                        _ => None,
                    },
                    Value::String(s) => parse_bool(s),
                    _ => None,
                };
                parsed
                    .map(|b| b.to_string())
                    .ok_or_else(|| "expected a boolean".to_string())
            }
            FieldKind::Enum(variants) => {
                let Value::String(s) = value else {
                    return Err(format!("must be one of: {}", variants.join(", ")));
                };
                let upper = s.trim().to_ascii_uppercase();
                if variants.contains(&upper.as_str()) {
                    Ok(upper)
                } else {
                    Err(format!(
                        "invalid value '{}', must be one of: {}",
                        s,
                        variants.join(", ")
                    ))
                }
            }
            FieldKind::List => {
                let items: Vec<String> = match value {
                    Value::Array(items) => items
                        .iter()
                        .map(|item| match item {
                            Value::String(s) => Ok(s.trim().to_string()),
                            _ => Err("list items must be strings".to_string()),
                        })
                        .collect::<Result<_, _>>()?,
                    Value::String(s) => split_list(s)?,
                    _ => return Err("expected a list of strings".to_string()),
                };
                Ok(items
                    .into_iter()
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join(","))
            }
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Accepts `a,b,c` or a JSON array literal `["a","b"]`.
fn split_list(s: &str) -> Result<Vec<String>, String> {
    let trimmed = s.trim();
    if trimmed.starts_with('[') {
        let items: Vec<String> = serde_json::from_str(trimmed)
            .map_err(|e| format!("invalid list literal: {e}"))?;
        return Ok(items.into_iter().map(|s| s.trim().to_string()).collect());
    }
    Ok(trimmed.split(',').map(|s| s.trim().to_string()).collect())
}

/// Metadata for one known setting.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Key used in the store and the environment.
    pub alias: &'static str,
    /// Lowercase field name on `Settings`.
    pub name: &'static str,
    pub kind: FieldKind,
    pub default: &'static str,
    /// Redacted from read views.
    pub secret: bool,
    pub description: &'static str,
}

pub const LOG_LEVELS: &[&str] = &["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"];
pub const ROTATIONS: &[&str] = &["NEVER", "MINUTELY", "HOURLY", "DAILY"];
pub const JWT_ALGORITHMS: &[&str] = &["HS256", "HS384", "HS512"];

pub static FIELDS: &[FieldSpec] = &[
    FieldSpec {
        alias: "HOST",
        name: "host",
        kind: FieldKind::Str,
        default: "0.0.0.0",
        secret: false,
        description: "Listen address",
    },
    FieldSpec {
        alias: "PORT",
        name: "port",
        kind: FieldKind::Int { min: 1, max: 65535 },
        default: "8000",
        secret: false,
        description: "Listen port",
    },
    FieldSpec {
        alias: "RELOAD",
        name: "reload",
        kind: FieldKind::Bool,
        default: "false",
        secret: false,
        description: "Reload settings when the store file is edited",
    },
    FieldSpec {
        alias: "LOG_LEVEL",
        name: "log_level",
        kind: FieldKind::Enum(LOG_LEVELS),
        default: "INFO",
        secret: false,
        description: "Minimum log level",
    },
    FieldSpec {
        alias: "LOG_FILE_PATH",
        name: "log_file_path",
        kind: FieldKind::Str,
        default: "logs/application.log",
        secret: false,
        description: "Log file location",
    },
    FieldSpec {
        alias: "LOG_FILE_ROTATION",
        name: "log_file_rotation",
        kind: FieldKind::Enum(ROTATIONS),
        default: "DAILY",
        secret: false,
        description: "Log file rotation period",
    },
    FieldSpec {
        alias: "LOG_FILE_RETENTION",
        name: "log_file_retention",
        kind: FieldKind::Int { min: 1, max: 1000 },
        default: "7",
        secret: false,
        description: "Rotated log files to keep",
    },
    FieldSpec {
        alias: "LOG_FILE_COMPRESSION",
        name: "log_file_compression",
        kind: FieldKind::Str,
        default: "zip",
        secret: false,
        description: "Archive format for rotated log files (stored, not applied)",
    },
    FieldSpec {
        alias: "ADMIN_JWT_SECRET",
        name: "admin_jwt_secret",
        kind: FieldKind::Str,
        default: "change-me-admin",
        secret: true,
        description: "Signing secret for admin tokens",
    },
    FieldSpec {
        alias: "USER_JWT_SECRET",
        name: "user_jwt_secret",
        kind: FieldKind::Str,
        default: "change-me-user",
        secret: true,
        description: "Signing secret for user tokens",
    },
    FieldSpec {
        alias: "JWT_ALGORITHM",
        name: "jwt_algorithm",
        kind: FieldKind::Enum(JWT_ALGORITHMS),
        default: "HS256",
        secret: false,
        description: "Token signing algorithm",
    },
    FieldSpec {
        alias: "IMMUTABLE_KEYS",
        name: "immutable_keys",
        kind: FieldKind::List,
        default: "ADMIN_JWT_SECRET,USER_JWT_SECRET,IMMUTABLE_KEYS",
        secret: false,
        description: "Keys the admin API refuses to create or update",
    },
];

/// Resolve by alias first, then by lowercase field name.
pub fn lookup(key: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|f| f.alias == key).or_else(|| {
        let lower = key.to_lowercase();
        FIELDS.iter().find(|f| f.name == lower)
    })
}

pub fn by_alias(alias: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|f| f.alias == alias)
}

/// The stored spelling of `key`: a declared field's alias, otherwise `key`.
pub fn canonical_key(key: &str) -> String {
    match lookup(key) {
        Some(spec) => spec.alias.to_string(),
        None => key.to_string(),
    }
}
