//! Bearer token issuing and verification.
//!
//! Two HMAC secrets exist, one per role. A token is checked against the admin
//! secret first, then the user secret. The capability granted is the lower of
//! the key's role and the `role` claim, so a token signed with the user secret
//! never acts as admin whatever its payload says.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

use crate::settings::model::{JwtAlgorithm, Settings};

/// Capability level. `Admin` satisfies every `User` requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn satisfies(&self, required: Role) -> bool {
        *self >= required
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

/// A verified caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub role: Role,
    /// Role of the secret that verified the signature.
    pub verified_with: Role,
    pub subject: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingCredentials,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token has expired")]
    Expired,
    #[error("Insufficient permissions")]
    Insufficient,
}

fn algorithm(alg: JwtAlgorithm) -> Algorithm {
    match alg {
        JwtAlgorithm::HS256 => Algorithm::HS256,
        JwtAlgorithm::HS384 => Algorithm::HS384,
        JwtAlgorithm::HS512 => Algorithm::HS512,
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn secret_for(settings: &Settings, role: Role) -> &str {
    match role {
        Role::Admin => &settings.admin_jwt_secret,
        Role::User => &settings.user_jwt_secret,
    }
}

/// Sign a token for `role` with that role's secret.
pub fn issue_token(
    settings: &Settings,
    role: Role,
    subject: Option<&str>,
    expires_in_secs: Option<u64>,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = now_secs();
    let claims = Claims {
        role: Some(role.as_str().to_string()),
        sub: subject.map(str::to_string),
        iat: Some(now),
        exp: expires_in_secs.map(|secs| now + secs),
    };
    encode(
        &Header::new(algorithm(settings.jwt_algorithm)),
        &claims,
        &EncodingKey::from_secret(secret_for(settings, role).as_bytes()),
    )
}

enum Attempt {
    Verified(Claims),
    Expired,
    Rejected,
}

fn try_secret(token: &str, secret: &str, alg: Algorithm) -> Attempt {
    let mut validation = Validation::new(alg);
    validation.required_spec_claims.clear();
    validation.leeway = 0;

    match decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation) {
        Ok(data) => Attempt::Verified(data.claims),
        Err(e) if matches!(e.kind(), ErrorKind::ExpiredSignature) => Attempt::Expired,
        Err(_) => Attempt::Rejected,
    }
}

/// Verify a bearer token against the current settings.
pub fn verify_token(settings: &Settings, token: &str) -> Result<Principal, AuthError> {
    let alg = algorithm(settings.jwt_algorithm);

    for key_role in [Role::Admin, Role::User] {
        match try_secret(token, secret_for(settings, key_role), alg) {
            Attempt::Verified(claims) => {
                let claimed = match claims.role.as_deref() {
                    Some(role) => role.parse::<Role>().map_err(|_| AuthError::InvalidToken)?,
                    None => key_role,
                };
                return Ok(Principal {
                    role: claimed.min(key_role),
                    verified_with: key_role,
                    subject: claims.sub,
                });
            }
            Attempt::Expired => return Err(AuthError::Expired),
            Attempt::Rejected => continue,
        }
    }
    Err(AuthError::InvalidToken)
}

/// Verify and require at least `required`.
pub fn authorize(settings: &Settings, token: &str, required: Role) -> Result<Principal, AuthError> {
    let principal = verify_token(settings, token)?;
    if principal.role.satisfies(required) {
        Ok(principal)
    } else {
        Err(AuthError::Insufficient)
    }
}
