use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A registered account. Field names follow the on-disk `users` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "email")]
    pub identity: String,
    #[serde(rename = "password")]
    pub credential_hash: String,
    pub premium: bool,
    #[serde(rename = "createdAt", with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(identity: &str, credential_hash: &str) -> Self {
        Self {
            identity: identity.to_string(),
            credential_hash: credential_hash.to_string(),
            premium: false,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Entitlement {
    Free,
    Premium,
}

impl From<&Account> for Entitlement {
    fn from(account: &Account) -> Self {
        if account.premium {
            Entitlement::Premium
        } else {
            Entitlement::Free
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub email: String,
    pub premium: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub premium: bool,
}
