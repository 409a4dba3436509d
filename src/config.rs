use anyhow::{bail, Result};
use serde::Deserialize;
use std::env;

use crate::services::DEFAULT_DAILY_LIMIT;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub db_path: String,
    pub jwt_secret: String,
    pub session_ttl_days: i64,
    pub bcrypt_cost: u32,
    pub daily_message_limit: u32,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_model: String,
    pub razorpay_key_id: String,
    pub razorpay_key_secret: String,
    pub razorpay_webhook_secret: String,
    pub razorpay_base_url: String,
    pub premium_amount: u64,
    pub premium_currency: String,
    pub provider_timeout_secs: u64,
    pub frontend_url: String,
    pub max_body_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            port: env::var("PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()?,
            db_path: env::var("DB_PATH")
                .unwrap_or_else(|_| "./db.json".to_string()),
            jwt_secret: required_secret("JWT_SECRET", env::var("JWT_SECRET").ok())?,
            session_ttl_days: env::var("SESSION_TTL_DAYS")
                .unwrap_or_else(|_| "7".to_string())
                .parse()?,
            bcrypt_cost: env::var("BCRYPT_COST")
                .unwrap_or_else(|_| bcrypt::DEFAULT_COST.to_string())
                .parse()?,
            daily_message_limit: env::var("DAILY_MESSAGE_LIMIT")
                .unwrap_or_else(|_| DEFAULT_DAILY_LIMIT.to_string())
                .parse()?,
            openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_default(),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com".to_string()),
            openai_model: env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| "gpt-4.1".to_string()),
            razorpay_key_id: env::var("RAZORPAY_KEY_ID").unwrap_or_default(),
            razorpay_key_secret: env::var("RAZORPAY_KEY_SECRET").unwrap_or_default(),
            razorpay_webhook_secret: env::var("RAZORPAY_WEBHOOK_SECRET").unwrap_or_default(),
            razorpay_base_url: env::var("RAZORPAY_BASE_URL")
                .unwrap_or_else(|_| "https://api.razorpay.com".to_string()),
            premium_amount: env::var("PREMIUM_AMOUNT")
                .unwrap_or_else(|_| "9900".to_string()) // ₹99 in paise
                .parse()?,
            premium_currency: env::var("PREMIUM_CURRENCY")
                .unwrap_or_else(|_| "INR".to_string()),
            provider_timeout_secs: env::var("PROVIDER_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            max_body_bytes: env::var("MAX_BODY_BYTES")
                .unwrap_or_else(|_| "15728640".to_string()) // 15MB
                .parse()?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            db_path: "./db.json".to_string(),
            jwt_secret: "test-only-secret".to_string(),
            session_ttl_days: 7,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            daily_message_limit: DEFAULT_DAILY_LIMIT,
            openai_api_key: String::new(),
            openai_base_url: "https://api.openai.com".to_string(),
            openai_model: "gpt-4.1".to_string(),
            razorpay_key_id: String::new(),
            razorpay_key_secret: String::new(),
            razorpay_webhook_secret: String::new(),
            razorpay_base_url: "https://api.razorpay.com".to_string(),
            premium_amount: 9900,
            premium_currency: "INR".to_string(),
            provider_timeout_secs: 30,
            frontend_url: "http://localhost:3000".to_string(),
            max_body_bytes: 15 * 1024 * 1024,
        }
    }
}

/// Signing secrets have no usable default; a known key would let anyone mint
/// sessions.
fn required_secret(name: &str, value: Option<String>) -> Result<String> {
    match value {
        Some(secret) if !secret.trim().is_empty() => Ok(secret),
        _ => bail!("{} must be set to a non-empty value", name),
    }
}
