use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::{
    config::Config,
    errors::{AppError, Result},
    models::{OrderHandle, OrderRequest},
};

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_order(&self, request: &OrderRequest) -> Result<OrderHandle>;
}

/// Razorpay Orders API client.
pub struct RazorpayClient {
    client: Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayClient {
    pub fn new(base_url: &str, key_id: &str, key_secret: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            key_id: key_id.to_string(),
            key_secret: key_secret.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.razorpay_base_url,
            &config.razorpay_key_id,
            &config.razorpay_key_secret,
            Duration::from_secs(config.provider_timeout_secs),
        )
    }
}

#[async_trait]
impl PaymentProvider for RazorpayClient {
    async fn create_order(&self, request: &OrderRequest) -> Result<OrderHandle> {
        if self.key_id.is_empty() || self.key_secret.is_empty() {
            return Err(AppError::Provider("payment provider is not configured".to_string()));
        }

        let response = self
            .client
            .post(format!("{}/v1/orders", self.base_url))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Payment provider returned {}: {}", status, body);
            return Err(AppError::Provider(format!("payment provider returned {}", status)));
        }

        response
            .json::<OrderHandle>()
            .await
            .map_err(|e| AppError::Provider(format!("Failed to parse order: {}", e)))
    }
}
