use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::{
    auth::{JwtService, WebhookVerifier},
    config::Config,
    errors::AppError,
    services::{
        Clock, CompletionProvider, EntitlementGate, MetricsService, PaymentProvider, QuotaTracker,
        SettlementService,
    },
    storage::Store,
};

pub mod auth;
pub mod chat;
pub mod payments;
pub mod health;
pub mod docs;
pub mod metrics;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub jwt: JwtService,
    pub quota: QuotaTracker,
    pub gate: EntitlementGate,
    pub completion: Arc<dyn CompletionProvider>,
    pub settlement: Arc<SettlementService>,
    pub metrics: Arc<MetricsService>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        completion: Arc<dyn CompletionProvider>,
        payments: Arc<dyn PaymentProvider>,
    ) -> anyhow::Result<Self> {
        let metrics = Arc::new(MetricsService::new()?);
        let jwt = JwtService::with_duration(
            &config.jwt_secret,
            chrono::Duration::days(config.session_ttl_days),
        );
        let quota = QuotaTracker::new(store.clone(), clock, config.daily_message_limit);
        let gate = EntitlementGate::new(store.clone(), quota.clone());
        let settlement = Arc::new(SettlementService::new(
            store.clone(),
            payments,
            WebhookVerifier::new(&config.razorpay_webhook_secret),
            config.premium_amount,
            &config.premium_currency,
            metrics.clone(),
        ));

        Ok(Self {
            config,
            store,
            jwt,
            quota,
            gate,
            completion,
            settlement,
            metrics,
        })
    }
}

/// `Json` extractor whose rejections use the error envelope.
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ValidJson(value))
    }
}
