use chrono::Utc;
use std::sync::Arc;

use crate::{
    auth::WebhookVerifier,
    errors::{AppError, Result},
    models::{OrderHandle, OrderNotes, OrderRequest, SettlementOutcome, WebhookEvent},
    services::{metrics::MetricsService, payments::PaymentProvider},
    storage::Store,
};

/// Provider events that confirm a completed payment.
const GRANT_EVENTS: &[&str] = &["payment.captured", "order.paid"];

pub struct SettlementService {
    store: Arc<dyn Store>,
    payments: Arc<dyn PaymentProvider>,
    verifier: WebhookVerifier,
    amount: u64,
    currency: String,
    metrics: Arc<MetricsService>,
}

impl SettlementService {
    pub fn new(
        store: Arc<dyn Store>,
        payments: Arc<dyn PaymentProvider>,
        verifier: WebhookVerifier,
        amount: u64,
        currency: &str,
        metrics: Arc<MetricsService>,
    ) -> Self {
        Self {
            store,
            payments,
            verifier,
            amount,
            currency: currency.to_string(),
            metrics,
        }
    }

    /// Opens a payment intent tagged with `identity`. Entitlement is not
    /// touched until the provider confirms payment.
    pub async fn create_order(&self, identity: &str) -> Result<OrderHandle> {
        let request = OrderRequest {
            amount: self.amount,
            currency: self.currency.clone(),
            receipt: format!("receipt_order_{}", Utc::now().timestamp_millis()),
            notes: OrderNotes {
                email: Some(identity.to_string()),
            },
        };

        let order = self.payments.create_order(&request).await?;
        tracing::info!(identity, order_id = %order.id, amount = order.amount, "Created order");
        Ok(order)
    }

    /// Verifies a provider callback against the raw body and, for payment
    /// confirmations, upgrades the tagged account. Safe to call repeatedly
    /// with the same callback.
    pub async fn apply_settlement(
        &self,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> Result<SettlementOutcome> {
        // Nothing in the body is trusted before this check.
        if let Err(e) = self.verifier.verify(raw_body, signature) {
            tracing::warn!("Rejected payment callback with invalid signature");
            self.metrics.record_invalid_signature();
            return Err(e);
        }

        let event: WebhookEvent = serde_json::from_slice(raw_body)
            .map_err(|e| AppError::Validation(format!("Malformed webhook payload: {}", e)))?;

        let outcome = self.apply_event(&event).await?;
        self.metrics.record_settlement(outcome);
        Ok(outcome)
    }

    async fn apply_event(&self, event: &WebhookEvent) -> Result<SettlementOutcome> {
        if !GRANT_EVENTS.contains(&event.event.as_str()) {
            tracing::info!(event = %event.event, "Ignoring payment event");
            return Ok(SettlementOutcome::Ignored);
        }

        let Some(identity) = event.identity() else {
            tracing::warn!(
                event = %event.event,
                reference = ?event.reference(),
                "Payment confirmation carries no account identity"
            );
            return Ok(SettlementOutcome::UnknownAccount);
        };

        match self.store.set_entitlement(identity, true).await {
            Ok(_) => {
                tracing::info!(identity, reference = ?event.reference(), "Premium entitlement granted");
                Ok(SettlementOutcome::Applied)
            }
            Err(AppError::NotFound(_)) => {
                tracing::warn!(identity, "Payment confirmation for unknown account");
                Ok(SettlementOutcome::UnknownAccount)
            }
            Err(e) => Err(e),
        }
    }
}
