use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Provider-side payment intent handed back to the client for checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrderHandle {
    pub id: String,
    pub amount: u64,
    pub currency: String,
    pub receipt: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    pub amount: u64,
    pub currency: String,
    pub receipt: String,
    pub notes: OrderNotes,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderNotes {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderResponse {
    pub order: OrderHandle,
}

/// Settlement callback body. Only parsed once the signature has been checked.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub payload: WebhookPayload,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    pub payment: Option<EntityWrapper>,
    pub order: Option<EntityWrapper>,
}

#[derive(Debug, Deserialize)]
pub struct EntityWrapper {
    pub entity: WebhookEntity,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEntity {
    pub id: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default, deserialize_with = "notes_or_default")]
    pub notes: OrderNotes,
}

impl WebhookEvent {
    /// Identity tagged on the order at creation time.
    pub fn identity(&self) -> Option<&str> {
        [&self.payload.payment, &self.payload.order]
            .into_iter()
            .flatten()
            .find_map(|wrapper| {
                wrapper.entity.notes.email.as_deref().filter(|email| !email.is_empty())
            })
    }

    pub fn reference(&self) -> Option<&str> {
        self.payload
            .payment
            .as_ref()
            .and_then(|p| p.entity.order_id.as_deref().or(p.entity.id.as_deref()))
            .or_else(|| self.payload.order.as_ref().and_then(|o| o.entity.id.as_deref()))
    }
}

// The provider sends `notes: []` when no notes were attached.
fn notes_or_default<'de, D>(deserializer: D) -> Result<OrderNotes, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SettlementOutcome {
    /// Entitlement is now premium (possibly already was).
    Applied,
    /// Verified event that does not grant entitlement.
    Ignored,
    /// Verified grant naming an account that does not exist.
    UnknownAccount,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SettlementAck {
    pub outcome: SettlementOutcome,
}
