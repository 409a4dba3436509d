use axum::{body::Bytes, extract::State, http::HeaderMap};

use crate::{
    auth::SIGNATURE_HEADER,
    errors::Result,
    handlers::AppState,
    middleware::AuthenticatedUser,
    models::{CreateOrderResponse, Envelope, SettlementAck},
};

#[utoipa::path(
    post,
    path = "/create-order",
    responses(
        (status = 200, description = "Payment intent for the premium upgrade", body = CreateOrderResponse),
        (status = 401, description = "Missing, invalid or expired credential"),
        (status = 502, description = "Payment provider failed")
    ),
    security(("bearer_auth" = [])),
    tag = "payments"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Envelope<CreateOrderResponse>> {
    let order = state.settlement.create_order(&user.identity).await?;
    Ok(Envelope::ok(CreateOrderResponse { order }))
}

/// Provider callback. The body is taken raw so the signature is checked over
/// the exact bytes that were signed.
#[utoipa::path(
    post,
    path = "/payment-webhook",
    request_body(content = String, description = "Signed provider event", content_type = "application/json"),
    params(("x-razorpay-signature" = String, Header, description = "Hex HMAC-SHA256 of the body")),
    responses(
        (status = 200, description = "Callback acknowledged", body = SettlementAck),
        (status = 400, description = "Signature missing or invalid")
    ),
    tag = "payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Envelope<SettlementAck>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let outcome = state.settlement.apply_settlement(&body, signature).await?;
    Ok(Envelope::ok(SettlementAck { outcome }))
}
