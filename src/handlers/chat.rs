use axum::extract::State;
use chrono::Utc;

use crate::{
    errors::{AppError, Result},
    handlers::{AppState, ValidJson},
    middleware::AuthenticatedUser,
    models::{
        ChatHistoryResponse, ChatRequest, ChatResponse, ChatTurn, DailyCountResponse, Envelope,
    },
};

#[utoipa::path(
    post,
    path = "/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Assistant reply", body = ChatResponse),
        (status = 429, description = "Free daily limit reached"),
        (status = 401, description = "Missing, invalid or expired credential"),
        (status = 502, description = "Completion provider failed")
    ),
    security(("bearer_auth" = [])),
    tag = "chat"
)]
pub async fn chat(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ValidJson(request): ValidJson<ChatRequest>,
) -> Result<Envelope<ChatResponse>> {
    if request.message.trim().is_empty() {
        return Err(AppError::Validation("Message is required".to_string()));
    }

    let admission = match state.gate.admit(&user.identity).await {
        Ok(admission) => admission,
        Err(e @ AppError::LimitReached(_)) => {
            state.metrics.record_quota_denial();
            return Err(e);
        }
        Err(e) => return Err(e),
    };
    let entitlement = admission.entitlement();

    // Quota is only spent once the reply has been produced and stored.
    let reply = state.completion.complete(&request.message).await?;

    state
        .store
        .append_chat(ChatTurn {
            email: user.identity.clone(),
            message: request.message,
            reply: reply.clone(),
            timestamp: Utc::now(),
        })
        .await?;

    // The turn is already in the history; failing here would hand the client
    // an error for a reply it can see in `/chats`.
    match admission.commit().await {
        Ok(count) => {
            tracing::debug!(identity = %user.identity, ?entitlement, ?count, "Chat turn completed");
        }
        Err(e) => {
            tracing::error!(identity = %user.identity, "Failed to record quota usage: {}", e);
        }
    }
    state.metrics.record_chat_turn(entitlement);

    Ok(Envelope::ok(ChatResponse { reply }))
}

#[utoipa::path(
    get,
    path = "/chats",
    responses(
        (status = 200, description = "Chat history, oldest first", body = ChatHistoryResponse),
        (status = 401, description = "Missing, invalid or expired credential")
    ),
    security(("bearer_auth" = [])),
    tag = "chat"
)]
pub async fn list_chats(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Envelope<ChatHistoryResponse>> {
    let chats = state.store.list_chats(&user.identity).await?;
    Ok(Envelope::ok(ChatHistoryResponse { chats }))
}

#[utoipa::path(
    get,
    path = "/count",
    responses(
        (status = 200, description = "Messages used today", body = DailyCountResponse),
        (status = 401, description = "Missing, invalid or expired credential")
    ),
    security(("bearer_auth" = [])),
    tag = "chat"
)]
pub async fn daily_count(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Envelope<DailyCountResponse>> {
    let account = state
        .store
        .find_account(&user.identity)
        .await?
        .ok_or_else(|| AppError::NotFound(user.identity.clone()))?;

    let count = state.quota.count(&user.identity).await?;
    let limit = state.quota.limit();

    Ok(Envelope::ok(DailyCountResponse {
        count,
        limit,
        remaining: limit.saturating_sub(count),
        premium: account.premium,
    }))
}
