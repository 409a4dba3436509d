use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::auth::register,
        crate::handlers::auth::login,
        crate::handlers::chat::chat,
        crate::handlers::chat::list_chats,
        crate::handlers::chat::daily_count,
        crate::handlers::payments::create_order,
        crate::handlers::payments::payment_webhook,
        crate::handlers::health::liveness,
        crate::handlers::health::readiness,
    ),
    components(
        schemas(
            crate::models::CredentialsRequest,
            crate::models::RegisterResponse,
            crate::models::LoginResponse,
            crate::models::ChatRequest,
            crate::models::ChatResponse,
            crate::models::ChatTurn,
            crate::models::ChatHistoryResponse,
            crate::models::DailyCountResponse,
            crate::models::OrderHandle,
            crate::models::CreateOrderResponse,
            crate::models::SettlementOutcome,
            crate::models::SettlementAck,
            crate::errors::ErrorKind,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration and login"),
        (name = "chat", description = "Metered chat and history"),
        (name = "payments", description = "Premium upgrade and provider callbacks"),
        (name = "health", description = "Health check endpoints")
    ),
    info(
        title = "MindSpark API",
        version = "1.0.0",
        description = "Chat backend with a free daily allowance and a paid premium tier"
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn create_docs_router() -> Router<AppState> {
    Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
