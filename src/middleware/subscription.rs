// src/middleware/subscription.rs

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::{common::error::AppError, config::AppState, models::auth::CurrentUser};

/// Barra quem não tem assinatura paga. Roda depois do `auth_guard`.
pub async fn require_paid(
    State(app_state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or(AppError::InvalidToken)?;

    let cached_paid = user
        .profile
        .as_ref()
        .is_some_and(|p| p.subscription_status.is_paid());

    if !cached_paid {
        let view = app_state.subscription_service.get_subscription_status(user.id).await;
        if !view.grants_access() {
            tracing::info!(user_id = %user.id, status = %view.status, "🔒 Acesso negado: assinatura necessária");
            return Err(AppError::SubscriptionRequired);
        }
    }

    Ok(next.run(request).await)
}
