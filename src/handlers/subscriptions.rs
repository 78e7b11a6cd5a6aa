// src/handlers/subscriptions.rs

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use validator::Validate;

use crate::{
    clients::stripe::{verify_webhook_signature, WebhookEvent},
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::{
        auth::ErrorBody,
        subscription::{
            CheckoutPayload, CheckoutResponse, PlansResponse, PortalResponse, SessionSummary, SubscriptionStatusResponse,
            SuccessMessage, VerifySessionPayload, VerifySessionResponse, WebhookAck,
        },
    },
};

// =============================================================================
//  PLANOS E CHECKOUT
// =============================================================================

#[utoipa::path(
    get,
    path = "/api/subscriptions/plans",
    tag = "Subscriptions",
    responses((status = 200, description = "Tabela de preços", body = PlansResponse))
)]
pub async fn list_plans(State(app_state): State<AppState>) -> Json<PlansResponse> {
    Json(PlansResponse {
        success: true,
        plans: app_state.subscription_service.plans(),
    })
}

#[utoipa::path(
    post,
    path = "/api/subscriptions/guest-checkout",
    tag = "Subscriptions",
    request_body = CheckoutPayload,
    responses(
        (status = 200, description = "Sessão de checkout criada", body = CheckoutResponse),
        (status = 400, description = "Plano inválido", body = ErrorBody)
    )
)]
pub async fn guest_checkout(
    State(app_state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<CheckoutPayload>, AppError>,
) -> Result<Json<CheckoutResponse>, AppError> {
    payload.validate()?;

    let session = app_state
        .subscription_service
        .create_checkout(None, &payload.plan_type)
        .await?;

    Ok(Json(CheckoutResponse {
        success: true,
        checkout_url: session.url,
        session_id: session.id,
    }))
}

#[utoipa::path(
    post,
    path = "/api/subscriptions/checkout",
    tag = "Subscriptions",
    request_body = CheckoutPayload,
    responses(
        (status = 200, description = "Sessão de checkout criada para o usuário", body = CheckoutResponse),
        (status = 400, description = "Plano inválido", body = ErrorBody)
    ),
    security(("api_jwt" = []))
)]
pub async fn checkout(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    WithRejection(Json(payload), _): WithRejection<Json<CheckoutPayload>, AppError>,
) -> Result<Json<CheckoutResponse>, AppError> {
    payload.validate()?;

    let session = app_state
        .subscription_service
        .create_checkout(Some((user.id, user.email)), &payload.plan_type)
        .await?;

    Ok(Json(CheckoutResponse {
        success: true,
        checkout_url: session.url,
        session_id: session.id,
    }))
}

// =============================================================================
//  STATUS, PORTAL, CANCELAMENTO
// =============================================================================

#[utoipa::path(
    get,
    path = "/api/subscriptions/status",
    tag = "Subscriptions",
    responses((status = 200, description = "Status atual da assinatura", body = SubscriptionStatusResponse)),
    security(("api_jwt" = []))
)]
pub async fn subscription_status(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> impl IntoResponse {
    let subscription = app_state.subscription_service.get_subscription_status(user.id).await;

    (
        [(header::CACHE_CONTROL, "no-store, no-cache, must-revalidate")],
        Json(SubscriptionStatusResponse {
            success: true,
            subscription,
        }),
    )
}

#[utoipa::path(
    post,
    path = "/api/subscriptions/billing-portal",
    tag = "Subscriptions",
    responses(
        (status = 200, description = "URL do portal de cobrança", body = PortalResponse),
        (status = 400, description = "Usuário sem conta de cobrança", body = ErrorBody)
    ),
    security(("api_jwt" = []))
)]
pub async fn billing_portal(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<PortalResponse>, AppError> {
    let portal_url = app_state.subscription_service.billing_portal(user.id).await?;
    Ok(Json(PortalResponse {
        success: true,
        portal_url,
    }))
}

#[utoipa::path(
    post,
    path = "/api/subscriptions/cancel",
    tag = "Subscriptions",
    responses(
        (status = 200, description = "Cancelamento agendado para o fim do período", body = SuccessMessage),
        (status = 400, description = "Nenhuma assinatura encontrada", body = ErrorBody)
    ),
    security(("api_jwt" = []))
)]
pub async fn cancel_subscription(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<SuccessMessage>, AppError> {
    app_state.subscription_service.cancel(user.id).await?;
    Ok(Json(SuccessMessage::new(
        "Subscription will be canceled at the end of the current billing period",
    )))
}

#[utoipa::path(
    post,
    path = "/api/subscriptions/reactivate",
    tag = "Subscriptions",
    responses(
        (status = 200, description = "Cancelamento desfeito", body = SuccessMessage),
        (status = 400, description = "Nenhuma assinatura encontrada", body = ErrorBody)
    ),
    security(("api_jwt" = []))
)]
pub async fn reactivate_subscription(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<SuccessMessage>, AppError> {
    app_state.subscription_service.reactivate(user.id).await?;
    Ok(Json(SuccessMessage::new("Subscription reactivated successfully")))
}

#[utoipa::path(
    post,
    path = "/api/subscriptions/verify-session",
    tag = "Subscriptions",
    request_body = VerifySessionPayload,
    responses(
        (status = 200, description = "Resumo da sessão de checkout", body = VerifySessionResponse),
        (status = 404, description = "Sessão inexistente", body = ErrorBody)
    )
)]
pub async fn verify_session(
    State(app_state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<VerifySessionPayload>, AppError>,
) -> Result<Json<VerifySessionResponse>, AppError> {
    payload.validate()?;

    let session = app_state.subscription_service.verify_session(&payload.session_id).await?;
    Ok(Json(VerifySessionResponse {
        success: true,
        session: SessionSummary {
            id: session.id,
            payment_status: session.payment_status,
            customer: session.customer,
            subscription: session.subscription,
            amount_total: session.amount_total,
            currency: session.currency,
            metadata: session.metadata,
        },
    }))
}

// =============================================================================
//  WEBHOOK
// =============================================================================

// O corpo chega cru: a assinatura é calculada sobre os bytes exatos
#[utoipa::path(
    post,
    path = "/api/subscriptions/webhook",
    tag = "Subscriptions",
    request_body(content = String, description = "Evento do Stripe, corpo cru", content_type = "application/json"),
    responses(
        (status = 200, description = "Evento recebido", body = WebhookAck),
        (status = 400, description = "Assinatura ou corpo inválidos", body = ErrorBody)
    )
)]
pub async fn stripe_webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    let Some(secret) = app_state.config.stripe_webhook_secret.as_deref() else {
        tracing::warn!("⚠️ Webhook recebido sem STRIPE_WEBHOOK_SECRET configurado; ignorado");
        return Ok(Json(WebhookAck {
            received: true,
            message: Some("Webhook secret not configured".into()),
        }));
    };

    let signature = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::WebhookSignature("Missing Stripe-Signature header".into()))?;

    verify_webhook_signature(&body, signature, secret, Utc::now().timestamp()).map_err(|e| {
        tracing::warn!("🚫 Assinatura do webhook rejeitada: {}", e);
        AppError::WebhookSignature(e.to_string())
    })?;

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::invalid("INVALID_PAYLOAD", format!("Invalid webhook payload: {e}")))?;

    let outcome = app_state.subscription_service.handle_webhook(event).await?;
    tracing::debug!(?outcome, "Webhook processado");

    Ok(Json(WebhookAck {
        received: true,
        message: None,
    }))
}
