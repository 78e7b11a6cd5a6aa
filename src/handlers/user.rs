// src/handlers/user.rs

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Json,
};

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::{auth::ErrorBody, subscription::SuccessMessage},
};

#[utoipa::path(
    get,
    path = "/api/user/export",
    tag = "User",
    responses(
        (status = 200, description = "Planilha CSV com perfil, metas e atividades", content_type = "text/csv", body = String),
        (status = 401, description = "Não autenticado", body = ErrorBody)
    ),
    security(("api_jwt" = []))
)]
pub async fn export_data(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let export = app_state
        .export_service
        .export_csv(user.id, user.profile.as_ref())
        .await?;

    let disposition = format!("attachment; filename=\"{}\"", export.filename);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        export.content,
    ))
}

#[utoipa::path(
    post,
    path = "/api/user/resend-verification",
    tag = "User",
    responses(
        (status = 200, description = "E-mail de verificação reenviado", body = SuccessMessage),
        (status = 429, description = "Aguarde antes de pedir outro e-mail", body = ErrorBody)
    ),
    security(("api_jwt" = []))
)]
pub async fn resend_verification(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<SuccessMessage>, AppError> {
    app_state.auth_service.resend_verification(&user.email).await?;
    tracing::info!(user_id = %user.id, "📧 E-mail de verificação reenviado");
    Ok(Json(SuccessMessage::new("Verification email sent successfully")))
}
