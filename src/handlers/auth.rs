// src/handlers/auth.rs

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect},
    Json,
};
use axum_extra::extract::WithRejection;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::{bearer_token, AuthenticatedUser},
    models::auth::{
        ActivityRoleResponse, EmailPayload, ErrorBody, LoginPayload, LoginResponse, MessageResponse, ProfileResponse,
        RefreshPayload, RefreshResponse, RegisterAfterPaymentPayload, RegisterAfterPaymentResponse, RegisterPayload,
        RegisterResponse, ResetPasswordPayload, SessionUser, UpdateActivityRolePayload, UpdateProfilePayload,
        UpdateProfileResponse, VerifyEmailQuery,
    },
};

// POST /api/auth/register
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    request_body = RegisterPayload,
    responses(
        (status = 201, description = "Conta criada, aguardando verificação de e-mail", body = RegisterResponse),
        (status = 400, description = "Dados inválidos", body = ErrorBody),
        (status = 409, description = "E-mail já cadastrado", body = ErrorBody)
    )
)]
pub async fn register(
    State(app_state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<RegisterPayload>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let response = app_state.auth_service.register(&payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

// POST /api/auth/login
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginPayload,
    responses(
        (status = 200, description = "Login efetuado", body = LoginResponse),
        (status = 401, description = "Credenciais inválidas ou e-mail não verificado", body = ErrorBody)
    )
)]
pub async fn login(
    State(app_state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<LoginPayload>, AppError>,
) -> Result<Json<LoginResponse>, AppError> {
    payload.validate()?;
    Ok(Json(app_state.auth_service.login(&payload).await?))
}

// POST /api/auth/refresh
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    tag = "Auth",
    request_body = RefreshPayload,
    responses(
        (status = 200, description = "Novo par de tokens", body = RefreshResponse),
        (status = 401, description = "Refresh token inválido", body = ErrorBody)
    )
)]
pub async fn refresh(
    State(app_state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<RefreshPayload>, AppError>,
) -> Result<Json<RefreshResponse>, AppError> {
    payload.validate()?;
    let session = app_state.auth_service.refresh(&payload.refresh_token).await?;
    Ok(Json(RefreshResponse { session }))
}

// POST /api/auth/logout
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Sessão encerrada", body = MessageResponse))
)]
pub async fn logout(State(app_state): State<AppState>, headers: HeaderMap) -> Json<MessageResponse> {
    app_state.auth_service.logout(bearer_token(&headers).as_deref()).await;
    Json(MessageResponse::new("Logged out successfully"))
}

// POST /api/auth/forgot-password
#[utoipa::path(
    post,
    path = "/api/auth/forgot-password",
    tag = "Auth",
    request_body = EmailPayload,
    responses((status = 200, description = "Mesma resposta exista a conta ou não", body = MessageResponse))
)]
pub async fn forgot_password(
    State(app_state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<EmailPayload>, AppError>,
) -> Result<Json<MessageResponse>, AppError> {
    payload.validate()?;
    let message = app_state.auth_service.forgot_password(&payload.email).await;
    Ok(Json(MessageResponse::new(message)))
}

// POST /api/auth/reset-password
#[utoipa::path(
    post,
    path = "/api/auth/reset-password",
    tag = "Auth",
    request_body = ResetPasswordPayload,
    responses(
        (status = 200, description = "Senha alterada", body = MessageResponse),
        (status = 400, description = "Token de recuperação inválido", body = ErrorBody)
    )
)]
pub async fn reset_password(
    State(app_state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<ResetPasswordPayload>, AppError>,
) -> Result<Json<MessageResponse>, AppError> {
    payload.validate()?;
    app_state.auth_service.reset_password(&payload).await?;
    Ok(Json(MessageResponse::new("Password updated successfully")))
}

// GET /api/auth/verify-email
#[utoipa::path(
    get,
    path = "/api/auth/verify-email",
    tag = "Auth",
    params(VerifyEmailQuery),
    responses((status = 303, description = "Redireciona para a tela de login"))
)]
pub async fn verify_email(State(app_state): State<AppState>, Query(query): Query<VerifyEmailQuery>) -> Redirect {
    let target = app_state
        .auth_service
        .verify_email(query.token_hash.as_deref(), query.kind.as_deref())
        .await;
    Redirect::to(target)
}

// GET /api/auth/profile
#[utoipa::path(
    get,
    path = "/api/auth/profile",
    tag = "Auth",
    responses(
        (status = 200, description = "Usuário autenticado e perfil", body = ProfileResponse),
        (status = 401, description = "Não autenticado", body = ErrorBody)
    ),
    security(("api_jwt" = []))
)]
pub async fn get_profile(AuthenticatedUser(user): AuthenticatedUser) -> Json<ProfileResponse> {
    Json(ProfileResponse {
        user: SessionUser {
            id: user.id,
            email: user.email,
            profile: user.profile,
        },
    })
}

// PUT /api/auth/profile
#[utoipa::path(
    put,
    path = "/api/auth/profile",
    tag = "Auth",
    request_body = UpdateProfilePayload,
    responses(
        (status = 200, description = "Perfil atualizado", body = UpdateProfileResponse),
        (status = 404, description = "Perfil inexistente", body = ErrorBody)
    ),
    security(("api_jwt" = []))
)]
pub async fn update_profile(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    WithRejection(Json(payload), _): WithRejection<Json<UpdateProfilePayload>, AppError>,
) -> Result<Json<UpdateProfileResponse>, AppError> {
    payload.validate()?;

    let profile = app_state
        .auth_service
        .update_profile(user.id, &payload.first_name, &payload.last_name)
        .await?;

    Ok(Json(UpdateProfileResponse {
        message: "Profile updated successfully".into(),
        profile,
    }))
}

// POST /api/auth/update-activity-role
#[utoipa::path(
    post,
    path = "/api/auth/update-activity-role",
    tag = "Auth",
    request_body = UpdateActivityRolePayload,
    responses((status = 200, description = "Preferência salva", body = ActivityRoleResponse)),
    security(("api_jwt" = []))
)]
pub async fn update_activity_role(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    WithRejection(Json(payload), _): WithRejection<Json<UpdateActivityRolePayload>, AppError>,
) -> Result<Json<ActivityRoleResponse>, AppError> {
    payload.validate()?;

    let role = app_state
        .auth_service
        .update_activity_role(user.id, &payload.default_activity_role)
        .await?;

    Ok(Json(ActivityRoleResponse {
        message: "Activity role preference updated successfully".into(),
        default_activity_role: role.as_str().to_string(),
    }))
}

// POST /api/auth/register-after-payment
#[utoipa::path(
    post,
    path = "/api/auth/register-after-payment",
    tag = "Auth",
    request_body = RegisterAfterPaymentPayload,
    responses(
        (status = 200, description = "Conta paga criada e logada", body = RegisterAfterPaymentResponse),
        (status = 400, description = "Sessão de checkout não paga", body = ErrorBody)
    )
)]
pub async fn register_after_payment(
    State(app_state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<RegisterAfterPaymentPayload>, AppError>,
) -> Result<Json<RegisterAfterPaymentResponse>, AppError> {
    payload.validate()?;
    Ok(Json(app_state.auth_service.register_after_payment(&payload).await?))
}
