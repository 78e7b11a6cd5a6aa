// src/models/auth.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{common::validation::validate_user_type, models::profile::UserProfile};

// =============================================================================
//  IDENTIDADE (vinda do provedor de autenticação)
// =============================================================================

/// Claims do JWT emitido pelo Supabase que nos interessam.
#[derive(Debug, Serialize, Deserialize)]
pub struct SupabaseClaims {
    pub sub: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: usize,
    #[serde(default)]
    pub role: Option<String>,
}

// Resultado de um token verificado
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthIdentity {
    pub user_id: Uuid,
    pub email: String,
}

/// Usuário autenticado anexado à requisição pelo `auth_guard`. O perfil pode
/// faltar (criado só no primeiro login ou indisponível no momento).
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub profile: Option<UserProfile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub user_type: Option<String>,
}

// Usuário como o GoTrue devolve
#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_confirmed_at: Option<String>,
    #[serde(default)]
    pub user_metadata: Option<UserMetadata>,
}

impl AuthUser {
    pub fn metadata(&self) -> UserMetadata {
        self.user_metadata.clone().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

/// O signup devolve uma sessão completa quando a confirmação de e-mail está
/// desligada e só o usuário quando está ligada.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub user: AuthUser,
    pub session: Option<AuthSession>,
}

#[derive(Debug, Clone)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub metadata: UserMetadata,
    pub redirect_to: String,
}

// =============================================================================
//  PAYLOADS
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPayload {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "broker@example.com")]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters long"))]
    pub password: String,

    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,

    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,

    #[validate(custom(function = "validate_user_type"))]
    #[schema(example = "broker")]
    pub user_type: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginPayload {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,

    #[serde(default)]
    pub remember_me: Option<bool>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RefreshPayload {
    #[serde(alias = "refreshToken")]
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct EmailPayload {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

// Os tokens chegam no fragmento do link de recuperação, em snake_case
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ResetPasswordPayload {
    #[validate(length(min = 1, message = "Access token is required"))]
    pub access_token: String,

    #[serde(default)]
    pub refresh_token: Option<String>,

    #[validate(length(min = 8, message = "Password must be at least 8 characters long"))]
    pub new_password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfilePayload {
    #[serde(alias = "first_name")]
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,

    #[serde(alias = "last_name")]
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateActivityRolePayload {
    #[validate(custom(function = "validate_user_type"))]
    pub default_activity_role: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterAfterPaymentPayload {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters long"))]
    pub password: String,

    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,

    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,

    #[validate(custom(function = "validate_user_type"))]
    pub user_type: String,

    #[validate(length(min = 1, message = "Session id is required"))]
    pub session_id: String,

    #[serde(default)]
    #[schema(example = "yearly")]
    pub plan_type: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VerifyEmailQuery {
    pub token_hash: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

// =============================================================================
//  RESPOSTAS
// =============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredUser {
    pub id: Uuid,
    pub email: Option<String>,
    pub email_confirmed: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterResponse {
    pub message: String,
    pub user: RegisteredUser,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
    pub profile: Option<UserProfile>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: Option<i64>,
}

impl From<&AuthSession> for SessionTokens {
    fn from(session: &AuthSession) -> Self {
        Self {
            access_token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
            expires_at: session.expires_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub message: String,
    pub user: SessionUser,
    pub session: SessionTokens,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshResponse {
    pub session: SessionTokens,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    pub user: SessionUser,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UpdateProfileResponse {
    pub message: String,
    pub profile: UserProfile,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRoleResponse {
    pub message: String,
    pub default_activity_role: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterAfterPaymentResponse {
    pub success: bool,
    pub message: String,
    pub token: String,
    pub user: SessionUser,
}

// Só para documentar o formato de erro no Swagger
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
    #[schema(value_type = Option<Object>)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}
