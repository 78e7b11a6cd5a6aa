use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::clients::{supabase_auth::AuthProviderError, ClientError};

// Erro único que atravessa a fronteira serviço -> handler.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Corpo JSON inválido: {0}")]
    JsonRejection(#[from] JsonRejection),

    // Erros de entrada com código específico (INVALID_USER_TYPE, INVALID_DATE...)
    #[error("Entrada inválida ({code}): {message}")]
    InvalidInput { code: &'static str, message: String },

    #[error("E-mail já existe")]
    EmailAlreadyExists,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("E-mail não verificado")]
    EmailNotVerified,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Token expirado")]
    TokenExpired,

    #[error("Assinatura paga necessária")]
    SubscriptionRequired,

    #[error("Não encontrado: {0}")]
    NotFound(String),

    #[error("Muitas requisições")]
    RateLimited,

    #[error("Assinatura do webhook inválida: {0}")]
    WebhookSignature(String),

    #[error("Provedor de autenticação recusou: {0}")]
    AuthRejected(String),

    #[error("Serviço externo indisponível: {0}")]
    Upstream(#[from] ClientError),

    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

impl AppError {
    pub fn invalid(code: &'static str, message: impl Into<String>) -> Self {
        AppError::InvalidInput {
            code,
            message: message.into(),
        }
    }
}

impl From<AuthProviderError> for AppError {
    fn from(err: AuthProviderError) -> Self {
        match err {
            AuthProviderError::Expired => AppError::TokenExpired,
            AuthProviderError::Invalid => AppError::InvalidToken,
            AuthProviderError::InvalidCredentials => AppError::InvalidCredentials,
            AuthProviderError::EmailNotConfirmed => AppError::EmailNotVerified,
            AuthProviderError::AlreadyRegistered => AppError::EmailAlreadyExists,
            AuthProviderError::RateLimited => AppError::RateLimited,
            AuthProviderError::Rejected(message) => AppError::AuthRejected(message),
            AuthProviderError::Client(e) => AppError::Upstream(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .map(|e| match &e.message {
                            Some(m) => m.to_string(),
                            None => e.code.to_string(),
                        })
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "One or more fields are invalid.",
                    "code": "VALIDATION_ERROR",
                    "details": details,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::JsonRejection(rejection) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                rejection.body_text(),
            ),
            AppError::InvalidInput { code, message } => (StatusCode::BAD_REQUEST, code, message),
            AppError::EmailAlreadyExists => (
                StatusCode::CONFLICT,
                "USER_EXISTS",
                "An account with this email already exists".to_string(),
            ),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "Invalid email or password".to_string(),
            ),
            AppError::EmailNotVerified => (
                StatusCode::UNAUTHORIZED,
                "EMAIL_NOT_VERIFIED",
                "Please verify your email address before logging in".to_string(),
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Invalid or missing authentication token".to_string(),
            ),
            // O cliente deve tentar o refresh antes de mandar o usuário ao login
            AppError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "TOKEN_EXPIRED",
                "Authentication token has expired".to_string(),
            ),
            AppError::SubscriptionRequired => (
                StatusCode::FORBIDDEN,
                "SUBSCRIPTION_REQUIRED",
                "Paid subscription required for this feature".to_string(),
            ),
            AppError::NotFound(what) => (StatusCode::NOT_FOUND, "NOT_FOUND", what),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "RATE_LIMIT_EXCEEDED",
                "Please wait before trying again.".to_string(),
            ),
            AppError::WebhookSignature(reason) => (
                StatusCode::BAD_REQUEST,
                "WEBHOOK_SIGNATURE",
                format!("Webhook Error: {reason}"),
            ),
            AppError::AuthRejected(message) => (StatusCode::BAD_REQUEST, "AUTH_ERROR", message),
            AppError::Upstream(ref e) => {
                tracing::error!("🔥 Falha em serviço externo: {}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    "UPSTREAM_ERROR",
                    "An external service is unavailable. Please try again later.".to_string(),
                )
            }

            // DatabaseError e InternalServerError viram 500; o detalhe fica só no log.
            ref e => {
                tracing::error!("🔥 Erro Interno do Servidor: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "SERVER_ERROR",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({ "error": message, "code": code }));
        (status, body).into_response()
    }
}
