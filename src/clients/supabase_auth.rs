// src/clients/supabase_auth.rs
//
// Autenticação delegada ao Supabase (GoTrue). Os tokens de acesso são
// verificados localmente com o segredo JWT do projeto; o resto é REST.

use async_trait::async_trait;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::{
    clients::{ClientError, read_json},
    models::auth::{AuthIdentity, AuthSession, AuthUser, SignUpOutcome, SignUpRequest, SupabaseClaims},
};

const SERVICE: &str = "supabase";
const JWT_AUDIENCE: &str = "authenticated";

#[derive(Debug, Error)]
pub enum AuthProviderError {
    #[error("token expirado")]
    Expired,

    #[error("token inválido")]
    Invalid,

    #[error("credenciais inválidas")]
    InvalidCredentials,

    #[error("e-mail não confirmado")]
    EmailNotConfirmed,

    #[error("usuário já registrado")]
    AlreadyRegistered,

    #[error("limite de requisições do provedor atingido")]
    RateLimited,

    #[error("{0}")]
    Rejected(String),

    #[error(transparent)]
    Client(#[from] ClientError),
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Verifica um token de acesso sem rede. Distingue expirado de inválido.
    fn verify(&self, token: &str) -> Result<AuthIdentity, AuthProviderError>;

    async fn sign_up(&self, request: SignUpRequest) -> Result<SignUpOutcome, AuthProviderError>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthProviderError>;
    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthProviderError>;
    async fn sign_out(&self, access_token: &str) -> Result<(), AuthProviderError>;
    async fn send_password_reset(&self, email: &str, redirect_to: &str) -> Result<(), AuthProviderError>;
    async fn update_password(&self, access_token: &str, new_password: &str) -> Result<(), AuthProviderError>;
    async fn resend_verification(&self, email: &str, redirect_to: &str) -> Result<(), AuthProviderError>;
    async fn verify_email_otp(&self, token_hash: &str, kind: &str) -> Result<(), AuthProviderError>;
}

#[derive(Clone)]
pub struct SupabaseAuthClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl SupabaseAuthClient {
    pub fn new(http: reqwest::Client, supabase_url: &str, anon_key: &str, jwt_secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[JWT_AUDIENCE]);

        Self {
            http,
            base_url: format!("{}/auth/v1", supabase_url.trim_end_matches('/')),
            anon_key: anon_key.to_string(),
            decoding_key: DecodingKey::from_secret(jwt_secret.as_bytes()),
            validation,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.http.post(self.url(path)).header("apikey", &self.anon_key)
    }

    // Envia e converte respostas não-2xx no erro tipado do provedor
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, AuthProviderError> {
        let response = request.send().await.map_err(ClientError::transport(SERVICE))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = classify_error(status.as_u16(), &body);
        tracing::warn!(status = status.as_u16(), error = %err, "⚠️ Supabase recusou a requisição");
        Err(err)
    }

    async fn send_json<T: for<'de> Deserialize<'de>>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, AuthProviderError> {
        let response = self.send(request).await?;
        Ok(read_json(SERVICE, response).await?)
    }
}

#[async_trait]
impl AuthProvider for SupabaseAuthClient {
    fn verify(&self, token: &str) -> Result<AuthIdentity, AuthProviderError> {
        let data = decode::<SupabaseClaims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthProviderError::Expired,
                _ => AuthProviderError::Invalid,
            }
        })?;

        Ok(AuthIdentity {
            user_id: data.claims.sub,
            email: data.claims.email.unwrap_or_default().to_lowercase(),
        })
    }

    async fn sign_up(&self, request: SignUpRequest) -> Result<SignUpOutcome, AuthProviderError> {
        let body = json!({
            "email": request.email,
            "password": request.password,
            "data": request.metadata,
        });

        let response: SignUpResponse = self
            .send_json(
                self.post("/signup")
                    .query(&[("redirect_to", request.redirect_to.as_str())])
                    .json(&body),
            )
            .await?;

        Ok(match response {
            SignUpResponse::Session(session) => SignUpOutcome {
                user: session.user.clone(),
                session: Some(session),
            },
            SignUpResponse::User(user) => SignUpOutcome { user, session: None },
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthProviderError> {
        self.send_json(
            self.post("/token")
                .query(&[("grant_type", "password")])
                .json(&json!({ "email": email, "password": password })),
        )
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthProviderError> {
        self.send_json(
            self.post("/token")
                .query(&[("grant_type", "refresh_token")])
                .json(&json!({ "refresh_token": refresh_token })),
        )
        .await
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthProviderError> {
        self.send(self.post("/logout").bearer_auth(access_token)).await?;
        Ok(())
    }

    async fn send_password_reset(&self, email: &str, redirect_to: &str) -> Result<(), AuthProviderError> {
        self.send(
            self.post("/recover")
                .query(&[("redirect_to", redirect_to)])
                .json(&json!({ "email": email })),
        )
        .await?;
        Ok(())
    }

    async fn update_password(&self, access_token: &str, new_password: &str) -> Result<(), AuthProviderError> {
        let request = self
            .http
            .put(self.url("/user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .json(&json!({ "password": new_password }));
        self.send(request).await?;
        Ok(())
    }

    async fn resend_verification(&self, email: &str, redirect_to: &str) -> Result<(), AuthProviderError> {
        self.send(
            self.post("/resend")
                .query(&[("redirect_to", redirect_to)])
                .json(&json!({ "type": "signup", "email": email })),
        )
        .await?;
        Ok(())
    }

    async fn verify_email_otp(&self, token_hash: &str, kind: &str) -> Result<(), AuthProviderError> {
        self.send(self.post("/verify").json(&json!({ "type": kind, "token_hash": token_hash })))
            .await?;
        Ok(())
    }
}

// Com confirmação de e-mail ligada o GoTrue devolve só o usuário
#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(AuthSession),
    User(AuthUser),
}

#[derive(Debug, Default, Deserialize)]
struct GoTrueErrorBody {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
}

/// Traduz uma resposta de erro do GoTrue. Versões antigas só mandam a mensagem,
/// as novas mandam também `error_code`.
pub fn classify_error(status: u16, body: &str) -> AuthProviderError {
    let parsed: GoTrueErrorBody = serde_json::from_str(body).unwrap_or_default();
    let code = parsed.error_code.unwrap_or_default();
    let message = [parsed.msg, parsed.error_description, parsed.message, parsed.error]
        .into_iter()
        .flatten()
        .find(|m| !m.is_empty())
        .unwrap_or_else(|| "Authentication request failed".to_string());

    if status == 429 || code.starts_with("over_") {
        return AuthProviderError::RateLimited;
    }
    if code == "invalid_credentials" || message.contains("Invalid login credentials") {
        return AuthProviderError::InvalidCredentials;
    }
    if code == "email_not_confirmed" || message.contains("Email not confirmed") {
        return AuthProviderError::EmailNotConfirmed;
    }
    if code == "user_already_exists" || message.contains("already registered") {
        return AuthProviderError::AlreadyRegistered;
    }
    if status == 401 || status == 403 {
        return AuthProviderError::Invalid;
    }
    if status >= 500 {
        return AuthProviderError::Client(ClientError::Api {
            service: SERVICE,
            status,
            message,
        });
    }
    AuthProviderError::Rejected(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &str = "super-secret-jwt-token-with-at-least-32-characters";

    fn client() -> SupabaseAuthClient {
        SupabaseAuthClient::new(reqwest::Client::new(), "http://localhost:54321", "anon", SECRET)
    }

    fn token(exp_offset: i64, aud: &str, secret: &str) -> String {
        let exp = chrono::Utc::now().timestamp() + exp_offset;
        let claims = json!({
            "sub": "7b0c2f7e-5d0a-4c6b-9c1e-2f1a4b3c5d6e",
            "email": "Broker@Example.com",
            "aud": aud,
            "exp": exp,
            "role": "authenticated",
        });
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn verifies_a_valid_token_and_lowercases_email() {
        let identity = client().verify(&token(3600, "authenticated", SECRET)).unwrap();
        assert_eq!(identity.email, "broker@example.com");
        assert_eq!(identity.user_id.to_string(), "7b0c2f7e-5d0a-4c6b-9c1e-2f1a4b3c5d6e");
    }

    #[test]
    fn expired_tokens_are_told_apart_from_invalid_ones() {
        let expired = client().verify(&token(-3600, "authenticated", SECRET));
        assert!(matches!(expired, Err(AuthProviderError::Expired)));

        let wrong_secret = client().verify(&token(3600, "authenticated", "another-secret-another-secret-xx"));
        assert!(matches!(wrong_secret, Err(AuthProviderError::Invalid)));

        let wrong_audience = client().verify(&token(3600, "anon", SECRET));
        assert!(matches!(wrong_audience, Err(AuthProviderError::Invalid)));

        assert!(matches!(client().verify("not-a-jwt"), Err(AuthProviderError::Invalid)));
    }

    #[test]
    fn classifies_gotrue_errors() {
        assert!(matches!(
            classify_error(400, r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            AuthProviderError::InvalidCredentials
        ));
        assert!(matches!(
            classify_error(400, r#"{"code":400,"error_code":"email_not_confirmed","msg":"Email not confirmed"}"#),
            AuthProviderError::EmailNotConfirmed
        ));
        assert!(matches!(
            classify_error(422, r#"{"msg":"User already registered"}"#),
            AuthProviderError::AlreadyRegistered
        ));
        assert!(matches!(classify_error(429, ""), AuthProviderError::RateLimited));
        assert!(matches!(classify_error(401, r#"{"msg":"invalid JWT"}"#), AuthProviderError::Invalid));
        assert!(matches!(
            classify_error(503, "upstream down"),
            AuthProviderError::Client(ClientError::Api { status: 503, .. })
        ));
        match classify_error(400, r#"{"msg":"Password should be at least 6 characters"}"#) {
            AuthProviderError::Rejected(message) => {
                assert_eq!(message, "Password should be at least 6 characters")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
