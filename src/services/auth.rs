// src/services/auth.rs

use std::sync::Arc;

use serde_json::{json, Map};
use uuid::Uuid;

use crate::{
    clients::supabase_auth::{AuthProvider, AuthProviderError},
    common::error::AppError,
    db::ProfileStore,
    models::{
        auth::{
            AuthIdentity, AuthSession, CurrentUser, LoginPayload, LoginResponse, RegisterAfterPaymentPayload,
            RegisterAfterPaymentResponse, RegisterPayload, RegisterResponse, RegisteredUser, ResetPasswordPayload,
            SessionTokens, SessionUser, SignUpRequest, UserMetadata,
        },
        crm::ContactInput,
        profile::{NewUserProfile, UserProfile, UserType},
        subscription::{SubscriptionEventType, SubscriptionStatus},
    },
    services::{
        crm_service::CrmService,
        subscription_service::{PlanChange, SubscriptionService},
    },
};

pub const FORGOT_PASSWORD_MESSAGE: &str = "If an account with this email exists, a password reset link has been sent.";

#[derive(Clone)]
pub struct AuthService {
    provider: Arc<dyn AuthProvider>,
    profiles: Arc<dyn ProfileStore>,
    crm: CrmService,
    subscriptions: SubscriptionService,
    base_url: String,
}

impl AuthService {
    pub fn new(
        provider: Arc<dyn AuthProvider>,
        profiles: Arc<dyn ProfileStore>,
        crm: CrmService,
        subscriptions: SubscriptionService,
        base_url: &str,
    ) -> Self {
        Self {
            provider,
            profiles,
            crm,
            subscriptions,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    // =========================================================================
    //  TOKENS
    // =========================================================================

    pub fn verify_token(&self, token: &str) -> Result<AuthIdentity, AppError> {
        Ok(self.provider.verify(token)?)
    }

    /// Verifica o token e carrega o perfil. Falha ao ler o perfil não barra a
    /// requisição.
    pub async fn authenticate(&self, token: &str) -> Result<CurrentUser, AppError> {
        let identity = self.verify_token(token)?;
        let profile = self.profiles.find_by_id(identity.user_id).await.unwrap_or_else(|e| {
            tracing::warn!(user_id = %identity.user_id, "⚠️ Perfil indisponível na autenticação: {:?}", e);
            None
        });

        Ok(CurrentUser {
            id: identity.user_id,
            email: identity.email,
            profile,
        })
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens, AppError> {
        let session = self.provider.refresh(refresh_token).await?;
        Ok(SessionTokens::from(&session))
    }

    /// Melhor esforço: o token expira sozinho de qualquer forma.
    pub async fn logout(&self, access_token: Option<&str>) {
        let Some(token) = access_token else { return };
        if let Err(e) = self.provider.sign_out(token).await {
            tracing::warn!("⚠️ Falha ao encerrar a sessão no provedor: {}", e);
        }
    }

    // =========================================================================
    //  REGISTRO E LOGIN
    // =========================================================================

    pub async fn register(&self, payload: &RegisterPayload) -> Result<RegisterResponse, AppError> {
        let email = payload.email.trim().to_lowercase();
        let user_type = parse_user_type(&payload.user_type)?;

        let outcome = self
            .provider
            .sign_up(SignUpRequest {
                email: email.clone(),
                password: payload.password.clone(),
                metadata: UserMetadata {
                    first_name: Some(payload.first_name.clone()),
                    last_name: Some(payload.last_name.clone()),
                    user_type: Some(user_type.as_str().to_string()),
                },
                redirect_to: format!("{}/login?message=email_verified", self.base_url),
            })
            .await?;
        let user = outcome.user;

        let created = self
            .profiles
            .create(NewUserProfile {
                id: user.id,
                email: email.clone(),
                first_name: payload.first_name.trim().to_string(),
                last_name: payload.last_name.trim().to_string(),
                user_type,
                subscription_status: SubscriptionStatus::Free,
                stripe_customer_id: None,
                default_activity_role: user_type,
            })
            .await;

        match created {
            Ok(_) => {
                let mut custom_fields = Map::new();
                custom_fields.insert("registration_source".into(), json!("Income Goal Calculator"));
                custom_fields.insert("user_id".into(), json!(user.id));
                self.sync_contact_best_effort(ContactInput {
                    email: email.clone(),
                    first_name: payload.first_name.trim().to_string(),
                    last_name: payload.last_name.trim().to_string(),
                    user_type: Some(user_type.as_str().to_string()),
                    subscription_status: SubscriptionStatus::Free,
                    custom_fields,
                    ..Default::default()
                })
                .await;
            }
            // O perfil será criado no primeiro login
            Err(e) => tracing::error!(user_id = %user.id, "🔥 Falha ao criar perfil no registro: {:?}", e),
        }

        tracing::info!(user_id = %user.id, "✅ Usuário registrado");
        Ok(RegisterResponse {
            message: "Registration successful. Please check your email to verify your account.".into(),
            user: RegisteredUser {
                id: user.id,
                email: user.email.clone(),
                email_confirmed: user.email_confirmed_at.is_some(),
            },
        })
    }

    pub async fn login(&self, payload: &LoginPayload) -> Result<LoginResponse, AppError> {
        let email = payload.email.trim().to_lowercase();
        let session = self.provider.sign_in(&email, &payload.password).await?;
        let profile = self.load_or_create_profile(&session, &email).await;

        tracing::info!(user_id = %session.user.id, "🔑 Login efetuado");
        Ok(LoginResponse {
            message: "Login successful".into(),
            user: SessionUser {
                id: session.user.id,
                email,
                profile,
            },
            session: SessionTokens::from(&session),
        })
    }

    // Criação tardia do perfil a partir dos metadados do provedor
    async fn load_or_create_profile(&self, session: &AuthSession, email: &str) -> Option<UserProfile> {
        match self.profiles.find_by_email(email).await {
            Ok(Some(profile)) => return Some(profile),
            Ok(None) => {}
            Err(e) => {
                tracing::error!(email, "🔥 Falha ao buscar perfil no login: {:?}", e);
                return None;
            }
        }

        let metadata = session.user.metadata();
        let user_type = metadata
            .user_type
            .as_deref()
            .and_then(UserType::parse)
            .unwrap_or_default();
        let new_profile = NewUserProfile {
            id: session.user.id,
            email: email.to_string(),
            first_name: metadata.first_name.unwrap_or_else(|| "User".into()),
            last_name: metadata.last_name.unwrap_or_default(),
            user_type,
            subscription_status: SubscriptionStatus::Free,
            stripe_customer_id: None,
            default_activity_role: UserType::Broker,
        };

        match self.profiles.create(new_profile).await {
            Ok(profile) => {
                tracing::info!(email, "👤 Perfil criado automaticamente no login");
                Some(profile)
            }
            Err(e) => {
                tracing::error!(email, "🔥 Falha na criação automática do perfil: {:?}", e);
                None
            }
        }
    }

    /// Registro de quem pagou como convidado: a sessão de checkout precisa
    /// estar paga; o plano vem do payload ou dos metadados da sessão.
    pub async fn register_after_payment(
        &self,
        payload: &RegisterAfterPaymentPayload,
    ) -> Result<RegisterAfterPaymentResponse, AppError> {
        let email = payload.email.trim().to_lowercase();
        let user_type = parse_user_type(&payload.user_type)?;

        let session = self.subscriptions.verify_session(&payload.session_id).await?;
        if session.payment_status.as_deref() != Some("paid") {
            return Err(AppError::invalid("INVALID_SESSION", "Invalid or unpaid session"));
        }

        let plan_type = payload
            .plan_type
            .clone()
            .or_else(|| session.metadata.get("planType").cloned());
        let status = SubscriptionStatus::from_plan_type(plan_type.as_deref());

        let outcome = self
            .provider
            .sign_up(SignUpRequest {
                email: email.clone(),
                password: payload.password.clone(),
                metadata: UserMetadata {
                    first_name: Some(payload.first_name.clone()),
                    last_name: Some(payload.last_name.clone()),
                    user_type: Some(user_type.as_str().to_string()),
                },
                redirect_to: format!("{}/login?message=email_verified", self.base_url),
            })
            .await?;
        let user_id = outcome.user.id;

        let profile = self
            .profiles
            .create(NewUserProfile {
                id: user_id,
                email: email.clone(),
                first_name: payload.first_name.trim().to_string(),
                last_name: payload.last_name.trim().to_string(),
                user_type,
                subscription_status: status,
                stripe_customer_id: session.customer.clone(),
                default_activity_role: user_type,
            })
            .await?;

        let mut custom_fields = Map::new();
        custom_fields.insert("subscription_plan".into(), json!(plan_type));
        custom_fields.insert("registration_source".into(), json!("Income Goal Calculator (Paid)"));
        custom_fields.insert("user_id".into(), json!(user_id));
        custom_fields.insert("stripe_customer_id".into(), json!(session.customer));
        self.sync_contact_best_effort(ContactInput {
            email: email.clone(),
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            user_type: Some(user_type.as_str().to_string()),
            subscription_status: status,
            custom_fields,
            ..Default::default()
        })
        .await;

        let change = PlanChange {
            event_type: SubscriptionEventType::SubscriptionCreated,
            stripe_customer_id: session.customer.clone(),
            stripe_subscription_id: session.subscription.clone(),
            amount: session.amount_total,
            currency: session.currency.clone(),
            payload: json!({ "sessionId": session.id, "paymentStatus": session.payment_status }),
        };
        self.subscriptions.record_event(user_id, plan_type.as_deref(), change).await;

        let signed_in = self.provider.sign_in(&email, &payload.password).await?;
        tracing::info!(user_id = %user_id, status = status.as_str(), "✅ Conta paga criada");

        Ok(RegisterAfterPaymentResponse {
            success: true,
            message: "Account created successfully".into(),
            token: signed_in.access_token,
            user: SessionUser {
                id: user_id,
                email,
                profile: Some(profile),
            },
        })
    }

    async fn sync_contact_best_effort(&self, input: ContactInput) {
        let email = input.email.clone();
        match self.crm.sync_contact(input).await {
            Ok(_) => tracing::info!(email = %email, "✅ Contato sincronizado com o CRM"),
            Err(e) => tracing::warn!(email = %email, "⚠️ Falha ao sincronizar contato no CRM: {}", e),
        }
    }

    // =========================================================================
    //  SENHA E VERIFICAÇÃO DE E-MAIL
    // =========================================================================

    /// Sempre a mesma resposta, exista a conta ou não.
    pub async fn forgot_password(&self, email: &str) -> &'static str {
        let email = email.trim().to_lowercase();
        let redirect = format!("{}/reset-password", self.base_url);
        if let Err(e) = self.provider.send_password_reset(&email, &redirect).await {
            tracing::warn!("⚠️ Falha ao enviar e-mail de recuperação: {}", e);
        }
        FORGOT_PASSWORD_MESSAGE
    }

    pub async fn reset_password(&self, payload: &ResetPasswordPayload) -> Result<(), AppError> {
        match self.provider.update_password(&payload.access_token, &payload.new_password).await {
            Ok(()) => Ok(()),
            Err(AuthProviderError::Expired | AuthProviderError::Invalid) => {
                Err(AppError::invalid("INVALID_TOKEN", "Invalid or expired reset token"))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Devolve o destino do redirect após conferir o link de verificação.
    pub async fn verify_email(&self, token_hash: Option<&str>, kind: Option<&str>) -> &'static str {
        let (Some(token_hash), Some(kind)) = (token_hash, kind) else {
            return "/login";
        };
        match self.provider.verify_email_otp(token_hash, kind).await {
            Ok(()) => "/login?message=email_verified",
            Err(e) => {
                tracing::warn!("⚠️ Verificação de e-mail falhou: {}", e);
                "/login?error=verification_failed"
            }
        }
    }

    pub async fn resend_verification(&self, email: &str) -> Result<(), AppError> {
        let redirect = format!("{}/app", self.base_url);
        self.provider.resend_verification(email, &redirect).await?;
        Ok(())
    }

    // =========================================================================
    //  PERFIL
    // =========================================================================

    pub async fn update_profile(&self, user_id: Uuid, first_name: &str, last_name: &str) -> Result<UserProfile, AppError> {
        self.profiles
            .update_names(user_id, first_name, last_name)
            .await?
            .ok_or_else(|| AppError::NotFound("User profile not found".into()))
    }

    pub async fn update_activity_role(&self, user_id: Uuid, role: &str) -> Result<UserType, AppError> {
        let role = parse_user_type(role)?;
        self.profiles
            .update_activity_role(user_id, role)
            .await?
            .ok_or_else(|| AppError::NotFound("User profile not found".into()))?;
        Ok(role)
    }
}

fn parse_user_type(raw: &str) -> Result<UserType, AppError> {
    UserType::parse(raw).ok_or_else(|| {
        AppError::invalid("INVALID_USER_TYPE", "User type must be either \"broker\" or \"investor\"")
    })
}
