// src/services/subscription_service.rs
//
// Reconciliação de assinaturas entre Stripe, o perfil local e o CRM.
//
// Caminho de escrita (`apply_plan_change`): saga em três etapas isoladas
// (perfil, log de auditoria, tags do CRM). Nenhuma etapa desfaz a anterior;
// reentregas do mesmo webhook convergem porque o perfil é sobrescrito e as
// tags são ajustadas por diferença de conjuntos.
//
// Caminho de leitura (`get_subscription_status`): status em cache no perfil,
// depois o último evento de assinatura conferido ao vivo no Stripe. Usuário
// sem perfil é sempre inativo.

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::{
    clients::{
        stripe::{
            metadata_plan_type, metadata_user_id, BillingGateway, CheckoutRequest, CheckoutSession, Invoice,
            StripeSubscription, WebhookEvent,
        },
        ClientError,
    },
    common::error::AppError,
    db::{ProfileStore, SubscriptionEventStore},
    models::{
        crm::TagSync,
        profile::UserProfile,
        subscription::{
            NewSubscriptionEvent, PlanType, PricingPlan, SubscriptionEventType, SubscriptionStatus, SubscriptionView,
        },
    },
    services::crm_service::CrmService,
};

/// Price ids configurados no Stripe; sem eles o checkout usa `price_data`.
#[derive(Debug, Clone, Default)]
pub struct PriceIds {
    pub monthly: Option<String>,
    pub yearly: Option<String>,
    pub lifetime: Option<String>,
}

impl PriceIds {
    pub fn for_plan(&self, plan: PlanType) -> Option<String> {
        match plan {
            PlanType::Monthly => self.monthly.clone(),
            PlanType::Yearly => self.yearly.clone(),
            PlanType::Lifetime => self.lifetime.clone(),
        }
    }
}

/// Dados do evento de cobrança que originou a mudança.
#[derive(Debug, Clone)]
pub struct PlanChange {
    pub event_type: SubscriptionEventType,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub payload: Value,
}

impl PlanChange {
    pub fn new(event_type: SubscriptionEventType, payload: Value) -> Self {
        Self {
            event_type,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            amount: None,
            currency: None,
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrmSync {
    Converged(TagSync),
    ContactNotFound,
    /// CRM desligado ou perfil sem e-mail conhecido.
    Skipped,
    Failed(String),
}

/// Resultado etapa a etapa de `apply_plan_change`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanChangeOutcome {
    pub status: SubscriptionStatus,
    pub profile_updated: bool,
    pub event_recorded: bool,
    pub crm: CrmSync,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Applied(PlanChangeOutcome),
    Recorded,
    Ignored,
}

#[derive(Clone)]
pub struct SubscriptionService {
    profiles: Arc<dyn ProfileStore>,
    events: Arc<dyn SubscriptionEventStore>,
    billing: Arc<dyn BillingGateway>,
    crm: CrmService,
    prices: PriceIds,
    base_url: String,
}

impl SubscriptionService {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        events: Arc<dyn SubscriptionEventStore>,
        billing: Arc<dyn BillingGateway>,
        crm: CrmService,
        prices: PriceIds,
        base_url: &str,
    ) -> Self {
        Self {
            profiles,
            events,
            billing,
            crm,
            prices,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn plans(&self) -> Vec<PricingPlan> {
        PlanType::ALL.iter().map(PlanType::pricing).collect()
    }

    // =========================================================================
    //  CAMINHO DE ESCRITA
    // =========================================================================

    /// Aplica uma mudança de plano. Nunca falha: cada etapa registra o próprio
    /// resultado no `PlanChangeOutcome`.
    pub async fn apply_plan_change(
        &self,
        user_id: Uuid,
        plan_type: Option<&str>,
        billing_status: &str,
        change: PlanChange,
    ) -> PlanChangeOutcome {
        let status = SubscriptionStatus::canonical(plan_type, billing_status);

        // 1. Perfil
        let profile = match self
            .profiles
            .set_subscription_status(user_id, status, change.stripe_customer_id.as_deref())
            .await
        {
            Ok(Some(profile)) => Some(profile),
            Ok(None) => {
                tracing::warn!(user_id = %user_id, "⚠️ Perfil não encontrado ao aplicar mudança de plano");
                None
            }
            Err(e) => {
                tracing::error!(user_id = %user_id, "🔥 Falha ao atualizar o status da assinatura: {:?}", e);
                None
            }
        };
        let profile_updated = profile.is_some();

        // 2. Auditoria
        let event_recorded = self.record_event(user_id, plan_type, change).await;

        // 3. CRM
        let crm = match profile {
            Some(profile) => self.sync_crm(&profile, status).await,
            None => CrmSync::Skipped,
        };

        tracing::info!(
            user_id = %user_id,
            plan_type = ?plan_type,
            billing_status,
            status = status.as_str(),
            profile_updated,
            event_recorded,
            "✅ Mudança de plano aplicada"
        );

        PlanChangeOutcome {
            status,
            profile_updated,
            event_recorded,
            crm,
        }
    }

    /// Acrescenta uma linha ao log de auditoria. Falhas só são logadas.
    pub async fn record_event(&self, user_id: Uuid, plan_type: Option<&str>, change: PlanChange) -> bool {
        let event = NewSubscriptionEvent {
            user_id,
            event_type: change.event_type,
            stripe_customer_id: change.stripe_customer_id,
            stripe_subscription_id: change.stripe_subscription_id,
            plan_type: plan_type.map(str::to_string),
            amount: change.amount,
            currency: change.currency,
            event_data: change.payload,
        };

        match self.events.append(event).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(user_id = %user_id, "🔥 Falha ao registrar evento de assinatura: {:?}", e);
                false
            }
        }
    }

    async fn sync_crm(&self, profile: &UserProfile, status: SubscriptionStatus) -> CrmSync {
        match self.crm.converge_by_email(&profile.email, status).await {
            Ok(Some(sync)) => CrmSync::Converged(sync),
            Ok(None) => CrmSync::ContactNotFound,
            Err(AppError::Upstream(ClientError::NotConfigured(_))) => CrmSync::Skipped,
            Err(e) => {
                tracing::warn!(email = %profile.email, "⚠️ Falha ao sincronizar tags no CRM: {}", e);
                CrmSync::Failed(e.to_string())
            }
        }
    }

    // =========================================================================
    //  CAMINHO DE LEITURA
    // =========================================================================

    pub async fn get_subscription_status(&self, user_id: Uuid) -> SubscriptionView {
        let profile = self.profiles.find_by_id(user_id).await.unwrap_or_else(|e| {
            tracing::warn!(user_id = %user_id, "⚠️ Falha ao ler o perfil: {:?}", e);
            None
        });

        // Sem perfil não há a quem liberar acesso nem cache para corrigir
        let Some(profile) = profile else {
            return SubscriptionView::inactive(None);
        };
        if profile.subscription_status.is_paid() {
            return SubscriptionView::active(profile.subscription_status.as_str());
        }

        let event = self.events.latest_subscription(user_id).await.unwrap_or_else(|e| {
            tracing::warn!(user_id = %user_id, "⚠️ Falha ao ler eventos de assinatura: {:?}", e);
            None
        });
        let Some(event) = event else {
            return SubscriptionView::inactive(None);
        };
        let Some(subscription_id) = event.stripe_subscription_id.as_deref() else {
            return SubscriptionView::inactive(event.plan_type);
        };

        let subscription = match self.billing.retrieve_subscription(subscription_id).await {
            Ok(subscription) => subscription,
            Err(e) => {
                tracing::warn!(user_id = %user_id, subscription_id, "⚠️ Stripe indisponível no status: {}", e);
                return SubscriptionView::inactive(event.plan_type);
            }
        };

        let plan = metadata_plan_type(&subscription.metadata)
            .map(str::to_string)
            .or(event.plan_type);
        let status = SubscriptionStatus::canonical(plan.as_deref(), &subscription.status);

        // Corrige o cache do perfil com o que o Stripe diz agora
        if let Err(e) = self
            .profiles
            .set_subscription_status(user_id, status, subscription.customer.as_deref())
            .await
        {
            tracing::warn!(user_id = %user_id, "⚠️ Falha ao corrigir o status em cache: {:?}", e);
        }

        SubscriptionView {
            status: subscription.status,
            plan,
            current_period_end: subscription.current_period_end,
            cancel_at_period_end: Some(subscription.cancel_at_period_end),
        }
    }

    // =========================================================================
    //  WEBHOOKS
    // =========================================================================

    pub async fn handle_webhook(&self, event: WebhookEvent) -> Result<WebhookOutcome, AppError> {
        tracing::info!(event_id = %event.id, event_type = %event.event_type, "📨 Webhook do Stripe recebido");

        match event.event_type.as_str() {
            "checkout.session.completed" => {
                let session: CheckoutSession = parse_object(&event)?;
                let Some(user_id) = metadata_user_id(&session.metadata) else {
                    tracing::info!(session_id = %session.id, "ℹ️ Checkout de convidado, aguardando o registro");
                    return Ok(WebhookOutcome::Ignored);
                };
                let change = PlanChange {
                    event_type: SubscriptionEventType::CheckoutCompleted,
                    stripe_customer_id: session.customer.clone(),
                    stripe_subscription_id: session.subscription.clone(),
                    amount: session.amount_total,
                    currency: session.currency.clone(),
                    payload: event.data.object.clone(),
                };
                let plan = metadata_plan_type(&session.metadata);
                Ok(WebhookOutcome::Applied(
                    self.apply_plan_change(user_id, plan, "active", change).await,
                ))
            }

            "customer.subscription.created" => {
                let subscription: StripeSubscription = parse_object(&event)?;
                let Some(user_id) = metadata_user_id(&subscription.metadata) else {
                    return Ok(ignored_without_user(&event));
                };
                let change = subscription_change(SubscriptionEventType::SubscriptionCreated, &subscription, &event);
                self.record_event(user_id, metadata_plan_type(&subscription.metadata), change)
                    .await;
                Ok(WebhookOutcome::Recorded)
            }

            "customer.subscription.updated" | "customer.subscription.deleted" => {
                let subscription: StripeSubscription = parse_object(&event)?;
                let Some(user_id) = metadata_user_id(&subscription.metadata) else {
                    return Ok(ignored_without_user(&event));
                };
                let (event_type, billing_status) = if event.event_type.ends_with("deleted") {
                    (SubscriptionEventType::SubscriptionDeleted, "canceled")
                } else {
                    (SubscriptionEventType::SubscriptionUpdated, subscription.status.as_str())
                };
                let change = subscription_change(event_type, &subscription, &event);
                let plan = metadata_plan_type(&subscription.metadata);
                Ok(WebhookOutcome::Applied(
                    self.apply_plan_change(user_id, plan, billing_status, change).await,
                ))
            }

            "invoice.payment_succeeded" | "invoice.payment_failed" => {
                let invoice: Invoice = parse_object(&event)?;
                let Some(subscription_id) = invoice.subscription.as_deref() else {
                    return Ok(WebhookOutcome::Ignored);
                };
                let subscription = self.billing.retrieve_subscription(subscription_id).await?;
                let Some(user_id) = metadata_user_id(&subscription.metadata) else {
                    return Ok(ignored_without_user(&event));
                };

                let event_type = if event.event_type.ends_with("succeeded") {
                    SubscriptionEventType::PaymentSucceeded
                } else {
                    tracing::warn!(user_id = %user_id, invoice_id = %invoice.id, "⚠️ Pagamento de fatura falhou");
                    SubscriptionEventType::PaymentFailed
                };
                let change = PlanChange {
                    event_type,
                    stripe_customer_id: invoice.customer.clone(),
                    stripe_subscription_id: Some(subscription.id.clone()),
                    amount: invoice.amount_paid,
                    currency: invoice.currency.clone(),
                    payload: event.data.object.clone(),
                };
                self.record_event(user_id, metadata_plan_type(&subscription.metadata), change)
                    .await;
                Ok(WebhookOutcome::Recorded)
            }

            other => {
                tracing::info!(event_type = other, "ℹ️ Evento do Stripe ignorado");
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    // =========================================================================
    //  CHECKOUT E PORTAL
    // =========================================================================

    /// Sem usuário, o checkout é de convidado e termina em `/register-success`.
    pub async fn create_checkout(
        &self,
        customer: Option<(Uuid, String)>,
        plan_type: &str,
    ) -> Result<CheckoutSession, AppError> {
        let plan = PlanType::parse(plan_type).ok_or_else(|| AppError::invalid("INVALID_PLAN", "Invalid plan type"))?;

        let success_url = match customer {
            Some(_) => format!("{}/app?upgrade_success=1&session_id={{CHECKOUT_SESSION_ID}}", self.base_url),
            None => format!(
                "{}/register-success?session_id={{CHECKOUT_SESSION_ID}}&plan={}",
                self.base_url,
                plan.as_str()
            ),
        };
        let (user_id, customer_email) = customer.map(|(id, email)| (Some(id), Some(email))).unwrap_or_default();

        let request = CheckoutRequest {
            plan,
            price_id: self.prices.for_plan(plan),
            user_id,
            customer_email,
            success_url,
            cancel_url: format!("{}/pricing?canceled=1", self.base_url),
        };
        Ok(self.billing.create_checkout_session(request).await?)
    }

    pub async fn billing_portal(&self, user_id: Uuid) -> Result<String, AppError> {
        let profile = self
            .profiles
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;

        let customer_id = profile
            .stripe_customer_id
            .filter(|id| !id.is_empty() && id != "temp_customer")
            .ok_or_else(|| AppError::invalid("NO_BILLING_ACCOUNT", "No billing account found"))?;

        let portal = self
            .billing
            .create_portal_session(&customer_id, &format!("{}/profile", self.base_url))
            .await?;
        Ok(portal.url)
    }

    pub async fn cancel(&self, user_id: Uuid) -> Result<StripeSubscription, AppError> {
        self.set_cancel_at_period_end(user_id, true).await
    }

    pub async fn reactivate(&self, user_id: Uuid) -> Result<StripeSubscription, AppError> {
        self.set_cancel_at_period_end(user_id, false).await
    }

    async fn set_cancel_at_period_end(&self, user_id: Uuid, cancel: bool) -> Result<StripeSubscription, AppError> {
        let subscription_id = self
            .events
            .latest_subscription(user_id)
            .await?
            .and_then(|event| event.stripe_subscription_id)
            .ok_or_else(|| AppError::invalid("NO_SUBSCRIPTION", "No active subscription found"))?;

        let subscription = self.billing.set_cancel_at_period_end(&subscription_id, cancel).await?;
        tracing::info!(user_id = %user_id, subscription_id = %subscription.id, cancel, "💳 cancel_at_period_end alterado");
        Ok(subscription)
    }

    pub async fn verify_session(&self, session_id: &str) -> Result<CheckoutSession, AppError> {
        match self.billing.retrieve_checkout_session(session_id).await {
            Ok(session) => Ok(session),
            Err(e) if e.status() == Some(404) => Err(AppError::NotFound("Checkout session not found".into())),
            Err(e) => Err(e.into()),
        }
    }
}

fn parse_object<T: for<'de> serde::Deserialize<'de>>(event: &WebhookEvent) -> Result<T, AppError> {
    event.object().map_err(|e| {
        tracing::warn!(event_id = %event.id, "⚠️ Objeto do webhook ilegível: {}", e);
        AppError::invalid("INVALID_PAYLOAD", format!("Invalid {} payload", event.event_type))
    })
}

fn ignored_without_user(event: &WebhookEvent) -> WebhookOutcome {
    tracing::info!(event_id = %event.id, event_type = %event.event_type, "ℹ️ Evento sem userId nos metadados");
    WebhookOutcome::Ignored
}

fn subscription_change(
    event_type: SubscriptionEventType,
    subscription: &StripeSubscription,
    event: &WebhookEvent,
) -> PlanChange {
    PlanChange {
        event_type,
        stripe_customer_id: subscription.customer.clone(),
        stripe_subscription_id: Some(subscription.id.clone()),
        amount: None,
        currency: None,
        payload: event.data.object.clone(),
    }
}
