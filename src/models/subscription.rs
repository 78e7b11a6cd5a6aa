// src/models/subscription.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Status canônico da assinatura, fonte da verdade para liberar recursos.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "subscription_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    #[default]
    Free,
    Monthly,
    Annual,
    Lifetime,
}

impl SubscriptionStatus {
    /// Ramo padrão para `planType` desconhecido ou ausente. Herdado do sistema
    /// anterior e provavelmente um bug latente: quem cai aqui é sempre logado.
    pub const UNRECOGNIZED_PLAN_FALLBACK: SubscriptionStatus = SubscriptionStatus::Monthly;

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Free => "free",
            SubscriptionStatus::Monthly => "monthly",
            SubscriptionStatus::Annual => "annual",
            SubscriptionStatus::Lifetime => "lifetime",
        }
    }

    /// Aceita também `yearly` como sinônimo de `annual`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "free" => Some(SubscriptionStatus::Free),
            "monthly" => Some(SubscriptionStatus::Monthly),
            "annual" | "yearly" => Some(SubscriptionStatus::Annual),
            "lifetime" => Some(SubscriptionStatus::Lifetime),
            _ => None,
        }
    }

    pub fn is_paid(&self) -> bool {
        !matches!(self, SubscriptionStatus::Free)
    }

    /// Tabela de mapeamento plano -> status canônico.
    pub fn from_plan_type(plan_type: Option<&str>) -> Self {
        match plan_type.and_then(PlanType::parse) {
            Some(PlanType::Monthly) => SubscriptionStatus::Monthly,
            Some(PlanType::Yearly) => SubscriptionStatus::Annual,
            Some(PlanType::Lifetime) => SubscriptionStatus::Lifetime,
            None => {
                tracing::warn!(
                    plan_type = ?plan_type,
                    fallback = Self::UNRECOGNIZED_PLAN_FALLBACK.as_str(),
                    "⚠️ planType não reconhecido, aplicando o padrão"
                );
                Self::UNRECOGNIZED_PLAN_FALLBACK
            }
        }
    }

    /// Status canônico de uma mudança de plano: qualquer status de cobrança
    /// diferente de `active` rebaixa para `free`, independente do plano.
    pub fn canonical(plan_type: Option<&str>, billing_status: &str) -> Self {
        if billing_status != "active" {
            return SubscriptionStatus::Free;
        }
        Self::from_plan_type(plan_type)
    }
}

/// Planos vendidos no checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    Monthly,
    Yearly,
    Lifetime,
}

impl PlanType {
    pub const ALL: [PlanType; 3] = [PlanType::Monthly, PlanType::Yearly, PlanType::Lifetime];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Monthly => "monthly",
            PlanType::Yearly => "yearly",
            PlanType::Lifetime => "lifetime",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "monthly" => Some(PlanType::Monthly),
            "yearly" => Some(PlanType::Yearly),
            "lifetime" => Some(PlanType::Lifetime),
            _ => None,
        }
    }

    // Preço em dólares inteiros
    pub fn price(&self) -> u32 {
        match self {
            PlanType::Monthly => 19,
            PlanType::Yearly => 189,
            PlanType::Lifetime => 297,
        }
    }

    /// `None` para o pagamento único (lifetime).
    pub fn interval(&self) -> Option<&'static str> {
        match self {
            PlanType::Monthly => Some("month"),
            PlanType::Yearly => Some("year"),
            PlanType::Lifetime => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PlanType::Monthly => "Monthly Plan",
            PlanType::Yearly => "Yearly Plan",
            PlanType::Lifetime => "Lifetime Access",
        }
    }

    pub fn pricing(&self) -> PricingPlan {
        let mut features = vec![
            "Activity Tracking",
            "Progress Dashboard",
            "Goal Management",
            "Historical Data",
        ];
        match self {
            PlanType::Monthly => {}
            PlanType::Yearly => features.push("2 Months Free"),
            PlanType::Lifetime => features.extend(["Lifetime Access", "Future Updates"]),
        }

        PricingPlan {
            plan_type: *self,
            name: self.display_name().to_string(),
            price: self.price(),
            interval: self.interval().map(str::to_string),
            features: features.into_iter().map(str::to_string).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PricingPlan {
    pub plan_type: PlanType,
    pub name: String,
    pub price: u32,
    pub interval: Option<String>,
    pub features: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "subscription_event_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionEventType {
    CheckoutCompleted,
    SubscriptionCreated,
    SubscriptionUpdated,
    SubscriptionDeleted,
    PaymentSucceeded,
    PaymentFailed,
    ManualFix,
}

// Linha do log de auditoria `subscription_events` (somente inserção)
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_type: SubscriptionEventType,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub plan_type: Option<String>,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    #[schema(value_type = Object)]
    pub event_data: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSubscriptionEvent {
    pub user_id: Uuid,
    pub event_type: SubscriptionEventType,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub plan_type: Option<String>,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub event_data: Value,
}

/// Resposta do caminho de leitura do status da assinatura.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionView {
    /// `active`, `inactive` ou o status ao vivo do Stripe (`past_due`, `canceled`...)
    pub status: String,
    pub plan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_period_end: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_at_period_end: Option<bool>,
}

impl SubscriptionView {
    pub fn active(plan: impl Into<String>) -> Self {
        Self {
            status: "active".to_string(),
            plan: Some(plan.into()),
            current_period_end: None,
            cancel_at_period_end: None,
        }
    }

    pub fn inactive(plan: Option<String>) -> Self {
        Self {
            status: "inactive".to_string(),
            plan,
            current_period_end: None,
            cancel_at_period_end: None,
        }
    }

    pub fn grants_access(&self) -> bool {
        self.plan.is_some() && matches!(self.status.as_str(), "active" | "trialing")
    }
}

// =============================================================================
//  PAYLOADS E RESPOSTAS
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutPayload {
    #[validate(length(min = 1, message = "Plan type is required"))]
    #[schema(example = "monthly")]
    pub plan_type: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifySessionPayload {
    #[validate(length(min = 1, message = "Session ID is required"))]
    pub session_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PlansResponse {
    pub success: bool,
    pub plans: Vec<PricingPlan>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub success: bool,
    pub checkout_url: Option<String>,
    pub session_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubscriptionStatusResponse {
    pub success: bool,
    pub subscription: SubscriptionView,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PortalResponse {
    pub success: bool,
    pub portal_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SuccessMessage {
    pub success: bool,
    pub message: String,
}

impl SuccessMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// Resumo da sessão de checkout, nos nomes do Stripe
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionSummary {
    pub id: String,
    pub payment_status: Option<String>,
    pub customer: Option<String>,
    pub subscription: Option<String>,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifySessionResponse {
    pub success: bool,
    pub session: SessionSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_types_map_to_canonical_statuses_when_active() {
        assert_eq!(SubscriptionStatus::canonical(Some("monthly"), "active"), SubscriptionStatus::Monthly);
        assert_eq!(SubscriptionStatus::canonical(Some("yearly"), "active"), SubscriptionStatus::Annual);
        assert_eq!(SubscriptionStatus::canonical(Some("lifetime"), "active"), SubscriptionStatus::Lifetime);
    }

    #[test]
    fn any_non_active_billing_status_forces_free() {
        for billing_status in ["canceled", "past_due", "incomplete", "unpaid", "trialing", ""] {
            for plan in ["monthly", "yearly", "lifetime", "bogus"] {
                assert_eq!(
                    SubscriptionStatus::canonical(Some(plan), billing_status),
                    SubscriptionStatus::Free,
                    "{plan}/{billing_status}"
                );
            }
        }
    }

    #[test]
    fn unrecognized_plan_uses_named_fallback() {
        assert_eq!(
            SubscriptionStatus::canonical(Some("weekly"), "active"),
            SubscriptionStatus::UNRECOGNIZED_PLAN_FALLBACK
        );
        assert_eq!(
            SubscriptionStatus::canonical(None, "active"),
            SubscriptionStatus::UNRECOGNIZED_PLAN_FALLBACK
        );
    }

    #[test]
    fn yearly_is_an_alias_of_annual() {
        assert_eq!(SubscriptionStatus::parse("yearly"), Some(SubscriptionStatus::Annual));
        assert_eq!(SubscriptionStatus::parse("Annual"), Some(SubscriptionStatus::Annual));
        assert_eq!(SubscriptionStatus::parse("gold"), None);
    }

    #[test]
    fn lifetime_is_a_one_time_payment() {
        let plan = PlanType::Lifetime.pricing();
        assert_eq!(plan.price, 297);
        assert!(plan.interval.is_none());
        assert!(plan.features.iter().any(|f| f == "Future Updates"));
    }
}
