// src/clients/stripe.rs

use std::collections::HashMap;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    clients::{ClientError, read_json},
    models::subscription::PlanType,
};

const SERVICE: &str = "stripe";
const STRIPE_API_URL: &str = "https://api.stripe.com/v1";

/// Janela aceita entre o timestamp assinado e o relógio local.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

// =============================================================================
//  OBJETOS DO STRIPE (somente os campos usados)
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Invoice {
    pub id: String,
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub amount_paid: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortalSession {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    pub object: Value,
}

impl WebhookEvent {
    pub fn object<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.object.clone())
    }
}

/// Metadados gravados no checkout e copiados para a assinatura.
pub fn metadata_user_id(metadata: &HashMap<String, String>) -> Option<Uuid> {
    metadata.get("userId").and_then(|raw| Uuid::parse_str(raw).ok())
}

pub fn metadata_plan_type(metadata: &HashMap<String, String>) -> Option<&str> {
    metadata.get("planType").map(String::as_str)
}

// =============================================================================
//  GATEWAY
// =============================================================================

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub plan: PlanType,
    // Sem price id configurado o preço vai inline (`price_data`)
    pub price_id: Option<String>,
    pub user_id: Option<Uuid>,
    pub customer_email: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

#[async_trait]
pub trait BillingGateway: Send + Sync {
    async fn create_checkout_session(&self, request: CheckoutRequest) -> Result<CheckoutSession, ClientError>;
    async fn retrieve_checkout_session(&self, session_id: &str) -> Result<CheckoutSession, ClientError>;
    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<PortalSession, ClientError>;
    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<StripeSubscription, ClientError>;
    async fn set_cancel_at_period_end(
        &self,
        subscription_id: &str,
        cancel: bool,
    ) -> Result<StripeSubscription, ClientError>;
}

#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    base_url: String,
}

impl StripeClient {
    pub fn new(http: reqwest::Client, secret_key: &str) -> Self {
        Self {
            http,
            secret_key: secret_key.to_string(),
            base_url: STRIPE_API_URL.to_string(),
        }
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, ClientError> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(ClientError::transport(SERVICE))?;
        read_json(SERVICE, response).await
    }

    async fn post_form<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T, ClientError> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await
            .map_err(ClientError::transport(SERVICE))?;
        read_json(SERVICE, response).await
    }
}

#[async_trait]
impl BillingGateway for StripeClient {
    async fn create_checkout_session(&self, request: CheckoutRequest) -> Result<CheckoutSession, ClientError> {
        let form = checkout_form(&request);
        let session: CheckoutSession = self.post_form("/checkout/sessions", &form).await?;
        tracing::info!(
            session_id = %session.id,
            plan = request.plan.as_str(),
            "💳 Sessão de checkout criada"
        );
        Ok(session)
    }

    async fn retrieve_checkout_session(&self, session_id: &str) -> Result<CheckoutSession, ClientError> {
        self.get(&format!("/checkout/sessions/{session_id}")).await
    }

    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<PortalSession, ClientError> {
        let form = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("return_url".to_string(), return_url.to_string()),
        ];
        self.post_form("/billing_portal/sessions", &form).await
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<StripeSubscription, ClientError> {
        self.get(&format!("/subscriptions/{subscription_id}")).await
    }

    async fn set_cancel_at_period_end(
        &self,
        subscription_id: &str,
        cancel: bool,
    ) -> Result<StripeSubscription, ClientError> {
        let form = vec![("cancel_at_period_end".to_string(), cancel.to_string())];
        self.post_form(&format!("/subscriptions/{subscription_id}"), &form).await
    }
}

/// Monta o formulário de `POST /v1/checkout/sessions`.
pub fn checkout_form(request: &CheckoutRequest) -> Vec<(String, String)> {
    let plan = request.plan;
    let user_ref = request
        .user_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "guest".to_string());

    let mut form: Vec<(String, String)> = Vec::new();
    let mut push = |key: &str, value: String| form.push((key.to_string(), value));

    match &request.price_id {
        Some(price_id) => push("line_items[0][price]", price_id.clone()),
        None => {
            push("line_items[0][price_data][currency]", "usd".into());
            push("line_items[0][price_data][unit_amount]", (u64::from(plan.price()) * 100).to_string());
            push("line_items[0][price_data][product_data][name]", format!("Income Goal Calculator Pro - {}", plan.display_name()));
            if let Some(interval) = plan.interval() {
                push("line_items[0][price_data][recurring][interval]", interval.into());
            }
        }
    }
    push("line_items[0][quantity]", "1".into());

    let mode = if plan.interval().is_some() { "subscription" } else { "payment" };
    push("mode", mode.into());
    push("success_url", request.success_url.clone());
    push("cancel_url", request.cancel_url.clone());
    push("metadata[userId]", user_ref.clone());
    push("metadata[planType]", plan.as_str().into());
    push("automatic_tax[enabled]", "true".into());

    if let Some(email) = &request.customer_email {
        push("customer_email", email.clone());
    }

    if plan.interval().is_some() {
        push("subscription_data[metadata][userId]", user_ref);
        push("subscription_data[metadata][planType]", plan.as_str().into());
        push("billing_address_collection", "required".into());
    }

    form
}

// =============================================================================
//  ASSINATURA DOS WEBHOOKS
// =============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Unable to extract timestamp and signatures from header")]
    Malformed,

    #[error("Timestamp outside the tolerance zone")]
    OutsideTolerance,

    #[error("No signatures found matching the expected signature for payload")]
    Mismatch,
}

/// Verifica o cabeçalho `Stripe-Signature` (`t=<unix>,v1=<hex>[,v1=...]`):
/// HMAC-SHA256 de `"{t}.{payload}"` com o segredo do endpoint.
pub fn verify_webhook_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<Vec<u8>> = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }
    if now.abs_diff(timestamp) > SIGNATURE_TOLERANCE_SECS.unsigned_abs() {
        return Err(SignatureError::OutsideTolerance);
    }

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Mismatch)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);

    // Comparação em tempo constante
    if signatures.iter().any(|sig| mac.clone().verify_slice(sig).is_ok()) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

#[cfg(test)]
pub(crate) fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}
