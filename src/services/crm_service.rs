// src/services/crm_service.rs

use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::{
    clients::highlevel::{CrmGateway, UpsertedContact},
    common::error::AppError,
    models::{
        crm::{is_subscription_tag, subscription_tag, Contact, ContactInput, TagSync},
        subscription::SubscriptionStatus,
    },
};

/// Diferença entre as tags atuais de um contato e a tag de assinatura alvo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPlan {
    pub remove: Vec<String>,
    pub add: Option<&'static str>,
}

/// Remove toda tag de assinatura diferente do alvo e adiciona o alvo se faltar.
/// Tags que não são da calculadora ficam intactas.
pub fn plan_tag_convergence(current: &[String], target: SubscriptionStatus) -> TagPlan {
    let target_tag = subscription_tag(target);
    let remove = current
        .iter()
        .filter(|tag| is_subscription_tag(tag) && tag.as_str() != target_tag)
        .cloned()
        .collect();
    let add = (!current.iter().any(|tag| tag == target_tag)).then_some(target_tag);
    TagPlan { remove, add }
}

#[derive(Clone)]
pub struct CrmService {
    gateway: Arc<dyn CrmGateway>,
}

impl CrmService {
    pub fn new(gateway: Arc<dyn CrmGateway>) -> Self {
        Self { gateway }
    }

    // =========================================================================
    //  TAGS DE ASSINATURA
    // =========================================================================

    pub async fn converge_tags(&self, contact_id: &str, status: SubscriptionStatus) -> Result<TagSync, AppError> {
        let old_tags = self.gateway.get_contact_tags(contact_id).await?;
        let plan = plan_tag_convergence(&old_tags, status);

        for tag in &plan.remove {
            self.gateway.remove_tag(contact_id, tag).await?;
        }
        if let Some(tag) = plan.add {
            self.gateway.add_tag(contact_id, tag).await?;
        }

        tracing::info!(
            contact_id,
            removed = ?plan.remove,
            new_tag = subscription_tag(status),
            "🏷️ Tags de assinatura convergidas"
        );

        Ok(TagSync {
            contact_id: contact_id.to_string(),
            old_tags,
            removed: plan.remove,
            added: plan.add.map(str::to_string),
            new_tag: subscription_tag(status).to_string(),
        })
    }

    /// `None` quando não existe contato com esse e-mail.
    pub async fn converge_by_email(&self, email: &str, status: SubscriptionStatus) -> Result<Option<TagSync>, AppError> {
        match self.gateway.find_contact_by_email(email).await? {
            Some(contact) => self.converge_tags(&contact.id, status).await.map(Some),
            None => Ok(None),
        }
    }

    // =========================================================================
    //  CONTATOS
    // =========================================================================

    /// Cria ou atualiza o contato e converge a tag para o status informado.
    /// Falha na etapa de tags é logada e devolvida como `None`.
    pub async fn sync_contact(&self, input: ContactInput) -> Result<(UpsertedContact, Option<TagSync>), AppError> {
        let upserted = self.gateway.upsert_contact(&input).await?;

        let tags = match self.converge_tags(&upserted.contact.id, input.subscription_status).await {
            Ok(sync) => Some(sync),
            Err(e) => {
                tracing::warn!(email = %input.email, "⚠️ Falha ao aplicar a tag de assinatura: {}", e);
                None
            }
        };

        Ok((upserted, tags))
    }

    /// Registra plano e status nos campos customizados e converge a tag.
    /// `plan_type` aceita os status canônicos e `yearly`.
    pub async fn track_subscription(
        &self,
        email: &str,
        plan_type: &str,
        billing_status: &str,
    ) -> Result<Option<TagSync>, AppError> {
        let plan = SubscriptionStatus::parse(plan_type)
            .ok_or_else(|| AppError::invalid("INVALID_PLAN", format!("Unknown plan type: {plan_type}")))?;
        let status = if billing_status == "active" { plan } else { SubscriptionStatus::Free };

        let Some(contact) = self.gateway.find_contact_by_email(email).await? else {
            tracing::info!(email, "⚠️ Contato não encontrado para registrar a assinatura");
            return Ok(None);
        };

        let mut fields = Map::new();
        fields.insert("subscription_plan".into(), json!(plan_type));
        fields.insert("subscription_status".into(), json!(status.as_str()));
        fields.insert("subscription_date".into(), json!(chrono::Utc::now().to_rfc3339()));
        self.gateway.update_custom_fields(&contact.id, fields).await?;

        let sync = self.converge_tags(&contact.id, status).await?;
        tracing::info!(email, plan_type, billing_status, tag = %sync.new_tag, "✅ Assinatura registrada no CRM");
        Ok(Some(sync))
    }

    pub async fn find_contact(&self, email: &str) -> Result<Contact, AppError> {
        self.gateway
            .find_contact_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound("Contact not found in HighLevel".into()))
    }

    pub async fn contact_tags(&self, email: &str) -> Result<(Contact, Vec<String>), AppError> {
        let contact = self.find_contact(email).await?;
        let tags = self.gateway.get_contact_tags(&contact.id).await?;
        Ok((contact, tags))
    }

    pub async fn add_note(&self, contact_id: &str, text: &str) -> Result<Value, AppError> {
        Ok(self.gateway.create_note(contact_id, text).await?)
    }

    pub async fn test_connection(&self) -> Result<bool, AppError> {
        Ok(self.gateway.test_connection().await?)
    }
}
