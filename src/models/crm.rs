// src/models/crm.rs
//
// Contatos e tags do CRM externo (HighLevel). O contato é chaveado pelo e-mail
// e carrega exatamente uma tag de assinatura da calculadora.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::subscription::SubscriptionStatus;

pub const TAG_FREE: &str = "income-goals-calculator-free";
pub const TAG_MONTHLY: &str = "income-goals-calculator-monthly";
pub const TAG_ANNUAL: &str = "income-goals-calculator-annual";
pub const TAG_LIFETIME: &str = "income-goals-calculator-lifetime";

pub const ALL_SUBSCRIPTION_TAGS: [&str; 4] = [TAG_FREE, TAG_MONTHLY, TAG_ANNUAL, TAG_LIFETIME];

pub fn subscription_tag(status: SubscriptionStatus) -> &'static str {
    match status {
        SubscriptionStatus::Free => TAG_FREE,
        SubscriptionStatus::Monthly => TAG_MONTHLY,
        SubscriptionStatus::Annual => TAG_ANNUAL,
        SubscriptionStatus::Lifetime => TAG_LIFETIME,
    }
}

pub fn is_subscription_tag(tag: &str) -> bool {
    ALL_SUBSCRIPTION_TAGS.contains(&tag)
}

/// Tabela exposta nas respostas (`yearly` incluso como sinônimo de `annual`).
pub fn available_tags() -> BTreeMap<&'static str, &'static str> {
    BTreeMap::from([
        ("free", TAG_FREE),
        ("monthly", TAG_MONTHLY),
        ("annual", TAG_ANNUAL),
        ("yearly", TAG_ANNUAL),
        ("lifetime", TAG_LIFETIME),
    ])
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

// Dados enviados ao CRM na criação/atualização de contato
#[derive(Debug, Clone, Default)]
pub struct ContactInput {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub user_type: Option<String>,
    pub subscription_status: SubscriptionStatus,
    pub custom_fields: Map<String, Value>,
}

/// Resultado da convergência de tags de um contato.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TagSync {
    pub contact_id: String,
    pub old_tags: Vec<String>,
    pub removed: Vec<String>,
    pub added: Option<String>,
    pub new_tag: String,
}

// =============================================================================
//  PAYLOADS
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpsertContactPayload {
    #[validate(email(message = "Email is required"))]
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub user_type: Option<String>,
    #[serde(default)]
    pub subscription_status: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub custom_fields: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrackSubscriptionPayload {
    #[validate(email(message = "Email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "planType is required"))]
    pub plan_type: String,
    #[validate(length(min = 1, message = "status is required"))]
    pub status: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContactNotePayload {
    #[validate(length(min = 1, message = "Note text is required"))]
    pub note_text: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionTagsPayload {
    #[validate(email(message = "Email is required"))]
    pub email: String,
    #[serde(default)]
    pub subscription_status: Option<String>,
}

// =============================================================================
//  RESPOSTAS
// =============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct ConnectionResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpsertContactResponse {
    pub success: bool,
    pub contact: Contact,
    pub tag_result: Option<TagSync>,
    pub subscription_tag: String,
    #[schema(value_type = Object)]
    pub available_tags: BTreeMap<&'static str, &'static str>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ContactResponse {
    pub success: bool,
    pub contact: Contact,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContactTagsResponse {
    pub success: bool,
    pub email: Option<String>,
    pub contact_id: String,
    pub all_tags: Vec<String>,
    pub subscription_tags: Vec<String>,
    #[serde(rename = "hasIGCTags")]
    pub has_subscription_tags: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub success: bool,
    pub message: String,
    pub contact: Contact,
    pub tag_result: Option<TagSync>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NoteResponse {
    pub success: bool,
    #[schema(value_type = Object)]
    pub note: Value,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrackSubscriptionResponse {
    pub success: bool,
    pub message: String,
    pub tag_result: Option<TagSync>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionTagsResponse {
    pub success: bool,
    pub contact_id: String,
    pub email: Option<String>,
    pub current_tags: Vec<String>,
    pub tag_result: Option<TagSync>,
    #[schema(value_type = Object)]
    pub available_tags: BTreeMap<&'static str, &'static str>,
}
