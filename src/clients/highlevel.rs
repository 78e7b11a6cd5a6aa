// src/clients/highlevel.rs

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::{
    clients::{ClientError, expect_success, read_json},
    models::crm::{Contact, ContactInput},
};

const SERVICE: &str = "highlevel";
pub const DEFAULT_API_URL: &str = "https://rest.gohighlevel.com/v1";

/// Contato criado ou atualizado por `upsert_contact`.
#[derive(Debug, Clone)]
pub struct UpsertedContact {
    pub contact: Contact,
    pub created: bool,
}

#[async_trait]
pub trait CrmGateway: Send + Sync {
    /// Busca exata por e-mail e, se nada bater, busca textual (`query`).
    async fn find_contact_by_email(&self, email: &str) -> Result<Option<Contact>, ClientError>;
    async fn get_contact_tags(&self, contact_id: &str) -> Result<Vec<String>, ClientError>;
    async fn add_tag(&self, contact_id: &str, tag: &str) -> Result<(), ClientError>;
    async fn remove_tag(&self, contact_id: &str, tag: &str) -> Result<(), ClientError>;
    async fn upsert_contact(&self, input: &ContactInput) -> Result<UpsertedContact, ClientError>;
    async fn update_custom_fields(&self, contact_id: &str, fields: Map<String, Value>) -> Result<(), ClientError>;
    async fn create_note(&self, contact_id: &str, body: &str) -> Result<Value, ClientError>;
    async fn test_connection(&self) -> Result<bool, ClientError>;
}

#[derive(Clone)]
pub struct HighLevelClient {
    http: reqwest::Client,
    base_url: String,
    // Sem chave o CRM fica desligado e todas as chamadas devolvem NotConfigured
    api_key: Option<String>,
    location_id: Option<String>,
}

#[derive(Deserialize)]
struct ContactList {
    #[serde(default)]
    contacts: Vec<Contact>,
}

#[derive(Deserialize)]
struct ContactEnvelope {
    contact: Contact,
}

impl HighLevelClient {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: Option<String>, location_id: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            location_id,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> Result<reqwest::RequestBuilder, ClientError> {
        let api_key = self.api_key.as_deref().ok_or(ClientError::NotConfigured("HighLevel"))?;
        Ok(self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(api_key))
    }

    async fn search(&self, param: &str, email: &str) -> Result<Option<Contact>, ClientError> {
        let mut query = vec![(param, email)];
        if let Some(location) = self.location_id.as_deref() {
            query.push(("locationId", location));
        }

        let response = self
            .request(reqwest::Method::GET, "/contacts")?
            .query(&query)
            .send()
            .await
            .map_err(ClientError::transport(SERVICE))?;
        let list: ContactList = read_json(SERVICE, response).await?;

        Ok(list.contacts.into_iter().find(|c| {
            c.email
                .as_deref()
                .is_some_and(|candidate| candidate.eq_ignore_ascii_case(email))
        }))
    }

    async fn tags_request(&self, method: reqwest::Method, contact_id: &str, tag: &str) -> Result<(), ClientError> {
        let response = self
            .request(method, &format!("/contacts/{contact_id}/tags"))?
            .json(&json!({ "tags": [tag] }))
            .send()
            .await
            .map_err(ClientError::transport(SERVICE))?;
        expect_success(SERVICE, response).await
    }
}

#[async_trait]
impl CrmGateway for HighLevelClient {
    async fn find_contact_by_email(&self, email: &str) -> Result<Option<Contact>, ClientError> {
        let email = email.to_lowercase();
        if let Some(contact) = self.search("email", &email).await? {
            return Ok(Some(contact));
        }

        let found = self.search("query", &email).await?;
        if found.is_none() {
            tracing::info!(email = %email, "⚠️ Contato não encontrado no HighLevel");
        }
        Ok(found)
    }

    async fn get_contact_tags(&self, contact_id: &str) -> Result<Vec<String>, ClientError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/contacts/{contact_id}"))?
            .send()
            .await
            .map_err(ClientError::transport(SERVICE))?;
        let envelope: ContactEnvelope = read_json(SERVICE, response).await?;
        Ok(envelope.contact.tags)
    }

    async fn add_tag(&self, contact_id: &str, tag: &str) -> Result<(), ClientError> {
        self.tags_request(reqwest::Method::POST, contact_id, tag).await?;
        tracing::info!(contact_id, tag, "🏷️ Tag adicionada");
        Ok(())
    }

    async fn remove_tag(&self, contact_id: &str, tag: &str) -> Result<(), ClientError> {
        self.tags_request(reqwest::Method::DELETE, contact_id, tag).await?;
        tracing::info!(contact_id, tag, "🏷️ Tag removida");
        Ok(())
    }

    async fn upsert_contact(&self, input: &ContactInput) -> Result<UpsertedContact, ClientError> {
        let existing = self.find_contact_by_email(&input.email).await?;
        let body = contact_body(input, self.location_id.as_deref());

        match existing {
            Some(current) => {
                let response = self
                    .request(reqwest::Method::PUT, &format!("/contacts/{}", current.id))?
                    .json(&body)
                    .send()
                    .await
                    .map_err(ClientError::transport(SERVICE))?;
                expect_success(SERVICE, response).await?;
                tracing::info!(email = %input.email, "✅ Contato atualizado no HighLevel");
                Ok(UpsertedContact {
                    contact: current,
                    created: false,
                })
            }
            None => {
                let response = self
                    .request(reqwest::Method::POST, "/contacts")?
                    .json(&body)
                    .send()
                    .await
                    .map_err(ClientError::transport(SERVICE))?;
                let envelope: ContactEnvelope = read_json(SERVICE, response).await?;
                tracing::info!(email = %input.email, "✅ Contato criado no HighLevel");
                Ok(UpsertedContact {
                    contact: envelope.contact,
                    created: true,
                })
            }
        }
    }

    async fn update_custom_fields(&self, contact_id: &str, fields: Map<String, Value>) -> Result<(), ClientError> {
        let response = self
            .request(reqwest::Method::PUT, &format!("/contacts/{contact_id}"))?
            .json(&json!({ "customFields": fields }))
            .send()
            .await
            .map_err(ClientError::transport(SERVICE))?;
        expect_success(SERVICE, response).await
    }

    async fn create_note(&self, contact_id: &str, body: &str) -> Result<Value, ClientError> {
        let response = self
            .request(reqwest::Method::POST, &format!("/contacts/{contact_id}/notes"))?
            .json(&json!({ "body": body, "userId": "system" }))
            .send()
            .await
            .map_err(ClientError::transport(SERVICE))?;
        read_json(SERVICE, response).await
    }

    async fn test_connection(&self) -> Result<bool, ClientError> {
        let response = self
            .request(reqwest::Method::GET, "/locations")?
            .send()
            .await
            .map_err(ClientError::transport(SERVICE))?;
        Ok(response.status().is_success())
    }
}

/// Corpo de criação/atualização de contato. Os campos fixos sobrescrevem os
/// enviados pelo chamador.
pub fn contact_body(input: &ContactInput, location_id: Option<&str>) -> Value {
    let mut custom_fields = input.custom_fields.clone();
    custom_fields.insert("source".into(), json!("Income Goal Calculator"));
    custom_fields.insert("registration_date".into(), json!(Utc::now().to_rfc3339()));
    custom_fields.insert(
        "user_type".into(),
        json!(input.user_type.as_deref().unwrap_or("broker")),
    );
    custom_fields.insert(
        "subscription_status".into(),
        json!(input.subscription_status.as_str()),
    );

    let mut body = json!({
        "email": input.email.to_lowercase(),
        "firstName": input.first_name,
        "lastName": input.last_name,
        "customFields": custom_fields,
    });
    if let Some(location) = location_id {
        body["locationId"] = json!(location);
    }
    if let Some(phone) = &input.phone {
        body["phone"] = json!(phone);
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::subscription::SubscriptionStatus;

    #[test]
    fn contact_body_forces_fixed_custom_fields() {
        let mut custom_fields = Map::new();
        custom_fields.insert("source".into(), json!("spoofed"));
        custom_fields.insert("user_id".into(), json!("abc"));

        let input = ContactInput {
            email: "Investor@Example.com".into(),
            first_name: "Ana".into(),
            last_name: "Lima".into(),
            user_type: Some("investor".into()),
            subscription_status: SubscriptionStatus::Annual,
            custom_fields,
            ..Default::default()
        };

        let body = contact_body(&input, Some("loc_1"));
        assert_eq!(body["email"], "investor@example.com");
        assert_eq!(body["locationId"], "loc_1");
        assert_eq!(body["customFields"]["source"], "Income Goal Calculator");
        assert_eq!(body["customFields"]["subscription_status"], "annual");
        assert_eq!(body["customFields"]["user_id"], "abc");
        assert!(body.get("phone").is_none());
    }

    #[tokio::test]
    async fn unconfigured_client_refuses_calls() {
        let client = HighLevelClient::new(reqwest::Client::new(), DEFAULT_API_URL, None, None);
        let result = client.find_contact_by_email("a@b.com").await;
        assert!(matches!(result, Err(ClientError::NotConfigured(_))));
    }
}
