// src/models/profile.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::subscription::SubscriptionStatus;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "user_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    #[default]
    Broker,
    Investor,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Broker => "broker",
            UserType::Investor => "investor",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "broker" => Some(UserType::Broker),
            "investor" => Some(UserType::Investor),
            _ => None,
        }
    }
}

// Representa o perfil vindo da tabela `users`
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub user_type: UserType,
    pub subscription_status: SubscriptionStatus,
    pub stripe_customer_id: Option<String>,
    pub default_activity_role: UserType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

// Dados para criar um perfil (registro ou criação tardia no login)
#[derive(Debug, Clone)]
pub struct NewUserProfile {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub user_type: UserType,
    pub subscription_status: SubscriptionStatus,
    pub stripe_customer_id: Option<String>,
    pub default_activity_role: UserType,
}
