// src/models/activities.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::profile::UserType;

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyActivity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_type: UserType,
    pub activity_date: NaiveDate,
    pub attempts: i32,
    pub contacts: i32,
    pub appointments: i32,
    pub contracts: i32,
    pub closings: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Os cinco contadores do funil, já validados (não negativos).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivityCounts {
    pub attempts: i32,
    pub contacts: i32,
    pub appointments: i32,
    pub contracts: i32,
    pub closings: i32,
}

// Corpo de POST /save e PUT /update/{date}. Em /update a data vem do path.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveActivityPayload {
    #[schema(example = "2025-03-14")]
    pub date: Option<String>,

    #[validate(range(min = 0, message = "attempts must be a non-negative number"))]
    pub attempts: Option<i32>,
    #[validate(range(min = 0, message = "contacts must be a non-negative number"))]
    pub contacts: Option<i32>,
    #[validate(range(min = 0, message = "appointments must be a non-negative number"))]
    pub appointments: Option<i32>,
    #[validate(range(min = 0, message = "contracts must be a non-negative number"))]
    pub contracts: Option<i32>,
    #[validate(range(min = 0, message = "closings must be a non-negative number"))]
    pub closings: Option<i32>,

    #[schema(example = "broker")]
    pub user_type: Option<String>,
}

impl SaveActivityPayload {
    // Campos ausentes contam como zero
    pub fn counts(&self) -> ActivityCounts {
        ActivityCounts {
            attempts: self.attempts.unwrap_or(0),
            contacts: self.contacts.unwrap_or(0),
            appointments: self.appointments.unwrap_or(0),
            contracts: self.contracts.unwrap_or(0),
            closings: self.closings.unwrap_or(0),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct ActivityListQuery {
    pub limit: Option<i64>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub user_type: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct ActivityStatsQuery {
    /// Janela em dias, padrão 30
    pub period: Option<i64>,
    pub user_type: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRates {
    pub attempt_to_contact: f64,
    pub contact_to_appointment: f64,
    pub appointment_to_contract: f64,
    pub contract_to_closing: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityStats {
    pub total_days: u32,
    pub average_attempts: f64,
    pub average_contacts: f64,
    pub average_appointments: f64,
    pub total_contracts: i64,
    pub total_closings: i64,
    pub conversion_rates: ConversionRates,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ActivityResponse {
    pub message: String,
    pub activity: DailyActivity,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ActivityListResponse {
    pub message: String,
    pub activities: Vec<DailyActivity>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ActivityStatsResponse {
    pub message: String,
    pub stats: ActivityStats,
    pub period: String,
}
