// src/models/goals.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{common::validation::validate_user_type, models::profile::UserType};

// Metas salvas, uma linha por (usuário, tipo)
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserGoals {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_type: UserType,
    #[schema(value_type = Object)]
    pub goal_data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveGoalsPayload {
    #[validate(custom(function = "validate_user_type"))]
    #[schema(example = "broker")]
    pub user_type: String,

    // Documento livre montado pela calculadora no frontend
    #[schema(value_type = Object)]
    pub goal_data: Value,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GoalTypeQuery {
    #[serde(rename = "type")]
    pub user_type: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GoalsResponse {
    pub message: String,
    pub goals: Option<UserGoals>,
}
