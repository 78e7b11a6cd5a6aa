// src/services/goal_service.rs

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::{
    common::{error::AppError, validation::user_type_or_default},
    db::GoalStore,
    models::{goals::UserGoals, profile::UserType},
};

#[derive(Clone)]
pub struct GoalService {
    repo: Arc<dyn GoalStore>,
}

impl GoalService {
    pub fn new(repo: Arc<dyn GoalStore>) -> Self {
        Self { repo }
    }

    pub async fn save(&self, user_id: Uuid, user_type: &str, goal_data: &Value) -> Result<UserGoals, AppError> {
        let user_type = user_type_or_default(Some(user_type))?;
        if goal_data.is_null() {
            return Err(AppError::invalid("VALIDATION_ERROR", "User type and goal data are required"));
        }
        let saved = self.repo.upsert(user_id, user_type, goal_data).await?;
        tracing::info!(user_id = %user_id, user_type = user_type.as_str(), "🎯 Metas salvas");
        Ok(saved)
    }

    /// Sem tipo, devolve a linha atualizada mais recentemente.
    pub async fn load(&self, user_id: Uuid, user_type: Option<&str>) -> Result<Option<UserGoals>, AppError> {
        let user_type = parse_optional(user_type)?;
        self.repo.find(user_id, user_type).await
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<UserGoals>, AppError> {
        self.repo.list(user_id).await
    }

    /// Sem tipo, apaga todas as metas do usuário.
    pub async fn delete(&self, user_id: Uuid, user_type: Option<&str>) -> Result<u64, AppError> {
        let user_type = parse_optional(user_type)?;
        let removed = self.repo.delete(user_id, user_type).await?;
        tracing::info!(user_id = %user_id, removed, "🗑️ Metas removidas");
        Ok(removed)
    }
}

fn parse_optional(user_type: Option<&str>) -> Result<Option<UserType>, AppError> {
    user_type
        .filter(|raw| !raw.is_empty())
        .map(|raw| user_type_or_default(Some(raw)))
        .transpose()
}
