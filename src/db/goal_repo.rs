// src/db/goal_repo.rs

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{goals::UserGoals, profile::UserType},
};

#[async_trait]
pub trait GoalStore: Send + Sync {
    /// Uma linha por (usuário, tipo); a última escrita vence.
    async fn upsert(&self, user_id: Uuid, user_type: UserType, goal_data: &Value) -> Result<UserGoals, AppError>;

    /// Sem tipo, devolve a linha atualizada mais recentemente.
    async fn find(&self, user_id: Uuid, user_type: Option<UserType>) -> Result<Option<UserGoals>, AppError>;

    async fn list(&self, user_id: Uuid) -> Result<Vec<UserGoals>, AppError>;

    /// Sem tipo, apaga todas as metas do usuário. Devolve quantas linhas saíram.
    async fn delete(&self, user_id: Uuid, user_type: Option<UserType>) -> Result<u64, AppError>;
}

#[derive(Clone)]
pub struct PgGoalRepository {
    pool: PgPool,
}

impl PgGoalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GoalStore for PgGoalRepository {
    async fn upsert(&self, user_id: Uuid, user_type: UserType, goal_data: &Value) -> Result<UserGoals, AppError> {
        let goals = sqlx::query_as::<_, UserGoals>(
            r#"
            INSERT INTO user_goals (user_id, user_type, goal_data)
            VALUES ($1, $2, $3)
            ON CONFLICT ON CONSTRAINT user_goals_user_type_key
            DO UPDATE SET goal_data = EXCLUDED.goal_data, updated_at = now()
            RETURNING id, user_id, user_type, goal_data, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(user_type)
        .bind(goal_data)
        .fetch_one(&self.pool)
        .await?;
        Ok(goals)
    }

    async fn find(&self, user_id: Uuid, user_type: Option<UserType>) -> Result<Option<UserGoals>, AppError> {
        let goals = sqlx::query_as::<_, UserGoals>(
            r#"
            SELECT id, user_id, user_type, goal_data, created_at, updated_at
            FROM user_goals
            WHERE user_id = $1 AND ($2::user_type IS NULL OR user_type = $2)
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(user_type)
        .fetch_optional(&self.pool)
        .await?;
        Ok(goals)
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<UserGoals>, AppError> {
        let goals = sqlx::query_as::<_, UserGoals>(
            r#"
            SELECT id, user_id, user_type, goal_data, created_at, updated_at
            FROM user_goals
            WHERE user_id = $1
            ORDER BY user_type
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(goals)
    }

    async fn delete(&self, user_id: Uuid, user_type: Option<UserType>) -> Result<u64, AppError> {
        let result = sqlx::query(
            "DELETE FROM user_goals WHERE user_id = $1 AND ($2::user_type IS NULL OR user_type = $2)",
        )
        .bind(user_id)
        .bind(user_type)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
