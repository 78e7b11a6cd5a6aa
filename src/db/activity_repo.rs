// src/db/activity_repo.rs

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        activities::{ActivityCounts, DailyActivity},
        profile::UserType,
    },
};

const ACTIVITY_COLUMNS: &str = r#"
    id, user_id, user_type, activity_date, attempts, contacts,
    appointments, contracts, closings, created_at, updated_at
"#;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityFilter {
    pub user_type: Option<UserType>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub limit: i64,
}

#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Upsert idempotente pela chave (usuário, tipo, data).
    async fn upsert(
        &self,
        user_id: Uuid,
        user_type: UserType,
        date: NaiveDate,
        counts: ActivityCounts,
    ) -> Result<DailyActivity, AppError>;

    /// Mais recentes primeiro.
    async fn list(&self, user_id: Uuid, filter: &ActivityFilter) -> Result<Vec<DailyActivity>, AppError>;
}

#[derive(Clone)]
pub struct PgActivityRepository {
    pool: PgPool,
}

impl PgActivityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivityStore for PgActivityRepository {
    async fn upsert(
        &self,
        user_id: Uuid,
        user_type: UserType,
        date: NaiveDate,
        counts: ActivityCounts,
    ) -> Result<DailyActivity, AppError> {
        let sql = format!(
            r#"
            INSERT INTO daily_activities (
                user_id, user_type, activity_date,
                attempts, contacts, appointments, contracts, closings
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT ON CONSTRAINT daily_activities_user_type_date_key
            DO UPDATE SET
                attempts = EXCLUDED.attempts,
                contacts = EXCLUDED.contacts,
                appointments = EXCLUDED.appointments,
                contracts = EXCLUDED.contracts,
                closings = EXCLUDED.closings,
                updated_at = now()
            RETURNING {ACTIVITY_COLUMNS}
            "#
        );

        let activity = sqlx::query_as::<_, DailyActivity>(&sql)
            .bind(user_id)
            .bind(user_type)
            .bind(date)
            .bind(counts.attempts)
            .bind(counts.contacts)
            .bind(counts.appointments)
            .bind(counts.contracts)
            .bind(counts.closings)
            .fetch_one(&self.pool)
            .await?;
        Ok(activity)
    }

    async fn list(&self, user_id: Uuid, filter: &ActivityFilter) -> Result<Vec<DailyActivity>, AppError> {
        let sql = format!(
            r#"
            SELECT {ACTIVITY_COLUMNS}
            FROM daily_activities
            WHERE user_id = $1
              AND ($2::user_type IS NULL OR user_type = $2)
              AND ($3::date IS NULL OR activity_date >= $3)
              AND ($4::date IS NULL OR activity_date <= $4)
            ORDER BY activity_date DESC
            LIMIT $5
            "#
        );

        let activities = sqlx::query_as::<_, DailyActivity>(&sql)
            .bind(user_id)
            .bind(filter.user_type)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(filter.limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(activities)
    }
}
