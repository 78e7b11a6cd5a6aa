// src/db/subscription_event_repo.rs

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::subscription::{NewSubscriptionEvent, SubscriptionEvent},
};

const EVENT_COLUMNS: &str = r#"
    id, user_id, event_type, stripe_customer_id, stripe_subscription_id,
    plan_type, amount, currency, event_data, created_at
"#;

// Log de auditoria: só inserção e leitura
#[async_trait]
pub trait SubscriptionEventStore: Send + Sync {
    async fn append(&self, event: NewSubscriptionEvent) -> Result<SubscriptionEvent, AppError>;

    /// Evento `subscription_created`/`checkout_completed` mais recente com
    /// subscription id preenchido: a assinatura "atual" do usuário.
    async fn latest_subscription(&self, user_id: Uuid) -> Result<Option<SubscriptionEvent>, AppError>;
}

#[derive(Clone)]
pub struct PgSubscriptionEventRepository {
    pool: PgPool,
}

impl PgSubscriptionEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionEventStore for PgSubscriptionEventRepository {
    async fn append(&self, event: NewSubscriptionEvent) -> Result<SubscriptionEvent, AppError> {
        let sql = format!(
            r#"
            INSERT INTO subscription_events (
                user_id, event_type, stripe_customer_id, stripe_subscription_id,
                plan_type, amount, currency, event_data
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {EVENT_COLUMNS}
            "#
        );

        let saved = sqlx::query_as::<_, SubscriptionEvent>(&sql)
            .bind(event.user_id)
            .bind(event.event_type)
            .bind(event.stripe_customer_id)
            .bind(event.stripe_subscription_id)
            .bind(event.plan_type)
            .bind(event.amount)
            .bind(event.currency)
            .bind(event.event_data)
            .fetch_one(&self.pool)
            .await?;
        Ok(saved)
    }

    async fn latest_subscription(&self, user_id: Uuid) -> Result<Option<SubscriptionEvent>, AppError> {
        let sql = format!(
            r#"
            SELECT {EVENT_COLUMNS}
            FROM subscription_events
            WHERE user_id = $1
              AND event_type IN ('subscription_created', 'checkout_completed')
              AND stripe_subscription_id IS NOT NULL
            ORDER BY created_at DESC
            LIMIT 1
            "#
        );

        let event = sqlx::query_as::<_, SubscriptionEvent>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(event)
    }
}
