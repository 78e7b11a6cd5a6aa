// src/db/profile_repo.rs

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        profile::{NewUserProfile, UserProfile, UserType},
        subscription::SubscriptionStatus,
    },
};

const PROFILE_COLUMNS: &str = r#"
    id, email, first_name, last_name, user_type, subscription_status,
    stripe_customer_id, default_activity_role, created_at, updated_at
"#;

// Acesso à tabela `users` (perfil local do usuário autenticado)
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserProfile>, AppError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<UserProfile>, AppError>;
    async fn create(&self, profile: NewUserProfile) -> Result<UserProfile, AppError>;
    async fn update_names(&self, id: Uuid, first_name: &str, last_name: &str) -> Result<Option<UserProfile>, AppError>;
    async fn update_activity_role(&self, id: Uuid, role: UserType) -> Result<Option<UserProfile>, AppError>;

    /// Grava o status canônico. O customer id só é sobrescrito quando informado.
    /// `None` quando o perfil não existe.
    async fn set_subscription_status(
        &self,
        id: Uuid,
        status: SubscriptionStatus,
        stripe_customer_id: Option<&str>,
    ) -> Result<Option<UserProfile>, AppError>;
}

#[derive(Clone)]
pub struct PgProfileRepository {
    pool: PgPool,
}

impl PgProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for PgProfileRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserProfile>, AppError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM users WHERE id = $1");
        let profile = sqlx::query_as::<_, UserProfile>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(profile)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserProfile>, AppError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM users WHERE email = $1");
        let profile = sqlx::query_as::<_, UserProfile>(&sql)
            .bind(email.to_lowercase())
            .fetch_optional(&self.pool)
            .await?;
        Ok(profile)
    }

    async fn create(&self, profile: NewUserProfile) -> Result<UserProfile, AppError> {
        let sql = format!(
            r#"
            INSERT INTO users (
                id, email, first_name, last_name, user_type,
                subscription_status, stripe_customer_id, default_activity_role
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PROFILE_COLUMNS}
            "#
        );

        sqlx::query_as::<_, UserProfile>(&sql)
            .bind(profile.id)
            .bind(profile.email.to_lowercase())
            .bind(profile.first_name.trim())
            .bind(profile.last_name.trim())
            .bind(profile.user_type)
            .bind(profile.subscription_status)
            .bind(profile.stripe_customer_id)
            .bind(profile.default_activity_role)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                // Tratamento de erro de chave duplicada
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.is_unique_violation() {
                        return AppError::EmailAlreadyExists;
                    }
                }
                e.into()
            })
    }

    async fn update_names(&self, id: Uuid, first_name: &str, last_name: &str) -> Result<Option<UserProfile>, AppError> {
        let sql = format!(
            r#"
            UPDATE users
            SET first_name = $2, last_name = $3, updated_at = now()
            WHERE id = $1
            RETURNING {PROFILE_COLUMNS}
            "#
        );
        let profile = sqlx::query_as::<_, UserProfile>(&sql)
            .bind(id)
            .bind(first_name.trim())
            .bind(last_name.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(profile)
    }

    async fn update_activity_role(&self, id: Uuid, role: UserType) -> Result<Option<UserProfile>, AppError> {
        let sql = format!(
            r#"
            UPDATE users
            SET default_activity_role = $2, updated_at = now()
            WHERE id = $1
            RETURNING {PROFILE_COLUMNS}
            "#
        );
        let profile = sqlx::query_as::<_, UserProfile>(&sql)
            .bind(id)
            .bind(role)
            .fetch_optional(&self.pool)
            .await?;
        Ok(profile)
    }

    async fn set_subscription_status(
        &self,
        id: Uuid,
        status: SubscriptionStatus,
        stripe_customer_id: Option<&str>,
    ) -> Result<Option<UserProfile>, AppError> {
        let sql = format!(
            r#"
            UPDATE users
            SET subscription_status = $2,
                stripe_customer_id = COALESCE($3, stripe_customer_id),
                updated_at = now()
            WHERE id = $1
            RETURNING {PROFILE_COLUMNS}
            "#
        );
        let profile = sqlx::query_as::<_, UserProfile>(&sql)
            .bind(id)
            .bind(status)
            .bind(stripe_customer_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(profile)
    }
}
