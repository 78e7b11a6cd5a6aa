// src/config.rs

use std::{env, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    clients::{
        build_http_client,
        highlevel::{CrmGateway, HighLevelClient, DEFAULT_API_URL},
        stripe::{BillingGateway, StripeClient},
        supabase_auth::{AuthProvider, SupabaseAuthClient},
    },
    db::{
        ActivityStore, GoalStore, PgActivityRepository, PgGoalRepository, PgProfileRepository,
        PgSubscriptionEventRepository, ProfileStore, SubscriptionEventStore,
    },
    services::{
        activity_service::ActivityService,
        auth::AuthService,
        crm_service::CrmService,
        export_service::ExportService,
        goal_service::GoalService,
        subscription_service::{PriceIds, SubscriptionService},
    },
};

const DEFAULT_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub stripe_secret_key: String,
    // Sem segredo os webhooks são confirmados mas não processados
    pub stripe_webhook_secret: Option<String>,
    pub stripe_prices: PriceIds,
    pub highlevel_api_key: Option<String>,
    pub highlevel_location_id: Option<String>,
    pub highlevel_api_url: String,
    pub base_url: String,
    pub bind_addr: String,
    // Vazio = CORS permissivo (desenvolvimento)
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Monta a configuração a partir de qualquer fonte chave -> valor.
    /// Valores vazios contam como ausentes.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let optional = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| optional(key).with_context(|| format!("{key} deve ser definida"));

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            supabase_url: required("SUPABASE_URL")?,
            supabase_anon_key: required("SUPABASE_ANON_KEY")?,
            supabase_jwt_secret: required("SUPABASE_JWT_SECRET")?,
            stripe_secret_key: required("STRIPE_SECRET_KEY")?,
            stripe_webhook_secret: optional("STRIPE_WEBHOOK_SECRET"),
            stripe_prices: PriceIds {
                monthly: optional("STRIPE_PRICE_MONTHLY"),
                yearly: optional("STRIPE_PRICE_YEARLY"),
                lifetime: optional("STRIPE_PRICE_LIFETIME"),
            },
            highlevel_api_key: optional("HIGHLEVEL_API_KEY"),
            highlevel_location_id: optional("HIGHLEVEL_LOCATION_ID"),
            highlevel_api_url: optional("HIGHLEVEL_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            base_url: optional("BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            bind_addr: optional("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            cors_origins: optional("CORS_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(|origin| origin.trim().to_string())
                        .filter(|origin| !origin.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

pub async fn connect_database(config: &AppConfig) -> anyhow::Result<PgPool> {
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&config.database_url)
        .await
        .context("Falha ao conectar ao banco de dados")?;

    tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");
    Ok(db_pool)
}

/// Implementações concretas dos colaboradores externos.
pub struct Collaborators {
    pub profiles: Arc<dyn ProfileStore>,
    pub goals: Arc<dyn GoalStore>,
    pub activities: Arc<dyn ActivityStore>,
    pub events: Arc<dyn SubscriptionEventStore>,
    pub auth: Arc<dyn AuthProvider>,
    pub billing: Arc<dyn BillingGateway>,
    pub crm: Arc<dyn CrmGateway>,
}

// O estado compartilhado que será acessível em toda a aplicação
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth_service: AuthService,
    pub goal_service: GoalService,
    pub activity_service: ActivityService,
    pub subscription_service: SubscriptionService,
    pub crm_service: CrmService,
    pub export_service: ExportService,
}

impl AppState {
    pub fn new(config: AppConfig, db_pool: PgPool) -> anyhow::Result<Self> {
        let http = build_http_client().context("Falha ao criar o cliente HTTP")?;

        if config.highlevel_api_key.is_none() {
            tracing::warn!("⚠️ HIGHLEVEL_API_KEY ausente: sincronização com o CRM desligada");
        }
        if config.stripe_webhook_secret.is_none() {
            tracing::warn!("⚠️ STRIPE_WEBHOOK_SECRET ausente: webhooks não serão processados");
        }

        // --- Monta o gráfico de dependências ---
        let collaborators = Collaborators {
            profiles: Arc::new(PgProfileRepository::new(db_pool.clone())),
            goals: Arc::new(PgGoalRepository::new(db_pool.clone())),
            activities: Arc::new(PgActivityRepository::new(db_pool.clone())),
            events: Arc::new(PgSubscriptionEventRepository::new(db_pool)),
            auth: Arc::new(SupabaseAuthClient::new(
                http.clone(),
                &config.supabase_url,
                &config.supabase_anon_key,
                &config.supabase_jwt_secret,
            )),
            billing: Arc::new(StripeClient::new(http.clone(), &config.stripe_secret_key)),
            crm: Arc::new(HighLevelClient::new(
                http,
                &config.highlevel_api_url,
                config.highlevel_api_key.clone(),
                config.highlevel_location_id.clone(),
            )),
        };

        Ok(Self::from_collaborators(config, collaborators))
    }

    pub fn from_collaborators(config: AppConfig, c: Collaborators) -> Self {
        let crm_service = CrmService::new(c.crm);
        let subscription_service = SubscriptionService::new(
            c.profiles.clone(),
            c.events,
            c.billing,
            crm_service.clone(),
            config.stripe_prices.clone(),
            &config.base_url,
        );
        let auth_service = AuthService::new(
            c.auth,
            c.profiles,
            crm_service.clone(),
            subscription_service.clone(),
            &config.base_url,
        );
        let goal_service = GoalService::new(c.goals);
        let activity_service = ActivityService::new(c.activities);
        let export_service = ExportService::new(goal_service.clone(), activity_service.clone());

        Self {
            config: Arc::new(config),
            auth_service,
            goal_service,
            activity_service,
            subscription_service,
            crm_service,
            export_service,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 5] = [
        ("DATABASE_URL", "postgres://localhost/igc"),
        ("SUPABASE_URL", "https://project.supabase.co"),
        ("SUPABASE_ANON_KEY", "anon"),
        ("SUPABASE_JWT_SECRET", "secret"),
        ("STRIPE_SECRET_KEY", "sk_test"),
    ];

    #[test]
    fn optional_values_fall_back_to_defaults() {
        let config = AppConfig::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.highlevel_api_url, DEFAULT_API_URL);
        assert!(config.stripe_webhook_secret.is_none());
        assert!(config.cors_origins.is_empty());
    }

    #[test]
    fn missing_required_variable_is_an_error() {
        let err = AppConfig::from_lookup(lookup(&REQUIRED[..4])).unwrap_err();
        assert!(err.to_string().contains("STRIPE_SECRET_KEY"));
    }

    #[test]
    fn cors_origins_are_split_and_trimmed() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("CORS_ORIGINS", "https://a.com, https://b.com ,"));
        vars.push(("STRIPE_WEBHOOK_SECRET", "  "));
        let config = AppConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.cors_origins, vec!["https://a.com", "https://b.com"]);
        assert!(config.stripe_webhook_secret.is_none());
    }
}
