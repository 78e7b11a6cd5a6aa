//src/main.rs

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod clients;
mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod routes;
mod services;
#[cfg(test)]
mod testing;

use crate::config::{connect_database, AppConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // RUST_LOG controla o nível; padrão `info`
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let config = AppConfig::from_env()?;
    let db_pool = connect_database(&config).await?;

    // Faz o app rodar as migrações do SQLx na inicialização
    sqlx::migrate!().run(&db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    let bind_addr = config.bind_addr.clone();
    let app_state = AppState::new(config, db_pool)?;
    let app = routes::build_router(app_state);

    // Inicia o servidor
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    tracing::info!("📚 Documentação em http://{}/swagger-ui", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
