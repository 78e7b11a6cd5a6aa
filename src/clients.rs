// src/clients.rs
//
// Clientes HTTP dos serviços externos. Cada um fica atrás de um trait para que
// os serviços recebam `Arc<dyn Trait>` e os testes troquem por fakes.

pub mod highlevel;
pub mod stripe;
pub mod supabase_auth;

use std::time::Duration;

use serde::de::DeserializeOwned;
use thiserror::Error;

// Timeout único para todas as chamadas externas
const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{service}: falha de transporte: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service}: HTTP {status}: {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("{0} não está configurado")]
    NotConfigured(&'static str),
}

impl ClientError {
    pub fn transport(service: &'static str) -> impl FnOnce(reqwest::Error) -> ClientError {
        move |source| ClientError::Transport { service, source }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub fn build_http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()
}

/// Lê o corpo JSON de uma resposta 2xx; qualquer outro status vira `ClientError::Api`
/// com o corpo cru como mensagem.
pub(crate) async fn read_json<T: DeserializeOwned>(
    service: &'static str,
    response: reqwest::Response,
) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(ClientError::Api {
            service,
            status: status.as_u16(),
            message,
        });
    }

    response.json::<T>().await.map_err(ClientError::transport(service))
}

// Igual a `read_json`, para endpoints cujo corpo não interessa
pub(crate) async fn expect_success(
    service: &'static str,
    response: reqwest::Response,
) -> Result<(), ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let message = response.text().await.unwrap_or_default();
    Err(ClientError::Api {
        service,
        status: status.as_u16(),
        message,
    })
}
