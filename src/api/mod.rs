//! HTTP API server.

pub mod error;
mod extract;
pub(crate) mod routes;
mod state;
pub mod v1;

#[cfg(test)]
mod routes_test;
#[cfg(test)]
pub(crate) mod test_support;

use std::net::IpAddr;
use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use error::{ApiError, ErrorResponse};
pub use state::AppState;

use crate::config::AppConfig;
use crate::db::Database;

/// Server-level failures.
#[derive(Error, Diagnostic, Debug)]
pub enum ServeError {
    #[error("Failed to bind to address {addr}: {source}")]
    #[diagnostic(code(civicweave::api::bind_failed))]
    BindFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    #[diagnostic(code(civicweave::api::server_error))]
    ServerError(#[from] std::io::Error),
}

/// Listener configuration.
pub struct ServeConfig {
    /// Host address to bind to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Logging verbosity (0=warn, 1=info, 2=debug, 3=trace)
    pub verbosity: u8,
    /// Enable the OpenAPI documentation endpoint at /docs
    pub enable_docs: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".parse().expect("valid address literal"),
            port: 8080,
            verbosity: 0,
            enable_docs: false,
        }
    }
}

/// Initialize tracing subscriber with verbosity level
pub fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "civicweave=warn,tower_http=warn",
        1 => "civicweave=info,tower_http=info",
        2 => "civicweave=debug,tower_http=debug",
        _ => "civicweave=trace,tower_http=trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Run the API server.
///
/// The caller opens and migrates the database; the API layer stays
/// agnostic of the concrete storage backend.
pub async fn run<D: Database + 'static>(
    serve: ServeConfig,
    app_config: AppConfig,
    db: D,
) -> Result<(), ServeError> {
    init_tracing(serve.verbosity);

    let state = AppState::new(Arc::new(db), app_config);
    let app = routes::create_router(state, serve.enable_docs).layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", serve.host, serve.port);
    let listener =
        tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| ServeError::BindFailed {
                addr: addr.clone(),
                source: e,
            })?;
    info!("API server listening on http://{}", addr);
    if serve.enable_docs {
        info!("API docs available at http://{}/docs", addr);
    }

    axum::serve(listener, app).await?;
    Ok(())
}
