//! Web server setup and startup.
//!
//! [`WebServer`] composes the Axum router, registers the bridge routes,
//! and starts the HTTP listener.

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;

use crate::config::BridgeConfig;
use crate::error::WebError;
use crate::middleware;
use crate::routes;
use crate::state::AppState;

/// The AuthX bridge web server.
pub struct WebServer {
    config: BridgeConfig,
    state: Arc<AppState>,
}

impl WebServer {
    /// Create a new web server over shared state.
    pub fn new(config: BridgeConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// Return the `host:port` string this server will bind to.
    pub fn addr(&self) -> String {
        self.config.addr()
    }

    /// Build the Axum router with all routes registered.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin("*".parse::<HeaderValue>().expect("static origin"))
            .allow_methods([Method::GET, Method::POST]);

        let admin = Router::new()
            .route("/admin/users", get(routes::admin_users))
            .layer(axum::middleware::from_fn_with_state(
                Arc::clone(&self.state),
                middleware::require_admin,
            ));

        Router::new()
            .route("/login", get(routes::login_alias))
            .route("/auth/redirect", get(routes::redirect))
            .route("/auth/callback", get(routes::callback))
            .route("/logout", post(routes::logout))
            .merge(admin)
            .layer(cors)
            .with_state(Arc::clone(&self.state))
    }

    /// Start the server and block until it is shut down.
    ///
    /// # Errors
    ///
    /// Returns [`WebError::Config`] when the bind address is unusable.
    pub async fn run(self) -> Result<(), WebError> {
        let addr = self.addr();
        let listener =
            tokio::net::TcpListener::bind(&addr)
                .await
                .map_err(|e| WebError::Config {
                    reason: format!("cannot bind {addr}: {e}"),
                })?;

        tracing::info!(addr = %addr, "authx-bridge listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| WebError::Config {
                reason: format!("server error: {e}"),
            })
    }
}
