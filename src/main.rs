use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use chrono::Duration;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod clock;
mod config;
mod db;
mod error;
mod middleware;
mod models;
mod services;
mod utils;
#[cfg(test)]
mod tests;

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::db::Stores;
use crate::services::auth_service::AuthService;
use crate::services::biometric_service::BiometricService;
use crate::services::detector::{HttpLandmarkDetector, LandmarkDetector};
use crate::services::identity_service::IdentityService;
use crate::services::rate_limiter::RateLimiter;
use crate::services::token_service::TokenService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub clock: Arc<dyn Clock>,
    pub rate_limiter: RateLimiter,
    pub tokens: TokenService,
    pub identities: IdentityService,
    pub auth: AuthService,
}

impl AppState {
    pub fn new(
        config: Config,
        stores: Stores,
        detector: Arc<dyn LandmarkDetector>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let rate_limiter = RateLimiter::new(
            stores.rate_limits,
            clock.clone(),
            config.rate_limit_max_requests,
            Duration::seconds(config.rate_limit_window_secs),
        );
        let tokens = TokenService::new(stores.refresh_tokens, clock.clone(), &config.secret_key);
        let identities = IdentityService::new(stores.identities, clock.clone());
        let biometrics = BiometricService::new(detector, config.fingerprint_hash_cost);
        let auth = AuthService::new(
            biometrics,
            identities.clone(),
            tokens.clone(),
            config.simulated_auth,
        );

        Self {
            config: Arc::new(config),
            clock,
            rate_limiter,
            tokens,
            identities,
            auth,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    // Create a CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        .route("/me", get(api::user::get_current_user))
        .route_layer(from_fn_with_state(state.clone(), middleware::auth::auth_middleware));

    let biometric = Router::new()
        .route("/register", post(api::biometric::register))
        .route("/authenticate", post(api::biometric::authenticate))
        .route("/refresh-token", post(api::biometric::refresh_token))
        .route("/logout", post(api::biometric::logout))
        .route("/health", get(api::health::health_check))
        .merge(protected);

    Router::new()
        .nest("/api/biometric", biometric)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn spawn_prune_task(limiter: RateLimiter, every_secs: u64) {
    if every_secs == 0 {
        return;
    }
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(every_secs));
        interval.tick().await;
        loop {
            interval.tick().await;
            match limiter.prune().await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "Pruned idle rate limit windows"),
                Err(e) => error!(error = %e, "Failed to prune rate limit windows"),
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => error!(error = %e, "Failed to listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.debug);

    if config.uses_dev_secret() {
        warn!("JWT_SECRET_KEY is not set, using the development secret");
    }

    let stores = db::create_stores(config.redis_url.as_deref()).await?;
    let detector = Arc::new(HttpLandmarkDetector::new(config.detector_url.clone()));
    let addr = config.bind_addr();
    let prune_secs = config.rate_limit_prune_secs;

    let state = AppState::new(config, stores, detector, Arc::new(SystemClock));
    spawn_prune_task(state.rate_limiter.clone(), prune_secs);

    let app = create_router(state);

    info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
