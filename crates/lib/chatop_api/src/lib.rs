//! # chatop_api
//!
//! HTTP API library for ChaTop.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use chatop_core::auth::jwt::TokenCodec;
use chatop_core::auth::password::PasswordHasher;
use chatop_core::store::Store;
use chatop_core::uploads::{FileStorage, UPLOADS_PATH, UploadPolicy};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::{ApiConfig, ConfigError};
use crate::handlers::{auth, messages, rentals, users};
use crate::middleware::auth::PublicRoutes;

/// Room for multipart boundaries and text fields on top of the file ceiling.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Shared application state passed to all handlers.
///
/// Everything here is built once at startup and only read afterwards.
#[derive(Clone)]
pub struct AppState {
    /// Users, rentals and messages.
    pub store: Arc<dyn Store>,
    /// API configuration.
    pub config: ApiConfig,
    /// Bearer token signer/verifier.
    pub tokens: TokenCodec,
    /// Password hasher.
    pub hasher: PasswordHasher,
    /// Upload validator and storage root.
    pub files: FileStorage,
    /// Routes reachable without an identity.
    pub public_routes: Arc<PublicRoutes>,
}

impl AppState {
    /// Build state from configuration, creating the upload root if needed.
    pub fn new(store: Arc<dyn Store>, config: ApiConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let tokens = TokenCodec::new(
            config.jwt_secret.as_bytes(),
            chrono::Duration::seconds(config.token_ttl_secs),
        );
        let files = FileStorage::new(
            &config.upload_dir,
            &config.public_base_url,
            UploadPolicy {
                max_bytes: config.max_upload_bytes,
                ..UploadPolicy::default()
            },
        )?;
        Ok(Self {
            store,
            tokens,
            hasher: PasswordHasher::with_cost(config.bcrypt_cost),
            files,
            public_routes: Arc::new(PublicRoutes::new(config.public_paths.as_slice())),
            config,
        })
    }
}

/// CORS policy for the configured browser origins.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

/// Builds the Axum router with all routes and shared state.
///
/// Every request first passes the authenticator, which binds an identity
/// when a valid bearer token is presented, and then the authorization stage,
/// which rejects non-public routes that ended up without one.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_allowed_origins);
    let body_limit = usize::try_from(state.config.max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    let uploads = ServeDir::new(state.files.root());

    Router::new()
        .route(routes::POST_AUTH_REGISTER, post(auth::register_handler))
        .route(routes::POST_AUTH_LOGIN, post(auth::login_handler))
        .route(routes::GET_AUTH_ME, get(auth::me_handler))
        .route(routes::GET_USER_ID, get(users::get_user_handler))
        .route(
            routes::RENTALS,
            get(rentals::list_rentals_handler).post(rentals::create_rental_handler),
        )
        .route(
            routes::RENTALS_ID,
            get(rentals::get_rental_handler).put(rentals::update_rental_handler),
        )
        .route(routes::POST_MESSAGES, post(messages::create_message_handler))
        .nest_service(UPLOADS_PATH, uploads)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::authenticate,
        ))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
