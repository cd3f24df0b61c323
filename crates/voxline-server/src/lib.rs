//! Voxline voice webhook server.
//!
//! Answers telephony-provider voice webhooks, forwards the caller's
//! transcribed speech to a hosted chat model and replies with a voice
//! document for the provider to execute.

pub mod api;
pub mod config;
pub mod handlers;
pub mod middleware;
pub mod startup;

use axum::{
    routing::{get, post},
    Extension, Json, Router,
};
use config::Config;
use handlers::CallSettings;
use middleware::SignatureVerifier;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use voxline_chat::{ChatBridge, ChatOptions, ChatService};
use voxline_types::{ChatTarget, ResponseMode};

/// Shared application state, read-only after startup.
#[derive(Clone)]
pub struct AppState {
    /// What callers hear.
    pub call: CallSettings,
    /// Gather policy, chat target and streaming choice.
    pub mode: ResponseMode,
    /// Chat bridge with the configured seed and target model as defaults.
    pub bridge: ChatBridge,
    /// Present when webhook signatures are enforced.
    pub signatures: Option<SignatureVerifier>,
}

impl AppState {
    /// Builds the state from checked configuration and a resolved target.
    pub fn new(config: &Config, chat: Arc<dyn ChatService>, target: ChatTarget) -> Self {
        let defaults = ChatOptions {
            seed_prefix: config.chat.seed_message.clone(),
            model_id: target.model_id().cloned(),
        };

        let signatures = config.telephony.validate_signatures.then(|| {
            SignatureVerifier::new(
                config.telephony.auth_token.clone(),
                &config.telephony.public_url,
            )
        });

        Self {
            call: CallSettings::from_config(&config.call),
            mode: ResponseMode {
                gather: config.call.gather,
                target,
                streaming: config.chat.streaming,
            },
            bridge: ChatBridge::new(chat).with_defaults(defaults),
            signatures,
        }
    }
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let webhooks = Router::new()
        .route("/incoming-call", post(handlers::incoming_call_handler))
        .route("/answer", post(handlers::incoming_call_handler))
        .route(
            handlers::USER_INPUT_PATH,
            post(handlers::user_input_handler),
        )
        .route_layer(axum::middleware::from_fn(middleware::verify_signature));

    Router::new()
        .route("/health", get(health))
        .merge(webhooks)
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
