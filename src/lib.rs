//! Storefront API Library
//!
//! Carts, the order lifecycle, and payment gateway orchestration.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod gateways;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod services;

use axum::{extract::FromRef, extract::State, response::Json, routing::get, Router};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::auth::AuthService;
use crate::db::DbPool;
use crate::handlers::AppServices;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: Arc<config::AppConfig>,
    pub event_sender: events::EventSender,
    pub auth: Arc<AuthService>,
    pub services: AppServices,
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

/// Success envelope: `{"success": true, ...payload}`. Failures use
/// [`errors::ErrorResponse`] via `ServiceError::into_response`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(flatten)]
    pub payload: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(payload: T) -> Self {
        Self {
            success: true,
            payload,
        }
    }
}

/// Composes the full API surface, mounted under `/api` by the binary.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/openapi.json", get(openapi_json))
        .nest("/cart", handlers::carts::carts_routes())
        .nest("/orders", handlers::orders::orders_routes())
        .nest("/payments", handlers::payments::payments_routes())
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<Value>, errors::ServiceError> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    Ok(Json(json!({
        "success": true,
        "status": if db_status == "healthy" { "healthy" } else { "unhealthy" },
        "checks": { "database": db_status },
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi::ApiDoc::document())
}
