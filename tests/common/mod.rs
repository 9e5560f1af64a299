#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Method, Request},
    response::Response,
    routing::get,
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use storefront_api::{
    auth::{AuthService, UserId, ADMIN_ROLE},
    config::AppConfig,
    db::{self, DbConfig},
    entities::product,
    events::{self, EventSender},
    gateways::PaymentGateways,
    handlers::AppServices,
    AppState,
};
use tower::ServiceExt;
use uuid::Uuid;

/// Test harness backed by a throwaway SQLite database.
pub struct TestApp {
    pub state: AppState,
    pub auth: Arc<AuthService>,
    router: Router,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Fresh application with no payment gateways configured.
    pub async fn new() -> Self {
        Self::with_gateways(PaymentGateways::default()).await
    }

    /// Fresh application with the given gateway adapters injected.
    pub async fn with_gateways(gateways: PaymentGateways) -> Self {
        let db_path = std::env::temp_dir().join(format!("storefront_test_{}.db", Uuid::new_v4()));
        let database_url = format!("sqlite://{}?mode=rwc", db_path.display());

        let cfg = AppConfig::new(
            database_url.clone(),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            "127.0.0.1".to_string(),
            0,
        );

        let pool = db::establish_connection_with_config(&DbConfig {
            url: database_url,
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        })
        .await
        .expect("failed to create test database");

        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db = Arc::new(pool);

        let (event_sender, event_rx) = EventSender::channel(64);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let auth = Arc::new(AuthService::new(
            &cfg.jwt_secret,
            Duration::from_secs(3600),
        ));

        let services = AppServices::new(db.clone(), Arc::new(event_sender.clone()), gateways);

        let state = AppState {
            db,
            config: Arc::new(cfg),
            event_sender,
            auth: auth.clone(),
            services,
        };

        let router = Router::new()
            .route("/", get(|| async { "storefront-api up" }))
            .nest("/api", storefront_api::api_routes())
            .with_state(state.clone());

        Self {
            state,
            auth,
            router,
            _event_task: event_task,
        }
    }

    /// Inserts a catalog product for cart tests.
    pub async fn seed_product(&self, name: &str, price: Decimal, stock: i32) -> product::Model {
        let id = Uuid::new_v4();
        let model = product::ActiveModel {
            id: Set(id),
            name: Set(name.to_string()),
            sku: Set(format!("SKU-{}", &id.to_string()[..8])),
            price: Set(price),
            stock: Set(stock),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };

        model
            .insert(&*self.state.db)
            .await
            .expect("failed to seed product")
    }

    /// Bearer token for a regular shopper.
    pub fn user_token(&self, user_id: UserId) -> String {
        self.auth
            .issue_token(user_id, Some("shopper@example.com".to_string()), vec![])
            .expect("failed to issue token")
    }

    /// Bearer token carrying the admin role.
    pub fn admin_token(&self, user_id: UserId) -> String {
        self.auth
            .issue_token(
                user_id,
                Some("admin@example.com".to_string()),
                vec![ADMIN_ROLE.to_string()],
            )
            .expect("failed to issue token")
    }

    /// Sends a request through the router with an optional bearer token and
    /// JSON body.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(path);

        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error")
    }
}

/// Parses a response body as JSON.
pub async fn response_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
