//! Spendboard API Gateway
//!
//! HTTP boundary over the analytics layer.
//! Handles:
//! - Dashboard aggregations and invoice listing
//! - Chat-with-data forwarding
//! - Request validation and error mapping
//! - Observability (logging, metrics, request ids)

mod handlers;
mod middleware;

use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use spendboard_analytics::Analytics;
use spendboard_common::{
    assistant::{ChatService, HttpSqlAssistant},
    config::AppConfig,
    db::DbPool,
    metrics, Repository, Store,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub analytics: Analytics,
    /// `None` when no text-to-SQL service is configured
    pub chat: Option<Arc<ChatService>>,
    pub metrics: Option<PrometheusHandle>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Arc::new(AppConfig::load()?);
    init_tracing(&config);

    info!(
        service = %config.observability.service_name,
        "Starting Spendboard API Gateway v{}",
        spendboard_common::VERSION
    );

    let metrics_handle = if config.observability.metrics_enabled {
        let handle = PrometheusBuilder::new().install_recorder()?;
        metrics::register_metrics();
        Some(handle)
    } else {
        None
    };

    info!("Connecting to database...");
    let pool = DbPool::new(&config.database).await?;
    let repository = Repository::new(pool);
    if config.database.create_schema {
        repository.create_schema().await?;
    }
    let store: Arc<dyn Store> = Arc::new(repository);

    let assistant_configured = config
        .assistant
        .base_url
        .as_deref()
        .is_some_and(|url| !url.trim().is_empty());

    let chat = if assistant_configured {
        let assistant = HttpSqlAssistant::new(&config.assistant)?;
        info!("Chat-with-data enabled");
        Some(Arc::new(ChatService::new(
            Arc::new(assistant),
            store.clone(),
            &config.assistant,
        )))
    } else {
        warn!("assistant.base_url is not set; chat-with-data is disabled");
        None
    };

    let state = AppState {
        config: config.clone(),
        analytics: Analytics::new(store.clone()),
        store,
        chat,
        metrics: metrics_handle,
    };

    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let timeout = TimeoutLayer::new(state.config.request_timeout());

    let api_routes = Router::new()
        // Trends
        .route("/invoice-trends", get(handlers::dashboard::invoice_trends))
        .route("/invoices/trends", get(handlers::dashboard::invoice_trends))

        // Rankings
        .route("/vendors/top10", get(handlers::dashboard::top_vendors))
        .route("/category-spend", get(handlers::dashboard::category_spend))
        .route("/invoices/by-vendor", get(handlers::invoices::invoices_by_vendor))

        // Cash flow and headline numbers
        .route("/cash-outflow", get(handlers::dashboard::cash_outflow))
        .route("/stats", get(handlers::dashboard::stats))

        // Listing
        .route("/invoices", get(handlers::invoices::list_invoices))
        .route("/invoices/recent", get(handlers::invoices::recent_invoices))

        // Chat with data
        .route("/chat-with-data", post(handlers::chat::chat_with_data))
        .route_layer(from_fn(middleware::metrics::track_metrics));

    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .route("/metrics", get(handlers::health::metrics))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(timeout)
        .layer(CompressionLayer::new())
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use serde_json::{json, Value};
    use spendboard_analytics::FixedClock;
    use spendboard_common::assistant::{AssistantReply, SqlAssistant};
    use spendboard_common::config::AssistantConfig;
    use spendboard_common::db::records::{
        DocumentRecord, InvoiceRecord, PaymentRecord, SummaryRecord, VendorRecord,
    };
    use spendboard_common::MemoryStore;
    use tower::ServiceExt;

    struct CannedAssistant;

    #[async_trait]
    impl SqlAssistant for CannedAssistant {
        async fn ask(&self, question: &str) -> spendboard_common::Result<AssistantReply> {
            Ok(AssistantReply {
                sql: Some("SELECT 1".to_string()),
                data: Some(json!([{ "question": question }])),
                ..AssistantReply::default()
            })
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    async fn seed(store: &MemoryStore, id: &str, vendor: &str, day: u32, total: i64) {
        let mut txn = store.begin().await.unwrap();
        txn.upsert_document(&DocumentRecord::new(id)).await.unwrap();
        txn.upsert_invoice(
            id,
            &InvoiceRecord {
                invoice_id: Some(format!("INV-{}", id)),
                invoice_date: NaiveDate::from_ymd_opt(2024, 3, day),
                ..InvoiceRecord::default()
            },
        )
        .await
        .unwrap();
        txn.upsert_summary(
            id,
            &SummaryRecord {
                invoice_total: Some(Decimal::from(total)),
                document_type: Some("invoice".to_string()),
                ..SummaryRecord::default()
            },
        )
        .await
        .unwrap();
        txn.upsert_vendor(
            id,
            &VendorRecord {
                vendor_name: Some(vendor.to_string()),
                ..VendorRecord::default()
            },
        )
        .await
        .unwrap();
        txn.upsert_payment(
            id,
            &PaymentRecord {
                due_date: NaiveDate::from_ymd_opt(2024, 3, day + 10),
                ..PaymentRecord::default()
            },
        )
        .await
        .unwrap();
        txn.commit().await.unwrap();
    }

    fn app(store: MemoryStore, chat: bool) -> Router {
        let store: Arc<dyn Store> = Arc::new(store);
        let chat = chat.then(|| {
            Arc::new(ChatService::new(
                Arc::new(CannedAssistant),
                store.clone(),
                &AssistantConfig::default(),
            ))
        });

        create_router(AppState {
            config: Arc::new(AppConfig::default()),
            analytics: Analytics::with_clock(store.clone(), Arc::new(FixedClock(today()))),
            store,
            chat,
            metrics: None,
        })
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health_and_ready() {
        let (status, body) = get_json(app(MemoryStore::new(), false), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let (status, body) = get_json(app(MemoryStore::new(), false), "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["database"]["status"], "up");
    }

    #[tokio::test]
    async fn test_metrics_absent_without_recorder() {
        let response = app(MemoryStore::new(), false)
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stats_on_empty_store() {
        let (status, body) = get_json(app(MemoryStore::new(), false), "/api/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "totalSpendYtd": 0.0,
                "totalInvoices": 0,
                "documentsUploaded": 0,
                "averageInvoiceValue": 0.0
            })
        );
    }

    #[tokio::test]
    async fn test_trend_window_is_validated() {
        let (status, body) =
            get_json(app(MemoryStore::new(), false), "/api/invoice-trends?months=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, _) =
            get_json(app(MemoryStore::new(), false), "/api/invoices/trends?months=abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) =
            get_json(app(MemoryStore::new(), false), "/api/invoices/trends?months=3").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn test_invoice_listing_paginates() {
        let store = MemoryStore::new();
        seed(&store, "a", "Acme Corp", 1, 100).await;
        seed(&store, "b", "Globex", 2, 200).await;
        seed(&store, "c", "Acme Corp", 3, 300).await;

        let (status, body) = get_json(
            app(store.clone(), false),
            "/api/invoices?page=2&pageSize=2&sortBy=amount&sortOrder=asc",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 3);
        assert_eq!(body["pageSize"], 2);
        assert_eq!(body["rows"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["rows"][0]["invoice_id"], "c");
        // due 2024-03-13
        assert_eq!(body["rows"][0]["status"], "overdue");

        let (_, body) = get_json(app(store.clone(), false), "/api/invoices?vendor=acme").await;
        assert_eq!(body["total"], 2);

        let (status, body) =
            get_json(app(store, false), "/api/invoices?sortBy=colour").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["field"], "sortBy");
    }

    #[tokio::test]
    async fn test_dashboard_lists() {
        let store = MemoryStore::new();
        seed(&store, "a", "Acme Corp", 1, 100).await;
        seed(&store, "b", "Globex", 2, 250).await;

        let (_, vendors) = get_json(app(store.clone(), false), "/api/vendors/top10").await;
        assert_eq!(vendors[0]["vendor_name"], "Globex");
        assert_eq!(vendors[0]["spend"], json!(250.0));

        let (_, recent) = get_json(app(store.clone(), false), "/api/invoices/recent?limit=1").await;
        assert_eq!(recent.as_array().map(Vec::len), Some(1));
        assert_eq!(recent[0]["invoice_id"], "b");

        let (status, _) = get_json(app(store, false), "/api/invoices/by-vendor?limit=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_cash_outflow_dates() {
        let store = MemoryStore::new();
        seed(&store, "a", "Acme Corp", 10, 100).await;

        let (status, body) = get_json(app(store.clone(), false), "/api/cash-outflow").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["start"], "2024-03-15");
        assert_eq!(body["rows"][0]["date"], "2024-03-20");

        let (status, body) =
            get_json(app(store.clone(), false), "/api/cash-outflow?start=soon").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["field"], "start");

        let (status, _) = get_json(
            app(store, false),
            "/api/cash-outflow?start=2024-04-01&end=2024-03-01",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chat_unavailable_without_assistant() {
        let (status, body) = post_json(
            app(MemoryStore::new(), false),
            "/api/chat-with-data",
            json!({ "question": "total spend?" }),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_chat_accepts_query_alias() {
        let (status, body) = post_json(
            app(MemoryStore::new(), true),
            "/api/chat-with-data",
            json!({ "query": "total spend?" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["question"], "total spend?");
        assert_eq!(body["sql"], "SELECT 1");
    }

    #[tokio::test]
    async fn test_chat_rejects_bad_bodies() {
        let (status, _) = post_json(
            app(MemoryStore::new(), true),
            "/api/chat-with-data",
            json!({ "question": "" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = post_json(
            app(MemoryStore::new(), true),
            "/api/chat-with-data",
            json!({ "prompt": "hi" }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_FORMAT");
    }
}
