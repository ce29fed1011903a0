//! Papertrail API Gateway
//!
//! The HTTP front of the submission and review service.
//! Handles:
//! - Account sign-up/login and role checks
//! - Paper intake and manuscript uploads
//! - Reviewer registry and assignment allocation
//! - Reviews, conference scheduling, contact messages
//! - Observability (logging, metrics, request IDs)

mod handlers;
mod middleware;


use axum::{
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post, put},
    Router,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use papertrail_common::{
    auth::JwtManager,
    config::AppConfig,
    db::{DbPool, Repository},
    metrics,
    storage::UploadStore,
    Allocator,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub repo: Repository,
    pub allocator: Allocator,
    pub uploads: UploadStore,
    pub jwt: Arc<JwtManager>,
}

impl AppState {
    pub fn new(config: AppConfig, db: DbPool) -> Self {
        let secret = config.auth.jwt_secret.clone().unwrap_or_else(|| {
            warn!("auth.jwt_secret not set; using a per-process secret, tokens will not survive restarts");
            format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
        });

        Self {
            jwt: Arc::new(JwtManager::new(&secret, config.auth.jwt_expiration_secs)),
            uploads: UploadStore::from_config(&config.storage),
            repo: Repository::new(db.clone()),
            allocator: Allocator::new(db.write().clone()),
            config: Arc::new(config),
            db,
        }
    }
}

impl FromRef<AppState> for Arc<JwtManager> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;

    init_tracing(&config);

    info!("Starting Papertrail API Gateway v{}", papertrail_common::VERSION);

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        PrometheusBuilder::new()
            .with_http_listener(SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port)))
            .set_buckets(metrics::LATENCY_BUCKETS)?
            .install()?;
        info!(port = config.observability.metrics_port, "Prometheus exporter listening");
    }
    metrics::register_metrics();

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    if config.database.bootstrap_schema {
        db.bootstrap_schema().await?;
    }

    let addr = config.bind_address();
    let state = AppState::new(config, db);
    let app = create_router(state);

    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

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
pub fn create_router(state: AppState) -> Router {
    use handlers::*;

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let api_routes = Router::new()
        // Health endpoints (no auth)
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))

        // Accounts
        .route("/auth/{role}/signup", post(auth::signup))
        .route("/auth/{role}/login", post(auth::login))

        // Author intake
        .route("/submissions", post(submissions::create_submission))
        .route("/authors/verify", post(submissions::verify_author))
        .route("/authors/{access_code}/papers", post(submissions::add_paper))

        // Papers
        .route("/papers", get(papers::list_papers))
        .route("/papers/lookup", post(papers::lookup_papers))
        .route("/papers/{id}/status", put(papers::update_status))

        // Reviewers
        .route("/reviewers", post(reviewers::create_reviewer).get(reviewers::list_reviewers))
        .route("/reviewers/assignments", post(reviewers::reviewer_assignments))
        .route("/reviewers/papers", post(reviewers::reviewer_papers))

        // Allocation
        .route(
            "/assignments",
            post(assignments::create_assignment).get(assignments::list_assignments),
        )

        // Reviews
        .route("/reviews", post(reviews::submit_review).get(reviews::list_reviews))

        // Conference
        .route("/conference", post(conference::schedule_paper).get(conference::list_schedule))

        // Contact
        .route("/contact", post(contact::create_message).get(contact::list_messages));

    let mut app = Router::new()
        .nest("/v1", api_routes)
        .layer(axum::middleware::from_fn(middleware::metrics::track_metrics));

    if state.config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(
            state.config.rate_limit.requests_per_second,
            state.config.rate_limit.burst,
        );
        app = app.layer(axum::middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit::rate_limit_middleware,
        ));
    }

    // Compose the app
    app.layer(DefaultBodyLimit::max(state.config.server.max_body_bytes))
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
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
