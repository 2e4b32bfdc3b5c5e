//! Documentation of a course platform backend.
//!
//!
//!
//! # General Infrastructure
//! - Single axum server in front of one Redis instance used as the document store
//! - Credentials are issued by the auth service, which writes `session:{token}` keys this server
//!   resolves on every authenticated request
//! - Transactional mail is handed to an HTTP relay when `NOTIFY_WEBHOOK_URL` is set, otherwise it
//!   is only logged
//! - Video files are served by the CDN, courses only carry their URLs
//!
//!
//!
//! # Endpoints
//!
//! | Method | Path | Access |
//! |---|---|---|
//! | GET | `/health` | public |
//! | GET | `/courses` | public |
//! | GET | `/courses/category/{category}` | public |
//! | GET | `/courses/{course_id}` | public |
//! | POST | `/courses/create` | instructor, admin |
//! | PUT, DELETE | `/courses/{course_id}` | owner, admin |
//! | POST | `/courses/{course_id}/sections` | owner, admin |
//! | PUT, DELETE | `/courses/{course_id}/sections/{section_id}` | owner, admin |
//! | POST | `/courses/{course_id}/sections/{section_id}/videos` | owner, admin |
//! | PUT, DELETE | `/courses/{course_id}/sections/{section_id}/videos/{video_id}` | owner, admin |
//! | POST | `/courses/{course_id}/videos` | owner, admin |
//! | PUT, DELETE | `/courses/{course_id}/videos/{video_id}` | owner, admin |
//! | POST | `/enrollments/create` | self, admin |
//! | GET | `/enrollments/user/{user_id}` | self, admin |
//! | GET | `/enrollments/course/{course_id}` | owner, admin |
//! | GET | `/enrollments/{enrollment_id}` | self, admin |
//! | GET | `/enrollments/{enrollment_id}/certificate` | self, admin |
//! | PUT | `/enrollments/update/{enrollment_id}` | self, admin |
//! | GET | `/profile/stats` | self |
//! | GET | `/dashboard/student/stats/{user_id}` | self, admin |
//! | GET | `/dashboard/admin/stats` | admin |
//!
//! Success bodies are `{ success: true, data }`, lists add `count`. Failures are
//! `{ success: false, message }`.
//!
//!
//!
//! # Progress Reports
//! - `completedVideos` is merged as a set union, it never shrinks
//! - `currentVideoIndex` is overwritten when present
//! - `isCompleted` from the client is a hint, completion is always derived here and never reverts
//!
//!
//!
//! # Setup
//!
//! Environment
//! - `RUST_PORT`, `REDIS_URL`, `CORS_ORIGIN`, `NOTIFY_WEBHOOK_URL`, `REQUEST_TIMEOUT_MS`
//! - Secret `NOTIFY_WEBHOOK_KEY` under `/run/secrets`, falls back to the environment
//! - `RUST_LOG` filters logs, `LOG_FORMAT=json` switches to JSON lines
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::{get, post, put},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

pub mod auth;
pub mod catalog;
pub mod config;
pub mod dashboard;
pub mod database;
pub mod enrollments;
pub mod error;
pub mod memory;
pub mod notify;
pub mod routes;
pub mod state;
pub mod store;
pub mod utils;

use config::Config;
use error::StartupError;
use routes::*;
use state::State;

pub fn app(state: Arc<State>) -> Router {
    let origin = match &state.config.cors_origin {
        Some(origin) => AllowOrigin::exact(origin.clone()),
        None => AllowOrigin::any(),
    };
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/health", get(health_handler))
        .route("/courses", get(list_courses_handler))
        .route("/courses/create", post(create_course_handler))
        .route(
            "/courses/category/{category}",
            get(courses_by_category_handler),
        )
        .route(
            "/courses/{course_id}",
            get(get_course_handler)
                .put(update_course_handler)
                .delete(delete_course_handler),
        )
        .route("/courses/{course_id}/sections", post(add_section_handler))
        .route(
            "/courses/{course_id}/sections/{section_id}",
            put(update_section_handler).delete(delete_section_handler),
        )
        .route(
            "/courses/{course_id}/sections/{section_id}/videos",
            post(add_section_video_handler),
        )
        .route(
            "/courses/{course_id}/sections/{section_id}/videos/{video_id}",
            put(update_section_video_handler).delete(delete_section_video_handler),
        )
        .route("/courses/{course_id}/videos", post(add_video_handler))
        .route(
            "/courses/{course_id}/videos/{video_id}",
            put(update_video_handler).delete(delete_video_handler),
        )
        .route("/enrollments/create", post(create_enrollment_handler))
        .route("/enrollments/user/{user_id}", get(user_enrollments_handler))
        .route(
            "/enrollments/course/{course_id}",
            get(course_enrollments_handler),
        )
        .route(
            "/enrollments/update/{enrollment_id}",
            put(update_progress_handler),
        )
        .route("/enrollments/{enrollment_id}", get(get_enrollment_handler))
        .route(
            "/enrollments/{enrollment_id}/certificate",
            get(certificate_handler),
        )
        .route("/profile/stats", get(profile_stats_handler))
        .route(
            "/dashboard/student/stats/{user_id}",
            get(student_stats_handler),
        )
        .route("/dashboard/admin/stats", get(admin_stats_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn init_tracing() {
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json");

    if json {
        fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    } else {
        fmt().with_env_filter(EnvFilter::from_default_env()).init();
    }
}

pub async fn start_server() -> Result<(), StartupError> {
    init_tracing();

    run().await.inspect_err(|e| {
        error!("Server failed: {e}");
    })
}

async fn run() -> Result<(), StartupError> {
    info!("Loading config...");
    let config = Config::load()?;

    info!("Initializing state...");
    let state = State::new(config).await?;

    info!("Starting server...");
    let address = format!("0.0.0.0:{}", state.config.port);
    let app = app(state);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
