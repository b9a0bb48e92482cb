//! HTTP trigger for background scrape runs.

use anyhow::{Context, Result};
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::Config;
use crate::pipeline::Pipeline;
use crate::tasks::{TaskRecord, TaskRegistry};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: Arc<Pipeline>,
    pub tasks: TaskRegistry,
}

#[derive(Debug, Deserialize)]
pub struct ScrapeRequest {
    #[serde(default = "default_pages")]
    pub pages: u32,
}

fn default_pages() -> u32 {
    1
}

#[derive(Debug, Serialize)]
pub struct ScrapeResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/scrape", post(scrape_handler))
        .route("/tasks/:id", get(task_handler))
        .route("/health", get(health_handler))
        .layer(Extension(state))
}

pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on {}", addr);

    axum::serve(listener, build_router(state))
        .await
        .context("Server error")
}

/// Schedule a run and return immediately
pub async fn scrape_handler(
    Extension(state): Extension<AppState>,
    Json(request): Json<ScrapeRequest>,
) -> (StatusCode, Json<ScrapeResponse>) {
    if request.pages == 0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(ScrapeResponse {
                message: "pages must be at least 1".to_string(),
                task_id: None,
            }),
        );
    }

    let task_id = state.tasks.enqueue(request.pages).await;
    let params = state.config.scrape_params(request.pages);
    let pipeline = state.pipeline.clone();
    let tasks = state.tasks.clone();

    tokio::spawn(async move {
        tasks.mark_running(task_id).await;
        match pipeline.run(&params).await {
            Ok(summary) => tasks.mark_done(task_id, summary).await,
            Err(e) => {
                error!("Scrape task {} failed: {:#}", task_id, e);
                tasks.mark_failed(task_id, format!("{e:#}")).await;
            }
        }
    });

    info!("Scheduled scrape task {} for {} pages", task_id, request.pages);
    (
        StatusCode::ACCEPTED,
        Json(ScrapeResponse {
            message: format!(
                "Scraping for {} pages initiated in the background.",
                request.pages
            ),
            task_id: Some(task_id),
        }),
    )
}

pub async fn task_handler(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskRecord>, StatusCode> {
    state.tasks.get(id).await.map(Json).ok_or(StatusCode::NOT_FOUND)
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, LoadError};
    use crate::models::CanonicalListing;
    use crate::normalize::{IdStrategy, Normalizer};
    use crate::scrapers::PageFetcher;
    use crate::storage::{ListingStore, MemoryStore};
    use crate::tasks::TaskState;
    use async_trait::async_trait;
    use std::time::Duration;

    struct OfflineFetcher;

    #[async_trait]
    impl PageFetcher for OfflineFetcher {
        async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
            Err(FetchError::Status {
                url: url.to_string(),
                status: 503,
            })
        }

        fn source_name(&self) -> &'static str {
            "offline"
        }
    }

    /// One card per index page; every detail page is blank
    struct CannedFetcher;

    #[async_trait]
    impl PageFetcher for CannedFetcher {
        async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
            if url.contains("?page=") {
                Ok(r#"<div class="d3-ad-tile"><a href="/listing/1">Casa en Boquete</a></div>"#.into())
            } else {
                Ok("<html><body></body></html>".into())
            }
        }

        fn source_name(&self) -> &'static str {
            "canned"
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl ListingStore for BrokenStore {
        async fn ensure_schema(&self) -> Result<(), LoadError> {
            Ok(())
        }

        async fn insert_batch(&self, _rows: &[CanonicalListing]) -> Result<u64, LoadError> {
            Err(LoadError::Transaction(sqlx::Error::PoolClosed))
        }
    }

    fn state() -> AppState {
        state_with(Arc::new(OfflineFetcher), Arc::new(MemoryStore::new()))
    }

    fn state_with(fetcher: Arc<dyn PageFetcher>, store: Arc<dyn ListingStore>) -> AppState {
        let config = Config::from_lookup(|key| {
            (key == "SCRAPER_DELAY_SECS").then(|| "0".to_string())
        })
        .unwrap();
        let pipeline = Pipeline::new(fetcher, store, Normalizer::new(IdStrategy::Random, 1));
        AppState {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            tasks: TaskRegistry::new(),
        }
    }

    #[tokio::test]
    async fn scrape_schedules_a_task_that_completes() {
        let state = state();
        let (status, Json(body)) =
            scrape_handler(Extension(state.clone()), Json(ScrapeRequest { pages: 2 })).await;

        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body.message, "Scraping for 2 pages initiated in the background.");
        let id = body.task_id.unwrap();

        let mut task = state.tasks.get(id).await.unwrap();
        for _ in 0..100 {
            if task.state == TaskState::Done {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            task = state.tasks.get(id).await.unwrap();
        }
        assert_eq!(task.state, TaskState::Done);
        let summary = task.summary.unwrap();
        assert_eq!(summary.index_failures, 2);
        assert_eq!(summary.stubs, 0);
    }

    async fn wait_for_finish(state: &AppState, id: Uuid) -> TaskRecord {
        for _ in 0..100 {
            let task = state.tasks.get(id).await.unwrap();
            if matches!(task.state, TaskState::Done | TaskState::Failed) {
                return task;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        state.tasks.get(id).await.unwrap()
    }

    #[tokio::test]
    async fn load_failure_marks_the_task_failed() {
        let state = state_with(Arc::new(CannedFetcher), Arc::new(BrokenStore));
        let (status, Json(body)) =
            scrape_handler(Extension(state.clone()), Json(ScrapeRequest { pages: 1 })).await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let task = wait_for_finish(&state, body.task_id.unwrap()).await;
        assert_eq!(task.state, TaskState::Failed);
        assert!(task.summary.is_none());
        assert!(task.error.unwrap().contains("Failed to load listings"));
    }

    #[tokio::test]
    async fn zero_pages_is_rejected() {
        let (status, Json(body)) =
            scrape_handler(Extension(state()), Json(ScrapeRequest { pages: 0 })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.task_id.is_none());
    }

    #[tokio::test]
    async fn unknown_task_is_not_found() {
        let result = task_handler(Extension(state()), Path(Uuid::new_v4())).await;
        assert_eq!(result.err(), Some(StatusCode::NOT_FOUND));
    }
}
