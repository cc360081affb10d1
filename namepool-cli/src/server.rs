//! HTTP exposure of a name manager.
//!
//! A thin translation of the engine operations to endpoints: every endpoint
//! is a GET, bodies are UTF-8 text, 200 means success and 500 an internal
//! error. `$try_acquire` reports its business outcomes in the 200 body so
//! they stay distinguishable from transport errors.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use namepool_core::{Error, Name, NameManager, StoreError};
use tower_http::trace::TraceLayer;

pub type AppState = Arc<dyn NameManager>;

pub async fn run(address: &str, manager: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(address).await?;
    tracing::info!(address = %listener.local_addr()?, "namepool server listening");
    axum::serve(listener, router(manager)).await?;
    Ok(())
}

pub fn router(manager: AppState) -> Router {
    Router::new()
        .route("/family/{family}/$acquire", get(acquire))
        .route("/family/{family}/name/{name}/$keep_alive", get(keep_alive))
        .route("/family/{family}/name/{name}/$release", get(release))
        .route("/family/{family}/name/{name}/$try_acquire", get(try_acquire))
        .route("/", get(list))
        .route("/$reset", get(reset))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(manager)
}

/// The engine blocks on store I/O; keep it off the async workers.
async fn blocking<T: Send + 'static>(
    f: impl FnOnce() -> namepool_core::Result<T> + Send + 'static,
) -> namepool_core::Result<T> {
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result,
        Err(err) => Err(StoreError::Backend(format!("engine task failed: {err}")).into()),
    }
}

async fn acquire(
    State(manager): State<AppState>,
    Path(family): Path<String>,
) -> (StatusCode, String) {
    let result = {
        let family = family.clone();
        blocking(move || manager.acquire(&family)).await
    };
    match result {
        Ok(name) => {
            tracing::info!(%family, %name, "name acquired");
            (StatusCode::OK, name)
        }
        Err(err) => {
            tracing::error!(%family, error = %err, "could not acquire");
            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
        }
    }
}

async fn keep_alive(
    State(manager): State<AppState>,
    Path((family, name)): Path<(String, String)>,
) -> StatusCode {
    let result = {
        let (family, name) = (family.clone(), name.clone());
        blocking(move || manager.keep_alive(&family, &name)).await
    };
    match result {
        Ok(()) => {
            tracing::debug!(%family, %name, "keep alive");
            StatusCode::OK
        }
        Err(err) => {
            tracing::error!(%family, %name, error = %err, "keep alive errored");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

async fn release(
    State(manager): State<AppState>,
    Path((family, name)): Path<(String, String)>,
) -> StatusCode {
    let result = {
        let (family, name) = (family.clone(), name.clone());
        blocking(move || manager.release(&family, &name)).await
    };
    match result {
        Ok(()) => {
            tracing::info!(%family, %name, "name released");
            StatusCode::OK
        }
        Err(err) => {
            tracing::error!(%family, %name, error = %err, "could not release");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

async fn try_acquire(
    State(manager): State<AppState>,
    Path((family, name)): Path<(String, String)>,
) -> (StatusCode, &'static str) {
    let result = {
        let (family, name) = (family.clone(), name.clone());
        blocking(move || manager.try_acquire(&family, &name)).await
    };
    let response = match result {
        Ok(()) => "OK",
        Err(Error::NotExist) => "ERR_NOT_EXIST",
        Err(Error::InUse) => "ERR_IN_USE",
        Err(err) => {
            tracing::error!(%family, %name, error = %err, "could not try-acquire");
            return (StatusCode::INTERNAL_SERVER_ERROR, "");
        }
    };
    tracing::info!(%family, %name, response, "try acquire");
    (StatusCode::OK, response)
}

async fn list(State(manager): State<AppState>) -> Result<Json<Vec<Name>>, StatusCode> {
    match blocking(move || manager.list()).await {
        Ok(names) => {
            tracing::debug!(count = names.len(), "list");
            Ok(Json(names))
        }
        Err(err) => {
            tracing::error!(error = %err, "list errored");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn reset(State(manager): State<AppState>) -> StatusCode {
    match blocking(move || manager.reset()).await {
        Ok(()) => {
            tracing::info!("reset");
            StatusCode::OK
        }
        Err(err) => {
            tracing::error!(error = %err, "reset errored");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

async fn health() -> &'static str {
    "OK"
}
