use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;
use warp::{http::StatusCode, reply, Filter, Rejection, Reply};

use super::types::{ReprocessResponse, SourcesResponse};
use super::ApiError;
use crate::error_handling::types::IngestError;
use crate::ingestion::{Coordinator, SourceStatus};

/// Largest accepted reprocess window: one week.
pub const MAX_REPROCESS_MINUTES: i64 = 7 * 24 * 60;

type ApiResult<T> = Result<T, (StatusCode, ApiError)>;

fn api_error<T>(status: StatusCode, message: impl Into<String>) -> ApiResult<T> {
    Err((
        status,
        ApiError {
            message: message.into(),
        },
    ))
}

fn into_reply<T: Serialize>(result: ApiResult<T>) -> reply::Response {
    match result {
        Ok(body) => reply::with_status(reply::json(&body), StatusCode::OK).into_response(),
        Err((status, err)) => reply::with_status(reply::json(&err), status).into_response(),
    }
}

pub fn list_sources(coordinator: &Coordinator) -> SourcesResponse {
    SourcesResponse {
        sources: coordinator.source_statuses(),
        pool: coordinator.connection_manager().pool_stats(),
    }
}

pub fn source_status(coordinator: &Coordinator, id: &str) -> ApiResult<SourceStatus> {
    match coordinator.source_status(id) {
        Some(status) => Ok(status),
        None => api_error(StatusCode::NOT_FOUND, format!("Unknown source {}", id)),
    }
}

/// Lowers the watermark of `id` to `minutes` before now.
pub async fn reprocess(
    coordinator: &Coordinator,
    id: &str,
    minutes: i64,
) -> ApiResult<ReprocessResponse> {
    if !(1..=MAX_REPROCESS_MINUTES).contains(&minutes) {
        return api_error(
            StatusCode::BAD_REQUEST,
            format!("minutes must be between 1 and {}", MAX_REPROCESS_MINUTES),
        );
    }
    match coordinator.reprocess_last(id, minutes).await {
        Ok(watermark) => {
            info!("Reprocess of {} requested for the last {} minute(s)", id, minutes);
            Ok(ReprocessResponse {
                source_id: id.to_string(),
                minutes,
                watermark,
            })
        }
        Err(IngestError::UnknownSource(_)) => {
            api_error(StatusCode::NOT_FOUND, format!("Unknown source {}", id))
        }
        Err(e) => {
            warn!("Reprocess of {} failed: {}", id, e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// GET /
pub fn dashboard_route() -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path::end().and(warp::get()).and_then(|| async move {
        let html = r#"<html><head><title>killfeed</title></head>
                <body><h1>killfeed is running</h1><p>See /sources for JSON.</p></body></html>"#;
        Ok::<_, Rejection>(reply::html(html))
    })
}

/// GET /sources
pub fn list_sources_route(
    coordinator: Arc<Coordinator>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("sources")
        .and(warp::path::end())
        .and(warp::get())
        .and_then(move || {
            let coordinator = coordinator.clone();
            async move { Ok::<_, Rejection>(into_reply(Ok(list_sources(&coordinator)))) }
        })
}

/// GET /sources/:id
pub fn source_status_route(
    coordinator: Arc<Coordinator>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("sources" / String)
        .and(warp::get())
        .and_then(move |id: String| {
            let coordinator = coordinator.clone();
            async move { Ok::<_, Rejection>(into_reply(source_status(&coordinator, &id))) }
        })
}

/// POST /sources/:id/reprocess/:minutes
pub fn reprocess_route(
    coordinator: Arc<Coordinator>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("sources" / String / "reprocess" / i64)
        .and(warp::post())
        .and_then(move |id: String, minutes: i64| {
            let coordinator = coordinator.clone();
            async move {
                Ok::<_, Rejection>(into_reply(reprocess(&coordinator, &id, minutes).await))
            }
        })
}

/// Every route of the operator API.
pub fn api_routes(
    coordinator: Arc<Coordinator>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    dashboard_route()
        .or(list_sources_route(coordinator.clone()))
        .or(source_status_route(coordinator.clone()))
        .or(reprocess_route(coordinator))
}
