use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::{Form, Router};
use http::Method;
use log::{error, info};
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::model::{Coordinate, TravelMode};
use crate::pipeline::{Origin, RequestPipeline, RouteQuery};
use crate::render::{map_document, render_index};

pub struct AppState {
    pub pipeline: Arc<RequestPipeline>,
    /// Past this the pipeline task is aborted and the generic failure page served
    pub request_timeout: Duration,
}

/// Fields posted by the index form. Everything is optional at the wire level
/// so that missing fields surface through the generic failure page.
#[derive(Debug, Default, Deserialize)]
pub struct RouteForm {
    use_current_location: Option<String>,
    lat1: Option<String>,
    lng1: Option<String>,
    start_address: Option<String>,
    destination: Option<String>,
    vehicle_type: Option<String>,
}

impl RouteForm {
    fn into_query(self, request_id: Uuid) -> anyhow::Result<RouteQuery> {
        let origin = if self.use_current_location.as_deref() == Some("true") {
            let lat = self
                .lat1
                .context("missing lat1")?
                .trim()
                .parse::<f64>()
                .context("invalid lat1")?;
            let lng = self
                .lng1
                .context("missing lng1")?
                .trim()
                .parse::<f64>()
                .context("invalid lng1")?;
            Origin::Coordinates(Coordinate::new(lat, lng))
        } else {
            Origin::Address(self.start_address.context("missing start_address")?)
        };

        Ok(RouteQuery {
            request_id,
            origin,
            destination: self.destination.context("missing destination")?,
            mode: TravelMode::from_vehicle_type(
                &self.vehicle_type.context("missing vehicle_type")?,
            ),
        })
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        // allow `GET` and `POST` when accessing the resource
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index).post(submit))
        .route("/health", get(|| async { "OK" }))
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(state)
}

async fn index() -> Html<String> {
    Html(render_index(None, None))
}

fn failure_page(request_id: Uuid, err: PipelineError) -> Html<String> {
    match &err {
        PipelineError::Internal(e) => error!("[{}] Error processing request: {:#}", request_id, e),
        other => info!("[{}] Request ended: {}", request_id, other),
    }
    Html(render_index(Some(&[err.user_message().to_string()]), None))
}

async fn submit(State(state): State<Arc<AppState>>, Form(form): Form<RouteForm>) -> Html<String> {
    let request_id = Uuid::new_v4();

    let query = match form.into_query(request_id) {
        Ok(query) => query,
        Err(e) => return failure_page(request_id, PipelineError::Internal(e)),
    };
    info!(
        "[{}] Route request to {:?} ({:?})",
        request_id, query.destination, query.mode
    );

    // A panic or an overrun inside the pipeline must still produce the generic page
    let pipeline = state.pipeline.clone();
    let mut task = tokio::spawn(async move { pipeline.plan(&query).await });
    let outcome = match tokio::time::timeout(state.request_timeout, &mut task).await {
        Ok(joined) => joined
            .unwrap_or_else(|e| Err(PipelineError::Internal(anyhow!("pipeline task failed: {}", e)))),
        Err(_) => {
            task.abort();
            Err(PipelineError::Internal(anyhow!(
                "request exceeded {:?}",
                state.request_timeout
            )))
        }
    };

    match outcome {
        Ok(plan) => {
            info!(
                "[{}] Served {} route(s)",
                request_id,
                plan.routes.len()
            );
            Html(render_index(Some(&plan.durations), Some(&map_document(&plan))))
        }
        Err(e) => failure_page(request_id, e),
    }
}
