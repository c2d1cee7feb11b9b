use crate::compose::{compose, LayerFailure};
use crate::config::AppConfig;
use crate::data::DatasetLoader;
use crate::layers::{Category, LayerId, LayerToggleSet};
use crate::render;
use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{error, info};

pub struct AppState {
    pub loader: DatasetLoader,
    pub config: AppConfig,
}

#[derive(Deserialize)]
pub struct FeatureQuery {
    category: String,
    /// Comma separated sub-layer keys.
    #[serde(default)]
    layers: String,
}

impl FeatureQuery {
    fn toggles(&self) -> crate::error::Result<LayerToggleSet> {
        let category: Category = self.category.parse()?;
        let layers = self
            .layers
            .split(',')
            .filter(|key| !key.trim().is_empty())
            .map(str::parse::<LayerId>)
            .collect::<crate::error::Result<Vec<_>>>()?;
        LayerToggleSet::from_parts(category, layers)
    }
}

#[derive(Serialize)]
pub struct PassResponse {
    collection: FeatureCollection,
    failures: Vec<LayerFailure>,
}

pub fn router(state: Arc<AppState>) -> Router {
    let output = ServeDir::new(&state.config.output.dir);
    Router::new()
        .route("/", get(index_handler))
        .route("/api/layers", get(layers_handler))
        .route("/api/features", get(features_handler))
        .nest_service("/output", output)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: AppConfig) -> Result<()> {
    let loader = DatasetLoader::from_config(&config);
    let port = config.server.port;
    let state = Arc::new(AppState { loader, config });

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn index_handler(State(state): State<Arc<AppState>>) -> Response {
    match render::interactive_page(&state.config.map) {
        Ok(page) => Html(page).into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

async fn layers_handler() -> Json<serde_json::Value> {
    Json(render::layer_catalogue())
}

// One render pass per request; datasets come from the loader's cache after
// their first use.
async fn features_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FeatureQuery>,
) -> Response {
    let toggles = match query.toggles() {
        Ok(toggles) => toggles,
        Err(err) => return (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    };
    info!("Render pass for {:?}", toggles.active_layers());

    let worker = Arc::clone(&state);
    let pass = match tokio::task::spawn_blocking(move || compose(&toggles, &worker.loader)).await {
        Ok(pass) => pass,
        Err(err) => {
            error!("Render pass aborted: {}", err);
            return (StatusCode::INTERNAL_SERVER_ERROR, "render pass aborted").into_response();
        }
    };
    Json(PassResponse {
        collection: render::feature_collection(&pass.features),
        failures: pass.failures,
    })
    .into_response()
}
