use crate::composer::{Composition, MapSnapshot};
use crate::config::AppConfig;
use crate::control::{apply, ControlError};
use crate::encoding::EncodingTableId;
use crate::render;
use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::info;

pub struct AppState {
    composition: Mutex<Composition>,
}

impl AppState {
    pub fn new(composition: Composition) -> Self {
        Self {
            composition: Mutex::new(composition),
        }
    }

    // Handlers never hold the lock across an await point.
    fn lock(&self) -> MutexGuard<'_, Composition> {
        self.composition
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Serialize)]
pub struct LegendEntry {
    category: &'static str,
    color: &'static str,
}

#[derive(Serialize)]
pub struct Legend {
    table: &'static str,
    entries: Vec<LegendEntry>,
    default: &'static str,
}

pub struct ApiError(ControlError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            ControlError::UnknownLayer(_) => StatusCode::NOT_FOUND,
            ControlError::DuplicateLayer(_) => StatusCode::CONFLICT,
            ControlError::NotABaseLayer(_) | ControlError::NotAnOverlay(_) => {
                StatusCode::BAD_REQUEST
            }
        };
        (status, self.0.to_string()).into_response()
    }
}

impl From<ControlError> for ApiError {
    fn from(e: ControlError) -> Self {
        ApiError(e)
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/map", get(map_handler))
        .route("/api/legend", get(legend_handler))
        .route("/api/layers/:name", get(layer_handler))
        .route("/api/base/:name", post(select_base_handler))
        .route("/api/overlays/:name/toggle", post(toggle_overlay_handler))
        .route("/icons/:file", get(icon_handler))
        .with_state(state)
}

pub async fn start_server(config: AppConfig, composition: Composition) -> Result<()> {
    let state = Arc::new(AppState::new(composition));

    let port = config.server.port;
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    println!("Serving map on http://{}", addr);

    let app = router(state)
        .fallback_service(ServeDir::new(&config.server.static_dir))
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn map_handler(State(state): State<Arc<AppState>>) -> Json<MapSnapshot> {
    Json(state.lock().snapshot())
}

async fn legend_handler() -> Json<Vec<Legend>> {
    let legends = EncodingTableId::ALL
        .iter()
        .map(|id| {
            let table = id.table();
            Legend {
                table: table.name(),
                entries: table
                    .entries()
                    .map(|(category, style)| LegendEntry {
                        category,
                        color: style.color,
                    })
                    .collect(),
                default: table.default_style().color,
            }
        })
        .collect();
    Json(legends)
}

async fn layer_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<geojson::FeatureCollection>, ApiError> {
    let composition = state.lock();
    let layer = composition
        .control
        .overlay(&name)
        .ok_or_else(|| ControlError::UnknownLayer(name.clone()))?;
    Ok(Json(layer.to_geojson()))
}

async fn select_base_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<MapSnapshot>, ApiError> {
    let mut composition = state.lock();
    let Composition { control, map, .. } = &mut *composition;
    let transitions = control.select_base(&name)?;
    apply(&transitions, map);
    info!(layer = %name, "Base layer selected");
    Ok(Json(composition.snapshot()))
}

async fn toggle_overlay_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<MapSnapshot>, ApiError> {
    let mut composition = state.lock();
    let Composition { control, map, .. } = &mut *composition;
    let transitions = control.toggle_overlay(&name)?;
    apply(&transitions, map);
    info!(layer = %name, visible = control.is_visible(&name)?, "Overlay toggled");
    Ok(Json(composition.snapshot()))
}

async fn icon_handler(Path(file): Path<String>) -> Response {
    match render::color_from_icon_file(&file) {
        Some(color) => (
            [(header::CONTENT_TYPE, "image/svg+xml")],
            render::marker_svg(color),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::MapComposer;
    use crate::data::tests::{StaticTransport, POINTS};

    const CONFIG: &str = r#"
        [[base_layers]]
        name = "OpenStreetMap"
        url = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png"

        [[base_layers]]
        name = "Google Mapa"
        url = "https://mt1.google.com/vt/lyrs=m&x={x}&y={y}&z={z}"

        [[sources]]
        name = "Alojamientos"
        location = "alojamientos.geojson"
        kind = "points"
        encoding = "accommodation_class"
        encoding_key = "clase"
        visible = false
    "#;

    async fn state() -> Arc<AppState> {
        let config = AppConfig::from_toml(CONFIG).unwrap();
        let transport = StaticTransport::new().with("alojamientos.geojson", Ok(POINTS));
        let composition = MapComposer::new(config, Arc::new(transport)).compose().await;
        Arc::new(AppState::new(composition))
    }

    #[tokio::test]
    async fn toggle_handler_updates_map_and_label() {
        let state = state().await;

        let Json(snapshot) =
            toggle_overlay_handler(State(state.clone()), Path("Alojamientos".to_string()))
                .await
                .ok()
                .unwrap();
        assert!(snapshot.on_map.contains(&"Alojamientos".to_string()));
        assert_eq!(
            snapshot.control.overlays[0].label.as_deref(),
            Some("Ocultar Alojamientos")
        );

        let Json(snapshot) = toggle_overlay_handler(State(state), Path("Alojamientos".to_string()))
            .await
            .ok()
            .unwrap();
        assert!(!snapshot.on_map.contains(&"Alojamientos".to_string()));
        assert_eq!(
            snapshot.control.overlays[0].label.as_deref(),
            Some("Mostrar Alojamientos")
        );
    }

    #[tokio::test]
    async fn base_handler_switches_and_rejects_overlays() {
        let state = state().await;

        let Json(snapshot) = select_base_handler(State(state.clone()), Path("Google Mapa".to_string()))
            .await
            .ok()
            .unwrap();
        assert_eq!(snapshot.on_map, vec!["Google Mapa".to_string()]);

        let response = select_base_handler(State(state), Path("Alojamientos".to_string()))
            .await
            .err()
            .unwrap()
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_layer_is_not_found() {
        let state = state().await;
        let response = layer_handler(State(state), Path("Rutas".to_string()))
            .await
            .err()
            .unwrap()
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn layer_handler_returns_rendered_features() {
        let state = state().await;
        let Json(collection) = layer_handler(State(state), Path("Alojamientos".to_string()))
            .await
            .ok()
            .unwrap();
        assert_eq!(collection.features.len(), 2);
    }

    #[tokio::test]
    async fn icons_are_served_as_svg() {
        let response = icon_handler(Path("darkred.svg".to_string())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "image/svg+xml"
        );

        let response = icon_handler(Path("darkred.png".to_string())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn legend_lists_all_tables() {
        let Json(legends) = legend_handler().await;
        assert_eq!(legends.len(), 3);
        assert_eq!(legends[0].table, "accommodation_class");
        assert_eq!(legends[0].entries.len(), 20);
        assert_eq!(legends[0].default, "gray");
    }
}
