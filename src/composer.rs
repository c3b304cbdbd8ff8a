use crate::config::{AppConfig, SourceConfig, SourceKind};
use crate::control::{apply, ControlSnapshot, LayerControlState};
use crate::data::{FeatureSetLoader, Transport};
use crate::layers::{LayerBuilder, LayerShape};
use crate::types::{FeatureCollection, LoadResult};
use crate::viewport::ViewportFitCoordinator;
use crate::widget::{HeadlessMap, MapView};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Warning,
    /// Nothing could be loaded; the UI should block with an alert.
    Blocking,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub message: String,
}

/// User-visible notices raised while composing the map.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Notices(Vec<Notice>);

impl Notices {
    pub fn warn(&mut self, source: &str, message: String) {
        self.0.push(Notice {
            level: NoticeLevel::Warning,
            source: Some(source.to_string()),
            message,
        });
    }

    pub fn block(&mut self, message: String) {
        self.0.push(Notice {
            level: NoticeLevel::Blocking,
            source: None,
            message,
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.0.iter()
    }

    pub fn for_source<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a Notice> + 'a {
        self.0
            .iter()
            .filter(move |n| n.source.as_deref() == Some(source))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything the UI needs after composition.
pub struct Composition {
    pub control: LayerControlState,
    pub map: HeadlessMap,
    pub notices: Notices,
}

#[derive(Debug, Serialize)]
pub struct MapSnapshot {
    pub view: MapView,
    pub on_map: Vec<String>,
    #[serde(flatten)]
    pub control: ControlSnapshot,
    pub notices: Notices,
}

impl Composition {
    pub fn snapshot(&self) -> MapSnapshot {
        MapSnapshot {
            view: self.map.view().clone(),
            on_map: self.map.layers().to_vec(),
            control: self.control.snapshot(),
            notices: self.notices.clone(),
        }
    }
}

pub struct MapComposer {
    config: AppConfig,
    loader: FeatureSetLoader,
}

impl MapComposer {
    pub fn new(config: AppConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            loader: FeatureSetLoader::new(transport),
        }
    }

    /// Loads every source concurrently and registers each layer as its load
    /// completes, in whatever order that happens. A failed source only costs
    /// its own layer.
    pub async fn compose(self) -> Composition {
        let MapComposer { config, loader } = self;

        let mut map = HeadlessMap::new(config.map.center, config.map.zoom);
        let mut control = LayerControlState::new(config.labels.clone());
        let mut notices = Notices::default();
        let mut viewport = ViewportFitCoordinator::new(config.viewport.policy);

        for base in &config.base_layers {
            match control.register_base(base.tiles.clone(), base.default) {
                Ok(transitions) => apply(&transitions, &mut map),
                Err(e) => error!(layer = %base.tiles.name, reason = %e, "Failed to register base layer"),
            }
        }

        let loader = &loader;
        let mut pending: FuturesUnordered<_> = config
            .sources
            .iter()
            .map(|source| async move { (source, loader.load(&source.name, &source.location).await) })
            .collect();

        let mut framed: Vec<&str> = Vec::new();
        let mut failed = 0;

        while let Some((source, result)) = pending.next().await {
            match result {
                LoadResult::Loaded(collection) => {
                    if !register_source(source, collection, &mut control, &mut map, &mut notices) {
                        failed += 1;
                        continue;
                    }
                    if source.primary {
                        framed.push(&source.name);
                        let collections: Vec<&FeatureCollection> = framed
                            .iter()
                            .filter_map(|name| control.overlay(name))
                            .map(|layer| &layer.collection)
                            .collect();
                        viewport.fit(&collections, &mut map);
                    }
                }
                LoadResult::Failed { source: name, error } => {
                    failed += 1;
                    notices.warn(
                        &name,
                        format!("No se pudo cargar la capa \"{}\": {}", name, error),
                    );
                }
            }
        }

        if !config.sources.is_empty() && failed == config.sources.len() {
            warn!("Every source failed to load");
            notices.block(
                "No se pudo cargar el mapa. Verifique la consola para más detalles.".to_string(),
            );
        }

        info!(
            layers = map.layers().len(),
            notices = notices.len(),
            "Map composed"
        );

        Composition {
            control,
            map,
            notices,
        }
    }
}

/// Builds and registers one loaded source. `false` means the source ended up
/// without a layer and a notice was raised for it.
fn register_source(
    source: &SourceConfig,
    collection: FeatureCollection,
    control: &mut LayerControlState,
    map: &mut HeadlessMap,
    notices: &mut Notices,
) -> bool {
    let template = source.popup_template();
    let builder = LayerBuilder {
        table: source.encoding.table(),
        encoding_key: &source.encoding_key,
        template: &template,
    };
    let shape = match source.kind {
        SourceKind::Points => LayerShape::Points(source.cluster.clone()),
        SourceKind::Regions => LayerShape::Regions(source.region_style.clone()),
    };

    let outcome = builder.build(collection, shape);
    if outcome.layer.rendered_len() == 0 {
        warn!(source = %source.name, skipped = outcome.skipped.len(), "No feature could be rendered");
        notices.warn(
            &source.name,
            format!(
                "La capa \"{}\" no tiene elementos válidos para mostrar",
                source.name
            ),
        );
        return false;
    }
    match control.register_overlay(outcome.layer, source.visible) {
        Ok(transitions) => {
            apply(&transitions, map);
            true
        }
        Err(e) => {
            error!(source = %source.name, reason = %e, "Failed to register layer");
            notices.warn(&source.name, format!("No se pudo registrar la capa: {}", e));
            false
        }
    }
}
