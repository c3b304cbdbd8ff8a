//! Visibility state for base and overlay layers.
//!
//! Base layers are mutually exclusive: once one is registered, exactly one is
//! visible. Overlays toggle independently of each other and of the base.
//! Every change is returned as a batch of [`Transition`]s which [`apply`]
//! pushes to the map widget in one go.

use crate::layers::{ClusterOptions, LayerDescriptor, LayerKind};
use crate::widget::{MapWidget, TileLayer};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("a layer named {0:?} is already registered")]
    DuplicateLayer(String),
    #[error("no layer named {0:?}")]
    UnknownLayer(String),
    #[error("{0:?} is not a base layer")]
    NotABaseLayer(String),
    #[error("{0:?} is not an overlay")]
    NotAnOverlay(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerRole {
    Base,
    Overlay,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Show(String),
    Hide(String),
}

/// Prefixes for the toggle affordance of an overlay ("Mostrar Municipios").
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ToggleLabels {
    pub show_prefix: String,
    pub hide_prefix: String,
}

impl Default for ToggleLabels {
    fn default() -> Self {
        Self {
            show_prefix: "Mostrar".to_string(),
            hide_prefix: "Ocultar".to_string(),
        }
    }
}

#[derive(Debug)]
enum ControlLayer {
    Tiles(TileLayer),
    Data(Box<LayerDescriptor>),
}

#[derive(Debug)]
struct Entry {
    role: LayerRole,
    visible: bool,
    layer: ControlLayer,
}

impl Entry {
    fn name(&self) -> &str {
        match &self.layer {
            ControlLayer::Tiles(tiles) => &tiles.name,
            ControlLayer::Data(layer) => layer.name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerStatus {
    pub name: String,
    pub role: LayerRole,
    pub visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tiles: Option<TileLayer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ClusterOptions>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlSnapshot {
    pub bases: Vec<LayerStatus>,
    pub overlays: Vec<LayerStatus>,
}

#[derive(Debug, Default)]
pub struct LayerControlState {
    entries: Vec<Entry>,
    labels: ToggleLabels,
}

impl LayerControlState {
    pub fn new(labels: ToggleLabels) -> Self {
        Self {
            entries: Vec::new(),
            labels,
        }
    }

    /// The first base registered is always shown. A later base registered as
    /// visible replaces the active one.
    pub fn register_base(
        &mut self,
        tiles: TileLayer,
        visible: bool,
    ) -> Result<Vec<Transition>, ControlError> {
        self.ensure_unique(&tiles.name)?;

        let name = tiles.name.clone();
        let active = self.active_index();
        let show = visible || active.is_none();

        let mut transitions = Vec::new();
        if show {
            if let Some(index) = active {
                self.entries[index].visible = false;
                transitions.push(Transition::Hide(self.entries[index].name().to_string()));
            }
            transitions.push(Transition::Show(name.clone()));
        }

        self.entries.push(Entry {
            role: LayerRole::Base,
            visible: show,
            layer: ControlLayer::Tiles(tiles),
        });
        info!(layer = %name, visible = show, "Registered base layer");
        Ok(transitions)
    }

    pub fn register_overlay(
        &mut self,
        layer: LayerDescriptor,
        visible: bool,
    ) -> Result<Vec<Transition>, ControlError> {
        self.ensure_unique(layer.name())?;

        let name = layer.name().to_string();
        self.entries.push(Entry {
            role: LayerRole::Overlay,
            visible,
            layer: ControlLayer::Data(Box::new(layer)),
        });
        info!(layer = %name, visible, "Registered overlay");

        Ok(if visible {
            vec![Transition::Show(name)]
        } else {
            Vec::new()
        })
    }

    /// Hides the active base and shows `name` as one batch.
    pub fn select_base(&mut self, name: &str) -> Result<Vec<Transition>, ControlError> {
        let index = self.index_of(name)?;
        if self.entries[index].role != LayerRole::Base {
            return Err(ControlError::NotABaseLayer(name.to_string()));
        }
        if self.entries[index].visible {
            return Ok(Vec::new());
        }

        let mut transitions = Vec::with_capacity(2);
        if let Some(active) = self.active_index() {
            self.entries[active].visible = false;
            transitions.push(Transition::Hide(self.entries[active].name().to_string()));
        }
        self.entries[index].visible = true;
        transitions.push(Transition::Show(name.to_string()));
        Ok(transitions)
    }

    pub fn toggle_overlay(&mut self, name: &str) -> Result<Vec<Transition>, ControlError> {
        let visible = self.is_visible(name)?;
        self.set_overlay_visible(name, !visible)
    }

    pub fn set_overlay_visible(
        &mut self,
        name: &str,
        visible: bool,
    ) -> Result<Vec<Transition>, ControlError> {
        let index = self.overlay_index(name)?;
        let entry = &mut self.entries[index];
        if entry.visible == visible {
            return Ok(Vec::new());
        }
        entry.visible = visible;
        Ok(vec![if visible {
            Transition::Show(name.to_string())
        } else {
            Transition::Hide(name.to_string())
        }])
    }

    pub fn is_visible(&self, name: &str) -> Result<bool, ControlError> {
        Ok(self.entries[self.index_of(name)?].visible)
    }

    pub fn role(&self, name: &str) -> Result<LayerRole, ControlError> {
        Ok(self.entries[self.index_of(name)?].role)
    }

    pub fn active_base(&self) -> Option<&TileLayer> {
        self.active_index()
            .and_then(|index| match &self.entries[index].layer {
                ControlLayer::Tiles(tiles) => Some(tiles),
                ControlLayer::Data(_) => None,
            })
    }

    pub fn visible_bases(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.role == LayerRole::Base && e.visible)
            .count()
    }

    pub fn bases(&self) -> impl Iterator<Item = &TileLayer> {
        self.entries.iter().filter_map(|e| match &e.layer {
            ControlLayer::Tiles(tiles) if e.role == LayerRole::Base => Some(tiles),
            _ => None,
        })
    }

    pub fn overlays(&self) -> impl Iterator<Item = &LayerDescriptor> {
        self.entries.iter().filter_map(|e| match &e.layer {
            ControlLayer::Data(layer) if e.role == LayerRole::Overlay => Some(layer.as_ref()),
            _ => None,
        })
    }

    pub fn overlay(&self, name: &str) -> Option<&LayerDescriptor> {
        self.overlays().find(|layer| layer.name() == name)
    }

    /// Label of the overlay's toggle: offers to show it when hidden and to hide it when shown.
    pub fn toggle_label(&self, name: &str) -> Result<String, ControlError> {
        let index = self.overlay_index(name)?;
        let prefix = if self.entries[index].visible {
            &self.labels.hide_prefix
        } else {
            &self.labels.show_prefix
        };
        Ok(format!("{} {}", prefix, name))
    }

    pub fn snapshot(&self) -> ControlSnapshot {
        let mut snapshot = ControlSnapshot {
            bases: Vec::new(),
            overlays: Vec::new(),
        };
        for entry in &self.entries {
            let name = entry.name().to_string();
            match (&entry.role, &entry.layer) {
                (LayerRole::Base, ControlLayer::Tiles(tiles)) => snapshot.bases.push(LayerStatus {
                    name,
                    role: LayerRole::Base,
                    visible: entry.visible,
                    label: None,
                    tiles: Some(tiles.clone()),
                    features: None,
                    cluster: None,
                }),
                (_, layer) => {
                    let label = self.toggle_label(&name).ok();
                    let (features, cluster) = match layer {
                        ControlLayer::Data(layer) => {
                            let cluster = match &layer.kind {
                                LayerKind::Markers(markers) => Some(markers.cluster.clone()),
                                LayerKind::Regions(_) => None,
                            };
                            (Some(layer.rendered_len()), cluster)
                        }
                        ControlLayer::Tiles(_) => (None, None),
                    };
                    snapshot.overlays.push(LayerStatus {
                        name,
                        role: entry.role,
                        visible: entry.visible,
                        label,
                        tiles: None,
                        features,
                        cluster,
                    })
                }
            }
        }
        snapshot
    }

    fn ensure_unique(&self, name: &str) -> Result<(), ControlError> {
        if self.entries.iter().any(|e| e.name() == name) {
            return Err(ControlError::DuplicateLayer(name.to_string()));
        }
        Ok(())
    }

    fn index_of(&self, name: &str) -> Result<usize, ControlError> {
        self.entries
            .iter()
            .position(|e| e.name() == name)
            .ok_or_else(|| ControlError::UnknownLayer(name.to_string()))
    }

    fn overlay_index(&self, name: &str) -> Result<usize, ControlError> {
        let index = self.index_of(name)?;
        if self.entries[index].role != LayerRole::Overlay {
            return Err(ControlError::NotAnOverlay(name.to_string()));
        }
        Ok(index)
    }

    fn active_index(&self) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.role == LayerRole::Base && e.visible)
    }
}

/// Pushes a batch of transitions to the widget.
pub fn apply(transitions: &[Transition], map: &mut dyn MapWidget) {
    for transition in transitions {
        match transition {
            Transition::Show(name) => map.add_layer(name),
            Transition::Hide(name) => map.remove_layer(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::parse_collection;
    use crate::data::tests::POINTS;
    use crate::encoding::ACCOMMODATION_CLASS;
    use crate::layers::{ClusterOptions, LayerBuilder, LayerShape, PopupTemplate};
    use crate::widget::HeadlessMap;
    use proptest::prelude::*;

    const BASES: [&str; 3] = ["OpenStreetMap", "Google Satélite", "Google Mapa"];

    fn tiles(name: &str) -> TileLayer {
        TileLayer {
            name: name.to_string(),
            url: format!("https://tiles.example/{}/{{z}}/{{x}}/{{y}}.png", name),
            attribution: String::new(),
            max_zoom: None,
        }
    }

    fn overlay(name: &str) -> LayerDescriptor {
        let template = PopupTemplate::accommodation();
        let builder = LayerBuilder {
            table: &ACCOMMODATION_CLASS,
            encoding_key: "clase",
            template: &template,
        };
        let collection = parse_collection(name, POINTS).unwrap();
        builder
            .build(collection, LayerShape::Points(ClusterOptions::default()))
            .layer
    }

    fn with_bases() -> (LayerControlState, HeadlessMap) {
        let mut control = LayerControlState::default();
        let mut map = HeadlessMap::new([-38.859, -68.097], 13);
        for name in BASES {
            let transitions = control.register_base(tiles(name), false).unwrap();
            apply(&transitions, &mut map);
        }
        (control, map)
    }

    #[test]
    fn first_base_is_visible_by_default() {
        let (control, map) = with_bases();
        assert_eq!(control.visible_bases(), 1);
        assert_eq!(control.active_base().unwrap().name, "OpenStreetMap");
        assert_eq!(map.layers(), ["OpenStreetMap"]);
    }

    #[test]
    fn registering_a_visible_base_replaces_the_active_one() {
        let (mut control, mut map) = with_bases();
        let transitions = control.register_base(tiles("Mapbox"), true).unwrap();
        assert_eq!(
            transitions,
            vec![
                Transition::Hide("OpenStreetMap".into()),
                Transition::Show("Mapbox".into())
            ]
        );
        apply(&transitions, &mut map);
        assert_eq!(control.visible_bases(), 1);
        assert_eq!(map.layers(), ["Mapbox"]);
    }

    #[test]
    fn select_base_swaps_atomically() {
        let (mut control, mut map) = with_bases();
        let transitions = control.select_base("Google Mapa").unwrap();
        assert_eq!(
            transitions,
            vec![
                Transition::Hide("OpenStreetMap".into()),
                Transition::Show("Google Mapa".into())
            ]
        );
        apply(&transitions, &mut map);
        assert_eq!(map.layers(), ["Google Mapa"]);

        assert!(control.select_base("Google Mapa").unwrap().is_empty());
    }

    #[test]
    fn overlay_visibility_is_independent_of_the_base() {
        let (mut control, mut map) = with_bases();
        apply(&control.register_overlay(overlay("Alojamientos"), true).unwrap(), &mut map);
        apply(&control.register_overlay(overlay("Municipios"), false).unwrap(), &mut map);

        assert_eq!(map.layers(), ["OpenStreetMap", "Alojamientos"]);
        assert!(!control.is_visible("Municipios").unwrap());

        apply(&control.select_base("Google Satélite").unwrap(), &mut map);
        assert!(control.is_visible("Alojamientos").unwrap());
        assert!(!map.has_layer("Municipios"));

        apply(&control.toggle_overlay("Municipios").unwrap(), &mut map);
        assert!(map.has_layer("Municipios"));
        assert_eq!(control.visible_bases(), 1);
    }

    #[test]
    fn toggle_label_follows_visibility() {
        let mut control = LayerControlState::default();
        control.register_overlay(overlay("Municipios"), false).unwrap();
        assert_eq!(control.toggle_label("Municipios").unwrap(), "Mostrar Municipios");

        control.toggle_overlay("Municipios").unwrap();
        assert_eq!(control.toggle_label("Municipios").unwrap(), "Ocultar Municipios");

        control.toggle_overlay("Municipios").unwrap();
        assert_eq!(control.toggle_label("Municipios").unwrap(), "Mostrar Municipios");
    }

    #[test]
    fn invalid_actions_are_rejected() {
        let (mut control, _) = with_bases();
        control.register_overlay(overlay("Alojamientos"), true).unwrap();

        assert_eq!(
            control.register_base(tiles("OpenStreetMap"), false),
            Err(ControlError::DuplicateLayer("OpenStreetMap".into()))
        );
        assert_eq!(
            control.register_overlay(overlay("Alojamientos"), true).unwrap_err(),
            ControlError::DuplicateLayer("Alojamientos".into())
        );
        assert_eq!(
            control.select_base("Alojamientos"),
            Err(ControlError::NotABaseLayer("Alojamientos".into()))
        );
        assert_eq!(
            control.toggle_overlay("OpenStreetMap"),
            Err(ControlError::NotAnOverlay("OpenStreetMap".into()))
        );
        assert_eq!(
            control.toggle_overlay("Rutas"),
            Err(ControlError::UnknownLayer("Rutas".into()))
        );
        assert_eq!(control.visible_bases(), 1);
    }

    #[test]
    fn snapshot_lists_roles_and_labels() {
        let (mut control, _) = with_bases();
        control.register_overlay(overlay("Municipios"), false).unwrap();

        let snapshot = control.snapshot();
        assert_eq!(snapshot.bases.len(), 3);
        assert!(snapshot.bases[0].visible);
        assert!(snapshot.bases[1..].iter().all(|b| !b.visible));
        assert_eq!(snapshot.overlays[0].label.as_deref(), Some("Mostrar Municipios"));
        assert_eq!(snapshot.overlays[0].features, Some(2));
    }

    proptest! {
        #[test]
        fn exactly_one_base_visible_after_any_switches(
            picks in proptest::collection::vec(0usize..BASES.len(), 0..40)
        ) {
            let (mut control, mut map) = with_bases();
            for pick in picks {
                let transitions = control.select_base(BASES[pick]).unwrap();
                apply(&transitions, &mut map);

                prop_assert_eq!(control.visible_bases(), 1);
                prop_assert_eq!(control.active_base().unwrap().name.as_str(), BASES[pick]);
                let on_map = BASES.iter().filter(|b| map.has_layer(b)).count();
                prop_assert_eq!(on_map, 1);
            }
        }

        #[test]
        fn double_toggle_restores_visibility_and_label(initially_visible in any::<bool>()) {
            let mut control = LayerControlState::default();
            let mut map = HeadlessMap::new([0.0, 0.0], 3);
            apply(&control.register_overlay(overlay("Regiones"), initially_visible).unwrap(), &mut map);
            let label = control.toggle_label("Regiones").unwrap();

            apply(&control.toggle_overlay("Regiones").unwrap(), &mut map);
            prop_assert_eq!(control.is_visible("Regiones").unwrap(), !initially_visible);
            apply(&control.toggle_overlay("Regiones").unwrap(), &mut map);

            prop_assert_eq!(control.is_visible("Regiones").unwrap(), initially_visible);
            prop_assert_eq!(control.toggle_label("Regiones").unwrap(), label);
            prop_assert_eq!(map.has_layer("Regiones"), initially_visible);
        }
    }
}
