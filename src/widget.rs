use crate::viewport::Bounds;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Public contract of the map widget. The composer never reaches past it.
pub trait MapWidget {
    fn add_layer(&mut self, name: &str);
    fn remove_layer(&mut self, name: &str);
    fn fit_bounds(&mut self, bounds: Bounds);
}

/// Opaque tile source used as a base layer.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TileLayer {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub attribution: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_zoom: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapView {
    /// `[lat, lon]`
    pub center: [f64; 2],
    pub zoom: u8,
    pub bounds: Option<Bounds>,
}

/// Widget state without a renderer: the layers currently on the map and the
/// last requested view.
#[derive(Debug, Clone)]
pub struct HeadlessMap {
    layers: Vec<String>,
    view: MapView,
    fit_requests: usize,
}

impl HeadlessMap {
    pub fn new(center: [f64; 2], zoom: u8) -> Self {
        Self {
            layers: Vec::new(),
            view: MapView {
                center,
                zoom,
                bounds: None,
            },
            fit_requests: 0,
        }
    }

    pub fn layers(&self) -> &[String] {
        &self.layers
    }

    pub fn has_layer(&self, name: &str) -> bool {
        self.layers.iter().any(|l| l == name)
    }

    pub fn view(&self) -> &MapView {
        &self.view
    }

    pub fn fit_requests(&self) -> usize {
        self.fit_requests
    }
}

impl MapWidget for HeadlessMap {
    fn add_layer(&mut self, name: &str) {
        if !self.has_layer(name) {
            debug!(layer = name, "Adding layer to map");
            self.layers.push(name.to_string());
        }
    }

    fn remove_layer(&mut self, name: &str) {
        debug!(layer = name, "Removing layer from map");
        self.layers.retain(|l| l != name);
    }

    fn fit_bounds(&mut self, bounds: Bounds) {
        self.view.center = bounds.center();
        self.view.bounds = Some(bounds);
        self.fit_requests += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_idempotent_and_remove_tolerates_absent_layers() {
        let mut map = HeadlessMap::new([-38.859, -68.097], 13);
        map.add_layer("OpenStreetMap");
        map.add_layer("Alojamientos");
        map.add_layer("OpenStreetMap");
        assert_eq!(map.layers(), ["OpenStreetMap", "Alojamientos"]);

        map.remove_layer("Municipios");
        map.remove_layer("OpenStreetMap");
        assert_eq!(map.layers(), ["Alojamientos"]);
    }

    #[test]
    fn fit_recenters_on_bounds() {
        let mut map = HeadlessMap::new([0.0, 0.0], 5);
        map.fit_bounds(Bounds {
            south: -40.0,
            west: -72.0,
            north: -36.0,
            east: -68.0,
        });
        assert_eq!(map.view().center, [-38.0, -70.0]);
        assert_eq!(map.fit_requests(), 1);
    }
}
