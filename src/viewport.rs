use crate::layers::to_geo;
use crate::types::FeatureCollection;
use crate::widget::MapWidget;
use geo::{BoundingRect, Rect};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Lat/lon bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    /// `rect` is in GeoJSON order: x = longitude, y = latitude.
    pub fn from_rect(rect: Rect<f64>) -> Self {
        Self {
            south: rect.min().y,
            west: rect.min().x,
            north: rect.max().y,
            east: rect.max().x,
        }
    }

    pub fn union(self, other: Bounds) -> Bounds {
        Bounds {
            south: self.south.min(other.south),
            west: self.west.min(other.west),
            north: self.north.max(other.north),
            east: self.east.max(other.east),
        }
    }

    /// `[lat, lon]`
    pub fn center(&self) -> [f64; 2] {
        [
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        ]
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.south..=self.north).contains(&lat) && (self.west..=self.east).contains(&lon)
    }

    /// Covers every feature whose geometry converts. `None` if none do.
    pub fn of_collection(collection: &FeatureCollection) -> Option<Bounds> {
        collection
            .features()
            .iter()
            .filter_map(|feature| to_geo(feature).ok())
            .filter_map(|geometry| geometry.bounding_rect())
            .map(Bounds::from_rect)
            .reduce(Bounds::union)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FitPolicy {
    /// Every call frames the union of the collections passed in.
    #[default]
    Latest,
    /// Only the first call that yields bounds frames the map.
    First,
}

pub struct ViewportFitCoordinator {
    policy: FitPolicy,
    framed: Option<Bounds>,
}

impl ViewportFitCoordinator {
    pub fn new(policy: FitPolicy) -> Self {
        Self {
            policy,
            framed: None,
        }
    }

    /// Frames the given collections according to the policy and returns the
    /// bounds that were requested, if any.
    pub fn fit(
        &mut self,
        collections: &[&FeatureCollection],
        map: &mut dyn MapWidget,
    ) -> Option<Bounds> {
        if self.policy == FitPolicy::First && self.framed.is_some() {
            debug!("Viewport already framed, ignoring fit");
            return None;
        }

        let bounds = collections
            .iter()
            .filter_map(|collection| Bounds::of_collection(collection))
            .reduce(Bounds::union)?;

        debug!(?bounds, collections = collections.len(), "Fitting viewport");
        map.fit_bounds(bounds);
        self.framed = Some(bounds);
        Some(bounds)
    }

    pub fn framed(&self) -> Option<Bounds> {
        self.framed
    }
}
