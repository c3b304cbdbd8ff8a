use crate::encoding::{ColorEncodingTable, Style};
use crate::render;
use crate::types::{Feature, FeatureCollection, Properties};
use crate::viewport::Bounds;
use geo::{BoundingRect, MultiPolygon, Point};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{info, warn};

/// Why a single feature could not be turned into a map primitive.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureBuildError {
    #[error("feature has no geometry")]
    MissingGeometry,
    #[error("geometry could not be converted: {0}")]
    Conversion(String),
    #[error("expected {expected} geometry, found {found}")]
    UnexpectedGeometry {
        expected: &'static str,
        found: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TemplateField {
    pub label: String,
    pub key: String,
    pub placeholder: String,
}

impl TemplateField {
    pub fn new(label: &str, key: &str, placeholder: &str) -> Self {
        Self {
            label: label.to_string(),
            key: key.to_string(),
            placeholder: placeholder.to_string(),
        }
    }
}

/// Popup/tooltip body built from feature properties.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PopupTemplate {
    fields: Vec<TemplateField>,
}

impl PopupTemplate {
    pub fn new(fields: Vec<TemplateField>) -> Self {
        Self { fields }
    }

    pub fn accommodation() -> Self {
        Self::new(vec![
            TemplateField::new("Nombre", "nombre", "Sin nombre"),
            TemplateField::new("Dirección", "direccion", "Sin dirección"),
            TemplateField::new("Clase", "clase", "Sin clase"),
            TemplateField::new("Categoría", "categoria", "Sin categoría"),
        ])
    }

    pub fn named() -> Self {
        Self::new(vec![TemplateField::new("Nombre", "nombre", "Sin nombre")])
    }

    /// Every field is always rendered; missing values get the field's placeholder.
    pub fn render(&self, properties: &Properties) -> String {
        self.fields
            .iter()
            .map(|field| {
                let value = properties
                    .text(&field.key)
                    .unwrap_or_else(|| field.placeholder.clone());
                format!("<b>{}:</b> {}", escape_html(&field.label), escape_html(&value))
            })
            .collect::<Vec<_>>()
            .join("<br>")
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Parameters handed to the widget's marker cluster group.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClusterOptions {
    pub spiderfy_distance_multiplier: f64,
    pub show_coverage_on_hover: bool,
    pub zoom_to_bounds_on_click: bool,
}

impl ClusterOptions {
    fn to_json(&self) -> Value {
        json!({
            "spiderfyDistanceMultiplier": self.spiderfy_distance_multiplier,
            "showCoverageOnHover": self.show_coverage_on_hover,
            "zoomToBoundsOnClick": self.zoom_to_bounds_on_click,
        })
    }
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            spiderfy_distance_multiplier: 1.2,
            show_coverage_on_hover: false,
            zoom_to_bounds_on_click: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RegionStyle {
    pub weight: f64,
    pub stroke_color: String,
    pub fill_opacity: f64,
}

impl Default for RegionStyle {
    fn default() -> Self {
        Self {
            weight: 2.0,
            stroke_color: "white".to_string(),
            fill_opacity: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Marker {
    pub position: Point<f64>,
    pub style: Style,
    pub icon_url: String,
    pub popup: String,
}

#[derive(Debug, Clone)]
pub struct Region {
    pub geometry: MultiPolygon<f64>,
    pub style: Style,
    pub tooltip: String,
}

#[derive(Debug, Clone)]
pub struct MarkerLayer {
    pub markers: Vec<Marker>,
    pub cluster: ClusterOptions,
}

#[derive(Debug, Clone)]
pub struct RegionLayer {
    pub regions: Vec<Region>,
    pub style: RegionStyle,
}

#[derive(Debug, Clone)]
pub enum LayerKind {
    Markers(MarkerLayer),
    Regions(RegionLayer),
}

/// A named renderable unit built from one source.
#[derive(Debug, Clone)]
pub struct LayerDescriptor {
    pub name: String,
    pub kind: LayerKind,
    pub collection: FeatureCollection,
}

impl LayerDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rendered_len(&self) -> usize {
        match &self.kind {
            LayerKind::Markers(layer) => layer.markers.len(),
            LayerKind::Regions(layer) => layer.regions.len(),
        }
    }

    /// Bounding box of the rendered primitives.
    pub fn bounds(&self) -> Option<Bounds> {
        match &self.kind {
            LayerKind::Markers(layer) => layer
                .markers
                .iter()
                .map(|m| Bounds::from_rect(m.position.bounding_rect()))
                .reduce(Bounds::union),
            LayerKind::Regions(layer) => layer
                .regions
                .iter()
                .filter_map(|r| r.geometry.bounding_rect())
                .map(Bounds::from_rect)
                .reduce(Bounds::union),
        }
    }

    /// Rendered features as GeoJSON, with style and popup/tooltip markup as
    /// properties. Marker layers also carry their cluster options as a
    /// top-level `cluster` member.
    pub fn to_geojson(&self) -> geojson::FeatureCollection {
        let foreign_members = match &self.kind {
            LayerKind::Markers(layer) => {
                let mut members = Map::new();
                members.insert("cluster".to_string(), layer.cluster.to_json());
                Some(members)
            }
            LayerKind::Regions(_) => None,
        };

        let features = match &self.kind {
            LayerKind::Markers(layer) => layer
                .markers
                .iter()
                .map(|marker| {
                    let properties = json!({
                        "color": marker.style.color,
                        "icon": marker.icon_url,
                        "iconSize": render::ICON_SIZE,
                        "iconAnchor": render::ICON_ANCHOR,
                        "popupAnchor": render::POPUP_ANCHOR,
                        "popup": marker.popup,
                    });
                    geojson_feature(geojson::Value::from(&marker.position), properties)
                })
                .collect(),
            LayerKind::Regions(layer) => layer
                .regions
                .iter()
                .map(|region| {
                    let properties = json!({
                        "fillColor": region.style.color,
                        "color": layer.style.stroke_color,
                        "weight": layer.style.weight,
                        "fillOpacity": layer.style.fill_opacity,
                        "tooltip": region.tooltip,
                    });
                    geojson_feature(geojson::Value::from(&region.geometry), properties)
                })
                .collect(),
        };

        geojson::FeatureCollection {
            bbox: None,
            features,
            foreign_members,
        }
    }
}

fn geojson_feature(value: geojson::Value, properties: Value) -> geojson::Feature {
    let properties: Option<Map<String, Value>> = match properties {
        Value::Object(map) => Some(map),
        _ => None,
    };
    geojson::Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(value)),
        id: None,
        properties,
        foreign_members: None,
    }
}

/// What to build from a collection.
#[derive(Debug, Clone)]
pub enum LayerShape {
    Points(ClusterOptions),
    Regions(RegionStyle),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedFeature {
    pub index: usize,
    pub error: FeatureBuildError,
}

#[derive(Debug)]
pub struct BuildOutcome {
    pub layer: LayerDescriptor,
    pub skipped: Vec<SkippedFeature>,
}

pub struct LayerBuilder<'a> {
    pub table: &'a ColorEncodingTable,
    pub encoding_key: &'a str,
    pub template: &'a PopupTemplate,
}

impl LayerBuilder<'_> {
    /// Builds a layer from every feature that converts. Never fails as a whole;
    /// bad features are logged and reported in `skipped`.
    pub fn build(&self, collection: FeatureCollection, shape: LayerShape) -> BuildOutcome {
        let name = collection.name().to_string();
        let mut skipped = Vec::new();

        let kind = match shape {
            LayerShape::Points(cluster) => {
                let mut markers = Vec::with_capacity(collection.len());
                for (index, feature) in collection.features().iter().enumerate() {
                    match self.marker(feature) {
                        Ok(marker) => markers.push(marker),
                        Err(e) => skipped.push(SkippedFeature { index, error: e }),
                    }
                }
                LayerKind::Markers(MarkerLayer { markers, cluster })
            }
            LayerShape::Regions(style) => {
                let mut regions = Vec::with_capacity(collection.len());
                for (index, feature) in collection.features().iter().enumerate() {
                    match self.region(feature) {
                        Ok(region) => regions.push(region),
                        Err(e) => skipped.push(SkippedFeature { index, error: e }),
                    }
                }
                LayerKind::Regions(RegionLayer { regions, style })
            }
        };

        for skip in &skipped {
            warn!(layer = %name, index = skip.index, reason = %skip.error, "Skipping feature");
        }

        let layer = LayerDescriptor {
            name,
            kind,
            collection,
        };
        info!(
            layer = %layer.name,
            rendered = layer.rendered_len(),
            skipped = skipped.len(),
            "Built layer"
        );

        BuildOutcome { layer, skipped }
    }

    fn style(&self, feature: &Feature) -> Style {
        self.table
            .resolve(feature.properties.category(self.encoding_key))
    }

    fn marker(&self, feature: &Feature) -> Result<Marker, FeatureBuildError> {
        let position = match to_geo(feature)? {
            geo::Geometry::Point(point) => point,
            other => {
                return Err(FeatureBuildError::UnexpectedGeometry {
                    expected: "Point",
                    found: geometry_name(&other),
                })
            }
        };
        let style = self.style(feature);
        Ok(Marker {
            position,
            style,
            icon_url: render::icon_url(style.color),
            popup: self.template.render(&feature.properties),
        })
    }

    fn region(&self, feature: &Feature) -> Result<Region, FeatureBuildError> {
        let geometry = match to_geo(feature)? {
            geo::Geometry::Polygon(polygon) => MultiPolygon::new(vec![polygon]),
            geo::Geometry::MultiPolygon(multi) => multi,
            other => {
                return Err(FeatureBuildError::UnexpectedGeometry {
                    expected: "Polygon",
                    found: geometry_name(&other),
                })
            }
        };
        Ok(Region {
            geometry,
            style: self.style(feature),
            tooltip: self.template.render(&feature.properties),
        })
    }
}

pub(crate) fn to_geo(feature: &Feature) -> Result<geo::Geometry<f64>, FeatureBuildError> {
    let geometry = match (&feature.geometry, &feature.invalid) {
        (Some(geometry), _) => geometry,
        (None, Some(reason)) => return Err(FeatureBuildError::Conversion(reason.clone())),
        (None, None) => return Err(FeatureBuildError::MissingGeometry),
    };
    geometry
        .value
        .clone()
        .try_into()
        .map_err(|e: geojson::Error| FeatureBuildError::Conversion(e.to_string()))
}

fn geometry_name(geometry: &geo::Geometry<f64>) -> &'static str {
    match geometry {
        geo::Geometry::Point(_) => "Point",
        geo::Geometry::Line(_) => "Line",
        geo::Geometry::LineString(_) => "LineString",
        geo::Geometry::Polygon(_) => "Polygon",
        geo::Geometry::MultiPoint(_) => "MultiPoint",
        geo::Geometry::MultiLineString(_) => "MultiLineString",
        geo::Geometry::MultiPolygon(_) => "MultiPolygon",
        geo::Geometry::GeometryCollection(_) => "GeometryCollection",
        geo::Geometry::Rect(_) => "Rect",
        geo::Geometry::Triangle(_) => "Triangle",
    }
}
