use crate::data::LoadError;
use serde_json::{Map, Value};

/// Attribute record of a feature. Keys are never assumed to be present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties(Map<String, Value>);

impl Properties {
    pub fn new(values: Map<String, Value>) -> Self {
        Self(values)
    }

    /// Exact string value for category lookups. Non-string values don't count.
    pub fn category(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Display text for templates. Missing keys, `null` and blank strings are all `None`.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::Null => None,
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Properties {
    fn from(values: Map<String, Value>) -> Self {
        Self(values)
    }
}

#[derive(Debug, Clone)]
pub struct Feature {
    // None when the source feature had no usable geometry
    pub geometry: Option<geojson::Geometry>,
    pub properties: Properties,
    /// Why the source feature could not be parsed, if it couldn't.
    pub invalid: Option<String>,
}

impl From<geojson::Feature> for Feature {
    fn from(feature: geojson::Feature) -> Self {
        Self {
            geometry: feature.geometry,
            properties: feature.properties.map(Properties::from).unwrap_or_default(),
            invalid: None,
        }
    }
}

/// Features from one named source. Never empty.
#[derive(Debug, Clone)]
pub struct FeatureCollection {
    name: String,
    features: Vec<Feature>,
}

impl FeatureCollection {
    /// Returns `None` for an empty feature list, which is a load failure rather than an empty layer.
    pub fn new(name: impl Into<String>, features: Vec<Feature>) -> Option<Self> {
        if features.is_empty() {
            return None;
        }
        Some(Self {
            name: name.into(),
            features,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }
}

/// Terminal outcome of loading one source.
#[derive(Debug)]
pub enum LoadResult {
    Loaded(FeatureCollection),
    Failed { source: String, error: LoadError },
}

impl LoadResult {
    pub fn source(&self) -> &str {
        match self {
            LoadResult::Loaded(collection) => collection.name(),
            LoadResult::Failed { source, .. } => source,
        }
    }
}
