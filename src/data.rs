use crate::types::{Feature, FeatureCollection, LoadResult, Properties};
use futures::future::BoxFuture;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

/// Source-level load failures. Each one is terminal for its source.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    #[error("transport returned status {status}")]
    Transport { status: u16 },
    #[error("could not read {location}: {message}")]
    Unreachable { location: String, message: String },
    #[error("invalid GeoJSON payload: {0}")]
    Format(String),
    #[error("the dataset contains no features")]
    Empty,
}

/// Fetches the raw payload for a source location.
pub trait Transport: Send + Sync {
    fn fetch<'a>(&'a self, location: &'a str) -> BoxFuture<'a, Result<String, LoadError>>;
}

/// Reads sources from disk, relative to a base directory.
pub struct FileTransport {
    base_dir: PathBuf,
}

impl FileTransport {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

impl Transport for FileTransport {
    fn fetch<'a>(&'a self, location: &'a str) -> BoxFuture<'a, Result<String, LoadError>> {
        Box::pin(async move {
            let path = self.base_dir.join(location);
            tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| LoadError::Unreachable {
                    location: path.display().to_string(),
                    message: e.to_string(),
                })
        })
    }
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    fn fetch<'a>(&'a self, location: &'a str) -> BoxFuture<'a, Result<String, LoadError>> {
        Box::pin(async move {
            let unreachable = |e: reqwest::Error| LoadError::Unreachable {
                location: location.to_string(),
                message: e.to_string(),
            };

            let response = self.client.get(location).send().await.map_err(unreachable)?;
            let status = response.status();
            if !status.is_success() {
                return Err(LoadError::Transport {
                    status: status.as_u16(),
                });
            }
            response.text().await.map_err(unreachable)
        })
    }
}

/// Sends `http://` and `https://` locations over the network and everything else to disk.
pub struct SourceTransport {
    files: FileTransport,
    http: HttpTransport,
}

impl SourceTransport {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            files: FileTransport::new(base_dir),
            http: HttpTransport::new(),
        }
    }
}

impl Transport for SourceTransport {
    fn fetch<'a>(&'a self, location: &'a str) -> BoxFuture<'a, Result<String, LoadError>> {
        if location.starts_with("http://") || location.starts_with("https://") {
            self.http.fetch(location)
        } else {
            self.files.fetch(location)
        }
    }
}

pub struct FeatureSetLoader {
    transport: Arc<dyn Transport>,
}

impl FeatureSetLoader {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Loads one named source. Failures are logged and returned as data, never as `Err`.
    pub async fn load(&self, name: &str, location: &str) -> LoadResult {
        let result = match self.transport.fetch(location).await {
            Ok(payload) => parse_collection(name, &payload),
            Err(e) => Err(e),
        };

        match result {
            Ok(collection) => {
                info!(source = name, features = collection.len(), "Loaded source");
                LoadResult::Loaded(collection)
            }
            Err(e) => {
                error!(source = name, reason = %e, "Failed to load source");
                LoadResult::Failed {
                    source: name.to_string(),
                    error: e,
                }
            }
        }
    }
}

/// Validates a GeoJSON FeatureCollection document.
///
/// Each feature is parsed on its own: one that isn't valid GeoJSON is kept
/// without geometry so the layer builder can skip it, instead of failing the
/// whole source.
pub fn parse_collection(name: &str, payload: &str) -> Result<FeatureCollection, LoadError> {
    let document: Value =
        serde_json::from_str(payload).map_err(|e| LoadError::Format(e.to_string()))?;

    let mut object = match document {
        Value::Object(object) => object,
        _ => return Err(LoadError::Format("document is not a JSON object".into())),
    };

    match object.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => {}
        Some(other) => {
            return Err(LoadError::Format(format!(
                "expected a FeatureCollection, found {}",
                other
            )))
        }
        None => return Err(LoadError::Format("missing \"type\" member".into())),
    }

    let items = match object.remove("features") {
        Some(Value::Array(items)) => items,
        _ => return Err(LoadError::Format("missing \"features\" array".into())),
    };

    let features = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| parse_feature(name, index, item))
        .collect();

    FeatureCollection::new(name, features).ok_or(LoadError::Empty)
}

fn parse_feature(source: &str, index: usize, item: Value) -> Feature {
    let properties = item
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    match geojson::Feature::from_json_value(item) {
        Ok(feature) => Feature::from(feature),
        Err(e) => {
            debug!(source, index, reason = %e, "Feature is not valid GeoJSON");
            Feature {
                geometry: None,
                properties: Properties::new(properties),
                invalid: Some(e.to_string()),
            }
        }
    }
}
