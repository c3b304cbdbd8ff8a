//! Composes GeoJSON sources into styled, toggleable map layers.

pub mod composer;
pub mod config;
pub mod control;
pub mod data;
pub mod encoding;
pub mod layers;
pub mod render;
pub mod server;
pub mod types;
pub mod viewport;
pub mod widget;

pub use composer::{Composition, MapComposer};
pub use config::AppConfig;
