//! Food map
//!
//! Reads a restaurant listing and a bike-share station listing from CSV and
//! renders them as toggleable Leaflet layers in a single HTML page:
//! - one pin layer per food category, tinted from a configurable colour table
//! - one bubble layer sized by a price-range heuristic
//! - one clustered station layer with a custom icon

pub mod types;
pub mod config;
pub mod data;
pub mod price;
pub mod map;
pub mod render;
pub mod output;
pub mod server;

pub use config::AppConfig;
pub use price::price_to_radius;
