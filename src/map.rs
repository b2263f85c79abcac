//! Assembles the layered map document from loaded food and station entries.
//!
//! Nothing here touches the filesystem; [`crate::render`] turns the finished
//! [`MapDocument`] into HTML.

use crate::config::AppConfig;
use crate::price::PriceScale;
use crate::types::{FoodEntry, StationEntry};
use geo::{Centroid, MultiPoint, Point};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct PinMarker {
    pub location: Point<f64>,
    pub tooltip: String,
    pub popup_html: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BubbleMarker {
    pub location: Point<f64>,
    pub radius: f64,
    pub tooltip: String,
    pub popup_html: String,
    pub color: String,
    pub fill_color: String,
    pub fill_opacity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StationMarker {
    pub location: Point<f64>,
    pub tooltip: String,
    pub popup: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryLayer {
    pub name: String,
    pub markers: Vec<PinMarker>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BubbleLayer {
    pub name: String,
    pub bubbles: Vec<BubbleMarker>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IconSpec {
    pub path: PathBuf,
    pub size: [u32; 2],
}

/// Station markers, drawn inside a marker cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct StationLayer {
    pub name: String,
    pub icon: IconSpec,
    pub markers: Vec<StationMarker>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapDocument {
    pub center: Point<f64>,
    pub zoom: u8,
    pub tiles: String,
    pub attribution: String,
    pub category_layers: Vec<CategoryLayer>,
    pub bubble_layer: BubbleLayer,
    pub station_layer: StationLayer,
    pub layer_control_collapsed: bool,
}

impl MapDocument {
    /// Names in layer-control order: categories, bubbles, stations.
    pub fn overlay_names(&self) -> Vec<&str> {
        self.category_layers.iter()
            .map(|l| l.name.as_str())
            .chain([self.bubble_layer.name.as_str(), self.station_layer.name.as_str()])
            .collect()
    }

    pub fn marker_count(&self) -> usize {
        self.category_layers.iter().map(|l| l.markers.len()).sum::<usize>()
            + self.bubble_layer.bubbles.len()
            + self.station_layer.markers.len()
    }
}

/// Key for entries whose category is missing or unknown.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LayerKey {
    Category(String),
    Fallback,
}

pub struct MapBuilder<'a> {
    config: &'a AppConfig,
    center: Point<f64>,
    colors: HashMap<String, String>,
    scale: PriceScale,
    layers: Vec<CategoryLayer>,
    layer_index: HashMap<LayerKey, usize>,
    bubble_layer: BubbleLayer,
    station_layer: StationLayer,
}

impl<'a> MapBuilder<'a> {
    /// Sets the view centre and creates one layer per distinct category.
    pub fn new(config: &'a AppConfig, foods: &[FoodEntry]) -> Self {
        let center = mean_center(foods).unwrap_or_else(|| {
            let [lat, lon] = config.map.fallback_center;
            warn!(lat, lon, "Food dataset is empty, using fallback map centre");
            Point::new(lon, lat)
        });

        let labels = &config.labels;
        let mut layers = Vec::new();
        let mut layer_index = HashMap::new();

        layer_index.insert(LayerKey::Fallback, layers.len());
        layers.push(CategoryLayer {
            name: format!("{}{}", labels.category_layer_prefix, labels.fallback_category),
            markers: Vec::new(),
        });

        for category in foods.iter().filter_map(|f| f.category.as_ref()) {
            let key = layer_key(Some(category.as_str()), &labels.fallback_category);
            if !layer_index.contains_key(&key) {
                layer_index.insert(key, layers.len());
                layers.push(CategoryLayer {
                    name: format!("{}{}", labels.category_layer_prefix, category),
                    markers: Vec::new(),
                });
            }
        }

        debug!(categories = layers.len() - 1, "Created category layers");

        Self {
            config,
            center,
            colors: config.style.color_table(),
            scale: PriceScale::from_config(&config.price),
            layers,
            layer_index,
            bubble_layer: BubbleLayer {
                name: labels.bubble_layer.clone(),
                bubbles: Vec::new(),
            },
            station_layer: StationLayer {
                name: labels.station_layer.clone(),
                icon: IconSpec {
                    path: config.input.station_icon.clone(),
                    size: config.style.station_icon_size,
                },
                markers: Vec::new(),
            },
        }
    }

    /// One pin in the entry's category layer plus one bubble, per entry.
    pub fn add_foods(&mut self, foods: &[FoodEntry]) {
        for food in foods {
            let idx = self.layer_for(food.category.as_deref());
            let color = food.category.as_ref()
                .and_then(|c| self.colors.get(c))
                .unwrap_or(&self.config.style.default_color)
                .clone();
            let popup_html = detail_panel(food, &self.config.labels);

            self.layers[idx].markers.push(PinMarker {
                location: food.location,
                tooltip: food.name.clone(),
                popup_html: popup_html.clone(),
                color,
            });

            let style = &self.config.style;
            self.bubble_layer.bubbles.push(BubbleMarker {
                location: food.location,
                radius: self.scale.radius(&food.price),
                tooltip: food.name.clone(),
                popup_html,
                color: style.bubble_color.clone(),
                fill_color: style.bubble_color.clone(),
                fill_opacity: style.bubble_fill_opacity,
            });
        }
    }

    pub fn add_stations(&mut self, stations: &[StationEntry]) {
        let labels = &self.config.labels;
        for station in stations {
            self.station_layer.markers.push(StationMarker {
                location: station.location,
                tooltip: format!("{}{}", labels.station_tooltip_prefix, station.station),
                popup: format!("{}{}", labels.station_popup_prefix, station.station),
            });
        }
    }

    pub fn finish(self) -> MapDocument {
        // The fallback layer is only shown when something landed in it.
        let fallback = self.layer_index.get(&LayerKey::Fallback).copied();
        let category_layers: Vec<CategoryLayer> = self.layers.into_iter()
            .enumerate()
            .filter(|(i, layer)| Some(*i) != fallback || !layer.markers.is_empty())
            .map(|(_, layer)| layer)
            .collect();

        info!(
            category_layers = category_layers.len(),
            bubbles = self.bubble_layer.bubbles.len(),
            stations = self.station_layer.markers.len(),
            "Assembled map"
        );

        MapDocument {
            center: self.center,
            zoom: self.config.map.zoom_start,
            tiles: self.config.map.tiles.clone(),
            attribution: self.config.map.attribution.clone(),
            category_layers,
            bubble_layer: self.bubble_layer,
            station_layer: self.station_layer,
            layer_control_collapsed: self.config.map.layer_control_collapsed,
        }
    }

    fn layer_for(&self, category: Option<&str>) -> usize {
        let key = layer_key(category, &self.config.labels.fallback_category);
        self.layer_index.get(&key)
            .or_else(|| self.layer_index.get(&LayerKey::Fallback))
            .copied()
            .unwrap_or(0)
    }
}

/// A category spelled like the fallback shares the fallback layer.
fn layer_key(category: Option<&str>, fallback: &str) -> LayerKey {
    match category {
        Some(c) if c != fallback => LayerKey::Category(c.to_string()),
        _ => LayerKey::Fallback,
    }
}

/// Arithmetic mean of every latitude and every longitude.
pub fn mean_center(foods: &[FoodEntry]) -> Option<Point<f64>> {
    let points: MultiPoint<f64> = foods.iter().map(|f| f.location).collect();
    points.centroid()
}

pub fn detail_panel(food: &FoodEntry, labels: &crate::config::LabelConfig) -> String {
    format!(
        r#"<div style="width:250px; font-size:14px;">
    <b style="font-size:16px;">{name}</b><br>
    <b>{category_label}</b>{category}<br>
    <b>{price_label}</b>{price}<br>
    <b>{intro_label}</b>{intro}
</div>"#,
        name = escape_html(&food.name),
        category_label = labels.category_field,
        category = escape_html(food.category.as_deref().unwrap_or("")),
        price_label = labels.price_field,
        price = escape_html(&food.price.display()),
        intro_label = labels.intro_field,
        intro = escape_html(food.intro.as_deref().unwrap_or("")),
    )
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
