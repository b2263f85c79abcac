use std::collections::HashMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::fs;
use anyhow::{Context, Result};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub input: InputConfig,
    pub output: OutputConfig,
    pub map: MapConfig,
    pub price: PriceConfig,
    pub style: StyleConfig,
    pub labels: LabelConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct InputConfig {
    pub foods: PathBuf,
    pub stations: PathBuf,
    pub station_icon: PathBuf,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            foods: PathBuf::from("foods.csv"),
            stations: PathBuf::from("Youbike2.0.csv"),
            station_icon: PathBuf::from("youbike_icon.png"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub html: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { html: PathBuf::from("food_map.html") }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MapConfig {
    pub zoom_start: u8,
    /// [lat, lon] used when the food dataset has no rows to average.
    pub fallback_center: [f64; 2],
    pub tiles: String,
    pub attribution: String,
    pub layer_control_collapsed: bool,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            zoom_start: 15,
            fallback_center: [25.0330, 121.5654],
            tiles: "https://tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            attribution: "&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors".to_string(),
            layer_control_collapsed: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PriceConfig {
    /// Characters treated as range delimiters in free-form price text.
    pub separators: Vec<char>,
    pub default_average: f64,
    pub divisor: f64,
    pub min_radius: f64,
    pub max_radius: f64,
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            separators: vec!['-', '~', '～', '至', '到'],
            default_average: 100.0,
            divisor: 20.0,
            min_radius: 4.0,
            max_radius: 20.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CategoryColor {
    pub name: String,
    pub color: String, // awesome-markers colour token
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StyleConfig {
    pub category_colors: Vec<CategoryColor>,
    pub default_color: String,
    pub bubble_color: String,
    pub bubble_fill_opacity: f64,
    pub station_icon_size: [u32; 2],
}

impl Default for StyleConfig {
    fn default() -> Self {
        let category_colors = [
            ("早餐", "blue"),
            ("午餐", "green"),
            ("晚餐", "red"),
            ("宵夜", "purple"),
            ("下午茶", "orange"),
            ("飲料", "cadetblue"),
        ]
        .into_iter()
        .map(|(name, color)| CategoryColor { name: name.to_string(), color: color.to_string() })
        .collect();

        Self {
            category_colors,
            default_color: "gray".to_string(),
            bubble_color: "orange".to_string(),
            bubble_fill_opacity: 0.5,
            station_icon_size: [30, 30],
        }
    }
}

impl StyleConfig {
    pub fn color_table(&self) -> HashMap<String, String> {
        self.category_colors.iter()
            .map(|c| (c.name.clone(), c.color.clone()))
            .collect()
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LabelConfig {
    pub category_layer_prefix: String,
    pub fallback_category: String,
    pub bubble_layer: String,
    pub station_layer: String,
    pub station_tooltip_prefix: String,
    pub station_popup_prefix: String,
    pub category_field: String,
    pub price_field: String,
    pub intro_field: String,
    pub completion_prefix: String,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            category_layer_prefix: "類別：".to_string(),
            fallback_category: "其他".to_string(),
            bubble_layer: "氣泡圖（價位越高圈越大）".to_string(),
            station_layer: "YouBike 站點".to_string(),
            station_tooltip_prefix: "YouBike：".to_string(),
            station_popup_prefix: "YouBike 站點：".to_string(),
            category_field: "類別：".to_string(),
            price_field: "價位：".to_string(),
            intro_field: "簡介：".to_string(),
            completion_prefix: "地圖已產生：".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8000 }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }

    /// Falls back to the built-in defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_builtin_tables() {
        let config = AppConfig::default();
        let colors = config.style.color_table();

        assert_eq!(colors.len(), 6);
        assert_eq!(colors.get("早餐").map(String::as_str), Some("blue"));
        assert_eq!(colors.get("飲料").map(String::as_str), Some("cadetblue"));
        assert_eq!(config.style.default_color, "gray");
        assert_eq!(config.map.zoom_start, 15);
        assert!(!config.map.layer_control_collapsed);
        assert_eq!(config.output.html, PathBuf::from("food_map.html"));
        assert!(config.price.separators.contains(&'～'));
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[output]
html = "out/map.html"

[map]
zoom_start = 12

[[style.category_colors]]
name = "brunch"
color = "darkgreen"
"#
        )
        .unwrap();

        let config = AppConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.output.html, PathBuf::from("out/map.html"));
        assert_eq!(config.map.zoom_start, 12);
        assert_eq!(config.map.fallback_center, [25.0330, 121.5654]);
        assert_eq!(config.style.category_colors.len(), 1);
        assert_eq!(config.style.default_color, "gray");
        assert_eq!(config.input.foods, PathBuf::from("foods.csv"));
        assert_eq!(config.price.default_average, 100.0);
    }

    #[test]
    fn example_file_matches_defaults() {
        let example: AppConfig = toml::from_str(include_str!("../config.example.toml")).unwrap();
        let defaults = AppConfig::default();

        assert_eq!(example.map.attribution, defaults.map.attribution);
        assert_eq!(example.map.tiles, defaults.map.tiles);
        assert_eq!(example.price.separators, defaults.price.separators);
        assert_eq!(example.style.color_table(), defaults.style.color_table());
        assert_eq!(example.labels.bubble_layer, defaults.labels.bubble_layer);
        assert_eq!(example.input.foods, defaults.input.foods);
        assert_eq!(example.server.port, defaults.server.port);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = AppConfig::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn no_path_means_defaults() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config.server.port, 8000);
    }
}
