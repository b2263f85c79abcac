use crate::types::{FoodEntry, PriceField, StationEntry};
use anyhow::{Context, Result, anyhow};
use csv::{ReaderBuilder, StringRecord, Trim};
use geo::Point;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::info;

const FOOD_COLUMNS: &[&str] = &["name", "lat", "lon"];
const STATION_COLUMNS: &[&str] = &["lat", "lng", "station"];

#[derive(Debug, Deserialize)]
struct FoodRecord {
    name: String,
    lat: f64,
    lon: f64,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    intro: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StationRecord {
    lat: f64,
    lng: f64,
    station: String,
}

pub fn load_foods(path: &Path) -> Result<Vec<FoodEntry>> {
    let records: Vec<FoodRecord> = read_records(path, FOOD_COLUMNS)?;

    // A column of nothing but numbers (blanks aside) is numeric as a whole.
    let numeric_prices = records.iter()
        .filter_map(|r| r.price.as_deref())
        .all(|p| p.parse::<f64>().is_ok());

    let foods: Vec<FoodEntry> = records.into_iter().map(|r| {
        let price = match r.price {
            None => PriceField::Missing,
            Some(p) if numeric_prices => p.parse().map(PriceField::Number).unwrap_or(PriceField::Missing),
            Some(p) => PriceField::Text(p),
        };

        FoodEntry {
            name: r.name,
            location: Point::new(r.lon, r.lat),
            category: r.category,
            price,
            intro: r.intro,
        }
    }).collect();

    info!(path = %path.display(), rows = foods.len(), numeric_prices, "Loaded food dataset");
    Ok(foods)
}

pub fn load_stations(path: &Path) -> Result<Vec<StationEntry>> {
    let records: Vec<StationRecord> = read_records(path, STATION_COLUMNS)?;

    let stations: Vec<StationEntry> = records.into_iter().map(|r| StationEntry {
        station: r.station,
        location: Point::new(r.lng, r.lat),
    }).collect();

    info!(path = %path.display(), rows = stations.len(), "Loaded station dataset");
    Ok(stations)
}

fn read_records<T>(path: &Path, required: &[&str]) -> Result<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
{
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to open CSV file: {:?}", path))?;
    let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&bytes);

    let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(body);
    let headers = rdr.headers()
        .with_context(|| format!("Failed to read CSV header: {:?}", path))?
        .clone();
    check_columns(&headers, required, path)?;

    let mut rows = Vec::new();
    for (i, result) in rdr.deserialize().enumerate() {
        // +2: one for the header, one for 1-based line numbers
        let row: T = result.with_context(|| format!("Invalid row {} in {:?}", i + 2, path))?;
        rows.push(row);
    }

    Ok(rows)
}

fn check_columns(headers: &StringRecord, required: &[&str], path: &Path) -> Result<()> {
    for column in required {
        if !headers.iter().any(|h| h == *column) {
            return Err(anyhow!("Column '{}' not found in {:?}", column, path));
        }
    }
    Ok(())
}
