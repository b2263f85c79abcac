use geo::Point;

/// Raw price cell, typed the way the whole price column was inferred.
#[derive(Debug, Clone, PartialEq)]
pub enum PriceField {
    Text(String),
    Number(f64),
    Missing,
}

impl PriceField {
    /// Detail-panel rendering; missing prices show as empty.
    pub fn display(&self) -> String {
        match self {
            PriceField::Text(s) => s.clone(),
            PriceField::Number(n) => n.to_string(),
            PriceField::Missing => String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FoodEntry {
    pub name: String,
    // x = lon, y = lat
    pub location: Point<f64>,
    pub category: Option<String>,
    pub price: PriceField,
    pub intro: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StationEntry {
    pub station: String,
    pub location: Point<f64>,
}
