//! Price tiering for the bubble layer: higher prices draw bigger circles.

use crate::config::PriceConfig;
use crate::types::PriceField;

#[derive(Debug, Clone)]
pub struct PriceScale {
    separators: Vec<char>,
    default_average: f64,
    divisor: f64,
    min_radius: f64,
    max_radius: f64,
}

impl Default for PriceScale {
    fn default() -> Self {
        Self::from_config(&PriceConfig::default())
    }
}

impl PriceScale {
    pub fn from_config(config: &PriceConfig) -> Self {
        Self {
            separators: config.separators.clone(),
            default_average: config.default_average,
            divisor: config.divisor,
            // f64::clamp panics on inverted bounds
            min_radius: config.min_radius.min(config.max_radius),
            max_radius: config.max_radius.max(config.min_radius),
        }
    }

    /// Never fails: anything unreadable is priced at the default average.
    pub fn radius(&self, price: &PriceField) -> f64 {
        let average = match price {
            PriceField::Text(text) => self.average_of_range(text),
            PriceField::Number(n) if n.is_finite() => *n,
            // Departs from a NaN-propagating min/max clamp (NaN -> 4, inf -> 20):
            // blank and non-finite prices take the default average.
            PriceField::Number(_) | PriceField::Missing => self.default_average,
        };

        (average / self.divisor).clamp(self.min_radius, self.max_radius)
    }

    fn average_of_range(&self, text: &str) -> f64 {
        let nums: Vec<f64> = text
            .split(|c: char| self.separators.contains(&c))
            .filter_map(|part| parse_whole_number(part.trim()))
            .collect();

        // Only the first and last bound count, however many were given.
        match (nums.first(), nums.last()) {
            (Some(low), Some(high)) => (low + high) / 2.0,
            _ => self.default_average,
        }
    }
}

pub fn price_to_radius(price: &PriceField) -> f64 {
    PriceScale::default().radius(price)
}

/// Digits only, ASCII or full-width. Signs, decimals and blanks are rejected.
fn parse_whole_number(token: &str) -> Option<f64> {
    if token.is_empty() {
        return None;
    }

    token.chars().try_fold(0.0_f64, |acc, c| {
        let digit = match c {
            '0'..='9' => c as u32 - '0' as u32,
            '０'..='９' => c as u32 - '０' as u32,
            _ => return None,
        };
        Some(acc * 10.0 + digit as f64)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> PriceField {
        PriceField::Text(s.to_string())
    }

    #[test]
    fn range_is_averaged() {
        assert_eq!(price_to_radius(&text("50-120")), 4.25);
        assert_eq!(price_to_radius(&text("80-150")), 5.75);
        assert_eq!(price_to_radius(&text("200~400")), 15.0);
        assert_eq!(price_to_radius(&text("150 至 250")), 10.0);
        assert_eq!(price_to_radius(&text("100到300")), 10.0);
        assert_eq!(price_to_radius(&text("120～160")), 7.0);
    }

    #[test]
    fn single_number_is_a_point_estimate() {
        assert_eq!(price_to_radius(&text("100")), 5.0);
        assert_eq!(price_to_radius(&text(" 300 ")), 15.0);
    }

    #[test]
    fn unreadable_text_uses_default_average() {
        assert_eq!(price_to_radius(&text("call for price")), 5.0);
        assert_eq!(price_to_radius(&text("")), 5.0);
        assert_eq!(price_to_radius(&text("12.5")), 5.0);
        assert_eq!(price_to_radius(&text("$100-$200")), 5.0);
    }

    #[test]
    fn unparseable_tokens_are_skipped() {
        // "about 90" is dropped, 150 stands alone
        assert_eq!(price_to_radius(&text("about 90-150")), 7.5);
    }

    #[test]
    fn more_than_two_bounds_use_first_and_last() {
        assert_eq!(price_to_radius(&text("50-100-150")), 5.0);
        assert_eq!(price_to_radius(&text("100-999-300")), 10.0);
    }

    #[test]
    fn full_width_digits_are_accepted() {
        assert_eq!(price_to_radius(&text("２００-４００")), 15.0);
    }

    #[test]
    fn numeric_input_is_used_directly() {
        assert_eq!(price_to_radius(&PriceField::Number(250.0)), 12.5);
        assert_eq!(price_to_radius(&PriceField::Number(12.5)), 4.0);
    }

    #[test]
    fn radius_is_clamped() {
        assert_eq!(price_to_radius(&text("1000-3000")), 20.0);
        assert_eq!(price_to_radius(&text("10")), 4.0);
        assert_eq!(price_to_radius(&PriceField::Number(-250.0)), 4.0);
        assert_eq!(price_to_radius(&PriceField::Number(f64::NAN)), 5.0);
        assert_eq!(price_to_radius(&PriceField::Number(f64::INFINITY)), 5.0);
        assert_eq!(price_to_radius(&PriceField::Missing), 5.0);
    }

    #[test]
    fn radius_always_within_bounds() {
        let inputs = [
            text(""),
            text("-"),
            text("0"),
            text("99999999999999999999"),
            text("~~~"),
            PriceField::Missing,
            PriceField::Number(0.0),
            PriceField::Number(-1.0),
            PriceField::Number(1e12),
        ];
        for input in &inputs {
            let r = price_to_radius(input);
            assert!((4.0..=20.0).contains(&r), "{:?} gave {}", input, r);
        }
    }

    #[test]
    fn custom_scale_follows_config() {
        let config = PriceConfig {
            separators: vec!['/'],
            default_average: 40.0,
            divisor: 10.0,
            min_radius: 2.0,
            max_radius: 8.0,
        };
        let scale = PriceScale::from_config(&config);

        assert_eq!(scale.radius(&text("30/50")), 4.0);
        assert_eq!(scale.radius(&text("30-50")), 4.0); // '-' no longer splits: unparseable
        assert_eq!(scale.radius(&PriceField::Missing), 4.0);
        assert_eq!(scale.radius(&text("500")), 8.0);
    }
}
