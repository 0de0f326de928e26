//! Formatting helpers for the pump's seven-segment style readouts
//!
//! Readings are shown as six characters, `000.00` through `999.99`. Leading
//! zeros in front of the units digit are drawn as an unlit `8` (every
//! segment dimmed) the way a physical pump display looks when the high
//! digits are not in use.

use serde::{Deserialize, Serialize};

/// One character cell of a readout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentDigit {
    pub ch: char,
    /// Cell is an unused leading position and should be drawn unlit
    pub dim: bool,
}

/// A formatted reading ready for rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayReading {
    /// Plain `%06.2f` text, e.g. `012.35`
    pub text: String,
    pub digits: Vec<SegmentDigit>,
}

/// Zero-padded six character reading with two decimals
pub fn format_reading(value: f64) -> String {
    format!("{:06.2}", value.max(0.0))
}

/// Split a formatted reading into cells, dimming the leading zeros
pub fn segment_digits(text: &str) -> Vec<SegmentDigit> {
    let chars: Vec<char> = text.chars().collect();
    let units = match chars.iter().position(|&c| c == '.') {
        Some(0) | None => {
            return chars.iter().map(|&ch| SegmentDigit { ch, dim: false }).collect();
        }
        Some(dot) => dot - 1,
    };
    let first_significant = chars
        .iter()
        .position(|&c| c != '0' && c != '.')
        .unwrap_or(chars.len());

    chars
        .iter()
        .enumerate()
        .map(|(i, &ch)| {
            let leading = ch == '0' && i < units && i < first_significant;
            if leading {
                SegmentDigit { ch: '8', dim: true }
            } else {
                SegmentDigit { ch, dim: false }
            }
        })
        .collect()
}

pub fn reading(value: f64) -> DisplayReading {
    let text = format_reading(value);
    let digits = segment_digits(&text);
    DisplayReading { text, digits }
}

/// Money label such as `£12.34`
pub fn money_label(symbol: &str, amount: f64) -> String {
    format!("{}{:.2}", symbol, amount)
}

/// Rate label such as `£1.45/L`
pub fn rate_label(symbol: &str, price_per_litre: f64) -> String {
    format!("{}{:.2}/L", symbol, price_per_litre)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(digits: &[SegmentDigit]) -> String {
        digits.iter().map(|d| d.ch).collect()
    }

    #[test]
    fn zero_reading_keeps_units_digit() {
        let r = reading(0.0);
        assert_eq!(r.text, "000.00");
        assert_eq!(rendered(&r.digits), "880.00");
        let dims: Vec<bool> = r.digits.iter().map(|d| d.dim).collect();
        assert_eq!(dims, vec![true, true, false, false, false, false]);
    }

    #[test]
    fn significant_digits_stop_the_dimming() {
        let r = reading(12.346);
        assert_eq!(r.text, "012.35");
        assert_eq!(rendered(&r.digits), "812.35");
        assert!(r.digits[0].dim);
        assert!(!r.digits[1].dim);
    }

    #[test]
    fn inner_zeros_stay_lit() {
        let r = reading(102.0);
        assert_eq!(rendered(&r.digits), "102.00");
        assert!(r.digits.iter().all(|d| !d.dim));
    }

    #[test]
    fn labels_use_two_decimals() {
        assert_eq!(money_label("£", 0.0225), "£0.02");
        assert_eq!(rate_label("£", 1.5), "£1.50/L");
    }
}
