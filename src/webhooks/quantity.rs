//! Kubernetes resource quantities

use crate::error::{Error, Result};

/// Parse a Kubernetes quantity such as `500m`, `2`, `1Gi` or `1.5G` into
/// its numeric value.
pub fn parse_quantity(s: &str) -> Result<f64> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::QuantityParse("empty quantity string".into()));
    }

    // Find where the number ends and the suffix begins
    let mut num_end = 0;
    for (i, c) in s.char_indices() {
        if !(c.is_ascii_digit() || c == '.' || (i == 0 && (c == '+' || c == '-'))) {
            num_end = i;
            break;
        }
        num_end = i + 1;
    }

    let num_str = &s[..num_end];
    let suffix = &s[num_end..];

    let num: f64 = num_str
        .parse()
        .map_err(|_| Error::QuantityParse(format!("invalid number: {}", s)))?;

    let multiplier: f64 = match suffix {
        "" => 1.0,
        "n" => 1e-9,
        "u" => 1e-6,
        "m" => 1e-3,
        "k" => 1e3,
        "M" => 1e6,
        "G" => 1e9,
        "T" => 1e12,
        "P" => 1e15,
        "E" => 1e18,
        "Ki" => 1024.0,
        "Mi" => 1024f64.powi(2),
        "Gi" => 1024f64.powi(3),
        "Ti" => 1024f64.powi(4),
        "Pi" => 1024f64.powi(5),
        "Ei" => 1024f64.powi(6),
        _ => match suffix.strip_prefix(['e', 'E']).map(str::parse::<i32>) {
            Some(Ok(exp)) => 10f64.powi(exp),
            _ => {
                return Err(Error::QuantityParse(format!(
                    "unknown suffix: {}",
                    suffix
                )))
            }
        },
    };

    Ok(num * multiplier)
}

/// Integer value of a quantity, rounded up
pub fn quantity_value(s: &str) -> Result<i64> {
    Ok(parse_quantity(s)?.ceil() as i64)
}
