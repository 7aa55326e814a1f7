//! Extraction of telemetry values from a meter's status page.
//!
//! The status page is treated as opaque text. Every substring that looks
//! like a number is collected left to right, and the n-th number becomes
//! the n-th [`Field`](pmxxx_common::Field). Markup, labels and units are
//! never interpreted.

use once_cell::sync::Lazy;
use pmxxx_common::{FIELD_COUNT, FieldValues};
use regex::Regex;

use crate::error::{PollerError, Result};

/// Numeric literal: optional sign, optional leading dot, digits with
/// optional `,ddd` thousands groups, optional fraction, optional exponent.
static NUMBER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[-+]?\.?[0-9]+(?:,[0-9]{3})*\.?[0-9]*(?:[eE][-+]?[0-9]+)?").unwrap()
});

/// Parse a status page into one value per field.
///
/// Fails with [`PollerError::MalformedTelemetry`] if the text holds fewer
/// numbers than there are fields, or if one of the first [`FIELD_COUNT`]
/// numbers does not convert. Numbers past the schema are ignored.
pub fn parse_telemetry(text: &str) -> Result<FieldValues> {
    let mut raw = [0.0; FIELD_COUNT];
    let mut found = 0;

    for (slot, token) in raw.iter_mut().zip(numeric_tokens(text)) {
        *slot = parse_number(token)?;
        found += 1;
    }

    if found < FIELD_COUNT {
        return Err(PollerError::malformed(format!(
            "expected {} numeric values, found {}",
            FIELD_COUNT, found
        )));
    }

    Ok(FieldValues::from_ordered(raw))
}

/// Iterate over the numeric tokens in `text`, left to right.
pub fn numeric_tokens(text: &str) -> impl Iterator<Item = &str> {
    NUMBER_REGEX.find_iter(text).map(|m| m.as_str())
}

/// Convert one token, treating commas as thousands separators.
fn parse_number(token: &str) -> Result<f64> {
    let cleaned: String;
    let digits = if token.contains(',') {
        cleaned = token.replace(',', "");
        cleaned.as_str()
    } else {
        token
    };

    digits
        .parse::<f64>()
        .map_err(|_| PollerError::malformed(format!("invalid number '{}'", token)))
}
