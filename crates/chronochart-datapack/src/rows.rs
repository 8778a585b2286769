//! Per-type data-line parsers
//!
//! Each parser takes one tab-separated data line and returns `Ok(None)` when
//! the line lacks the minimum field count for its type (optional/absent
//! data), and `Err` when a required age field is present but not parseable
//! as a number (present-but-corrupt data). Data lines always begin with an
//! empty leading cell; a non-empty first cell means the line belongs to
//! something else (a header, a wrapped label, a sub-type token) and is not
//! a row.

use crate::column::{
    Abundance, LineStyle, Rgb, SubBlockInfo, SubChronInfo, SubEventInfo, SubFaciesInfo,
    SubPointInfo, SubRangeInfo, SubSequenceInfo,
};
use crate::error::DatapackError;
use once_cell::sync::Lazy;
use regex::Regex;

/// `r/g/b` color field pattern
pub(crate) static COLOR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+/\d+/\d+)$").expect("static regex"));

/// Parse an `r/g/b` field; `None` when the field does not match the pattern
/// or a component overflows a byte
#[must_use]
pub(crate) fn parse_rgb(field: &str) -> Option<Rgb> {
    if !COLOR_PATTERN.is_match(field) {
        return None;
    }
    let mut parts = field.split('/');
    let r = parts.next()?.parse().ok()?;
    let g = parts.next()?.parse().ok()?;
    let b = parts.next()?.parse().ok()?;
    Some(Rgb { r, g, b })
}

fn parse_age(field: &str, line_number: usize) -> Result<f64, DatapackError> {
    field.trim().parse::<f64>().map_err(|_| DatapackError::InvalidAge {
        line: line_number,
        value: field.to_string(),
    })
}

fn field(fields: &[&str], index: usize) -> String {
    fields.get(index).map(|f| f.to_string()).unwrap_or_default()
}

fn has_leading_cell(fields: &[&str]) -> bool {
    fields.first().is_some_and(|f| !f.trim().is_empty())
}

/// `\t<label>\t<age>\t[linestyle]\t[popup]\t[rgb]`
///
/// The default color comes from the owning block header so rows without
/// their own color inherit it.
pub fn parse_block_row(
    line: &str,
    default_rgb: Rgb,
    line_number: usize,
) -> Result<Option<SubBlockInfo>, DatapackError> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 3 || has_leading_cell(&fields) {
        return Ok(None);
    }
    let age = parse_age(fields[2], line_number)?;
    let rgb_field = field(&fields, 5);
    let rgb = if rgb_field.trim().is_empty() || rgb_field.trim() == "0" {
        default_rgb
    } else {
        parse_rgb(rgb_field.trim()).unwrap_or_else(|| {
            tracing::warn!(line = line_number, color = %rgb_field, "invalid block row color, using column default");
            default_rgb
        })
    };
    Ok(Some(SubBlockInfo {
        label: field(&fields, 1),
        age,
        popup: field(&fields, 4),
        line_style: LineStyle::from_token(&field(&fields, 3)),
        rgb,
    }))
}

/// `\t<polarity>\t<label>\t<age>\t[popup]`; `primary` key lines are skipped
pub fn parse_chron_row(
    line: &str,
    line_number: usize,
) -> Result<Option<SubChronInfo>, DatapackError> {
    if line.to_lowercase().contains("primary") {
        return Ok(None);
    }
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 4 || has_leading_cell(&fields) {
        return Ok(None);
    }
    let age = parse_age(fields[3], line_number)?;
    let label = field(&fields, 2);
    Ok(Some(SubChronInfo {
        polarity: field(&fields, 1),
        label: (!label.is_empty()).then_some(label),
        age,
        popup: field(&fields, 4),
    }))
}

/// `\t<label>\t<age>\t[linestyle]\t[popup]`
///
/// Single-cell lines are labels wrapped from the previous row and are
/// dropped without a warning.
pub fn parse_event_row(
    line: &str,
    line_number: usize,
) -> Result<Option<SubEventInfo>, DatapackError> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 3 || has_leading_cell(&fields) {
        return Ok(None);
    }
    let age = parse_age(fields[2], line_number)?;
    Ok(Some(SubEventInfo {
        label: field(&fields, 1),
        age,
        line_style: LineStyle::from_token(&field(&fields, 3)),
        popup: field(&fields, 4),
    }))
}

/// `\t<label>\t<age>\t[abundance]\t[popup]`
pub fn parse_range_row(
    line: &str,
    line_number: usize,
) -> Result<Option<SubRangeInfo>, DatapackError> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 3 || has_leading_cell(&fields) {
        return Ok(None);
    }
    let age = parse_age(fields[2], line_number)?;
    Ok(Some(SubRangeInfo {
        label: field(&fields, 1),
        age,
        abundance: Abundance::from_token(&field(&fields, 3)).unwrap_or_default(),
        popup: field(&fields, 4),
    }))
}

/// `\t[label]\t<direction>\t<age>\t<severity>\t[popup]`
pub fn parse_sequence_row(
    line: &str,
    line_number: usize,
) -> Result<Option<SubSequenceInfo>, DatapackError> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 5 || has_leading_cell(&fields) {
        return Ok(None);
    }
    let age = parse_age(fields[3], line_number)?;
    let label = field(&fields, 1);
    let severity = field(&fields, 4);
    let mut chars = severity.chars();
    let severity = match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => severity,
    };
    Ok(Some(SubSequenceInfo {
        label: (!label.is_empty()).then_some(label),
        direction: field(&fields, 2),
        age,
        severity,
        popup: field(&fields, 5),
    }))
}

/// `\t<age>\t[xval]\t[popup]`
///
/// The x value is documented as required but is sometimes absent in real
/// datapacks; it defaults to 0.
pub fn parse_point_row(
    line: &str,
    line_number: usize,
) -> Result<Option<SubPointInfo>, DatapackError> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 2 || has_leading_cell(&fields) {
        return Ok(None);
    }
    let age = parse_age(fields[1], line_number)?;
    let x_val = fields
        .get(2)
        .and_then(|f| f.trim().parse::<f64>().ok())
        .unwrap_or(0.0);
    Ok(Some(SubPointInfo {
        age,
        x_val,
        popup: field(&fields, 3),
    }))
}

/// `\t<rockType>\t[label]\t<age>\t[info]`; `primary` key lines are skipped
///
/// The label is absent for `TOP` and `GAP` rows.
pub fn parse_facies_row(
    line: &str,
    line_number: usize,
) -> Result<Option<SubFaciesInfo>, DatapackError> {
    if line.to_lowercase().contains("primary") {
        return Ok(None);
    }
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 4 || has_leading_cell(&fields) {
        return Ok(None);
    }
    let age = parse_age(fields[3], line_number)?;
    let label = field(&fields, 2);
    Ok(Some(SubFaciesInfo {
        rock_type: field(&fields, 1),
        label: (!label.is_empty()).then_some(label),
        age,
        info: field(&fields, 4),
    }))
}
