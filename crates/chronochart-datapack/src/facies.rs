//! Facies extraction
//!
//! A secondary linear scan over the same datapack lines, independent of the
//! column tree scan. Wherever a header's type token is `facies`, a bounded
//! forward scan collects rock-type/label/age records until a blank line or
//! a line with too few fields. The block's display name resolves through
//! the shallow alias table when the column was declared with the
//! `" - shallow"` suffix.
//!
//! This scan is best effort: a corrupt age inside a facies block ends that
//! block with a warning instead of failing the parse.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::column::SubFaciesInfo;
use crate::rows::parse_facies_row;

/// Collect facies records keyed by resolved display name
pub fn extract_facies(
    lines: &[&str],
    shallow_aliases: &HashMap<String, String>,
) -> IndexMap<String, Vec<SubFaciesInfo>> {
    let mut facies: IndexMap<String, Vec<SubFaciesInfo>> = IndexMap::new();
    let mut i = 0;
    while i < lines.len() {
        let Some(name) = facies_header_name(lines[i]) else {
            i += 1;
            continue;
        };
        let display_name = shallow_aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string());

        let mut rows = Vec::new();
        i += 1;
        while i < lines.len() {
            let line = lines[i];
            if line.trim().is_empty() {
                break;
            }
            if line.to_lowercase().contains("primary") {
                i += 1;
                continue;
            }
            match parse_facies_row(line, i + 1) {
                Ok(Some(row)) => rows.push(row),
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(column = %display_name, error = %err, "malformed facies row, ending block");
                    break;
                }
            }
            i += 1;
        }
        if !rows.is_empty() {
            facies.entry(display_name).or_default().extend(rows);
        }
    }
    facies
}

/// Column name when the line is a `facies`-type header
fn facies_header_name(line: &str) -> Option<&str> {
    let mut fields = line.split('\t');
    let name = fields.next()?.trim();
    if name.is_empty() {
        return None;
    }
    let col_type = fields.next()?.trim();
    col_type.eq_ignore_ascii_case("facies").then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lines(text: &str) -> Vec<&str> {
        text.lines().collect()
    }

    #[test]
    fn collects_until_blank_line() {
        let text = concat!(
            "Section A\tfacies\t150\n",
            "\tsandstone\t\t12.0\n",
            "\tlimestone\tUnit B\t15.5\tnote\n",
            "\n",
            "\tshale\t\t20.0\n",
        );
        let facies = extract_facies(&lines(text), &HashMap::new());
        let rows = &facies["Section A"];
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].rock_type, "sandstone");
        assert_eq!(rows[1].label.as_deref(), Some("Unit B"));
    }

    #[test]
    fn primary_lines_skipped_inside_block() {
        let text = concat!(
            "Section A\tfacies\t150\n",
            "\tsandstone\t\t12.0\n",
            "\tPrimary\n",
            "\tshale\t\t14.0\n",
        );
        let facies = extract_facies(&lines(text), &HashMap::new());
        assert_eq!(facies["Section A"].len(), 2);
    }

    #[test]
    fn too_few_fields_ends_block() {
        let text = concat!(
            "Section A\tfacies\t150\n",
            "\tsandstone\t\t12.0\n",
            "\tshale\n",
            "\tlimestone\t\t20.0\n",
        );
        let facies = extract_facies(&lines(text), &HashMap::new());
        assert_eq!(facies["Section A"].len(), 1);
    }

    #[test]
    fn corrupt_age_ends_block_without_error() {
        let text = concat!(
            "Section A\tfacies\t150\n",
            "\tsandstone\t\tbogus\n",
        );
        let facies = extract_facies(&lines(text), &HashMap::new());
        assert!(facies.is_empty());
    }

    #[test]
    fn shallow_alias_renames_block() {
        let mut aliases = HashMap::new();
        aliases.insert("Reef One".to_string(), "Reef Map".to_string());
        let text = "Reef One\tfacies\t150\n\tsandstone\t\t12.0\n";
        let facies = extract_facies(&lines(text), &aliases);
        assert!(facies.contains_key("Reef Map"));
        assert!(!facies.contains_key("Reef One"));
    }
}
