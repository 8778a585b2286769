//! Datapack text parser
//!
//! Input is the full text of one or more datapack files concatenated with
//! newline separators; file boundaries carry no meaning. Parsing runs in
//! two passes:
//!
//! 1. collect property lines, `parent\t:\tchildren` edges (with their
//!    inline `_METACOLUMN_`/`_TITLE_`/`off` state tokens), the is-child
//!    set, and shallow facies aliases
//! 2. walk column header/data blocks with the per-type row parsers, then
//!    materialize the tree from the edge snapshot with an explicit
//!    worklist
//!
//! Lenient mode logs any parse error and yields an empty result so a
//! partially invalid datapack never takes down the caller; strict mode
//! propagates the error.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use crate::column::{ColumnData, ColumnInfo, ColumnTree, SubFaciesInfo};
use crate::error::DatapackError;
use crate::facies::extract_facies;
use crate::rows::{
    parse_block_row, parse_chron_row, parse_event_row, parse_facies_row, parse_point_row,
    parse_range_row, parse_rgb, parse_sequence_row,
};

/// Suffix marking a facies event column aliased to its owning display name
pub(crate) const SHALLOW_SUFFIX: &str = " - shallow";

/// How parse errors surface
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParseMode {
    /// Log the error and return an empty result
    #[default]
    Lenient,
    /// Propagate the error to the caller
    Strict,
}

/// File-level properties preceding the column data
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DatapackProperties {
    pub chart_title: Option<String>,
    /// Age units declared by the `age units:` line, e.g. `Ma`
    pub age_units: Option<String>,
    pub top_age: Option<f64>,
    pub base_age: Option<f64>,
    pub vertical_scale: Option<f64>,
    pub default_chronostrat: Option<String>,
    pub format_version: Option<String>,
}

/// Result of parsing one concatenated datapack text
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DatapackParse {
    pub columns: ColumnTree,
    /// Facies records keyed by resolved display name
    pub facies: IndexMap<String, Vec<SubFaciesInfo>>,
    pub properties: DatapackProperties,
}

/// Parse datapack text into the column tree, facies map, and properties
///
/// In [`ParseMode::Lenient`] this never returns `Err`; failures degrade to
/// an empty [`DatapackParse`].
pub fn parse(raw: &str, mode: ParseMode) -> Result<DatapackParse, DatapackError> {
    match parse_inner(raw) {
        Ok(parsed) => Ok(parsed),
        Err(err) => match mode {
            ParseMode::Strict => Err(err),
            ParseMode::Lenient => {
                tracing::error!(error = %err, "datapack parse failed, returning empty result");
                Ok(DatapackParse::default())
            }
        },
    }
}

/// State tokens spliced out of a declaration line's child list
#[derive(Debug, Clone)]
struct GroupEntry {
    children: Vec<String>,
    on: bool,
    enable_title: bool,
}

fn parse_inner(raw: &str) -> Result<DatapackParse, DatapackError> {
    let lines: Vec<&str> = raw.lines().collect();

    let mut properties = DatapackProperties::default();
    let mut edges: IndexMap<String, GroupEntry> = IndexMap::new();
    let mut is_child: HashSet<String> = HashSet::new();
    let mut shallow_aliases: HashMap<String, String> = HashMap::new();
    let mut ma_root: Option<String> = None;

    // pass 1: properties, edges, is-child set, shallow aliases
    for line in &lines {
        if let Some((parent, raw_children)) = split_edge_line(line) {
            let mut entry = GroupEntry {
                children: Vec::new(),
                on: true,
                enable_title: true,
            };
            for child in raw_children {
                match child {
                    "_METACOLUMN_ON" => {}
                    "_METACOLUMN_OFF" | "off" => entry.on = false,
                    "_TITLE_ON" => entry.enable_title = true,
                    "_TITLE_OFF" => entry.enable_title = false,
                    _ => {
                        if let Some(base) = child.strip_suffix(SHALLOW_SUFFIX) {
                            shallow_aliases.insert(base.to_string(), parent.to_string());
                        }
                        is_child.insert(child.to_string());
                        entry.children.push(child.to_string());
                    }
                }
            }
            edges.insert(parent.to_string(), entry);
        } else if let Some((key, value)) = split_property_line(line) {
            apply_property(&mut properties, &key, value, &mut ma_root);
        }
    }

    // pass 2: column header/data blocks
    let mut lone = parse_column_blocks(&lines)?;

    let mut tree = ColumnTree::default();
    if let Some(units_root) = ma_root {
        if !edges.contains_key(&units_root) && !lone.contains_key(&units_root) {
            tree.roots.insert(
                units_root.clone(),
                ColumnInfo::new(units_root, ColumnData::Blank),
            );
        }
    }

    for parent in edges.keys().cloned().collect::<Vec<_>>() {
        if is_child.contains(&parent) {
            continue;
        }
        let root = materialize(&parent, &edges, &mut lone);
        tree.roots.insert(root.name.clone(), root);
    }

    // lone columns never referenced as children become extra roots
    for (name, col) in lone {
        if !is_child.contains(&name) {
            tree.roots.insert(name, col);
        }
    }

    if tree.is_empty() {
        return Err(DatapackError::NoColumns);
    }

    let facies = extract_facies(&lines, &shallow_aliases);

    Ok(DatapackParse {
        columns: tree,
        facies,
        properties,
    })
}

/// `parent\t:\tchild1\tchild2...` declaration line
fn split_edge_line(line: &str) -> Option<(&str, Vec<&str>)> {
    let (parent, rest) = line.split_once("\t:\t")?;
    let parent = parent.trim();
    if parent.is_empty() {
        return None;
    }
    let children = rest
        .split('\t')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect();
    Some((parent, children))
}

const PROPERTY_KEYS: &[&str] = &[
    "settop",
    "setbase",
    "chart title",
    "age units",
    "default chronostrat",
    "format version",
    "setscale",
];

/// `<key>:<value>` property line; `None` unless the key is recognized
fn split_property_line(line: &str) -> Option<(String, String)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim().to_lowercase();
    if !PROPERTY_KEYS.contains(&key.as_str()) {
        return None;
    }
    let value = value
        .split('\t')
        .map(str::trim)
        .find(|v| !v.is_empty())
        .unwrap_or_default();
    Some((key, value.to_string()))
}

fn apply_property(
    properties: &mut DatapackProperties,
    key: &str,
    value: String,
    ma_root: &mut Option<String>,
) {
    match key {
        "chart title" => properties.chart_title = Some(value),
        "age units" => {
            // the units line also demands the synthetic root column
            *ma_root = value.split_whitespace().next().map(str::to_string);
            properties.age_units = Some(value);
        }
        "settop" => properties.top_age = parse_numeric_property(key, &value),
        "setbase" => properties.base_age = parse_numeric_property(key, &value),
        "setscale" => properties.vertical_scale = parse_numeric_property(key, &value),
        "default chronostrat" => properties.default_chronostrat = Some(value),
        "format version" => properties.format_version = Some(value),
        _ => {}
    }
}

fn parse_numeric_property(key: &str, value: &str) -> Option<f64> {
    match value.parse::<f64>() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(key, value, "malformed numeric property, ignoring");
            None
        }
    }
}

/// Column types whose data blocks are consumed but not modeled
const SKIPPED_TYPES: &[&str] = &["transect", "freehand", "overlay", "image"];

const KNOWN_TYPES: &[&str] = &[
    "block", "chron", "facies", "event", "range", "sequence", "point", "blank",
];

/// Scan header/data blocks into lone columns keyed by name, in file order
fn parse_column_blocks(lines: &[&str]) -> Result<IndexMap<String, ColumnInfo>, DatapackError> {
    let mut lone: IndexMap<String, ColumnInfo> = IndexMap::new();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        let line_number = i + 1;
        let Some((col, col_type)) = parse_header_line(line) else {
            i += 1;
            continue;
        };

        if col_type == "blank" {
            lone.insert(col.name.clone(), col);
            i += 1;
            continue;
        }
        if SKIPPED_TYPES.contains(&col_type.as_str()) {
            tracing::debug!(column = %col.name, kind = %col_type, "skipping unmodeled column type");
            i = skip_data_lines(lines, i + 1);
            continue;
        }

        let (col, next) = collect_rows(lines, i + 1, col, &col_type, line_number)?;
        lone.insert(col.name.clone(), col);
        i = next;
    }
    Ok(lone)
}

/// `<name>\t<type>\t<width>\t<r/g/b>\t[notitle]\t[on|off]\t[popup]`
fn parse_header_line(line: &str) -> Option<(ColumnInfo, String)> {
    let fields: Vec<&str> = line.split('\t').collect();
    let name = fields.first()?.trim();
    if name.is_empty() || fields.len() < 2 {
        return None;
    }
    let col_type = fields[1].trim().to_lowercase();
    if !KNOWN_TYPES.contains(&col_type.as_str()) && !SKIPPED_TYPES.contains(&col_type.as_str()) {
        return None;
    }

    let data = match col_type.as_str() {
        "block" => ColumnData::Block { rows: Vec::new() },
        "facies" => ColumnData::Facies { rows: Vec::new() },
        "event" => ColumnData::Event { rows: Vec::new() },
        "range" => ColumnData::Range { rows: Vec::new() },
        "chron" => ColumnData::Chron { rows: Vec::new() },
        "sequence" => ColumnData::Sequence { rows: Vec::new() },
        "point" => ColumnData::Point { rows: Vec::new() },
        _ => ColumnData::Blank,
    };
    let mut col = ColumnInfo::new(name, data);

    if let Some(width) = fields.get(2).map(|f| f.trim()).filter(|f| !f.is_empty()) {
        match width.parse::<f64>() {
            Ok(w) => col.width = w,
            Err(_) => {
                tracing::warn!(column = %col.name, width, "malformed column width, using default");
            }
        }
    }
    if let Some(rgb) = fields.get(3).and_then(|f| parse_rgb(f.trim())) {
        col.rgb = rgb;
    }
    for token in fields.iter().skip(4).map(|f| f.trim()) {
        match token {
            "" => {}
            "notitle" => col.enable_title = false,
            "off" => col.on = false,
            "on" => col.on = true,
            other => col.popup = other.to_string(),
        }
    }
    Some((col, col_type))
}

fn is_data_line(line: &str) -> bool {
    !line.trim().is_empty() && line.starts_with('\t')
}

fn skip_data_lines(lines: &[&str], mut i: usize) -> usize {
    while i < lines.len() && is_data_line(lines[i]) {
        i += 1;
    }
    i
}

/// Feed the block's data lines through the typed row parser, widening the
/// column's age range per row. Returns the column and the next line index.
fn collect_rows(
    lines: &[&str],
    start: usize,
    mut col: ColumnInfo,
    col_type: &str,
    header_line: usize,
) -> Result<(ColumnInfo, usize), DatapackError> {
    let default_rgb = col.rgb;
    let mut i = start;
    while i < lines.len() && is_data_line(lines[i]) {
        let line = lines[i];
        let line_number = i + 1;
        let age = match (&mut col.data, col_type) {
            (ColumnData::Block { rows }, _) => {
                push_row(rows, parse_block_row(line, default_rgb, line_number)?, |r| r.age)
            }
            (ColumnData::Facies { rows }, _) => {
                push_row(rows, parse_facies_row(line, line_number)?, |r| r.age)
            }
            (ColumnData::Event { rows }, _) => {
                push_row(rows, parse_event_row(line, line_number)?, |r| r.age)
            }
            (ColumnData::Range { rows }, _) => {
                push_row(rows, parse_range_row(line, line_number)?, |r| r.age)
            }
            (ColumnData::Chron { rows }, _) => {
                push_row(rows, parse_chron_row(line, line_number)?, |r| r.age)
            }
            (ColumnData::Sequence { rows }, _) => {
                push_row(rows, parse_sequence_row(line, line_number)?, |r| r.age)
            }
            (ColumnData::Point { rows }, _) => {
                push_row(rows, parse_point_row(line, line_number)?, |r| r.age)
            }
            _ => None,
        };
        if let Some(age) = age {
            col.widen_age_range(age, age);
        }
        i += 1;
    }
    if i == start {
        tracing::debug!(column = %col.name, line = header_line, "column header with no data rows");
    }
    Ok((col, i))
}

fn push_row<R>(rows: &mut Vec<R>, parsed: Option<R>, age_of: impl Fn(&R) -> f64) -> Option<f64> {
    let row = parsed?;
    let age = age_of(&row);
    rows.push(row);
    Some(age)
}

/// One pending node of the worklist tree construction
struct Frame {
    col: ColumnInfo,
    pending: std::collections::VecDeque<String>,
}

/// Materialize one root's subtree from the edge snapshot
///
/// Explicit stack instead of recursion; each group's children come from its
/// immutable edge entry, and lone columns are consumed as they are attached.
/// A visited set guards against malformed cyclic declarations.
fn materialize(
    root: &str,
    edges: &IndexMap<String, GroupEntry>,
    lone: &mut IndexMap<String, ColumnInfo>,
) -> ColumnInfo {
    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(root.to_string());

    let mut stack: Vec<Frame> = vec![group_frame(root, edges)];
    let mut finished: Option<ColumnInfo> = None;

    while let Some(frame) = stack.last_mut() {
        if let Some(child_name) = frame.pending.pop_front() {
            if child_name.ends_with(SHALLOW_SUFFIX) && !edges.contains_key(&child_name) {
                // shallow alias, already recorded; not a tree child
                continue;
            }
            if !visited.insert(child_name.clone()) {
                tracing::warn!(column = %child_name, "cyclic or duplicate column declaration, skipping");
                continue;
            }
            if edges.contains_key(&child_name) {
                let mut child = group_frame(&child_name, edges);
                child.col.parent = Some(frame.col.name.clone());
                stack.push(child);
            } else {
                let mut child = lone
                    .shift_remove(&child_name)
                    .unwrap_or_else(|| ColumnInfo::new(child_name, ColumnData::Blank));
                child.parent = Some(frame.col.name.clone());
                attach(&mut frame.col, child);
            }
        } else {
            let done = match stack.pop() {
                Some(frame) => frame.col,
                None => break,
            };
            match stack.last_mut() {
                Some(parent) => attach(&mut parent.col, done),
                None => {
                    finished = Some(done);
                    break;
                }
            }
        }
    }

    finished.unwrap_or_else(|| ColumnInfo::new(root, ColumnData::Group))
}

fn group_frame(name: &str, edges: &IndexMap<String, GroupEntry>) -> Frame {
    let mut col = ColumnInfo::new(name, ColumnData::Group);
    let pending = match edges.get(name) {
        Some(entry) => {
            col.on = entry.on;
            col.enable_title = entry.enable_title;
            entry.children.iter().cloned().collect()
        }
        None => std::collections::VecDeque::new(),
    };
    Frame { col, pending }
}

fn attach(parent: &mut ColumnInfo, child: ColumnInfo) {
    if child.has_age_range() {
        parent.widen_age_range(child.min_age, child.max_age);
    }
    parent.children.insert(child.name.clone(), child);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::LineStyle;
    use pretty_assertions::assert_eq;

    #[test]
    fn two_level_tree_consistency() {
        let text = "Parent\t:\tChild1\tChild2\n";
        let parsed = parse(text, ParseMode::Strict).unwrap();
        assert_eq!(parsed.columns.roots.len(), 1);
        let parent = &parsed.columns.roots["Parent"];
        let names: Vec<&String> = parent.children.keys().collect();
        assert_eq!(names, ["Child1", "Child2"]);
        assert_eq!(parent.children["Child1"].parent.as_deref(), Some("Parent"));
    }

    #[test]
    fn block_column_scenario() {
        let text = "Period\tblock\t\tUSGS-Named\t\toff\n\tTOP\t145.5\n\tJurassic\t199.6\t2\n";
        let parsed = parse(text, ParseMode::Strict).unwrap();
        assert_eq!(parsed.columns.roots.len(), 1);
        let period = &parsed.columns.roots["Period"];
        assert!(!period.on);
        assert_eq!(period.width, 100.0);
        let ColumnData::Block { rows } = &period.data else {
            panic!("expected block data");
        };
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].label, "TOP");
        assert_eq!(rows[0].age, 145.5);
        assert_eq!(rows[1].label, "Jurassic");
        assert_eq!(rows[1].age, 199.6);
        assert_eq!(rows[1].line_style, LineStyle::Solid);
        assert_eq!(period.min_age, 145.5);
        assert_eq!(period.max_age, 199.6);
    }

    #[test]
    fn lenient_swallows_corrupt_age() {
        let text = "Period\tblock\t150\n\tTOP\tnot-a-number\n";
        let parsed = parse(text, ParseMode::Lenient).unwrap();
        assert!(parsed.columns.is_empty());
        assert!(parsed.facies.is_empty());
    }

    #[test]
    fn strict_propagates_corrupt_age() {
        let text = "Period\tblock\t150\n\tTOP\tnot-a-number\n";
        let err = parse(text, ParseMode::Strict).unwrap_err();
        assert!(matches!(err, DatapackError::InvalidAge { line: 2, .. }));
    }

    #[test]
    fn age_units_injects_synthetic_root() {
        let text = "format version:\t1.5\nage units:\tMa\n\nEra\t:\tPaleozoic\n";
        let parsed = parse(text, ParseMode::Strict).unwrap();
        assert!(parsed.columns.roots.contains_key("Ma"));
        assert!(parsed.columns.roots.contains_key("Era"));
        assert_eq!(parsed.properties.age_units.as_deref(), Some("Ma"));
        assert_eq!(parsed.properties.format_version.as_deref(), Some("1.5"));
    }

    #[test]
    fn properties_extracted() {
        let text = concat!(
            "SetTop:\t0\n",
            "SetBase:\t545\n",
            "chart title:\tPhanerozoic\n",
            "SetScale:\tbogus\n",
            "Eon\t:\tPhanerozoic\n",
        );
        let parsed = parse(text, ParseMode::Strict).unwrap();
        assert_eq!(parsed.properties.top_age, Some(0.0));
        assert_eq!(parsed.properties.base_age, Some(545.0));
        assert_eq!(parsed.properties.chart_title.as_deref(), Some("Phanerozoic"));
        assert_eq!(parsed.properties.vertical_scale, None);
    }

    #[test]
    fn metacolumn_and_title_tokens_spliced() {
        let text = "Group\t:\tA\t_METACOLUMN_OFF\tB\t_TITLE_OFF\n";
        let parsed = parse(text, ParseMode::Strict).unwrap();
        let group = &parsed.columns.roots["Group"];
        assert!(!group.on);
        assert!(!group.enable_title);
        let names: Vec<&String> = group.children.keys().collect();
        assert_eq!(names, ["A", "B"]);
    }

    #[test]
    fn group_aggregates_child_age_ranges() {
        let text = concat!(
            "Stages\t:\tUpper\tLower\n",
            "Upper\tblock\t150\n",
            "\tTOP\t100.0\n",
            "\tBase\t120.0\n",
            "Lower\tblock\t150\n",
            "\tTOP\t120.0\n",
            "\tBase\t200.0\n",
        );
        let parsed = parse(text, ParseMode::Strict).unwrap();
        let stages = &parsed.columns.roots["Stages"];
        assert_eq!(stages.min_age, 100.0);
        assert_eq!(stages.max_age, 200.0);
    }

    #[test]
    fn shallow_child_is_alias_not_tree_node() {
        let text = concat!(
            "Reef Map\t:\tReef One - shallow\n",
            "Reef One\tfacies\t150\n",
            "\tsandstone\t\t12.0\n",
        );
        let parsed = parse(text, ParseMode::Strict).unwrap();
        let map = &parsed.columns.roots["Reef Map"];
        assert!(map.children.is_empty());
        assert_eq!(
            parsed.facies.get("Reef Map").map(Vec::len),
            Some(1),
            "facies resolved through the shallow alias"
        );
    }

    #[test]
    fn empty_input_is_no_columns() {
        let err = parse("", ParseMode::Strict).unwrap_err();
        assert!(matches!(err, DatapackError::NoColumns));
        let parsed = parse("", ParseMode::Lenient).unwrap();
        assert_eq!(parsed, DatapackParse::default());
    }

    #[test]
    fn lone_columns_become_extra_roots_in_order() {
        let text = concat!(
            "First\tevent\t150\n",
            "\tLAD X\t10.0\n",
            "Second\tpoint\t150\n",
            "\t5.0\t1.2\n",
        );
        let parsed = parse(text, ParseMode::Strict).unwrap();
        let roots: Vec<&String> = parsed.columns.roots.keys().collect();
        assert_eq!(roots, ["First", "Second"]);
    }
}
