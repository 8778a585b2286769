//! Column model for parsed datapacks
//!
//! A datapack parses into a forest of [`ColumnInfo`] nodes. Group columns
//! carry children in file order; leaf columns carry the typed rows of their
//! column type.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// 0-255 color triple used by column headers and block rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// White, the datapack default
    #[inline]
    #[must_use]
    pub const fn white() -> Self {
        Self { r: 255, g: 255, b: 255 }
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::white()
    }
}

/// Interval boundary line style
///
/// Unrecognized tokens fall back to `Solid`, matching the renderer's
/// behavior for malformed style fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

impl LineStyle {
    /// Parse a style token, falling back to `Solid` for anything else
    #[must_use]
    pub fn from_token(token: &str) -> Self {
        match token {
            "dashed" => Self::Dashed,
            "dotted" => Self::Dotted,
            _ => Self::Solid,
        }
    }
}

/// Fossil abundance markers used by range rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Abundance {
    /// `TOP` doubles as the interval-top sentinel
    #[default]
    Top,
    Missing,
    Rare,
    Common,
    Frequent,
    Abundant,
    Sample,
    Flood,
}

impl Abundance {
    /// Parse an abundance token; `None` for unrecognized values
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "TOP" => Some(Self::Top),
            "missing" => Some(Self::Missing),
            "rare" => Some(Self::Rare),
            "common" => Some(Self::Common),
            "frequent" => Some(Self::Frequent),
            "abundant" => Some(Self::Abundant),
            "sample" => Some(Self::Sample),
            "flood" => Some(Self::Flood),
            _ => None,
        }
    }
}

/// One interval row of a block column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubBlockInfo {
    pub label: String,
    pub age: f64,
    pub popup: String,
    pub line_style: LineStyle,
    pub rgb: Rgb,
}

/// One rock-type/time row of a facies column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubFaciesInfo {
    pub rock_type: String,
    pub label: Option<String>,
    pub age: f64,
    pub info: String,
}

/// One dated event row of an event column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubEventInfo {
    pub label: String,
    pub age: f64,
    pub line_style: LineStyle,
    pub popup: String,
}

/// One occurrence row of a range column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubRangeInfo {
    pub label: String,
    pub age: f64,
    pub abundance: Abundance,
    pub popup: String,
}

/// One polarity row of a chron column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubChronInfo {
    pub polarity: String,
    pub label: Option<String>,
    pub age: f64,
    pub popup: String,
}

/// One boundary row of a sequence column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubSequenceInfo {
    pub label: Option<String>,
    pub direction: String,
    pub age: f64,
    pub severity: String,
    pub popup: String,
}

/// One sample row of a point column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubPointInfo {
    pub age: f64,
    pub x_val: f64,
    pub popup: String,
}

/// Typed payload of a column, discriminated by column type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ColumnData {
    /// Group declared by a `parent\t:\tchildren` line; rows live on leaves
    Group,
    Blank,
    Block { rows: Vec<SubBlockInfo> },
    Facies { rows: Vec<SubFaciesInfo> },
    Event { rows: Vec<SubEventInfo> },
    Range { rows: Vec<SubRangeInfo> },
    Chron { rows: Vec<SubChronInfo> },
    Sequence { rows: Vec<SubSequenceInfo> },
    Point { rows: Vec<SubPointInfo> },
}

/// One column (or column group) of a datapack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Unique key within the parent scope
    pub name: String,
    /// User-displayable name, initially equal to `name`
    pub edit_name: String,
    /// Visibility toggle
    pub on: bool,
    /// Whether the column title renders
    pub enable_title: bool,
    /// Free-text annotation shown on hover
    pub popup: String,
    /// Name of the parent column; `None` at root. Weak back-reference,
    /// not an ownership edge.
    pub parent: Option<String>,
    /// Minimum age over this column's rows (and children, for groups)
    pub min_age: f64,
    /// Maximum age over this column's rows (and children, for groups)
    pub max_age: f64,
    pub width: f64,
    pub rgb: Rgb,
    /// Children keyed by name, in datapack file order
    pub children: IndexMap<String, ColumnInfo>,
    pub data: ColumnData,
}

impl ColumnInfo {
    /// New column with header defaults (white, width 100, on, titled)
    #[must_use]
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        let name = name.into();
        Self {
            edit_name: name.clone(),
            name,
            on: true,
            enable_title: true,
            popup: String::new(),
            parent: None,
            min_age: f64::MAX,
            max_age: f64::MIN,
            width: 100.0,
            rgb: Rgb::white(),
            children: IndexMap::new(),
            data,
        }
    }

    /// Whether any row data or child carries a meaningful age range
    #[inline]
    #[must_use]
    pub fn has_age_range(&self) -> bool {
        self.min_age <= self.max_age
    }

    /// Fold another age range into this column's
    pub(crate) fn widen_age_range(&mut self, min_age: f64, max_age: f64) {
        self.min_age = self.min_age.min(min_age);
        self.max_age = self.max_age.max(max_age);
    }
}

/// The root-level columns of a parsed datapack, in file order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnTree {
    pub roots: IndexMap<String, ColumnInfo>,
}

impl ColumnTree {
    /// Number of columns in the whole tree
    #[must_use]
    pub fn len(&self) -> usize {
        fn count(col: &ColumnInfo) -> usize {
            1 + col.children.values().map(count).sum::<usize>()
        }
        self.roots.values().map(count).sum()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Find a column by name anywhere in the tree
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&ColumnInfo> {
        self.path_to(name)
            .and_then(|path| self.resolve(&path))
    }

    /// Toggle a column's visibility
    ///
    /// Turning a column on forces every ancestor on as well; turning one
    /// off leaves ancestors untouched. Activation is monotonic upward.
    ///
    /// Returns `false` if no column with that name exists.
    pub fn set_on(&mut self, name: &str, on: bool) -> bool {
        let Some(path) = self.path_to(name) else {
            return false;
        };
        let mut current = &mut self.roots;
        for (depth, segment) in path.iter().enumerate() {
            let Some(col) = current.get_mut(segment) else {
                return false;
            };
            let is_target = depth + 1 == path.len();
            if is_target {
                col.on = on;
            } else if on {
                // ancestors are forced on, never forced off
                col.on = true;
            }
            current = &mut col.children;
        }
        true
    }

    /// Root-to-target name path for a column
    fn path_to(&self, name: &str) -> Option<Vec<String>> {
        fn walk(col: &ColumnInfo, name: &str, path: &mut Vec<String>) -> bool {
            path.push(col.name.clone());
            if col.name == name {
                return true;
            }
            for child in col.children.values() {
                if walk(child, name, path) {
                    return true;
                }
            }
            path.pop();
            false
        }
        let mut path = Vec::new();
        for root in self.roots.values() {
            if walk(root, name, &mut path) {
                return Some(path);
            }
        }
        None
    }

    fn resolve(&self, path: &[String]) -> Option<&ColumnInfo> {
        let (first, rest) = path.split_first()?;
        let mut col = self.roots.get(first)?;
        for segment in rest {
            col = col.children.get(segment)?;
        }
        Some(col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with_group() -> ColumnTree {
        let mut parent = ColumnInfo::new("Parent", ColumnData::Group);
        parent.on = false;
        let mut child = ColumnInfo::new("Child", ColumnData::Blank);
        child.on = false;
        child.parent = Some("Parent".to_string());
        parent.children.insert("Child".to_string(), child);
        let mut tree = ColumnTree::default();
        tree.roots.insert("Parent".to_string(), parent);
        tree
    }

    #[test]
    fn set_on_forces_ancestors_on() {
        let mut tree = tree_with_group();
        assert!(tree.set_on("Child", true));
        assert!(tree.find("Child").unwrap().on);
        assert!(tree.find("Parent").unwrap().on);
    }

    #[test]
    fn set_off_leaves_ancestors_alone() {
        let mut tree = tree_with_group();
        tree.set_on("Child", true);
        assert!(tree.set_on("Child", false));
        assert!(!tree.find("Child").unwrap().on);
        assert!(tree.find("Parent").unwrap().on);
    }

    #[test]
    fn set_on_unknown_column() {
        let mut tree = tree_with_group();
        assert!(!tree.set_on("Missing", true));
    }

    #[test]
    fn line_style_fallback() {
        assert_eq!(LineStyle::from_token("dashed"), LineStyle::Dashed);
        assert_eq!(LineStyle::from_token("2"), LineStyle::Solid);
    }

    #[test]
    fn abundance_tokens() {
        assert_eq!(Abundance::from_token("TOP"), Some(Abundance::Top));
        assert_eq!(Abundance::from_token("flood"), Some(Abundance::Flood));
        assert_eq!(Abundance::from_token("bogus"), None);
    }
}
