/// File categorization by extension.
///
/// This module maps file extensions to named categories (e.g. "Documents",
/// "Images"). The table is an explicit value handed to the scanner so that
/// classification stays a pure lookup; it can be replaced wholesale from the
/// configuration file.
///
/// # Examples
///
/// ```
/// use tidyplan::file_category::CategoryTable;
///
/// let table = CategoryTable::default();
/// assert_eq!(table.classify(".pdf"), "Documents");
/// assert_eq!(table.classify("PNG"), "Images");
/// assert_eq!(table.classify(".unknown"), "Other");
/// ```
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

/// Category assigned to files whose extension is not in the table.
pub const FALLBACK_CATEGORY: &str = "Other";

/// One row of the category table as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    /// Category name, also used as the directory name under the target base.
    pub name: String,
    /// Extensions belonging to this category, with or without a leading dot.
    #[serde(default)]
    pub extensions: Vec<String>,
}

impl CategoryRule {
    fn new(name: &str, extensions: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
        }
    }
}

/// Built-in category rules, in the order categories are reported.
pub fn default_rules() -> Vec<CategoryRule> {
    vec![
        CategoryRule::new(
            "Documents",
            &[
                ".pdf", ".doc", ".docx", ".txt", ".rtf", ".odt", ".xls", ".xlsx", ".ppt", ".pptx",
            ],
        ),
        CategoryRule::new(
            "Images",
            &[
                ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".svg", ".webp", ".ico", ".tiff", ".heic",
            ],
        ),
        CategoryRule::new(
            "Videos",
            &[".mp4", ".mov", ".avi", ".mkv", ".wmv", ".flv", ".webm", ".m4v"],
        ),
        CategoryRule::new(
            "Archives",
            &[".zip", ".tar", ".gz", ".rar", ".7z", ".bz2", ".xz", ".dmg"],
        ),
        CategoryRule::new(
            "Code",
            &[
                ".py", ".js", ".ts", ".jsx", ".tsx", ".java", ".cpp", ".c", ".h", ".go", ".rs",
                ".rb", ".php", ".swift",
            ],
        ),
        CategoryRule::new("Apps", &[".app", ".pkg", ".dmg", ".exe", ".msi"]),
        CategoryRule::new("Audio", &[".mp3", ".wav", ".flac", ".aac", ".ogg", ".m4a"]),
    ]
}

/// Maps file extensions to category names.
///
/// Lookups are case-insensitive and ignore a leading dot. When an extension
/// is listed under more than one category, the first category wins.
#[derive(Debug, Clone)]
pub struct CategoryTable {
    names: Vec<String>,
    extension_map: HashMap<String, usize>,
}

impl CategoryTable {
    /// Creates an empty table: every file classifies as [`FALLBACK_CATEGORY`].
    pub fn new() -> Self {
        Self {
            names: Vec::new(),
            extension_map: HashMap::new(),
        }
    }

    /// Builds a table from configuration rules, preserving their order.
    pub fn from_rules(rules: &[CategoryRule]) -> Self {
        let mut table = Self::new();
        for rule in rules {
            table.add_category(&rule.name);
            for ext in &rule.extensions {
                table.add_extension_mapping(ext, &rule.name);
            }
        }
        table
    }

    fn add_category(&mut self, name: &str) -> usize {
        match self.names.iter().position(|n| n == name) {
            Some(index) => index,
            None => {
                self.names.push(name.to_string());
                self.names.len() - 1
            }
        }
    }

    /// Adds an extension to category mapping. Existing mappings are kept.
    pub fn add_extension_mapping(&mut self, ext: &str, category: &str) {
        let index = self.add_category(category);
        let key = normalize_extension(ext);
        if !key.is_empty() {
            self.extension_map.entry(key).or_insert(index);
        }
    }

    /// Returns the category for an extension, or [`FALLBACK_CATEGORY`].
    ///
    /// # Examples
    ///
    /// ```
    /// use tidyplan::file_category::CategoryTable;
    ///
    /// let table = CategoryTable::default();
    /// assert_eq!(table.classify(".DMG"), "Archives");
    /// assert_eq!(table.classify(""), "Other");
    /// ```
    pub fn classify(&self, extension: &str) -> &str {
        self.extension_map
            .get(&normalize_extension(extension))
            .map(|&index| self.names[index].as_str())
            .unwrap_or(FALLBACK_CATEGORY)
    }

    /// Category names in table order, followed by the fallback category.
    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        let fallback_listed = self.names.iter().any(|n| n == FALLBACK_CATEGORY);
        self.names
            .iter()
            .map(String::as_str)
            .chain((!fallback_listed).then_some(FALLBACK_CATEGORY))
    }

    /// All extensions known to the table, normalized.
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.extension_map.keys().map(String::as_str)
    }
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self::from_rules(&default_rules())
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_lowercase()
}

/// A map keyed by category name that keeps insertion order.
///
/// Serialized as a JSON object; deserialization keeps the order in which the
/// keys appear in the document, so category order survives a round trip
/// through disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMap<V> {
    entries: Vec<(String, V)>,
}

impl<V> CategoryMap<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn get(&self, category: &str) -> Option<&V> {
        self.entries
            .iter()
            .find(|(name, _)| name == category)
            .map(|(_, value)| value)
    }

    pub fn get_mut(&mut self, category: &str) -> Option<&mut V> {
        self.entries
            .iter_mut()
            .find(|(name, _)| name == category)
            .map(|(_, value)| value)
    }

    /// Inserts or replaces the value for a category. A replaced entry keeps
    /// its original position.
    pub fn insert(&mut self, category: impl Into<String>, value: V) {
        let category = category.into();
        match self.get_mut(&category) {
            Some(slot) => *slot = value,
            None => self.entries.push((category, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for CategoryMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Serialize> Serialize for CategoryMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(name, value)| (name, value)))
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for CategoryMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(CategoryMapVisitor(PhantomData))
    }
}

struct CategoryMapVisitor<V>(PhantomData<V>);

impl<'de, V: Deserialize<'de>> Visitor<'de> for CategoryMapVisitor<V> {
    type Value = CategoryMap<V>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map keyed by category name")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut map = CategoryMap::new();
        while let Some((name, value)) = access.next_entry::<String, V>()? {
            map.insert(name, value);
        }
        Ok(map)
    }
}
