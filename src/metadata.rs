//! Metadata table: one display record per rating event.
//!
//! The table keeps every row it was built from, in order. Several rows may
//! carry the same title (one per user who rated it); lookups by title always
//! return the first of them.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Publication year as it appears in the source data.
///
/// The Book-Crossing dumps mix numeric years with free text ("0", "unknown"),
/// so both shapes are kept verbatim. The enum is externally tagged because
/// postcard payloads are not self-describing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Year {
    Numeric(i32),
    Text(String),
}

impl fmt::Display for Year {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Year::Numeric(y) => write!(f, "{y}"),
            Year::Text(s) => f.write_str(s),
        }
    }
}

impl From<i32> for Year {
    fn from(y: i32) -> Self {
        Year::Numeric(y)
    }
}

impl From<&str> for Year {
    fn from(s: &str) -> Self {
        Year::Text(s.to_string())
    }
}

/// One row of the metadata table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub title: String,
    /// Cover image URL, possibly empty.
    pub image_url: String,
    pub author: String,
    pub year: Year,
    pub isbn: String,
    pub publisher: String,
    pub rating: f32,
}

/// Read-only table of [`RatingRecord`]s with a first-match title lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<RatingRecord>", into = "Vec<RatingRecord>")]
pub struct MetadataTable {
    records: Vec<RatingRecord>,
    /// Title -> row of its first record.
    first_row: HashMap<String, usize>,
}

impl MetadataTable {
    /// Build the table, indexing the first record of every title.
    pub fn new(records: Vec<RatingRecord>) -> Self {
        let mut first_row = HashMap::with_capacity(records.len());
        for (row, record) in records.iter().enumerate() {
            first_row.entry(record.title.clone()).or_insert(row);
        }
        Self { records, first_row }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in table order.
    pub fn records(&self) -> &[RatingRecord] {
        &self.records
    }

    /// Number of distinct titles.
    pub fn num_titles(&self) -> usize {
        self.first_row.len()
    }

    /// First record whose title equals `title` exactly.
    pub fn first_by_title(&self, title: &str) -> Option<&RatingRecord> {
        self.first_row.get(title).map(|&row| &self.records[row])
    }

    /// The `n` highest-rated records, best first.
    ///
    /// The sort is stable, so records with equal ratings keep table order.
    /// Records whose rating is NaN never rank.
    pub fn top_rated(&self, n: usize) -> Vec<&RatingRecord> {
        if n == 0 {
            return Vec::new();
        }
        let mut ranked: Vec<&RatingRecord> =
            self.records.iter().filter(|r| !r.rating.is_nan()).collect();
        ranked.sort_by(|a, b| b.rating.total_cmp(&a.rating));
        ranked.truncate(n);
        ranked
    }
}

impl From<Vec<RatingRecord>> for MetadataTable {
    fn from(records: Vec<RatingRecord>) -> Self {
        Self::new(records)
    }
}

impl From<MetadataTable> for Vec<RatingRecord> {
    fn from(table: MetadataTable) -> Self {
        table.records
    }
}

impl FromIterator<RatingRecord> for MetadataTable {
    fn from_iter<I: IntoIterator<Item = RatingRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, author: &str, rating: f32) -> RatingRecord {
        RatingRecord {
            title: title.to_string(),
            image_url: format!("http://images.example/{title}.jpg"),
            author: author.to_string(),
            year: Year::Numeric(2001),
            isbn: "0000000000".to_string(),
            publisher: "Scholastic".to_string(),
            rating,
        }
    }

    #[test]
    fn first_by_title_returns_first_record() {
        let table = MetadataTable::new(vec![
            record("Dune", "Frank Herbert", 9.0),
            record("Emma", "Jane Austen", 7.0),
            record("Dune", "Somebody Else", 3.0),
        ]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.num_titles(), 2);
        let dune = table.first_by_title("Dune").expect("Dune indexed");
        assert_eq!(dune.author, "Frank Herbert");
        assert!(table.first_by_title("dune").is_none());
    }

    #[test]
    fn top_rated_is_stable_on_ties() {
        let table = MetadataTable::new(vec![
            record("a", "x", 5.0),
            record("b", "x", 9.0),
            record("c", "x", 5.0),
            record("d", "x", 9.0),
            record("e", "x", 1.0),
        ]);
        let titles: Vec<&str> = table
            .top_rated(4)
            .iter()
            .map(|r| r.title.as_str())
            .collect();
        assert_eq!(titles, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn top_rated_skips_nan_and_handles_small_tables() {
        let table = MetadataTable::new(vec![record("a", "x", f32::NAN), record("b", "x", 2.0)]);
        let top = table.top_rated(5);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].title, "b");
        assert!(table.top_rated(0).is_empty());
    }

    #[test]
    fn year_display() {
        assert_eq!(Year::Numeric(1999).to_string(), "1999");
        assert_eq!(Year::from("unknown").to_string(), "unknown");
        assert_eq!(Year::from(2004), Year::Numeric(2004));
    }

    #[test]
    fn serde_rebuilds_title_index() {
        let table = MetadataTable::new(vec![record("a", "x", 1.0), record("a", "y", 2.0)]);
        let json = serde_json::to_string(&table).expect("serialize");
        let back: MetadataTable = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.records(), table.records());
        assert_eq!(back.first_by_title("a").map(|r| r.author.as_str()), Some("x"));
    }
}
