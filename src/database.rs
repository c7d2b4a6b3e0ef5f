use rusqlite::{params_from_iter, Connection, OpenFlags, Result};

use crate::filter::SqlQuery;

pub struct Database {
    conn: Connection,
}

/// One materialized paper row. Nullable text columns come back as empty
/// strings so display code never deals with NULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperRow {
    pub paper_id: i64,
    pub authors: String,
    pub event_type: String,
    pub title: String,
    pub abstract_text: String,
    pub paper_text: String,
    pub img_file: String,
}

/// The full output of one search, with 1-based row numbering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    rows: Vec<PaperRow>,
    truncated: bool,
}

impl ResultSet {
    pub fn new(rows: Vec<PaperRow>, truncated: bool) -> Self {
        ResultSet { rows, truncated }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether the materialization cap cut the query short.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn rows(&self) -> &[PaperRow] {
        &self.rows
    }

    /// Look up a row by its 1-based absolute index.
    pub fn get(&self, absolute_index: usize) -> Option<&PaperRow> {
        absolute_index
            .checked_sub(1)
            .and_then(|idx| self.rows.get(idx))
    }
}

impl Database {
    /// Open an existing database read-only. A missing or unreadable file is
    /// an error here; the caller decides whether that is fatal.
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Database { conn })
    }

    /// Run one search statement and materialize every returned row.
    pub fn search(&self, query: &SqlQuery) -> Result<Vec<PaperRow>> {
        let mut stmt = self.conn.prepare(&query.sql)?;

        let rows = stmt.query_map(params_from_iter(query.params.iter()), |row| {
            Ok(PaperRow {
                paper_id: row.get(0)?,
                authors: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                event_type: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                title: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                abstract_text: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                paper_text: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                img_file: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
            })
        })?;

        rows.collect()
    }

    /// Distinct event types, sorted, for the filter dropdown.
    pub fn event_types(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT EventType FROM Papers WHERE EventType IS NOT NULL ORDER BY EventType",
        )?;

        let types = stmt.query_map([], |row| row.get(0))?;
        types.collect()
    }

    pub fn paper_count(&self) -> Result<usize> {
        self.conn
            .query_row("SELECT COUNT(*) FROM Papers", [], |row| row.get(0))
    }
}


#[cfg(test)]
mod tests {
    use super::test_fixture::{bulk_database, sample_database};
    use crate::filter::{build_query, FilterSpec, KeywordField, MAX_RESULT_ROWS};

    #[test]
    fn unfiltered_search_returns_every_authored_paper() {
        let db = sample_database();
        let query = build_query(&FilterSpec::default()).expect("empty filter is valid");
        let rows = db.search(&query).expect("search should succeed");

        assert_eq!(rows.len(), 5);
        // Paper 6 has no author rows, so the join drops it.
        assert!(rows.iter().all(|row| row.paper_id != 6));
    }

    #[test]
    fn author_filter_narrows_papers_and_the_authors_column() {
        let db = sample_database();
        let filter = FilterSpec {
            author_substring: "keller".to_string(),
            ..FilterSpec::default()
        };
        let query = build_query(&filter).expect("author filter is valid");
        let mut rows = db.search(&query).expect("search should succeed");
        rows.sort_by_key(|row| row.paper_id);

        let ids: Vec<i64> = rows.iter().map(|row| row.paper_id).collect();
        assert_eq!(ids, vec![1, 2]);
        // Only the matching author survives the grouped sub-select.
        assert_eq!(rows[0].authors, "Bob Keller");
    }

    #[test]
    fn multi_author_papers_concatenate_names() {
        let db = sample_database();
        let query = build_query(&FilterSpec::default()).expect("empty filter is valid");
        let rows = db.search(&query).expect("search should succeed");

        let paper_one = rows
            .iter()
            .find(|row| row.paper_id == 1)
            .expect("paper 1 should be present");
        assert!(paper_one.authors.contains("Alice Zhang"));
        assert!(paper_one.authors.contains("Bob Keller"));
        assert!(paper_one.authors.contains(','));
    }

    #[test]
    fn keyword_filter_respects_the_selected_fields() {
        let db = sample_database();

        // "wavelet" only appears in paper 3's full text.
        let mut filter = FilterSpec {
            keyword_substring: "wavelet".to_string(),
            keyword_fields: vec![KeywordField::PaperText],
            ..FilterSpec::default()
        };
        let query = build_query(&filter).expect("keyword filter is valid");
        let rows = db.search(&query).expect("search should succeed");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].paper_id, 3);

        filter.keyword_fields = vec![KeywordField::Title, KeywordField::Abstract];
        let query = build_query(&filter).expect("keyword filter is valid");
        let rows = db.search(&query).expect("search should succeed");
        assert!(rows.is_empty());
    }

    #[test]
    fn event_type_filter_is_an_exact_match() {
        let db = sample_database();
        let filter = FilterSpec {
            event_type: Some("Poster".to_string()),
            ..FilterSpec::default()
        };
        let query = build_query(&filter).expect("event filter is valid");
        let mut ids: Vec<i64> = db
            .search(&query)
            .expect("search should succeed")
            .iter()
            .map(|row| row.paper_id)
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 3, 5]);
    }

    #[test]
    fn like_wildcards_in_input_do_not_widen_the_match() {
        let db = sample_database();
        let filter = FilterSpec {
            keyword_substring: "%".to_string(),
            keyword_fields: vec![KeywordField::Title],
            ..FilterSpec::default()
        };
        let query = build_query(&filter).expect("keyword filter is valid");
        let rows = db.search(&query).expect("search should succeed");
        // No title contains a literal percent sign.
        assert!(rows.is_empty());
    }

    #[test]
    fn null_image_column_materializes_as_empty() {
        let db = sample_database();
        let query = build_query(&FilterSpec::default()).expect("empty filter is valid");
        let rows = db.search(&query).expect("search should succeed");

        let paper_three = rows
            .iter()
            .find(|row| row.paper_id == 3)
            .expect("paper 3 should be present");
        assert_eq!(paper_three.img_file, "");
    }

    #[test]
    fn event_types_are_distinct_and_sorted() {
        let db = sample_database();
        let types = db.event_types().expect("event types should load");
        assert_eq!(types, vec!["Oral", "Poster", "Spotlight"]);
    }

    #[test]
    fn paper_count_includes_authorless_papers() {
        let db = sample_database();
        assert_eq!(db.paper_count().expect("count should load"), 6);
    }

    #[test]
    fn search_fetches_at_most_one_row_past_the_cap() {
        let db = bulk_database(MAX_RESULT_ROWS + 10);
        let query = build_query(&FilterSpec::default()).expect("empty filter is valid");
        let rows = db.search(&query).expect("search should succeed");
        assert_eq!(rows.len(), MAX_RESULT_ROWS + 1);
    }

    #[test]
    fn open_fails_for_a_missing_file() {
        let result = super::Database::open("/nonexistent/papers.sqlite");
        assert!(result.is_err());
    }

    #[test]
    fn result_set_uses_one_based_indexing() {
        let db = sample_database();
        let query = build_query(&FilterSpec::default()).expect("empty filter is valid");
        let rows = db.search(&query).expect("search should succeed");
        let first_id = rows[0].paper_id;
        let results = super::ResultSet::new(rows, false);

        assert_eq!(results.len(), 5);
        assert!(results.get(0).is_none());
        assert_eq!(results.get(1).expect("row 1 exists").paper_id, first_id);
        assert!(results.get(6).is_none());
    }
}
