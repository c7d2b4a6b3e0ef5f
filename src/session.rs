use std::path::Path;

use chrono::Utc;
use log::{info, warn};
use thiserror::Error;

use crate::database::{Database, PaperRow, ResultSet};
use crate::filter::{build_query, FilterSpec, ValidationError, MAX_RESULT_ROWS};
use crate::paginator::PageState;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no database is open; pick a database file first")]
    DatabaseUnavailable,
    #[error(transparent)]
    InvalidFilter(#[from] ValidationError),
    #[error("query failed: {0}")]
    Query(#[from] rusqlite::Error),
    #[error("export failed: {0}")]
    Export(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Zero matching rows. Informational, not an error.
    Empty,
    Results { total: usize, truncated: bool },
}

/// Owns the database handle, the current result set, the page state, and the
/// row selection. Every operation the UI can trigger goes through here; a
/// failed search or navigation never leaves the fields out of step with each
/// other.
pub struct Session {
    db: Option<Database>,
    results: ResultSet,
    page: PageState,
    selected: Option<usize>,
}

impl Session {
    pub fn new(db: Option<Database>, page_size: usize) -> Self {
        Session {
            db,
            results: ResultSet::default(),
            page: PageState::new(0, page_size),
            selected: None,
        }
    }

    pub fn has_database(&self) -> bool {
        self.db.is_some()
    }

    fn database(&self) -> Result<&Database, SessionError> {
        self.db.as_ref().ok_or(SessionError::DatabaseUnavailable)
    }

    /// Swap in a different database (or none), dropping the current results.
    pub fn replace_database(&mut self, db: Option<Database>) {
        self.db = db;
        self.results = ResultSet::default();
        self.page = PageState::new(0, self.page.page_size());
        self.selected = None;
    }

    /// Release the connection. rusqlite closes on drop.
    pub fn close_database(&mut self) {
        if self.db.take().is_some() {
            info!("database connection closed");
        }
    }

    pub fn event_types(&self) -> Result<Vec<String>, SessionError> {
        Ok(self.database()?.event_types()?)
    }

    pub fn paper_count(&self) -> Result<usize, SessionError> {
        Ok(self.database()?.paper_count()?)
    }

    /// Run one search. On success the previous result set is replaced
    /// wholesale, the pager resets to page 1, and the selection clears. On
    /// any error the previous results, page, and selection stay as they were.
    pub fn search(&mut self, filter: &FilterSpec) -> Result<SearchOutcome, SessionError> {
        let query = build_query(filter)?;
        let db = self.database()?;
        let mut rows = db.search(&query)?;

        let truncated = rows.len() > MAX_RESULT_ROWS;
        if truncated {
            rows.truncate(MAX_RESULT_ROWS);
            warn!(
                "search exceeded the {} row cap; result truncated",
                MAX_RESULT_ROWS
            );
        }

        let total = rows.len();
        self.results = ResultSet::new(rows, truncated);
        self.page = PageState::new(total, self.page.page_size());
        self.selected = None;

        if total == 0 {
            Ok(SearchOutcome::Empty)
        } else {
            Ok(SearchOutcome::Results { total, truncated })
        }
    }

    pub fn results(&self) -> &ResultSet {
        &self.results
    }

    pub fn page(&self) -> PageState {
        self.page
    }

    /// Rows of the current page, in display order.
    pub fn current_slice(&self) -> &[PaperRow] {
        &self.results.rows()[self.page.page_range()]
    }

    pub fn goto_page(&mut self, page: usize) {
        if self.page.goto(page) {
            self.selected = None;
        }
    }

    pub fn first_page(&mut self) {
        if self.page.first() {
            self.selected = None;
        }
    }

    pub fn previous_page(&mut self) {
        if self.page.previous() {
            self.selected = None;
        }
    }

    pub fn next_page(&mut self) {
        if self.page.next() {
            self.selected = None;
        }
    }

    pub fn last_page(&mut self) {
        if self.page.last() {
            self.selected = None;
        }
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        if page_size.max(1) != self.page.page_size() {
            self.page.resize(page_size);
            self.selected = None;
        }
    }

    /// Select a row by its 0-based position on the current page, returning
    /// the row's 1-based absolute index. Out-of-slice indexes are ignored.
    pub fn select_row(&mut self, local_index: usize) -> Option<usize> {
        let absolute = self.page.absolute_index(local_index)?;
        self.selected = Some(absolute);
        Some(absolute)
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_row(&self) -> Option<&PaperRow> {
        self.results.get(self.selected?)
    }

    /// Write the current result set to a CSV file. The full paper text is
    /// left out; it is unwieldy in a spreadsheet.
    pub fn export_csv(&self, path: &Path) -> Result<usize, SessionError> {
        let mut writer = csv::Writer::from_path(path)
            .map_err(|e| SessionError::Export(format!("failed to create {}: {}", path.display(), e)))?;

        writer
            .write_record(["PaperId", "Authors", "EventType", "Title", "imgfile"])
            .map_err(|e| SessionError::Export(format!("failed to write headers: {}", e)))?;

        for row in self.results.rows() {
            writer
                .write_record([
                    row.paper_id.to_string().as_str(),
                    &row.authors,
                    &row.event_type,
                    &row.title,
                    &row.img_file,
                ])
                .map_err(|e| SessionError::Export(format!("failed to write record: {}", e)))?;
        }

        writer
            .flush()
            .map_err(|e| SessionError::Export(format!("failed to flush: {}", e)))?;

        Ok(self.results.len())
    }

    pub fn default_export_name() -> String {
        format!("papers_{}.csv", Utc::now().format("%Y-%m-%d"))
    }
}
