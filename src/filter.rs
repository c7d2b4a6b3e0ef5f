use thiserror::Error;

/// Upper bound on rows materialized by a single search. Queries ask for one
/// row more so truncation can be detected without a second query.
pub const MAX_RESULT_ROWS: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordField {
    Title,
    Abstract,
    PaperText,
}

impl KeywordField {
    fn column(self) -> &'static str {
        match self {
            KeywordField::Title => "Title",
            KeywordField::Abstract => "Abstract",
            KeywordField::PaperText => "PaperText",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            KeywordField::Title => "Title",
            KeywordField::Abstract => "Abstract",
            KeywordField::PaperText => "Paper text",
        }
    }
}

/// Search criteria as read from the filter inputs. `event_type` of `None`
/// means unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    pub author_substring: String,
    pub keyword_substring: String,
    pub keyword_fields: Vec<KeywordField>,
    pub event_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("a keyword was given but no search field is ticked")]
    NoKeywordScope,
}

/// A ready-to-run statement. User input only ever reaches the database
/// through `params`, one bound value per `?` placeholder in `sql`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlQuery {
    pub sql: String,
    pub params: Vec<String>,
}

/// Assemble the paper search statement for `filter`.
///
/// The author predicate applies inside a sub-select that groups author names
/// per paper, so a restricted author search also narrows the Authors column
/// to the matching names. Event-type and keyword predicates apply to the
/// joined rows. Empty inputs degrade to `1 = 1`.
pub fn build_query(filter: &FilterSpec) -> Result<SqlQuery, ValidationError> {
    let mut params = Vec::new();

    // Params must be pushed in the textual order of their placeholders:
    // author (sub-select), then event type, then keyword fields.
    let author = filter.author_substring.trim();
    let cond_author = if author.is_empty() {
        "1 = 1".to_string()
    } else {
        params.push(like_pattern(author));
        "Name LIKE ? ESCAPE '\\'".to_string()
    };

    let event_type = filter.event_type.as_deref().map(str::trim);
    let cond_event_type = match event_type {
        None | Some("") => "1 = 1".to_string(),
        Some(event_type) => {
            params.push(event_type.to_string());
            "EventType = ?".to_string()
        }
    };

    let keyword = filter.keyword_substring.trim();
    let cond_keyword = if keyword.is_empty() {
        "1 = 1".to_string()
    } else if filter.keyword_fields.is_empty() {
        return Err(ValidationError::NoKeywordScope);
    } else {
        let pattern = like_pattern(keyword);
        let predicates: Vec<String> = filter
            .keyword_fields
            .iter()
            .map(|field| {
                params.push(pattern.clone());
                format!("{} LIKE ? ESCAPE '\\'", field.column())
            })
            .collect();
        format!("({})", predicates.join(" OR "))
    };

    let sql = format!(
        "SELECT PaperId, Authors, EventType, Title, Abstract, PaperText, imgfile \
         FROM \"Papers\" \
         INNER JOIN ( \
             SELECT PaperAuthors.PaperId AS PaperId, group_concat(Authors.Name, ',') AS Authors \
             FROM \"PaperAuthors\" \
             INNER JOIN \"Authors\" ON PaperAuthors.AuthorId = Authors.Id \
             WHERE {cond_author} \
             GROUP BY PaperId \
         ) ON Papers.Id = PaperId \
         WHERE {cond_event_type} AND {cond_keyword} \
         LIMIT {limit}",
        limit = MAX_RESULT_ROWS + 1,
    );

    Ok(SqlQuery { sql, params })
}

/// Wrap `input` in `%` wildcards, escaping LIKE metacharacters so the user's
/// text matches literally.
fn like_pattern(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len() + 2);
    escaped.push('%');
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}
