//! Search contract over the profiles table
//!
//! Case-insensitive substring match across [`SEARCHABLE_FIELDS`]. The term
//! is always bound as a parameter; `%`, `_` and `\` in the term match
//! themselves. Case folding is SQLite's built-in `LIKE` folding, which only
//! covers ASCII letters.

/// Columns a search term is matched against
pub const SEARCHABLE_FIELDS: [&str; 5] = ["full_name", "profession", "expertise", "city", "country"];

const ESCAPE_CHAR: char = '\\';

/// A non-blank search term ready to bind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    term: String,
}

impl SearchQuery {
    /// Returns `None` for an empty or blank term, which matches nothing
    pub fn parse(term: &str) -> Option<Self> {
        let term = term.trim();
        if term.is_empty() {
            None
        } else {
            Some(Self {
                term: term.to_string(),
            })
        }
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    /// `%<escaped term>%`
    pub fn like_pattern(&self) -> String {
        format!("%{}%", escape_like(&self.term))
    }

    /// `WHERE` body with one placeholder per searchable field
    pub fn where_clause() -> String {
        SEARCHABLE_FIELDS
            .iter()
            .map(|field| format!("{} LIKE ? ESCAPE '{}'", field, ESCAPE_CHAR))
            .collect::<Vec<_>>()
            .join(" OR ")
    }
}

/// Escape LIKE wildcards so they match literally
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | ESCAPE_CHAR) {
            escaped.push(ESCAPE_CHAR);
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_terms_match_nothing() {
        assert_eq!(SearchQuery::parse(""), None);
        assert_eq!(SearchQuery::parse("  \t "), None);
    }

    #[test]
    fn test_term_is_trimmed() {
        let query = SearchQuery::parse("  engineer ").unwrap();
        assert_eq!(query.term(), "engineer");
        assert_eq!(query.like_pattern(), "%engineer%");
    }

    #[test]
    fn test_wildcards_are_escaped() {
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("c:\\dir"), "c:\\\\dir");
    }

    #[test]
    fn test_where_clause_covers_every_field() {
        let clause = SearchQuery::where_clause();
        assert_eq!(clause.matches('?').count(), SEARCHABLE_FIELDS.len());
        assert!(clause.starts_with("full_name LIKE ? ESCAPE '\\'"));
    }
}
