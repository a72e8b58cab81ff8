// 🔎 Lookup queries - OR-combined exact-match filters
//
// A query is a plain predicate: a tracker qualifies when ANY filter matches
// exactly. The same value can be evaluated in memory or rendered to SQL.

use crate::entities::Tracker;
use crate::error::Result;

/// Columns a lookup may filter on
const SEARCHABLE_COLUMNS: [&str; 3] = ["name", "code_signature", "network_signature"];

#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    /// None never matches (stored fields are never null)
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LookupQuery {
    pub any_of: Vec<FieldFilter>,
    /// Restrict to trackers already published to Exodus
    pub published_only: bool,
}

impl LookupQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn or_exact(mut self, field: &str, value: Option<&str>) -> Self {
        self.any_of.push(FieldFilter {
            field: field.to_string(),
            value: value.map(str::to_string),
        });
        self
    }

    pub fn published_only(mut self) -> Self {
        self.published_only = true;
        self
    }

    /// In-memory evaluation
    pub fn matches(&self, tracker: &Tracker) -> bool {
        if self.published_only && !tracker.is_in_exodus {
            return false;
        }
        self.any_of.iter().any(|filter| match &filter.value {
            Some(expected) => tracker.field_value(&filter.field).as_deref() == Some(expected),
            None => false,
        })
    }

    /// WHERE clause and its positional parameters
    ///
    /// Unknown fields and null values drop out of the OR; an empty OR
    /// matches nothing.
    pub fn to_sql(&self) -> (String, Vec<String>) {
        let mut clauses = Vec::new();
        let mut params = Vec::new();

        for filter in &self.any_of {
            if !SEARCHABLE_COLUMNS.contains(&filter.field.as_str()) {
                continue;
            }
            if let Some(value) = &filter.value {
                params.push(value.clone());
                clauses.push(format!("{} = ?{}", filter.field, params.len()));
            }
        }

        let any = if clauses.is_empty() {
            "0".to_string()
        } else {
            format!("({})", clauses.join(" OR "))
        };

        let sql = if self.published_only {
            format!("is_in_exodus = 1 AND {}", any)
        } else {
            any
        };

        (sql, params)
    }
}

// ============================================================================
// LOCAL STORE SEAM
// ============================================================================

/// What the reconciler needs from the local store
pub trait TrackerLookup {
    fn count_published(&self) -> Result<usize>;
    fn find_matching(&self, query: &LookupQuery) -> Result<Vec<Tracker>>;
}

/// Linear scan over an in-memory list
impl TrackerLookup for [Tracker] {
    fn count_published(&self) -> Result<usize> {
        Ok(self.iter().filter(|t| t.is_in_exodus).count())
    }

    fn find_matching(&self, query: &LookupQuery) -> Result<Vec<Tracker>> {
        Ok(self.iter().filter(|t| query.matches(t)).cloned().collect())
    }
}

impl TrackerLookup for Vec<Tracker> {
    fn count_published(&self) -> Result<usize> {
        self.as_slice().count_published()
    }

    fn find_matching(&self, query: &LookupQuery) -> Result<Vec<Tracker>> {
        self.as_slice().find_matching(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> LookupQuery {
        LookupQuery::new()
            .or_exact("name", Some("tracker_1"))
            .or_exact("code_signature", Some("code_1"))
            .published_only()
    }

    #[test]
    fn test_matches_on_either_field() {
        let by_name = Tracker::new("tracker_1").with_signatures("other", "").in_exodus(true);
        let by_code = Tracker::new("other").with_signatures("code_1", "").in_exodus(true);
        let neither = Tracker::new("other").with_signatures("code_2", "").in_exodus(true);

        assert!(query().matches(&by_name));
        assert!(query().matches(&by_code));
        assert!(!query().matches(&neither));
    }

    #[test]
    fn test_unpublished_trackers_never_match() {
        let local_only = Tracker::new("tracker_1").with_signatures("code_1", "");
        assert!(!query().matches(&local_only));
    }

    #[test]
    fn test_null_value_never_matches() {
        let query = LookupQuery::new().or_exact("name", None);
        let tracker = Tracker::new("");
        assert!(!query.matches(&tracker));
        assert_eq!(query.to_sql().0, "0");
    }

    #[test]
    fn test_sql_rendering() {
        let (sql, params) = query().to_sql();
        assert_eq!(sql, "is_in_exodus = 1 AND (name = ?1 OR code_signature = ?2)");
        assert_eq!(params, vec!["tracker_1", "code_1"]);
    }

    #[test]
    fn test_sql_ignores_unknown_columns() {
        let (sql, params) = LookupQuery::new()
            .or_exact("name; DROP TABLE trackers", Some("x"))
            .or_exact("name", Some("y"))
            .to_sql();
        assert_eq!(sql, "(name = ?1)");
        assert_eq!(params, vec!["y"]);
    }

    #[test]
    fn test_slice_lookup() {
        let trackers = vec![
            Tracker::new("tracker_1").with_signatures("code_1", "").in_exodus(true),
            Tracker::new("tracker_2").with_signatures("code_1", "").in_exodus(true),
            Tracker::new("tracker_3").with_signatures("code_3", ""),
        ];
        assert_eq!(trackers.count_published().unwrap(), 2);
        assert_eq!(trackers.find_matching(&query()).unwrap().len(), 2);
    }
}
