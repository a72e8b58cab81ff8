// 📐 Record validation - field-keyed checks run before every write
//
// Signatures must be whitespace-free regexes, documentation must be a
// space-separated list of absolute URLs, names must be unique.

use crate::db;
use crate::entities::Tracker;
use crate::error::{Result, ValidationErrors};
use regex::Regex;
use rusqlite::Connection;
use url::{Host, Url};

pub const MSG_REQUIRED: &str = "This field is required.";
pub const MSG_SPACES: &str = "Must not contain spaces";
pub const MSG_REGEX: &str = "Must be a valid regex";
pub const MSG_NAME_TAKEN: &str = "Tracker with this Name already exists.";

const URL_SCHEMES: [&str; 4] = ["http", "https", "ftp", "ftps"];

// ============================================================================
// FIELD CHECKS
// ============================================================================

/// Validate a signature field; empty signatures are allowed
pub fn check_signature(errors: &mut ValidationErrors, field: &str, signature: &str) {
    if signature.is_empty() {
        return;
    }
    if signature.chars().any(char::is_whitespace) {
        errors.add(field, MSG_SPACES);
    }
    if Regex::new(signature).is_err() {
        errors.add(field, MSG_REGEX);
    }
}

/// Absolute URL with a web scheme and a well-formed host
pub fn is_valid_url(candidate: &str) -> bool {
    let url = match Url::parse(candidate) {
        Ok(url) => url,
        Err(_) => return false,
    };

    if !URL_SCHEMES.contains(&url.scheme()) {
        return false;
    }

    match url.host() {
        Some(Host::Domain(domain)) => {
            !domain.is_empty()
                && domain.split('.').all(|label| {
                    !label.is_empty()
                        && !label.starts_with('-')
                        && !label.ends_with('-')
                        && label.chars().all(|c| c.is_alphanumeric() || c == '-')
                })
        }
        Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => true,
        None => false,
    }
}

fn check_documentation(errors: &mut ValidationErrors, documentation: &str) {
    for link in documentation.split(' ').filter(|link| !link.is_empty()) {
        if !is_valid_url(link) {
            errors.add("documentation", format!("Invalid URL: {}", link));
        }
    }
}

/// Checks that need no store access
pub fn validate_fields(tracker: &Tracker) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    if tracker.name.trim().is_empty() {
        errors.add("name", MSG_REQUIRED);
    }

    check_signature(&mut errors, "code_signature", &tracker.code_signature);
    check_signature(&mut errors, "network_signature", &tracker.network_signature);

    if !tracker.website.is_empty() && !is_valid_url(&tracker.website) {
        errors.add("website", "Enter a valid URL.");
    }

    check_documentation(&mut errors, &tracker.documentation);

    errors
}

/// Full validation including name uniqueness against the store
pub fn validate_tracker(conn: &Connection, tracker: &Tracker) -> Result<()> {
    let mut errors = validate_fields(tracker);

    if !tracker.name.is_empty() && db::tracker_name_exists(conn, &tracker.name, Some(tracker.id.as_str()))? {
        errors.add("name", MSG_NAME_TAKEN);
    }

    errors.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;

    fn tracker() -> Tracker {
        Tracker::new("tracker1").with_website("http://example.com")
    }

    #[test]
    fn test_without_signatures_is_valid() {
        assert!(validate_fields(&tracker()).is_empty());
    }

    #[test]
    fn test_incorrect_code_signature() {
        let t = tracker().with_signatures("*com.tracker.code", "");
        let errors = validate_fields(&t);
        assert_eq!(errors.field("code_signature"), &[MSG_REGEX.to_string()]);
    }

    #[test]
    fn test_incorrect_network_signature() {
        let t = tracker().with_signatures("", "*.com");
        let errors = validate_fields(&t);
        assert_eq!(errors.field("network_signature"), &[MSG_REGEX.to_string()]);
    }

    #[test]
    fn test_correct_signatures() {
        let t = tracker().with_signatures("com.tracker.code", "tracker.com");
        assert!(validate_fields(&t).is_empty());
    }

    #[test]
    fn test_space_in_signatures() {
        let t = tracker().with_signatures("com.toto | com.titi", "toto.com | titi.com");
        let errors = validate_fields(&t);
        assert!(errors.field("code_signature").contains(&MSG_SPACES.to_string()));
        assert!(errors.field("network_signature").contains(&MSG_SPACES.to_string()));
    }

    #[test]
    fn test_invalid_documentation_link() {
        let mut t = tracker();
        t.documentation = "toto.com".into();
        let errors = validate_fields(&t);
        assert_eq!(errors.field("documentation"), &["Invalid URL: toto.com".to_string()]);
    }

    #[test]
    fn test_invalid_documentation_links_glued_together() {
        let mut t = tracker();
        t.documentation = "https://toto.com;https://toto.com/doc".into();
        let errors = validate_fields(&t);
        assert_eq!(
            errors.field("documentation"),
            &["Invalid URL: https://toto.com;https://toto.com/doc".to_string()]
        );
    }

    #[test]
    fn test_correct_documentation_links() {
        let mut t = tracker();
        t.documentation = "https://toto.com".into();
        assert!(validate_fields(&t).is_empty());
        t.documentation = "https://toto.com https://toto.com/doc".into();
        assert!(validate_fields(&t).is_empty());
    }

    #[test]
    fn test_name_required() {
        let t = Tracker::new("  ");
        assert_eq!(validate_fields(&t).field("name"), &[MSG_REQUIRED.to_string()]);
    }

    #[test]
    fn test_invalid_website() {
        let t = Tracker::new("t").with_website("not a url");
        assert_eq!(validate_fields(&t).field("website").len(), 1);
    }

    #[test]
    fn test_name_already_existing() {
        let conn = Connection::open_in_memory().unwrap();
        db::setup_database(&conn).unwrap();

        let existing = Tracker::new("toto")
            .with_signatures("com.toto", "")
            .with_website("http://toto.com");
        db::insert_tracker(&conn, &existing, db::SYSTEM_ACTOR).unwrap();

        let duplicate = Tracker::new("toto")
            .with_signatures("com.toto.ads", "")
            .with_website("http://toto.com");

        match validate_tracker(&conn, &duplicate) {
            Err(CatalogError::Validation(errors)) => {
                assert_eq!(errors.field("name"), &[MSG_NAME_TAKEN.to_string()]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }

        // The stored record itself does not collide with its own name
        assert!(validate_tracker(&conn, &existing).is_ok());
    }
}
