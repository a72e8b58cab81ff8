// 📥 Importers - bulk tracker import and category seeding
//
// Tracker import fills an EMPTY catalog from an Exodus document (file or
// URL). Category seeding is idempotent.

use crate::db::{self, SYSTEM_ACTOR};
use crate::entities::{Category, CategoryFamily, Tracker};
use crate::error::{CatalogError, Result};
use crate::exodus::{ExodusClient, ExternalDataset, ExternalTracker, TrackerSource};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::Value;
use std::io::Write;
use tracing::{info, warn};

/// Default import source: the public Exodus trackers document
pub const DEFAULT_SOURCE: &str = "https://reports.exodus-privacy.eu.org/api/trackers";

/// Load an Exodus document from a URL or a local file path
pub async fn load_dataset(source: &str) -> Result<ExternalDataset> {
    if source.contains("://") {
        ExodusClient::for_url(source).fetch_trackers().await
    } else {
        let body = std::fs::read_to_string(source)?;
        ExternalDataset::from_json_str(&body)
    }
}

fn link_tracker_categories(conn: &Connection, tracker: &mut Tracker, record: &ExternalTracker) -> Result<()> {
    let names = match record.fields.get("categories") {
        Some(Value::Array(names)) => names,
        _ => return Ok(()),
    };

    let known = db::get_categories(conn, CategoryFamily::TrackerCategory)?;
    for name in names.iter().filter_map(Value::as_str) {
        match known.iter().find(|c| c.name == name) {
            Some(category) => tracker.categories.link(CategoryFamily::TrackerCategory, &category.id),
            None => warn!(tracker = %tracker.name, category = name, "unknown category skipped"),
        }
    }

    Ok(())
}

/// Convert one external record into a published local tracker
pub fn tracker_from_record(conn: &Connection, record: &ExternalTracker) -> Result<Tracker> {
    let text = |field: &str| record.get_str(field).unwrap_or_default();

    let mut tracker = Tracker::new(text("name"))
        .with_description(text("description"))
        .with_signatures(text("code_signature"), text("network_signature"))
        .with_website(text("website"))
        .in_exodus(true);

    if let Ok(date) = NaiveDate::parse_from_str(text("creation_date"), "%Y-%m-%d") {
        tracker.creation_date = date;
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            tracker.created = midnight.and_utc();
        }
    }

    if let Some(Value::Array(links)) = record.fields.get("documentation") {
        let links: Vec<&str> = links.iter().filter_map(Value::as_str).collect();
        tracker.documentation = links.join(" ");
    }

    link_tracker_categories(conn, &mut tracker, record)?;

    Ok(tracker)
}

/// Import every record of `dataset` into an empty catalog
///
/// Records that fail validation are reported and skipped.
pub fn import_trackers(conn: &Connection, dataset: &ExternalDataset, out: &mut dyn Write) -> Result<usize> {
    if db::count_trackers(conn)? > 0 {
        return Err(CatalogError::ImportTargetNotEmpty);
    }

    let mut imported = 0;

    for record in &dataset.trackers {
        let tracker = tracker_from_record(conn, record)?;

        match db::insert_tracker(conn, &tracker, SYSTEM_ACTOR) {
            Ok(()) => {
                writeln!(out, "{} saved", tracker.name)?;
                imported += 1;
            }
            Err(CatalogError::Validation(errors)) => {
                warn!(tracker = %tracker.name, %errors, "invalid record skipped");
                writeln!(out, "{} skipped: {}", tracker.name, errors)?;
            }
            Err(e) => return Err(e),
        }
    }

    info!(imported, total = dataset.len(), "tracker import finished");
    Ok(imported)
}

/// Seed every category family; existing names are left alone
pub fn import_categories(conn: &Connection, out: &mut dyn Write) -> Result<usize> {
    let mut created = 0;

    for family in CategoryFamily::ALL {
        for name in family.default_names() {
            if !db::category_exists(conn, family, name)? {
                db::insert_category(conn, &Category::new(family, name), family)?;
                created += 1;
            }
        }
        writeln!(out, "{} categories created", family.label())?;
    }

    info!(created, "category seeding finished");
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        db::setup_database(&conn).unwrap();
        conn
    }

    fn document() -> ExternalDataset {
        ExternalDataset::from_value(json!({
            "trackers": {
                "1": {
                    "name": "Teemo",
                    "description": "Teemo is a geo-profiling company",
                    "creation_date": "2017-09-24",
                    "code_signature": "com.databerries.|com.geolocstation.",
                    "network_signature": "databerries\\.com",
                    "website": "https://www.teemo.co",
                    "documentation": ["https://www.teemo.co/privacy"],
                    "categories": ["Location", "Unknown"]
                },
                "2": {
                    "name": "Broken",
                    "description": "",
                    "creation_date": "2018-01-01",
                    "code_signature": "*broken",
                    "network_signature": "",
                    "website": ""
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_categories_are_created() {
        let conn = setup();
        let mut out = Vec::new();
        let created = import_categories(&conn, &mut out).unwrap();

        assert_eq!(created, 46);
        assert_eq!(db::count_categories(&conn, CategoryFamily::Capability).unwrap(), 8);
        assert_eq!(db::count_categories(&conn, CategoryFamily::Advertising).unwrap(), 9);
        assert_eq!(db::count_categories(&conn, CategoryFamily::Analytic).unwrap(), 14);
        assert_eq!(db::count_categories(&conn, CategoryFamily::Network).unwrap(), 9);
        assert_eq!(db::count_categories(&conn, CategoryFamily::TrackerCategory).unwrap(), 6);

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Capability categories created\n\
             Advertising categories created\n\
             Analytic categories created\n\
             Network categories created\n\
             Tracker categories created\n"
        );
    }

    #[test]
    fn test_categories_are_created_only_once() {
        let conn = setup();
        let mut out = Vec::new();
        import_categories(&conn, &mut out).unwrap();
        let second = import_categories(&conn, &mut out).unwrap();

        assert_eq!(second, 0);
        assert_eq!(db::count_categories(&conn, CategoryFamily::Analytic).unwrap(), 14);
        assert_eq!(db::count_categories(&conn, CategoryFamily::TrackerCategory).unwrap(), 6);
    }

    #[test]
    fn test_import_trackers() {
        let conn = setup();
        import_categories(&conn, &mut Vec::new()).unwrap();

        let mut out = Vec::new();
        let imported = import_trackers(&conn, &document(), &mut out).unwrap();
        assert_eq!(imported, 1);

        let output = String::from_utf8(out).unwrap();
        assert!(output.starts_with("Teemo saved\n"));
        assert!(output.contains("Broken skipped"));

        let trackers = db::get_all_trackers(&conn).unwrap();
        let teemo = &trackers[0];
        assert!(teemo.is_in_exodus);
        assert_eq!(teemo.creation_date.to_string(), "2017-09-24");
        assert_eq!(teemo.documentation, "https://www.teemo.co/privacy");
        assert_eq!(teemo.categories.count(CategoryFamily::TrackerCategory), 1);
        assert_eq!(db::tracker_creator(&conn, &teemo.id).unwrap(), None);
    }

    #[test]
    fn test_import_refuses_non_empty_catalog() {
        let conn = setup();
        db::insert_tracker(&conn, &Tracker::new("existing"), SYSTEM_ACTOR).unwrap();

        let result = import_trackers(&conn, &document(), &mut Vec::new());
        assert!(matches!(result, Err(CatalogError::ImportTargetNotEmpty)));
        assert_eq!(db::count_trackers(&conn).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_load_dataset_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"trackers": {{"1": {{"name": "from file"}}}}}}"#).unwrap();

        let dataset = load_dataset(file.path().to_str().unwrap()).await.unwrap();
        assert_eq!(dataset.trackers[0].name(), "from file");
    }
}
