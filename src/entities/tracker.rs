// 📡 Tracker Entity - one catalogued tracking library
//
// Identity is a UUID assigned at construction and never changes.
// Signatures are regex patterns matched against package names (code) and
// hostnames (network) found in apps.

use super::category::CategoryFamily;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// CATEGORY LINKS
// ============================================================================

/// Category ids per family, in link order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryLinks {
    pub capability: Vec<String>,
    pub advertising: Vec<String>,
    pub analytic: Vec<String>,
    pub network: Vec<String>,
    pub category: Vec<String>,
}

impl CategoryLinks {
    pub fn get(&self, family: CategoryFamily) -> &[String] {
        match family {
            CategoryFamily::Capability => &self.capability,
            CategoryFamily::Advertising => &self.advertising,
            CategoryFamily::Analytic => &self.analytic,
            CategoryFamily::Network => &self.network,
            CategoryFamily::TrackerCategory => &self.category,
        }
    }

    pub fn get_mut(&mut self, family: CategoryFamily) -> &mut Vec<String> {
        match family {
            CategoryFamily::Capability => &mut self.capability,
            CategoryFamily::Advertising => &mut self.advertising,
            CategoryFamily::Analytic => &mut self.analytic,
            CategoryFamily::Network => &mut self.network,
            CategoryFamily::TrackerCategory => &mut self.category,
        }
    }

    /// Link a category once; linking twice is a no-op
    pub fn link(&mut self, family: CategoryFamily, category_id: &str) {
        let ids = self.get_mut(family);
        if !ids.iter().any(|id| id == category_id) {
            ids.push(category_id.to_string());
        }
    }

    pub fn count(&self, family: CategoryFamily) -> usize {
        self.get(family).len()
    }
}

// ============================================================================
// TRACKER ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tracker {
    /// Stable identity (UUID v4)
    pub id: String,

    pub name: String,
    pub description: String,
    pub short_description: String,

    /// Regex matched against code package names
    pub code_signature: String,

    /// Regex matched against network endpoints
    pub network_signature: String,

    pub website: String,

    /// Space-separated list of URLs
    pub documentation: String,

    pub api_key_ids: String,
    pub maven_repository: String,
    pub group_id: String,
    pub artifact_id: String,
    pub gradle: String,
    pub comments: String,
    pub needs_rework: bool,

    /// Published to the Exodus reference dataset
    pub is_in_exodus: bool,

    /// Match-count hint reported by Exodus
    pub exodus_matches: i64,

    pub categories: CategoryLinks,

    pub creation_date: NaiveDate,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Tracker {
    /// New tracker with a fresh identity and timestamps
    pub fn new(name: &str) -> Self {
        let now = Utc::now();

        Tracker {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: String::new(),
            short_description: String::new(),
            code_signature: String::new(),
            network_signature: String::new(),
            website: String::new(),
            documentation: String::new(),
            api_key_ids: String::new(),
            maven_repository: String::new(),
            group_id: String::new(),
            artifact_id: String::new(),
            gradle: String::new(),
            comments: String::new(),
            needs_rework: false,
            is_in_exodus: false,
            exodus_matches: 0,
            categories: CategoryLinks::default(),
            creation_date: now.date_naive(),
            created: now,
            updated: now,
        }
    }

    pub fn with_signatures(mut self, code_signature: &str, network_signature: &str) -> Self {
        self.code_signature = code_signature.to_string();
        self.network_signature = network_signature.to_string();
        self
    }

    pub fn with_website(mut self, website: &str) -> Self {
        self.website = website.to_string();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn in_exodus(mut self, is_in_exodus: bool) -> Self {
        self.is_in_exodus = is_in_exodus;
        self
    }

    /// Text value of a named field, None for unknown names
    pub fn field_value(&self, field: &str) -> Option<String> {
        let value = match field {
            "name" => self.name.clone(),
            "description" => self.description.clone(),
            "short_description" => self.short_description.clone(),
            "code_signature" => self.code_signature.clone(),
            "network_signature" => self.network_signature.clone(),
            "website" => self.website.clone(),
            "documentation" => self.documentation.clone(),
            "api_key_ids" => self.api_key_ids.clone(),
            "maven_repository" => self.maven_repository.clone(),
            "group_id" => self.group_id.clone(),
            "artifact_id" => self.artifact_id.clone(),
            "gradle" => self.gradle.clone(),
            "comments" => self.comments.clone(),
            "creation_date" => self.creation_date.to_string(),
            _ => return None,
        };
        Some(value)
    }

    pub fn documentation_list(&self) -> Vec<String> {
        self.documentation
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }

    /// Completeness score out of 100
    pub fn progress(&self) -> u32 {
        let mut p = 0;
        if self.description.chars().count() > 180 {
            p += 15;
        }
        if self.short_description.chars().count() > 25 {
            p += 15;
        }
        if self.code_signature.chars().count() > 3 {
            p += 10;
        }
        if self.network_signature.chars().count() > 3 {
            p += 10;
        }
        if self.website.chars().count() > 2 {
            p += 10;
        }
        if self.categories.count(CategoryFamily::Capability) > 0 {
            p += 10;
        }
        if self.categories.count(CategoryFamily::Analytic) > 0 {
            p += 10;
        }
        if self.categories.count(CategoryFamily::Advertising) > 0 {
            p += 10;
        }
        if self.categories.count(CategoryFamily::Network) > 0 {
            p += 6;
        }
        for packaging in [
            &self.maven_repository,
            &self.artifact_id,
            &self.group_id,
            &self.gradle,
        ] {
            if !packaging.is_empty() {
                p += 1;
            }
        }
        p
    }

    /// Labels of the fields still to fill in, in display order
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.categories.count(CategoryFamily::TrackerCategory) < 1 {
            missing.push("Categories");
        }
        if self.description.is_empty() {
            missing.push("Description");
        }
        if self.code_signature.chars().count() <= 3 {
            missing.push("Code signature");
        }
        if self.network_signature.chars().count() <= 3 {
            missing.push("Network signature");
        }
        if self.website.chars().count() < 3 {
            missing.push("Website");
        }
        if self.categories.count(CategoryFamily::Capability) < 1 {
            missing.push("Capabilities");
        }
        if self.categories.count(CategoryFamily::Analytic) < 1 {
            missing.push("Analytics");
        }
        if self.categories.count(CategoryFamily::Advertising) < 1 {
            missing.push("Advertising");
        }
        if self.categories.count(CategoryFamily::Network) < 1 {
            missing.push("Networks");
        }
        if self.maven_repository.is_empty() {
            missing.push("Maven repository");
        }
        if self.artifact_id.is_empty() {
            missing.push("Artifact ID");
        }
        if self.group_id.is_empty() {
            missing.push("Group ID");
        }
        if self.gradle.is_empty() {
            missing.push("Gradle");
        }
        missing
    }

    pub fn exportable(&self) -> ExportableTracker {
        ExportableTracker {
            name: self.name.clone(),
            code_signature: self.code_signature.clone(),
            network_signature: self.network_signature.clone(),
            website: self.website.clone(),
        }
    }
}

// ============================================================================
// EXPORT PROJECTION
// ============================================================================

/// Minimal projection published in the export document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportableTracker {
    pub name: String,
    pub code_signature: String,
    pub network_signature: String,
    pub website: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerExport {
    pub trackers: Vec<ExportableTracker>,
}

impl TrackerExport {
    /// Export document ordered by name
    pub fn from_trackers(trackers: &[Tracker]) -> Self {
        let mut exported: Vec<ExportableTracker> =
            trackers.iter().map(Tracker::exportable).collect();
        exported.sort_by(|a, b| a.name.cmp(&b.name));
        TrackerExport { trackers: exported }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_empty_tracker() {
        let tracker = Tracker::new("");
        assert_eq!(tracker.progress(), 0);
    }

    #[test]
    fn test_progress_with_signatures() {
        let tracker = Tracker::new("toto").with_signatures("toto", "toto");
        assert_eq!(tracker.progress(), 20);

        let short = Tracker::new("toto").with_signatures("tot", "tot");
        assert_eq!(short.progress(), 0);

        let with_site = Tracker::new("toto")
            .with_signatures("toto", "toto")
            .with_website("toto.com");
        assert_eq!(with_site.progress(), 30);
    }

    #[test]
    fn test_progress_full_tracker_reaches_100() {
        let mut tracker = Tracker::new("full")
            .with_signatures("com.full", "full.com")
            .with_website("https://full.com")
            .with_description(&"d".repeat(181));
        tracker.short_description = "s".repeat(26);
        tracker.maven_repository = "https://jcenter.bintray.com/".into();
        tracker.artifact_id = "full".into();
        tracker.group_id = "com.full".into();
        tracker.gradle = "com.full:full:1.0".into();
        for family in [
            CategoryFamily::Capability,
            CategoryFamily::Advertising,
            CategoryFamily::Analytic,
            CategoryFamily::Network,
        ] {
            tracker.categories.link(family, "c1");
        }

        assert_eq!(tracker.progress(), 100);
    }

    #[test]
    fn test_missing_fields_empty_tracker() {
        let tracker = Tracker::new("");
        assert_eq!(
            tracker.missing_fields(),
            vec![
                "Categories",
                "Description",
                "Code signature",
                "Network signature",
                "Website",
                "Capabilities",
                "Analytics",
                "Advertising",
                "Networks",
                "Maven repository",
                "Artifact ID",
                "Group ID",
                "Gradle",
            ]
        );
    }

    #[test]
    fn test_missing_fields_with_signatures() {
        let tracker = Tracker::new("").with_signatures("toto", "toto");
        let missing = tracker.missing_fields();
        assert!(!missing.contains(&"Code signature"));
        assert!(!missing.contains(&"Network signature"));
        assert_eq!(missing.len(), 11);
    }

    #[test]
    fn test_category_link_is_idempotent() {
        let mut links = CategoryLinks::default();
        links.link(CategoryFamily::Analytic, "a");
        links.link(CategoryFamily::Analytic, "a");
        links.link(CategoryFamily::Analytic, "b");
        assert_eq!(links.analytic, vec!["a", "b"]);
        assert_eq!(links.count(CategoryFamily::Network), 0);
    }

    #[test]
    fn test_documentation_list_splits_on_spaces() {
        let mut tracker = Tracker::new("t1");
        assert!(tracker.documentation_list().is_empty());
        tracker.documentation = "https://t1.com http://t1.com/doc".into();
        assert_eq!(
            tracker.documentation_list(),
            vec!["https://t1.com", "http://t1.com/doc"]
        );
    }

    #[test]
    fn test_export_is_ordered_by_name() {
        let trackers = vec![
            Tracker::new("tracker_2").with_signatures("code_2", "network_2"),
            Tracker::new("tracker_1").with_signatures("code_1", "network_1"),
        ];
        let export = TrackerExport::from_trackers(&trackers);
        assert_eq!(export.trackers[0].name, "tracker_1");
        assert_eq!(export.trackers[1].code_signature, "code_2");

        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(
            json["trackers"][0],
            serde_json::json!({
                "name": "tracker_1",
                "code_signature": "code_1",
                "network_signature": "network_1",
                "website": ""
            })
        );
    }

    const TEXT_FIELDS: [&str; 14] = [
        "name",
        "description",
        "short_description",
        "code_signature",
        "network_signature",
        "website",
        "documentation",
        "api_key_ids",
        "maven_repository",
        "group_id",
        "artifact_id",
        "gradle",
        "comments",
        "creation_date",
    ];

    #[test]
    fn test_field_value_by_name() {
        let tracker = Tracker::new("t").with_signatures("code", "net");
        assert_eq!(tracker.field_value("code_signature").as_deref(), Some("code"));
        assert_eq!(tracker.field_value("unknown"), None);
        for field in TEXT_FIELDS {
            assert!(tracker.field_value(field).is_some(), "{}", field);
        }
    }
}
