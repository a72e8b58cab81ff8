// 🔐 Field visibility - which tracker fields each role may see and edit
//
//   Superuser  sees everything, edits everything
//   Reviewer   sees everything, cannot edit is_in_exodus / exodus_matches
//   Anonymous  sees everything but comments, edits nothing

use crate::entities::{Role, Tracker};
use crate::error::{CatalogError, Result};
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Fields of the public tracker document, in output order
pub const TRACKER_FIELDS: [&str; 25] = [
    "id",
    "name",
    "category",
    "description",
    "short_description",
    "documentation",
    "is_in_exodus",
    "code_signature",
    "network_signature",
    "api_key_ids",
    "website",
    "maven_repository",
    "group_id",
    "artifact_id",
    "gradle",
    "created",
    "updated",
    "creation_date",
    "capability",
    "advertising",
    "analytic",
    "network",
    "comments",
    "exodus_matches",
    "needs_rework",
];

/// Assigned by the system, never edited
const READ_ONLY_FIELDS: [&str; 4] = ["id", "created", "updated", "creation_date"];

const SUPERUSER_ONLY_FIELDS: [&str; 2] = ["is_in_exodus", "exodus_matches"];

const HIDDEN_FROM_ANONYMOUS: [&str; 1] = ["comments"];

pub fn visible_fields(role: Role) -> Vec<&'static str> {
    TRACKER_FIELDS
        .into_iter()
        .filter(|field| role != Role::Anonymous || !HIDDEN_FROM_ANONYMOUS.contains(field))
        .collect()
}

pub fn editable_fields(role: Role) -> Vec<&'static str> {
    match role {
        Role::Anonymous => Vec::new(),
        Role::Reviewer => TRACKER_FIELDS
            .into_iter()
            .filter(|f| !READ_ONLY_FIELDS.contains(f) && !SUPERUSER_ONLY_FIELDS.contains(f))
            .collect(),
        Role::Superuser => TRACKER_FIELDS
            .into_iter()
            .filter(|f| !READ_ONLY_FIELDS.contains(f))
            .collect(),
    }
}

/// Reject an edit touching any field `role` may not change
pub fn check_edit(role: Role, changed_fields: &[&str]) -> Result<()> {
    let editable = editable_fields(role);
    match changed_fields
        .iter()
        .find(|field| !editable.iter().any(|e| *e == **field))
    {
        Some(field) => Err(CatalogError::PermissionDenied(format!(
            "field {} is not editable",
            field
        ))),
        None => Ok(()),
    }
}

fn full_document(tracker: &Tracker) -> Map<String, Value> {
    let doc = json!({
        "id": tracker.id,
        "name": tracker.name,
        "category": tracker.categories.category,
        "description": tracker.description,
        "short_description": tracker.short_description,
        "documentation": tracker.documentation_list(),
        "is_in_exodus": tracker.is_in_exodus,
        "code_signature": tracker.code_signature,
        "network_signature": tracker.network_signature,
        "api_key_ids": tracker.api_key_ids,
        "website": tracker.website,
        "maven_repository": tracker.maven_repository,
        "group_id": tracker.group_id,
        "artifact_id": tracker.artifact_id,
        "gradle": tracker.gradle,
        "created": tracker.created,
        "updated": tracker.updated,
        "creation_date": tracker.creation_date,
        "capability": tracker.categories.capability,
        "advertising": tracker.categories.advertising,
        "analytic": tracker.categories.analytic,
        "network": tracker.categories.network,
        "comments": tracker.comments,
        "exodus_matches": tracker.exodus_matches,
        "needs_rework": tracker.needs_rework,
    });

    match doc {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Tracker document restricted to what a role may see
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TrackerView(Map<String, Value>);

impl TrackerView {
    pub fn for_role(tracker: &Tracker, role: Role) -> Self {
        let mut full = full_document(tracker);
        let mut view = Map::new();
        for field in visible_fields(role) {
            if let Some(value) = full.remove(field) {
                view.insert(field.to_string(), value);
            }
        }
        TrackerView(view)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_superuser_sees_and_edits_everything() {
        assert_eq!(visible_fields(Role::Superuser).len(), TRACKER_FIELDS.len());
        let editable = editable_fields(Role::Superuser);
        assert!(editable.contains(&"is_in_exodus"));
        assert!(editable.contains(&"exodus_matches"));
        assert!(!editable.contains(&"id"));
    }

    #[test]
    fn test_reviewer_cannot_edit_exodus_fields() {
        let editable = editable_fields(Role::Reviewer);
        assert!(!editable.contains(&"is_in_exodus"));
        assert!(!editable.contains(&"exodus_matches"));
        assert!(editable.contains(&"comments"));
        assert!(visible_fields(Role::Reviewer).contains(&"comments"));

        assert!(check_edit(Role::Reviewer, &["name", "website"]).is_ok());
        assert!(check_edit(Role::Reviewer, &["name", "is_in_exodus"])
            .unwrap_err()
            .is_permission_denied());
    }

    #[test]
    fn test_anonymous_view() {
        assert!(editable_fields(Role::Anonymous).is_empty());
        assert!(!visible_fields(Role::Anonymous).contains(&"comments"));
        assert!(check_edit(Role::Anonymous, &["name"]).is_err());
    }

    #[test]
    fn test_tracker_view_for_role() {
        let mut tracker = Tracker::new("toto").with_signatures("com.toto", "toto.com");
        tracker.comments = "internal note".into();
        tracker.documentation = "https://toto.com https://toto.com/doc".into();

        let anonymous = TrackerView::for_role(&tracker, Role::Anonymous);
        assert!(anonymous.get("comments").is_none());
        assert_eq!(anonymous.get("name"), Some(&json!("toto")));
        assert_eq!(
            anonymous.get("documentation"),
            Some(&json!(["https://toto.com", "https://toto.com/doc"]))
        );

        let reviewer = TrackerView::for_role(&tracker, Role::Reviewer).into_value();
        assert_eq!(reviewer["comments"], "internal note");
        let keys: Vec<&String> = reviewer.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), TRACKER_FIELDS.len());
        assert_eq!(keys[0], "id");
    }
}
