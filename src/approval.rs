// ✅ Approval Ledger - two-reviewer quorum before publication
//
// A tracker needs two approvals from reviewers other than its creator.
// Shipping (publishing to Exodus) is reserved to superusers.

use crate::db::{self, insert_event, Event};
use crate::entities::{Role, User};
use crate::error::{CatalogError, Result};
use chrono::Utc;
use rusqlite::{ffi, params, Connection};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const APPROVAL_QUORUM: usize = 2;

// ============================================================================
// REVIEW STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewState {
    #[serde(rename = "no_approvals")]
    NoApprovals,

    #[serde(rename = "need_review")]
    NeedsReview,

    #[serde(rename = "approved")]
    Approved,
}

impl ReviewState {
    pub fn from_count(count: usize) -> Self {
        match count {
            0 => ReviewState::NoApprovals,
            n if n < APPROVAL_QUORUM => ReviewState::NeedsReview,
            _ => ReviewState::Approved,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewState::NoApprovals => "no_approvals",
            ReviewState::NeedsReview => "need_review",
            ReviewState::Approved => "approved",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "no_approvals" => Some(ReviewState::NoApprovals),
            "need_review" => Some(ReviewState::NeedsReview),
            "approved" => Some(ReviewState::Approved),
            _ => None,
        }
    }
}

// ============================================================================
// QUERIES
// ============================================================================

/// Usernames of approvers, oldest approval first
pub fn approver_names(conn: &Connection, tracker_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT users.username FROM tracker_approvals
         JOIN users ON users.id = tracker_approvals.approver_id
         WHERE tracker_approvals.tracker_id = ?1
         ORDER BY tracker_approvals.seq ASC",
    )?;

    let names = stmt
        .query_map([tracker_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;

    Ok(names)
}

pub fn approval_count(conn: &Connection, tracker_id: &str) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM tracker_approvals WHERE tracker_id = ?1",
        [tracker_id],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

pub fn classify(conn: &Connection, tracker_id: &str) -> Result<ReviewState> {
    Ok(ReviewState::from_count(approval_count(conn, tracker_id)?))
}

// ============================================================================
// MUTATIONS
// ============================================================================

/// Only users stored in the catalog may review
fn ensure_registered(conn: &Connection, reviewer: &User) -> Result<()> {
    match db::get_user_by_username(conn, &reviewer.username)? {
        Some(user) if user.id == reviewer.id => Ok(()),
        _ => Err(CatalogError::PermissionDenied(format!(
            "{} is not a registered reviewer",
            reviewer.username
        ))),
    }
}

/// Record `reviewer`'s approval of a tracker
pub fn record_approval(conn: &Connection, tracker_id: &str, reviewer: &User) -> Result<()> {
    let tracker = db::get_tracker(conn, tracker_id)?;
    ensure_registered(conn, reviewer)?;

    if db::tracker_creator(conn, &tracker.id)?.as_deref() == Some(reviewer.username.as_str()) {
        return Err(CatalogError::SelfApprovalDenied);
    }

    let tx = conn.unchecked_transaction()?;

    let inserted = tx.execute(
        "INSERT INTO tracker_approvals (tracker_id, approver_id, created) VALUES (?1, ?2, ?3)",
        params![tracker.id, reviewer.id, Utc::now().to_rfc3339()],
    );

    match inserted {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            return Err(CatalogError::ApprovalConflict);
        }
        Err(e) => return Err(e.into()),
    }

    insert_event(
        &tx,
        &Event::new(
            "tracker_approved",
            "tracker",
            &tracker.id,
            serde_json::json!({ "approver": reviewer.username }),
            &reviewer.username,
        ),
    )?;

    tx.commit()?;
    info!(tracker = %tracker.name, reviewer = %reviewer.username, "approval recorded");

    Ok(())
}

/// Withdraw `reviewer`'s approval of a tracker
pub fn revoke_approval(conn: &Connection, tracker_id: &str, reviewer: &User) -> Result<()> {
    let tracker = db::get_tracker(conn, tracker_id)?;

    let tx = conn.unchecked_transaction()?;

    let deleted = tx.execute(
        "DELETE FROM tracker_approvals WHERE tracker_id = ?1 AND approver_id = ?2",
        params![tracker.id, reviewer.id],
    )?;

    if deleted == 0 {
        return Err(CatalogError::ApprovalNotFound);
    }

    insert_event(
        &tx,
        &Event::new(
            "tracker_approval_revoked",
            "tracker",
            &tracker.id,
            serde_json::json!({ "approver": reviewer.username }),
            &reviewer.username,
        ),
    )?;

    tx.commit()?;
    info!(tracker = %tracker.name, reviewer = %reviewer.username, "approval revoked");

    Ok(())
}

/// Publish a tracker to Exodus; superusers only
pub fn ship(conn: &Connection, tracker_id: &str, actor: Option<&User>) -> Result<()> {
    let actor = match actor {
        Some(user) if user.role() == Role::Superuser => user,
        Some(user) => {
            return Err(CatalogError::PermissionDenied(format!(
                "{} is not allowed to ship trackers",
                user.username
            )))
        }
        None => {
            return Err(CatalogError::PermissionDenied(
                "authentication required to ship trackers".to_string(),
            ))
        }
    };

    let tracker = db::get_tracker(conn, tracker_id)?;

    let tx = conn.unchecked_transaction()?;

    tx.execute(
        "UPDATE trackers SET is_in_exodus = 1, updated = ?2 WHERE id = ?1",
        params![tracker.id, Utc::now().to_rfc3339()],
    )?;

    insert_event(
        &tx,
        &Event::new(
            "tracker_shipped",
            "tracker",
            &tracker.id,
            serde_json::json!({ "name": tracker.name }),
            &actor.username,
        ),
    )?;

    tx.commit()?;
    info!(tracker = %tracker.name, actor = %actor.username, "tracker shipped");

    Ok(())
}
