// 📊 Catalog statistics
//
// Summary counts over the whole tracker table. An empty catalog has no
// statistics at all (serialized as `{}`).

use crate::collision;
use crate::db;
use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddedCounts {
    pub last_week: usize,
    pub last_month: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerStats {
    pub all: usize,
    pub in_exodus: usize,
    pub only_in_local: usize,
    pub with_collisions: usize,
    pub latest_update_time: DateTime<Utc>,
    pub added: AddedCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub trackers: TrackerStats,
}

/// Statistics as of `now`; None for an empty catalog
pub fn stats_at(conn: &Connection, now: DateTime<Utc>) -> Result<Option<Stats>> {
    let trackers = db::get_all_trackers(conn)?;

    let latest_update_time = match trackers.iter().map(|t| t.updated).max() {
        Some(latest) => latest,
        None => return Ok(None),
    };

    let in_exodus = trackers.iter().filter(|t| t.is_in_exodus).count();
    let with_collisions = trackers
        .iter()
        .filter(|t| collision::has_any_signature_collision(t, &trackers))
        .count();

    let last_week = now - Duration::days(7);
    let last_month = now - Duration::days(30);

    Ok(Some(Stats {
        trackers: TrackerStats {
            all: trackers.len(),
            in_exodus,
            only_in_local: trackers.len() - in_exodus,
            with_collisions,
            latest_update_time,
            added: AddedCounts {
                last_week: trackers.iter().filter(|t| t.created >= last_week).count(),
                last_month: trackers.iter().filter(|t| t.created >= last_month).count(),
            },
        },
    }))
}

pub fn stats(conn: &Connection) -> Result<Option<Stats>> {
    stats_at(conn, Utc::now())
}

/// JSON document served by the stats endpoint
pub fn stats_json(conn: &Connection) -> Result<serde_json::Value> {
    match stats(conn)? {
        Some(stats) => Ok(serde_json::to_value(stats)?),
        None => Ok(serde_json::json!({})),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{insert_tracker, setup_database, SYSTEM_ACTOR};
    use crate::entities::Tracker;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    #[test]
    fn test_empty_catalog() {
        let conn = setup();
        assert_eq!(stats(&conn).unwrap(), None);
        assert_eq!(stats_json(&conn).unwrap(), serde_json::json!({}));
    }

    #[test]
    fn test_counts() {
        let conn = setup();
        let now = Utc::now();

        let mut old = Tracker::new("old").with_signatures("com.shared", "");
        old.created = now - Duration::days(20);
        insert_tracker(&conn, &old, SYSTEM_ACTOR).unwrap();

        let mut ancient = Tracker::new("ancient").in_exodus(true);
        ancient.created = now - Duration::days(90);
        insert_tracker(&conn, &ancient, SYSTEM_ACTOR).unwrap();

        let fresh = Tracker::new("fresh").with_signatures("com.shared.sdk", "");
        insert_tracker(&conn, &fresh, SYSTEM_ACTOR).unwrap();

        let stats = stats_at(&conn, now).unwrap().unwrap().trackers;
        assert_eq!(stats.all, 3);
        assert_eq!(stats.in_exodus, 1);
        assert_eq!(stats.only_in_local, 2);
        assert_eq!(stats.with_collisions, 1);
        assert_eq!(stats.added.last_week, 1);
        assert_eq!(stats.added.last_month, 2);
        assert_eq!(stats.latest_update_time, fresh.updated);
    }

    #[test]
    fn test_json_shape() {
        let conn = setup();
        insert_tracker(&conn, &Tracker::new("t1"), SYSTEM_ACTOR).unwrap();

        let json = stats_json(&conn).unwrap();
        assert_eq!(json["trackers"]["all"], 1);
        assert_eq!(json["trackers"]["added"]["last_week"], 1);
        assert!(json["trackers"]["latest_update_time"].is_string());
    }
}
