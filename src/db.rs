use crate::entities::{Category, CategoryFamily, CategoryLinks, Tracker, User};
use crate::error::{CatalogError, Result};
use crate::query::{LookupQuery, TrackerLookup};
use crate::validation;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Actor recorded for programmatic changes (imports, seeding)
pub const SYSTEM_ACTOR: &str = "system";

const TRACKER_COLUMNS: &str = "id, name, description, short_description, code_signature,
    network_signature, website, documentation, api_key_ids, maven_repository,
    group_id, artifact_id, gradle, comments, needs_rework, is_in_exodus,
    exodus_matches, creation_date, created, updated";

/// Event for audit trail: every change is an event
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL is a no-op for in-memory databases
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Trackers
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS trackers (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT UNIQUE NOT NULL,
            name TEXT UNIQUE NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            short_description TEXT NOT NULL DEFAULT '',
            code_signature TEXT NOT NULL DEFAULT '',
            network_signature TEXT NOT NULL DEFAULT '',
            website TEXT NOT NULL DEFAULT '',
            documentation TEXT NOT NULL DEFAULT '',
            api_key_ids TEXT NOT NULL DEFAULT '',
            maven_repository TEXT NOT NULL DEFAULT '',
            group_id TEXT NOT NULL DEFAULT '',
            artifact_id TEXT NOT NULL DEFAULT '',
            gradle TEXT NOT NULL DEFAULT '',
            comments TEXT NOT NULL DEFAULT '',
            needs_rework INTEGER NOT NULL DEFAULT 0,
            is_in_exodus INTEGER NOT NULL DEFAULT 0,
            exodus_matches INTEGER NOT NULL DEFAULT 0,
            creation_date TEXT NOT NULL,
            created TEXT NOT NULL,
            updated TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Categories (all five families, discriminated by `family`)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS categories (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT UNIQUE NOT NULL,
            family TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            is_in_exodus INTEGER NOT NULL DEFAULT 0,
            created TEXT NOT NULL,
            updated TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS tracker_categories (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            tracker_id TEXT NOT NULL REFERENCES trackers(id) ON DELETE CASCADE,
            category_id TEXT NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
            family TEXT NOT NULL,
            UNIQUE (tracker_id, category_id)
        )",
        [],
    )?;

    // ==========================================================================
    // Reviewers and approvals
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT UNIQUE NOT NULL,
            is_superuser INTEGER NOT NULL DEFAULT 0,
            created TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS tracker_approvals (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            tracker_id TEXT NOT NULL REFERENCES trackers(id) ON DELETE CASCADE,
            approver_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created TEXT NOT NULL,
            UNIQUE (tracker_id, approver_id)
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_trackers_code_signature ON trackers(code_signature)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_categories_family ON categories(family, name)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Events for a specific entity, oldest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY id ASC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: parse_timestamp(&timestamp_str, 1)?,
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        5,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

fn parse_timestamp(value: &str, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_date(value: &str, column: usize) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}

// ============================================================================
// TRACKERS
// ============================================================================

fn tracker_from_row(row: &Row) -> rusqlite::Result<Tracker> {
    let creation_date: String = row.get(17)?;
    let created: String = row.get(18)?;
    let updated: String = row.get(19)?;

    Ok(Tracker {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        short_description: row.get(3)?,
        code_signature: row.get(4)?,
        network_signature: row.get(5)?,
        website: row.get(6)?,
        documentation: row.get(7)?,
        api_key_ids: row.get(8)?,
        maven_repository: row.get(9)?,
        group_id: row.get(10)?,
        artifact_id: row.get(11)?,
        gradle: row.get(12)?,
        comments: row.get(13)?,
        needs_rework: row.get(14)?,
        is_in_exodus: row.get(15)?,
        exodus_matches: row.get(16)?,
        creation_date: parse_date(&creation_date, 17)?,
        created: parse_timestamp(&created, 18)?,
        updated: parse_timestamp(&updated, 19)?,
        categories: CategoryLinks::default(),
    })
}

fn load_category_links(conn: &Connection, tracker: &mut Tracker) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT family, category_id FROM tracker_categories
         WHERE tracker_id = ?1
         ORDER BY seq ASC",
    )?;

    let links = stmt
        .query_map([&tracker.id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    for (family, category_id) in links {
        if let Some(family) = CategoryFamily::parse(&family) {
            tracker.categories.link(family, &category_id);
        }
    }

    Ok(())
}

fn query_trackers(conn: &Connection, sql: &str, values: &[String]) -> Result<Vec<Tracker>> {
    let mut stmt = conn.prepare(sql)?;
    let mut trackers = stmt
        .query_map(params_from_iter(values.iter()), tracker_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    for tracker in &mut trackers {
        load_category_links(conn, tracker)?;
    }

    Ok(trackers)
}

fn write_category_links(conn: &Connection, tracker: &Tracker) -> Result<()> {
    conn.execute(
        "DELETE FROM tracker_categories WHERE tracker_id = ?1",
        [&tracker.id],
    )?;

    for family in CategoryFamily::ALL {
        for category_id in tracker.categories.get(family) {
            conn.execute(
                "INSERT INTO tracker_categories (tracker_id, category_id, family)
                 VALUES (?1, ?2, ?3)",
                params![tracker.id, category_id, family.as_str()],
            )?;
        }
    }

    Ok(())
}

/// Validate then insert a tracker, recording who created it
pub fn insert_tracker(conn: &Connection, tracker: &Tracker, actor: &str) -> Result<()> {
    validation::validate_tracker(conn, tracker)?;

    let tx = conn.unchecked_transaction()?;

    tx.execute(
        &format!(
            "INSERT INTO trackers ({}) VALUES
             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
            TRACKER_COLUMNS
        ),
        params![
            tracker.id,
            tracker.name,
            tracker.description,
            tracker.short_description,
            tracker.code_signature,
            tracker.network_signature,
            tracker.website,
            tracker.documentation,
            tracker.api_key_ids,
            tracker.maven_repository,
            tracker.group_id,
            tracker.artifact_id,
            tracker.gradle,
            tracker.comments,
            tracker.needs_rework,
            tracker.is_in_exodus,
            tracker.exodus_matches,
            tracker.creation_date.format("%Y-%m-%d").to_string(),
            tracker.created.to_rfc3339(),
            tracker.updated.to_rfc3339(),
        ],
    )?;

    write_category_links(&tx, tracker)?;

    insert_event(
        &tx,
        &Event::new(
            "tracker_created",
            "tracker",
            &tracker.id,
            serde_json::json!({ "name": tracker.name }),
            actor,
        ),
    )?;

    tx.commit()?;
    debug!(tracker = %tracker.name, actor, "tracker inserted");

    Ok(())
}

/// Validate then overwrite a stored tracker; refreshes `updated`
pub fn update_tracker(conn: &Connection, tracker: &mut Tracker, actor: &str) -> Result<()> {
    validation::validate_tracker(conn, tracker)?;
    tracker.updated = Utc::now();

    let tx = conn.unchecked_transaction()?;

    let changed = tx.execute(
        "UPDATE trackers SET
            name = ?2, description = ?3, short_description = ?4, code_signature = ?5,
            network_signature = ?6, website = ?7, documentation = ?8, api_key_ids = ?9,
            maven_repository = ?10, group_id = ?11, artifact_id = ?12, gradle = ?13,
            comments = ?14, needs_rework = ?15, is_in_exodus = ?16, exodus_matches = ?17,
            updated = ?18
         WHERE id = ?1",
        params![
            tracker.id,
            tracker.name,
            tracker.description,
            tracker.short_description,
            tracker.code_signature,
            tracker.network_signature,
            tracker.website,
            tracker.documentation,
            tracker.api_key_ids,
            tracker.maven_repository,
            tracker.group_id,
            tracker.artifact_id,
            tracker.gradle,
            tracker.comments,
            tracker.needs_rework,
            tracker.is_in_exodus,
            tracker.exodus_matches,
            tracker.updated.to_rfc3339(),
        ],
    )?;

    if changed == 0 {
        return Err(CatalogError::NotFound(format!("tracker {}", tracker.id)));
    }

    write_category_links(&tx, tracker)?;

    insert_event(
        &tx,
        &Event::new(
            "tracker_updated",
            "tracker",
            &tracker.id,
            serde_json::json!({ "name": tracker.name }),
            actor,
        ),
    )?;

    tx.commit()?;

    Ok(())
}

/// Delete a tracker; approvals and category links cascade
pub fn delete_tracker(conn: &Connection, id: &str, actor: &str) -> Result<()> {
    let tx = conn.unchecked_transaction()?;

    let deleted = tx.execute("DELETE FROM trackers WHERE id = ?1", [id])?;
    if deleted == 0 {
        return Err(CatalogError::NotFound(format!("tracker {}", id)));
    }

    insert_event(
        &tx,
        &Event::new("tracker_deleted", "tracker", id, serde_json::json!({}), actor),
    )?;

    tx.commit()?;

    Ok(())
}

/// Fetch one tracker; malformed ids are reported as not found
pub fn get_tracker(conn: &Connection, id: &str) -> Result<Tracker> {
    if uuid::Uuid::parse_str(id).is_err() {
        return Err(CatalogError::NotFound(format!("tracker {}", id)));
    }

    let sql = format!("SELECT {} FROM trackers WHERE id = ?1", TRACKER_COLUMNS);
    query_trackers(conn, &sql, &[id.to_string()])?
        .into_iter()
        .next()
        .ok_or_else(|| CatalogError::NotFound(format!("tracker {}", id)))
}

/// All trackers in insertion order
pub fn get_all_trackers(conn: &Connection) -> Result<Vec<Tracker>> {
    let sql = format!("SELECT {} FROM trackers ORDER BY seq ASC", TRACKER_COLUMNS);
    query_trackers(conn, &sql, &[])
}

/// All trackers ordered by name
pub fn get_trackers_by_name(conn: &Connection) -> Result<Vec<Tracker>> {
    let sql = format!("SELECT {} FROM trackers ORDER BY name ASC", TRACKER_COLUMNS);
    query_trackers(conn, &sql, &[])
}

/// Trackers matching an OR-combined exact lookup
pub fn find_trackers(conn: &Connection, query: &LookupQuery) -> Result<Vec<Tracker>> {
    let (clause, values) = query.to_sql();
    let sql = format!(
        "SELECT {} FROM trackers WHERE {} ORDER BY seq ASC",
        TRACKER_COLUMNS, clause
    );
    query_trackers(conn, &sql, &values)
}

pub fn tracker_name_exists(conn: &Connection, name: &str, exclude_id: Option<&str>) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM trackers WHERE name = ?1 AND id != ?2",
        params![name, exclude_id.unwrap_or("")],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn count_trackers(conn: &Connection) -> Result<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM trackers", [], |row| row.get(0))?;
    Ok(count as usize)
}

pub fn count_trackers_in_exodus(conn: &Connection) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM trackers WHERE is_in_exodus = 1",
        [],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

impl TrackerLookup for Connection {
    fn count_published(&self) -> Result<usize> {
        count_trackers_in_exodus(self)
    }

    fn find_matching(&self, query: &LookupQuery) -> Result<Vec<Tracker>> {
        find_trackers(self, query)
    }
}

/// Username of the reviewer who created the tracker, if any
///
/// Programmatic creations (imports, system actor) have no creator.
pub fn tracker_creator(conn: &Connection, tracker_id: &str) -> Result<Option<String>> {
    let creator = conn
        .query_row(
            "SELECT users.username FROM events
             JOIN users ON users.username = events.actor
             WHERE events.entity_type = 'tracker'
               AND events.entity_id = ?1
               AND events.event_type = 'tracker_created'
             ORDER BY events.id ASC
             LIMIT 1",
            [tracker_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(creator)
}

// ============================================================================
// CATEGORIES
// ============================================================================

pub fn insert_category(conn: &Connection, category: &Category, family: CategoryFamily) -> Result<()> {
    conn.execute(
        "INSERT INTO categories (id, family, name, description, is_in_exodus, created, updated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            category.id,
            family.as_str(),
            category.name,
            category.description,
            category.is_in_exodus,
            category.created.to_rfc3339(),
            category.updated.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn category_from_row(row: &Row) -> rusqlite::Result<Category> {
    let family: String = row.get(1)?;
    let created: String = row.get(5)?;
    let updated: String = row.get(6)?;

    Ok(Category {
        id: row.get(0)?,
        family: CategoryFamily::parse(&family),
        name: row.get(2)?,
        description: row.get(3)?,
        is_in_exodus: row.get(4)?,
        created: parse_timestamp(&created, 5)?,
        updated: parse_timestamp(&updated, 6)?,
    })
}

/// Categories of one family ordered by name
pub fn get_categories(conn: &Connection, family: CategoryFamily) -> Result<Vec<Category>> {
    let mut stmt = conn.prepare(
        "SELECT id, family, name, description, is_in_exodus, created, updated
         FROM categories WHERE family = ?1 ORDER BY name ASC",
    )?;
    let categories = stmt
        .query_map([family.as_str()], category_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(categories)
}

pub fn get_category(conn: &Connection, id: &str) -> Result<Category> {
    conn.query_row(
        "SELECT id, family, name, description, is_in_exodus, created, updated
         FROM categories WHERE id = ?1",
        [id],
        category_from_row,
    )
    .optional()?
    .ok_or_else(|| CatalogError::NotFound(format!("category {}", id)))
}

pub fn category_exists(conn: &Connection, family: CategoryFamily, name: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM categories WHERE family = ?1 AND name = ?2",
        params![family.as_str(), name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn count_categories(conn: &Connection, family: CategoryFamily) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM categories WHERE family = ?1",
        [family.as_str()],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

// ============================================================================
// USERS
// ============================================================================

pub fn insert_user(conn: &Connection, user: &User) -> Result<()> {
    conn.execute(
        "INSERT INTO users (id, username, is_superuser, created) VALUES (?1, ?2, ?3, ?4)",
        params![user.id, user.username, user.is_superuser, user.created.to_rfc3339()],
    )?;
    Ok(())
}

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    let created: String = row.get(3)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        is_superuser: row.get(2)?,
        created: parse_timestamp(&created, 3)?,
    })
}

pub fn get_user_by_username(conn: &Connection, username: &str) -> Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, username, is_superuser, created FROM users WHERE username = ?1",
            [username],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}
