// 📋 Tracker listing - browse filters and pagination
//
// Filters combine with AND over the name-ordered tracker list, then the
// result is cut into pages of `PAGE_SIZE`.

use crate::approval::{self, ReviewState};
use crate::collision;
use crate::db;
use crate::entities::Tracker;
use crate::error::{CatalogError, Result};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    #[default]
    All,
    /// Published to Exodus
    Exodus,
    /// Only in the local catalog
    Local,
}

impl Scope {
    /// `trackers_select` query values; unknown values mean All
    pub fn parse(value: &str) -> Self {
        match value {
            "exodus" => Scope::Exodus,
            "etip" | "local" => Scope::Local,
            _ => Scope::All,
        }
    }

    fn admits(&self, tracker: &Tracker) -> bool {
        match self {
            Scope::All => true,
            Scope::Exodus => tracker.is_in_exodus,
            Scope::Local => !tracker.is_in_exodus,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerFilter {
    pub name_prefix: Option<String>,
    pub only_collisions: bool,
    pub scope: Scope,
    pub review: Option<ReviewState>,
}

impl TrackerFilter {
    /// Build from browse query parameters
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let get = |key: &str| params.get(key).map(String::as_str).unwrap_or("");

        TrackerFilter {
            name_prefix: Some(get("tracker_name"))
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            only_collisions: matches!(get("only_collisions"), "true" | "on" | "1"),
            scope: Scope::parse(get("trackers_select")),
            review: ReviewState::parse(get("approve_select")),
        }
    }

    pub fn with_name_prefix(mut self, prefix: &str) -> Self {
        self.name_prefix = Some(prefix.to_string());
        self
    }

    pub fn only_collisions(mut self) -> Self {
        self.only_collisions = true;
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_review(mut self, review: ReviewState) -> Self {
        self.review = Some(review);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Matches across all pages
    pub count: usize,
    /// 1-based
    pub page: usize,
    pub num_pages: usize,
}

impl<T: Clone> Page<T> {
    /// Slice page `page` out of `all`; an empty list still has page 1
    pub fn paginate(all: &[T], page: usize, per_page: usize) -> Result<Self> {
        let count = all.len();
        let num_pages = count.div_ceil(per_page).max(1);

        if page == 0 || page > num_pages {
            return Err(CatalogError::NotFound(format!("page {}", page)));
        }

        let start = (page - 1) * per_page;
        let end = (start + per_page).min(count);

        Ok(Page {
            items: all[start..end].to_vec(),
            count,
            page,
            num_pages,
        })
    }

    pub fn has_next(&self) -> bool {
        self.page < self.num_pages
    }
}

/// Trackers matching `filter`, ordered by name
pub fn filter_trackers(conn: &Connection, filter: &TrackerFilter) -> Result<Vec<Tracker>> {
    let all = db::get_trackers_by_name(conn)?;
    let mut selected = Vec::new();

    for tracker in &all {
        if let Some(prefix) = &filter.name_prefix {
            if !tracker.name.starts_with(prefix.as_str()) {
                continue;
            }
        }

        if !filter.scope.admits(tracker) {
            continue;
        }

        if filter.only_collisions && !collision::has_any_signature_collision(tracker, &all) {
            continue;
        }

        if let Some(review) = filter.review {
            if approval::classify(conn, &tracker.id)? != review {
                continue;
            }
        }

        selected.push(tracker.clone());
    }

    Ok(selected)
}

pub fn list_trackers(conn: &Connection, filter: &TrackerFilter, page: usize) -> Result<Page<Tracker>> {
    let trackers = filter_trackers(conn, filter)?;
    Page::paginate(&trackers, page, PAGE_SIZE)
}
