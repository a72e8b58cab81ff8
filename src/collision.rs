// 🔍 Signature Collision Detector - does one signature overlap another?
//
// A tracker's signature, read as a regex, collides with another tracker's
// literal signature when it finds a match anywhere inside it. Signatures of
// `MIN_SIGNATURE_LENGTH` characters or fewer are too generic to count.

use crate::entities::Tracker;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const MIN_SIGNATURE_LENGTH: usize = 4;

// ============================================================================
// SIGNATURE KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureKind {
    /// Package name pattern
    Code,

    /// Hostname pattern
    Network,
}

impl SignatureKind {
    fn of(self, tracker: &Tracker) -> &str {
        match self {
            SignatureKind::Code => &tracker.code_signature,
            SignatureKind::Network => &tracker.network_signature,
        }
    }
}

// ============================================================================
// PREDICATES
// ============================================================================

/// Compiled form of a signature, None when too short or not a valid regex
fn signature_regex(pattern: &str, min_length: usize) -> Option<Regex> {
    if pattern.chars().count() <= min_length {
        return None;
    }

    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(pattern, error = %e, "stored signature does not compile");
            None
        }
    }
}

/// True when `pattern` is longer than `min_length` and matches inside `candidate`
///
/// A pattern that does not compile never collides.
pub fn signatures_collide(pattern: &str, candidate: &str, min_length: usize) -> bool {
    signature_regex(pattern, min_length).is_some_and(|re| re.is_match(candidate))
}

/// One tracker's signature of `kind`, compiled once and matched against many
struct Matcher<'a> {
    tracker: &'a Tracker,
    kind: SignatureKind,
    regex: Option<Regex>,
}

impl<'a> Matcher<'a> {
    fn new(kind: SignatureKind, tracker: &'a Tracker) -> Self {
        Self {
            tracker,
            kind,
            regex: signature_regex(kind.of(tracker), MIN_SIGNATURE_LENGTH),
        }
    }

    fn collides_with(&self, other: &Tracker) -> bool {
        match &self.regex {
            Some(re) => self.tracker.id != other.id && re.is_match(self.kind.of(other)),
            None => false,
        }
    }
}

/// Any other tracker whose code or network signature is matched by ours
pub fn has_any_signature_collision(tracker: &Tracker, others: &[Tracker]) -> bool {
    let code = Matcher::new(SignatureKind::Code, tracker);
    let network = Matcher::new(SignatureKind::Network, tracker);

    others
        .iter()
        .any(|other| code.collides_with(other) || network.collides_with(other))
}

/// Other trackers colliding on code signature, in input order
pub fn trackers_with_code_signature_collision(tracker: &Tracker, others: &[Tracker]) -> Vec<Tracker> {
    colliding_with(SignatureKind::Code, tracker, others)
}

/// Other trackers colliding on network signature, in input order
pub fn trackers_with_network_signature_collision(
    tracker: &Tracker,
    others: &[Tracker],
) -> Vec<Tracker> {
    colliding_with(SignatureKind::Network, tracker, others)
}

fn colliding_with(kind: SignatureKind, tracker: &Tracker, others: &[Tracker]) -> Vec<Tracker> {
    let matcher = Matcher::new(kind, tracker);
    others
        .iter()
        .filter(|other| matcher.collides_with(other))
        .cloned()
        .collect()
}

// ============================================================================
// COLLISION REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollidingTracker {
    pub id: String,
    pub name: String,
    pub kind: SignatureKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollisionEntry {
    pub tracker_id: String,
    pub tracker_name: String,
    pub collisions: Vec<CollidingTracker>,
}

/// Every tracker with at least one collision, with who it collides with
pub fn collision_report(trackers: &[Tracker]) -> Vec<CollisionEntry> {
    trackers
        .iter()
        .filter_map(|tracker| {
            let mut collisions = Vec::new();

            for kind in [SignatureKind::Code, SignatureKind::Network] {
                for other in colliding_with(kind, tracker, trackers) {
                    collisions.push(CollidingTracker {
                        id: other.id,
                        name: other.name,
                        kind,
                    });
                }
            }

            if collisions.is_empty() {
                None
            } else {
                Some(CollisionEntry {
                    tracker_id: tracker.id.clone(),
                    tracker_name: tracker.name.clone(),
                    collisions,
                })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(name: &str, code: &str, network: &str) -> Tracker {
        Tracker::new(name).with_signatures(code, network)
    }

    #[test]
    fn test_no_collision_on_different_signatures() {
        let t1 = tracker("tracker1", "com.tracker1.ads", "tracker1.com");
        let t2 = tracker("tracker2", "com.tracker2.ads", "tracker2.com");
        let all = vec![t1.clone(), t2.clone()];

        assert!(!has_any_signature_collision(&t1, &all));
        assert!(!has_any_signature_collision(&t2, &all));
    }

    #[test]
    fn test_code_signature_collision() {
        let t1 = tracker("tracker1", "com.tracker", "");
        let t2 = tracker("tracker2", "com.tracker.ads", "");
        let all = vec![t1.clone(), t2.clone()];

        assert!(has_any_signature_collision(&t1, &all));
        assert!(!has_any_signature_collision(&t2, &all));

        let found = trackers_with_code_signature_collision(&t1, &all);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, t2.id);
        assert!(trackers_with_network_signature_collision(&t1, &all).is_empty());
    }

    #[test]
    fn test_network_signature_collision() {
        let t1 = tracker("tracker1", "", "tracker.com");
        let t2 = tracker("tracker2", "", "ads.tracker.com");
        let all = vec![t1.clone(), t2.clone()];

        assert!(has_any_signature_collision(&t1, &all));
        let found = trackers_with_network_signature_collision(&t1, &all);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "tracker2");
    }

    #[test]
    fn test_short_signatures_never_collide() {
        let t1 = tracker("tracker1", "com.", "a.io");
        let t2 = tracker("tracker2", "com.tracker", "a.io.cdn");
        let all = vec![t1.clone(), t2];

        assert!(!has_any_signature_collision(&t1, &all));
        assert!(!signatures_collide("", "anything", MIN_SIGNATURE_LENGTH));
        assert!(signatures_collide("com.t", "com.tracker", MIN_SIGNATURE_LENGTH));
    }

    #[test]
    fn test_tracker_never_collides_with_itself() {
        let t1 = tracker("tracker1", "com.tracker", "tracker.com");
        assert!(!has_any_signature_collision(&t1, &[t1.clone()]));
    }

    #[test]
    fn test_pattern_semantics_are_regex() {
        // '.' matches any character
        assert!(signatures_collide("com.tracker", "comXtracker.sdk", 4));
        assert!(signatures_collide(r"ads\.tracker", "io.ads.tracker", 4));
        assert!(!signatures_collide(r"^ads\.tracker", "io.ads.tracker", 4));
    }

    #[test]
    fn test_invalid_pattern_is_no_match() {
        assert!(!signatures_collide("*com.tracker", "com.tracker", 4));
    }

    #[test]
    fn test_invalid_stored_signature_never_collides() {
        let broken = tracker("broken", "*com.tracker", "(tracker.com");
        let others: Vec<Tracker> = (0..50)
            .map(|i| tracker(&format!("t{}", i), &format!("com.tracker.{}", i), "tracker.com"))
            .collect();

        assert!(!has_any_signature_collision(&broken, &others));
        assert!(trackers_with_code_signature_collision(&broken, &others).is_empty());
        assert!(trackers_with_network_signature_collision(&broken, &others).is_empty());
        assert!(has_any_signature_collision(&others[0], &others));
    }

    #[test]
    fn test_collisions_keep_input_order() {
        let t1 = tracker("base", "com.base", "");
        let t2 = tracker("second", "com.base.second", "");
        let t3 = tracker("third", "com.other", "");
        let t4 = tracker("fourth", "com.base.fourth", "");
        let all = vec![t1.clone(), t2, t3, t4];

        let names: Vec<String> = trackers_with_code_signature_collision(&t1, &all)
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["second", "fourth"]);
    }

    #[test]
    fn test_collision_report() {
        let t1 = tracker("tracker1", "com.tracker", "tracker.com");
        let t2 = tracker("tracker2", "com.tracker.ads", "cdn.tracker.com");
        let t3 = tracker("tracker3", "org.unrelated", "unrelated.org");
        let report = collision_report(&[t1.clone(), t2, t3]);

        assert_eq!(report.len(), 1);
        assert_eq!(report[0].tracker_id, t1.id);
        let kinds: Vec<SignatureKind> = report[0].collisions.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![SignatureKind::Code, SignatureKind::Network]);
    }
}
