// ⚖️ Reconciliation Engine - compare Exodus trackers with the local catalog
//
// Every external record gets exactly one outcome:
//   0 local matches  -> NOT_FOUND
//   1 local match    -> FOUND_AND_IDENTICAL or FOUND_BUT_DIFFERENT
//   2+ local matches -> MULTIPLE_MATCHES_FOUND
//
// Matching is exact and case-sensitive on name OR code signature, restricted
// to local trackers already published to Exodus.

use crate::entities::Tracker;
use crate::error::Result;
use crate::exodus::{ExternalDataset, ExternalTracker, TrackerSource};
use crate::query::{LookupQuery, TrackerLookup};
use serde::{Deserialize, Serialize};
use std::io::Write;
use tracing::{debug, info};

/// Fields used to find the local counterpart of an external record
pub const FIELDS_TO_SEARCH: [&str; 2] = ["name", "code_signature"];

/// Fields compared once a single counterpart is found
pub const FIELDS_TO_COMPARE: [&str; 5] = [
    "name",
    "code_signature",
    "description",
    "network_signature",
    "website",
];

// ============================================================================
// LOOKUP OUTCOME
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeKind {
    FoundAndIdentical,
    FoundButDifferent,
    MultipleMatchesFound,
    NotFound,
}

impl OutcomeKind {
    /// Report order
    pub const ALL: [OutcomeKind; 4] = [
        OutcomeKind::FoundAndIdentical,
        OutcomeKind::FoundButDifferent,
        OutcomeKind::MultipleMatchesFound,
        OutcomeKind::NotFound,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            OutcomeKind::FoundAndIdentical => "FOUND_AND_IDENTICAL",
            OutcomeKind::FoundButDifferent => "FOUND_BUT_DIFFERENT",
            OutcomeKind::MultipleMatchesFound => "MULTIPLE_MATCHES_FOUND",
            OutcomeKind::NotFound => "NOT_FOUND",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDiff {
    pub field: String,
    pub local: String,
    pub external: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LookupOutcome {
    FoundAndIdentical,
    FoundButDifferent { diffs: Vec<FieldDiff> },
    MultipleMatchesFound { count: usize },
    NotFound,
}

impl LookupOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            LookupOutcome::FoundAndIdentical => OutcomeKind::FoundAndIdentical,
            LookupOutcome::FoundButDifferent { .. } => OutcomeKind::FoundButDifferent,
            LookupOutcome::MultipleMatchesFound { .. } => OutcomeKind::MultipleMatchesFound,
            LookupOutcome::NotFound => OutcomeKind::NotFound,
        }
    }
}

// ============================================================================
// RECONCILIATION REPORT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeTally {
    pub found_and_identical: usize,
    pub found_but_different: usize,
    pub multiple_matches_found: usize,
    pub not_found: usize,
}

impl OutcomeTally {
    pub fn get(&self, kind: OutcomeKind) -> usize {
        match kind {
            OutcomeKind::FoundAndIdentical => self.found_and_identical,
            OutcomeKind::FoundButDifferent => self.found_but_different,
            OutcomeKind::MultipleMatchesFound => self.multiple_matches_found,
            OutcomeKind::NotFound => self.not_found,
        }
    }

    fn record(&mut self, kind: OutcomeKind) {
        match kind {
            OutcomeKind::FoundAndIdentical => self.found_and_identical += 1,
            OutcomeKind::FoundButDifferent => self.found_but_different += 1,
            OutcomeKind::MultipleMatchesFound => self.multiple_matches_found += 1,
            OutcomeKind::NotFound => self.not_found += 1,
        }
    }

    pub fn total(&self) -> usize {
        OutcomeKind::ALL.iter().map(|kind| self.get(*kind)).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordResult {
    pub name: String,
    pub outcome: LookupOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// Records retrieved from Exodus
    pub retrieved: usize,

    /// Local trackers flagged as published
    pub expected_local: usize,

    pub results: Vec<RecordResult>,
    pub tally: OutcomeTally,
}

impl ReconciliationReport {
    pub fn summary(&self) -> String {
        format!(
            "{} Exodus trackers checked against {} local: {} identical, {} different, {} ambiguous, {} missing",
            self.retrieved,
            self.expected_local,
            self.tally.found_and_identical,
            self.tally.found_but_different,
            self.tally.multiple_matches_found,
            self.tally.not_found
        )
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ReconciliationEngine {
    /// Print differing field names only, not their values
    pub quiet: bool,

    /// One field left out of the comparison
    pub ignore_field: Option<String>,
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn ignore_field(mut self, field: Option<String>) -> Self {
        self.ignore_field = field;
        self
    }

    fn compared_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        FIELDS_TO_COMPARE
            .into_iter()
            .filter(move |field| self.ignore_field.as_deref() != Some(*field))
    }

    /// OR-combined exact lookup over the search fields, published trackers only
    pub fn build_query(record: &ExternalTracker) -> LookupQuery {
        FIELDS_TO_SEARCH
            .iter()
            .fold(LookupQuery::new(), |query, field| {
                query.or_exact(field, record.get_str(field))
            })
            .published_only()
    }

    /// Compared fields whose values differ; an absent external value differs
    pub fn diff_fields(&self, record: &ExternalTracker, local: &Tracker) -> Vec<FieldDiff> {
        self.compared_fields()
            .filter_map(|field| {
                let local_value = local.field_value(field).unwrap_or_default();
                if record.get_str(field) == Some(local_value.as_str()) {
                    None
                } else {
                    Some(FieldDiff {
                        field: field.to_string(),
                        local: local_value,
                        external: record.display_value(field),
                    })
                }
            })
            .collect()
    }

    /// Classify one external record against the local store
    pub fn lookup<L>(&self, local: &L, record: &ExternalTracker) -> Result<LookupOutcome>
    where
        L: TrackerLookup + ?Sized,
    {
        let matches = local.find_matching(&Self::build_query(record))?;

        let outcome = match matches.as_slice() {
            [] => LookupOutcome::NotFound,
            [single] => {
                let diffs = self.diff_fields(record, single);
                if diffs.is_empty() {
                    LookupOutcome::FoundAndIdentical
                } else {
                    LookupOutcome::FoundButDifferent { diffs }
                }
            }
            several => LookupOutcome::MultipleMatchesFound {
                count: several.len(),
            },
        };

        debug!(tracker = record.name(), outcome = outcome.kind().label(), "lookup");
        Ok(outcome)
    }

    fn write_outcome(&self, out: &mut dyn Write, name: &str, outcome: &LookupOutcome) -> Result<()> {
        if let LookupOutcome::FoundAndIdentical = outcome {
            return Ok(());
        }

        writeln!(out, "{} - {}", outcome.kind().label(), name)?;

        if let LookupOutcome::FoundButDifferent { diffs } = outcome {
            for diff in diffs {
                writeln!(out, "[{}]", diff.field)?;
                if !self.quiet {
                    writeln!(out, "local : {}", diff.local)?;
                    writeln!(out, "exodus: {}", diff.external)?;
                }
            }
        }

        Ok(())
    }

    /// Reconcile an already fetched dataset, writing the report to `out`
    pub fn run<L>(
        &self,
        local: &L,
        dataset: &ExternalDataset,
        out: &mut dyn Write,
    ) -> Result<ReconciliationReport>
    where
        L: TrackerLookup + ?Sized,
    {
        let mut report = ReconciliationReport {
            retrieved: dataset.len(),
            expected_local: local.count_published()?,
            ..Default::default()
        };

        writeln!(out, "Retrieved {} trackers from Exodus", report.retrieved)?;
        writeln!(
            out,
            "Found {} trackers in local catalog expected to be in Exodus",
            report.expected_local
        )?;

        if let Some(field) = &self.ignore_field {
            writeln!(out, "Going to ignore field {} in comparison.", field)?;
        }
        if self.quiet {
            writeln!(out, "Using quiet mode; Not going to display diff details.")?;
        }

        writeln!(out, "Starting case-sensitive lookup...")?;

        for record in &dataset.trackers {
            let outcome = self.lookup(local, record)?;
            self.write_outcome(out, record.name(), &outcome)?;
            report.tally.record(outcome.kind());
            report.results.push(RecordResult {
                name: record.name().to_string(),
                outcome,
            });
        }

        writeln!(out, "Lookup results:")?;
        for kind in OutcomeKind::ALL {
            writeln!(out, "** {}: {}", kind.label(), report.tally.get(kind))?;
        }

        info!("{}", report.summary());
        Ok(report)
    }

    /// Fetch from `source` then reconcile; fetch errors abort before any output
    pub async fn reconcile<L>(
        &self,
        source: &dyn TrackerSource,
        local: &L,
        out: &mut dyn Write,
    ) -> Result<ReconciliationReport>
    where
        L: TrackerLookup + ?Sized,
    {
        let dataset = source.fetch_trackers().await?;
        self.run(local, &dataset, out)
    }
}
