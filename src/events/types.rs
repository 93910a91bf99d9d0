//! Event type definitions for progress reporting.

use crate::core::catalog::LibraryTag;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted during a scan run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Run-level events
    Run(RunEvent),
    /// Hashing phase events
    Hash(HashEvent),
    /// Index construction events
    Index(IndexEvent),
    /// Candidate generation events
    Match(MatchEvent),
}

/// Events during the hashing phase of one library
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HashEvent {
    /// Hashing has started for a library
    Started { library: LibraryTag, total: usize },
    /// One more item finished (hashed, failed or skipped)
    Progress(HashProgress),
    /// An item could not be hashed; the run continues
    Failed {
        library: LibraryTag,
        owner_id: String,
        path: Option<PathBuf>,
        message: String,
    },
    /// Hashing finished for a library
    Completed {
        library: LibraryTag,
        hashed: usize,
        failed: usize,
        incomplete: usize,
        cache_hits: usize,
    },
}

/// Progress information during hashing.
///
/// `completed` never decreases within one library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashProgress {
    pub library: LibraryTag,
    /// Number of items finished so far
    pub completed: usize,
    /// Total number of items in the library
    pub total: usize,
    /// Number of items served from the hash cache so far
    pub cache_hits: usize,
}

/// Events while building the per-library similarity index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IndexEvent {
    Built {
        library: LibraryTag,
        entries: usize,
        nodes: usize,
        depth: usize,
    },
    /// Nothing hashed successfully, the index is empty
    Empty { library: LibraryTag },
}

/// Events during candidate generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MatchEvent {
    Started,
    DedupeCompleted { library: LibraryTag, pairs: usize },
    CrossCompleted { pairs: usize, unmatched: usize },
    Completed { total_pairs: usize },
}

/// Run-level events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RunEvent {
    Started { run_id: String },
    PhaseChanged { phase: RunPhase },
    Completed { summary: RunSummary },
    Cancelled,
    Error { message: String },
}

/// Phases of a scan run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    Listing,
    Hashing,
    Indexing,
    Matching,
    Writing,
}

/// Summary of a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_items: usize,
    pub hashed: usize,
    pub failed: usize,
    pub candidate_pairs: usize,
    pub unmatched: usize,
    pub duration_ms: u64,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunPhase::Listing => write!(f, "Listing"),
            RunPhase::Hashing => write!(f, "Hashing"),
            RunPhase::Indexing => write!(f, "Indexing"),
            RunPhase::Matching => write!(f, "Matching"),
            RunPhase::Writing => write!(f, "Writing"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_serializable() {
        let event = Event::Hash(HashEvent::Progress(HashProgress {
            library: LibraryTag::Iphoto,
            completed: 10,
            total: 50,
            cache_hits: 3,
        }));

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: Event = serde_json::from_str(&json).unwrap();

        match deserialized {
            Event::Hash(HashEvent::Progress(p)) => {
                assert_eq!(p.completed, 10);
                assert_eq!(p.library, LibraryTag::Iphoto);
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn phase_display() {
        assert_eq!(RunPhase::Indexing.to_string(), "Indexing");
    }
}
