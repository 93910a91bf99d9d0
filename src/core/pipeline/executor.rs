//! Scan execution.

use super::ScanConfig;
use crate::core::artifacts::{ArtifactPaths, ArtifactWriter, RunMetadata};
use crate::core::cache::HashCache;
use crate::core::catalog::{ImageRecord, LibraryCatalog, LibraryTag};
use crate::core::hasher::{HashCodec, HasherConfig};
use crate::core::matcher::{
    CandidateGenerator, CandidateSet, IndexedLibrary, PairCandidate, PairType, UnmatchedRecord,
};
use crate::core::pool::{
    CancellationToken, HashBatch, HashFailure, HashJob, HashWorkerPool, HashedImage,
    IncompleteItem,
};
use crate::error::{CatalogError, MatcherError, ValidationError};
use crate::events::{
    null_sender, Event, EventSender, IndexEvent, MatchEvent, RunEvent, RunPhase, RunSummary,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How far a library got in the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LibraryStatus {
    /// At least one item was hashed and indexed
    Indexed,
    /// Nothing to index: no items, or every item failed
    Empty,
    /// Not hashed because the run was cancelled first
    Skipped,
}

/// Per-library counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibrarySummary {
    pub library: LibraryTag,
    pub total: usize,
    pub hashed: usize,
    pub failed: usize,
    pub incomplete: usize,
    pub cache_hits: usize,
    pub status: LibraryStatus,
}

/// Result of a scan run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub run_id: String,
    /// Ranked candidate pairs
    pub candidates: Vec<PairCandidate>,
    pub unmatched: Vec<UnmatchedRecord>,
    /// Items that could not be hashed (non-fatal)
    pub failures: Vec<HashFailure>,
    /// Items not hashed because the run was cancelled
    pub incomplete: Vec<IncompleteItem>,
    pub libraries: Vec<LibrarySummary>,
    pub cache_hits: usize,
    pub duration_ms: u64,
    pub cancelled: bool,
    pub artifacts: ArtifactPaths,
}

impl ScanReport {
    pub fn total_items(&self) -> usize {
        self.libraries.iter().map(|l| l.total).sum()
    }

    pub fn hashed(&self) -> usize {
        self.libraries.iter().map(|l| l.hashed).sum()
    }

    pub fn count_of(&self, pair_type: PairType) -> usize {
        self.candidates
            .iter()
            .filter(|c| c.pair_type == pair_type)
            .count()
    }

    fn summary(&self) -> RunSummary {
        RunSummary {
            total_items: self.total_items(),
            hashed: self.hashed(),
            failed: self.failures.len(),
            candidate_pairs: self.candidates.len(),
            unmatched: self.unmatched.len(),
            duration_ms: self.duration_ms,
        }
    }
}

/// Builder for a scan
pub struct ScannerBuilder {
    config: ScanConfig,
    primary: Option<Box<dyn LibraryCatalog>>,
    secondary: Option<Box<dyn LibraryCatalog>>,
    output_dir: PathBuf,
    cancel: CancellationToken,
}

impl ScannerBuilder {
    pub fn new() -> Self {
        Self {
            config: ScanConfig::default(),
            primary: None,
            secondary: None,
            output_dir: PathBuf::from("work"),
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(mut self, config: ScanConfig) -> Self {
        self.config = config;
        self
    }

    /// The library that is deduplicated and matched against
    pub fn primary(mut self, catalog: Box<dyn LibraryCatalog>) -> Self {
        self.primary = Some(catalog);
        self
    }

    /// The library whose items are looked up in the primary one
    pub fn secondary(mut self, catalog: Box<dyn LibraryCatalog>) -> Self {
        self.secondary = Some(catalog);
        self
    }

    /// Where artifacts and hash caches go
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Validate and build
    pub fn build(self) -> Result<Scanner, ValidationError> {
        self.config.validate()?;

        let primary = self.primary.ok_or(ValidationError::MissingPrimaryLibrary)?;
        if let Some(secondary) = &self.secondary {
            if secondary.library() == primary.library() {
                return Err(ValidationError::DuplicateLibraryTag {
                    tag: primary.library().to_string(),
                });
            }
        }

        Ok(Scanner {
            config: self.config,
            primary,
            secondary: self.secondary,
            output_dir: self.output_dir,
            cancel: self.cancel,
        })
    }
}

impl Default for ScannerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Hashes, indexes and matches one or two libraries
pub struct Scanner {
    config: ScanConfig,
    primary: Box<dyn LibraryCatalog>,
    secondary: Option<Box<dyn LibraryCatalog>>,
    output_dir: PathBuf,
    cancel: CancellationToken,
}

/// Hashing results of every library, in catalog order
struct HashedLibraries {
    hashed: Vec<(LibraryTag, Vec<HashedImage>)>,
    failures: Vec<HashFailure>,
    incomplete: Vec<IncompleteItem>,
    summaries: Vec<LibrarySummary>,
    cache_hits: usize,
}

impl Scanner {
    pub fn builder() -> ScannerBuilder {
        ScannerBuilder::new()
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Token that cancels this scan from another thread
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run without events
    pub fn run(&self) -> Result<ScanReport, MatcherError> {
        self.run_with_events(&null_sender())
    }

    /// Run with event reporting
    pub fn run_with_events(&self, events: &EventSender) -> Result<ScanReport, MatcherError> {
        let run_id = Uuid::new_v4().to_string();
        events.send(Event::Run(RunEvent::Started {
            run_id: run_id.clone(),
        }));
        info!(
            "Starting scan {} ({}, dedupe {}, cross {}, {} workers)",
            run_id,
            self.config.params(),
            self.config.dedupe_threshold,
            self.config.cross_threshold,
            self.config.workers
        );

        let result = self.execute(run_id, events);
        match &result {
            Ok(report) if report.cancelled => events.send(Event::Run(RunEvent::Cancelled)),
            Ok(report) => events.send(Event::Run(RunEvent::Completed {
                summary: report.summary(),
            })),
            Err(e) => events.send(Event::Run(RunEvent::Error {
                message: e.to_string(),
            })),
        }
        result
    }

    fn catalogs(&self) -> Vec<&dyn LibraryCatalog> {
        let mut catalogs = vec![self.primary.as_ref()];
        if let Some(secondary) = &self.secondary {
            catalogs.push(secondary.as_ref());
        }
        catalogs
    }

    fn phase(&self, events: &EventSender, phase: RunPhase) {
        debug!("Entering {} phase", phase);
        events.send(Event::Run(RunEvent::PhaseChanged { phase }));
    }

    fn execute(&self, run_id: String, events: &EventSender) -> Result<ScanReport, MatcherError> {
        let start = Instant::now();

        self.phase(events, RunPhase::Listing);
        let mut listings = Vec::new();
        for catalog in self.catalogs() {
            let records = catalog.list_items()?;
            info!("Listed {} items in {} library", records.len(), catalog.library());
            listings.push((catalog, records));
        }
        ensure_distinct_libraries(&listings)?;

        self.phase(events, RunPhase::Hashing);
        let hashed = self.hash_all(&listings, events)?;
        let writer = ArtifactWriter::new(&self.output_dir);

        if self.cancel.check().is_err() {
            info!("Scan {} cancelled after hashing", run_id);
            let error_log = writer.append_errors(&hashed.failures)?;
            return Ok(ScanReport {
                run_id,
                candidates: Vec::new(),
                unmatched: Vec::new(),
                failures: hashed.failures,
                incomplete: hashed.incomplete,
                libraries: hashed.summaries,
                cache_hits: hashed.cache_hits,
                duration_ms: start.elapsed().as_millis() as u64,
                cancelled: true,
                artifacts: ArtifactPaths {
                    error_log,
                    ..ArtifactPaths::default()
                },
            });
        }

        self.phase(events, RunPhase::Indexing);
        let params = self.config.params();
        let mut indexed = Vec::new();
        for (library, images) in &hashed.hashed {
            let library_index = IndexedLibrary::build(*library, params, images)?;
            if library_index.index.is_empty() {
                events.send(Event::Index(IndexEvent::Empty { library: *library }));
            } else {
                events.send(Event::Index(IndexEvent::Built {
                    library: *library,
                    entries: library_index.index.len(),
                    nodes: library_index.index.node_count(),
                    depth: library_index.index.depth(),
                }));
            }
            indexed.push(library_index);
        }

        self.phase(events, RunPhase::Matching);
        let set = self.match_libraries(&indexed, events)?;

        self.phase(events, RunPhase::Writing);
        let metadata = RunMetadata::new(
            &run_id,
            params,
            self.config.match_config(),
            set.candidates.len(),
        );
        let artifacts = writer.write_all(&set, &hashed.failures, &metadata)?;

        let report = ScanReport {
            run_id,
            candidates: set.candidates,
            unmatched: set.unmatched,
            failures: hashed.failures,
            incomplete: hashed.incomplete,
            libraries: hashed.summaries,
            cache_hits: hashed.cache_hits,
            duration_ms: start.elapsed().as_millis() as u64,
            cancelled: false,
            artifacts,
        };

        info!(
            "Scan {} finished in {} ms: {} pairs, {} unmatched, {} failures",
            report.run_id,
            report.duration_ms,
            report.candidates.len(),
            report.unmatched.len(),
            report.failures.len()
        );

        Ok(report)
    }

    fn hash_all(
        &self,
        listings: &[(&dyn LibraryCatalog, Vec<ImageRecord>)],
        events: &EventSender,
    ) -> Result<HashedLibraries, MatcherError> {
        let codec = HasherConfig::new()
            .method(self.config.hash_method)
            .hash_size(self.config.hash_size)
            .build()?;
        let pool = HashWorkerPool::new(self.config.workers)?;

        let mut result = HashedLibraries {
            hashed: Vec::new(),
            failures: Vec::new(),
            incomplete: Vec::new(),
            summaries: Vec::new(),
            cache_hits: 0,
        };

        for (catalog, records) in listings {
            let library = catalog.library();

            if self.cancel.is_cancelled() {
                result.incomplete.extend(records.iter().map(|r| IncompleteItem {
                    owner_id: r.id.clone(),
                    library,
                }));
                result.summaries.push(LibrarySummary {
                    library,
                    total: records.len(),
                    hashed: 0,
                    failed: 0,
                    incomplete: records.len(),
                    cache_hits: 0,
                    status: LibraryStatus::Skipped,
                });
                result.hashed.push((library, Vec::new()));
                continue;
            }

            let batch = self.hash_library(&pool, &codec, *catalog, records, events)?;

            let status = if batch.hashed_count() > 0 {
                LibraryStatus::Indexed
            } else {
                LibraryStatus::Empty
            };
            if status == LibraryStatus::Empty {
                info!("{} library has nothing to index", library);
            }

            result.summaries.push(LibrarySummary {
                library,
                total: records.len(),
                hashed: batch.hashed_count(),
                failed: batch.failed_count(),
                incomplete: batch.incomplete_count(),
                cache_hits: batch.cache_hits,
                status,
            });
            result.cache_hits += batch.cache_hits;

            let (hashed, failed, incomplete) = batch.into_parts();
            result.hashed.push((library, hashed));
            result.failures.extend(failed);
            result.incomplete.extend(incomplete);
        }

        Ok(result)
    }

    /// Hash one library, reading and refreshing its cache file.
    fn hash_library(
        &self,
        pool: &HashWorkerPool,
        codec: &HashCodec,
        catalog: &dyn LibraryCatalog,
        records: &[ImageRecord],
        events: &EventSender,
    ) -> Result<HashBatch, MatcherError> {
        let library = catalog.library();
        let cache_path = HashCache::path_for(&self.output_dir, library.as_str());

        let cache = if self.config.use_cache {
            match HashCache::load(&cache_path) {
                Ok(cache) => {
                    debug!("Loaded {} cached hashes for {}", cache.len(), library);
                    Some(cache)
                }
                Err(e) => {
                    warn!("{}; hashing {} from scratch", e, library);
                    Some(HashCache::new())
                }
            }
        } else {
            None
        };

        let job = HashJob {
            library,
            records,
            catalog,
            codec,
            cache: cache.as_ref(),
            prefer_edited: self.config.prefer_edited,
        };
        let mut batch = pool.run(&job, events, &self.cancel);

        if let Some(mut cache) = cache {
            let owners: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();
            let dropped = cache.retain_owners(&owners);
            if dropped > 0 {
                debug!("Dropped {} stale cache entries for {}", dropped, library);
            }
            for (owner_id, entry) in std::mem::take(&mut batch.fresh_entries) {
                cache.insert(owner_id, entry);
            }
            cache.save(&cache_path)?;
        }

        Ok(batch)
    }

    fn match_libraries(
        &self,
        indexed: &[IndexedLibrary<'_>],
        events: &EventSender,
    ) -> Result<CandidateSet, MatcherError> {
        events.send(Event::Match(MatchEvent::Started));
        let generator = CandidateGenerator::new(self.config.params(), self.config.match_config());

        let (primary, secondary) = match indexed {
            [primary] => (primary, None),
            [primary, secondary, ..] => (primary, Some(secondary)),
            [] => return Ok(CandidateSet::default()),
        };

        let set = generator.generate(primary, secondary)?;

        for library in indexed {
            let pairs = set
                .candidates
                .iter()
                .filter(|c| c.pair_type == PairType::dupe_within(library.library))
                .count();
            events.send(Event::Match(MatchEvent::DedupeCompleted {
                library: library.library,
                pairs,
            }));
        }
        if secondary.is_some() {
            events.send(Event::Match(MatchEvent::CrossCompleted {
                pairs: set
                    .candidates
                    .iter()
                    .filter(|c| c.pair_type == PairType::CrossLibrary)
                    .count(),
                unmatched: set.unmatched.len(),
            }));
        }
        events.send(Event::Match(MatchEvent::Completed {
            total_pairs: set.candidates.len(),
        }));

        Ok(set)
    }
}

/// Pairs and cache files are keyed by id, so an id may belong to one library only.
fn ensure_distinct_libraries(
    listings: &[(&dyn LibraryCatalog, Vec<ImageRecord>)],
) -> Result<(), CatalogError> {
    let mut owners: HashMap<&str, LibraryTag> = HashMap::new();
    for (catalog, records) in listings {
        for record in records {
            if let Some(first) = owners.insert(record.id.as_str(), catalog.library()) {
                if first != catalog.library() {
                    return Err(CatalogError::SharedId {
                        id: record.id.clone(),
                        first: first.to_string(),
                        second: catalog.library().to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}
