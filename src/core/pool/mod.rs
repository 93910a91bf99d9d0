//! # Pool Module
//!
//! Hashes the records of one library on a fixed-size worker pool.
//!
//! Workers resolve, decode and hash records and send each outcome over a
//! channel. The calling thread drains that channel, so progress events are
//! emitted from one place and `completed` only ever grows. Workers never
//! see the similarity index.

mod cancel;
mod outcome;

pub use cancel::{CancellationToken, CancelledError};
pub use outcome::{FailureKind, HashBatch, HashFailure, HashOutcome, HashedImage, IncompleteItem};

use crate::core::cache::{CacheEntry, FileStamp, HashCache};
use crate::core::catalog::{ImageRecord, ImageRef, LibraryCatalog, LibraryTag};
use crate::core::hasher::{HashCode, HashCodec};
use crate::error::{HashError, MatcherError, ValidationError};
use crate::events::{Event, EventSender, HashEvent, HashProgress};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

/// Everything the workers need to hash one library
pub struct HashJob<'a> {
    pub library: LibraryTag,
    pub records: &'a [ImageRecord],
    pub catalog: &'a dyn LibraryCatalog,
    pub codec: &'a HashCodec,
    /// Read-only during the run; fresh entries come back in the batch
    pub cache: Option<&'a HashCache>,
    pub prefer_edited: bool,
}

/// One worker's result for one record
struct WorkItem {
    index: usize,
    outcome: HashOutcome,
    fresh_entry: Option<CacheEntry>,
}

/// Fixed-size pool of hashing threads
pub struct HashWorkerPool {
    workers: usize,
    pool: ThreadPool,
}

impl HashWorkerPool {
    pub fn new(workers: usize) -> Result<Self, MatcherError> {
        if workers == 0 {
            return Err(ValidationError::InvalidWorkerCount { value: workers }.into());
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("hash-worker-{}", i))
            .build()
            .map_err(|e| MatcherError::WorkerPool(e.to_string()))?;

        Ok(Self { workers, pool })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Hash every record of `job`.
    ///
    /// Never fails: per-item problems become [`HashOutcome::Failed`] and items
    /// not started before cancellation become [`HashOutcome::Incomplete`].
    pub fn run(&self, job: &HashJob<'_>, events: &EventSender, cancel: &CancellationToken) -> HashBatch {
        let total = job.records.len();
        events.send(Event::Hash(HashEvent::Started {
            library: job.library,
            total,
        }));

        let (tx, rx) = crossbeam_channel::unbounded::<WorkItem>();

        let mut slots: Vec<Option<HashOutcome>> = vec![None; total];
        let mut fresh_entries = Vec::new();
        let mut cache_hits = 0;

        std::thread::scope(|scope| {
            scope.spawn(move || {
                self.pool.install(|| {
                    job.records
                        .par_iter()
                        .enumerate()
                        .for_each_with(tx, |tx, (index, record)| {
                            let item = if cancel.is_cancelled() {
                                WorkItem {
                                    index,
                                    outcome: HashOutcome::Incomplete(IncompleteItem {
                                        owner_id: record.id.clone(),
                                        library: job.library,
                                    }),
                                    fresh_entry: None,
                                }
                            } else {
                                hash_guarded(job, index, record)
                            };
                            // The collector outlives every worker
                            let _ = tx.send(item);
                        });
                });
            });

            let mut completed = 0;
            for item in rx.iter() {
                completed += 1;

                match &item.outcome {
                    HashOutcome::Hashed(hashed) if hashed.from_cache => cache_hits += 1,
                    HashOutcome::Failed(failure) => {
                        tracing::warn!(
                            "Could not hash {}:{} ({}): {}",
                            failure.library,
                            failure.owner_id,
                            failure.kind,
                            failure.reason
                        );
                        events.send(Event::Hash(HashEvent::Failed {
                            library: failure.library,
                            owner_id: failure.owner_id.clone(),
                            path: Some(failure.path.clone()),
                            message: failure.reason.clone(),
                        }));
                    }
                    _ => {}
                }

                if let Some(entry) = item.fresh_entry {
                    fresh_entries.push((item.outcome.owner_id().to_string(), entry));
                }
                if let Some(slot) = slots.get_mut(item.index) {
                    *slot = Some(item.outcome);
                }

                events.send(Event::Hash(HashEvent::Progress(HashProgress {
                    library: job.library,
                    completed,
                    total,
                    cache_hits,
                })));
            }
        });

        let outcomes: Vec<HashOutcome> = slots
            .into_iter()
            .zip(job.records)
            .map(|(slot, record)| {
                slot.unwrap_or_else(|| {
                    HashOutcome::Incomplete(IncompleteItem {
                        owner_id: record.id.clone(),
                        library: job.library,
                    })
                })
            })
            .collect();

        let batch = HashBatch {
            library: job.library,
            outcomes,
            fresh_entries,
            cache_hits,
        };

        tracing::debug!(
            "Hashed {} library: {} hashed, {} failed, {} incomplete, {} cache hits",
            job.library,
            batch.hashed_count(),
            batch.failed_count(),
            batch.incomplete_count(),
            batch.cache_hits
        );

        events.send(Event::Hash(HashEvent::Completed {
            library: job.library,
            hashed: batch.hashed_count(),
            failed: batch.failed_count(),
            incomplete: batch.incomplete_count(),
            cache_hits: batch.cache_hits,
        }));

        batch
    }
}

/// Run [`hash_record`], turning a panic in a catalog or decoder into a
/// decode failure for that record so the rest of the library still hashes.
fn hash_guarded(job: &HashJob<'_>, index: usize, record: &ImageRecord) -> WorkItem {
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        hash_record(job, index, record)
    }));
    match result {
        Ok(item) => item,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            let error = HashError::DecodeError {
                path: record.path.clone(),
                reason: format!("hashing panicked: {}", message),
            };
            WorkItem {
                index,
                outcome: HashOutcome::Failed(HashFailure::from_error(
                    &record.id,
                    job.library,
                    record.path.clone(),
                    &error,
                )),
                fresh_entry: None,
            }
        }
    }
}

/// Resolve, stamp, look up and, on a cache miss, decode and hash one record.
fn hash_record(job: &HashJob<'_>, index: usize, record: &ImageRecord) -> WorkItem {
    let failed = |path: std::path::PathBuf, error: &HashError| WorkItem {
        index,
        outcome: HashOutcome::Failed(HashFailure::from_error(&record.id, job.library, path, error)),
        fresh_entry: None,
    };

    if !record.exists_on_disk {
        let error = HashError::MissingFile {
            path: record.path.clone(),
        };
        return failed(record.path.clone(), &error);
    }

    let path = match job.catalog.resolve_path(record, job.prefer_edited) {
        Ok(path) => path,
        Err(error) => return failed(record.path.clone(), &error),
    };

    let stamp = match FileStamp::of(&path) {
        Ok(stamp) => stamp,
        Err(source) => {
            let error = HashError::IoError {
                path: path.clone(),
                source,
            };
            return failed(path, &error);
        }
    };

    let params = job.codec.params();
    let cached = job
        .cache
        .and_then(|cache| cache.lookup(&record.id, params, &path, stamp))
        .cloned();
    let from_cache = cached.is_some();

    let bits = match cached {
        Some(bits) => bits,
        None => match job.codec.hash_file(&path) {
            Ok(bits) => bits,
            Err(error) => return failed(path, &error),
        },
    };

    let fresh_entry = (!from_cache).then(|| CacheEntry::new(params, bits.clone(), path.clone(), stamp));

    match HashCode::new(record.id.clone(), job.library, params, bits) {
        Ok(code) => WorkItem {
            index,
            outcome: HashOutcome::Hashed(HashedImage {
                code,
                image: ImageRef::new(record, path),
                from_cache,
            }),
            fresh_entry,
        },
        Err(error) => failed(path, &error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::InMemoryCatalog;
    use crate::core::hasher::{HashMethod, HasherConfig};
    use crate::error::CatalogError;
    use crate::events::EventChannel;
    use image::{Rgb, RgbImage};
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// Wraps a catalog and misbehaves while resolving one record
    struct TrippingCatalog {
        inner: InMemoryCatalog,
        trip_on: &'static str,
        cancel: Option<CancellationToken>,
    }

    impl LibraryCatalog for TrippingCatalog {
        fn library(&self) -> LibraryTag {
            self.inner.library()
        }

        fn list_items(&self) -> Result<Vec<ImageRecord>, CatalogError> {
            self.inner.list_items()
        }

        fn resolve_path(&self, record: &ImageRecord, prefer_edited: bool) -> Result<PathBuf, HashError> {
            if record.id == self.trip_on {
                match &self.cancel {
                    Some(cancel) => cancel.cancel(),
                    None => panic!("decoder blew up on {}", record.id),
                }
            }
            self.inner.resolve_path(record, prefer_edited)
        }
    }

    fn write_image(dir: &Path, name: &str, seed: u32) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_fn(64, 64, |x, y| {
            let v = ((x * seed + y * (seed + 3)) % 256) as u8;
            Rgb([v, v / 2, 255 - v])
        })
        .save(&path)
        .unwrap();
        path
    }

    fn codec() -> HashCodec {
        HasherConfig::new()
            .method(HashMethod::Dhash)
            .hash_size(8)
            .build()
            .unwrap()
    }

    fn job<'a>(
        records: &'a [ImageRecord],
        catalog: &'a dyn LibraryCatalog,
        codec: &'a HashCodec,
        cache: Option<&'a HashCache>,
    ) -> HashJob<'a> {
        HashJob {
            library: LibraryTag::Photos,
            records,
            catalog,
            codec,
            cache,
            prefer_edited: false,
        }
    }

    fn fixture() -> (TempDir, Vec<ImageRecord>) {
        let dir = TempDir::new().unwrap();
        let mut records = Vec::new();
        for i in 0..6 {
            let path = write_image(dir.path(), &format!("img{}.png", i), i + 1);
            records.push(ImageRecord::new(format!("img{}", i), LibraryTag::Photos, path));
        }
        std::fs::write(dir.path().join("broken.png"), b"not a png").unwrap();
        records.push(ImageRecord::new("broken", LibraryTag::Photos, dir.path().join("broken.png")));
        records.push(ImageRecord::new("cloud", LibraryTag::Photos, dir.path().join("img0.png")).missing());
        (dir, records)
    }

    #[test]
    fn zero_workers_is_rejected() {
        assert!(matches!(
            HashWorkerPool::new(0),
            Err(MatcherError::Validation(ValidationError::InvalidWorkerCount { value: 0 }))
        ));
    }

    #[test]
    fn one_outcome_per_record_in_input_order() {
        let (_dir, records) = fixture();
        let catalog = InMemoryCatalog::new(LibraryTag::Photos, records.clone());
        let codec = codec();
        let pool = HashWorkerPool::new(3).unwrap();

        let batch = pool.run(
            &job(&records, &catalog, &codec, None),
            &crate::events::null_sender(),
            &CancellationToken::new(),
        );

        assert_eq!(batch.outcomes.len(), records.len());
        for (outcome, record) in batch.outcomes.iter().zip(&records) {
            assert_eq!(outcome.owner_id(), record.id);
        }
        assert_eq!(batch.hashed_count(), 6);
        assert_eq!(batch.failed_count(), 2);
        assert_eq!(batch.fresh_entries.len(), 6);
    }

    #[test]
    fn missing_items_fail_without_decoding() {
        let (_dir, records) = fixture();
        let catalog = InMemoryCatalog::new(LibraryTag::Photos, records.clone());
        let codec = codec();
        let batch = HashWorkerPool::new(2).unwrap().run(
            &job(&records, &catalog, &codec, None),
            &crate::events::null_sender(),
            &CancellationToken::new(),
        );

        let (_, failed, _) = batch.into_parts();
        let cloud = failed.iter().find(|f| f.owner_id == "cloud").unwrap();
        assert_eq!(cloud.kind, FailureKind::MissingFile);
        let broken = failed.iter().find(|f| f.owner_id == "broken").unwrap();
        assert_eq!(broken.kind, FailureKind::Decode);
    }

    #[test]
    fn progress_is_monotonic_and_reaches_total() {
        let (_dir, records) = fixture();
        let catalog = InMemoryCatalog::new(LibraryTag::Photos, records.clone());
        let codec = codec();
        let (sender, receiver) = EventChannel::new();

        HashWorkerPool::new(4).unwrap().run(
            &job(&records, &catalog, &codec, None),
            &sender,
            &CancellationToken::new(),
        );
        drop(sender);

        let progress: Vec<usize> = receiver
            .iter()
            .filter_map(|event| match event {
                Event::Hash(HashEvent::Progress(p)) => Some(p.completed),
                _ => None,
            })
            .collect();

        assert_eq!(progress.len(), records.len());
        assert!(progress.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(progress.last(), Some(&records.len()));
    }

    #[test]
    fn cancelled_run_reports_everything_incomplete() {
        let (_dir, records) = fixture();
        let catalog = InMemoryCatalog::new(LibraryTag::Photos, records.clone());
        let codec = codec();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let batch = HashWorkerPool::new(2).unwrap().run(
            &job(&records, &catalog, &codec, None),
            &crate::events::null_sender(),
            &cancel,
        );

        assert_eq!(batch.incomplete_count(), records.len());
        assert_eq!(batch.hashed_count(), 0);
        assert!(batch.fresh_entries.is_empty());
    }

    #[test]
    fn cache_hits_skip_decoding() {
        let (_dir, records) = fixture();
        let catalog = InMemoryCatalog::new(LibraryTag::Photos, records.clone());
        let codec = codec();
        let pool = HashWorkerPool::new(2).unwrap();
        let sink = crate::events::null_sender();

        let first = pool.run(&job(&records, &catalog, &codec, None), &sink, &CancellationToken::new());
        let mut cache = HashCache::new();
        for (id, entry) in first.fresh_entries.clone() {
            cache.insert(id, entry);
        }

        let second = pool.run(
            &job(&records, &catalog, &codec, Some(&cache)),
            &sink,
            &CancellationToken::new(),
        );

        assert_eq!(second.cache_hits, 6);
        assert!(second.fresh_entries.is_empty());
        assert_eq!(first.outcomes, {
            let mut outcomes = second.outcomes.clone();
            for outcome in &mut outcomes {
                if let HashOutcome::Hashed(hashed) = outcome {
                    hashed.from_cache = false;
                }
            }
            outcomes
        });
    }

    #[test]
    fn panicking_record_fails_and_the_rest_still_hash() {
        let (_dir, records) = fixture();
        let catalog = TrippingCatalog {
            inner: InMemoryCatalog::new(LibraryTag::Photos, records.clone()),
            trip_on: "img3",
            cancel: None,
        };
        let codec = codec();

        let batch = HashWorkerPool::new(3).unwrap().run(
            &job(&records, &catalog, &codec, None),
            &crate::events::null_sender(),
            &CancellationToken::new(),
        );

        assert_eq!(batch.outcomes.len(), records.len());
        match &batch.outcomes[3] {
            HashOutcome::Failed(failure) => {
                assert_eq!(failure.owner_id, "img3");
                assert_eq!(failure.kind, FailureKind::Decode);
                assert!(failure.reason.contains("decoder blew up on img3"));
            }
            other => panic!("expected a failure, got {:?}", other),
        }
        assert_eq!(batch.hashed_count(), 5);
        assert_eq!(batch.failed_count(), 3);
    }

    #[test]
    fn cancelling_mid_run_finishes_started_items_only() {
        let (_dir, records) = fixture();
        let cancel = CancellationToken::new();
        let catalog = TrippingCatalog {
            inner: InMemoryCatalog::new(LibraryTag::Photos, records.clone()),
            trip_on: "img2",
            cancel: Some(cancel.clone()),
        };
        let codec = codec();

        // One worker takes records in input order
        let batch = HashWorkerPool::new(1).unwrap().run(
            &job(&records, &catalog, &codec, None),
            &crate::events::null_sender(),
            &cancel,
        );

        assert_eq!(batch.outcomes.len(), records.len());
        for (outcome, record) in batch.outcomes.iter().zip(&records) {
            assert_eq!(outcome.owner_id(), record.id);
        }
        for outcome in &batch.outcomes[..3] {
            assert!(matches!(outcome, HashOutcome::Hashed(_)), "{:?}", outcome);
        }
        for outcome in &batch.outcomes[3..] {
            assert!(matches!(outcome, HashOutcome::Incomplete(_)), "{:?}", outcome);
        }
        assert_eq!(batch.fresh_entries.len(), 3);
    }
}
