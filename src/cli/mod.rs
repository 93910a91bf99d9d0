//! # CLI Module
//!
//! Command-line interface for the photo library matcher.
//!
//! ## Usage
//! ```bash
//! # Find duplicates inside one library
//! photo-match scan --photos ~/Pictures/Photos
//!
//! # Match an iPhoto export against Photos
//! photo-match scan --photos ~/Pictures/Photos --iphoto ~/iphoto.json
//!
//! # Stricter thresholds, JSON summary
//! photo-match scan --photos ~/Pictures/Photos --threshold-dupes 3 --format json
//!
//! # Hash a single file
//! photo-match hash IMG_0001.JPG --hash-method dhash
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use photo_library_matcher::core::catalog::{open_catalog, LibraryTag};
use photo_library_matcher::core::hasher::{HashMethod, HasherConfig};
use photo_library_matcher::core::matcher::PairType;
use photo_library_matcher::core::pipeline::{LibraryStatus, ScanConfig, ScanReport, Scanner};
use photo_library_matcher::error::Result;
use photo_library_matcher::events::{Event, EventChannel, HashEvent, RunEvent};
use std::path::PathBuf;
use std::thread;

/// Photo Library Matcher - find duplicates within and across photo libraries
#[derive(Parser, Debug)]
#[command(name = "photo-match")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Hash, index and match one or two libraries
    Scan {
        /// Primary library: a folder of images or a JSON manifest
        #[arg(long)]
        photos: PathBuf,

        /// Secondary library matched against the primary one
        #[arg(long)]
        iphoto: Option<PathBuf>,

        #[command(flatten)]
        hash: HashArgs,

        /// Maximum distance for duplicates within a library
        #[arg(long, default_value = "5")]
        threshold_dupes: u32,

        /// Maximum distance for matches across libraries
        #[arg(long, default_value = "8")]
        threshold_cross: u32,

        /// Hashing threads
        #[arg(short, long, default_value = "4")]
        workers: usize,

        /// Hash edited renditions when a library has them
        #[arg(long)]
        prefer_edited: bool,

        /// Directory for review files and hash caches
        #[arg(short, long, default_value = "work")]
        output: PathBuf,

        /// Ignore and do not write hash caches
        #[arg(long)]
        no_cache: bool,

        /// Output format
        #[arg(short, long, default_value = "pretty")]
        format: OutputFormat,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print the hash of one image
    Hash {
        /// Image file
        path: PathBuf,

        #[command(flatten)]
        hash: HashArgs,
    },
}

#[derive(clap::Args, Debug)]
struct HashArgs {
    /// Hash method
    #[arg(long, default_value = "phash")]
    hash_method: Method,

    /// Hash grid size (codes have size² bits)
    #[arg(long, default_value = "16")]
    hash_size: u32,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Method {
    /// DCT perceptual hash - most robust to edits (default)
    Phash,
    /// Average hash - fast, good for exact duplicates
    Ahash,
    /// Difference hash - good balance
    Dhash,
    /// Wavelet hash - robust to compression
    Whash,
}

impl From<Method> for HashMethod {
    fn from(method: Method) -> Self {
        match method {
            Method::Phash => HashMethod::Phash,
            Method::Ahash => HashMethod::Ahash,
            Method::Dhash => HashMethod::Dhash,
            Method::Whash => HashMethod::Whash,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON report for scripting
    Json,
    /// One pair per line: pair id, distance, left path, right path
    Minimal,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            photos,
            iphoto,
            hash,
            threshold_dupes,
            threshold_cross,
            workers,
            prefer_edited,
            output,
            no_cache,
            format,
            verbose,
        } => {
            photo_library_matcher::init_tracing(if verbose {
                "info"
            } else {
                "warn"
            });

            let config = ScanConfig {
                hash_method: hash.hash_method.into(),
                hash_size: hash.hash_size,
                dedupe_threshold: threshold_dupes,
                cross_threshold: threshold_cross,
                workers,
                prefer_edited,
                use_cache: !no_cache,
            };
            run_scan(photos, iphoto, config, output, format, verbose)
        }
        Commands::Hash { path, hash } => {
            photo_library_matcher::init_tracing("warn");
            run_hash(path, hash)
        }
    }
}

fn run_hash(path: PathBuf, args: HashArgs) -> Result<()> {
    let codec = HasherConfig::new()
        .method(args.hash_method.into())
        .hash_size(args.hash_size)
        .build()?;
    let bits = codec.hash_file(&path)?;
    println!("{} {} {}", codec.params(), bits.len(), bits.to_hex());
    Ok(())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} {prefix:>7} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░")
}

fn run_scan(
    photos: PathBuf,
    iphoto: Option<PathBuf>,
    config: ScanConfig,
    output_dir: PathBuf,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let term = Term::stderr();

    if matches!(format, OutputFormat::Pretty) {
        term.write_line(&format!(
            "{} {}",
            style("Photo Library Matcher").bold().cyan(),
            style(concat!("v", env!("CARGO_PKG_VERSION"))).dim()
        ))
        .ok();
        term.write_line("").ok();
    }

    let mut builder = Scanner::builder()
        .config(config)
        .output_dir(output_dir)
        .primary(open_catalog(&photos, LibraryTag::Photos)?);
    if let Some(iphoto) = &iphoto {
        builder = builder.secondary(open_catalog(iphoto, LibraryTag::Iphoto)?);
    }
    let scanner = builder.build()?;

    let (sender, receiver) = EventChannel::new();

    let progress = if matches!(format, OutputFormat::Pretty) {
        let pb = ProgressBar::new(0);
        pb.set_style(bar_style());
        Some(pb)
    } else {
        None
    };

    let progress_clone = progress.clone();
    let verbose_clone = verbose;

    // Handle events in a separate thread
    let event_thread = thread::spawn(move || {
        for event in receiver.iter() {
            let Some(pb) = &progress_clone else {
                continue;
            };
            match event {
                Event::Run(RunEvent::PhaseChanged { phase }) => {
                    pb.set_message(phase.to_string());
                }
                Event::Hash(HashEvent::Started { library, total }) => {
                    pb.reset();
                    pb.set_prefix(library.to_string());
                    pb.set_length(total as u64);
                }
                Event::Hash(HashEvent::Progress(p)) => {
                    pb.set_position(p.completed as u64);
                    if verbose_clone {
                        pb.set_message(format!("cache: {}", p.cache_hits));
                    }
                }
                Event::Hash(HashEvent::Failed { owner_id, message, .. }) if verbose_clone => {
                    pb.println(format!("  {} {}: {}", style("!").yellow(), owner_id, message));
                }
                Event::Run(RunEvent::Completed { .. })
                | Event::Run(RunEvent::Cancelled)
                | Event::Run(RunEvent::Error { .. }) => {
                    pb.finish_and_clear();
                }
                _ => {}
            }
        }
    });

    let result = scanner.run_with_events(&sender);

    // Drop sender to signal event thread to finish
    drop(sender);
    event_thread.join().ok();

    let report = result?;
    match format {
        OutputFormat::Pretty => print_pretty_results(&term, &report, verbose),
        OutputFormat::Json => print_json_results(&report),
        OutputFormat::Minimal => print_minimal_results(&report),
    }

    Ok(())
}

fn print_pretty_results(term: &Term, report: &ScanReport, verbose: bool) {
    term.write_line("").ok();
    if report.cancelled {
        term.write_line(&format!("{} Scan Cancelled", style("✗").yellow().bold()))
            .ok();
    } else {
        term.write_line(&format!("{} Scan Complete", style("✓").green().bold()))
            .ok();
    }
    term.write_line("").ok();

    for library in &report.libraries {
        let status = match library.status {
            LibraryStatus::Indexed => style("indexed").green(),
            LibraryStatus::Empty => style("empty").yellow(),
            LibraryStatus::Skipped => style("skipped").dim(),
        };
        term.write_line(&format!(
            "  {:<7} {} items, {} hashed, {} failed, {} from cache ({})",
            style(library.library).bold(),
            style(library.total).cyan(),
            library.hashed,
            library.failed,
            library.cache_hits,
            status
        ))
        .ok();
    }
    term.write_line("").ok();

    term.write_line(&format!(
        "  {} candidate pairs in {:.1}s",
        style(report.candidates.len()).cyan(),
        report.duration_ms as f64 / 1000.0
    ))
    .ok();
    for pair_type in [
        PairType::DupeWithinPhotos,
        PairType::DupeWithinIphoto,
        PairType::CrossLibrary,
    ] {
        let count = report.count_of(pair_type);
        if count > 0 {
            term.write_line(&format!("    {} {}", style(count).cyan(), pair_type))
                .ok();
        }
    }
    if !report.unmatched.is_empty() {
        term.write_line(&format!(
            "  {} iphoto items with no match",
            style(report.unmatched.len()).yellow()
        ))
        .ok();
    }

    if verbose {
        term.write_line("").ok();
        for pair in report.candidates.iter().take(20) {
            term.write_line(&format!(
                "  {:>3} {} {} {}",
                style(pair.distance).bold(),
                style(pair.pair_type).dim(),
                pair.left.path.display(),
                pair.right.path.display()
            ))
            .ok();
        }
        if report.candidates.len() > 20 {
            term.write_line(&format!(
                "  {}",
                style(format!("... {} more", report.candidates.len() - 20)).dim()
            ))
            .ok();
        }
    }

    term.write_line("").ok();
    let artifacts = &report.artifacts;
    for path in [
        &artifacts.pairs,
        &artifacts.metadata,
        &artifacts.unmatched,
        &artifacts.error_log,
    ]
    .into_iter()
    .flatten()
    {
        term.write_line(&format!("  {} {}", style("→").dim(), path.display()))
            .ok();
    }

    term.write_line("").ok();
    term.write_line(&format!(
        "{}",
        style("No files were changed. Review the pairs before taking action.").dim()
    ))
    .ok();
}

fn print_json_results(report: &ScanReport) {
    match serde_json::to_string_pretty(report) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize report: {}", e),
    }
}

fn print_minimal_results(report: &ScanReport) {
    for pair in &report.candidates {
        println!(
            "{}\t{}\t{}\t{}",
            pair.pair_id,
            pair.distance,
            pair.left.path.display(),
            pair.right.path.display()
        );
    }
}
