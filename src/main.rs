//! # photo-match CLI
//!
//! Command-line interface for the photo library matcher.
//!
//! ## Usage
//! ```bash
//! photo-match scan --photos ~/Pictures/Photos --iphoto ~/iphoto.json
//! photo-match hash IMG_0001.JPG
//! ```

mod cli;

use console::style;
use std::process::ExitCode;

fn main() -> ExitCode {
    match cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
