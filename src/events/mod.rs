//! # Events Module
//!
//! Progress reporting for scan runs.
//!
//! The core library emits events through channels so any front-end
//! (CLI progress bars, a review server, tests) can subscribe without
//! blocking the worker pool.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         if let Event::Hash(HashEvent::Progress(p)) = event {
//!             println!("PROGRESS {}/{}", p.completed, p.total);
//!         }
//!     }
//! });
//!
//! scanner.run_with_events(&sender)?;
//! ```

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::*;
