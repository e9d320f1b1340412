//! Local change detection: an inotify-style watcher for low-latency
//! events and a periodic full scanner as a drift backstop (spec.md §4.1).

pub mod scanner;
pub mod watcher;

pub use scanner::Scanner;
pub use watcher::Watcher;

// vim: ts=4
