//! Command handler layer.
//!
//! This module owns CLI-oriented orchestration and output wiring.
//!
//! ## Files
//! - `scan.rs` — settings resolution, interception session, scan run, exit code.
//!
//! ## Principles
//! - Parse/match CLI inputs here.
//! - Delegate engine logic to `services/*`.
//! - Keep diagnostic wording and JSON schema stable.

pub mod scan;

pub use scan::handle_scan;
