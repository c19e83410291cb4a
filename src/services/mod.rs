//! Service layer containing the locator engine and its side-effect helpers.
//!
//! ## Service map
//! - `matcher.rs` — compiled dependency pattern.
//! - `chain.rs` — issuer walk producing the inclusion chain (cycle-guarded).
//! - `progress.rs` — cancellable progress ticker.
//! - `intercept.rs` — stdout/stderr interception sessions + engine console channel.
//! - `controller.rs` — scan state machine reacting to host events.
//! - `driver.rs` — pumps host events into the controller.
//! - `host/` — host build adapters (stats replay, event-trace command).
//! - `settings.rs` — settings file + flag resolution.
//! - `output.rs` — diagnostic log, progress display and JSON output helpers.
//!
//! ## Conventions
//! - The controller never touches process state; exits happen in `main`.
//! - Only `intercept.rs` reassigns the standard channels.
//! - Keep command handlers thin; delegate to services.

pub mod chain;
pub mod controller;
pub mod driver;
pub mod host;
pub mod intercept;
pub mod matcher;
pub mod output;
pub mod progress;
pub mod settings;
