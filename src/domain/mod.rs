//! Shared data model layer (structs/constants only).
//!
//! ## Purpose
//! - Keep scan state, chain and report structs in one place.
//! - Avoid cyclic imports between the engine services.
//! - Make JSON output schema changes explicit and reviewable.
//!
//! ## Files
//! - `models.rs` — scan state, module view, inclusion chain, reports, errors.
//! - `constants.rs` — stable constants (engine marker, trace prefix, defaults).
//!
//! ## Rule of thumb
//! Domain types should be data-only: no filesystem/process side effects.
//!
//! ## Compatibility note
//! `ScanReport` is the `--json` output. Keep schema-impacting changes
//! synchronized with `docs/contracts/scan-report.schema.json`.

pub mod constants;
pub mod models;
