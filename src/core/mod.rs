// src/core/mod.rs

// Root of the grading engine. Presentation code (`report`, `ui`, `main`)
// only ever calls into these modules.

/// Error enums shared by the policy loader, fetcher and store.
pub mod error;

/// Data structures used throughout the application: rules, fetch results,
/// verdicts, grades and stored-result rows.
pub mod models;

/// Loading and validation of the header policy document.
pub mod policy;

/// Policy evaluation and the score-to-grade table.
pub mod grading;

/// SQLite persistence and aggregate queries.
pub mod store;

/// Header fetching, warning enrichment, single and bulk scans.
pub mod scanner;

/// Static descriptions and recommended values for known headers.
pub mod knowledge_base;
