// src/ui/widgets/mod.rs

pub mod analysis_view; // Verdict list and per-header details.
pub mod footer;
pub mod history; // Latest stored scan per URL.
pub mod input;
pub mod summary;
