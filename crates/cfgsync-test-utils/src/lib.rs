//! Shared test utilities for the cfgsync workspace.
//!
//! This crate provides standardised test fixtures to eliminate duplication
//! across crate test suites. It is a dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`git`]: git repository fixtures at three realism levels
//! - [`workspace`]: [`TestWorkspace`](workspace::TestWorkspace) builder for
//!   a temporary cfgsync workspace

pub mod git;
pub mod workspace;
