//! HTTP service for quality evaluation: ad-hoc scoring, background
//! evaluation jobs over a metrics source, and report queries.

pub mod bootstrap;
pub mod config;
pub mod handler;
pub mod jobs;
pub mod logging;
pub mod sources;
