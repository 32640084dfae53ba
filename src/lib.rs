//! Football fixtures and standings service with adaptive upstream caching.
//!
//! The interesting part lives in [`cache`]: a Postgres-backed response cache
//! with content-aware TTLs, an in-process request deduplicator, and the
//! fetch orchestration tying them together. [`football`] is the upstream
//! API client and [`web`] the thin axum surface consuming both.

pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod football;
pub mod logging;
pub mod state;
pub mod utils;
pub mod web;
