//! Oracle Core Library
//!
//! Scheduled signal ingestion with budgeted provider access, weighted
//! live/mock consensus and a signed provenance trail.

pub mod config;
pub mod consensus;
pub mod guard;
pub mod ingest;
pub mod lineage;
pub mod persistence;
pub mod quality;
pub mod registry;
pub mod scheduler;
pub mod types;
