//! Harvester Core Library
//!
//! This library provides the core functionality for the harvester tool,
//! which extracts coding-problem records from a bot-protected question
//! endpoint, stores one JSON record per problem, and audits the stored
//! corpus for completeness.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`source`] - Problem identifier discovery from CSV listings
//! - [`fetch`] - Session/fetch seam and the GraphQL implementation
//! - [`record`] - Record model, content splitting, payload normalization
//! - [`store`] - One-file-per-record persistence with atomic publish
//! - [`harvest`] - Crash-recovering fetch loop with bounded retry passes
//! - [`audit`] - Category-aware completeness report
//! - [`plan`] - Queue selection for the CLI run modes

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod audit;
pub mod fetch;
pub mod harvest;
pub mod plan;
pub mod record;
pub mod source;
pub mod store;
mod user_agent;

// Re-export commonly used types
pub use audit::{AuditField, Report, audit, record_issues, render_summary};
pub use fetch::{
    FailureDisposition, FetchError, FetchSession, GraphqlSessionFactory, RawPayload,
    SessionFactory,
};
pub use harvest::{
    DEFAULT_MAX_RETRIES, FailureReason, HarvestError, HarvestObserver, HarvestSettings,
    HarvestSummary, Harvester, ItemOutcome, Pacing, PassOutcome,
};
pub use plan::{PlanError, PlanOptions, QueuePlan, QueueSource, plan_queue};
pub use record::{Record, RecordBuilder, Section, SectionMarker, SectionSplitter, SplitContent};
pub use source::{SourceError, discover_identifiers};
pub use store::{RecordStore, StoreError};
