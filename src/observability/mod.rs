//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Guard layers produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID (`x-request-id`) attached to every request span
//! - Session keys are logged, raw tokens never are

pub mod logging;
pub mod metrics;
