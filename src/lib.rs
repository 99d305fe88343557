//! Seasonal citrus procurement planning.
//!
//! Derives currency-adjusted prices, tiered and capacity-capped weekly
//! orders, futures arrivals, grove → facility shipments and market
//! assignments from a set of positional input tables, and solves the
//! grove → plant transportation problem exactly.

pub mod config;
pub mod error;
pub mod futures;
pub mod market;
pub mod network;
pub mod orders;
pub mod pipeline;
pub mod pricing;
pub mod report;
pub mod schema;
pub mod shipment;
pub mod source;
pub mod transport;
pub mod types;

#[cfg(feature = "python")]
mod python;

pub use config::PlanConfig;
pub use error::PlanError;
pub use pipeline::{run_plan, run_plan_cancellable, PlanReport};
pub use report::ReportFrames;
pub use source::{FrameSource, TableSource};
pub use transport::{CancelToken, FlowOutcome, FlowProblem, SolveOptions, SolveStatus};
pub use types::{Origin, OriginTable};
