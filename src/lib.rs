//! Risk load explorer
//!
//! Loads an account-level risk load / AAL dataset, aggregates it by
//! geographic cluster, joins the aggregates onto Chilean region and commune
//! boundaries, and renders the dashboard sections as HTML with SVG charts.

pub mod error;
pub mod config;
pub mod stats;
pub mod dataset;
pub mod geo;
pub mod aggregate;
pub mod charts;
pub mod views;
pub mod session;

pub use error::{DashboardError, Result};
pub use config::{DashboardConfig, JoinKeys};
pub use dataset::{load_dataset, Dataset, LoadOptions};
pub use aggregate::{aggregate_by, merge_left, AggregateRecord, MergeResult};
pub use views::{Section, ViewRequest};
pub use session::DashboardSession;
