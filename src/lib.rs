//! sonar-invoke - trigger a SonarQube scan and gate on the result.
//!
//! The crate assembles a fixed set of scan properties (project identity,
//! source and test paths, exclusion globs, coverage report paths),
//! resolves an authentication token, submits the scan to a
//! SonarQube-compatible server, and waits for the server-side compute
//! engine task to finish.
//!
//! # Architecture
//!
//! - `config`: the `ScanConfig` record, YAML loading, token/URL resolution
//! - `client`: HTTP submission and compute engine task polling
//! - `report`: outcome formatting (pretty, JSON)
//! - `cli`: argument parsing and exit-code policy

pub mod cli;
pub mod client;
pub mod config;
pub mod report;

pub use client::{ClientError, ScanClient, ScanOutcome, TaskStatus};
pub use config::{ProjectOptions, ScanConfig};
pub use report::JsonReport;
