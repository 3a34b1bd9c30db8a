//! 🚀 etlx — rows in, transformed rows out, one field chain at a time.
//!
//! 🧠 The map, top to bottom:
//! - [`schema`] + [`conversion`] + [`common`]: fields, types, values, rows.
//! - [`shorthand`] + [`transforms`] + [`chain`]: transform specs become bound, ordered chains.
//! - [`pipeline`]: one entity's rows through every chain, lazily, in order.
//! - [`master_slave`]: slave rows composed into their masters.
//! - [`app_config`], [`backends`], [`decoder`], [`renderers`], [`progress`], [`supervisors`]:
//!   the plumbing that moves rows from a source to a sink.
//!
//! 🦆

use anyhow::Result;

pub mod app_config;
pub mod backends;
pub mod chain;
pub mod common;
pub mod conversion;
pub mod decoder;
pub mod master_slave;
pub mod pipeline;
pub(crate) mod progress;
pub mod renderers;
pub mod schema;
pub mod shorthand;
pub mod supervisors;
pub mod transforms;

pub use crate::app_config::AppConfig;
pub use crate::supervisors::{EntityReport, ProcessReport, Supervisor};

/// 🚀 Run every entity of the configured process and report how it went.
pub async fn run(app_config: AppConfig) -> Result<ProcessReport> {
    Supervisor::new(app_config).run().await
}

/// 🧪 Build every chain, move no data.
pub fn check(app_config: &AppConfig) -> Result<ProcessReport> {
    Supervisor::new(app_config.clone()).check()
}
