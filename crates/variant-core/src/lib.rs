//! # variant-core
//!
//! Core types and utilities for variant - a Cloud Foundry metrics
//! reconciliation controller.
//!
//! This crate provides the foundational pieces shared across all other
//! variant components:
//!
//! - The network policy data model and its set algebra
//! - The label/annotation schema read off Cloud Foundry workloads
//! - Process configuration loaded from the environment
//! - Error handling types and utilities
//! - The platform identity blob (`VCAP_APPLICATION`)

pub mod config;
pub mod error;
pub mod labels;
pub mod policy;
pub mod vcap;

// Re-export commonly used types at the crate root
pub use config::VariantConfig;
pub use error::{Error, Result};
pub use policy::{prune_policies_by_destination, uniq_policies, Policy, PortRange, Protocol};
pub use vcap::VcapApplication;
