//! InstanceMapping CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the instance mapping controller.

pub mod conditions;
pub mod instance_mapping;
pub mod references;

pub use conditions::*;
pub use instance_mapping::*;
pub use references::*;
