//! Yorutsuke identity resolution
//!
//! - [`HostIdentity`]: privileged host call for a machine fingerprint
//! - [`MachineIdHost`]: fingerprint derived from the OS machine id
//! - [`IdentityResolver`]: cached guest identity plus account override

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod host;
pub mod resolver;

pub use host::{HostError, HostIdentity, MachineIdHost};
pub use resolver::IdentityResolver;
