//! One-shot controller that prepares a cluster for the IPAM plugin: it
//! reserves an internal CIDR, attaches it to the node subnetwork as a
//! secondary range, and ensures the matching IPPool record exists. Safe to
//! re-run; every step checks for existing state first.

pub mod cluster;
pub mod provision;
pub mod range;

pub type Result<T> = anyhow::Result<T>;
