//! Data Transfer Objects for the runner registry API
//!
//! These types mirror the JSON documents exchanged with the registry and are
//! converted into domain types at the client boundary.

pub mod runner;
