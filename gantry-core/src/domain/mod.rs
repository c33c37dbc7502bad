//! Core domain types
//!
//! This module contains the structures the controller reasons about: the pod
//! backing a runner (with its durable progress annotations) and the runner entry
//! as seen by the external registry.

pub mod pod;
pub mod runner;
pub mod scope;
