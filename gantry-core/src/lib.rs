//! Gantry Core
//!
//! Core types shared by the Gantry runner controller.
//!
//! This crate contains:
//! - Domain types: runner pods, registry runners and runner scopes
//! - DTOs: wire shapes of the runner registry API

pub mod domain;
pub mod dto;
