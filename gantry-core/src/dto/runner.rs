//! Runner DTOs
//!
//! Wire shapes of the registry's runner endpoints.

use serde::{Deserialize, Serialize};

use crate::domain::runner::RegistryRunner;

/// One page of the runner listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRunnersResponse {
    /// Total number of runners across all pages
    pub total_count: usize,

    /// Runners on this page
    pub runners: Vec<RegistryRunner>,
}
