//! Runner scope
//!
//! Identifies where a runner is registered: an enterprise, an organization or a
//! single repository. Exactly one level is used, the broadest one that is set.

use serde::{Deserialize, Serialize};

/// Enterprise / organization / repository triple a runner belongs to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerScope {
    pub enterprise: Option<String>,
    pub organization: Option<String>,

    /// Repository in `owner/name` form
    pub repository: Option<String>,
}

/// The level a scope resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeLevel<'a> {
    Enterprise(&'a str),
    Organization(&'a str),
    Repository(&'a str),
}

impl RunnerScope {
    pub fn enterprise(name: impl Into<String>) -> Self {
        Self {
            enterprise: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn organization(name: impl Into<String>) -> Self {
        Self {
            organization: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn repository(full_name: impl Into<String>) -> Self {
        Self {
            repository: Some(full_name.into()),
            ..Self::default()
        }
    }

    /// Resolves the scope level, preferring enterprise over organization over repository
    ///
    /// Empty strings are treated as unset. Returns `None` for an empty scope.
    pub fn level(&self) -> Option<ScopeLevel<'_>> {
        fn non_empty(value: &Option<String>) -> Option<&str> {
            value.as_deref().filter(|v| !v.trim().is_empty())
        }

        if let Some(e) = non_empty(&self.enterprise) {
            Some(ScopeLevel::Enterprise(e))
        } else if let Some(o) = non_empty(&self.organization) {
            Some(ScopeLevel::Organization(o))
        } else {
            non_empty(&self.repository).map(ScopeLevel::Repository)
        }
    }
}

impl std::fmt::Display for RunnerScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.level() {
            Some(ScopeLevel::Enterprise(e)) => write!(f, "enterprise/{}", e),
            Some(ScopeLevel::Organization(o)) => write!(f, "organization/{}", o),
            Some(ScopeLevel::Repository(r)) => write!(f, "repository/{}", r),
            None => write!(f, "<empty scope>"),
        }
    }
}
