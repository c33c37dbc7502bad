//! Runner-related API endpoints

use async_trait::async_trait;
use gantry_core::domain::runner::RegistryRunner;
use gantry_core::domain::scope::RunnerScope;
use gantry_core::dto::runner::ListRunnersResponse;

use crate::error::Result;
use crate::{HttpRegistryClient, RegistryClient};

/// Page size requested from the listing endpoint
const PAGE_SIZE: usize = 100;

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn list_runners(&self, scope: &RunnerScope) -> Result<Vec<RegistryRunner>> {
        let url = self.runners_url(scope)?;
        let mut runners = Vec::new();
        let mut page = 1usize;

        loop {
            let response = self
                .authorize(self.client.get(&url))
                .query(&[("per_page", PAGE_SIZE), ("page", page)])
                .send()
                .await?;

            let body: ListRunnersResponse = self.handle_response(response).await?;
            let fetched = body.runners.len();
            runners.extend(body.runners);

            if fetched == 0 || runners.len() >= body.total_count {
                break;
            }
            page += 1;
        }

        tracing::debug!(scope = %scope, count = runners.len(), "Listed registry runners");

        Ok(runners)
    }

    async fn remove_runner(&self, scope: &RunnerScope, id: i64) -> Result<()> {
        let url = format!("{}/{}", self.runners_url(scope)?, id);
        let response = self.authorize(self.client.delete(&url)).send().await?;

        self.handle_empty_response(response).await?;

        tracing::debug!(scope = %scope, runner_id = id, "Removed registry runner");

        Ok(())
    }
}
