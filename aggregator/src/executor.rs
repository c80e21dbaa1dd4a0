use crate::branch::{Branch, BranchContext, BranchOutput};
use crate::errors::BranchError;
use crate::metrics_defs::{BRANCH_DURATION, BRANCH_FAILURES};
use crate::protocol::{Dataset, DatasetSelector};
use shared::{counter, histogram};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tokio::time::{Duration, timeout};

pub type BranchResult = (Dataset, Result<BranchOutput, BranchError>);

/// Runs the selected branches concurrently and collects their outcomes.
#[derive(Clone)]
pub struct Executor {
    branches: Arc<[Arc<dyn Branch>]>,
    branch_timeout: Duration,
}

impl Executor {
    pub fn new(branches: Vec<Arc<dyn Branch>>, branch_timeout: Duration) -> Self {
        Self {
            branches: branches.into(),
            branch_timeout,
        }
    }

    /// Executes every branch `selector` includes, each under its own timeout.
    ///
    /// A branch failure never affects its siblings. The returned outcomes are
    /// in completion order, one per selected branch.
    pub async fn execute(
        &self,
        selector: DatasetSelector,
        context: BranchContext,
    ) -> Vec<BranchResult> {
        let mut join_set = JoinSet::new();
        let mut pending = HashSet::new();

        for branch in self.branches.iter() {
            let dataset = branch.dataset();
            if !selector.includes(dataset) {
                continue;
            }

            let branch = branch.clone();
            let context = context.clone();
            let branch_timeout = self.branch_timeout;

            pending.insert(dataset);
            join_set.spawn(async move {
                let start = Instant::now();
                let result = timeout(branch_timeout, branch.fetch(&context))
                    .await
                    .unwrap_or_else(|_| Err(BranchError::Timeout(dataset.to_string())));
                histogram!(BRANCH_DURATION, "branch" => dataset.as_str())
                    .record(start.elapsed().as_secs_f64());
                (dataset, result)
            });
        }

        let mut results = Vec::with_capacity(pending.len());

        while let Some(join_result) = join_set.join_next().await {
            match join_result {
                Ok((dataset, result)) => {
                    pending.remove(&dataset);
                    results.push((dataset, result));
                }
                Err(e) => tracing::error!("Branch task panicked: {}", e),
            }
        }

        // Whatever is still pending never reported back
        for dataset in pending.drain() {
            results.push((
                dataset,
                Err(BranchError::Panicked(dataset.to_string())),
            ));
        }

        results
    }
}

/// Splits outcomes into successful outputs, logging and counting each failure.
pub fn collect_outputs(results: Vec<BranchResult>) -> Vec<BranchOutput> {
    results
        .into_iter()
        .filter_map(|(dataset, result)| match result {
            Ok(output) => Some(output),
            Err(e) => {
                tracing::warn!(
                    branch = %dataset,
                    error = %e,
                    "Branch failed, omitting it from the response"
                );
                counter!(BRANCH_FAILURES, "branch" => dataset.as_str()).increment(1);
                None
            }
        })
        .collect()
}
