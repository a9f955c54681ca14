//! The retry loop shared by every request.

use crate::{ExecuteError, ExecuteResult, Executable, ExecutionStatus};
use backoff::{backoff::Backoff as _, ExponentialBackoff, ExponentialBackoffBuilder};
use lc_config::{ExecutionConfig, ResolvedExecution};
use lc_network::{is_transient, Network, Node};
use lc_types::{AccountId, Signer, Status};
use std::{collections::HashMap, fmt, sync::Arc, time::Duration};
use tokio::time::Instant;
use tonic::Code;
use tracing::{debug, instrument, warn};

/// The account paying for transactions and the key that signs for it.
#[derive(Clone)]
pub struct Operator {
    /// Paying account.
    pub account_id: AccountId,
    /// Signer for the account's key.
    pub signer: Arc<dyn Signer>,
}

impl fmt::Debug for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operator").field("account_id", &self.account_id).finish_non_exhaustive()
    }
}

/// Retry bookkeeping for one call.
#[derive(Debug, Clone)]
pub struct RequestAttemptState {
    /// Attempts started so far.
    pub attempt: u32,
    /// Delays between busy responses: `min_backoff` doubling up to `max_backoff`.
    pub backoff: ExponentialBackoff,
    /// Absolute deadline for the whole call.
    pub deadline: Instant,
    /// Candidate nodes, fixed for the call.
    pub node_account_ids: Vec<AccountId>,
}

impl RequestAttemptState {
    /// Fresh state for a call starting now.
    pub fn new(policy: &ResolvedExecution, node_account_ids: Vec<AccountId>) -> Self {
        Self {
            attempt: 0,
            backoff: ExponentialBackoffBuilder::new()
                .with_initial_interval(policy.min_backoff)
                .with_randomization_factor(0.0)
                .with_multiplier(2.0)
                .with_max_interval(policy.max_backoff)
                .with_max_elapsed_time(None)
                .build(),
            deadline: Instant::now() + policy.request_timeout,
            node_account_ids,
        }
    }

    /// Return the delay for this busy response and double it for the next one.
    pub fn next_busy_delay(&mut self) -> Duration {
        self.backoff.next_backoff().unwrap_or(self.backoff.max_interval)
    }
}

/// Pick the node for `attempt`.
///
/// Starts at `attempt % len` and returns the first healthy node scanning forward. With no
/// healthy node, returns the one with the least remaining backoff.
pub(crate) fn select_node(nodes: &[Arc<Node>], attempt: u32) -> usize {
    let len = nodes.len();
    let start = attempt as usize % len;
    let mut fallback: Option<(usize, Duration)> = None;

    for offset in 0..len {
        let index = (start + offset) % len;
        let node = &nodes[index];
        if node.is_healthy() {
            return index;
        }
        let remaining = node.remaining_backoff();
        if fallback.is_none_or(|(_, best)| remaining < best) {
            fallback = Some((index, remaining));
        }
    }

    fallback.map_or(start, |(index, _)| index)
}

/// Submits requests to the consensus network with retry and backoff.
///
/// Cheap to clone. Concurrent calls share node health through the network.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    network: Arc<Network>,
    config: ExecutionConfig,
}

impl Dispatcher {
    /// Create a dispatcher over `network` with the client retry policy.
    pub fn new(network: Arc<Network>, config: ExecutionConfig) -> Self {
        Self { network, config }
    }

    /// The consensus network.
    pub fn network(&self) -> &Arc<Network> {
        &self.network
    }

    /// The client retry policy.
    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Execute `request` until it succeeds, fails fatally or runs out of attempts or time.
    #[instrument(level = "debug", skip_all, fields(method = %request.method()))]
    pub async fn execute<E: Executable>(&self, request: &mut E) -> ExecuteResult<E::Response> {
        let policy = self.config.resolve(&request.overrides())?;

        if request.node_account_ids().is_empty() {
            let node_account_ids = self.network.node_account_ids_for_execute().await?;
            request.set_node_account_ids(node_account_ids);
        }

        let node_account_ids = request.node_account_ids().to_vec();
        let nodes = self.network.nodes_for(&node_account_ids)?;
        let mut state = RequestAttemptState::new(&policy, node_account_ids);
        let mut node_responses: HashMap<usize, Status> = HashMap::new();
        let mut last_error = String::from("no attempt completed");

        loop {
            if state.attempt >= policy.max_attempts {
                return Err(ExecuteError::MaxAttemptsExceeded {
                    attempts: policy.max_attempts,
                    last_error,
                });
            }

            if Instant::now() >= state.deadline {
                return Err(ExecuteError::Timeout { timeout: policy.request_timeout });
            }

            let attempt = state.attempt;
            state.attempt += 1;
            let index = select_node(&nodes, attempt);
            let node = &nodes[index];
            let account_id = node.account_id();

            // no node is healthy, and this one has the shortest wait
            if !node.is_healthy() {
                let wait = node.remaining_backoff();
                debug!(target: "executor", %account_id, ?wait, attempt, "waiting for node backoff");
                tokio::time::sleep_until((Instant::now() + wait).min(state.deadline)).await;
                if Instant::now() >= state.deadline {
                    return Err(ExecuteError::Timeout { timeout: policy.request_timeout });
                }
            }
            let attempt_deadline = (Instant::now() + policy.grpc_deadline).min(state.deadline);

            if node.channel_failed_to_connect().await {
                warn!(
                    target: "executor",
                    %account_id,
                    address = %node.address(),
                    attempt,
                    "failed to connect to node"
                );
                node.increase_backoff();
                last_error = format!("failed to connect to node {account_id}");
                continue;
            }

            let bytes = request.make_request(account_id)?;
            let response = match node.submit(request.method(), bytes.clone(), attempt_deadline).await
            {
                Ok(response) => response,
                Err(status) if is_transient(&status) => {
                    debug!(target: "executor", %account_id, attempt, code=?status.code(), "transient transport failure");
                    node.increase_backoff();
                    last_error = format!("node {account_id} returned {:?}", status.code());
                    continue;
                }
                Err(status)
                    if status.code() == Code::DeadlineExceeded
                        && Instant::now() < state.deadline =>
                {
                    debug!(target: "executor", %account_id, attempt, "attempt deadline exceeded");
                    node.increase_backoff();
                    last_error = format!("node {account_id} exceeded the attempt deadline");
                    continue;
                }
                Err(status) => return Err(status.into()),
            };

            node.decrease_backoff();

            let status = request.response_status(&response)?;
            node_responses.insert(index, status);
            let decision = request.determine_status(status, &response)?;
            debug!(target: "executor", %account_id, attempt, %status, ?decision, "received response");

            match decision {
                ExecutionStatus::Success => {
                    return request.map_response(response, account_id, &bytes);
                }
                ExecutionStatus::ServerError => {
                    warn!(target: "executor", %account_id, attempt, %status, "retrying with the next node");
                    last_error = format!("node {account_id} returned {status}");

                    let all_busy = node_responses.len() == nodes.len()
                        && node_responses.values().all(|status| *status == Status::Busy);
                    if !all_busy {
                        continue;
                    }
                    node_responses.clear();
                    self.busy_backoff(&mut state, account_id, attempt).await;
                }
                ExecutionStatus::Retry => {
                    last_error = format!("node {account_id} returned {status}");
                    self.busy_backoff(&mut state, account_id, attempt).await;
                }
                ExecutionStatus::RequestError => {
                    return Err(ExecuteError::PrecheckStatus {
                        status,
                        transaction_id: request.transaction_id(),
                    });
                }
            }
        }
    }

    /// Sleep the call backoff, bounded by the call deadline.
    async fn busy_backoff(&self, state: &mut RequestAttemptState, account_id: AccountId, attempt: u32) {
        let delay = state.next_busy_delay();
        warn!(target: "executor", %account_id, attempt, ?delay, "backing off before retry");
        let wake = (Instant::now() + delay).min(state.deadline);
        tokio::time::sleep_until(wake).await;
    }
}
