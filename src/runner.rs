//! Background optimization runs on a bounded worker pool.
//!
//! Each submitted run gets an id and moves through
//! `Pending -> Running -> Completed | Failed`. Runs own their snapshot of
//! trucks, orders and network, so no two runs share mutable state. A cancelled
//! run stops at the next iteration boundary and completes with the best plan
//! found so far.

use jiff::civil::DateTime;
use log::{error, info};
use parking_lot::{Condvar, Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::OptimizerConfig;
use crate::error::RunError;
use crate::network::Network;
use crate::optimizer::{build_optimizer, CancellationToken, Optimizer, Plan};
use crate::order::Order;
use crate::truck::Truck;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed(String),
}

impl RunStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed(_))
    }
}

/// Everything an optimizer run needs, owned by the run.
#[derive(Debug, Clone)]
pub struct PlanningRequest {
    pub trucks: Vec<Truck>,
    pub orders: Vec<Order>,
    pub network: Network,
    pub now: DateTime,
}

struct RunState {
    status: RunStatus,
    plan: Option<Plan>,
}

struct RunHandle {
    algorithm: &'static str,
    state: Mutex<RunState>,
    finished: Condvar,
    cancel: CancellationToken,
}

impl RunHandle {
    fn set_status(&self, status: RunStatus) {
        self.state.lock().status = status;
    }

    fn finish(&self, status: RunStatus, plan: Option<Plan>) {
        let mut state = self.state.lock();
        state.status = status;
        state.plan = plan;
        self.finished.notify_all();
    }
}

pub struct RunManager {
    pool: rayon::ThreadPool,
    runs: RwLock<HashMap<Uuid, Arc<RunHandle>>>,
}

impl RunManager {
    /// A manager running at most `workers` optimizations at once.
    pub fn new(workers: usize) -> Result<Self, RunError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("glp-run-{}", i))
            .build()
            .map_err(|e| RunError::Pool(e.to_string()))?;
        Ok(RunManager {
            pool,
            runs: RwLock::new(HashMap::new()),
        })
    }

    /// Validate `config` and queue a run on `request`.
    pub fn submit(&self, config: &OptimizerConfig, request: PlanningRequest) -> Result<Uuid, RunError> {
        let optimizer = build_optimizer(config)?;
        Ok(self.submit_optimizer(optimizer, request))
    }

    /// Queue a run of an already built optimizer.
    pub fn submit_optimizer(&self, optimizer: Box<dyn Optimizer>, request: PlanningRequest) -> Uuid {
        let id = Uuid::new_v4();
        let handle = Arc::new(RunHandle {
            algorithm: optimizer.name(),
            state: Mutex::new(RunState {
                status: RunStatus::Pending,
                plan: None,
            }),
            finished: Condvar::new(),
            cancel: CancellationToken::new(),
        });
        self.runs.write().insert(id, Arc::clone(&handle));
        info!("queued {} run {}", handle.algorithm, id);

        self.pool.spawn(move || {
            handle.set_status(RunStatus::Running);
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                optimizer.optimize(
                    &request.trucks,
                    &request.orders,
                    &request.network,
                    request.now,
                    &handle.cancel,
                )
            }));

            match outcome {
                Ok(plan) => {
                    info!("run {} completed with fitness {:.2}", id, plan.fitness);
                    handle.finish(RunStatus::Completed, Some(plan));
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!("run {} failed: {}", id, message);
                    handle.finish(RunStatus::Failed(message), None);
                }
            }
        });

        id
    }

    pub fn status(&self, id: Uuid) -> Option<RunStatus> {
        self.handle(id).map(|h| h.state.lock().status.clone())
    }

    /// Ask a run to stop at its next iteration boundary.
    pub fn cancel(&self, id: Uuid) -> bool {
        match self.handle(id) {
            Some(handle) => {
                handle.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Block until the run has finished and return its final status.
    pub fn wait(&self, id: Uuid) -> Result<RunStatus, RunError> {
        let handle = self.handle(id).ok_or(RunError::UnknownRun(id))?;
        let mut state = handle.state.lock();
        while !state.status.is_finished() {
            handle.finished.wait(&mut state);
        }
        Ok(state.status.clone())
    }

    /// The plan of a completed run, `None` while it is still going.
    pub fn result(&self, id: Uuid) -> Result<Option<Plan>, RunError> {
        let handle = self.handle(id).ok_or(RunError::UnknownRun(id))?;
        let state = handle.state.lock();
        match &state.status {
            RunStatus::Failed(message) => Err(RunError::Failed {
                id,
                message: message.clone(),
            }),
            _ => Ok(state.plan.clone()),
        }
    }

    /// Ids, algorithms and statuses of every known run.
    pub fn runs(&self) -> Vec<(Uuid, &'static str, RunStatus)> {
        self.runs
            .read()
            .iter()
            .map(|(id, h)| (*id, h.algorithm, h.state.lock().status.clone()))
            .collect()
    }

    /// Forget a finished run. Running runs are left alone.
    pub fn remove(&self, id: Uuid) -> bool {
        let mut runs = self.runs.write();
        let finished = runs
            .get(&id)
            .is_some_and(|h| h.state.lock().status.is_finished());
        finished && runs.remove(&id).is_some()
    }

    fn handle(&self, id: Uuid) -> Option<Arc<RunHandle>> {
        self.runs.read().get(&id).cloned()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "optimizer panicked".to_string()
    }
}
