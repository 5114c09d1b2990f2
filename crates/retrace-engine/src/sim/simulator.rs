//! Randomized campaign against a flaky in-memory remote
//!
//! Invariants checked after every step:
//! - no pending state survives a finished protocol
//! - confirmed items mirror the remote exactly
//! - a failed step leaves confirmed state untouched
//! - the undo stack stays within its cap
//! - no invariant violation stops the engine

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::executor::Executor;
use crate::operation::{DispatchOptions, Operation};
use crate::sim::remote::{InMemoryRemote, RemoteConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use retrace_model::{Item, ItemId, ItemPatch, NewItem, Priority};
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::Arc;

const LOAD_ATTEMPTS: u32 = 10;

/// Simulator configuration
#[derive(Debug, Clone, Serialize)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Steps to run
    pub steps: u64,
    /// Probability of an injected transient remote failure
    pub failure_rate: f64,
    /// Let the remote assign ids on create
    pub server_ids: bool,
    /// Items present before the first step
    pub initial_items: usize,
    /// Stop at the first violation
    pub stop_on_first_violation: bool,
    /// Engine configuration under test
    #[serde(skip)]
    pub engine: EngineConfig,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            steps: 500,
            failure_rate: 0.2,
            server_ids: true,
            initial_items: 8,
            stop_on_first_violation: true,
            engine: EngineConfig::default().with_max_history_size(20),
        }
    }
}

/// Simulated caller action
#[derive(Debug, Clone, Serialize)]
pub enum SimulatedStep {
    /// Single dispatch
    Dispatch(String),
    /// Atomic batch of dispatches
    Batch(Vec<String>),
    /// Undo
    Undo,
    /// Redo
    Redo,
}

/// A violation detected during simulation
#[derive(Debug, Clone, Serialize)]
pub enum Violation {
    /// Pending entries remained after a protocol finished
    PendingLeftOver {
        /// Step number
        step: u64,
        /// Entries left
        count: usize,
    },
    /// Local confirmed state differs from the remote
    Diverged {
        /// Step number
        step: u64,
        /// First difference found
        detail: String,
    },
    /// A failed step changed confirmed state
    RollbackIncomplete {
        /// Step number
        step: u64,
        /// The step
        action: SimulatedStep,
    },
    /// Undo stack above its cap
    HistoryOverCap {
        /// Step number
        step: u64,
        /// Observed depth
        depth: usize,
        /// Configured cap
        cap: usize,
    },
    /// The engine reported a logic defect or stopped
    EngineStopped {
        /// Step number
        step: u64,
        /// Error text
        message: String,
    },
}

/// Statistics for simulation
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimulatorStats {
    /// Steps executed
    pub steps: u64,
    /// Dispatches and batches attempted
    pub dispatched: u64,
    /// Dispatches and batches confirmed
    pub confirmed: u64,
    /// Remote failures rolled back
    pub failed: u64,
    /// Requests rejected by validation
    pub rejected: u64,
    /// Undo entries reversed
    pub undos: u64,
    /// Redo entries replayed
    pub redos: u64,
    /// Undo or redo requests with an empty stack
    pub empty_history: u64,
    /// Items at the end of the run
    pub final_items: usize,
}

/// Final report from simulator
#[derive(Debug, Clone, Serialize)]
pub struct SimulatorReport {
    /// Configuration used
    pub config: SimulatorConfig,
    /// Counters
    pub stats: SimulatorStats,
    /// Violations found
    pub violations: Vec<Violation>,
}

impl SimulatorReport {
    /// Check if simulation passed all criteria
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Generate text report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== retrace simulator report ===\n");
        let _ = writeln!(out, "Seed: {}", self.config.seed);
        let _ = writeln!(out, "Failure rate: {:.2}", self.config.failure_rate);
        let _ = writeln!(out, "Steps: {}", self.stats.steps);
        let _ = writeln!(out, "Dispatched: {}", self.stats.dispatched);
        let _ = writeln!(out, "Confirmed: {}", self.stats.confirmed);
        let _ = writeln!(out, "Failed (rolled back): {}", self.stats.failed);
        let _ = writeln!(out, "Rejected: {}", self.stats.rejected);
        let _ = writeln!(out, "Undos: {}", self.stats.undos);
        let _ = writeln!(out, "Redos: {}", self.stats.redos);
        let _ = writeln!(out, "Empty undo/redo: {}", self.stats.empty_history);
        let _ = writeln!(out, "Final items: {}", self.stats.final_items);
        let _ = writeln!(out, "Violations: {}", self.violations.len());

        if !self.violations.is_empty() {
            let _ = writeln!(out, "\n=== Violations ===");
            for (i, v) in self.violations.iter().enumerate() {
                let _ = writeln!(out, "{}. {:?}", i + 1, v);
            }
        }

        let _ = writeln!(
            out,
            "\n=== Result: {} ===",
            if self.passed() { "PASS" } else { "FAIL" }
        );
        out
    }

    /// Generate JSON report
    ///
    /// # Errors
    /// Serialization failure.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Run the simulator
///
/// # Errors
/// `EngineError::Config` if the engine configuration is invalid.
pub async fn run_simulator(config: SimulatorConfig) -> Result<SimulatorReport, EngineError> {
    config.engine.validate()?;
    let mut rng = StdRng::seed_from_u64(config.seed);

    let remote = Arc::new(InMemoryRemote::with_config(RemoteConfig {
        failure_rate: config.failure_rate,
        server_ids: config.server_ids,
        seed: config.seed.wrapping_add(1),
        ..RemoteConfig::default()
    }));
    let order_step = config.engine.order_step;
    remote.seed(
        (0..config.initial_items)
            .zip((1_i64..).map(|n| n * order_step))
            .map(|(i, order)| Item::new(format!("seed-{i}"), format!("Seed item {i}"), order)),
    );

    let engine = Engine::spawn(Executor::new(remote.clone(), config.engine.clone()))?;
    let mut stats = SimulatorStats::default();
    let mut violations = Vec::new();

    // The initial fetch can hit an injected failure too
    for attempt in 1..=LOAD_ATTEMPTS {
        match engine.load().await {
            Ok(_) => break,
            Err(err) if err.is_retryable() && attempt < LOAD_ATTEMPTS => {}
            Err(err) => {
                violations.push(Violation::EngineStopped {
                    step: 0,
                    message: err.to_string(),
                });
                break;
            }
        }
    }

    for step in 1..=config.steps {
        if !violations.is_empty() && config.stop_on_first_violation {
            break;
        }
        stats.steps += 1;

        let before = engine.view();
        let ids: Vec<ItemId> = before.visible_items().into_iter().map(|i| i.id).collect();
        let action = next_step(&mut rng, &ids);

        let outcome = match &action {
            Planned::Dispatch(op) => {
                stats.dispatched += 1;
                engine
                    .dispatch(op.clone(), DispatchOptions::new())
                    .await
                    .map(|_| Outcome::Changed)
            }
            Planned::Batch(ops) => {
                stats.dispatched += 1;
                engine
                    .dispatch_batch(ops.clone(), DispatchOptions::new())
                    .await
                    .map(|_| Outcome::Changed)
            }
            Planned::Undo => engine
                .undo()
                .await
                .map(|r| r.map_or(Outcome::Empty, |_| Outcome::Changed)),
            Planned::Redo => engine
                .redo()
                .await
                .map(|r| r.map_or(Outcome::Empty, |_| Outcome::Changed)),
        };
        let summary = action.summary();

        match outcome {
            Ok(Outcome::Changed) => match action {
                Planned::Undo => stats.undos += 1,
                Planned::Redo => stats.redos += 1,
                _ => stats.confirmed += 1,
            },
            Ok(Outcome::Empty) => stats.empty_history += 1,
            Err(err) if err.is_fatal() || matches!(err, EngineError::Closed) => {
                violations.push(Violation::EngineStopped {
                    step,
                    message: err.to_string(),
                });
                continue;
            }
            Err(err) => {
                let validation = err
                    .command_error()
                    .is_some_and(|e| e.kind == retrace_command::CommandErrorKind::Validation);
                if validation {
                    stats.rejected += 1;
                } else {
                    stats.failed += 1;
                }
                let after = engine.view();
                if !same_items(before.items().values(), after.items().values()) {
                    violations.push(Violation::RollbackIncomplete {
                        step,
                        action: summary,
                    });
                }
            }
        }

        let view = engine.view();
        if !view.pending().is_empty() {
            violations.push(Violation::PendingLeftOver {
                step,
                count: view.pending().len(),
            });
        }
        if view.undo_depth > config.engine.max_history_size {
            violations.push(Violation::HistoryOverCap {
                step,
                depth: view.undo_depth,
                cap: config.engine.max_history_size,
            });
        }
        let local: Vec<Item> = view.items().values().cloned().collect();
        let server = remote.items();
        if let Some(detail) = first_difference(&local, &server) {
            violations.push(Violation::Diverged { step, detail });
        }
    }

    stats.final_items = engine.view().items().len();
    let _ = engine.shutdown().await;

    Ok(SimulatorReport {
        config,
        stats,
        violations,
    })
}

enum Outcome {
    Changed,
    Empty,
}

enum Planned {
    Dispatch(Operation),
    Batch(Vec<Operation>),
    Undo,
    Redo,
}

impl Planned {
    fn summary(&self) -> SimulatedStep {
        match self {
            Self::Dispatch(op) => SimulatedStep::Dispatch(format!("{op:?}")),
            Self::Batch(ops) => SimulatedStep::Batch(ops.iter().map(|op| format!("{op:?}")).collect()),
            Self::Undo => SimulatedStep::Undo,
            Self::Redo => SimulatedStep::Redo,
        }
    }
}

fn next_step(rng: &mut StdRng, ids: &[ItemId]) -> Planned {
    match rng.gen_range(0..10) {
        0..=5 => Planned::Dispatch(random_operation(rng, ids)),
        6 => Planned::Batch(
            (0..rng.gen_range(2..4))
                .map(|_| random_operation(rng, ids))
                .collect(),
        ),
        7 | 8 => Planned::Undo,
        _ => Planned::Redo,
    }
}

fn random_operation(rng: &mut StdRng, ids: &[ItemId]) -> Operation {
    let pick = |rng: &mut StdRng| -> ItemId {
        if ids.is_empty() || rng.gen_bool(0.05) {
            // Occasionally target something that does not exist
            ItemId::from("missing")
        } else {
            ids[rng.gen_range(0..ids.len())].clone()
        }
    };
    let some = |rng: &mut StdRng| -> Vec<ItemId> {
        let n = rng.gen_range(1..=3);
        (0..n).map(|_| pick(rng)).collect()
    };

    match rng.gen_range(0..9) {
        0 | 1 => {
            let priorities = [Priority::Low, Priority::Medium, Priority::High];
            Operation::Add(
                NewItem::new(format!("Task {}", rng.gen_range(0..1000)))
                    .with_priority(priorities[rng.gen_range(0..priorities.len())])
                    .with_tag(if rng.gen_bool(0.5) { "Home" } else { "work" }),
            )
        }
        2 => Operation::delete(pick(rng)),
        3 => Operation::update(
            pick(rng),
            ItemPatch::new().with_text(format!("Edited {}", rng.gen_range(0..1000))),
        ),
        4 => Operation::toggle(pick(rng)),
        5 => Operation::MoveTo {
            id: pick(rng),
            index: rng.gen_range(0..=ids.len()),
        },
        6 => Operation::BulkDelete { ids: some(rng) },
        7 => Operation::BulkToggle {
            ids: some(rng),
            completed: rng.gen_bool(0.5),
        },
        _ => Operation::reorder(pick(rng), rng.gen_range(-5000..5000)),
    }
}

fn same_items<'a>(
    a: impl Iterator<Item = &'a Item>,
    b: impl Iterator<Item = &'a Item>,
) -> bool {
    let a: Vec<&Item> = a.collect();
    let b: Vec<&Item> = b.collect();
    a.len() == b.len() && a.iter().zip(&b).all(|(x, y)| x.same_content(y))
}

fn first_difference(local: &[Item], server: &[Item]) -> Option<String> {
    let mut server_sorted: Vec<&Item> = server.iter().collect();
    server_sorted.sort_by(|a, b| a.id.cmp(&b.id));
    if local.len() != server_sorted.len() {
        return Some(format!(
            "local has {} items, remote has {}",
            local.len(),
            server_sorted.len()
        ));
    }
    local
        .iter()
        .zip(server_sorted)
        .find(|(l, s)| !l.same_content(s))
        .map(|(l, s)| format!("local {l:?} != remote {s:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reliable_remote_campaign_passes() {
        let report = run_simulator(SimulatorConfig {
            steps: 150,
            failure_rate: 0.0,
            ..SimulatorConfig::default()
        })
        .await
        .unwrap();
        assert!(report.passed(), "{}", report.generate_text());
        assert_eq!(report.stats.failed, 0);
    }

    #[tokio::test]
    async fn flaky_remote_campaign_passes() {
        let report = run_simulator(SimulatorConfig {
            seed: 7,
            steps: 300,
            failure_rate: 0.3,
            ..SimulatorConfig::default()
        })
        .await
        .unwrap();
        assert!(report.passed(), "{}", report.generate_text());
        assert!(report.stats.failed > 0);
        assert!(report.to_json().unwrap().contains("\"violations\""));
    }
}
