//! In-memory remote service
//!
//! Behaves like a single-tenant backend: it validates targets, assigns
//! server ids on create when asked to, and reports conflicts. Latency,
//! random failures and scripted failures can be injected.

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use retrace_command::{CallContext, CallPurpose, CommandError, RemoteCall, RemoteReply, RemoteService};
use retrace_model::{Item, ItemId};
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

/// Remote behaviour knobs
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteConfig {
    /// Delay applied to every call
    pub latency: Duration,
    /// Probability in `[0, 1]` that a call fails with a transient error
    pub failure_rate: f64,
    /// Replace client ids with `srv-N` on create
    pub server_ids: bool,
    /// Seed for failure injection
    pub seed: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            latency: Duration::ZERO,
            failure_rate: 0.0,
            server_ids: false,
            seed: 7,
        }
    }
}

/// One observed call
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    /// The request
    pub call: RemoteCall,
    /// Its metadata
    pub ctx: CallContext,
}

#[derive(Debug)]
struct RemoteState {
    items: BTreeMap<ItemId, Item>,
    rng: StdRng,
    next_id: u64,
    failures: VecDeque<CommandError>,
    delays: VecDeque<Duration>,
    log: Vec<CallRecord>,
}

/// In-memory [`RemoteService`]
#[derive(Debug)]
pub struct InMemoryRemote {
    config: RemoteConfig,
    state: Mutex<RemoteState>,
}

impl InMemoryRemote {
    /// Empty remote with default behaviour
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RemoteConfig::default())
    }

    /// Empty remote with custom behaviour
    #[must_use]
    pub fn with_config(config: RemoteConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            state: Mutex::new(RemoteState {
                items: BTreeMap::new(),
                rng,
                next_id: 1,
                failures: VecDeque::new(),
                delays: VecDeque::new(),
                log: Vec::new(),
            }),
        }
    }

    /// With initial items
    #[must_use]
    pub fn with_items(self, items: impl IntoIterator<Item = Item>) -> Self {
        self.seed(items);
        self
    }

    /// Replace every stored item
    pub fn seed(&self, items: impl IntoIterator<Item = Item>) {
        self.state.lock().items = items.into_iter().map(|i| (i.id.clone(), i)).collect();
    }

    /// Stored items in display order
    #[must_use]
    pub fn items(&self) -> Vec<Item> {
        let mut items: Vec<Item> = self.state.lock().items.values().cloned().collect();
        items.sort_by(Item::cmp_position);
        items
    }

    /// Stored item by id
    #[must_use]
    pub fn get(&self, id: &ItemId) -> Option<Item> {
        self.state.lock().items.get(id).cloned()
    }

    /// Fail the next call with `error`; queued failures apply in order
    pub fn fail_next(&self, error: CommandError) {
        self.state.lock().failures.push_back(error);
    }

    /// Delay the next call by `delay` instead of the configured latency
    pub fn delay_next(&self, delay: Duration) {
        self.state.lock().delays.push_back(delay);
    }

    /// Every call received so far, in arrival order
    #[must_use]
    pub fn calls(&self) -> Vec<CallRecord> {
        self.state.lock().log.clone()
    }

    /// Number of calls received
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.state.lock().log.len()
    }

    fn apply(&self, state: &mut RemoteState, call: RemoteCall) -> Result<RemoteReply, CommandError> {
        let missing = |items: &BTreeMap<ItemId, Item>, ids: &[ItemId]| {
            ids.iter()
                .find(|id| !items.contains_key(*id))
                .map(|id| CommandError::conflict(format!("item {id} does not exist")))
        };

        match call {
            RemoteCall::FetchAll => Ok(RemoteReply::with_items(
                state.items.values().cloned().collect(),
            )),
            RemoteCall::Create { mut item } => {
                if self.config.server_ids {
                    item.id = ItemId::from(format!("srv-{}", state.next_id));
                    state.next_id += 1;
                }
                if state.items.contains_key(&item.id) {
                    return Err(CommandError::conflict(format!("item {} already exists", item.id)));
                }
                state.items.insert(item.id.clone(), item.clone());
                Ok(RemoteReply::with_items(vec![item]))
            }
            RemoteCall::Restore { items } => {
                if let Some(existing) = items.iter().find(|i| state.items.contains_key(&i.id)) {
                    return Err(CommandError::conflict(format!(
                        "item {} already exists",
                        existing.id
                    )));
                }
                for item in &items {
                    state.items.insert(item.id.clone(), item.clone());
                }
                Ok(RemoteReply::with_items(items))
            }
            RemoteCall::Update { id, patch } => {
                let item = state
                    .items
                    .get_mut(&id)
                    .ok_or_else(|| CommandError::conflict(format!("item {id} does not exist")))?;
                patch.apply(item);
                Ok(RemoteReply::with_items(vec![item.clone()]))
            }
            RemoteCall::SetCompleted { changes } => {
                let ids: Vec<ItemId> = changes.iter().map(|(id, _)| id.clone()).collect();
                if let Some(err) = missing(&state.items, &ids) {
                    return Err(err);
                }
                let mut out = Vec::with_capacity(changes.len());
                for (id, completed) in changes {
                    if let Some(item) = state.items.get_mut(&id) {
                        item.completed = completed;
                        item.touch();
                        out.push(item.clone());
                    }
                }
                Ok(RemoteReply::with_items(out))
            }
            RemoteCall::SetOrder { id, order } => {
                let item = state
                    .items
                    .get_mut(&id)
                    .ok_or_else(|| CommandError::conflict(format!("item {id} does not exist")))?;
                item.order = order;
                item.touch();
                Ok(RemoteReply::with_items(vec![item.clone()]))
            }
            RemoteCall::Delete { ids } => {
                if let Some(err) = missing(&state.items, &ids) {
                    return Err(err);
                }
                for id in &ids {
                    state.items.remove(id);
                }
                Ok(RemoteReply::empty())
            }
        }
    }
}

impl Default for InMemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteService for InMemoryRemote {
    async fn call(&self, call: RemoteCall, ctx: CallContext) -> Result<RemoteReply, CommandError> {
        let delay = {
            let mut state = self.state.lock();
            state.log.push(CallRecord {
                call: call.clone(),
                ctx,
            });
            state.delays.pop_front().unwrap_or(self.config.latency)
        };

        if !delay.is_zero() {
            match ctx.timeout {
                Some(limit) if delay > limit => {
                    tokio::time::sleep(limit).await;
                    return Err(CommandError::timeout(format!(
                        "{} did not answer within {}ms",
                        call.name(),
                        limit.as_millis()
                    )));
                }
                _ => tokio::time::sleep(delay).await,
            }
        }

        let mut state = self.state.lock();
        if let Some(err) = state.failures.pop_front() {
            return Err(err);
        }
        // Compensation is never failed randomly, so injected faults cannot
        // make the remote drift from the client.
        if ctx.purpose != CallPurpose::Compensate && self.config.failure_rate > 0.0 {
            let rate = self.config.failure_rate.clamp(0.0, 1.0);
            if state.rng.gen_bool(rate) {
                return Err(if state.rng.gen_bool(0.5) {
                    CommandError::network(format!("{} dropped", call.name()))
                } else {
                    CommandError::timeout(format!("{} timed out", call.name()))
                });
            }
        }
        self.apply(&mut state, call)
    }
}
