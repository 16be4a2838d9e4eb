//! Listener registry for background operation results.
//!
//! Binds result callbacks to a request id and to the component that owns
//! them. A delivery takes every live subscription for the request out of the
//! registry under the lock and invokes them after releasing it, so a
//! subscription can only ever be taken by one delivery and a callback may
//! safely register or unregister from inside itself.
//!
//! A delivery with no live subscriptions is not an error: the outcome goes
//! to the `PendingResultStore` for the next screen that asks for it.

use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use lookbook_domain::{ComponentId, OperationOutcome, RequestId, SubscriptionId};

use crate::error::CallbackExecutionError;
use crate::infrastructure::ports::StorageError;
use crate::stores::pending_results::PendingResultStore;

/// Result callback. Invoked at most once, with the success or failure outcome.
pub type ResultCallback = Box<dyn FnOnce(OperationOutcome) -> anyhow::Result<()> + Send + 'static>;

/// What happened to a delivered outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryReport {
    /// Live subscribers existed and each was invoked once.
    Delivered { invoked: usize, failed: usize },
    /// Nobody was listening; the outcome went to the pending store.
    ///
    /// `duplicate` is set when this request id was already delivered
    /// recently. `stored` is false if the pending store write failed.
    Unclaimed { duplicate: bool, stored: bool },
}

impl DeliveryReport {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Unclaimed { duplicate: true, .. })
    }
}

struct Subscription {
    request_id: RequestId,
    owner: ComponentId,
    callback: ResultCallback,
}

/// Bounded memory of delivered request ids.
struct DeliveryWindow {
    order: VecDeque<RequestId>,
    seen: HashSet<RequestId>,
    capacity: usize,
}

impl DeliveryWindow {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::new(),
            seen: HashSet::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record a delivery. Returns `true` if the id was already in the window.
    fn record(&mut self, request_id: &RequestId) -> bool {
        if self.seen.contains(request_id) {
            return true;
        }
        self.order.push_back(request_id.clone());
        self.seen.insert(request_id.clone());
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        false
    }

    fn clear(&mut self) {
        self.order.clear();
        self.seen.clear();
    }
}

struct RegistryState {
    subscriptions: HashMap<SubscriptionId, Subscription>,
    /// request -> subscriptions in registration order
    by_request: HashMap<RequestId, Vec<SubscriptionId>>,
    by_owner: HashMap<ComponentId, HashSet<SubscriptionId>>,
    delivered: DeliveryWindow,
}

impl RegistryState {
    fn insert(&mut self, id: SubscriptionId, subscription: Subscription) {
        self.by_request
            .entry(subscription.request_id.clone())
            .or_default()
            .push(id);
        self.by_owner
            .entry(subscription.owner.clone())
            .or_default()
            .insert(id);
        self.subscriptions.insert(id, subscription);
    }

    fn remove(&mut self, id: &SubscriptionId) -> Option<Subscription> {
        let subscription = self.subscriptions.remove(id)?;

        if let Some(ids) = self.by_request.get_mut(&subscription.request_id) {
            ids.retain(|other| other != id);
            if ids.is_empty() {
                self.by_request.remove(&subscription.request_id);
            }
        }
        if let Some(ids) = self.by_owner.get_mut(&subscription.owner) {
            ids.remove(id);
            if ids.is_empty() {
                self.by_owner.remove(&subscription.owner);
            }
        }
        Some(subscription)
    }

    /// Remove and return every subscription for a request.
    fn take_request(&mut self, request_id: &RequestId) -> Vec<(SubscriptionId, Subscription)> {
        let ids = self.by_request.remove(request_id).unwrap_or_default();
        ids.into_iter()
            .filter_map(|id| {
                let subscription = self.subscriptions.remove(&id)?;
                if let Some(owned) = self.by_owner.get_mut(&subscription.owner) {
                    owned.remove(&id);
                    if owned.is_empty() {
                        self.by_owner.remove(&subscription.owner);
                    }
                }
                Some((id, subscription))
            })
            .collect()
    }
}

/// Request-keyed subscriptions with per-owner bulk removal.
pub struct ListenerRegistry {
    state: Mutex<RegistryState>,
    pending: Arc<PendingResultStore>,
}

impl ListenerRegistry {
    /// `delivery_window` bounds how many delivered request ids are remembered
    /// for double-delivery detection.
    pub fn new(pending: Arc<PendingResultStore>, delivery_window: usize) -> Self {
        Self {
            state: Mutex::new(RegistryState {
                subscriptions: HashMap::new(),
                by_request: HashMap::new(),
                by_owner: HashMap::new(),
                delivered: DeliveryWindow::new(delivery_window),
            }),
            pending,
        }
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        // Callbacks never run under this lock; recover the map if a panic
        // elsewhere poisoned it.
        self.state.lock().unwrap_or_else(|poisoned| {
            tracing::error!("Listener registry lock poisoned, recovering state");
            poisoned.into_inner()
        })
    }

    /// Subscribe `owner` to the outcome of `request_id`.
    pub fn register<F>(&self, request_id: RequestId, owner: ComponentId, callback: F) -> SubscriptionId
    where
        F: FnOnce(OperationOutcome) -> anyhow::Result<()> + Send + 'static,
    {
        let id = SubscriptionId::new();
        tracing::debug!(
            subscription_id = %id,
            request_id = %request_id,
            owner = %owner,
            "Result listener registered"
        );
        self.state().insert(
            id,
            Subscription {
                request_id,
                owner,
                callback: Box::new(callback),
            },
        );
        id
    }

    /// Deliver `outcome` to every live subscriber of `request_id`.
    ///
    /// Each callback runs exactly once; a callback that errors or panics is
    /// logged and counted but does not stop the others. With no live
    /// subscribers the outcome is stored for a later `claim_pending`.
    pub async fn delivered(&self, request_id: &RequestId, outcome: OperationOutcome) -> DeliveryReport {
        let (subscriptions, duplicate) = {
            let mut state = self.state();
            let duplicate = state.delivered.record(request_id);
            (state.take_request(request_id), duplicate)
        };

        if duplicate {
            tracing::warn!(
                request_id = %request_id,
                live_subscribers = subscriptions.len(),
                "Double delivery detected for request"
            );
        }

        if subscriptions.is_empty() {
            tracing::info!(request_id = %request_id, "Orphaned delivery, storing pending result");
            let stored = match self.pending.put(request_id, outcome).await {
                Ok(_) => true,
                Err(e) => {
                    tracing::error!(request_id = %request_id, error = %e, "Failed to store pending result");
                    false
                }
            };
            return DeliveryReport::Unclaimed { duplicate, stored };
        }

        let invoked = subscriptions.len();
        let mut failed = 0;
        for (id, subscription) in subscriptions {
            if let Err(e) = invoke(subscription.callback, outcome.clone()) {
                failed += 1;
                tracing::warn!(
                    subscription_id = %id,
                    request_id = %request_id,
                    owner = %subscription.owner,
                    error = %e,
                    "Result callback failed"
                );
            }
        }

        tracing::info!(request_id = %request_id, invoked, failed, "Result delivered");
        DeliveryReport::Delivered { invoked, failed }
    }

    /// Remove one subscription. Returns `false` if it was already gone.
    pub fn unregister(&self, subscription_id: &SubscriptionId) -> bool {
        let removed = self.state().remove(subscription_id).is_some();
        if removed {
            tracing::debug!(subscription_id = %subscription_id, "Result listener unregistered");
        }
        removed
    }

    /// Remove every subscription owned by `owner` in one pass.
    ///
    /// Called on component teardown. Returns how many were removed.
    pub fn unregister_owner(&self, owner: &ComponentId) -> usize {
        let removed = {
            let mut state = self.state();
            let ids = state.by_owner.remove(owner).unwrap_or_default();
            ids.iter().filter(|id| state.remove(id).is_some()).count()
        };
        if removed > 0 {
            tracing::debug!(owner = %owner, removed, "Owner listeners unregistered");
        }
        removed
    }

    /// Atomically take the stored outcome for `request_id`, if any.
    pub async fn claim_pending(
        &self,
        request_id: &RequestId,
    ) -> Result<Option<OperationOutcome>, StorageError> {
        self.pending.claim(request_id).await
    }

    pub fn has_subscribers(&self, request_id: &RequestId) -> bool {
        self.state().by_request.contains_key(request_id)
    }

    pub fn subscription_count(&self) -> usize {
        self.state().subscriptions.len()
    }

    pub fn owner_subscription_count(&self, owner: &ComponentId) -> usize {
        self.state().by_owner.get(owner).map_or(0, HashSet::len)
    }

    /// Drop every subscription without invoking it and forget delivery
    /// history. Returns how many subscriptions were dropped.
    pub fn clear(&self) -> usize {
        let mut state = self.state();
        let count = state.subscriptions.len();
        state.subscriptions.clear();
        state.by_request.clear();
        state.by_owner.clear();
        state.delivered.clear();
        count
    }
}

fn invoke(callback: ResultCallback, outcome: OperationOutcome) -> Result<(), CallbackExecutionError> {
    match catch_unwind(AssertUnwindSafe(move || callback(outcome))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(CallbackExecutionError::Returned(format!("{:#}", e))),
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            Err(CallbackExecutionError::Panicked(message))
        }
    }
}

/// Handle returned to a component for one subscription.
///
/// Dropping the handle does NOT unregister; call `unregister()` or tear the
/// owner down with `unregister_owner`.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    registry: Weak<ListenerRegistry>,
}

impl SubscriptionHandle {
    pub fn new(id: SubscriptionId, registry: &Arc<ListenerRegistry>) -> Self {
        Self {
            id,
            registry: Arc::downgrade(registry),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Remove the subscription. Safe to call after delivery or twice.
    pub fn unregister(&self) -> bool {
        self.registry
            .upgrade()
            .map(|registry| registry.unregister(&self.id))
            .unwrap_or(false)
    }
}
