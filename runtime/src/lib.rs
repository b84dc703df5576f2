//! # OnePass Runtime
//!
//! The [`Store`] coordinates reducer execution and effect handling.
//!
//! A store owns its state through a single owner task. Every action, whether
//! sent by a caller or produced by an effect, goes through one channel and is
//! reduced in arrival order. Independent upstream sources (for example a live
//! event subscription and a live likes subscription) can therefore interleave
//! freely: each action overwrites the last-known snapshot it carries and the
//! reducer recomputes from whatever it currently holds.
//!
//! ## Example
//!
//! ```ignore
//! use onepass_runtime::Store;
//!
//! let store = Store::new(FeedState::default(), FeedReducer::new(), env);
//! store.send(FeedAction::SetMode { mode: FeedMode::Favorites }).await?;
//! let visible = store.state(|s| s.events.len()).await;
//! ```

use futures::future::{AbortHandle, Abortable, BoxFuture};
use onepass_core::effect::{Effect, EffectId};
use onepass_core::reducer::Reducer;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, Notify, RwLock};

pub use error::StoreError;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Timed out waiting for a matching action or for the store to go idle
        #[error("Timeout waiting for store")]
        Timeout,

        /// The owner task or the action broadcast channel is gone
        #[error("Store channel closed")]
        ChannelClosed,
    }
}

/// Default capacity of the action broadcast channel
const DEFAULT_BROADCAST_CAPACITY: usize = 64;

/// An action travelling to the owner task
struct Envelope<A> {
    action: A,
    /// Present when a caller awaits the reduction of this action
    ack: Option<oneshot::Sender<()>>,
}

/// Counts queued actions plus running effects, and wakes idle waiters at zero
#[derive(Clone, Default)]
struct InFlight {
    count: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl InFlight {
    fn enter(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    fn exit(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    fn current(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight counter on drop, including when an effect is aborted
struct InFlightGuard(InFlight);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.exit();
    }
}

struct Registration {
    generation: u64,
    handle: AbortHandle,
}

/// Executes effect descriptions and feeds produced actions back to the owner task
struct EffectExecutor<A> {
    inbox: mpsc::UnboundedSender<Envelope<A>>,
    in_flight: InFlight,
    cancellables: Arc<Mutex<HashMap<EffectId, Registration>>>,
    generation: Arc<AtomicU64>,
}

impl<A> Clone for EffectExecutor<A> {
    fn clone(&self) -> Self {
        Self {
            inbox: self.inbox.clone(),
            in_flight: self.in_flight.clone(),
            cancellables: Arc::clone(&self.cancellables),
            generation: Arc::clone(&self.generation),
        }
    }
}

impl<A> EffectExecutor<A>
where
    A: Send + 'static,
{
    fn registry(&self) -> MutexGuard<'_, HashMap<EffectId, Registration>> {
        // A poisoned registry still holds valid abort handles.
        match self.cancellables.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Start an effect in the background.
    ///
    /// Cancellable registrations happen synchronously here, so an effect
    /// started by a later action always supersedes one started earlier.
    fn spawn(&self, effect: Effect<A>) {
        if effect.is_none() {
            tracing::trace!("Executing Effect::None (no-op)");
            metrics::counter!("onepass_store_effects_total", "type" => "none").increment(1);
            return;
        }

        self.in_flight.enter();
        let guard = InFlightGuard(self.in_flight.clone());
        let work = self.clone().run(effect);

        tokio::spawn(async move {
            let _guard = guard;
            work.await;
        });
    }

    fn feed_back(&self, action: A) {
        self.in_flight.enter();
        if self.inbox.send(Envelope { action, ack: None }).is_err() {
            self.in_flight.exit();
            tracing::debug!("Store closed, dropping action produced by effect");
        }
    }

    fn cancel(&self, id: EffectId) {
        if let Some(previous) = self.registry().remove(&id) {
            previous.handle.abort();
            tracing::debug!(effect_id = %id, "Cancelled running effect");
            metrics::counter!("onepass_store_effects_cancelled_total").increment(1);
        }
    }

    fn cancel_all(&self) {
        for (_, registration) in self.registry().drain() {
            registration.handle.abort();
        }
    }

    /// Build the future that performs `effect`, resolving once it is done.
    fn run(self, effect: Effect<A>) -> BoxFuture<'static, ()> {
        match effect {
            Effect::None => Box::pin(async {}),
            Effect::Future(fut) => {
                tracing::trace!("Executing Effect::Future");
                metrics::counter!("onepass_store_effects_total", "type" => "future").increment(1);
                Box::pin(async move {
                    if let Some(action) = fut.await {
                        self.feed_back(action);
                    } else {
                        tracing::trace!("Effect::Future completed with no action");
                    }
                })
            },
            Effect::Delay { duration, action } => {
                tracing::trace!(?duration, "Executing Effect::Delay");
                metrics::counter!("onepass_store_effects_total", "type" => "delay").increment(1);
                Box::pin(async move {
                    tokio::time::sleep(duration).await;
                    self.feed_back(*action);
                })
            },
            Effect::Parallel(effects) => {
                metrics::counter!("onepass_store_effects_total", "type" => "parallel").increment(1);
                let running: Vec<_> = effects
                    .into_iter()
                    .map(|effect| self.clone().run(effect))
                    .collect();
                Box::pin(async move {
                    futures::future::join_all(running).await;
                })
            },
            Effect::Sequential(effects) => {
                metrics::counter!("onepass_store_effects_total", "type" => "sequential")
                    .increment(1);
                Box::pin(async move {
                    for effect in effects {
                        self.clone().run(effect).await;
                    }
                })
            },
            Effect::Cancellable { id, effect } => {
                metrics::counter!("onepass_store_effects_total", "type" => "cancellable")
                    .increment(1);
                let (handle, registration) = AbortHandle::new_pair();
                let generation = self.generation.fetch_add(1, Ordering::SeqCst);

                let superseded = self
                    .registry()
                    .insert(id, Registration { generation, handle });
                if let Some(previous) = superseded {
                    previous.handle.abort();
                    tracing::debug!(effect_id = %id, "Superseded running effect");
                    metrics::counter!("onepass_store_effects_cancelled_total").increment(1);
                }

                let inner = self.clone().run(*effect);
                Box::pin(async move {
                    if Abortable::new(inner, registration).await.is_err() {
                        tracing::trace!(effect_id = %id, "Cancellable effect aborted");
                    }
                    let mut registry = self.registry();
                    if registry.get(&id).is_some_and(|r| r.generation == generation) {
                        registry.remove(&id);
                    }
                })
            },
            Effect::Cancel(id) => {
                self.cancel(id);
                Box::pin(async {})
            },
        }
    }
}

/// Aborts the owner task when the last store handle goes away
struct OwnerTask(tokio::task::AbortHandle);

impl Drop for OwnerTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// The Store - runtime for reducer execution
///
/// Cheap to clone; all clones talk to the same owner task.
///
/// # Type Parameters
///
/// - `S`: State type
/// - `A`: Action type
/// - `E`: Environment type
/// - `R`: Reducer implementation
pub struct Store<S, A, E, R> {
    state: Arc<RwLock<S>>,
    inbox: mpsc::UnboundedSender<Envelope<A>>,
    executor: EffectExecutor<A>,
    action_broadcast: broadcast::Sender<A>,
    shutdown: Arc<AtomicBool>,
    owner: Arc<OwnerTask>,
    _reducer: PhantomData<fn() -> (E, R)>,
}

impl<S, A, E, R> Clone for Store<S, A, E, R> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            inbox: self.inbox.clone(),
            executor: self.executor.clone(),
            action_broadcast: self.action_broadcast.clone(),
            shutdown: Arc::clone(&self.shutdown),
            owner: Arc::clone(&self.owner),
            _reducer: PhantomData,
        }
    }
}

impl<S, A, E, R> Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
    A: Clone + Send + 'static,
    S: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Create a new store and spawn its owner task
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
        Self::with_broadcast_capacity(initial_state, reducer, environment, DEFAULT_BROADCAST_CAPACITY)
    }

    /// Create a new store with a custom action broadcast capacity
    ///
    /// Slow observers that fall more than `capacity` actions behind skip ahead.
    #[must_use]
    pub fn with_broadcast_capacity(
        initial_state: S,
        reducer: R,
        environment: E,
        capacity: usize,
    ) -> Self {
        let (inbox, mut receiver) = mpsc::unbounded_channel::<Envelope<A>>();
        let (action_broadcast, _) = broadcast::channel(capacity.max(1));
        let state = Arc::new(RwLock::new(initial_state));

        let executor = EffectExecutor {
            inbox: inbox.clone(),
            in_flight: InFlight::default(),
            cancellables: Arc::new(Mutex::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
        };

        let owner_state = Arc::clone(&state);
        let owner_executor = executor.clone();
        let owner_broadcast = action_broadcast.clone();

        let task = tokio::spawn(async move {
            while let Some(Envelope { action, ack }) = receiver.recv().await {
                let observed = action.clone();
                let effects = {
                    let mut state = owner_state.write().await;
                    reducer.reduce(&mut state, action, &environment)
                };

                // No receivers is the common case; nothing to report.
                let _ = owner_broadcast.send(observed);

                for effect in effects {
                    owner_executor.spawn(effect);
                }

                if let Some(ack) = ack {
                    let _ = ack.send(());
                }
                owner_executor.in_flight.exit();
            }
            tracing::debug!("Store owner task stopped");
        });

        Self {
            state,
            inbox,
            executor,
            action_broadcast,
            shutdown: Arc::new(AtomicBool::new(false)),
            owner: Arc::new(OwnerTask(task.abort_handle())),
            _reducer: PhantomData,
        }
    }

    /// Send an action to the store
    ///
    /// Resolves once the reducer has applied the action and its effects have
    /// been started. Effects keep running in the background; use
    /// [`Store::wait_until_idle`] to wait for them.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting
    /// down, or [`StoreError::ChannelClosed`] if the owner task stopped before
    /// acknowledging the action.
    #[tracing::instrument(skip(self, action), name = "store_send")]
    pub async fn send(&self, action: A) -> Result<(), StoreError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(StoreError::ShutdownInProgress);
        }

        let (ack, acknowledged) = oneshot::channel();
        self.executor.in_flight.enter();
        if self
            .inbox
            .send(Envelope {
                action,
                ack: Some(ack),
            })
            .is_err()
        {
            self.executor.in_flight.exit();
            return Err(StoreError::ShutdownInProgress);
        }

        acknowledged.await.map_err(|_| StoreError::ChannelClosed)
    }

    /// Send an action and wait for a matching action to be reduced
    ///
    /// Subscribes before sending, so an effect that answers immediately is
    /// never missed.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Timeout`]: no matching action within `timeout`
    /// - [`StoreError::ChannelClosed`]: the broadcast channel closed
    /// - [`StoreError::ShutdownInProgress`]: the store is shutting down
    pub async fn send_and_wait_for<F>(
        &self,
        action: A,
        predicate: F,
        timeout: Duration,
    ) -> Result<A, StoreError>
    where
        F: Fn(&A) -> bool,
    {
        let mut observed = self.action_broadcast.subscribe();
        self.send(action).await?;

        tokio::time::timeout(timeout, async move {
            loop {
                match observed.recv().await {
                    Ok(action) if predicate(&action) => return Ok(action),
                    Ok(_) => {},
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Action observer lagged");
                    },
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(StoreError::ChannelClosed);
                    },
                }
            }
        })
        .await
        .map_err(|_| StoreError::Timeout)?
    }

    /// Subscribe to every action reduced by this store
    #[must_use]
    pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
        self.action_broadcast.subscribe()
    }

    /// Read the current state
    pub async fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&S) -> T,
    {
        let state = self.state.read().await;
        f(&state)
    }

    /// Wait until no actions are queued and no effects are running
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if the store is still busy after `timeout`.
    pub async fn wait_until_idle(&self, timeout: Duration) -> Result<(), StoreError> {
        let in_flight = self.executor.in_flight.clone();
        tokio::time::timeout(timeout, async move {
            loop {
                let notified = in_flight.idle.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if in_flight.current() == 0 {
                    return;
                }
                notified.await;
            }
        })
        .await
        .map_err(|_| StoreError::Timeout)
    }

    /// Stop accepting actions, abort cancellable effects and stop the owner task
    pub fn shutdown(&self) {
        tracing::info!("Shutting down store");
        self.shutdown.store(true, Ordering::Release);
        self.executor.cancel_all();
        self.owner.0.abort();
    }

    /// Whether [`Store::shutdown`] has been called
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}
