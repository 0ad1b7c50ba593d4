//! # Guestlist Runtime
//!
//! The Store runtime that coordinates reducer execution and effect handling.
//!
//! ## Core Components
//!
//! - **Store**: Owns state, runs the reducer, executes effects
//! - **Feedback loop**: Actions produced by effects are sent back through the reducer
//!
//! ## Example
//!
//! ```ignore
//! use guestlist_runtime::Store;
//!
//! let store = Store::new(EventState::new(), EventReducer::new(), environment);
//!
//! store.send(EventAction::CreateEvent { actor, submission }).await?;
//!
//! let count = store.state(|s| s.count()).await;
//! ```

use futures::future::{join_all, BoxFuture};
use guestlist_core::{effect::Effect, reducer::Reducer};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions
        ///
        /// This error is returned when `send()` is called after shutdown initiated.
        #[error("Store is shutting down")]
        ShutdownInProgress,
    }
}

pub use error::StoreError;

/// The Store - runtime for a reducer
///
/// The Store manages:
/// 1. State (behind `RwLock` for concurrent access)
/// 2. Reducer (business logic)
/// 3. Environment (injected dependencies)
/// 4. Effect execution (with feedback loop)
///
/// # Concurrency
///
/// - The reducer executes while holding the write lock
/// - Effects execute after the lock is released
/// - `send()` returns once every effect it triggered, and every action those
///   effects fed back, has been processed
pub struct Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    state: Arc<RwLock<S>>,
    reducer: R,
    environment: E,
    shutdown: Arc<AtomicBool>,
}

impl<S, A, E, R> Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
    A: Send + 'static,
    S: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Create a new store with initial state, reducer, and environment
    #[must_use]
    pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
        Self {
            state: Arc::new(RwLock::new(initial_state)),
            reducer,
            environment,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Send an action to the store
    ///
    /// 1. Acquires write lock on state
    /// 2. Calls reducer with (state, action, environment)
    /// 3. Executes returned effects
    /// 4. Feeds actions produced by effects back through the reducer, in order
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
    #[tracing::instrument(skip(self, action), name = "store_send")]
    pub async fn send(&self, action: A) -> Result<(), StoreError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(StoreError::ShutdownInProgress);
        }

        let mut pending = VecDeque::from([action]);

        while let Some(action) = pending.pop_front() {
            let effects = {
                let mut state = self.state.write().await;
                self.reducer.reduce(&mut state, action, &self.environment)
            };
            metrics::counter!("store.actions.processed").increment(1);

            for effect in effects {
                pending.extend(Self::execute_effect(effect).await);
            }
        }

        Ok(())
    }

    /// Read state through a closure
    pub async fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&S) -> T,
    {
        let state = self.state.read().await;
        f(&*state)
    }

    /// Stop accepting new actions
    pub fn shutdown(&self) {
        tracing::info!("Store shutting down");
        self.shutdown.store(true, Ordering::Release);
    }

    /// Execute one effect and collect the actions it feeds back
    fn execute_effect(effect: Effect<A>) -> BoxFuture<'static, Vec<A>> {
        Box::pin(async move {
            match effect {
                Effect::None => {
                    tracing::trace!("Executing Effect::None (no-op)");
                    metrics::counter!("store.effects.executed", "type" => "none").increment(1);
                    Vec::new()
                },
                Effect::Future(fut) => {
                    tracing::trace!("Executing Effect::Future");
                    metrics::counter!("store.effects.executed", "type" => "future").increment(1);
                    fut.await.into_iter().collect()
                },
                Effect::Parallel(effects) => {
                    tracing::trace!("Executing Effect::Parallel with {} effects", effects.len());
                    metrics::counter!("store.effects.executed", "type" => "parallel").increment(1);
                    join_all(effects.into_iter().map(Self::execute_effect))
                        .await
                        .into_iter()
                        .flatten()
                        .collect()
                },
                Effect::Sequential(effects) => {
                    tracing::trace!("Executing Effect::Sequential with {} effects", effects.len());
                    metrics::counter!("store.effects.executed", "type" => "sequential")
                        .increment(1);
                    let mut produced = Vec::new();
                    for effect in effects {
                        produced.extend(Self::execute_effect(effect).await);
                    }
                    produced
                },
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use guestlist_core::{smallvec, SmallVec};

    #[derive(Clone, Debug, Default)]
    struct CounterState {
        count: i32,
        log: Vec<&'static str>,
    }

    #[derive(Clone, Debug)]
    enum CounterAction {
        Increment,
        IncrementTwiceLater,
        Record(&'static str),
        RecordInOrder,
    }

    struct CounterReducer;

    impl Reducer for CounterReducer {
        type State = CounterState;
        type Action = CounterAction;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            match action {
                CounterAction::Increment => {
                    state.count += 1;
                    smallvec![Effect::None]
                },
                CounterAction::IncrementTwiceLater => smallvec![Effect::merge(vec![
                    Effect::future(async { Some(CounterAction::Increment) }),
                    Effect::future(async { Some(CounterAction::Increment) }),
                ])],
                CounterAction::Record(entry) => {
                    state.log.push(entry);
                    SmallVec::new()
                },
                CounterAction::RecordInOrder => smallvec![Effect::chain(vec![
                    Effect::future(async { Some(CounterAction::Record("first")) }),
                    Effect::future(async { None }),
                    Effect::future(async { Some(CounterAction::Record("second")) }),
                ])],
            }
        }
    }

    #[tokio::test]
    async fn send_runs_reducer() {
        let store = Store::new(CounterState::default(), CounterReducer, ());
        store.send(CounterAction::Increment).await.unwrap();
        assert_eq!(store.state(|s| s.count).await, 1);
    }

    #[tokio::test]
    async fn effects_feed_actions_back() {
        let store = Store::new(CounterState::default(), CounterReducer, ());
        store.send(CounterAction::IncrementTwiceLater).await.unwrap();
        assert_eq!(store.state(|s| s.count).await, 2);
    }

    #[tokio::test]
    async fn sequential_effects_preserve_order() {
        let store = Store::new(CounterState::default(), CounterReducer, ());
        store.send(CounterAction::RecordInOrder).await.unwrap();
        assert_eq!(store.state(|s| s.log.clone()).await, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn send_after_shutdown_is_rejected() {
        let store = Store::new(CounterState::default(), CounterReducer, ());
        store.shutdown();
        assert_eq!(
            store.send(CounterAction::Increment).await,
            Err(StoreError::ShutdownInProgress)
        );
        assert_eq!(store.state(|s| s.count).await, 0);
    }
}
