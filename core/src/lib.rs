//! # OnePass Core
//!
//! Core traits and types shared by every OnePass crate.
//!
//! Feature logic is written as reducers: pure functions
//! `(State, Action, Environment) → (State, Effects)`. Effects are values that
//! describe work (a delayed action, an async fetch, a cancellable timer); the
//! runtime crate executes them and feeds resulting actions back.
//!
//! ## Core Concepts
//!
//! - **State**: owned, `Clone`-able snapshot of a feature
//! - **Action**: every input a reducer reacts to (user intents, stream emissions, effect results)
//! - **Reducer**: the only place state changes
//! - **Effect**: side effect descriptions (not execution)
//! - **Environment**: injected dependencies such as the [`environment::Clock`]
//!
//! ## Example
//!
//! ```ignore
//! use onepass_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
//!
//! impl Reducer for FeedReducer {
//!     type State = FeedState;
//!     type Action = FeedAction;
//!     type Environment = FeedEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut FeedState,
//!         action: FeedAction,
//!         env: &FeedEnvironment,
//!     ) -> SmallVec<[Effect<FeedAction>; 4]> {
//!         smallvec![Effect::None]
//!     }
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use smallvec::{smallvec, SmallVec};

/// Reducer module - The core trait for feature logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`.
/// They hold all decision making and are deterministic for identical inputs.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for feature logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// Updates `state` in place and returns descriptions of the work the
        /// runtime should perform next. Most actions produce zero or one
        /// effect, hence the inline capacity of four.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe side effects to be performed by the runtime.
/// They are values (not execution), composable, and cancellable by id.
pub mod effect {
    use std::fmt;
    use std::future::Future;
    use std::pin::Pin;
    use std::time::Duration;

    /// Identifier for a cancellable effect
    ///
    /// Two cancellable effects sharing an id never run concurrently: starting
    /// the newer one aborts the older one.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct EffectId(&'static str);

    impl EffectId {
        /// Create an effect id from a static name
        #[must_use]
        pub const fn new(name: &'static str) -> Self {
            Self(name)
        }

        /// The name this id was created with
        #[must_use]
        pub const fn as_str(&self) -> &'static str {
            self.0
        }
    }

    impl fmt::Display for EffectId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed immediately. They are returned from reducers
    /// and executed by the Store runtime.
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects concurrently
        Parallel(Vec<Effect<Action>>),

        /// Run effects one after another, each waiting for the previous
        Sequential(Vec<Effect<Action>>),

        /// Dispatch an action after a delay
        Delay {
            /// How long to wait
            duration: Duration,
            /// Action to dispatch after delay
            action: Box<Action>,
        },

        /// Arbitrary async computation
        ///
        /// If the output is `Some`, the action is fed back into the reducer.
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),

        /// Run `effect` under `id`, aborting any still-running effect with the same id
        Cancellable {
            /// Cancellation key
            id: EffectId,
            /// The wrapped effect
            effect: Box<Effect<Action>>,
        },

        /// Abort the running effect registered under this id, if any
        Cancel(EffectId),
    }

    impl<Action> fmt::Debug for Effect<Action>
    where
        Action: fmt::Debug,
    {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Sequential(effects) => {
                    f.debug_tuple("Effect::Sequential").field(effects).finish()
                },
                Effect::Delay { duration, action } => f
                    .debug_struct("Effect::Delay")
                    .field("duration", duration)
                    .field("action", action)
                    .finish(),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
                Effect::Cancellable { id, effect } => f
                    .debug_struct("Effect::Cancellable")
                    .field("id", id)
                    .field("effect", effect)
                    .finish(),
                Effect::Cancel(id) => f.debug_tuple("Effect::Cancel").field(id).finish(),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Combine effects to run in parallel
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// Chain effects to run sequentially
        #[must_use]
        pub const fn chain(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Sequential(effects)
        }

        /// Wrap this effect so a later effect with the same id supersedes it
        #[must_use]
        pub fn cancellable(self, id: EffectId) -> Effect<Action> {
            Effect::Cancellable {
                id,
                effect: Box::new(self),
            }
        }

        /// Whether this effect does nothing at all
        #[must_use]
        pub const fn is_none(&self) -> bool {
            matches!(self, Effect::None)
        }
    }
}

/// Environment module - Dependency injection traits
///
/// External dependencies are abstracted behind traits and injected via the
/// reducer's Environment parameter.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// Ranking and pass display never read the system clock directly; they ask
    /// the injected clock so tests can pin time.
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;

        /// Current time as epoch seconds
        fn now_epoch_seconds(&self) -> i64 {
            self.now().timestamp()
        }
    }

    /// Production clock backed by the system time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::effect::{Effect, EffectId};
    use super::environment::{Clock, SystemClock};
    use std::time::Duration;

    #[derive(Clone, Debug, PartialEq)]
    enum Ping {
        Pong,
    }

    #[test]
    fn cancellable_wraps_inner_effect() {
        let id = EffectId::new("search");
        let effect = Effect::Delay {
            duration: Duration::from_millis(300),
            action: Box::new(Ping::Pong),
        }
        .cancellable(id);

        match effect {
            Effect::Cancellable { id: got, effect } => {
                assert_eq!(got.as_str(), "search");
                assert!(matches!(*effect, Effect::Delay { .. }));
            },
            other => unreachable!("unexpected effect {other:?}"),
        }
    }

    #[test]
    fn debug_does_not_require_polling_futures() {
        let effect: Effect<Ping> = Effect::Future(Box::pin(async { Some(Ping::Pong) }));
        assert_eq!(format!("{effect:?}"), "Effect::Future(<future>)");
        assert_eq!(
            format!("{:?}", Effect::<Ping>::Cancel(EffectId::new("refresh"))),
            "Effect::Cancel(EffectId(\"refresh\"))"
        );
    }

    #[test]
    fn future_effect_yields_action() {
        let effect: Effect<Ping> = Effect::Future(Box::pin(async { Some(Ping::Pong) }));
        let Effect::Future(fut) = effect else {
            unreachable!("constructed as a future");
        };
        assert_eq!(tokio_test::block_on(fut), Some(Ping::Pong));
    }

    #[test]
    fn system_clock_epoch_seconds_matches_now() {
        let clock = SystemClock;
        let before = clock.now().timestamp();
        let secs = clock.now_epoch_seconds();
        assert!(secs >= before);
        assert!(Effect::<Ping>::None.is_none());
    }
}
