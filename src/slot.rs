// SPDX-License-Identifier: Apache-2.0

//! Per-construct initialization state machine.
//!
//! A [Slot] moves through `Uninitialized -> Pending -> Ready` within one
//! generation. `Ready -> Uninitialized` happens only through an explicit
//! reset under the `reinit` policy; `Pending -> Uninitialized` happens when
//! the initializer fails, so a failed attempt never leaks a partial instance
//! and never poisons the slot.
//!
//! All transitions happen under the slot mutex, which is never held across
//! an await point. The first caller to observe `Uninitialized` installs the
//! in-flight attempt while still holding the lock, which is what makes the
//! single-flight guarantee hold even for parallel callers.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

use crate::construct::Construct;
use crate::error::{InitError, InitFailure};
use crate::policy::{ArgForwarding, Policy};
use crate::registration::Initializer;

type SharedInit<T> = Shared<BoxFuture<'static, Result<Arc<T>, InitFailure>>>;

/// Identifies one initialization attempt within one generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AttemptId {
    generation: u64,
    attempt: u64,
}

/// The shared handle for an in-flight initialization attempt.
///
/// Every caller coalesced onto the same attempt holds a clone of the same
/// handle; awaiting it yields the one settled result. Dropping a handle does
/// not cancel the attempt or affect other waiters.
pub struct PendingInit<T> {
    shared: SharedInit<T>,
    attempt: AttemptId,
}

impl<T> Clone for PendingInit<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            attempt: self.attempt,
        }
    }
}

impl<T> PendingInit<T> {
    /// Whether two handles observe the same in-flight attempt.
    pub fn same_flight(&self, other: &Self) -> bool {
        self.attempt == other.attempt
    }
}

// Manual impl: the handle is debuggable regardless of whether `T` is.
impl<T> fmt::Debug for PendingInit<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingInit")
            .field("generation", &self.attempt.generation)
            .field("attempt", &self.attempt.attempt)
            .finish_non_exhaustive()
    }
}

impl<T> Future for PendingInit<T> {
    type Output = Result<Arc<T>, InitFailure>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().shared).poll(cx)
    }
}

/// Result of a `request_init` call: either the memoized instance, available
/// without suspension, or the shared handle for an in-flight attempt.
pub enum InitOutcome<T> {
    Ready(Arc<T>),
    Pending(PendingInit<T>),
}

impl<T> InitOutcome<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, InitOutcome::Ready(_))
    }

    pub fn ready(&self) -> Option<&Arc<T>> {
        match self {
            InitOutcome::Ready(instance) => Some(instance),
            InitOutcome::Pending(_) => None,
        }
    }

    pub fn pending(&self) -> Option<&PendingInit<T>> {
        match self {
            InitOutcome::Ready(_) => None,
            InitOutcome::Pending(pending) => Some(pending),
        }
    }

    /// Await settlement, collapsing both arms into the completed instance.
    pub async fn resolved(self) -> Result<Arc<T>, InitError> {
        match self {
            InitOutcome::Ready(instance) => Ok(instance),
            InitOutcome::Pending(pending) => Ok(pending.await?),
        }
    }
}

impl<T> fmt::Debug for InitOutcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitOutcome::Ready(_) => f.write_str("Ready(..)"),
            InitOutcome::Pending(pending) => f.debug_tuple("Pending").field(pending).finish(),
        }
    }
}

enum SlotState<T> {
    Uninitialized,
    Pending(PendingInit<T>),
    Ready(Arc<T>),
}

struct SlotInner<T> {
    state: SlotState<T>,
    generation: u64,
    attempt: u64,
}

pub(crate) struct Slot<T: Construct> {
    policy: Policy,
    forwarding: ArgForwarding,
    initializer: Initializer<T>,
    inner: Mutex<SlotInner<T>>,
}

impl<T: Construct> Slot<T> {
    pub(crate) fn new(
        policy: Policy,
        forwarding: ArgForwarding,
        initializer: Initializer<T>,
    ) -> Self {
        Self {
            policy,
            forwarding,
            initializer,
            inner: Mutex::new(SlotInner {
                state: SlotState::Uninitialized,
                generation: 0,
                attempt: 0,
            }),
        }
    }

    pub(crate) fn request_init(
        self: &Arc<Self>,
        args: T::Args,
    ) -> Result<InitOutcome<T>, InitError> {
        let mut inner = self.inner.lock();
        match &inner.state {
            SlotState::Ready(instance) => {
                return match self.policy {
                    Policy::ReturnFirst => {
                        tracing::trace!(
                            construct = T::label(),
                            generation = inner.generation,
                            "returning memoized instance"
                        );
                        Ok(InitOutcome::Ready(Arc::clone(instance)))
                    }
                    // `reinit` without an explicit reset behaves as `strict`.
                    Policy::Strict | Policy::Reinit => Err(InitError::Reinitialization {
                        construct: T::label(),
                    }),
                };
            }
            SlotState::Pending(pending) => {
                tracing::trace!(
                    construct = T::label(),
                    generation = inner.generation,
                    "coalescing onto in-flight attempt"
                );
                return Ok(InitOutcome::Pending(pending.clone()));
            }
            SlotState::Uninitialized => {}
        }

        inner.attempt += 1;
        let attempt = AttemptId {
            generation: inner.generation,
            attempt: inner.attempt,
        };

        if let Initializer::Sync(init) = &self.initializer {
            // Runs under the slot lock, so no other caller can observe
            // `Uninitialized` for this attempt.
            let mut instance = T::allocate();
            return match init(&mut instance, args) {
                Ok(()) => {
                    let instance = Arc::new(instance);
                    inner.state = SlotState::Ready(Arc::clone(&instance));
                    tracing::debug!(
                        construct = T::label(),
                        generation = attempt.generation,
                        "initialized"
                    );
                    Ok(InitOutcome::Ready(instance))
                }
                Err(error) => {
                    let failure = InitFailure::new(error);
                    tracing::debug!(
                        construct = T::label(),
                        generation = attempt.generation,
                        %failure,
                        "initializer failed"
                    );
                    Err(InitError::Failed(failure))
                }
            };
        }

        let pending = self.launch(attempt, args);
        inner.state = SlotState::Pending(pending.clone());
        tracing::debug!(
            construct = T::label(),
            generation = attempt.generation,
            attempt = attempt.attempt,
            "initialization in flight"
        );
        Ok(InitOutcome::Pending(pending))
    }

    /// Build the shared driver future for one deferred attempt. The driver
    /// re-locks the slot at settlement and transitions it before any waiter
    /// observes the result.
    fn launch(self: &Arc<Self>, attempt: AttemptId, args: T::Args) -> PendingInit<T> {
        let slot = Arc::clone(self);
        let driver: BoxFuture<'static, Result<Arc<T>, InitFailure>> = Box::pin(async move {
            let mut instance = T::allocate();
            let result = slot.run_initializer(&mut instance, args).await;
            let mut inner = slot.inner.lock();
            match result {
                Ok(()) => {
                    // The allocated object is what gets memoized; any value
                    // the initializer produced beyond success is discarded.
                    let instance = Arc::new(instance);
                    inner.state = SlotState::Ready(Arc::clone(&instance));
                    tracing::debug!(
                        construct = T::label(),
                        generation = attempt.generation,
                        "initialized"
                    );
                    Ok(instance)
                }
                Err(error) => {
                    inner.state = SlotState::Uninitialized;
                    let failure = InitFailure::new(error);
                    tracing::debug!(
                        construct = T::label(),
                        generation = attempt.generation,
                        %failure,
                        "initializer failed"
                    );
                    Err(failure)
                }
            }
        });
        PendingInit {
            shared: driver.shared(),
            attempt,
        }
    }

    async fn run_initializer(&self, instance: &mut T, args: T::Args) -> anyhow::Result<()> {
        match &self.initializer {
            Initializer::Sync(init) => init(instance, args),
            Initializer::Deferred(init) => init(instance, args).await,
            Initializer::PostAllocate => {
                let forwarded = match self.forwarding {
                    ArgForwarding::Forward => Some(&args),
                    ArgForwarding::Withhold => None,
                };
                instance.post_allocate(forwarded).await
            }
        }
    }

    pub(crate) fn reset(&self) -> Result<(), InitError> {
        if self.policy != Policy::Reinit {
            return Err(InitError::Configuration {
                construct: T::label(),
                reason: format!("reset requires the reinit policy, not {}", self.policy),
            });
        }
        let mut inner = self.inner.lock();
        if matches!(inner.state, SlotState::Pending(_)) {
            return Err(InitError::Usage {
                construct: T::label(),
                reason: "initialization is in flight; reset must wait for settlement".into(),
            });
        }
        inner.state = SlotState::Uninitialized;
        inner.generation += 1;
        inner.attempt = 0;
        tracing::debug!(
            construct = T::label(),
            generation = inner.generation,
            "reset to a new generation"
        );
        Ok(())
    }

    pub(crate) fn instance(&self) -> Result<Arc<T>, InitError> {
        match &self.inner.lock().state {
            SlotState::Ready(instance) => Ok(Arc::clone(instance)),
            // A pending attempt is not an instance yet.
            SlotState::Uninitialized | SlotState::Pending(_) => Err(InitError::Uninitialized {
                construct: T::label(),
            }),
        }
    }
}
