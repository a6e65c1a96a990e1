//! Bounded, lazily populated instance pool.
//!
//! A [`Pool`] owns at most `capacity` instances, built on demand by an async
//! factory. Instances live in an append-only arena; a bounded channel of
//! arena indices is the only record of which ones are idle. A short-held
//! bookkeeping mutex tracks how many slots are reserved, whether the pool is
//! closed, and the first construction failure.
//!
//! ```text
//!  acquire ──▶ idle index queued? ──yes──▶ Lease
//!                 │ no
//!                 ▼
//!          slot free? ──yes──▶ reserve (lock) ──▶ build (no lock) ──▶ Lease
//!                 │ no
//!                 ▼
//!          wait for: release │ close │ a reservation given back
//! ```
//!
//! The factory runs outside the lock so a slow browser start never blocks
//! other callers. Once a construction has failed the pool stops building:
//! every later acquisition that would construct fails fast with
//! [`PoolError::Unavailable`].

use crate::error::PoolError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::future::Future;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch, Notify};
use tracing::{debug, info, warn};

/// Divisor applied to available parallelism when no size is requested.
/// Each renderer starts several processes of its own.
pub const DEFAULT_POOL_DIVISOR: usize = 2;

/// Upper bound on the derived pool size; each instance is a browser.
pub const MAX_POOL_SIZE: usize = 8;

/// Choose a pool capacity: a positive request is used verbatim, otherwise
/// half the available parallelism clamped to `1..=MAX_POOL_SIZE`.
pub fn resolve_pool_size(requested: usize) -> usize {
    let parallelism = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    pool_size_for(requested, parallelism)
}

fn pool_size_for(requested: usize, parallelism: usize) -> usize {
    if requested > 0 {
        return requested;
    }
    (parallelism / DEFAULT_POOL_DIVISOR).clamp(1, MAX_POOL_SIZE)
}

/// Something a [`Pool`] can own and tear down.
#[async_trait]
pub trait PoolResource: Send + Sync + 'static {
    type CloseError: std::fmt::Display + Send + 'static;

    /// Release external resources. Called once, by [`Pool::close`].
    async fn close(&self) -> Result<(), Self::CloseError>;
}

type Factory<T> = Box<dyn Fn() -> BoxFuture<'static, Result<T, String>> + Send + Sync>;

struct State<T> {
    instances: Vec<Arc<T>>,
    /// Built plus in-construction instances; never exceeds capacity.
    reserved: usize,
    closed: bool,
    failure: Option<String>,
}

struct Shared<T> {
    capacity: usize,
    factory: Factory<T>,
    state: Mutex<State<T>>,
    idle_tx: mpsc::Sender<usize>,
    idle_rx: tokio::sync::Mutex<mpsc::Receiver<usize>>,
    closed: watch::Sender<bool>,
    slot_freed: Notify,
}

impl<T> Shared<T> {
    fn state(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A bounded pool of lazily built `T`s. Cheap to clone; clones share state.
pub struct Pool<T: PoolResource> {
    shared: Arc<Shared<T>>,
}

impl<T: PoolResource> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: PoolResource> std::fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.shared.state();
        f.debug_struct("Pool")
            .field("capacity", &self.shared.capacity)
            .field("created", &st.instances.len())
            .field("closed", &st.closed)
            .finish()
    }
}

enum Next {
    Idle(usize),
    Build,
    Wait,
}

impl<T: PoolResource> Pool<T> {
    /// Create a pool of at most `capacity` instances (minimum 1). Nothing is
    /// built until the first [`acquire`](Self::acquire).
    pub fn new<F, Fut, E>(capacity: usize, factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: std::fmt::Display,
    {
        let capacity = capacity.max(1);
        let (idle_tx, idle_rx) = mpsc::channel(capacity);
        let (closed, _) = watch::channel(false);
        let factory: Factory<T> = Box::new(move || {
            let fut = factory();
            Box::pin(async move { fut.await.map_err(|e| e.to_string()) })
        });
        Self {
            shared: Arc::new(Shared {
                capacity,
                factory,
                state: Mutex::new(State {
                    instances: Vec::with_capacity(capacity),
                    reserved: 0,
                    closed: false,
                    failure: None,
                }),
                idle_tx,
                idle_rx: tokio::sync::Mutex::new(idle_rx),
                closed,
                slot_freed: Notify::new(),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Number of instances built so far.
    pub fn created(&self) -> usize {
        self.shared.state().instances.len()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state().closed
    }

    /// Borrow an instance, building one if the pool has room, otherwise
    /// waiting for a release.
    pub async fn acquire(&self) -> Result<Lease<T>, PoolError> {
        let mut closed_rx = self.shared.closed.subscribe();

        loop {
            // Registered before the state check so a reservation given back
            // in between still wakes us.
            let slot_freed = self.shared.slot_freed.notified();
            tokio::pin!(slot_freed);
            slot_freed.as_mut().enable();

            match self.next_step()? {
                Next::Idle(index) => return self.lease(index),
                Next::Build => return self.build().await,
                Next::Wait => {}
            }

            debug!(capacity = self.shared.capacity, "Pool exhausted; waiting for a release");
            tokio::select! {
                _ = async { closed_rx.wait_for(|closed| *closed).await.map(|_| ()) } => {
                    return Err(PoolError::Closed);
                }
                _ = &mut slot_freed => continue,
                index = async { self.shared.idle_rx.lock().await.recv().await } => {
                    return match index {
                        Some(index) => self.lease(index),
                        None => Err(PoolError::Closed),
                    };
                }
            }
        }
    }

    fn next_step(&self) -> Result<Next, PoolError> {
        if let Some(index) = self.try_take_idle() {
            return Ok(Next::Idle(index));
        }
        let mut st = self.shared.state();
        if st.closed {
            return Err(PoolError::Closed);
        }
        if st.reserved < self.shared.capacity {
            if let Some(cause) = &st.failure {
                return Err(PoolError::Unavailable {
                    cause: cause.clone(),
                });
            }
            st.reserved += 1;
            return Ok(Next::Build);
        }
        Ok(Next::Wait)
    }

    fn try_take_idle(&self) -> Option<usize> {
        // A held receiver lock means someone is already waiting; they get
        // the next release and we fall through to building or waiting.
        let mut rx = self.shared.idle_rx.try_lock().ok()?;
        rx.try_recv().ok()
    }

    async fn build(&self) -> Result<Lease<T>, PoolError> {
        let mut reservation = Reservation {
            shared: &*self.shared,
            committed: false,
        };

        let started_at = std::time::Instant::now();
        let instance = match (self.shared.factory)().await {
            Ok(instance) => Arc::new(instance),
            Err(cause) => {
                warn!(error = %cause, "Pool instance construction failed; pool will not retry");
                self.shared.state().failure.get_or_insert(cause.clone());
                return Err(PoolError::Unavailable { cause });
            }
        };

        let index = {
            let mut st = self.shared.state();
            if st.closed {
                None
            } else {
                st.instances.push(Arc::clone(&instance));
                reservation.committed = true;
                Some(st.instances.len() - 1)
            }
        };

        let Some(index) = index else {
            // Closed while we were building; nobody else will close this one.
            if let Err(e) = instance.close().await {
                warn!(error = %e, "Failed to close instance built during shutdown");
            }
            return Err(PoolError::Closed);
        };

        info!(
            index,
            capacity = self.shared.capacity,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "Pool instance created"
        );
        Ok(Lease {
            shared: Arc::clone(&self.shared),
            index,
            instance,
            released: false,
        })
    }

    fn lease(&self, index: usize) -> Result<Lease<T>, PoolError> {
        let st = self.shared.state();
        if st.closed {
            return Err(PoolError::Closed);
        }
        let instance = st.instances.get(index).cloned().ok_or_else(|| PoolError::Unavailable {
            cause: format!("idle index {index} is not in the arena"),
        })?;
        Ok(Lease {
            shared: Arc::clone(&self.shared),
            index,
            instance,
            released: false,
        })
    }

    /// Close every instance ever built, idle or leased. Later calls return
    /// `Ok(())` without doing anything.
    pub async fn close(&self) -> Result<(), PoolError> {
        let instances = {
            let mut st = self.shared.state();
            if st.closed {
                return Ok(());
            }
            st.closed = true;
            st.instances.clone()
        };
        self.shared.closed.send_replace(true);

        let total = instances.len();
        let mut failures = Vec::new();
        for (index, instance) in instances.iter().enumerate() {
            if let Err(e) = instance.close().await {
                warn!(index, error = %e, "Pool instance failed to close");
                failures.push(format!("instance {index}: {e}"));
            }
        }

        info!(total, failed = failures.len(), "Pool closed");
        if failures.is_empty() {
            Ok(())
        } else {
            Err(PoolError::Shutdown { total, failures })
        }
    }
}

/// Gives a reserved slot back unless the build committed it.
struct Reservation<'a, T> {
    shared: &'a Shared<T>,
    committed: bool,
}

impl<T> Drop for Reservation<'_, T> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        {
            let mut st = self.shared.state();
            st.reserved = st.reserved.saturating_sub(1);
        }
        self.shared.slot_freed.notify_waiters();
    }
}

/// An instance on loan from a [`Pool`]. Returned on [`release`](Self::release)
/// or when dropped.
pub struct Lease<T: PoolResource> {
    shared: Arc<Shared<T>>,
    index: usize,
    instance: Arc<T>,
    released: bool,
}

impl<T: PoolResource> Lease<T> {
    /// Arena position of this instance; stable for the pool's lifetime.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Hand the instance back. A no-op once the pool is closed.
    pub fn release(mut self) {
        self.give_back();
    }

    fn give_back(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if self.shared.state().closed {
            return;
        }
        // Capacity equals the arena bound, so the queue always has room.
        if let Err(e) = self.shared.idle_tx.try_send(self.index) {
            debug!(index = self.index, error = %e, "Release not queued");
        }
    }
}

impl<T: PoolResource> Deref for Lease<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.instance
    }
}

impl<T: PoolResource> Drop for Lease<T> {
    fn drop(&mut self) {
        self.give_back();
    }
}

impl<T: PoolResource> std::fmt::Debug for Lease<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease").field("index", &self.index).finish()
    }
}
