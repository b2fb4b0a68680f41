//! In-memory [`OrderSource`] for tests (feature `testkit`).
//!
//! A `StaticSource` answers `list_recent_orders` from a swappable
//! [`Behavior`], optionally after an artificial delay, and records how many
//! calls it served and how many overlapped.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::{OrderSource, Origin, SourceError, SourceOrder};

#[derive(Debug, Clone)]
pub enum Behavior {
    Orders(Vec<SourceOrder>),
    Fail(SourceError),
    Panic,
}

pub struct StaticSource {
    origin: Origin,
    behavior: Mutex<Behavior>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StaticSource {
    pub fn new(origin: Origin, behavior: Behavior) -> Self {
        Self {
            origin,
            behavior: Mutex::new(behavior),
            delay: Mutex::new(None),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_orders(origin: Origin, orders: Vec<SourceOrder>) -> Self {
        Self::new(origin, Behavior::Orders(orders))
    }

    pub fn failing(origin: Origin, err: SourceError) -> Self {
        Self::new(origin, Behavior::Fail(err))
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock().unwrap_or_else(PoisonError::into_inner) = Some(delay);
        self
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock().unwrap_or_else(PoisonError::into_inner) = behavior;
    }

    /// Number of `list_recent_orders` calls started so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of `list_recent_orders` calls observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn snapshot(&self) -> Behavior {
        self.behavior
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl OrderSource for StaticSource {
    fn origin(&self) -> Origin {
        self.origin
    }

    async fn list_recent_orders(&self, limit: usize) -> Result<Vec<SourceOrder>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let delay = *self.delay.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }

        match self.snapshot() {
            Behavior::Orders(mut orders) => {
                orders.truncate(limit);
                Ok(orders)
            }
            Behavior::Fail(err) => Err(err),
            Behavior::Panic => panic!("StaticSource configured to panic"),
        }
    }

    async fn get_order(&self, id: &str) -> Result<SourceOrder, SourceError> {
        match self.snapshot() {
            Behavior::Orders(orders) => orders
                .into_iter()
                .find(|o| o.id() == id)
                .ok_or_else(|| SourceError::NotFound(id.to_string())),
            Behavior::Fail(err) => Err(err),
            Behavior::Panic => panic!("StaticSource configured to panic"),
        }
    }
}
