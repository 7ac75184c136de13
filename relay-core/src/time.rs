//! Time abstraction so the release, sweep, and reap loops can run against
//! controlled time in tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::Waker;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// Trait for providing time in tests and production.
pub trait TimeProvider: Send + Sync + 'static {
    /// Get the current UTC datetime.
    fn utc_now(&self) -> DateTime<Utc>;

    /// Sleep for a duration (in tests, this advances only with virtual time).
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>>;
}

/// Production time provider that uses real system time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Virtual time provider for deterministic tests. Time stands still until
/// [`VirtualTimeProvider::advance`] is called, which also wakes any virtual
/// sleeps whose deadline has passed.
#[derive(Clone, Debug)]
pub struct VirtualTimeProvider {
    inner: Arc<VirtualClock>,
}

#[derive(Debug)]
struct VirtualClock {
    now: Mutex<DateTime<Utc>>,
    timers: Mutex<Vec<VirtualTimer>>,
    next_timer: AtomicU64,
}

#[derive(Debug)]
struct VirtualTimer {
    id: u64,
    deadline: DateTime<Utc>,
    waker: Waker,
}

impl VirtualTimeProvider {
    pub fn new() -> Self {
        Self::new_at(Utc::now())
    }

    /// Create a virtual time provider starting at a specific time.
    pub fn new_at(start: DateTime<Utc>) -> Self {
        Self {
            inner: Arc::new(VirtualClock {
                now: Mutex::new(start),
                timers: Mutex::new(Vec::new()),
                next_timer: AtomicU64::new(0),
            }),
        }
    }

    /// Advance time by a duration and wake expired timers.
    pub fn advance(&self, duration: Duration) {
        let new_now = {
            let mut now = self.inner.now.lock().unwrap();
            let delta = TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX);
            *now = now.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC);
            *now
        };
        self.wake_expired(new_now);
    }

    /// Number of virtual sleeps still pending.
    pub fn pending_timers(&self) -> usize {
        self.inner.timers.lock().unwrap().len()
    }

    fn wake_expired(&self, now: DateTime<Utc>) {
        let mut timers = self.inner.timers.lock().unwrap();
        let mut i = 0;
        while i < timers.len() {
            if timers[i].deadline <= now {
                timers.remove(i).waker.wake();
            } else {
                i += 1;
            }
        }
    }
}

impl Default for VirtualTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeProvider for VirtualTimeProvider {
    fn utc_now(&self) -> DateTime<Utc> {
        *self.inner.now.lock().unwrap()
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        let delta = TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX);
        let deadline = self
            .utc_now()
            .checked_add_signed(delta)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Box::pin(VirtualSleep {
            id: self.inner.next_timer.fetch_add(1, Ordering::Relaxed),
            clock: self.inner.clone(),
            deadline,
            registered: false,
        })
    }
}

/// Future that completes when virtual time advances past its deadline.
struct VirtualSleep {
    id: u64,
    clock: Arc<VirtualClock>,
    deadline: DateTime<Utc>,
    registered: bool,
}

impl Future for VirtualSleep {
    type Output = ();

    fn poll(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        let this = self.get_mut();
        // The timers lock is held across the clock read and the registration:
        // an advance that updates the clock between the two would otherwise
        // wake nothing and strand this sleep. `advance` never holds the clock
        // lock while waking, so the lock order here cannot deadlock.
        let mut timers = this.clock.timers.lock().unwrap();
        let now = *this.clock.now.lock().unwrap();
        if now >= this.deadline {
            if this.registered {
                timers.retain(|timer| timer.id != this.id);
                this.registered = false;
            }
            return std::task::Poll::Ready(());
        }
        if let Some(timer) = timers.iter_mut().find(|timer| timer.id == this.id) {
            timer.waker.clone_from(cx.waker());
        } else {
            timers.push(VirtualTimer {
                id: this.id,
                deadline: this.deadline,
                waker: cx.waker().clone(),
            });
            this.registered = true;
        }
        std::task::Poll::Pending
    }
}

impl Drop for VirtualSleep {
    fn drop(&mut self) {
        if self.registered {
            if let Ok(mut timers) = self.clock.timers.lock() {
                timers.retain(|timer| timer.id != self.id);
            }
        }
    }
}
