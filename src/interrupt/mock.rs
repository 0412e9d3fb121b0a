//! Mock interrupt line for testing

use super::Interrupt;
use crate::error::{Error, Result};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Mock interrupt line for unit testing
///
/// Edges are injected as counted tokens; each successful wait consumes one.
/// `disconnect` makes every current and future wait fail, modeling a dead
/// interrupt line.
#[derive(Clone)]
pub struct MockInterrupt {
    inner: Arc<(Mutex<MockInterruptInner>, Condvar)>,
}

struct MockInterruptInner {
    pending: u32,
    waits: u64,
    disconnected: bool,
}

impl MockInterrupt {
    /// Create a new mock interrupt line with no pending edges
    pub fn new() -> Self {
        MockInterrupt {
            inner: Arc::new((
                Mutex::new(MockInterruptInner {
                    pending: 0,
                    waits: 0,
                    disconnected: false,
                }),
                Condvar::new(),
            )),
        }
    }

    /// Queue `count` edges and wake any blocked waiter
    pub fn inject_edges(&self, count: u32) {
        let (lock, cond) = &*self.inner;
        let mut inner = lock.lock().unwrap();
        inner.pending += count;
        cond.notify_all();
    }

    /// Fail every current and future wait
    pub fn disconnect(&self) {
        let (lock, cond) = &*self.inner;
        let mut inner = lock.lock().unwrap();
        inner.disconnected = true;
        cond.notify_all();
    }

    /// Number of `wait_edge` calls made so far
    pub fn wait_count(&self) -> u64 {
        let (lock, _) = &*self.inner;
        lock.lock().unwrap().waits
    }
}

impl Interrupt for MockInterrupt {
    fn wait_edge(&mut self, timeout_ms: u32) -> Result<()> {
        let (lock, cond) = &*self.inner;
        let mut inner = lock.lock().unwrap();
        inner.waits += 1;

        if timeout_ms == 0 {
            if inner.disconnected {
                return Err(Error::Gpio("interrupt line closed".to_string()));
            }
            if inner.pending > 0 {
                inner.pending -= 1;
                return Ok(());
            }
            return Err(Error::Timeout);
        }

        let deadline = Instant::now() + Duration::from_millis(timeout_ms as u64);
        while inner.pending == 0 && !inner.disconnected {
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout);
            }
            let (guard, _) = cond.wait_timeout(inner, deadline - now).unwrap();
            inner = guard;
        }

        if inner.disconnected {
            return Err(Error::Gpio("interrupt line closed".to_string()));
        }
        inner.pending -= 1;
        Ok(())
    }
}

impl Default for MockInterrupt {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_edge_consumed_without_blocking() {
        let mock = MockInterrupt::new();
        mock.inject_edges(2);

        let mut irq = mock.clone();
        irq.wait_edge(0).unwrap();
        irq.wait_edge(0).unwrap();
        assert!(matches!(irq.wait_edge(0), Err(Error::Timeout)));
        assert_eq!(mock.wait_count(), 3);
    }

    #[test]
    fn test_bounded_wait_times_out() {
        let mut irq = MockInterrupt::new();
        let start = Instant::now();
        assert!(matches!(irq.wait_edge(20), Err(Error::Timeout)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_disconnect_fails_waits() {
        let mock = MockInterrupt::new();
        mock.inject_edges(1);
        mock.disconnect();

        let mut irq = mock.clone();
        assert!(matches!(irq.wait_edge(0), Err(Error::Gpio(_))));
        assert!(matches!(irq.wait_edge(100), Err(Error::Gpio(_))));
    }
}
