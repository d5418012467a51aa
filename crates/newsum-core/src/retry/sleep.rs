//! Blocking sleep seam, so backoff and pacing can be observed in tests.

use std::time::Duration;

pub trait Sleeper {
    fn sleep(&self, d: Duration);
}

/// Sleeps the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, d: Duration) {
        if !d.is_zero() {
            std::thread::sleep(d);
        }
    }
}

impl<S: Sleeper + ?Sized> Sleeper for &S {
    fn sleep(&self, d: Duration) {
        (**self).sleep(d)
    }
}
