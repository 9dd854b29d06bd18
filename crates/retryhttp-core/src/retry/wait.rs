//! Delay primitive invoked between attempts.

use std::time::Duration;

/// Blocks the calling thread between attempts.
///
/// This is the only suspension point of the retry loop. Tests substitute an
/// implementation that records delays instead of sleeping.
pub trait Waiter: Send + Sync {
    fn wait(&self, delay: Duration);
}

/// Sleeps on the current thread. The delay is not interruptible.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Waiter for ThreadSleeper {
    fn wait(&self, delay: Duration) {
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
}

impl<F> Waiter for F
where
    F: Fn(Duration) + Send + Sync,
{
    fn wait(&self, delay: Duration) {
        self(delay)
    }
}
