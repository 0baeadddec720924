use std::thread;
use std::time::Duration;

/// Source of the pacing delays between pointer actions. Tests swap in a
/// sleeper that records or skips the waits.
pub trait Sleeper: Send {
    fn sleep(&mut self, duration: Duration);
}

/// Blocks the current thread.
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}

/// Sleep for exact milliseconds.
pub fn sleep_ms(ms: u64) {
    thread::sleep(Duration::from_millis(ms));
}
