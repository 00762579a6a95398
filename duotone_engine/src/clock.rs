//! Clock & Timer (C1): monotonic periodic and one-shot timers with
//! cancellation-safe callbacks (spec.md §4.1).
//!
//! Grounded in the teacher's dedicated-thread style (`seq_manager.h`'s
//! `_tempo_event_thread`/`_save_phrase_seq_thread`): each timer owns a
//! background `std::thread` parked on a `parking_lot::Condvar`, not an async
//! runtime.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

struct State {
    next_fire: Instant,
    /// `Some(period)` for a periodic timer, `None` for one-shot.
    period: Option<Duration>,
    stop: bool,
}

struct Shared {
    state: Mutex<State>,
    cv: Condvar,
}

/// A running timer. Dropping it stops it (joining the worker thread), the
/// same as an explicit `stop()`.
pub struct Timer {
    shared: Arc<Shared>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Timer {
    fn spawn<F>(period: Option<Duration>, delay: Duration, mut callback: F) -> Timer
    where
        F: FnMut() + Send + 'static,
    {
        let shared = Arc::new(Shared {
            state: Mutex::new(State { next_fire: Instant::now() + delay, period, stop: false }),
            cv: Condvar::new(),
        });
        let worker = shared.clone();
        let handle = thread::Builder::new()
            .name("duotone-timer".into())
            .spawn(move || loop {
                {
                    let mut state = worker.state.lock();
                    loop {
                        if state.stop {
                            return;
                        }
                        let now = Instant::now();
                        if now >= state.next_fire {
                            break;
                        }
                        let wait = state.next_fire - now;
                        let timeout = worker.cv.wait_for(&mut state, wait);
                        if state.stop {
                            return;
                        }
                        if timeout.timed_out() {
                            break;
                        }
                        // Woken early (change_interval/stop notification that
                        // wasn't a stop) — loop and recompute the wait.
                    }
                }
                callback();
                let mut state = worker.state.lock();
                if state.stop {
                    return;
                }
                match state.period {
                    Some(p) => state.next_fire += p,
                    None => {
                        state.stop = true;
                        return;
                    }
                }
            })
            .expect("failed to spawn timer thread");
        Timer { shared, handle: Some(handle) }
    }

    /// Start a periodic timer firing every `period`.
    pub fn start_periodic<F>(period: Duration, callback: F) -> Timer
    where
        F: FnMut() + Send + 'static,
    {
        Self::spawn(Some(period), period, callback)
    }

    /// Start a one-shot timer firing once after `delay`.
    pub fn start_once<F>(delay: Duration, callback: F) -> Timer
    where
        F: FnMut() + Send + 'static,
    {
        Self::spawn(None, delay, callback)
    }

    /// Change a periodic timer's interval. The timer's next already-scheduled
    /// fire keeps its original deadline (phase is not lost); the new period
    /// takes effect from that fire onward.
    pub fn change_interval(&self, new_period: Duration) {
        let mut state = self.shared.state.lock();
        if state.period.is_some() {
            state.period = Some(new_period);
        }
        self.shared.cv.notify_all();
    }

    /// Stop the timer. Guarantees the callback is not running and will not
    /// run again before returning (blocks on the worker thread joining).
    pub fn stop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.stop = true;
        }
        self.shared.cv.notify_all();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn periodic_timer_fires_repeatedly() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();
        let mut t = Timer::start_periodic(Duration::from_millis(5), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        thread::sleep(Duration::from_millis(40));
        t.stop();
        assert!(count.load(Ordering::SeqCst) >= 3);
    }

    #[test]
    fn one_shot_timer_fires_once() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();
        let _t = Timer::start_once(Duration::from_millis(5), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        thread::sleep(Duration::from_millis(40));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_guarantees_no_further_callback() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();
        let mut t = Timer::start_periodic(Duration::from_millis(5), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        thread::sleep(Duration::from_millis(20));
        t.stop();
        let after_stop = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }
}
