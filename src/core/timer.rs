//! One-shot, re-armable timer backed by a dedicated thread

use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

enum TimerCommand {
    Arm(Duration),
    ArmIfIdle(Duration),
    Disarm,
    Stop,
}

/// Timer that invokes its callback once per arming, on its own thread.
///
/// Arming an armed timer moves its deadline. The callback runs outside any
/// lock held by the timer, so it may re-arm the timer itself.
pub struct RearmableTimer {
    commands: Sender<TimerCommand>,
    armed: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RearmableTimer {
    /// Spawn the timer thread
    pub fn spawn<F>(name: &str, callback: F) -> std::io::Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let (commands, receiver) = unbounded::<TimerCommand>();
        let armed = Arc::new(AtomicBool::new(false));
        let armed_bg = Arc::clone(&armed);

        let handle = thread::Builder::new()
            .name(format!("{}-timer", name))
            .spawn(move || {
                let mut deadline: Option<Instant> = None;
                loop {
                    let command = match deadline {
                        Some(at) => receiver.recv_deadline(at),
                        None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
                    };

                    match command {
                        Ok(TimerCommand::Arm(after)) => deadline = Some(Instant::now() + after),
                        Ok(TimerCommand::ArmIfIdle(after)) => {
                            deadline.get_or_insert_with(|| Instant::now() + after);
                        }
                        Ok(TimerCommand::Disarm) => {
                            deadline = None;
                            armed_bg.store(false, Ordering::Release);
                        }
                        Ok(TimerCommand::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {
                            deadline = None;
                            armed_bg.store(false, Ordering::Release);
                            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(
                                &callback,
                            ));
                            if let Err(payload) = result {
                                tracing::error!(
                                    panic = %super::error::panic_message(payload.as_ref()),
                                    "timer callback panicked"
                                );
                            }
                        }
                    }
                }
            })?;

        Ok(Self {
            commands,
            armed,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Fire after `after`, replacing any pending deadline
    pub fn arm(&self, after: Duration) {
        self.armed.store(true, Ordering::Release);
        let _ = self.commands.send(TimerCommand::Arm(after));
    }

    /// Fire after `after` unless a deadline is already pending
    pub fn arm_if_idle(&self, after: Duration) {
        self.armed.store(true, Ordering::Release);
        let _ = self.commands.send(TimerCommand::ArmIfIdle(after));
    }

    pub fn disarm(&self) {
        let _ = self.commands.send(TimerCommand::Disarm);
    }

    /// Whether a deadline is pending
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// Stop the thread and wait for it; a pending deadline never fires.
    ///
    /// Calling this from the timer's own callback does not wait.
    pub fn stop(&self) {
        let _ = self.commands.send(TimerCommand::Stop);
        if let Some(handle) = self.handle.lock().take() {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if let Err(e) = handle.join() {
                tracing::error!(panic = ?e, "timer thread panicked");
            }
        }
    }
}

impl Drop for RearmableTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_fires_once_per_arming() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);
        let timer = RearmableTimer::spawn("test", move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        timer.arm(Duration::from_millis(20));
        thread::sleep(Duration::from_millis(100));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timer.is_armed());

        timer.arm(Duration::from_millis(20));
        thread::sleep(Duration::from_millis(100));
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_disarm_cancels() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);
        let timer = RearmableTimer::spawn("test", move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        timer.arm(Duration::from_millis(50));
        timer.disarm();
        thread::sleep(Duration::from_millis(120));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_arm_if_idle_keeps_deadline() {
        let fired_at = Arc::new(Mutex::new(None));
        let fired_clone = Arc::clone(&fired_at);
        let timer = RearmableTimer::spawn("test", move || {
            *fired_clone.lock() = Some(Instant::now());
        })
        .unwrap();

        let start = Instant::now();
        timer.arm_if_idle(Duration::from_millis(40));
        thread::sleep(Duration::from_millis(20));
        timer.arm_if_idle(Duration::from_millis(200));
        thread::sleep(Duration::from_millis(100));

        let fired = fired_at.lock().expect("timer should have fired");
        assert!(fired.duration_since(start) < Duration::from_millis(150));
    }

    #[test]
    fn test_stop_prevents_fire() {
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = Arc::clone(&fired);
        let timer = RearmableTimer::spawn("test", move || {
            fired_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        timer.arm(Duration::from_millis(30));
        timer.stop();
        thread::sleep(Duration::from_millis(80));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
