// relaycard/src/pipeline/display.rs
//
// Display side of the pipeline. Holds the authoritative "current state",
// replaces it wholesale whenever the switcher publishes a confirmation, and
// forwards each confirmation to the presentation layer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, RwLock};
use std::time::Duration;

use super::queue::ResultReceiver;
use crate::io::RelayFlags;
use crate::logging::Logger;

/// Callback invoked with every confirmed state.
pub type Subscriber = Box<dyn Fn(RelayFlags) + Send>;

/// Last confirmed state. Readers get a copy; only the display loop writes.
#[derive(Clone)]
pub struct StateCell {
    inner: Arc<RwLock<RelayFlags>>,
}

impl StateCell {
    pub fn new(initial: RelayFlags) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    pub fn snapshot(&self) -> RelayFlags {
        match self.inner.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub(crate) fn replace(&self, flags: RelayFlags) {
        match self.inner.write() {
            Ok(mut guard) => *guard = flags,
            Err(poisoned) => *poisoned.into_inner() = flags,
        }
    }
}

pub struct DisplayLoop {
    results: ResultReceiver,
    state: StateCell,
    subscribers: Vec<Subscriber>,
    interrupt: Arc<AtomicBool>,
    poll_interval: Duration,
    log: Logger,
}

impl DisplayLoop {
    pub fn new(
        results: ResultReceiver,
        state: StateCell,
        subscribers: Vec<Subscriber>,
        interrupt: Arc<AtomicBool>,
        poll_interval: Duration,
        log: Logger,
    ) -> Self {
        Self {
            results,
            state,
            subscribers,
            interrupt,
            poll_interval,
            log,
        }
    }

    pub fn run(self) {
        tlog!(self.log, "[display] Started");

        while !self.interrupt.load(Ordering::Relaxed) {
            match self.results.recv_timeout(self.poll_interval) {
                Ok(flags) => {
                    self.state.replace(flags);
                    for subscriber in &self.subscribers {
                        subscriber(flags);
                    }
                }
                Err(std_mpsc::RecvTimeoutError::Timeout) => {
                    tdebug!(self.log, "[display] No updates");
                }
                Err(std_mpsc::RecvTimeoutError::Disconnected) => {
                    tlog!(self.log, "[display] Result queue closed");
                    break;
                }
            }
        }

        tlog!(self.log, "[display] Finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::queue::result_queue;
    use std::sync::Mutex;

    #[test]
    fn test_forwards_confirmations_and_replaces_state() {
        let (tx, rx) = result_queue(4);
        let state = StateCell::new(RelayFlags::ALL_OFF);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_by_subscriber = seen.clone();
        let subscriber: Subscriber = Box::new(move |flags| {
            seen_by_subscriber.lock().unwrap().push(flags.to_byte());
        });
        let interrupt = Arc::new(AtomicBool::new(false));

        let display = DisplayLoop::new(
            rx,
            state.clone(),
            vec![subscriber],
            interrupt.clone(),
            Duration::from_millis(20),
            Logger::silent(),
        );
        let handle = std::thread::spawn(move || display.run());

        tx.send(RelayFlags::from_byte(0x05)).unwrap();
        tx.send(RelayFlags::from_byte(0x06)).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while seen.lock().unwrap().len() < 2 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }

        interrupt.store(true, Ordering::Relaxed);
        handle.join().unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![0x05, 0x06]);
        assert_eq!(state.snapshot().to_byte(), 0x06);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let state = StateCell::new(RelayFlags::ALL_OFF);
        let copy = state.snapshot().with(0, true).unwrap();
        assert_eq!(state.snapshot(), RelayFlags::ALL_OFF);
        assert_eq!(copy.to_byte(), 0x01);
    }
}
