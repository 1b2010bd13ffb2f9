// relaycard/src/pipeline/switcher.rs
//
// The switcher owns the relay card client (and with it the serial port).
// It takes one request at a time, sends it, publishes the state the card
// confirms, and waits out the request's settle delay before taking the next.
// The settle wait is cut short by the interrupt flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::time::{Duration, Instant};

use super::queue::{PendingRequest, RequestReceiver, ResultSender};
use crate::io::{RelayCardClient, RelayFlags};
use crate::logging::Logger;

/// Retry interval while the result queue is full.
const RESULT_RETRY: Duration = Duration::from_millis(10);

pub struct SwitcherLoop {
    client: RelayCardClient,
    card_id: u8,
    requests: RequestReceiver,
    results: ResultSender,
    interrupt: Arc<AtomicBool>,
    poll_interval: Duration,
    log: Logger,
}

impl SwitcherLoop {
    pub fn new(
        client: RelayCardClient,
        card_id: u8,
        requests: RequestReceiver,
        results: ResultSender,
        interrupt: Arc<AtomicBool>,
        poll_interval: Duration,
        log: Logger,
    ) -> Self {
        Self {
            client,
            card_id,
            requests,
            results,
            interrupt,
            poll_interval,
            log,
        }
    }

    /// Run until the interrupt flag is seen (or every producer is gone).
    /// Hands the client back so the caller can close the port afterwards.
    pub fn run(mut self) -> RelayCardClient {
        tlog!(self.log, "[switcher] Started for card {}", self.card_id);

        while !self.interrupt.load(Ordering::Relaxed) {
            match self.requests.recv_timeout(self.poll_interval) {
                Ok(request) => self.handle(request),
                Err(std_mpsc::RecvTimeoutError::Timeout) => {
                    tdebug!(self.log, "[switcher] No updates");
                }
                Err(std_mpsc::RecvTimeoutError::Disconnected) => {
                    tlog!(self.log, "[switcher] Request queue closed");
                    break;
                }
            }
        }

        tlog!(self.log, "[switcher] Finished");
        self.client
    }

    fn handle(&mut self, request: PendingRequest) {
        tlog!(self.log, "[switcher] Requested state {}", request.target);

        let confirmed = match self.client.set_all_relays(self.card_id, request.target) {
            Ok(confirmed) => confirmed,
            Err(e) => {
                tlog!(self.log, "[switcher] Request dropped: {}", e);
                return;
            }
        };

        if confirmed != request.target {
            tlog!(
                self.log,
                "[switcher] Card confirmed {} instead of requested {}",
                confirmed,
                request.target
            );
        }

        self.publish(confirmed);

        if !request.settle_delay.is_zero() {
            tdebug!(
                self.log,
                "[switcher] Settling for {} ms",
                request.settle_delay.as_millis()
            );
            self.settle(request.settle_delay);
        }
    }

    /// Sleep for `delay` in slices of at most one poll interval, returning
    /// early once the interrupt flag is set.
    fn settle(&self, delay: Duration) {
        let deadline = Instant::now() + delay;
        while !self.interrupt.load(Ordering::Relaxed) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return;
            }
            std::thread::sleep(remaining.min(self.poll_interval));
        }
        tlog!(self.log, "[switcher] Interrupted while settling");
    }

    /// Push onto the result queue, giving up only if interrupted or the
    /// display side has gone away.
    fn publish(&self, confirmed: RelayFlags) {
        let mut pending = confirmed;
        loop {
            match self.results.try_send(pending) {
                Ok(()) => return,
                Err(std_mpsc::TrySendError::Full(flags)) => {
                    if self.interrupt.load(Ordering::Relaxed) {
                        tlog!(self.log, "[switcher] Interrupted, dropping confirmation {}", flags);
                        return;
                    }
                    pending = flags;
                    std::thread::sleep(RESULT_RETRY);
                }
                Err(std_mpsc::TrySendError::Disconnected(_)) => {
                    tlog!(self.log, "[switcher] Result queue closed, confirmation dropped");
                    return;
                }
            }
        }
    }
}
