// relaycard/src/pipeline/mod.rs
//
// Three-stage request pipeline:
//
//   front end --(RequestQueue)--> SwitcherLoop --(ResultQueue)--> DisplayLoop --> subscribers
//
// The switcher is the only code that touches the serial port. The front end
// computes new states from a copy of the last confirmed state and submits
// them; only the display loop replaces that state.

pub mod display;
pub mod queue;
pub mod switcher;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

pub use display::{DisplayLoop, StateCell, Subscriber};
pub use queue::{
    request_queue, result_queue, Backpressure, PendingRequest, RequestQueue, DEFAULT_QUEUE_CAPACITY,
    POLL_INTERVAL,
};
pub use switcher::SwitcherLoop;

use crate::actions::ButtonDefinition;
use crate::error::{RelayError, Result};
use crate::io::{RelayCardClient, RelayFlags};
use crate::logging::Logger;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    pub card_id: u8,
    pub queue_capacity: usize,
    pub backpressure: Backpressure,
    pub poll_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            card_id: 0,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            backpressure: Backpressure::Block,
            poll_interval: POLL_INTERVAL,
        }
    }
}

/// Running pipeline: the switcher and display threads plus the handles the
/// front end needs to feed them.
pub struct RelayPipeline {
    requests: RequestQueue,
    state: StateCell,
    interrupt: Arc<AtomicBool>,
    switcher: Option<JoinHandle<RelayCardClient>>,
    display: Option<JoinHandle<()>>,
    log: Logger,
}

impl RelayPipeline {
    /// Read the card's state, then start both workers. The initial state is
    /// delivered to subscribers like any other confirmation.
    pub fn start(
        mut client: RelayCardClient,
        config: PipelineConfig,
        subscribers: Vec<Subscriber>,
        log: Logger,
    ) -> Result<Self> {
        let initial = client.query_state(config.card_id)?;
        tlog!(log, "[pipeline] Initial state {}", initial);

        let (requests, request_rx) = request_queue(config.queue_capacity, config.backpressure);
        let (result_tx, result_rx) = result_queue(config.queue_capacity);
        result_tx.send(initial).map_err(|_| RelayError::QueueClosed)?;

        let state = StateCell::new(initial);
        let interrupt = Arc::new(AtomicBool::new(false));

        let display_loop = DisplayLoop::new(
            result_rx,
            state.clone(),
            subscribers,
            interrupt.clone(),
            config.poll_interval,
            log.clone(),
        );
        let display = std::thread::Builder::new()
            .name("relay-display".to_string())
            .spawn(move || display_loop.run())?;

        let switcher_loop = SwitcherLoop::new(
            client,
            config.card_id,
            request_rx,
            result_tx,
            interrupt.clone(),
            config.poll_interval,
            log.clone(),
        );
        let switcher = match std::thread::Builder::new()
            .name("relay-switcher".to_string())
            .spawn(move || switcher_loop.run())
        {
            Ok(handle) => handle,
            Err(e) => {
                interrupt.store(true, Ordering::Relaxed);
                let _ = display.join();
                return Err(e.into());
            }
        };

        Ok(Self {
            requests,
            state,
            interrupt,
            switcher: Some(switcher),
            display: Some(display),
            log,
        })
    }

    /// Last state confirmed by the card.
    pub fn current_state(&self) -> RelayFlags {
        self.state.snapshot()
    }

    pub fn state_cell(&self) -> StateCell {
        self.state.clone()
    }

    /// Producer handle usable from other threads.
    pub fn request_queue(&self) -> RequestQueue {
        self.requests.clone()
    }

    pub fn is_running(&self) -> bool {
        self.switcher.is_some()
    }

    pub fn submit(&self, request: PendingRequest) -> Result<()> {
        if !self.is_running() {
            return Err(RelayError::QueueClosed);
        }
        self.requests.submit(request)
    }

    pub fn set_all(&self, flags: RelayFlags) -> Result<()> {
        self.submit(PendingRequest::new(flags))
    }

    /// Flip one channel relative to the last confirmed state.
    pub fn toggle(&self, index: usize) -> Result<()> {
        let next = self.current_state().toggled(index)?;
        self.submit(PendingRequest::new(next))
    }

    /// Queue the requests for a button. Returns how many were queued.
    pub fn apply(&self, button: &ButtonDefinition) -> Result<usize> {
        let requests = button.requests(self.current_state())?;
        tlog!(
            self.log,
            "[pipeline] Button '{}' -> {} request(s)",
            button.label,
            requests.len()
        );
        for request in &requests {
            self.submit(*request)?;
        }
        Ok(requests.len())
    }

    /// Stop both workers. The port is closed only after the switcher has
    /// exited.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(switcher) = self.switcher.take() else {
            return;
        };
        self.interrupt.store(true, Ordering::Relaxed);

        match switcher.join() {
            Ok(mut client) => client.shutdown(),
            Err(_) => tlog!(self.log, "[pipeline] Switcher thread panicked"),
        }

        if let Some(display) = self.display.take() {
            if display.join().is_err() {
                tlog!(self.log, "[pipeline] Display thread panicked");
            }
        }

        tlog!(self.log, "[pipeline] Stopped");
    }
}

impl Drop for RelayPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ButtonAction, ButtonDefinition};
    use crate::io::serial::mock::{BoardHandle, SimulatedBoard};
    use crate::io::{SerialTransport, TransportOptions};
    use std::sync::mpsc as std_mpsc;

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            poll_interval: Duration::from_millis(20),
            ..PipelineConfig::default()
        }
    }

    fn client_with_board() -> (RelayCardClient, BoardHandle) {
        let (board, handle) = SimulatedBoard::new();
        let transport = SerialTransport::new(
            TransportOptions {
                pace: Duration::ZERO,
                ..TransportOptions::default()
            },
            Logger::silent(),
        );
        let mut client = RelayCardClient::new(transport, Logger::silent());
        client.attach(Box::new(board)).unwrap();
        (client, handle)
    }

    fn channel_subscriber() -> (Subscriber, std_mpsc::Receiver<RelayFlags>) {
        let (tx, rx) = std_mpsc::channel();
        let tx = std::sync::Mutex::new(tx);
        let subscriber: Subscriber = Box::new(move |flags| {
            let _ = tx.lock().unwrap().send(flags);
        });
        (subscriber, rx)
    }

    fn next(rx: &std_mpsc::Receiver<RelayFlags>) -> u8 {
        rx.recv_timeout(Duration::from_secs(2)).unwrap().to_byte()
    }

    #[test]
    fn test_initial_state_is_published() {
        let (client, board) = client_with_board();
        board.set_relays(0x21);
        let (subscriber, rx) = channel_subscriber();

        let pipeline =
            RelayPipeline::start(client, test_config(), vec![subscriber], Logger::silent()).unwrap();
        assert_eq!(pipeline.current_state().to_byte(), 0x21);
        assert_eq!(next(&rx), 0x21);
        pipeline.stop();
    }

    #[test]
    fn test_start_fails_when_card_does_not_answer() {
        let (client, board) = client_with_board();
        board.go_silent(1);
        let result = RelayPipeline::start(client, test_config(), vec![], Logger::silent());
        assert!(matches!(result, Err(RelayError::TruncatedResponse { .. })));
    }

    #[test]
    fn test_confirmations_in_submission_order() {
        let (client, board) = client_with_board();
        let (subscriber, rx) = channel_subscriber();
        let pipeline =
            RelayPipeline::start(client, test_config(), vec![subscriber], Logger::silent()).unwrap();
        assert_eq!(next(&rx), 0x00);

        for b in [0x01u8, 0x02, 0x04, 0x08] {
            pipeline.set_all(RelayFlags::from_byte(b)).unwrap();
        }
        let confirmed: Vec<u8> = (0..4).map(|_| next(&rx)).collect();
        assert_eq!(confirmed, vec![0x01, 0x02, 0x04, 0x08]);
        assert_eq!(pipeline.current_state().to_byte(), 0x08);

        pipeline.stop();
        assert_eq!(board.commands(), vec![0x02, 0x03, 0x03, 0x03, 0x03]);
    }

    #[test]
    fn test_pulse_button_lands_as_two_commands() {
        let (client, board) = client_with_board();
        board.set_relays(0b0000_0001);
        let (subscriber, rx) = channel_subscriber();
        let pipeline =
            RelayPipeline::start(client, test_config(), vec![subscriber], Logger::silent()).unwrap();
        assert_eq!(next(&rx), 0b0000_0001);

        let pulse = ButtonDefinition::new(ButtonAction::Pulse, "Pulse 6,7,8", vec![6, 7, 8])
            .with_duration(50);
        assert_eq!(pipeline.apply(&pulse).unwrap(), 2);

        assert_eq!(next(&rx), 0b1110_0001);
        assert_eq!(next(&rx), 0b0000_0001);
        pipeline.stop();

        let requests = board.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1][2], 0b1110_0001);
        assert_eq!(requests[2][2], 0b0000_0001);
    }

    #[test]
    fn test_toggle_uses_confirmed_state() {
        let (client, board) = client_with_board();
        let (subscriber, rx) = channel_subscriber();
        let pipeline =
            RelayPipeline::start(client, test_config(), vec![subscriber], Logger::silent()).unwrap();
        assert_eq!(next(&rx), 0x00);

        pipeline.toggle(2).unwrap();
        assert_eq!(next(&rx), 0b0000_0100);
        pipeline.toggle(2).unwrap();
        assert_eq!(next(&rx), 0b0000_0000);
        assert!(matches!(pipeline.toggle(8), Err(RelayError::Range(_))));

        pipeline.stop();
        assert_eq!(board.relays(), 0);
    }

    #[test]
    fn test_mismatched_response_is_dropped() {
        let (client, board) = client_with_board();
        let (subscriber, rx) = channel_subscriber();
        let pipeline =
            RelayPipeline::start(client, test_config(), vec![subscriber], Logger::silent()).unwrap();
        assert_eq!(next(&rx), 0x00);

        // the card answers with a different command code, so the request is dropped
        board.answer_wrong_command(true);
        pipeline.set_all(RelayFlags::ALL_ON).unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        assert_eq!(pipeline.current_state(), RelayFlags::ALL_OFF);

        board.answer_wrong_command(false);
        pipeline.set_all(RelayFlags::from_byte(0x0F)).unwrap();
        assert_eq!(next(&rx), 0x0F);
        pipeline.stop();
    }

    #[test]
    fn test_stop_during_settle_delay_returns_promptly() {
        let (client, board) = client_with_board();
        let (subscriber, rx) = channel_subscriber();
        let pipeline =
            RelayPipeline::start(client, test_config(), vec![subscriber], Logger::silent()).unwrap();
        assert_eq!(next(&rx), 0x00);

        pipeline
            .submit(PendingRequest::with_delay_ms(RelayFlags::ALL_ON, 3000))
            .unwrap();
        assert_eq!(next(&rx), 0xFF);
        std::thread::sleep(Duration::from_millis(100));

        let stop_at = std::time::Instant::now();
        pipeline.stop();
        assert!(stop_at.elapsed() < Duration::from_secs(1));
        assert_eq!(board.relays(), 0xFF);
    }

    #[test]
    fn test_stop_closes_port_after_switcher_exits() {
        let (client, _board) = client_with_board();
        let pipeline =
            RelayPipeline::start(client, test_config(), vec![], Logger::silent()).unwrap();
        let queue = pipeline.request_queue();
        pipeline.stop();
        // switcher is gone, so its receiver is dropped
        assert!(matches!(
            queue.submit(PendingRequest::new(RelayFlags::ALL_ON)),
            Err(RelayError::QueueClosed)
        ));
    }
}
