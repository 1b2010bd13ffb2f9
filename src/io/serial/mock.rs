// relaycard/src/io/serial/mock.rs
//
// In-memory links for tests.
// - ScriptedLink replays one canned byte stream per write.
// - SimulatedBoard answers like a relay card and keeps its own relay state.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use super::transport::SerialLink;
use crate::io::codec::{CommandCode, Frame, FRAME_LEN};

fn timed_out() -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, "read timed out")
}

// ============================================================================
// Scripted Link
// ============================================================================

pub struct ScriptedLink {
    replies: VecDeque<Vec<u8>>,
    rx: Arc<Mutex<VecDeque<u8>>>,
    written: Arc<Mutex<Vec<u8>>>,
    clears: Arc<AtomicUsize>,
    max_read: usize,
}

impl ScriptedLink {
    /// Each write queues the next reply for reading. An exhausted script
    /// leaves the line silent.
    pub fn new(replies: Vec<Vec<u8>>) -> Self {
        Self {
            replies: replies.into(),
            rx: Arc::new(Mutex::new(VecDeque::new())),
            written: Arc::new(Mutex::new(Vec::new())),
            clears: Arc::new(AtomicUsize::new(0)),
            max_read: usize::MAX,
        }
    }

    /// Deliver at most `n` bytes per read call.
    pub fn with_max_read(mut self, n: usize) -> Self {
        self.max_read = n.max(1);
        self
    }

    pub fn written(&self) -> Arc<Mutex<Vec<u8>>> {
        self.written.clone()
    }

    /// Bytes still waiting to be read.
    pub fn pending(&self) -> Arc<Mutex<VecDeque<u8>>> {
        self.rx.clone()
    }

    pub fn clears(&self) -> Arc<AtomicUsize> {
        self.clears.clone()
    }
}

impl Read for ScriptedLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut rx = self.rx.lock().unwrap();
        if rx.is_empty() {
            return Err(timed_out());
        }
        let n = buf.len().min(rx.len()).min(self.max_read);
        for slot in buf.iter_mut().take(n) {
            *slot = rx.pop_front().unwrap();
        }
        Ok(n)
    }
}

impl Write for ScriptedLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.lock().unwrap().extend_from_slice(buf);
        if let Some(reply) = self.replies.pop_front() {
            self.rx.lock().unwrap().extend(reply);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SerialLink for ScriptedLink {
    fn clear_buffers(&mut self) -> io::Result<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.rx.lock().unwrap().clear();
        Ok(())
    }
}

// ============================================================================
// Simulated Board
// ============================================================================

#[derive(Default)]
struct BoardState {
    relays: u8,
    requests: Vec<[u8; FRAME_LEN]>,
    silent_exchanges: usize,
    noise_chunks: usize,
    wrong_response: bool,
}

/// Shared view of a simulated board, kept by the test after the board
/// itself has been moved into a transport.
#[derive(Clone, Default)]
pub struct BoardHandle {
    inner: Arc<Mutex<BoardState>>,
}

impl BoardHandle {
    pub fn relays(&self) -> u8 {
        self.inner.lock().unwrap().relays
    }

    pub fn set_relays(&self, relays: u8) {
        self.inner.lock().unwrap().relays = relays;
    }

    pub fn requests(&self) -> Vec<[u8; FRAME_LEN]> {
        self.inner.lock().unwrap().requests.clone()
    }

    /// Commands received so far, as request codes.
    pub fn commands(&self) -> Vec<u8> {
        self.requests().iter().map(|r| r[0]).collect()
    }

    /// Ignore the next `n` requests entirely.
    pub fn go_silent(&self, n: usize) {
        self.inner.lock().unwrap().silent_exchanges = n;
    }

    /// Prefix every response with `n` chunks of line noise.
    pub fn add_noise(&self, n: usize) {
        self.inner.lock().unwrap().noise_chunks = n;
    }

    /// Answer with the response code of a different command.
    pub fn answer_wrong_command(&self, wrong: bool) {
        self.inner.lock().unwrap().wrong_response = wrong;
    }
}

pub struct SimulatedBoard {
    handle: BoardHandle,
    rx: VecDeque<u8>,
    tx: Vec<u8>,
}

impl SimulatedBoard {
    pub fn new() -> (Self, BoardHandle) {
        let handle = BoardHandle::default();
        (
            Self {
                handle: handle.clone(),
                rx: VecDeque::new(),
                tx: Vec::new(),
            },
            handle,
        )
    }

    fn respond(&mut self, request: [u8; FRAME_LEN]) {
        let mut state = self.handle.inner.lock().unwrap();
        state.requests.push(request);

        if state.silent_exchanges > 0 {
            state.silent_exchanges -= 1;
            return;
        }

        let data = request[2];
        match CommandCode::try_from(request[0]) {
            Ok(CommandCode::SetPort) => state.relays = data,
            Ok(CommandCode::SetSingle) => state.relays |= data,
            Ok(CommandCode::DelSingle) => state.relays &= !data,
            Ok(CommandCode::Toggle) => state.relays ^= data,
            _ => {}
        }

        for i in 0..state.noise_chunks {
            self.rx.extend([i as u8, 0x55, 0xAA, 0x00]);
        }

        let mut command = 255 - request[0];
        if state.wrong_response {
            command = command.wrapping_sub(1);
        }
        let frame = Frame::new(command, request[1], state.relays);
        self.rx.extend(frame.to_bytes());
    }
}

impl Read for SimulatedBoard {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.rx.is_empty() {
            return Err(timed_out());
        }
        let n = buf.len().min(self.rx.len());
        for slot in buf.iter_mut().take(n) {
            *slot = self.rx.pop_front().unwrap();
        }
        Ok(n)
    }
}

impl Write for SimulatedBoard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tx.extend_from_slice(buf);
        while self.tx.len() >= FRAME_LEN {
            let mut request = [0u8; FRAME_LEN];
            request.copy_from_slice(&self.tx[..FRAME_LEN]);
            self.tx.drain(..FRAME_LEN);
            self.respond(request);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SerialLink for SimulatedBoard {
    fn clear_buffers(&mut self) -> io::Result<()> {
        self.rx.clear();
        self.tx.clear();
        Ok(())
    }
}
