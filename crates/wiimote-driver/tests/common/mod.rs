//! Simulated remote for the driver integration tests.
//!
//! Answers the output reports written to a `MockTransport` the way a Wii
//! Remote does: status requests with a `0x20` report, memory reads with
//! 16-byte `0x21` chunks (error 7 where nothing is mapped) and writes with a
//! `0x22` ack.

use std::sync::{Arc, Mutex};
use wiimote_driver::DriverConfig;
use wiimote_hid_common::mock::MockTransport;

pub const ACCEL_BLOCK: [u8; 8] = [0x80, 0x80, 0x80, 0x00, 0x86, 0x86, 0x86, 0x00];

pub const CLASSIC_CALIBRATION: [u8; 12] = [
    0xFC, 0x04, 0x7E, 0xFC, 0x04, 0x7E, 0xF8, 0x08, 0x80, 0xF8, 0x08, 0x80,
];

#[derive(Debug, Default)]
pub struct RemoteState {
    pub flags: u8,
    pub battery: u8,
    pub accel: Option<Vec<u8>>,
    /// 224-byte block mapped at `0x04A40020`; also serves the 6-byte ID read
    /// at `0x04A400FA`.
    pub expansion: Option<Vec<u8>>,
    pub acks: bool,
    /// Read replies still to be swallowed.
    pub drop_replies: usize,
    pub reads: Vec<(u32, u16)>,
}

#[derive(Clone)]
pub struct SimulatedRemote {
    state: Arc<Mutex<RemoteState>>,
}

impl SimulatedRemote {
    /// A bare remote with nothing plugged in.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(RemoteState {
                battery: 0xC0,
                accel: Some(ACCEL_BLOCK.to_vec()),
                acks: true,
                ..RemoteState::default()
            })),
        }
    }

    pub fn with_expansion(block: Vec<u8>) -> Self {
        let remote = Self::new();
        remote.plug(Some(block));
        remote
    }

    pub fn plug(&self, block: Option<Vec<u8>>) {
        let mut state = self.lock();
        state.flags = if block.is_some() { 0x02 } else { 0x00 };
        state.expansion = block;
    }

    /// Sets the attachment flag without mapping a block.
    pub fn set_flags(&self, flags: u8) {
        self.lock().flags = flags;
    }

    /// Stops acknowledging memory writes.
    pub fn set_acks(&self, acks: bool) {
        self.lock().acks = acks;
    }

    /// Loses the replies to the next `count` memory reads.
    pub fn drop_next_replies(&self, count: usize) {
        self.lock().drop_replies = count;
    }

    pub fn reads(&self) -> Vec<(u32, u16)> {
        self.lock().reads.clone()
    }

    pub fn status_report(&self) -> Vec<u8> {
        let state = self.lock();
        vec![0x20, 0x00, 0x00, state.flags, 0x00, 0x00, state.battery]
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RemoteState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Installs the remote as the transport's responder.
    pub fn attach(&self, transport: &MockTransport) {
        let remote = self.clone();
        transport.set_responder(move |written| remote.respond(written));
    }

    fn respond(&self, written: &[u8]) -> Vec<Vec<u8>> {
        match written {
            [0x15, ..] => vec![self.status_report()],
            [0x16, ..] if self.lock().acks => vec![vec![0x22, 0x00, 0x00, 0x16, 0x00]],
            [0x17, space, a2, a1, a0, l1, l0, ..] => {
                let address = u32::from_be_bytes([space & 0x04, *a2, *a1, *a0]);
                let len = u16::from_be_bytes([*l1, *l0]);
                let dropped = {
                    let mut state = self.lock();
                    state.reads.push((address, len));
                    let dropped = state.drop_replies > 0;
                    state.drop_replies = state.drop_replies.saturating_sub(1);
                    dropped
                };
                if dropped {
                    return Vec::new();
                }
                self.read(address, len)
            }
            _ => Vec::new(),
        }
    }

    fn read(&self, address: u32, len: u16) -> Vec<Vec<u8>> {
        let state = self.lock();
        let region = match address {
            0x0000_0016 => state.accel.as_deref(),
            0x04A4_0020 => state.expansion.as_deref(),
            0x04A4_00FA => state
                .expansion
                .as_deref()
                .and_then(|block| block.get(218..224)),
            _ => None,
        };
        let data = region.and_then(|r| r.get(..usize::from(len)));
        let Some(data) = data else {
            return vec![read_reply(address, &[], 0x07)];
        };

        let mut replies = Vec::new();
        let mut at = address;
        for chunk in data.chunks(16) {
            replies.push(read_reply(at, chunk, 0));
            at = at.wrapping_add(16);
        }
        replies
    }
}

pub fn read_reply(address: u32, data: &[u8], error: u8) -> Vec<u8> {
    let size = u8::try_from(data.len().saturating_sub(1)).unwrap_or(0x0F);
    let [.., hi, lo] = address.to_be_bytes();
    let mut report = vec![0x21, 0x00, 0x00, (size << 4) | error, hi, lo];
    report.extend_from_slice(data);
    report.resize(22, 0);
    report
}

/// 224-byte classic block. `format_flag` non-zero marks the original
/// controller.
pub fn classic_block(id: u32, format_flag: u8) -> Vec<u8> {
    let mut block = vec![0u8; 224];
    for (dst, src) in block.iter_mut().zip(CLASSIC_CALIBRATION) {
        *dst = src;
    }
    if let Some(flag) = block.get_mut(218) {
        *flag = format_flag;
    }
    for (dst, src) in block.iter_mut().skip(220).zip(id.to_be_bytes()) {
        *dst = src;
    }
    block
}

pub fn fast_config() -> DriverConfig {
    DriverConfig {
        read_timeout_ms: 50,
        poll_interval_ms: 1,
        settle_delay_ms: 0,
        ..DriverConfig::default()
    }
}
