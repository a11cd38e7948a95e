//! Requests, responses, tickets and events exchanged with the device record.

use crate::expansion::ExpansionStep;
use crate::handshake::HandshakeStep;
use crate::peripheral::ExpansionKind;
use crate::report::{self, StatusReport};

/// Output exchange the caller must perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    ReadMemory { address: u32, len: u16 },
    WriteMemory { address: u32, data: Vec<u8> },
    RequestStatus,
    SetLeds(u8),
    SetReportMode { mode: u8 },
}

impl Request {
    /// Encodes the output report. `None` for a write larger than one chunk.
    pub fn encode(&self, rumble: bool, continuous: bool) -> Option<Vec<u8>> {
        match self {
            Self::ReadMemory { address, len } => {
                Some(report::encode_read_request(*address, *len, rumble))
            }
            Self::WriteMemory { address, data } => {
                report::encode_write_request(*address, data, rumble)
            }
            Self::RequestStatus => Some(report::encode_status_request(rumble)),
            Self::SetLeds(bits) => Some(report::encode_leds(*bits, rumble)),
            Self::SetReportMode { mode } => {
                Some(report::encode_report_type(*mode, continuous, rumble))
            }
        }
    }

    /// Input report ID answering this request, if any.
    pub fn response_id(&self) -> Option<u8> {
        match self {
            Self::ReadMemory { .. } => Some(report::report_ids::READ_REPLY),
            Self::WriteMemory { .. } => Some(report::report_ids::ACK),
            Self::RequestStatus => Some(report::report_ids::STATUS),
            Self::SetLeds(_) | Self::SetReportMode { .. } => None,
        }
    }
}

/// Completion of a request, as delivered back to the device record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Response<'a> {
    Status(StatusReport),
    /// Reassembled read data; may be shorter than requested.
    Data(&'a [u8]),
    /// Read rejected by the remote with a non-zero error code.
    Rejected { code: u8 },
    /// Write acknowledged; `code` is non-zero on error.
    Ack { code: u8 },
}

/// Which machine a completion belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Handshake(HandshakeStep),
    Expansion(ExpansionStep),
    /// Status requested outside the handshake.
    Status,
    /// Nothing waits on the completion.
    Detached,
}

/// Tag carried by every issued request.
///
/// A completion is only applied while the generation (and, for expansion
/// steps, the expansion epoch) still matches the device record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub generation: u32,
    pub epoch: u32,
    pub target: Target,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedRequest {
    pub ticket: Ticket,
    pub request: Request,
}

/// Notifications for the application.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WiimoteEvent {
    Connected,
    Disconnected,
    ExpansionInserted(ExpansionKind),
    ExpansionRemoved(ExpansionKind),
    Status(StatusReport),
}

/// Everything a device record operation asks of its caller.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Outbox {
    pub requests: Vec<IssuedRequest>,
    pub events: Vec<WiimoteEvent>,
    /// The report mode must be chosen again (expansion inserted or removed).
    pub rederive_report_mode: bool,
}

impl Outbox {
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty() && self.events.is_empty() && !self.rederive_report_mode
    }

    pub fn push(&mut self, ticket: Ticket, request: Request) {
        self.requests.push(IssuedRequest { ticket, request });
    }

    pub fn merge(&mut self, other: Outbox) {
        self.requests.extend(other.requests);
        self.events.extend(other.events);
        self.rederive_report_mode |= other.rederive_report_mode;
    }
}

/// Read-only view of the device readiness flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceFlags {
    pub connected: bool,
    pub handshake_in_progress: bool,
    pub handshake_complete: bool,
    pub expansion_present: bool,
    pub expansion_handshake_in_progress: bool,
    pub expansion_handshake_failed: bool,
    pub accelerometer_enabled: bool,
    pub ir_enabled: bool,
}

/// Features switched on by the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub accelerometer: bool,
    pub ir: bool,
}
