//! Callback-driven session.
//!
//! A [`Session`] owns the transport and a [`DeviceRecord`]. Each output
//! exchange is written immediately and remembered with its ticket; the
//! matching input report, when [`Session::poll`] picks it up, completes the
//! exchange and drives the next handshake step. Nothing blocks except
//! [`Session::handshake_blocking`].
//!
//! An exchange whose reply does not arrive within `read_timeout_ms` is sent
//! again on the next [`Session::poll`]; after `max_read_attempts` sends it is
//! abandoned on the device record. A write the transport refuses counts as
//! one of those attempts.

use crate::blocking::blocking_handshake;
use crate::config::DriverConfig;
use crate::error::{DriverError, DriverResult};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};
use wiimote_hid_common::{MAX_REPORT_LEN, ReportTransport, TransportError};
use wiimote_hid_protocol::{
    Ack, Capabilities, DeviceRecord, InputReport, Outbox, PeripheralRegistry, ReadAssembler,
    ReadProgress, ReadReply, Request, Response, Ticket, WiimoteEvent, classify, report_ids,
};

/// Request written to the remote and not answered yet.
#[derive(Debug)]
struct PendingExchange {
    ticket: Ticket,
    request: Request,
    sent_at: Instant,
    attempts: u32,
}

/// Read awaiting its `0x21` chunks.
#[derive(Debug)]
struct PendingRead {
    exchange: PendingExchange,
    assembler: ReadAssembler,
}

fn is_disconnect(e: &DriverError) -> bool {
    matches!(e, DriverError::Transport(TransportError::Disconnected))
}

/// Moves the exchanges sent at or before `cutoff` out of `queue`.
fn take_expired(queue: &mut VecDeque<PendingExchange>, cutoff: Instant) -> Vec<PendingExchange> {
    let (expired, kept): (Vec<_>, Vec<_>) = queue.drain(..).partition(|e| e.sent_at <= cutoff);
    queue.extend(kept);
    expired
}

pub struct Session<T: ReportTransport> {
    transport: T,
    device: DeviceRecord,
    config: DriverConfig,
    pending_reads: VecDeque<PendingRead>,
    pending_writes: VecDeque<PendingExchange>,
    pending_status: VecDeque<PendingExchange>,
    events: VecDeque<WiimoteEvent>,
    rumble: bool,
}

impl<T: ReportTransport> Session<T> {
    pub fn new(transport: T, config: DriverConfig) -> Self {
        Self::with_registry(transport, config, Arc::new(PeripheralRegistry::standard()))
    }

    /// Uses `registry` to pick expansion parsers.
    pub fn with_registry(
        transport: T,
        config: DriverConfig,
        registry: Arc<PeripheralRegistry>,
    ) -> Self {
        Self {
            transport,
            device: DeviceRecord::new(registry),
            config,
            pending_reads: VecDeque::new(),
            pending_writes: VecDeque::new(),
            pending_status: VecDeque::new(),
            events: VecDeque::new(),
            rumble: false,
        }
    }

    pub fn device(&self) -> &DeviceRecord {
        &self.device
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Number of exchanges still waiting for their input report.
    pub fn pending(&self) -> usize {
        self.pending_reads.len() + self.pending_writes.len() + self.pending_status.len()
    }

    /// Starts the callback-driven handshake.
    pub fn connect(&mut self) -> DriverResult<()> {
        if !self.transport.is_connected() {
            return Err(DriverError::NotConnected);
        }
        let out = self.device.connect();
        self.dispatch(out)
    }

    /// Runs the handshake to completion on the calling thread.
    ///
    /// Exchanges started by [`connect`](Self::connect) are abandoned.
    pub fn handshake_blocking(&mut self) -> DriverResult<()> {
        self.clear_pending();
        let result = blocking_handshake(&mut self.transport, &mut self.device, &self.config);
        match result {
            Ok(events) => {
                self.events.extend(events);
                Ok(())
            }
            Err(DriverError::Transport(TransportError::Disconnected)) => {
                self.handle_disconnect();
                Err(DriverError::Transport(TransportError::Disconnected))
            }
            Err(e) => Err(e),
        }
    }

    pub fn rehandshake(&mut self) -> DriverResult<()> {
        self.clear_pending();
        let out = self.device.rehandshake();
        self.dispatch(out)
    }

    /// Tears the session down. Late reports for the old connection are
    /// ignored.
    pub fn disconnect(&mut self) {
        self.handle_disconnect();
    }

    pub fn set_capabilities(&mut self, capabilities: Capabilities) -> DriverResult<()> {
        let out = self.device.set_capabilities(capabilities);
        self.dispatch(out)
    }

    /// Rumble rides along on every later output report.
    pub fn set_rumble(&mut self, on: bool) {
        self.rumble = on;
    }

    pub fn next_event(&mut self) -> Option<WiimoteEvent> {
        self.events.pop_front()
    }

    pub fn drain_events(&mut self) -> Vec<WiimoteEvent> {
        self.events.drain(..).collect()
    }

    /// Handles every report the transport has queued, then resends the
    /// exchanges that have waited longer than the read timeout. Returns how
    /// many reports were read.
    ///
    /// A lost transport disconnects the device before the error is returned.
    pub fn poll(&mut self) -> DriverResult<usize> {
        let handled = self.drain_transport()?;
        self.retry_expired(Instant::now())?;
        Ok(handled)
    }

    fn drain_transport(&mut self) -> DriverResult<usize> {
        let mut buf = [0u8; MAX_REPORT_LEN];
        let mut handled = 0;
        loop {
            let len = match self.transport.read_report(&mut buf) {
                Ok(0) => return Ok(handled),
                Ok(len) => len,
                Err(TransportError::Disconnected) => {
                    self.handle_disconnect();
                    return Err(TransportError::Disconnected.into());
                }
                Err(e) => return Err(e.into()),
            };
            handled += 1;
            if let Some(report) = buf.get(..len) {
                self.handle_report(report)?;
            }
        }
    }

    /// Routes one input report, report ID first.
    pub fn handle_report(&mut self, report: &[u8]) -> DriverResult<()> {
        match classify(report) {
            Some(InputReport::Status(status)) => {
                let out = match self.pending_status.pop_front() {
                    Some(pending) => self.device.complete(pending.ticket, Response::Status(status)),
                    None => self.device.handle_status(status),
                };
                self.dispatch(out)
            }
            Some(InputReport::ReadReply(reply)) => self.handle_read_reply(&reply),
            Some(InputReport::Ack(ack)) => self.handle_ack(ack),
            Some(InputReport::Data { .. }) => {
                self.device.handle_input(report);
                Ok(())
            }
            Some(InputReport::Unknown(id)) => {
                debug!("unhandled report {:#04x}", id);
                Ok(())
            }
            None => {
                trace!("malformed report {:02X?}", report);
                Ok(())
            }
        }
    }

    /// Feeds a `0x21` chunk to the outstanding read expecting its offset.
    fn handle_read_reply(&mut self, reply: &ReadReply<'_>) -> DriverResult<()> {
        let Some(index) = self
            .pending_reads
            .iter()
            .position(|pending| pending.assembler.accepts(reply))
        else {
            debug!(offset = reply.offset, "read reply matches no outstanding read");
            return Ok(());
        };
        let Some(pending) = self.pending_reads.get_mut(index) else {
            return Ok(());
        };
        let ticket = pending.exchange.ticket;
        let out = match pending.assembler.push(reply) {
            ReadProgress::Pending => {
                // each chunk restarts the wait
                pending.exchange.sent_at = Instant::now();
                return Ok(());
            }
            ReadProgress::Complete(data) => {
                self.pending_reads.remove(index);
                self.device.complete(ticket, Response::Data(&data))
            }
            ReadProgress::Failed { code } => {
                debug!(
                    "read of {:#010x} failed with code {}",
                    pending.assembler.address(),
                    code
                );
                self.pending_reads.remove(index);
                self.device.complete(ticket, Response::Rejected { code })
            }
        };
        self.dispatch(out)
    }

    fn handle_ack(&mut self, ack: Ack) -> DriverResult<()> {
        if ack.report_id != report_ids::WRITE_MEMORY {
            trace!(report = ack.report_id, error = ack.error, "ack");
            return Ok(());
        }
        // acks carry no address; writes are answered in order
        let Some(pending) = self.pending_writes.pop_front() else {
            debug!("write ack with no write outstanding");
            return Ok(());
        };
        let out = self
            .device
            .complete(pending.ticket, Response::Ack { code: ack.error });
        self.dispatch(out)
    }

    /// Sends the requests of `out` and publishes its events.
    ///
    /// Every request is attempted even when an earlier one fails; the first
    /// error is returned afterwards.
    fn dispatch(&mut self, out: Outbox) -> DriverResult<()> {
        let connected = out.events.contains(&WiimoteEvent::Connected);
        self.events.extend(out.events);

        let mut first_error = None;
        for issued in out.requests {
            if let Err(e) = self.issue(issued.ticket, issued.request, 1) {
                if is_disconnect(&e) {
                    return Err(e);
                }
                first_error.get_or_insert(e);
            }
        }

        if out.rederive_report_mode || connected {
            let request = self.device.report_mode_request();
            if let Err(e) = self.send(&request) {
                if is_disconnect(&e) {
                    return Err(e);
                }
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Writes `request` as send number `attempt` and tracks it until its
    /// reply arrives.
    ///
    /// A refused write is tried again while attempts remain. Once they run
    /// out the exchange is abandoned on the device record and the first
    /// write error is returned.
    fn issue(&mut self, ticket: Ticket, request: Request, attempt: u32) -> DriverResult<()> {
        let mut first_error = None;
        for attempt in attempt..=self.config.max_read_attempts {
            match self.send(&request) {
                Ok(()) => {
                    self.track(ticket, request, attempt);
                    return Ok(());
                }
                Err(e) if is_disconnect(&e) => return Err(e),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        warn!(?request, "giving up on exchange");
        let out = self.device.abandon(ticket);
        let result = self.dispatch(out);
        match first_error {
            Some(e) if !result.as_ref().is_err_and(is_disconnect) => Err(e),
            _ => result,
        }
    }

    fn track(&mut self, ticket: Ticket, request: Request, attempts: u32) {
        let exchange = PendingExchange {
            ticket,
            request,
            sent_at: Instant::now(),
            attempts,
        };
        match exchange.request {
            Request::ReadMemory { address, len } => self.pending_reads.push_back(PendingRead {
                assembler: ReadAssembler::new(address, len),
                exchange,
            }),
            Request::WriteMemory { .. } => self.pending_writes.push_back(exchange),
            Request::RequestStatus => self.pending_status.push_back(exchange),
            Request::SetLeds(_) | Request::SetReportMode { .. } => {}
        }
    }

    /// Sends again every exchange written before `now - read_timeout`.
    fn retry_expired(&mut self, now: Instant) -> DriverResult<()> {
        let Some(cutoff) = self
            .config
            .read_timeout()
            .and_then(|limit| now.checked_sub(limit))
        else {
            return Ok(());
        };

        let (expired_reads, kept): (Vec<_>, Vec<_>) = self
            .pending_reads
            .drain(..)
            .partition(|read| read.exchange.sent_at <= cutoff);
        self.pending_reads.extend(kept);

        let mut expired: Vec<PendingExchange> =
            expired_reads.into_iter().map(|read| read.exchange).collect();
        expired.extend(take_expired(&mut self.pending_writes, cutoff));
        expired.extend(take_expired(&mut self.pending_status, cutoff));

        let mut first_error = None;
        for exchange in expired {
            if !self.device.is_current(&exchange.ticket) {
                debug!(request = ?exchange.request, "dropping unanswered stale exchange");
                continue;
            }
            debug!(
                request = ?exchange.request,
                attempts = exchange.attempts,
                "exchange unanswered, sending again"
            );
            let next = exchange.attempts.saturating_add(1);
            if let Err(e) = self.issue(exchange.ticket, exchange.request, next) {
                if is_disconnect(&e) {
                    return Err(e);
                }
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn send(&mut self, request: &Request) -> DriverResult<()> {
        let report = request
            .encode(self.rumble, self.config.continuous_reporting)
            .ok_or_else(|| DriverError::InvalidRequest(format!("{request:?}")))?;
        match self.transport.write_report(&report) {
            Ok(_) => Ok(()),
            Err(TransportError::Disconnected) => {
                self.handle_disconnect();
                Err(TransportError::Disconnected.into())
            }
            Err(e) => {
                warn!("write of {:02X?} failed: {}", report, e);
                Err(e.into())
            }
        }
    }

    fn clear_pending(&mut self) {
        self.pending_reads.clear();
        self.pending_writes.clear();
        self.pending_status.clear();
    }

    fn handle_disconnect(&mut self) {
        self.clear_pending();
        let out = self.device.disconnect();
        self.events.extend(out.events);
    }
}
