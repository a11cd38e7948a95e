//! Blocking handshake.
//!
//! Runs the whole connection sequence on the calling thread:
//! reset, accelerometer calibration, status until the remote reports
//! non-zero flags, then any expansion handshake the status triggers.

use crate::config::DriverConfig;
use crate::error::{DriverError, DriverResult};
use crate::wait::{read_memory_sync, wait_for_report, write_memory_sync};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info, warn};
use wiimote_calibration::AccelCalibration;
use wiimote_hid_common::{MAX_REPORT_LEN, ReportTransport};
use wiimote_hid_protocol::bits::decode_accel_calibration;
use wiimote_hid_protocol::report::{encode_report_type, encode_status_request};
use wiimote_hid_protocol::{
    DeviceRecord, IssuedRequest, Outbox, Request, Response, StatusReport, WiimoteEvent, memory,
    report_ids,
};

/// Connects `device` over `transport` without callbacks and returns the
/// events produced along the way.
pub fn blocking_handshake<T: ReportTransport + ?Sized>(
    transport: &mut T,
    device: &mut DeviceRecord,
    config: &DriverConfig,
) -> DriverResult<Vec<WiimoteEvent>> {
    if !transport.is_connected() {
        return Err(DriverError::NotConnected);
    }
    device.attach();
    if device.flags().handshake_complete {
        debug!("blocking handshake on a ready device skipped");
        return Ok(Vec::new());
    }

    let calibration = match reset_and_calibrate(transport, config) {
        Ok(calibration) => calibration,
        Err(e) => {
            device.cancel_handshake();
            return Err(e);
        }
    };

    let mut events = device.finish_handshake(Some(calibration)).events;

    if let Some(status) = query_status(transport, config)? {
        let out = device.handle_status(status);
        run_outbox(transport, device, config, out, &mut events)?;
    }

    send(transport, &device.report_mode_request(), config)?;
    info!(
        expansion = ?device.expansion_kind(),
        "blocking handshake complete"
    );
    Ok(events)
}

fn reset_and_calibrate<T: ReportTransport + ?Sized>(
    transport: &mut T,
    config: &DriverConfig,
) -> DriverResult<AccelCalibration> {
    reset(transport, config)?;

    let data = read_memory_sync(
        transport,
        memory::ACCEL_CALIBRATION,
        memory::ACCEL_CALIBRATION_LEN,
        config,
    )?;
    decode_accel_calibration(&data).ok_or(DriverError::ShortRead {
        address: memory::ACCEL_CALIBRATION,
        expected: usize::from(memory::ACCEL_CALIBRATION_LEN),
        actual: data.len(),
    })
}

/// Puts the remote in plain button reporting and switches off a MotionPlus
/// left active by a previous host.
fn reset<T: ReportTransport + ?Sized>(transport: &mut T, config: &DriverConfig) -> DriverResult<()> {
    transport.write_report(&encode_report_type(report_ids::BUTTONS, false, false))?;
    std::thread::sleep(config.settle_delay());

    match write_memory_sync(
        transport,
        memory::EXP_DISABLE_ENCRYPTION_1,
        &[memory::EXP_DISABLE_ENCRYPTION_1_VALUE],
        config,
    ) {
        Ok(0) => Ok(()),
        Ok(code) => {
            debug!(code, "reset write rejected");
            Ok(())
        }
        Err(DriverError::Timeout { .. }) => {
            warn!("reset write was not acknowledged");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Requests status until the flags byte is non-zero or the attempts run out.
fn query_status<T: ReportTransport + ?Sized>(
    transport: &mut T,
    config: &DriverConfig,
) -> DriverResult<Option<StatusReport>> {
    let mut latest = None;
    for attempt in 1..=config.status_attempts {
        match request_status(transport, config) {
            Ok(status) => {
                latest = Some(status);
                if status.flags != 0 {
                    break;
                }
                debug!(attempt, "status flags still zero");
            }
            Err(DriverError::Timeout { .. }) => warn!(attempt, "status request timed out"),
            Err(e) => return Err(e),
        }
    }
    Ok(latest)
}

fn request_status<T: ReportTransport + ?Sized>(
    transport: &mut T,
    config: &DriverConfig,
) -> DriverResult<StatusReport> {
    transport.write_report(&encode_status_request(false))?;
    let mut buf = [0u8; MAX_REPORT_LEN];
    loop {
        let len = wait_for_report(
            transport,
            report_ids::STATUS,
            config.read_timeout(),
            config.poll_interval(),
            &mut buf,
        )?;
        if let Some(status) = buf.get(..len).and_then(StatusReport::parse) {
            return Ok(status);
        }
    }
}

fn send<T: ReportTransport + ?Sized>(
    transport: &mut T,
    request: &Request,
    config: &DriverConfig,
) -> DriverResult<()> {
    let report = request
        .encode(false, config.continuous_reporting)
        .ok_or_else(|| DriverError::InvalidRequest(format!("{request:?}")))?;
    transport.write_report(&report)?;
    Ok(())
}

/// The remote stopped answering an exchange; the device record decides what
/// that means for its handshake.
fn went_unanswered(e: &DriverError) -> bool {
    matches!(
        e,
        DriverError::Timeout { .. }
            | DriverError::RetriesExhausted { .. }
            | DriverError::ShortRead { .. }
    )
}

/// Performs every request in `out`, and those its completions produce, in
/// order.
///
/// Reads of one address are bounded by `max_read_attempts`, which bounds
/// the classic controller's blank-block retries. An exchange that goes
/// unanswered is abandoned on the device record instead of failing the
/// handshake; only transport errors are returned.
fn run_outbox<T: ReportTransport + ?Sized>(
    transport: &mut T,
    device: &mut DeviceRecord,
    config: &DriverConfig,
    out: Outbox,
    events: &mut Vec<WiimoteEvent>,
) -> DriverResult<()> {
    let mut queue: VecDeque<IssuedRequest> = out.requests.into();
    let mut reads: HashMap<u32, u32> = HashMap::new();
    events.extend(out.events);

    while let Some(IssuedRequest { ticket, request }) = queue.pop_front() {
        let next = match &request {
            Request::ReadMemory { address, len } => {
                let attempts = reads.entry(*address).or_insert(0);
                *attempts = attempts.saturating_add(1);
                if *attempts > config.max_read_attempts {
                    warn!(
                        "giving up on {:#010x} after {} reads",
                        address, config.max_read_attempts
                    );
                    device.abandon(ticket)
                } else {
                    match read_memory_sync(transport, *address, *len, config) {
                        Ok(data) => device.complete(ticket, Response::Data(&data)),
                        Err(DriverError::ReadFailed { code, .. }) => {
                            device.complete(ticket, Response::Rejected { code })
                        }
                        Err(e) if went_unanswered(&e) => {
                            warn!("read of {:#010x} abandoned: {}", address, e);
                            device.abandon(ticket)
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
            Request::WriteMemory { address, data } => {
                match write_memory_sync(transport, *address, data, config) {
                    Ok(code) => device.complete(ticket, Response::Ack { code }),
                    Err(e) if went_unanswered(&e) => {
                        warn!("write to {:#010x} abandoned: {}", address, e);
                        device.abandon(ticket)
                    }
                    Err(e) => return Err(e),
                }
            }
            Request::RequestStatus => match request_status(transport, config) {
                Ok(status) => device.complete(ticket, Response::Status(status)),
                Err(e) if went_unanswered(&e) => device.abandon(ticket),
                Err(e) => return Err(e),
            },
            Request::SetLeds(_) | Request::SetReportMode { .. } => {
                send(transport, &request, config)?;
                Outbox::default()
            }
        };
        queue.extend(next.requests);
        events.extend(next.events);
    }
    Ok(())
}
