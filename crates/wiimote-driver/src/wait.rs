//! Blocking report waits and memory access.
//!
//! These poll the transport on the calling thread. Reports that are not the
//! one being waited for are dropped; the plain buttons report `0x30` streams
//! constantly and is dropped without logging.

use crate::config::DriverConfig;
use crate::error::{DriverError, DriverResult};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};
use wiimote_hid_common::{MAX_REPORT_LEN, ReportTransport};
use wiimote_hid_protocol::report::{
    Ack, ReadAssembler, ReadProgress, ReadReply, encode_read_request, encode_write_request,
    report_ids,
};

/// Polls until a report with `expected_id` arrives and returns its length;
/// the report is left in `buf`.
///
/// The deadline runs from entry. `timeout = None` waits forever.
pub fn wait_for_report<T: ReportTransport + ?Sized>(
    transport: &mut T,
    expected_id: u8,
    timeout: Option<Duration>,
    poll_interval: Duration,
    buf: &mut [u8; MAX_REPORT_LEN],
) -> DriverResult<usize> {
    let started = Instant::now();
    loop {
        let len = transport.read_report(buf)?;
        match buf.first().copied() {
            Some(id) if len > 0 && id == expected_id => return Ok(len),
            Some(report_ids::BUTTONS) if len > 0 => {}
            Some(id) if len > 0 => {
                debug!(
                    "discarding report {:#04x} while waiting for {:#04x}",
                    id, expected_id
                );
            }
            _ => {}
        }

        if let Some(limit) = timeout {
            let elapsed = started.elapsed();
            if elapsed >= limit {
                return Err(DriverError::Timeout {
                    report_id: expected_id,
                    timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                });
            }
        }
        if len == 0 {
            std::thread::sleep(poll_interval);
        }
    }
}

/// Reads `len` bytes at `address`, restarting the whole command when any
/// chunk times out.
pub fn read_memory_sync<T: ReportTransport + ?Sized>(
    transport: &mut T,
    address: u32,
    len: u16,
    config: &DriverConfig,
) -> DriverResult<Vec<u8>> {
    let mut buf = [0u8; MAX_REPORT_LEN];
    let request = encode_read_request(address, len, false);

    for attempt in 1..=config.max_read_attempts {
        trace!(address = format_args!("{address:#010x}"), len, attempt, "sync read");
        transport.write_report(&request)?;
        let mut assembler = ReadAssembler::new(address, len);

        loop {
            let received = match wait_for_report(
                transport,
                report_ids::READ_REPLY,
                config.read_timeout(),
                config.poll_interval(),
                &mut buf,
            ) {
                Ok(received) => received,
                Err(DriverError::Timeout { .. }) => {
                    warn!(
                        "read of {:#010x} timed out after {} of {} bytes (attempt {}/{})",
                        address,
                        assembler.received(),
                        len,
                        attempt,
                        config.max_read_attempts
                    );
                    break;
                }
                Err(e) => return Err(e),
            };

            let Some(reply) = buf.get(..received).and_then(ReadReply::parse) else {
                continue;
            };
            match assembler.push(&reply) {
                ReadProgress::Pending => {}
                ReadProgress::Complete(data) => return Ok(data),
                ReadProgress::Failed { code } => {
                    return Err(DriverError::ReadFailed { address, code });
                }
            }
        }
    }

    Err(DriverError::RetriesExhausted {
        address,
        attempts: config.max_read_attempts,
    })
}

/// Writes up to 16 bytes at `address` and waits for the acknowledgement.
///
/// Returns the ack's error code.
pub fn write_memory_sync<T: ReportTransport + ?Sized>(
    transport: &mut T,
    address: u32,
    data: &[u8],
    config: &DriverConfig,
) -> DriverResult<u8> {
    let request = encode_write_request(address, data, false).ok_or_else(|| {
        DriverError::InvalidRequest(format!("{} byte write to {address:#010x}", data.len()))
    })?;
    transport.write_report(&request)?;

    let mut buf = [0u8; MAX_REPORT_LEN];
    loop {
        let received = wait_for_report(
            transport,
            report_ids::ACK,
            config.read_timeout(),
            config.poll_interval(),
            &mut buf,
        )?;
        match buf.get(..received).and_then(Ack::parse) {
            Some(ack) if ack.report_id == report_ids::WRITE_MEMORY => return Ok(ack.error),
            Some(ack) => debug!("ignoring ack for report {:#04x}", ack.report_id),
            None => {}
        }
    }
}
