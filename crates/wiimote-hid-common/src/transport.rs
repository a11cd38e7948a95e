//! Report transport capability

use crate::{TransportError, TransportResult};

/// Largest report exchanged with a Wii Remote, report ID included.
pub const MAX_REPORT_LEN: usize = 22;

/// Raw HID report channel to one device.
///
/// Reports carry their report ID in the first byte. Implementations own the
/// platform socket; opening, pairing and discovery happen before a transport
/// is handed to the driver.
pub trait ReportTransport: Send {
    /// Sends one output report.
    fn write_report(&mut self, data: &[u8]) -> TransportResult<usize>;

    /// Polls for one input report without blocking.
    ///
    /// Returns the number of bytes written into `buf`, or `Ok(0)` when no
    /// report is pending.
    fn read_report(&mut self, buf: &mut [u8]) -> TransportResult<usize>;

    fn is_connected(&self) -> bool;
}

pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tracing::trace;

    type Responder = Box<dyn FnMut(&[u8]) -> Vec<Vec<u8>> + Send>;

    /// Scripted in-memory transport.
    ///
    /// Clones share the same queues, so a test can keep one handle to
    /// inspect writes while the driver owns another.
    #[derive(Clone)]
    pub struct MockTransport {
        read_queue: Arc<Mutex<VecDeque<Vec<u8>>>>,
        write_history: Arc<Mutex<Vec<Vec<u8>>>>,
        connected: Arc<Mutex<bool>>,
        failing_writes: Arc<Mutex<usize>>,
        responder: Arc<Mutex<Option<Responder>>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self {
                read_queue: Arc::new(Mutex::new(VecDeque::new())),
                write_history: Arc::new(Mutex::new(Vec::new())),
                connected: Arc::new(Mutex::new(true)),
                failing_writes: Arc::new(Mutex::new(0)),
                responder: Arc::new(Mutex::new(None)),
            }
        }

        pub fn queue_read(&self, data: Vec<u8>) {
            let mut queue = self.read_queue.lock().unwrap_or_else(|e| e.into_inner());
            queue.push_back(data);
        }

        pub fn pending_reads(&self) -> usize {
            let queue = self.read_queue.lock().unwrap_or_else(|e| e.into_inner());
            queue.len()
        }

        /// Installs a function producing the reports a device would send back
        /// for each written report. Its output is appended to the read queue.
        pub fn set_responder<F>(&self, responder: F)
        where
            F: FnMut(&[u8]) -> Vec<Vec<u8>> + Send + 'static,
        {
            let mut slot = self.responder.lock().unwrap_or_else(|e| e.into_inner());
            *slot = Some(Box::new(responder));
        }

        pub fn get_write_history(&self) -> Vec<Vec<u8>> {
            let history = self.write_history.lock().unwrap_or_else(|e| e.into_inner());
            history.clone()
        }

        pub fn clear_write_history(&self) {
            let mut history = self.write_history.lock().unwrap_or_else(|e| e.into_inner());
            history.clear();
        }

        pub fn disconnect(&self) {
            let mut connected = self.connected.lock().unwrap_or_else(|e| e.into_inner());
            *connected = false;
        }

        pub fn reconnect(&self) {
            let mut connected = self.connected.lock().unwrap_or_else(|e| e.into_inner());
            *connected = true;
        }

        /// Makes the next `count` writes fail with
        /// [`TransportError::WriteError`] while staying connected.
        pub fn fail_next_writes(&self, count: usize) {
            let mut failing = self.failing_writes.lock().unwrap_or_else(|e| e.into_inner());
            *failing = count;
        }
    }

    impl Default for MockTransport {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ReportTransport for MockTransport {
        fn write_report(&mut self, data: &[u8]) -> TransportResult<usize> {
            if !self.is_connected() {
                return Err(TransportError::Disconnected);
            }
            {
                let mut failing = self.failing_writes.lock().unwrap_or_else(|e| e.into_inner());
                if *failing > 0 {
                    *failing = failing.saturating_sub(1);
                    return Err(TransportError::WriteError("injected write failure".to_string()));
                }
            }

            trace!("mock transport write: {:02X?}", data);
            {
                let mut history = self.write_history.lock().unwrap_or_else(|e| e.into_inner());
                history.push(data.to_vec());
            }

            let replies = {
                let mut slot = self.responder.lock().unwrap_or_else(|e| e.into_inner());
                slot.as_mut().map(|respond| respond(data)).unwrap_or_default()
            };
            for reply in replies {
                self.queue_read(reply);
            }
            Ok(data.len())
        }

        fn read_report(&mut self, buf: &mut [u8]) -> TransportResult<usize> {
            if !self.is_connected() {
                return Err(TransportError::Disconnected);
            }

            let next = {
                let mut queue = self.read_queue.lock().unwrap_or_else(|e| e.into_inner());
                queue.pop_front()
            };
            let Some(report) = next else {
                return Ok(0);
            };

            let len = report.len().min(buf.len());
            if let (Some(dst), Some(src)) = (buf.get_mut(..len), report.get(..len)) {
                dst.copy_from_slice(src);
            }
            Ok(len)
        }

        fn is_connected(&self) -> bool {
            *self.connected.lock().unwrap_or_else(|e| e.into_inner())
        }
    }
}
