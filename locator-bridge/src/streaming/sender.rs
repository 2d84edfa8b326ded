//! Sensor datagram channel towards the locator
//!
//! The locator connects to the bridge to pick up sensor data, so each sending
//! channel owns a listener. A dedicated thread accepts the locator's
//! connection; producers write datagrams through [`SendDispatcher::send_data`]
//! and learn about failures from the returned [`SendingStatus`].
//!
//! A failed write drops the connection. The accept thread picks up the
//! locator's next connection attempt; the failed datagram is not retried.

use crate::error::{Error, Result};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::io::{ErrorKind, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Poll interval of the accept loop
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Outcome of one [`SendDispatcher::send_data`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendingStatus {
    Success,
    IoFailure,
}

/// An accepted locator connection, numbered in accept order
struct Connection {
    id: u64,
    stream: TcpStream,
}

/// One sending channel
pub struct SendDispatcher {
    name: String,
    local_addr: SocketAddr,
    stream: Arc<Mutex<Option<Connection>>>,
    /// Serializes writers so datagrams never interleave
    write_lock: Mutex<()>,
    shutdown: Arc<AtomicBool>,
    accept_thread: Option<JoinHandle<()>>,
}

impl SendDispatcher {
    /// Bind `bind_address` and start accepting the locator's connection
    pub fn new(name: &str, bind_address: &str, write_timeout: Duration) -> Result<Self> {
        let listener = TcpListener::bind(bind_address)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let stream = Arc::new(Mutex::new(None));
        let shutdown = Arc::new(AtomicBool::new(false));

        let thread_name = name.to_string();
        let stream_clone = Arc::clone(&stream);
        let shutdown_clone = Arc::clone(&shutdown);
        let accept_thread = thread::Builder::new()
            .name(format!("tx-{}", name))
            .spawn(move || {
                accept_loop(&thread_name, listener, stream_clone, shutdown_clone, write_timeout)
            })
            .map_err(|e| Error::ThreadSpawn(format!("sender {}: {}", name, e)))?;

        info!("{}: waiting for locator on {}", name, local_addr);

        Ok(Self {
            name: name.to_string(),
            local_addr,
            stream,
            write_lock: Mutex::new(()),
            shutdown,
            accept_thread: Some(accept_thread),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// True while the locator is connected
    pub fn is_connected(&self) -> bool {
        self.stream.lock().is_some()
    }

    /// Write one datagram
    ///
    /// Returns [`SendingStatus::IoFailure`] if the locator is not connected
    /// or the write fails. A failed connection is dropped.
    pub fn send_data(&self, data: &[u8]) -> SendingStatus {
        let _writer = self.write_lock.lock();

        // Write on a clone so stop() can shut the socket down mid-write
        let cloned = self
            .stream
            .lock()
            .as_ref()
            .map(|conn| (conn.id, conn.stream.try_clone()));
        let (id, mut stream) = match cloned {
            Some((id, Ok(stream))) => (id, stream),
            Some((id, Err(e))) => {
                warn!("{}: cannot use connection: {}", self.name, e);
                self.drop_connection_if(id);
                return SendingStatus::IoFailure;
            }
            None => {
                debug!("{}: no locator connected, dropping datagram", self.name);
                return SendingStatus::IoFailure;
            }
        };

        match stream.write_all(data).and_then(|()| stream.flush()) {
            Ok(()) => SendingStatus::Success,
            Err(e) => {
                warn!("{}: send failed: {}", self.name, e);
                self.drop_connection_if(id);
                SendingStatus::IoFailure
            }
        }
    }

    /// Drop connection `id`; a connection accepted since is kept
    fn drop_connection_if(&self, id: u64) {
        let mut current = self.stream.lock();
        if current.as_ref().is_some_and(|conn| conn.id == id) {
            if let Some(conn) = current.take() {
                let _ = conn.stream.shutdown(Shutdown::Both);
            }
        }
    }

    fn drop_connection(&self) {
        if let Some(conn) = self.stream.lock().take() {
            let _ = conn.stream.shutdown(Shutdown::Both);
        }
    }

    #[cfg(test)]
    fn connection_id(&self) -> Option<u64> {
        self.stream.lock().as_ref().map(|conn| conn.id)
    }

    /// Close the connection and join the accept thread; idempotent
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.drop_connection();
        if let Some(handle) = self.accept_thread.take() {
            if handle.join().is_err() {
                error!("{}: accept thread panicked", self.name);
            }
            info!("{}: stopped", self.name);
        }
    }
}

impl Drop for SendDispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn accept_loop(
    name: &str,
    listener: TcpListener,
    slot: Arc<Mutex<Option<Connection>>>,
    shutdown: Arc<AtomicBool>,
    write_timeout: Duration,
) {
    let mut next_id = 0u64;
    while !shutdown.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, addr)) => {
                if let Err(e) = configure(&stream, write_timeout) {
                    warn!("{}: failed to configure connection from {}: {}", name, addr, e);
                    continue;
                }
                let mut current = slot.lock();
                if shutdown.load(Ordering::Relaxed) {
                    let _ = stream.shutdown(Shutdown::Both);
                    break;
                }
                next_id += 1;
                let conn = Connection {
                    id: next_id,
                    stream,
                };
                if let Some(previous) = current.replace(conn) {
                    debug!("{}: replacing previous connection", name);
                    let _ = previous.stream.shutdown(Shutdown::Both);
                }
                info!("{}: locator connected from {}", name, addr);
            }
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(e) => {
                error!("{}: error accepting connection: {}", name, e);
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
        }
    }
    debug!("{}: accept loop exiting", name);
}

fn configure(stream: &TcpStream, write_timeout: Duration) -> std::io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_write_timeout(Some(write_timeout))?;
    stream.set_nodelay(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::time::Instant;

    fn dispatcher() -> SendDispatcher {
        SendDispatcher::new("test", "127.0.0.1:0", Duration::from_millis(200)).unwrap()
    }

    fn wait_connected(sender: &SendDispatcher) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !sender.is_connected() {
            assert!(Instant::now() < deadline, "locator never accepted");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_send_without_connection_fails() {
        let sender = dispatcher();
        assert_eq!(sender.send_data(&[1, 2, 3]), SendingStatus::IoFailure);
    }

    #[test]
    fn test_send_to_connected_locator() {
        let sender = dispatcher();
        let mut locator = TcpStream::connect(sender.local_addr()).unwrap();
        wait_connected(&sender);

        assert_eq!(sender.send_data(&[1, 2, 3, 4]), SendingStatus::Success);
        let mut received = [0u8; 4];
        locator.read_exact(&mut received).unwrap();
        assert_eq!(received, [1, 2, 3, 4]);
    }

    #[test]
    fn test_reconnect_after_locator_drop() {
        let sender = dispatcher();
        let first = TcpStream::connect(sender.local_addr()).unwrap();
        wait_connected(&sender);
        drop(first);

        // Writes eventually fail once the peer is gone
        let deadline = Instant::now() + Duration::from_secs(2);
        while sender.send_data(&[0u8; 1024]) == SendingStatus::Success {
            assert!(Instant::now() < deadline, "write to closed peer kept succeeding");
            thread::sleep(Duration::from_millis(10));
        }
        assert!(!sender.is_connected());

        let mut second = TcpStream::connect(sender.local_addr()).unwrap();
        wait_connected(&sender);
        assert_eq!(sender.send_data(&[9]), SendingStatus::Success);
        let mut byte = [0u8; 1];
        second.read_exact(&mut byte).unwrap();
        assert_eq!(byte, [9]);
    }

    #[test]
    fn test_stale_failure_keeps_newer_connection() {
        let sender = dispatcher();
        let _first = TcpStream::connect(sender.local_addr()).unwrap();
        wait_connected(&sender);
        let first_id = sender.connection_id().unwrap();

        let mut second = TcpStream::connect(sender.local_addr()).unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        while sender.connection_id() == Some(first_id) {
            assert!(Instant::now() < deadline, "second connection never accepted");
            thread::sleep(Duration::from_millis(5));
        }

        // A write on the first connection failing late must not cost the second
        sender.drop_connection_if(first_id);
        assert!(sender.is_connected());
        assert_eq!(sender.send_data(&[7]), SendingStatus::Success);
        let mut byte = [0u8; 1];
        second.read_exact(&mut byte).unwrap();
        assert_eq!(byte, [7]);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut sender = dispatcher();
        sender.stop();
        sender.stop();
        assert_eq!(sender.send_data(&[1]), SendingStatus::IoFailure);
    }
}
