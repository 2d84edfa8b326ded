//! Receive loop for one locator telemetry channel
//!
//! # Connection Lifecycle
//!
//! ```text
//! 1. connect() opens the TCP connection (failure aborts start-up)
//! 2. run() reads into the channel buffer and decodes records until stop()
//! 3. peer close or socket error: log, wait 1 s, reconnect
//! 4. stop() raises the flag and shuts the socket down
//! ```
//!
//! Records arrive without framing, so a read may end anywhere inside a
//! record. Undecodable leftovers stay in the [`DatagramBuffer`] until more
//! bytes arrive. Any other decode error discards what is buffered.

use super::channel::ChannelDecoder;
use crate::codec::DatagramBuffer;
use crate::error::{Error, Result};
use crate::types::TelemetryMessage;
use crossbeam_channel::{Sender, TrySendError};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::io::{ErrorKind, Read};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Read timeout so the loop observes the stop flag
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Wait between reconnect attempts after the locator closed the channel
pub const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);

/// Bytes requested per socket read
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Stops a running [`ReceiveDispatcher`] from another thread
#[derive(Clone)]
pub struct ReceiveStopper {
    shutdown: Arc<AtomicBool>,
    socket: Arc<Mutex<Option<TcpStream>>>,
}

impl ReceiveStopper {
    /// Raise the stop flag and unblock a pending read; idempotent
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(socket) = self.socket.lock().take() {
            let _ = socket.shutdown(Shutdown::Both);
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

/// One telemetry channel: connection, buffer and decoder
pub struct ReceiveDispatcher {
    decoder: ChannelDecoder,
    addr: SocketAddr,
    connect_timeout: Duration,
    stream: TcpStream,
    stopper: ReceiveStopper,
    sink: Sender<TelemetryMessage>,
    dropped: u64,
}

impl ReceiveDispatcher {
    /// Connect to the channel's port on the locator
    pub fn connect(
        addr: SocketAddr,
        decoder: ChannelDecoder,
        sink: Sender<TelemetryMessage>,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let stream = open(addr, connect_timeout)?;
        info!("{}: connected to {}", decoder.topic, addr);
        let stopper = ReceiveStopper {
            shutdown: Arc::new(AtomicBool::new(false)),
            socket: Arc::new(Mutex::new(Some(stream.try_clone()?))),
        };
        Ok(Self {
            decoder,
            addr,
            connect_timeout,
            stream,
            stopper,
            sink,
            dropped: 0,
        })
    }

    pub fn stopper(&self) -> ReceiveStopper {
        self.stopper.clone()
    }

    pub fn topic(&self) -> &str {
        &self.decoder.topic
    }

    /// Read and decode until stopped
    pub fn run(mut self) {
        let mut buffer = DatagramBuffer::new();
        let mut chunk = vec![0u8; READ_CHUNK_SIZE];

        while !self.stopper.is_stopped() {
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    if self.stopper.is_stopped() {
                        break;
                    }
                    warn!("{}: received 0 bytes, connection closed by locator", self.decoder.topic);
                    buffer.clear();
                    if !self.reconnect() {
                        break;
                    }
                }
                Ok(n) => {
                    buffer.extend(&chunk[..n]);
                    self.drain(&mut buffer);
                }
                Err(ref e)
                    if matches!(
                        e.kind(),
                        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                    ) => {}
                Err(e) => {
                    if self.stopper.is_stopped() {
                        break;
                    }
                    error!("{}: read error: {}", self.decoder.topic, e);
                    buffer.clear();
                    if !self.reconnect() {
                        break;
                    }
                }
            }
        }

        debug!("{}: receive loop exiting", self.decoder.topic);
    }

    /// Decode every complete record in `buffer`
    fn drain(&mut self, buffer: &mut DatagramBuffer) {
        loop {
            match buffer.try_decode(|c| self.decoder.decode(c)) {
                Ok(messages) => {
                    for message in messages {
                        self.publish(message);
                    }
                }
                Err(e) if e.is_incomplete() => break,
                Err(e) => {
                    error!(
                        "{}: {}; discarding {} buffered bytes",
                        self.decoder.topic,
                        e,
                        buffer.len()
                    );
                    buffer.clear();
                    break;
                }
            }
        }
    }

    fn publish(&mut self, message: TelemetryMessage) {
        match self.sink.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                if self.dropped % 100 == 1 {
                    warn!(
                        "{}: telemetry channel full, {} messages dropped",
                        self.decoder.topic, self.dropped
                    );
                }
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("{}: telemetry receiver gone", self.decoder.topic);
            }
        }
    }

    /// Reconnect after a back-off; false once stopped
    fn reconnect(&mut self) -> bool {
        while !self.stopper.is_stopped() {
            sleep_unless_stopped(RECONNECT_BACKOFF, &self.stopper);
            if self.stopper.is_stopped() {
                break;
            }
            match open(self.addr, self.connect_timeout).and_then(|s| {
                let clone = s.try_clone()?;
                Ok((s, clone))
            }) {
                Ok((stream, clone)) => {
                    let mut slot = self.stopper.socket.lock();
                    // stop() may have run between the check above and here
                    if self.stopper.is_stopped() {
                        let _ = stream.shutdown(Shutdown::Both);
                        return false;
                    }
                    *slot = Some(clone);
                    self.stream = stream;
                    info!("{}: reconnected to {}", self.decoder.topic, self.addr);
                    return true;
                }
                Err(e) => warn!("{}: reconnect to {} failed: {}", self.decoder.topic, self.addr, e),
            }
        }
        false
    }
}

fn open(addr: SocketAddr, timeout: Duration) -> Result<TcpStream> {
    let stream = TcpStream::connect_timeout(&addr, timeout)
        .map_err(|e| Error::Unreachable(format!("{}: {}", addr, e)))?;
    stream.set_read_timeout(Some(READ_TIMEOUT))?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

fn sleep_unless_stopped(duration: Duration, stopper: &ReceiveStopper) {
    let step = Duration::from_millis(50);
    let mut waited = Duration::ZERO;
    while waited < duration && !stopper.is_stopped() {
        thread::sleep(step);
        waited += step;
    }
}

/// A [`ReceiveDispatcher`] running on its own thread
pub struct ReceiverThread {
    topic: String,
    stopper: ReceiveStopper,
    handle: Option<JoinHandle<()>>,
}

impl ReceiverThread {
    pub fn spawn(dispatcher: ReceiveDispatcher) -> Result<Self> {
        let topic = dispatcher.topic().to_string();
        let stopper = dispatcher.stopper();
        let handle = thread::Builder::new()
            .name(format!("rx-{}", topic))
            .spawn(move || dispatcher.run())
            .map_err(|e| Error::ThreadSpawn(format!("receiver {}: {}", topic, e)))?;
        Ok(Self {
            topic,
            stopper,
            handle: Some(handle),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Stop the loop and join the thread; idempotent
    pub fn stop(&mut self) {
        self.stopper.stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("{}: receiver thread panicked", self.topic);
            }
        }
    }
}

impl Drop for ReceiverThread {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DatagramWriter;
    use crate::streaming::channel::ReceiveChannel;
    use crate::types::Payload;
    use std::io::Write;
    use std::net::{TcpListener, TcpStream};
    use std::time::Instant;

    fn control_mode_record(raw: u64) -> Vec<u8> {
        let mut w = DatagramWriter::default();
        w.write_f64(5.0).write_u64(raw);
        w.finish().unwrap()
    }

    /// Map record with raw name bytes and one point
    fn map_record(name: &[u8]) -> Vec<u8> {
        let mut w = DatagramWriter::default();
        w.write_f64(3.0).write_u32(name.len() as u32);
        let mut bytes = w.finish().unwrap();
        bytes.extend_from_slice(name);
        let mut w = DatagramWriter::default();
        w.write_array(&[(1.5, -2.0)], |w, (x, y)| {
            w.write_f64(*x).write_f64(*y);
        });
        bytes.extend(w.finish().unwrap());
        bytes
    }

    fn spawn_receiver(
        listener: &TcpListener,
        channel: ReceiveChannel,
    ) -> (ReceiverThread, crossbeam_channel::Receiver<TelemetryMessage>) {
        let (tx, rx) = crossbeam_channel::bounded(16);
        let decoder = ChannelDecoder::with_defaults(channel, "map", "laser");
        let addr = listener.local_addr().unwrap();
        let dispatcher =
            ReceiveDispatcher::connect(addr, decoder, tx, Duration::from_secs(1)).unwrap();
        (ReceiverThread::spawn(dispatcher).unwrap(), rx)
    }

    fn accept_within(listener: &TcpListener, timeout: Duration) -> TcpStream {
        listener.set_nonblocking(true).unwrap();
        let deadline = Instant::now() + timeout;
        loop {
            match listener.accept() {
                Ok((stream, _)) => {
                    stream.set_nonblocking(false).unwrap();
                    return stream;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    assert!(Instant::now() < deadline, "receiver never connected");
                    thread::sleep(Duration::from_millis(10));
                }
                Err(e) => panic!("accept failed: {}", e),
            }
        }
    }

    #[test]
    fn test_connect_failure_is_error() {
        // Bind then drop to get a port nobody listens on
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
        let (tx, _rx) = crossbeam_channel::bounded(4);
        let decoder = ChannelDecoder::with_defaults(ReceiveChannel::ControlMode, "map", "laser");
        assert!(
            ReceiveDispatcher::connect(port, decoder, tx, Duration::from_millis(200)).is_err()
        );
    }

    #[test]
    fn test_receives_split_records() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = crossbeam_channel::bounded(16);
        let decoder = ChannelDecoder::with_defaults(ReceiveChannel::ControlMode, "map", "laser");
        let dispatcher =
            ReceiveDispatcher::connect(addr, decoder, tx, Duration::from_secs(1)).unwrap();
        let mut thread = ReceiverThread::spawn(dispatcher).unwrap();

        let (mut peer, _) = listener.accept().unwrap();
        let mut stream = control_mode_record(1 << 12);
        stream.extend(control_mode_record(2 << 12));
        // Second record split across writes
        peer.write_all(&stream[..20]).unwrap();
        peer.flush().unwrap();
        thread::sleep(Duration::from_millis(50));
        peer.write_all(&stream[20..]).unwrap();

        let mut states = Vec::new();
        for _ in 0..2 {
            let msg = rx.recv_timeout(Duration::from_secs(2)).unwrap();
            assert_eq!(msg.topic, "client_control_mode");
            match msg.payload {
                Payload::ControlMode(mode) => states.push(mode.localization_state),
                other => panic!("unexpected payload {:?}", other),
            }
        }
        assert_eq!(states, vec![1, 2]);

        thread.stop();
        thread.stop();
    }

    #[test]
    fn test_malformed_record_does_not_stall_channel() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let (mut thread, rx) = spawn_receiver(&listener, ReceiveChannel::MapMap);
        let (mut peer, _) = listener.accept().unwrap();

        peer.write_all(&map_record(&[0xff, 0xfe, 0xfd])).unwrap();
        peer.flush().unwrap();
        thread::sleep(Duration::from_millis(200));
        peer.write_all(&map_record(b"office")).unwrap();

        let msg = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(msg.topic, "client_map_map");
        match msg.payload {
            Payload::PointCloud(cloud) => assert_eq!(cloud.points, vec![[1.5, -2.0, 0.0]]),
            other => panic!("unexpected payload {:?}", other),
        }
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

        thread.stop();
    }

    #[test]
    fn test_reconnects_after_peer_close() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let (mut thread, rx) = spawn_receiver(&listener, ReceiveChannel::ControlMode);
        let (first, _) = listener.accept().unwrap();
        drop(first);

        let mut second = accept_within(&listener, RECONNECT_BACKOFF * 3);
        second.write_all(&control_mode_record(4 << 12)).unwrap();

        let msg = rx.recv_timeout(Duration::from_secs(3)).unwrap();
        match msg.payload {
            Payload::ControlMode(mode) => assert_eq!(mode.localization_state, 4),
            other => panic!("unexpected payload {:?}", other),
        }

        thread.stop();
    }
}
