//! Periodic session refresh

use crate::error::{Error, Result};
use crate::rpc::SessionClient;
use crossbeam_channel::{Sender, bounded, select, tick};
use log::{debug, error, warn};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Keeps the locator session alive from a background thread
///
/// A failed refresh is logged and retried on the next tick. The timer never
/// logs in again.
pub struct RefreshTimer {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl RefreshTimer {
    pub fn start(session: Arc<SessionClient>, interval: Duration) -> Result<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let handle = thread::Builder::new()
            .name("session-refresh".to_string())
            .spawn(move || {
                let ticker = tick(interval);
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            if let Err(e) = session.refresh() {
                                warn!("Session refresh failed: {}", e);
                            }
                        }
                        // Stop request or dropped sender
                        recv(stop_rx) -> _ => break,
                    }
                }
                debug!("Session refresh timer exiting");
            })
            .map_err(|e| Error::ThreadSpawn(format!("session refresh: {}", e)))?;

        debug!("Session refresh every {:?}", interval);
        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Stop the timer and join its thread; idempotent
    pub fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Session refresh thread panicked");
            }
        }
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::ConfigDocument;
    use crate::rpc::mock::{MockReply, MockTransport};
    use std::time::Instant;

    fn wait_for_refreshes(mock: &MockTransport, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while mock.calls_to("sessionRefresh").len() < count {
            assert!(Instant::now() < deadline, "timer did not fire");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_timer_refreshes_without_new_sessions() {
        let mock = MockTransport::locator(&ConfigDocument::new());
        let session = Arc::new(SessionClient::new(mock.clone()));
        session.login("u", "p").unwrap();

        let mut timer =
            RefreshTimer::start(Arc::clone(&session), Duration::from_millis(10)).unwrap();
        wait_for_refreshes(&mock, 3);
        timer.stop();
        timer.stop();

        assert_eq!(mock.sessions_created(), 1);
        assert!(session.is_logged_in());
    }

    #[test]
    fn test_failures_keep_timer_running() {
        let mock = MockTransport::locator(&ConfigDocument::new());
        let session = Arc::new(SessionClient::new(mock.clone()));
        session.login("u", "p").unwrap();
        mock.reply("sessionRefresh", MockReply::Unreachable);

        let mut timer = RefreshTimer::start(session, Duration::from_millis(10)).unwrap();
        wait_for_refreshes(&mock, 3);
        timer.stop();
        assert_eq!(mock.calls_to("sessionLogin").len(), 1);
    }
}
