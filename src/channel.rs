//! In-process room channel: scoped broadcast keyed by [`RoomIdentifier`].
//!
//! ## Design
//! - `ChannelHub`: Arc<Mutex<..>> map of identifier → broadcast sender, shared
//!   by every participant living in the same process context
//! - Each open [`RoomHandle`] owns its own broadcast receiver
//! - Deliveries are tagged with the sending handle's id so a handle never
//!   observes its own sends
//!
//! A handle only sees envelopes sent after it was opened. Delivery is
//! best-effort: a receiver that lags more than the channel capacity loses the
//! overflow.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{debug, warn};

use crate::error::{ChatError, Result};
use crate::protocol::{ProtocolEnvelope, RoomIdentifier};

/// Default per-room broadcast buffer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct Delivery {
    from: u64,
    envelope: ProtocolEnvelope,
}

struct HubInner {
    rooms: HashMap<RoomIdentifier, broadcast::Sender<Delivery>>,
    available: bool,
    next_handle_id: u64,
    capacity: usize,
}

/// Shared transport that room handles are opened against.
///
/// Cloning is cheap; clones refer to the same set of rooms.
#[derive(Clone)]
pub struct ChannelHub {
    inner: Arc<Mutex<HubInner>>,
}

impl ChannelHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a hub whose rooms buffer up to `capacity` undelivered envelopes.
    pub fn with_capacity(capacity: usize) -> Self {
        ChannelHub {
            inner: Arc::new(Mutex::new(HubInner {
                rooms: HashMap::new(),
                available: true,
                next_handle_id: 0,
                capacity: capacity.max(1),
            })),
        }
    }

    /// Open a handle on `room`.
    ///
    /// Fails with [`ChatError::TransportUnavailable`] once the hub has been
    /// shut down.
    pub fn open(&self, room: &RoomIdentifier) -> Result<RoomHandle> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| ChatError::TransportUnavailable("internal: lock poisoned".to_string()))?;
        if !guard.available {
            return Err(ChatError::TransportUnavailable("channel hub has been shut down".to_string()));
        }

        let capacity = guard.capacity;
        let tx = guard
            .rooms
            .entry(room.clone())
            .or_insert_with(|| broadcast::channel(capacity).0)
            .clone();
        let rx = tx.subscribe();
        let id = guard.next_handle_id;
        guard.next_handle_id += 1;

        debug!(room = %room, handle = id, "room channel opened");
        Ok(RoomHandle {
            id,
            room: room.clone(),
            tx,
            rx: Some(rx),
            hub: Arc::clone(&self.inner),
        })
    }

    /// Make the transport unavailable. Existing handles keep working; new
    /// `open` calls fail.
    pub fn shutdown(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.available = false;
        }
    }

    /// Number of rooms with at least one open handle.
    pub fn room_count(&self) -> usize {
        self.inner.lock().map(|g| g.rooms.len()).unwrap_or(0)
    }
}

impl Default for ChannelHub {
    fn default() -> Self {
        Self::new()
    }
}

/// One participant's subscription to a room channel.
///
/// Closed explicitly with [`close`](Self::close) or implicitly on drop.
pub struct RoomHandle {
    id: u64,
    room: RoomIdentifier,
    tx: broadcast::Sender<Delivery>,
    rx: Option<broadcast::Receiver<Delivery>>,
    hub: Arc<Mutex<HubInner>>,
}

impl RoomHandle {
    pub fn room(&self) -> &RoomIdentifier {
        &self.room
    }

    pub fn is_closed(&self) -> bool {
        self.rx.is_none()
    }

    /// Deliver `envelope` to every other open handle on this room.
    pub fn send(&self, envelope: ProtocolEnvelope) -> Result<()> {
        if self.is_closed() {
            return Err(ChatError::ChannelClosed);
        }
        // Our own receiver keeps the channel alive, so a send error would only
        // mean nobody is listening; delivery is best-effort either way.
        let _ = self.tx.send(Delivery { from: self.id, envelope });
        Ok(())
    }

    /// Wait for the next envelope from another handle.
    ///
    /// Returns `None` once the handle is closed.
    pub async fn recv(&mut self) -> Option<ProtocolEnvelope> {
        let id = self.id;
        let room = self.room.clone();
        let rx = self.rx.as_mut()?;
        loop {
            match rx.recv().await {
                Ok(d) if d.from == id => continue,
                Ok(d) => return Some(d.envelope),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(room = %room, skipped, "room receiver lagged; envelopes dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next already-delivered envelope without waiting.
    pub fn try_recv(&mut self) -> Option<ProtocolEnvelope> {
        let id = self.id;
        let rx = self.rx.as_mut()?;
        loop {
            match rx.try_recv() {
                Ok(d) if d.from == id => continue,
                Ok(d) => return Some(d.envelope),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(room = %self.room, skipped, "room receiver lagged; envelopes dropped");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Stop receiving and release this handle's slot on the room.
    ///
    /// Idempotent. The room is forgotten by the hub once its last handle closes.
    pub fn close(&mut self) {
        if self.rx.is_none() {
            return;
        }
        // The receiver is released under the hub lock so no `open` can slip
        // in between it going away and the room entry being checked.
        let guard = self.hub.lock();
        drop(self.rx.take());
        if let Ok(mut guard) = guard {
            let current = guard.rooms.get(&self.room).is_some_and(|tx| tx.same_channel(&self.tx));
            if current && self.tx.receiver_count() == 0 {
                guard.rooms.remove(&self.room);
            }
        }
        debug!(room = %self.room, handle = self.id, "room channel closed");
    }
}

impl Drop for RoomHandle {
    fn drop(&mut self) {
        self.close();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
