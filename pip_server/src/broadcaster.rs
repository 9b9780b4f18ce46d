//! Fan-out of text payloads to a live set of subscribers.
//!
//! Each subscriber gets a bounded queue and a dedicated writer thread that owns its
//! `Connection`. A broadcast never blocks on subscriber I/O:
//!
//! 1. the subscriber set is snapshotted under a read lock;
//! 2. the payload is pushed into every queue with `try_send` together with an ack
//!    sender;
//! 3. the caller waits for acks until a single deadline (`send_timeout`) passes;
//! 4. every subscriber whose queue was full, whose send failed, or who did not ack
//!    in time is removed from the set and its writer is told to stop.
//!
//! The caller therefore waits at most one `send_timeout` per broadcast, however many
//! subscribers are slow. Delivery failures are logged here and never returned.
//!
//! Membership changes come from the transport (`register`), from writers noticing
//! that their peer went away, and from failed deliveries. Subscribers that join
//! after a broadcast do not receive it.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use log::{debug, info, warn};
use pip_common::{PipError, Result};

use crate::config::TransportConfig;

/// Identifier assigned to a subscriber when it registers.
pub type SubscriberId = u64;

/// How long an idle writer waits for work before polling its peer.
const IDLE_POLL: Duration = Duration::from_millis(50);

/// One connected subscriber as seen by its writer thread.
pub trait Connection: Send + 'static {
    /// Label for logs (usually the remote address).
    fn peer(&self) -> String;

    /// Deliver one text frame. Must give up within the transport's send timeout.
    fn send_text(&mut self, text: &str) -> Result<()>;

    /// Drain inbound traffic; an error means the peer is gone.
    fn poll_inbound(&mut self) -> Result<()> {
        Ok(())
    }

    /// Close the connection. Errors are ignored.
    fn close(&mut self) {}
}

enum Outbound {
    Text {
        payload: Arc<str>,
        ack: Sender<Ack>,
    },
    Close,
}

struct Ack {
    id: SubscriberId,
    error: Option<String>,
}

struct SubscriberHandle {
    peer: String,
    tx: Sender<Outbound>,
    stopped: Arc<AtomicBool>,
}

impl SubscriberHandle {
    fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        let _ = self.tx.try_send(Outbound::Close);
    }
}

struct Registry {
    channel: &'static str,
    subscribers: RwLock<HashMap<SubscriberId, SubscriberHandle>>,
    next_id: AtomicU64,
    live_writers: AtomicUsize,
}

impl Registry {
    fn remove(&self, id: SubscriberId) -> Option<SubscriberHandle> {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
    }

    fn len(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Outcome of one broadcast.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers that acknowledged delivery.
    pub delivered: usize,
    /// Subscribers removed because of this broadcast.
    pub dropped: usize,
}

/// Subscriber set plus fan-out. Cloning shares the same set.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<Registry>,
    send_timeout: Duration,
    queue_capacity: usize,
}

impl Broadcaster {
    /// Create an empty broadcaster for `channel` (used in logs).
    pub fn new(channel: &'static str, send_timeout: Duration, queue_capacity: usize) -> Self {
        Self {
            registry: Arc::new(Registry {
                channel,
                subscribers: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                live_writers: AtomicUsize::new(0),
            }),
            send_timeout,
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Create a broadcaster using the limits of `transport`.
    pub fn from_transport(channel: &'static str, transport: &TransportConfig) -> Self {
        Self::new(channel, transport.send_timeout(), transport.queue_capacity)
    }

    /// Add a connection to the set and start its writer thread.
    pub fn register(&self, conn: Box<dyn Connection>) -> Result<SubscriberId> {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        let peer = conn.peer();
        let (tx, rx) = bounded(self.queue_capacity);
        let stopped = Arc::new(AtomicBool::new(false));

        let total = {
            let mut map = self
                .registry
                .subscribers
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            map.insert(
                id,
                SubscriberHandle {
                    peer: peer.clone(),
                    tx,
                    stopped: Arc::clone(&stopped),
                },
            );
            map.len()
        };

        let registry = Arc::downgrade(&self.registry);
        self.registry.live_writers.fetch_add(1, Ordering::AcqRel);
        let spawned = thread::Builder::new()
            .name(format!("{}-writer-{}", self.registry.channel, id))
            .spawn(move || run_writer(id, conn, rx, stopped, registry));

        if let Err(e) = spawned {
            self.registry.live_writers.fetch_sub(1, Ordering::AcqRel);
            self.registry.remove(id);
            return Err(PipError::Io(e));
        }

        info!(
            "{} subscriber {} connected (total: {})",
            self.registry.channel, peer, total
        );
        Ok(id)
    }

    /// Deliver `payload` to every current subscriber, best effort.
    pub fn broadcast(&self, payload: &str) -> BroadcastReport {
        let snapshot: Vec<(SubscriberId, Sender<Outbound>)> = {
            let map = self
                .registry
                .subscribers
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            map.iter()
                .map(|(id, handle)| (*id, handle.tx.clone()))
                .collect()
        };
        if snapshot.is_empty() {
            return BroadcastReport::default();
        }

        let payload: Arc<str> = Arc::from(payload);
        let (ack_tx, ack_rx) = bounded::<Ack>(snapshot.len());
        let mut pending = HashSet::new();
        let mut failed: Vec<(SubscriberId, String)> = Vec::new();

        for (id, tx) in snapshot {
            let outbound = Outbound::Text {
                payload: Arc::clone(&payload),
                ack: ack_tx.clone(),
            };
            match tx.try_send(outbound) {
                Ok(()) => {
                    pending.insert(id);
                }
                Err(TrySendError::Full(_)) => failed.push((id, "queue full".into())),
                Err(TrySendError::Disconnected(_)) => failed.push((id, "writer stopped".into())),
            }
        }
        drop(ack_tx);

        let deadline = Instant::now() + self.send_timeout;
        let mut delivered = 0;
        while !pending.is_empty() {
            match ack_rx.recv_deadline(deadline) {
                Ok(Ack { id, error: None }) => {
                    if pending.remove(&id) {
                        delivered += 1;
                    }
                }
                Ok(Ack {
                    id,
                    error: Some(reason),
                }) => {
                    if pending.remove(&id) {
                        failed.push((id, reason));
                    }
                }
                Err(_) => break,
            }
        }
        failed.extend(
            pending
                .into_iter()
                .map(|id| (id, format!("no ack within {:?}", self.send_timeout))),
        );

        let dropped = failed.len();
        for (id, reason) in failed {
            self.drop_subscriber(id, &reason);
        }

        debug!(
            "{} broadcast: {} delivered, {} dropped",
            self.registry.channel, delivered, dropped
        );
        BroadcastReport { delivered, dropped }
    }

    /// Number of subscribers currently in the set.
    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    /// Close every subscriber and wait up to `grace` for their writers to finish.
    pub fn shutdown(&self, grace: Duration) {
        let handles: Vec<SubscriberHandle> = {
            let mut map = self
                .registry
                .subscribers
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            map.drain().map(|(_, handle)| handle).collect()
        };
        for handle in &handles {
            let _ = handle.tx.try_send(Outbound::Close);
        }
        drop(handles);

        let deadline = Instant::now() + grace;
        while self.registry.live_writers.load(Ordering::Acquire) > 0 && Instant::now() < deadline
        {
            thread::sleep(Duration::from_millis(10));
        }
        info!(
            "{} broadcaster stopped ({} writers still running)",
            self.registry.channel,
            self.registry.live_writers.load(Ordering::Acquire)
        );
    }

    fn drop_subscriber(&self, id: SubscriberId, reason: &str) {
        if let Some(handle) = self.registry.remove(id) {
            handle.stop();
            let err = PipError::SubscriberDelivery {
                peer: handle.peer.clone(),
                reason: reason.to_string(),
            };
            warn!(
                "{} {} (remaining: {})",
                self.registry.channel,
                err,
                self.registry.len()
            );
        }
    }
}

fn run_writer(
    id: SubscriberId,
    mut conn: Box<dyn Connection>,
    rx: Receiver<Outbound>,
    stopped: Arc<AtomicBool>,
    registry: Weak<Registry>,
) {
    let peer = conn.peer();

    loop {
        match rx.recv_timeout(IDLE_POLL) {
            Ok(Outbound::Text { payload, ack }) => {
                if stopped.load(Ordering::Acquire) {
                    break;
                }
                let error = conn.send_text(&payload).err().map(|e| e.to_string());
                let failed = error.is_some();
                let _ = ack.send(Ack { id, error });
                if failed {
                    break;
                }
            }
            Ok(Outbound::Close) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                if stopped.load(Ordering::Acquire) {
                    break;
                }
                if let Err(e) = conn.poll_inbound() {
                    debug!("{} went away: {}", peer, e);
                    break;
                }
            }
        }
    }

    conn.close();
    if let Some(registry) = registry.upgrade() {
        if registry.remove(id).is_some() {
            info!(
                "{} subscriber {} disconnected (remaining: {})",
                registry.channel,
                peer,
                registry.len()
            );
        }
        registry.live_writers.fetch_sub(1, Ordering::AcqRel);
    }
}
