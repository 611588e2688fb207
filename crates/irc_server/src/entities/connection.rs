//! Connection entity (§3, §4.C5): a tagged union keyed by connection type,
//! never an untagged union — accessing the wrong arm is a compile error,
//! not a runtime check, per §9's note on the source's `peer.user|server`.

use crate::entities::{ServerLink, User};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify, RwLock};

/// Stable identity for a connection, independent of its current nick.
/// Used as the key for a Channel's membership table so that a NICK change
/// does not require rekeying every channel the user belongs to.
pub type ConnId = u64;

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_conn_id() -> ConnId {
    NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed)
}

/// Outbound line queue: the per-connection write serialization point of
/// §5. The writer task is the only reader; a full channel is the "SendQ
/// exceeded" overflow condition.
pub type OutboundTx = mpsc::Sender<String>;
pub type OutboundRx = mpsc::Receiver<String>;

/// Fields accumulated before a connection has supplied enough of
/// NICK/USER (or PASS/SERVER) to become a full User or ServerLink.
#[derive(Debug, Default, Clone)]
pub struct PendingRegistration {
    pub nick: Option<String>,
    pub user: Option<(String, String, String)>, // (username, mode, fullname)
    pub pass: Option<String>,
}

pub enum ConnState {
    Unknown(PendingRegistration),
    User(Arc<User>),
    Server(Arc<ServerLink>),
}

/// Lets code holding only an outbound handle (a `User`, or a `Connection`
/// reached from another handler) request that a connection's reader task
/// stop, without itself owning the reader. The reader task races this
/// against its own socket read in `worker::run_reader`.
#[derive(Clone)]
pub struct DisconnectSignal {
    notify: Arc<Notify>,
    reason: Arc<Mutex<Option<String>>>,
}

impl DisconnectSignal {
    pub fn new() -> Self {
        DisconnectSignal {
            notify: Arc::new(Notify::new()),
            reason: Arc::new(Mutex::new(None)),
        }
    }

    /// First caller wins; later calls are no-ops once a reason is set.
    pub fn request(&self, reason: impl Into<String>) {
        let mut guard = self.reason.lock().unwrap();
        if guard.is_none() {
            *guard = Some(reason.into());
            self.notify.notify_one();
        }
    }

    pub async fn notified(&self) {
        self.notify.notified().await;
    }

    pub fn take_reason(&self) -> Option<String> {
        self.reason.lock().unwrap().take()
    }
}

impl Default for DisconnectSignal {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Connection {
    pub id: ConnId,
    pub addr: SocketAddr,
    pub outbound: OutboundTx,
    pub state: RwLock<ConnState>,
    pub disconnect: DisconnectSignal,
}

impl Connection {
    pub fn new(id: ConnId, addr: SocketAddr, outbound: OutboundTx) -> Self {
        Connection {
            id,
            addr,
            outbound,
            state: RwLock::new(ConnState::Unknown(PendingRegistration::default())),
            disconnect: DisconnectSignal::new(),
        }
    }

    pub async fn is_registered(&self) -> bool {
        !matches!(&*self.state.read().await, ConnState::Unknown(_))
    }

    pub async fn as_user(&self) -> Option<Arc<User>> {
        match &*self.state.read().await {
            ConnState::User(u) => Some(u.clone()),
            _ => None,
        }
    }
}
