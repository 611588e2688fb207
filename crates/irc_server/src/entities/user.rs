//! User entity (§3): created only once a connection has supplied both
//! NICK and USER. `nick` is mutable (NICK command); everything else here
//! is set at registration time.

use crate::entities::channel::ChannelMembership;
use crate::entities::connection::{ConnId, DisconnectSignal, OutboundTx};
use crate::entities::Channel;
use crate::modeset::ModeSet;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, RwLock};

pub struct User {
    pub conn_id: ConnId,
    pub nick: RwLock<String>,
    pub username: String,
    pub fullname: String,
    pub hostname: String,
    pub modes: Mutex<ModeSet>,
    pub awaymsg: Mutex<Option<String>>,
    pub outbound: OutboundTx,
    /// Shared with the owning `Connection` so a full SendQ can cancel that
    /// connection's reader task from here, without this code holding the
    /// `Connection` itself (§5 SendQ overflow).
    pub disconnect: DisconnectSignal,
    /// Keyed by case-folded channel name. Holds the channel (for fan-out)
    /// and the shared membership record (§9: jointly owned by both sides).
    pub memberships: DashMap<String, (Arc<Channel>, Arc<ChannelMembership>)>,
}

impl User {
    pub fn new(
        conn_id: ConnId,
        nick: String,
        username: String,
        fullname: String,
        hostname: String,
        outbound: OutboundTx,
        disconnect: DisconnectSignal,
    ) -> Self {
        User {
            conn_id,
            nick: RwLock::new(nick),
            username,
            fullname,
            hostname,
            modes: Mutex::new(ModeSet::new()),
            awaymsg: Mutex::new(None),
            outbound,
            disconnect,
            memberships: DashMap::new(),
        }
    }

    pub async fn current_nick(&self) -> String {
        self.nick.read().await.clone()
    }

    /// `nick!user@host`, the prefix used on broadcast messages originated
    /// by this user.
    pub async fn prefix(&self) -> String {
        format!("{}!{}@{}", self.current_nick().await, self.username, self.hostname)
    }

    /// Non-blocking send (§5): a full SendQ means the peer isn't draining
    /// fast enough, and cancels the connection rather than stalling
    /// whichever task is trying to deliver to it.
    pub async fn send_line(&self, line: String) {
        match self.outbound.try_send(line) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(_)) => self.disconnect.request("SendQ exceeded"),
        }
    }
}
