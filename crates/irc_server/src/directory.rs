//! The Context/Directory (§3, §4.C4): global indices for connections,
//! users, channels and server links, plus the get-or-create and
//! membership primitives that are the only code paths allowed to mutate
//! those indices. Uses `DashMap` (independently-locked shards) for the
//! tables and per-entity locks for mutable fields reached after a lookup,
//! the fine-grained discipline documented in SPEC_FULL.md §5.

use crate::casefold::fold;
use crate::entities::connection::ConnId;
use crate::entities::{Channel, ChannelMembership, Connection, ServerLink, User};
use crate::error::DirectoryError;
use crate::roster::RosterEntry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub struct Directory {
    pub connections: DashMap<ConnId, Arc<Connection>>,
    pub users: DashMap<String, Arc<User>>,
    pub channels: DashMap<String, Arc<Channel>>,
    pub servers: DashMap<String, Arc<ServerLink>>,

    pub server_name: String,
    pub version: String,
    pub oper_passwd: String,
    pub motd: Option<Vec<String>>,
    pub started_at: Instant,
    /// Network roster (§6/C11), empty in standalone mode. Consulted by
    /// the PASS/SERVER registration handshake only (§9 open question:
    /// cross-server relay is out of scope).
    pub roster: Vec<RosterEntry>,

    operators: AtomicUsize,
}

/// Counters consumed by the LUSERS block (§4.C7).
pub struct Counters {
    pub registered_users: usize,
    pub operators: usize,
    pub unknown_connections: usize,
    pub channels: usize,
}

impl Directory {
    pub fn new(
        server_name: String,
        oper_passwd: String,
        motd: Option<Vec<String>>,
        roster: Vec<RosterEntry>,
    ) -> Self {
        Directory {
            connections: DashMap::new(),
            users: DashMap::new(),
            channels: DashMap::new(),
            servers: DashMap::new(),
            server_name,
            version: crate::SERVER_VERSION.to_string(),
            oper_passwd,
            motd,
            started_at: Instant::now(),
            roster,
            operators: AtomicUsize::new(0),
        }
    }

    pub fn find_roster_entry(&self, servername: &str) -> Option<&RosterEntry> {
        self.roster.iter().find(|e| e.servername == servername)
    }

    pub fn register_connection(&self, conn: Arc<Connection>) {
        self.connections.insert(conn.id, conn);
    }

    pub fn remove_connection(&self, id: ConnId) {
        self.connections.remove(&id);
    }

    pub fn nick_in_use(&self, nick: &str) -> bool {
        self.users.contains_key(&fold(nick))
    }

    pub fn get_user_by_nick(&self, nick: &str) -> Option<Arc<User>> {
        self.users.get(&fold(nick)).map(|e| e.clone())
    }

    /// Inserts a freshly-registered user, failing if the nick was claimed
    /// in the meantime (the race is possible because USER/NICK can arrive
    /// in either order while the connection was still Unknown).
    pub fn insert_user(&self, user: Arc<User>) -> Result<(), DirectoryError> {
        let key = fold(&user.nick.try_read().expect("fresh user").clone());
        match self.users.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(DirectoryError::NickInUse(user.nick.try_read().unwrap().clone()))
            }
            dashmap::mapref::entry::Entry::Vacant(v) => {
                v.insert(user);
                Ok(())
            }
        }
    }

    /// Atomically reserves `new_nick` and repoints the users table from
    /// the user's current nick to it. Fails without side effects if the
    /// new nick is already claimed by a different user.
    pub async fn rename_user(&self, user: &Arc<User>, new_nick: String) -> Result<(), DirectoryError> {
        let new_key = fold(&new_nick);
        let mut nick_guard = user.nick.write().await;
        let old_key = fold(&nick_guard);
        if old_key == new_key {
            *nick_guard = new_nick;
            return Ok(());
        }
        match self.users.entry(new_key) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(DirectoryError::NickInUse(new_nick)),
            dashmap::mapref::entry::Entry::Vacant(v) => {
                v.insert(Arc::clone(user));
                self.users.remove(&old_key);
                *nick_guard = new_nick;
                Ok(())
            }
        }
    }

    pub async fn remove_user(&self, user: &User) {
        self.connections.remove(&user.conn_id);
        let nick = user.current_nick().await;
        self.users.remove(&fold(&nick));
    }

    pub fn get_channel(&self, name: &str) -> Option<Arc<Channel>> {
        self.channels.get(&fold(name)).map(|e| e.clone())
    }

    /// Returns the channel and whether it was newly created.
    pub fn get_or_create_channel(&self, name: &str) -> (Arc<Channel>, bool) {
        let key = fold(name);
        let mut created = false;
        let channel = self
            .channels
            .entry(key)
            .or_insert_with(|| {
                created = true;
                Arc::new(Channel::new(name.to_string()))
            })
            .clone();
        (channel, created)
    }

    /// The one primitive that creates a `ChannelMembership`, keeping the
    /// dual index (§9) consistent by construction.
    pub fn add_member(&self, channel: &Arc<Channel>, user: &Arc<User>) -> Arc<ChannelMembership> {
        let membership = Arc::new(ChannelMembership::new());
        channel
            .members
            .insert(user.conn_id, (Arc::clone(user), Arc::clone(&membership)));
        user.memberships
            .insert(fold(&channel.name), (Arc::clone(channel), Arc::clone(&membership)));
        membership
    }

    /// The one primitive that destroys a membership. Destroys the channel
    /// too if that was its last member (invariant 3: no zero-member
    /// channel survives in the directory).
    pub fn remove_member(&self, channel: &Arc<Channel>, user: &Arc<User>) {
        channel.members.remove(&user.conn_id);
        user.memberships.remove(&fold(&channel.name));
        if channel.members.is_empty() {
            self.channels.remove(&fold(&channel.name));
        }
    }

    pub fn note_operator_granted(&self) {
        self.operators.fetch_add(1, Ordering::Relaxed);
    }

    pub fn note_operator_revoked(&self) {
        self.operators.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn counters(&self) -> Counters {
        Counters {
            registered_users: self.users.len(),
            operators: self.operators.load(Ordering::Relaxed),
            unknown_connections: self.connections.len().saturating_sub(self.users.len()),
            channels: self.channels.len(),
        }
    }
}
