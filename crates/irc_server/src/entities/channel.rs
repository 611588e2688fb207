//! Channel entity (§3): created lazily on first JOIN, destroyed once its
//! membership drops to zero (§4.C4/invariant 3). Memberships are a
//! distinct jointly-owned record (§9) rather than a bare flag, so a single
//! `add_member`/`remove_member` primitive is the only code path that can
//! create or break the dual index.

use crate::entities::connection::ConnId;
use crate::entities::User;
use crate::modeset::ModeSet;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Per-membership modes over {o, v} (§3).
pub struct ChannelMembership {
    pub modes: Mutex<ModeSet>,
}

impl Default for ChannelMembership {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelMembership {
    pub fn new() -> Self {
        ChannelMembership {
            modes: Mutex::new(ModeSet::new()),
        }
    }
}

pub struct Channel {
    /// Display-case name as first seen; lookups always fold it.
    pub name: String,
    pub topic: RwLock<Option<String>>,
    pub modes: Mutex<ModeSet>,
    /// Keyed by the member's stable connection id, independent of nick.
    pub members: DashMap<ConnId, (Arc<User>, Arc<ChannelMembership>)>,
}

impl Channel {
    pub fn new(name: String) -> Self {
        Channel {
            name,
            topic: RwLock::new(None),
            modes: Mutex::new(ModeSet::new()),
            members: DashMap::new(),
        }
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_member(&self, conn_id: ConnId) -> bool {
        self.members.contains_key(&conn_id)
    }
}
