//! ServerLink entity (§3). In standalone mode exactly one exists,
//! representing this node; in network mode one per roster entry.

use std::sync::atomic::{AtomicBool, Ordering};

pub struct ServerLink {
    pub servername: String,
    pub hostname: String,
    pub port: u16,
    pub passwd: String,
    registered: AtomicBool,
}

impl ServerLink {
    pub fn new(servername: String, hostname: String, port: u16, passwd: String) -> Self {
        ServerLink {
            servername,
            hostname,
            port,
            passwd,
            registered: AtomicBool::new(false),
        }
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    pub fn set_registered(&self, value: bool) {
        self.registered.store(value, Ordering::SeqCst);
    }
}
