pub const SERVER_VERSION: &str = "ircd-rs-1.0";
/// Supported user modes (§3 Non-goals restrict these to exactly this set).
pub const USER_MODES: &str = "ao";
/// Supported channel modes.
pub const CHANNEL_MODES: &str = "mt";
/// Supported per-membership (channel-user) modes.
pub const CHANNEL_USER_MODES: &str = "ov";

pub mod casefold;
pub mod config;
pub mod directory;
pub mod entities;
pub mod error;
pub mod message;
pub mod modeset;
pub mod numerics;
pub mod reply;
pub mod roster;

pub mod dispatch;
pub mod handlers;

pub mod acceptor;
pub mod logging;
pub mod worker;

pub use directory::Directory;
pub use error::HandlerOutcome;
pub use message::Message;
