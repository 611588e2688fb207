pub mod channel;
pub mod connection;
pub mod server_link;
pub mod user;

pub use channel::{Channel, ChannelMembership};
pub use connection::{Connection, ConnState, ConnId, PendingRegistration};
pub use server_link::ServerLink;
pub use user::User;
