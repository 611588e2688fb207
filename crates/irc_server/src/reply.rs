//! Reply builder (§4.C8): every numeric reply carries prefix = this
//! server's name and first parameter = the recipient's current nick, or
//! `*` if the connection has not yet supplied one — mirroring the
//! `chirc_message_construct_reply` rule of the original implementation.

use crate::message::Message;

/// Builds one numeric reply: `:server CODE target <params...>`.
pub fn numeric(server_name: &str, target: &str, code: &str, mut params: Vec<String>) -> Message {
    let mut full = vec![target.to_string()];
    full.append(&mut params);
    Message::new(code, full).with_prefix(server_name)
}
