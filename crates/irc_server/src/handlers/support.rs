//! Shared helpers used across handler groups: numeric replies to a
//! connection, fan-out to a channel's members, and the LUSERS/MOTD
//! numeric blocks (shared between the welcome sequence and the standalone
//! LUSERS/MOTD commands per §4.C7).

use crate::entities::{Channel, Connection, User};
use crate::entities::connection::ConnId;
use crate::numerics;
use crate::reply;
use crate::Directory;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;

/// Non-blocking send (§5): a full SendQ cancels the connection rather than
/// stalling whichever task (possibly another connection's handler) is
/// trying to deliver to it.
pub async fn send_to_conn(conn: &Connection, line: String) {
    match conn.outbound.try_send(line) {
        Ok(()) | Err(TrySendError::Closed(_)) => {}
        Err(TrySendError::Full(_)) => conn.disconnect.request("SendQ exceeded"),
    }
}

pub async fn send_numeric(dir: &Directory, conn: &Connection, code: &str, params: Vec<String>) {
    let target = current_target(conn).await;
    let msg = reply::numeric(&dir.server_name, &target, code, params);
    send_to_conn(conn, msg.render()).await;
}

/// The recipient slot of §4.C8: current nick if registered, else `*`.
pub async fn current_target(conn: &Connection) -> String {
    match conn.as_user().await {
        Some(user) => user.current_nick().await,
        None => "*".to_string(),
    }
}

/// Sends one rendered line to every current member of `channel`, skipping
/// `except` if given. Fan-out races with JOIN/PART are ruled out because
/// the caller holds the membership lookup (a `DashMap` shard lock) for
/// the duration of this loop — see SPEC_FULL.md §5.
pub async fn broadcast_to_channel(channel: &Channel, line: String, except: Option<ConnId>) {
    for entry in channel.members.iter() {
        let (user, _membership) = entry.value();
        if Some(user.conn_id) == except {
            continue;
        }
        user.send_line(line.clone()).await;
    }
}

pub async fn lusers_block(dir: &Directory, conn: &Connection) -> Vec<String> {
    let counters = dir.counters();
    let target = current_target(conn).await;
    vec![
        reply::numeric(
            &dir.server_name,
            &target,
            numerics::RPL_LUSERCLIENT,
            vec![format!(
                "There are {} users and 0 services on 1 servers",
                counters.registered_users
            )],
        )
        .render(),
        reply::numeric(
            &dir.server_name,
            &target,
            numerics::RPL_LUSEROP,
            vec![counters.operators.to_string(), "operator(s) online".to_string()],
        )
        .render(),
        reply::numeric(
            &dir.server_name,
            &target,
            numerics::RPL_LUSERUNKNOWN,
            vec![
                counters.unknown_connections.to_string(),
                "unknown connection(s)".to_string(),
            ],
        )
        .render(),
        reply::numeric(
            &dir.server_name,
            &target,
            numerics::RPL_LUSERCHANNELS,
            vec![counters.channels.to_string(), "channels formed".to_string()],
        )
        .render(),
        reply::numeric(
            &dir.server_name,
            &target,
            numerics::RPL_LUSERME,
            vec![format!(
                "I have {} clients and 1 servers",
                counters.registered_users
            )],
        )
        .render(),
    ]
}

pub async fn motd_block(dir: &Directory, conn: &Connection) -> Vec<String> {
    let target = current_target(conn).await;
    match &dir.motd {
        Some(lines) if !lines.is_empty() => {
            let mut out = vec![reply::numeric(
                &dir.server_name,
                &target,
                numerics::RPL_MOTDSTART,
                vec![format!("- {} Message of the day - ", dir.server_name)],
            )
            .render()];
            for line in lines {
                out.push(
                    reply::numeric(
                        &dir.server_name,
                        &target,
                        numerics::RPL_MOTD,
                        vec![format!("- {line}")],
                    )
                    .render(),
                );
            }
            out.push(
                reply::numeric(
                    &dir.server_name,
                    &target,
                    numerics::RPL_ENDOFMOTD,
                    vec!["End of MOTD command".to_string()],
                )
                .render(),
            );
            out
        }
        _ => vec![
            reply::numeric(
                &dir.server_name,
                &target,
                numerics::ERR_NOMOTD,
                vec!["MOTD File is missing".to_string()],
            )
            .render(),
        ],
    }
}

/// Looks up a user's own User record and channel memberships to support
/// "does the sender hold mode X in channel Y" checks.
pub fn membership_modes(user: &User, channel_name_folded: &str) -> Option<Arc<crate::entities::ChannelMembership>> {
    user.memberships
        .get(channel_name_folded)
        .map(|e| e.value().1.clone())
}
