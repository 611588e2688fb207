//! Registration state machine (§4.C7): NICK, USER, PASS, SERVER, QUIT,
//! PING, PONG.

use crate::entities::connection::{ConnState, PendingRegistration};
use crate::entities::{Channel, Connection, ServerLink, User};
use crate::error::HandlerOutcome;
use crate::handlers::support::{lusers_block, motd_block, send_numeric, send_to_conn};
use crate::message::Message;
use crate::numerics;
use crate::reply;
use crate::Directory;
use std::sync::Arc;

pub async fn handle_nick(dir: &Directory, conn: &Arc<Connection>, params: Vec<String>) -> HandlerOutcome {
    let Some(new_nick) = params.first().cloned() else {
        send_numeric(dir, conn, numerics::ERR_NONICKNAMEGIVEN, vec!["No nickname given".to_string()]).await;
        return HandlerOutcome::Continue;
    };

    if let Some(user) = conn.as_user().await {
        if !crate::casefold::eq(&user.current_nick().await, &new_nick) && dir.nick_in_use(&new_nick) {
            send_numeric(
                dir,
                conn,
                numerics::ERR_NICKNAMEINUSE,
                vec![new_nick, "Nickname is already in use".to_string()],
            )
            .await;
            return HandlerOutcome::Continue;
        }
        let old_prefix = user.prefix().await;
        match dir.rename_user(&user, new_nick.clone()).await {
            Ok(()) => {
                let nick_line = Message::new("NICK", vec![new_nick])
                    .with_prefix(old_prefix)
                    .render();
                user.send_line(nick_line.clone()).await;

                let mut seen = std::collections::HashSet::new();
                for entry in user.memberships.iter() {
                    let channel = entry.value().0.clone();
                    for member in channel.members.iter() {
                        let (other, _) = member.value();
                        if other.conn_id != user.conn_id && seen.insert(other.conn_id) {
                            other.send_line(nick_line.clone()).await;
                        }
                    }
                }
            }
            Err(_) => {
                send_numeric(
                    dir,
                    conn,
                    numerics::ERR_NICKNAMEINUSE,
                    vec!["Nickname is already in use".to_string()],
                )
                .await;
            }
        }
        return HandlerOutcome::Continue;
    }

    if dir.nick_in_use(&new_nick) {
        send_numeric(
            dir,
            conn,
            numerics::ERR_NICKNAMEINUSE,
            vec![new_nick, "Nickname is already in use".to_string()],
        )
        .await;
        return HandlerOutcome::Continue;
    }

    let pending = {
        let mut state = conn.state.write().await;
        match &mut *state {
            ConnState::Unknown(pending) => {
                pending.nick = Some(new_nick);
                Some(pending.clone())
            }
            _ => None,
        }
    };
    if let Some(pending) = pending {
        maybe_complete_registration(dir, conn, pending).await;
    }
    HandlerOutcome::Continue
}

pub async fn handle_user(dir: &Directory, conn: &Arc<Connection>, params: Vec<String>) -> HandlerOutcome {
    if params.len() < 4 {
        send_numeric(
            dir,
            conn,
            numerics::ERR_NEEDMOREPARAMS,
            vec!["USER".to_string(), "Not enough parameters".to_string()],
        )
        .await;
        return HandlerOutcome::Continue;
    }
    if conn.as_user().await.is_some() {
        send_numeric(
            dir,
            conn,
            numerics::ERR_ALREADYREGISTRED,
            vec!["Unauthorized command (already registered)".to_string()],
        )
        .await;
        return HandlerOutcome::Continue;
    }

    let pending = {
        let mut state = conn.state.write().await;
        match &mut *state {
            ConnState::Unknown(pending) => {
                pending.user = Some((params[0].clone(), params[1].clone(), params[3].clone()));
                Some(pending.clone())
            }
            _ => None,
        }
    };
    if let Some(pending) = pending {
        maybe_complete_registration(dir, conn, pending).await;
    }
    HandlerOutcome::Continue
}

async fn maybe_complete_registration(dir: &Directory, conn: &Arc<Connection>, pending: PendingRegistration) {
    let (Some(nick), Some((username, _mode, fullname))) = (pending.nick.clone(), pending.user.clone()) else {
        return;
    };

    if dir.nick_in_use(&nick) {
        send_numeric(
            dir,
            conn,
            numerics::ERR_NICKNAMEINUSE,
            vec![nick, "Nickname is already in use".to_string()],
        )
        .await;
        let mut state = conn.state.write().await;
        if let ConnState::Unknown(p) = &mut *state {
            p.nick = None;
        }
        return;
    }

    let hostname = conn.addr.ip().to_string();
    let user = Arc::new(User::new(
        conn.id,
        nick,
        username,
        fullname,
        hostname,
        conn.outbound.clone(),
        conn.disconnect.clone(),
    ));

    if dir.insert_user(Arc::clone(&user)).is_err() {
        send_numeric(
            dir,
            conn,
            numerics::ERR_NICKNAMEINUSE,
            vec!["Nickname is already in use".to_string()],
        )
        .await;
        return;
    }

    *conn.state.write().await = ConnState::User(Arc::clone(&user));
    send_welcome_sequence(dir, conn, &user).await;
}

async fn send_welcome_sequence(dir: &Directory, conn: &Connection, user: &User) {
    let nick = user.current_nick().await;
    let lines = [
        reply::numeric(
            &dir.server_name,
            &nick,
            numerics::RPL_WELCOME,
            vec![format!(
                "Welcome to the Internet Relay Network {}!{}@{}",
                nick, user.username, user.hostname
            )],
        )
        .render(),
        reply::numeric(
            &dir.server_name,
            &nick,
            numerics::RPL_YOURHOST,
            vec![format!(
                "Your host is {}, running version {}",
                dir.server_name, dir.version
            )],
        )
        .render(),
        reply::numeric(
            &dir.server_name,
            &nick,
            numerics::RPL_CREATED,
            vec![format!("This server was created {:?}", dir.started_at)],
        )
        .render(),
        reply::numeric(
            &dir.server_name,
            &nick,
            numerics::RPL_MYINFO,
            vec![
                dir.server_name.clone(),
                dir.version.clone(),
                crate::USER_MODES.to_string(),
                crate::CHANNEL_MODES.to_string(),
            ],
        )
        .render(),
    ];
    for line in lines {
        send_to_conn(conn, line).await;
    }
    for line in lusers_block(dir, conn).await {
        send_to_conn(conn, line).await;
    }
    for line in motd_block(dir, conn).await {
        send_to_conn(conn, line).await;
    }
}

pub async fn handle_pass(_dir: &Directory, conn: &Arc<Connection>, params: Vec<String>) -> HandlerOutcome {
    let mut state = conn.state.write().await;
    if let ConnState::Unknown(pending) = &mut *state {
        pending.pass = params.into_iter().next();
    }
    HandlerOutcome::Continue
}

pub async fn handle_server(dir: &Directory, conn: &Arc<Connection>, params: Vec<String>) -> HandlerOutcome {
    let Some(servername) = params.first().cloned() else {
        send_numeric(
            dir,
            conn,
            numerics::ERR_NEEDMOREPARAMS,
            vec!["SERVER".to_string(), "Not enough parameters".to_string()],
        )
        .await;
        return HandlerOutcome::Continue;
    };

    let pass = {
        let state = conn.state.read().await;
        match &*state {
            ConnState::Unknown(p) => p.pass.clone(),
            _ => None,
        }
    };

    let Some(entry) = dir.find_roster_entry(&servername).cloned() else {
        send_numeric(dir, conn, numerics::ERR_PASSWDMISMATCH, vec!["Password incorrect".to_string()]).await;
        return HandlerOutcome::Continue;
    };
    if pass.as_deref() != Some(entry.passwd.as_str()) {
        send_numeric(dir, conn, numerics::ERR_PASSWDMISMATCH, vec!["Password incorrect".to_string()]).await;
        return HandlerOutcome::Continue;
    }

    let link = Arc::new(ServerLink::new(
        entry.servername.clone(),
        entry.host.clone(),
        entry.port,
        entry.passwd.clone(),
    ));
    link.set_registered(true);
    dir.servers.insert(entry.servername.clone(), Arc::clone(&link));
    *conn.state.write().await = ConnState::Server(link);
    HandlerOutcome::Continue
}

pub async fn handle_quit(_dir: &Directory, _conn: &Arc<Connection>, params: Vec<String>) -> HandlerOutcome {
    let reason = params.into_iter().next().unwrap_or_else(|| "Client Quit".to_string());
    HandlerOutcome::Disconnect { reason }
}

pub async fn handle_ping(dir: &Directory, conn: &Arc<Connection>, params: Vec<String>) -> HandlerOutcome {
    let token = params.into_iter().next().unwrap_or_default();
    let reply = Message::new("PONG", vec![dir.server_name.clone(), token])
        .with_prefix(dir.server_name.clone())
        .force_trailing();
    send_to_conn(conn, reply.render()).await;
    HandlerOutcome::Continue
}

pub async fn handle_pong(_dir: &Directory, _conn: &Arc<Connection>, _params: Vec<String>) -> HandlerOutcome {
    HandlerOutcome::Continue
}

/// Teardown (§4.C5 step 5): synthesizes the QUIT fan-out, removes every
/// membership (destroying empty channels), and drops the user/connection
/// from the directory. Idempotent-by-construction since it is only ever
/// invoked once per connection by the worker.
pub async fn teardown(dir: &Directory, conn: &Connection, reason: &str) {
    if let Some(user) = conn.as_user().await {
        let prefix = user.prefix().await;
        let quit_line = Message::new("QUIT", vec![reason.to_string()])
            .with_prefix(prefix)
            .render();
        let channels: Vec<Arc<Channel>> = user.memberships.iter().map(|e| e.value().0.clone()).collect();
        for channel in &channels {
            crate::handlers::support::broadcast_to_channel(channel, quit_line.clone(), Some(user.conn_id)).await;
            dir.remove_member(channel, &user);
        }
        dir.remove_user(&user).await;
    } else {
        dir.remove_connection(conn.id);
    }
}
