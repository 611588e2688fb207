//! OPER, AWAY, and the user-mode form of MODE (§4.C7). A user may only
//! ever remove their own `o` flag, never grant it to themself or touch
//! another user's modes (ERR_USERSDONTMATCH, 502); granting `o` happens
//! only through OPER.

use crate::entities::Connection;
use crate::error::HandlerOutcome;
use crate::handlers::support::send_numeric;
use crate::message::Message;
use crate::numerics;
use crate::Directory;
use std::sync::Arc;

pub async fn handle_oper(dir: &Directory, conn: &Arc<Connection>, params: Vec<String>) -> HandlerOutcome {
    let Some(user) = conn.as_user().await else {
        return HandlerOutcome::Continue;
    };
    if params.len() < 2 {
        send_numeric(
            dir,
            conn,
            numerics::ERR_NEEDMOREPARAMS,
            vec!["OPER".to_string(), "Not enough parameters".to_string()],
        )
        .await;
        return HandlerOutcome::Continue;
    }
    if params[1] != dir.oper_passwd {
        send_numeric(dir, conn, numerics::ERR_PASSWDMISMATCH, vec!["Password incorrect".to_string()]).await;
        return HandlerOutcome::Continue;
    }
    let newly_granted = user.modes.lock().await.add('o');
    if newly_granted {
        dir.note_operator_granted();
    }
    send_numeric(dir, conn, numerics::RPL_YOUREOPER, vec!["You are now an IRC operator".to_string()]).await;
    HandlerOutcome::Continue
}

pub async fn handle_away(dir: &Directory, conn: &Arc<Connection>, params: Vec<String>) -> HandlerOutcome {
    let Some(user) = conn.as_user().await else {
        return HandlerOutcome::Continue;
    };
    match params.into_iter().next() {
        Some(msg) if !msg.is_empty() => {
            *user.awaymsg.lock().await = Some(msg);
            send_numeric(dir, conn, numerics::RPL_NOWAWAY, vec!["You have been marked as being away".to_string()])
                .await;
        }
        _ => {
            *user.awaymsg.lock().await = None;
            send_numeric(dir, conn, numerics::RPL_UNAWAY, vec!["You are no longer marked as being away".to_string()])
                .await;
        }
    }
    HandlerOutcome::Continue
}

pub async fn handle_mode_user(dir: &Directory, conn: &Arc<Connection>, params: Vec<String>) -> HandlerOutcome {
    let Some(user) = conn.as_user().await else {
        return HandlerOutcome::Continue;
    };
    let target_nick = params.first().cloned().unwrap_or_default();
    if !crate::casefold::eq(&target_nick, &user.current_nick().await) {
        send_numeric(dir, conn, numerics::ERR_USERSDONTMATCH, vec!["Cannot change mode for other users".to_string()])
            .await;
        return HandlerOutcome::Continue;
    }
    let Some(flags) = params.get(1) else {
        let modes = user.modes.lock().await.as_plus_string();
        send_numeric(dir, conn, numerics::RPL_UMODEIS, vec![modes]).await;
        return HandlerOutcome::Continue;
    };

    let mut adding = true;
    let mut applied = Vec::new();
    for flag in flags.chars() {
        match flag {
            '+' => adding = true,
            '-' => adding = false,
            'o' => {
                if adding {
                    send_numeric(dir, conn, numerics::ERR_UMODEUNKNOWNFLAG, vec!["Unknown MODE flag".to_string()])
                        .await;
                    continue;
                }
                if user.modes.lock().await.remove('o') {
                    dir.note_operator_revoked();
                    applied.push((false, 'o'));
                }
            }
            'a' => {
                let changed =
                    if adding { user.modes.lock().await.add('a') } else { user.modes.lock().await.remove('a') };
                if changed {
                    applied.push((adding, 'a'));
                }
            }
            _ => {
                send_numeric(dir, conn, numerics::ERR_UMODEUNKNOWNFLAG, vec!["Unknown MODE flag".to_string()]).await;
            }
        }
    }

    for (adding, flag) in applied {
        let sign = if adding { '+' } else { '-' };
        let line = Message::new("MODE", vec![target_nick.clone(), format!("{sign}{flag}")])
            .with_prefix(user.prefix().await)
            .render();
        user.send_line(line).await;
    }
    HandlerOutcome::Continue
}
