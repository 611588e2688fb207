//! PRIVMSG and NOTICE (§4.C7): resolve the target (nick or channel),
//! check moderation/voice, and deliver. NOTICE never generates an error
//! reply back to the sender.

use crate::entities::Connection;
use crate::error::HandlerOutcome;
use crate::handlers::support::{broadcast_to_channel, send_numeric, send_to_conn};
use crate::message::Message;
use crate::numerics;
use crate::reply;
use crate::Directory;
use std::sync::Arc;

async fn send_message(
    dir: &Directory,
    conn: &Arc<Connection>,
    params: Vec<String>,
    command: &str,
    is_notice: bool,
) -> HandlerOutcome {
    let Some(user) = conn.as_user().await else {
        return HandlerOutcome::Continue;
    };

    let mut iter = params.into_iter();
    let (Some(target), Some(text)) = (iter.next(), iter.next()) else {
        if !is_notice {
            send_numeric(
                dir,
                conn,
                numerics::ERR_NEEDMOREPARAMS,
                vec![command.to_string(), "Not enough parameters".to_string()],
            )
            .await;
        }
        return HandlerOutcome::Continue;
    };

    let prefix = user.prefix().await;
    let line = Message::new(command, vec![target.clone(), text]).with_prefix(prefix).render();

    if target.starts_with('#') || target.starts_with('&') {
        let Some(channel) = dir.get_channel(&target) else {
            if !is_notice {
                send_numeric(dir, conn, numerics::ERR_NOSUCHCHANNEL, vec![target, "No such channel".to_string()])
                    .await;
            }
            return HandlerOutcome::Continue;
        };
        let moderated = channel.modes.lock().await.has('m');
        if moderated {
            let has_voice = match channel.members.get(&user.conn_id) {
                Some(entry) => {
                    let modes = entry.value().1.modes.lock().await;
                    modes.has('o') || modes.has('v')
                }
                None => false,
            };
            if !has_voice {
                if !is_notice {
                    send_numeric(
                        dir,
                        conn,
                        numerics::ERR_CANNOTSENDTOCHAN,
                        vec![target, "Cannot send to channel".to_string()],
                    )
                    .await;
                }
                return HandlerOutcome::Continue;
            }
        }
        broadcast_to_channel(&channel, line, Some(user.conn_id)).await;
    } else {
        let Some(recipient) = dir.get_user_by_nick(&target) else {
            if !is_notice {
                send_numeric(dir, conn, numerics::ERR_NOSUCHNICK, vec![target, "No such nick/channel".to_string()])
                    .await;
            }
            return HandlerOutcome::Continue;
        };
        let away = recipient.awaymsg.lock().await.clone();
        recipient.send_line(line).await;
        if let Some(away) = away
            && !is_notice
        {
            send_to_conn(
                conn,
                reply::numeric(&dir.server_name, &user.current_nick().await, numerics::RPL_AWAY, vec![target, away])
                    .render(),
            )
            .await;
        }
    }
    HandlerOutcome::Continue
}

pub async fn handle_privmsg(dir: &Directory, conn: &Arc<Connection>, params: Vec<String>) -> HandlerOutcome {
    send_message(dir, conn, params, "PRIVMSG", false).await
}

pub async fn handle_notice(dir: &Directory, conn: &Arc<Connection>, params: Vec<String>) -> HandlerOutcome {
    send_message(dir, conn, params, "NOTICE", true).await
}
