//! Read-only query commands (§4.C7): WHO, WHOIS, LUSERS, MOTD. LUSERS and
//! MOTD just replay the numeric blocks shared with the welcome sequence.

use crate::entities::Connection;
use crate::error::HandlerOutcome;
use crate::handlers::support::{current_target, lusers_block, motd_block, send_numeric, send_to_conn};
use crate::numerics;
use crate::reply;
use crate::Directory;
use std::sync::Arc;

pub async fn handle_lusers(dir: &Directory, conn: &Arc<Connection>, _params: Vec<String>) -> HandlerOutcome {
    for line in lusers_block(dir, conn).await {
        send_to_conn(conn, line).await;
    }
    HandlerOutcome::Continue
}

pub async fn handle_motd(dir: &Directory, conn: &Arc<Connection>, _params: Vec<String>) -> HandlerOutcome {
    for line in motd_block(dir, conn).await {
        send_to_conn(conn, line).await;
    }
    HandlerOutcome::Continue
}

pub async fn handle_whois(dir: &Directory, conn: &Arc<Connection>, params: Vec<String>) -> HandlerOutcome {
    let Some(nick) = params.first() else {
        send_numeric(
            dir,
            conn,
            numerics::ERR_NEEDMOREPARAMS,
            vec!["WHOIS".to_string(), "Not enough parameters".to_string()],
        )
        .await;
        return HandlerOutcome::Continue;
    };
    let Some(target_user) = dir.get_user_by_nick(nick) else {
        send_numeric(dir, conn, numerics::ERR_NOSUCHNICK, vec![nick.clone(), "No such nick/channel".to_string()])
            .await;
        return HandlerOutcome::Continue;
    };

    let me = current_target(conn).await;
    let target_nick = target_user.current_nick().await;
    send_to_conn(
        conn,
        reply::numeric(&dir.server_name, &me, numerics::RPL_WHOISUSER, vec![
            target_nick.clone(),
            target_user.username.clone(),
            target_user.hostname.clone(),
            "*".to_string(),
            target_user.fullname.clone(),
        ])
        .render(),
    )
    .await;
    send_to_conn(
        conn,
        reply::numeric(&dir.server_name, &me, numerics::RPL_WHOISSERVER, vec![
            target_nick.clone(),
            dir.server_name.clone(),
            "IRC server".to_string(),
        ])
        .render(),
    )
    .await;
    if target_user.modes.lock().await.has('o') {
        send_to_conn(
            conn,
            reply::numeric(&dir.server_name, &me, numerics::RPL_WHOISOPERATOR, vec![
                target_nick.clone(),
                "is an IRC operator".to_string(),
            ])
            .render(),
        )
        .await;
    }
    let channels: Vec<String> = target_user
        .memberships
        .iter()
        .map(|e| e.value().0.name.clone())
        .collect();
    if !channels.is_empty() {
        send_to_conn(
            conn,
            reply::numeric(&dir.server_name, &me, numerics::RPL_WHOISCHANNELS, vec![
                target_nick.clone(),
                channels.join(" "),
            ])
            .render(),
        )
        .await;
    }
    send_to_conn(
        conn,
        reply::numeric(&dir.server_name, &me, numerics::RPL_ENDOFWHOIS, vec![
            target_nick,
            "End of WHOIS list".to_string(),
        ])
        .render(),
    )
    .await;
    HandlerOutcome::Continue
}

pub async fn handle_who(dir: &Directory, conn: &Arc<Connection>, params: Vec<String>) -> HandlerOutcome {
    let me = current_target(conn).await;
    let mask = params.first().cloned();

    let users: Vec<Arc<crate::entities::User>> = match &mask {
        Some(name) if name.starts_with('#') || name.starts_with('&') => match dir.get_channel(name) {
            Some(channel) => channel.members.iter().map(|e| e.value().0.clone()).collect(),
            None => Vec::new(),
        },
        _ => dir.users.iter().map(|e| e.value().clone()).collect(),
    };

    for user in &users {
        let nick = user.current_nick().await;
        if let Some(mask) = &mask
            && !(mask.starts_with('#') || mask.starts_with('&') || crate::casefold::eq(mask, &nick))
        {
            continue;
        }
        let channel_name = user
            .memberships
            .iter()
            .next()
            .map(|e| e.value().0.name.clone())
            .unwrap_or_else(|| "*".to_string());
        send_to_conn(
            conn,
            reply::numeric(&dir.server_name, &me, numerics::RPL_WHOREPLY, vec![
                channel_name,
                user.username.clone(),
                user.hostname.clone(),
                dir.server_name.clone(),
                nick,
                "H".to_string(),
                format!("0 {}", user.fullname),
            ])
            .render(),
        )
        .await;
    }
    send_to_conn(
        conn,
        reply::numeric(&dir.server_name, &me, numerics::RPL_ENDOFWHO, vec![
            mask.unwrap_or_else(|| "*".to_string()),
            "End of WHO list".to_string(),
        ])
        .render(),
    )
    .await;
    HandlerOutcome::Continue
}
