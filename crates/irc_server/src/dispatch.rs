//! Command dispatch (§4.C6): maps an upcased command verb to a handler,
//! enforces the registration gate (ERR_NOTREGISTERED, 451) for every verb
//! except the ones that must work before registration completes, and
//! routes MODE to its channel- or user-mode handler based on the first
//! parameter's sigil.

use crate::entities::Connection;
use crate::error::HandlerOutcome;
use crate::handlers::support::send_numeric;
use crate::handlers::{channels, messages, oper, query, registration};
use crate::message::Message;
use crate::numerics;
use crate::Directory;
use std::sync::Arc;

/// Verbs usable before registration completes (§4.C6). CAP is accepted
/// here too so IRCv3-aware clients don't get bounced before NICK/USER;
/// it otherwise falls through to the unknown-command reply below since
/// capability negotiation itself is out of scope.
fn exempt_from_registration_gate(command: &str) -> bool {
    matches!(command, "NICK" | "USER" | "PASS" | "SERVER" | "QUIT" | "PING" | "PONG" | "CAP")
}

pub async fn dispatch(dir: &Directory, conn: &Arc<Connection>, msg: Message) -> HandlerOutcome {
    let command = msg.command.as_str();

    if !exempt_from_registration_gate(command) && !conn.is_registered().await {
        send_numeric(dir, conn, numerics::ERR_NOTREGISTERED, vec!["You have not registered".to_string()]).await;
        return HandlerOutcome::Continue;
    }

    match command {
        "NICK" => registration::handle_nick(dir, conn, msg.params).await,
        "USER" => registration::handle_user(dir, conn, msg.params).await,
        "PASS" => registration::handle_pass(dir, conn, msg.params).await,
        "SERVER" => registration::handle_server(dir, conn, msg.params).await,
        "QUIT" => registration::handle_quit(dir, conn, msg.params).await,
        "PING" => registration::handle_ping(dir, conn, msg.params).await,
        "PONG" => registration::handle_pong(dir, conn, msg.params).await,

        "JOIN" => channels::handle_join(dir, conn, msg.params).await,
        "PART" => channels::handle_part(dir, conn, msg.params).await,
        "TOPIC" => channels::handle_topic(dir, conn, msg.params).await,
        "NAMES" => channels::handle_names(dir, conn, msg.params).await,
        "LIST" => channels::handle_list(dir, conn, msg.params).await,
        "MODE" => dispatch_mode(dir, conn, msg.params).await,

        "PRIVMSG" => messages::handle_privmsg(dir, conn, msg.params).await,
        "NOTICE" => messages::handle_notice(dir, conn, msg.params).await,

        "WHO" => query::handle_who(dir, conn, msg.params).await,
        "WHOIS" => query::handle_whois(dir, conn, msg.params).await,
        "LUSERS" => query::handle_lusers(dir, conn, msg.params).await,
        "MOTD" => query::handle_motd(dir, conn, msg.params).await,

        "OPER" => oper::handle_oper(dir, conn, msg.params).await,
        "AWAY" => oper::handle_away(dir, conn, msg.params).await,

        "CAP" => HandlerOutcome::Continue,

        _ => {
            send_numeric(dir, conn, numerics::ERR_UNKNOWNCOMMAND, vec![
                command.to_string(),
                "Unknown command".to_string(),
            ])
            .await;
            HandlerOutcome::Continue
        }
    }
}

async fn dispatch_mode(dir: &Directory, conn: &Arc<Connection>, params: Vec<String>) -> HandlerOutcome {
    match params.first() {
        Some(target) if target.starts_with('#') || target.starts_with('&') => {
            let channel_name = target.clone();
            channels::handle_mode_channel(dir, conn, &channel_name, params[1..].to_vec()).await
        }
        _ => oper::handle_mode_user(dir, conn, params).await,
    }
}
