//! Channel operations (§4.C7): JOIN, PART, channel-form MODE, TOPIC,
//! LIST, NAMES.

use crate::entities::{Channel, Connection, User};
use crate::error::HandlerOutcome;
use crate::handlers::support::{broadcast_to_channel, current_target, send_numeric, send_to_conn};
use crate::message::Message;
use crate::numerics;
use crate::reply;
use crate::Directory;
use std::sync::Arc;

fn is_channel_name(name: &str) -> bool {
    name.starts_with('#') || name.starts_with('&')
}

async fn names_reply(dir: &Directory, conn: &Connection, channel: &Channel) -> Vec<String> {
    let target = current_target(conn).await;
    let mut names = Vec::new();
    for entry in channel.members.iter() {
        let (member, membership) = entry.value();
        let modes = membership.modes.lock().await;
        let nick = member.current_nick().await;
        if modes.has('o') {
            names.push(format!("@{nick}"));
        } else if modes.has('v') {
            names.push(format!("+{nick}"));
        } else {
            names.push(nick);
        }
    }
    vec![
        reply::numeric(
            &dir.server_name,
            &target,
            numerics::RPL_NAMREPLY,
            vec!["=".to_string(), channel.name.clone(), names.join(" ")],
        )
        .render(),
        reply::numeric(
            &dir.server_name,
            &target,
            numerics::RPL_ENDOFNAMES,
            vec![channel.name.clone(), "End of NAMES list".to_string()],
        )
        .render(),
    ]
}

async fn topic_reply(dir: &Directory, conn: &Connection, channel: &Channel) -> String {
    let target = current_target(conn).await;
    match &*channel.topic.read().await {
        Some(topic) => reply::numeric(
            &dir.server_name,
            &target,
            numerics::RPL_TOPIC,
            vec![channel.name.clone(), topic.clone()],
        )
        .render(),
        None => reply::numeric(
            &dir.server_name,
            &target,
            numerics::RPL_NOTOPIC,
            vec![channel.name.clone(), "No topic is set".to_string()],
        )
        .render(),
    }
}

pub async fn handle_join(dir: &Directory, conn: &Arc<Connection>, params: Vec<String>) -> HandlerOutcome {
    let Some(user) = conn.as_user().await else {
        return HandlerOutcome::Continue;
    };
    let Some(channel_list) = params.first() else {
        send_numeric(
            dir,
            conn,
            numerics::ERR_NEEDMOREPARAMS,
            vec!["JOIN".to_string(), "Not enough parameters".to_string()],
        )
        .await;
        return HandlerOutcome::Continue;
    };

    for name in channel_list.split(',') {
        if !is_channel_name(name) {
            send_numeric(
                dir,
                conn,
                numerics::ERR_NOSUCHCHANNEL,
                vec![name.to_string(), "No such channel".to_string()],
            )
            .await;
            continue;
        }
        let (channel, created) = dir.get_or_create_channel(name);
        if channel.is_member(user.conn_id) {
            continue;
        }
        let membership = dir.add_member(&channel, &user);
        if created {
            membership.modes.lock().await.add('o');
        }

        let join_line = Message::new("JOIN", vec![channel.name.clone()])
            .with_prefix(user.prefix().await)
            .render();
        broadcast_to_channel(&channel, join_line, None).await;

        send_to_conn(conn, topic_reply(dir, conn, &channel).await).await;
        for line in names_reply(dir, conn, &channel).await {
            send_to_conn(conn, line).await;
        }
    }
    HandlerOutcome::Continue
}

pub async fn handle_part(dir: &Directory, conn: &Arc<Connection>, params: Vec<String>) -> HandlerOutcome {
    let Some(user) = conn.as_user().await else {
        return HandlerOutcome::Continue;
    };
    let Some(channel_list) = params.first() else {
        send_numeric(
            dir,
            conn,
            numerics::ERR_NEEDMOREPARAMS,
            vec!["PART".to_string(), "Not enough parameters".to_string()],
        )
        .await;
        return HandlerOutcome::Continue;
    };
    let reason = params.get(1).cloned();

    for name in channel_list.split(',') {
        let Some(channel) = dir.get_channel(name) else {
            send_numeric(
                dir,
                conn,
                numerics::ERR_NOTONCHANNEL,
                vec![name.to_string(), "You're not on that channel".to_string()],
            )
            .await;
            continue;
        };
        if !channel.is_member(user.conn_id) {
            send_numeric(
                dir,
                conn,
                numerics::ERR_NOTONCHANNEL,
                vec![name.to_string(), "You're not on that channel".to_string()],
            )
            .await;
            continue;
        }
        let mut part_params = vec![channel.name.clone()];
        if let Some(reason) = &reason {
            part_params.push(reason.clone());
        }
        let part_line = Message::new("PART", part_params)
            .with_prefix(user.prefix().await)
            .render();
        broadcast_to_channel(&channel, part_line, None).await;
        dir.remove_member(&channel, &user);
    }
    HandlerOutcome::Continue
}

pub async fn handle_topic(dir: &Directory, conn: &Arc<Connection>, params: Vec<String>) -> HandlerOutcome {
    let Some(user) = conn.as_user().await else {
        return HandlerOutcome::Continue;
    };
    let Some(name) = params.first() else {
        send_numeric(
            dir,
            conn,
            numerics::ERR_NEEDMOREPARAMS,
            vec!["TOPIC".to_string(), "Not enough parameters".to_string()],
        )
        .await;
        return HandlerOutcome::Continue;
    };
    let Some(channel) = dir.get_channel(name) else {
        send_numeric(dir, conn, numerics::ERR_NOSUCHCHANNEL, vec![name.to_string(), "No such channel".to_string()])
            .await;
        return HandlerOutcome::Continue;
    };

    match params.get(1) {
        None => {
            send_to_conn(conn, topic_reply(dir, conn, &channel).await).await;
        }
        Some(text) => {
            if channel.modes.lock().await.has('t') && !sender_is_op(&user, &channel.name).await {
                send_numeric(
                    dir,
                    conn,
                    numerics::ERR_CHANOPRIVSNEEDED,
                    vec![channel.name.clone(), "You're not channel operator".to_string()],
                )
                .await;
                return HandlerOutcome::Continue;
            }
            *channel.topic.write().await = Some(text.clone());
            let line = Message::new("TOPIC", vec![channel.name.clone(), text.clone()])
                .with_prefix(user.prefix().await)
                .render();
            broadcast_to_channel(&channel, line, None).await;
        }
    }
    HandlerOutcome::Continue
}

async fn sender_is_op(user: &User, channel_name: &str) -> bool {
    match user.memberships.get(&crate::casefold::fold(channel_name)) {
        Some(entry) => entry.value().1.modes.lock().await.has('o'),
        None => false,
    }
}

pub async fn handle_names(dir: &Directory, conn: &Arc<Connection>, params: Vec<String>) -> HandlerOutcome {
    let names: Vec<String> = match params.first() {
        Some(list) => list.split(',').map(str::to_string).collect(),
        None => dir.channels.iter().map(|e| e.value().name.clone()).collect(),
    };
    for name in names {
        if let Some(channel) = dir.get_channel(&name) {
            for line in names_reply(dir, conn, &channel).await {
                send_to_conn(conn, line).await;
            }
        }
    }
    HandlerOutcome::Continue
}

pub async fn handle_list(dir: &Directory, conn: &Arc<Connection>, params: Vec<String>) -> HandlerOutcome {
    let target = current_target(conn).await;
    let wanted: Option<Vec<String>> = params.first().map(|l| l.split(',').map(str::to_string).collect());
    for entry in dir.channels.iter() {
        let channel = entry.value();
        if let Some(wanted) = &wanted
            && !wanted.iter().any(|w| crate::casefold::eq(w, &channel.name))
        {
            continue;
        }
        let topic = channel.topic.read().await.clone().unwrap_or_default();
        send_to_conn(
            conn,
            reply::numeric(
                &dir.server_name,
                &target,
                numerics::RPL_LIST,
                vec![channel.name.clone(), channel.member_count().to_string(), topic],
            )
            .render(),
        )
        .await;
    }
    send_to_conn(
        conn,
        reply::numeric(&dir.server_name, &target, numerics::RPL_LISTEND, vec!["End of LIST".to_string()]).render(),
    )
    .await;
    HandlerOutcome::Continue
}

pub async fn handle_mode_channel(
    dir: &Directory,
    conn: &Arc<Connection>,
    channel_name: &str,
    params: Vec<String>,
) -> HandlerOutcome {
    let Some(user) = conn.as_user().await else {
        return HandlerOutcome::Continue;
    };
    let Some(channel) = dir.get_channel(channel_name) else {
        send_numeric(
            dir,
            conn,
            numerics::ERR_NOSUCHCHANNEL,
            vec![channel_name.to_string(), "No such channel".to_string()],
        )
        .await;
        return HandlerOutcome::Continue;
    };

    let Some(flags) = params.first() else {
        let modes = channel.modes.lock().await.as_plus_string();
        send_to_conn(
            conn,
            reply::numeric(&dir.server_name, &current_target(conn).await, numerics::RPL_CHANNELMODEIS, vec![
                channel.name.clone(),
                modes,
            ])
            .render(),
        )
        .await;
        return HandlerOutcome::Continue;
    };

    if !sender_is_op(&user, &channel.name).await {
        send_numeric(
            dir,
            conn,
            numerics::ERR_CHANOPRIVSNEEDED,
            vec![channel.name.clone(), "You're not channel operator".to_string()],
        )
        .await;
        return HandlerOutcome::Continue;
    }

    let mut arg_idx = 1;
    let mut applied: Vec<(bool, char, Option<String>)> = Vec::new();
    let mut adding = true;
    for flag in flags.chars() {
        match flag {
            '+' => adding = true,
            '-' => adding = false,
            'm' | 't' => {
                let changed = if adding {
                    channel.modes.lock().await.add(flag)
                } else {
                    channel.modes.lock().await.remove(flag)
                };
                if changed {
                    applied.push((adding, flag, None));
                }
            }
            'o' | 'v' => {
                let Some(target_nick) = params.get(arg_idx).cloned() else {
                    send_numeric(
                        dir,
                        conn,
                        numerics::ERR_NEEDMOREPARAMS,
                        vec!["MODE".to_string(), "Not enough parameters".to_string()],
                    )
                    .await;
                    continue;
                };
                arg_idx += 1;
                let Some(target_user) = dir.get_user_by_nick(&target_nick) else {
                    send_numeric(
                        dir,
                        conn,
                        numerics::ERR_NOSUCHNICK,
                        vec![target_nick, "No such nick/channel".to_string()],
                    )
                    .await;
                    continue;
                };
                let Some(entry) = channel.members.get(&target_user.conn_id) else {
                    send_numeric(
                        dir,
                        conn,
                        numerics::ERR_USERNOTINCHANNEL,
                        vec![target_nick, channel.name.clone(), "They aren't on that channel".to_string()],
                    )
                    .await;
                    continue;
                };
                let membership = entry.value().1.clone();
                let changed = if adding {
                    membership.modes.lock().await.add(flag)
                } else {
                    membership.modes.lock().await.remove(flag)
                };
                if changed {
                    applied.push((adding, flag, Some(target_nick)));
                }
            }
            other => {
                send_numeric(dir, conn, numerics::ERR_UNKNOWNMODE, vec![other.to_string(), "is unknown mode char to me".to_string()])
                    .await;
            }
        }
    }

    for (adding, flag, arg) in applied {
        let sign = if adding { '+' } else { '-' };
        let mut mode_params = vec![channel.name.clone(), format!("{sign}{flag}")];
        if let Some(arg) = arg {
            mode_params.push(arg);
        }
        let line = Message::new("MODE", mode_params).with_prefix(user.prefix().await).render();
        broadcast_to_channel(&channel, line, None).await;
    }
    HandlerOutcome::Continue
}
