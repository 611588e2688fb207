//! End-to-end scenarios driving a real `TcpListener`: registration,
//! channel fan-out, moderation, multi-channel QUIT fan-out, and nick
//! collision.

use irc_server::directory::Directory;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

async fn spawn_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let dir = Arc::new(Directory::new("irc.test".to_string(), "operpass".to_string(), None, Vec::new()));
    tokio::spawn(async move {
        loop {
            let (socket, addr) = listener.accept().await.unwrap();
            let dir = Arc::clone(&dir);
            tokio::spawn(async move {
                irc_server::worker::run_connection(dir, socket, addr).await;
            });
        }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    port
}

struct Client {
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: tokio::net::tcp::OwnedWriteHalf,
}

impl Client {
    async fn connect(port: u16) -> Self {
        let socket = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let (read_half, writer) = socket.into_split();
        Client { reader: BufReader::new(read_half), writer }
    }

    async fn send(&mut self, line: &str) {
        self.writer.write_all(format!("{line}\r\n").as_bytes()).await.unwrap();
    }

    async fn recv(&mut self) -> String {
        let mut line = String::new();
        tokio::time::timeout(Duration::from_secs(2), self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for a line")
            .unwrap();
        line.trim_end().to_string()
    }

    async fn register(&mut self, nick: &str) {
        self.send(&format!("NICK {nick}")).await;
        self.send(&format!("USER {nick} 0 * :{nick} Realname")).await;
        loop {
            let line = self.recv().await;
            if line.contains(" 376 ") || line.contains(" 422 ") {
                break;
            }
        }
    }
}

#[tokio::test]
async fn registration_sends_welcome_sequence() {
    let port = spawn_server().await;
    let mut client = Client::connect(port).await;
    client.send("NICK alice").await;
    client.send("USER alice 0 * :Alice Smith").await;
    let welcome = client.recv().await;
    assert!(welcome.contains(" 001 alice "), "unexpected line: {welcome}");
}

#[tokio::test]
async fn nick_collision_is_rejected() {
    let port = spawn_server().await;
    let mut alice = Client::connect(port).await;
    alice.register("collider").await;

    let mut bob = Client::connect(port).await;
    bob.send("NICK collider").await;
    let reply = bob.recv().await;
    assert!(reply.contains(" 433 "), "expected ERR_NICKNAMEINUSE, got: {reply}");
}

#[tokio::test]
async fn join_creates_channel_and_fans_out_to_members() {
    let port = spawn_server().await;
    let mut alice = Client::connect(port).await;
    alice.register("alice").await;
    let mut bob = Client::connect(port).await;
    bob.register("bob").await;

    alice.send("JOIN #test").await;
    loop {
        let line = alice.recv().await;
        if line.contains(" 366 ") {
            break;
        }
    }

    bob.send("JOIN #test").await;
    let join_seen_by_alice = alice.recv().await;
    assert!(join_seen_by_alice.contains("JOIN #test"), "got: {join_seen_by_alice}");

    bob.send("PRIVMSG #test :hello channel").await;
    let privmsg = alice.recv().await;
    assert!(privmsg.contains("PRIVMSG #test :hello channel"), "got: {privmsg}");
}

#[tokio::test]
async fn moderated_channel_blocks_unvoiced_users() {
    let port = spawn_server().await;
    let mut alice = Client::connect(port).await;
    alice.register("alice2").await;
    let mut bob = Client::connect(port).await;
    bob.register("bob2").await;

    alice.send("JOIN #mod").await;
    loop {
        if alice.recv().await.contains(" 366 ") {
            break;
        }
    }
    alice.send("MODE #mod +m").await;
    let mode_line = alice.recv().await;
    assert!(mode_line.contains("MODE #mod +m"), "got: {mode_line}");

    bob.send("JOIN #mod").await;
    loop {
        if bob.recv().await.contains(" 366 ") {
            break;
        }
    }
    // drain alice's JOIN notification for bob
    let _ = alice.recv().await;

    bob.send("PRIVMSG #mod :i cannot speak").await;
    let err = bob.recv().await;
    assert!(err.contains(" 404 "), "expected ERR_CANNOTSENDTOCHAN, got: {err}");
}

#[tokio::test]
async fn quit_fans_out_across_every_joined_channel() {
    let port = spawn_server().await;
    let mut alice = Client::connect(port).await;
    alice.register("alice3").await;
    let mut bob = Client::connect(port).await;
    bob.register("bob3").await;

    alice.send("JOIN #one,#two").await;
    for _ in 0..2 {
        loop {
            if alice.recv().await.contains(" 366 ") {
                break;
            }
        }
    }
    bob.send("JOIN #one,#two").await;
    for _ in 0..2 {
        loop {
            if bob.recv().await.contains(" 366 ") {
                break;
            }
        }
        let _ = alice.recv().await; // bob's JOIN notification
    }

    bob.send("QUIT :done here").await;
    let mut quits_seen = 0;
    for _ in 0..2 {
        let line = alice.recv().await;
        assert!(line.contains("QUIT :done here"), "got: {line}");
        quits_seen += 1;
    }
    assert_eq!(quits_seen, 2);
}

#[tokio::test]
async fn voice_grant_lets_a_moderated_member_speak() {
    let port = spawn_server().await;
    let mut alice = Client::connect(port).await;
    alice.register("alice4").await;
    let mut bob = Client::connect(port).await;
    bob.register("bob4").await;

    alice.send("JOIN #voice").await;
    loop {
        if alice.recv().await.contains(" 366 ") {
            break;
        }
    }
    alice.send("MODE #voice +m").await;
    let _ = alice.recv().await; // MODE +m echoed back

    bob.send("JOIN #voice").await;
    loop {
        if bob.recv().await.contains(" 366 ") {
            break;
        }
    }
    let _ = alice.recv().await; // bob's JOIN notification

    bob.send("PRIVMSG #voice :still muted").await;
    let denied = bob.recv().await;
    assert!(denied.contains(" 404 "), "expected ERR_CANNOTSENDTOCHAN, got: {denied}");

    alice.send("MODE #voice +v bob4").await;
    let grant_seen_by_alice = alice.recv().await;
    assert!(grant_seen_by_alice.contains("MODE #voice +v bob4"), "got: {grant_seen_by_alice}");
    let grant_seen_by_bob = bob.recv().await;
    assert!(grant_seen_by_bob.contains("MODE #voice +v bob4"), "got: {grant_seen_by_bob}");

    bob.send("PRIVMSG #voice :now i can talk").await;
    let delivered = alice.recv().await;
    assert!(delivered.contains("PRIVMSG #voice :now i can talk"), "got: {delivered}");
}

#[tokio::test]
async fn privmsg_to_an_away_user_notifies_the_sender() {
    let port = spawn_server().await;
    let mut alice = Client::connect(port).await;
    alice.register("alice5").await;
    let mut bob = Client::connect(port).await;
    bob.register("bob5").await;

    alice.send("AWAY :brb").await;
    let away_ack = alice.recv().await;
    assert!(away_ack.contains(" 306 "), "expected RPL_NOWAWAY, got: {away_ack}");

    bob.send("PRIVMSG alice5 :hey there").await;
    let delivered = alice.recv().await;
    assert!(delivered.contains("PRIVMSG alice5 :hey there"), "got: {delivered}");
    let away_notice = bob.recv().await;
    assert!(away_notice.contains(" 301 "), "expected RPL_AWAY, got: {away_notice}");
}

#[tokio::test]
async fn nick_change_is_seen_once_by_a_user_sharing_two_channels() {
    let port = spawn_server().await;
    let mut alice = Client::connect(port).await;
    alice.register("alice6").await;
    let mut bob = Client::connect(port).await;
    bob.register("bob6").await;

    bob.send("JOIN #one,#two").await;
    for _ in 0..2 {
        loop {
            if bob.recv().await.contains(" 366 ") {
                break;
            }
        }
    }
    alice.send("JOIN #one,#two").await;
    for _ in 0..2 {
        loop {
            if alice.recv().await.contains(" 366 ") {
                break;
            }
        }
        let _ = bob.recv().await; // alice's JOIN notification
    }

    alice.send("NICK alice6renamed").await;
    let nick_line = bob.recv().await;
    assert!(nick_line.contains("NICK alice6renamed"), "got: {nick_line}");

    // bob shares both #one and #two with alice; he must not be sent the
    // rename a second time. Follow it with a message only alice would
    // send after the rename completes, so a duplicate NICK line (rather
    // than silence) is what a regression would produce here.
    alice.send("PRIVMSG #one :after rename").await;
    let next = bob.recv().await;
    assert!(next.contains("PRIVMSG #one :after rename"), "expected no duplicate NICK line, got: {next}");
}
