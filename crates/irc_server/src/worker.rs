//! Per-connection tasks (§4.C5): one reader task framing and dispatching
//! incoming lines, one writer task draining the outbound `mpsc` channel
//! that is the connection's write-serialization point (§5). The two run
//! concurrently via `tokio::select!` so a blocked write never stalls
//! reads, and vice versa.

use crate::entities::connection::{next_conn_id, OutboundRx};
use crate::entities::Connection;
use crate::error::HandlerOutcome;
use crate::handlers::registration::teardown;
use crate::message::{Message, MAX_LINE_OCTETS};
use crate::Directory;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

/// Bound on the per-connection outbound queue (§5 SendQ). A full queue
/// means the peer isn't draining its socket fast enough; the connection
/// is cut rather than let the queue grow unbounded.
const SENDQ_CAPACITY: usize = 256;

pub async fn run_connection(dir: Arc<Directory>, socket: TcpStream, addr: std::net::SocketAddr) {
    let (read_half, write_half) = socket.into_split();
    let (tx, rx) = mpsc::channel(SENDQ_CAPACITY);

    let conn = Arc::new(Connection::new(next_conn_id(), addr, tx));
    dir.register_connection(Arc::clone(&conn));
    info!("connection accepted: {addr} (id={})", conn.id);

    let writer = tokio::spawn(run_writer(rx, write_half));

    let reason = run_reader(&dir, &conn, read_half).await;

    writer.abort();
    teardown(&dir, &conn, &reason).await;
    info!("connection closed: {addr} (id={}): {reason}", conn.id);
}

async fn run_writer(mut rx: OutboundRx, mut write_half: tokio::net::tcp::OwnedWriteHalf) {
    while let Some(line) = rx.recv().await {
        if let Err(e) = write_half.write_all(line.as_bytes()).await {
            warn!("write failed: {e}");
            return;
        }
    }
}

/// Frames the socket into CRLF/LF-terminated lines while enforcing the
/// 512-octet cap (§4.C5 step 1) *during* the read rather than after an
/// unbounded buffer has already grown — a peer that never sends `\n`
/// cannot inflate server memory. A line that hits the cap before a
/// terminator is returned truncated (`truncated = true`) instead of
/// being read in full or dropped; bytes up to the next `\n` are then
/// discarded so the next call resynchronizes on the following line.
struct LineReader<R> {
    inner: R,
    buf: Vec<u8>,
    overflowing: bool,
}

impl<R: AsyncReadExt + Unpin> LineReader<R> {
    fn new(inner: R) -> Self {
        LineReader { inner, buf: Vec::new(), overflowing: false }
    }

    async fn read_line(&mut self) -> std::io::Result<Option<(String, bool)>> {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
                line.pop();
                let truncated = self.overflowing || line.len() > MAX_LINE_OCTETS;
                self.overflowing = false;
                if truncated {
                    line.truncate(MAX_LINE_OCTETS);
                } else if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Ok(Some((String::from_utf8_lossy(&line).into_owned(), truncated)));
            }

            let mut chunk = [0u8; 4096];
            let n = self.inner.read(&mut chunk).await?;
            if n == 0 {
                return Ok(None);
            }

            if self.overflowing {
                // Already over cap with no terminator seen: discard this
                // chunk instead of growing `buf`, keeping memory bounded
                // regardless of how long the peer withholds `\n`. Only
                // the bytes up to and including a `\n` found in it are
                // kept, to let the top-of-loop branch close out the line.
                if let Some(pos) = chunk[..n].iter().position(|&b| b == b'\n') {
                    self.buf.extend_from_slice(&chunk[..=pos]);
                }
                continue;
            }

            self.buf.extend_from_slice(&chunk[..n]);
            if self.buf.len() > MAX_LINE_OCTETS {
                self.overflowing = true;
            }
        }
    }
}

async fn run_reader(dir: &Directory, conn: &Arc<Connection>, read_half: tokio::net::tcp::OwnedReadHalf) -> String {
    let mut lines = LineReader::new(read_half);
    loop {
        tokio::select! {
            biased;
            _ = conn.disconnect.notified() => {
                return conn.disconnect.take_reason().unwrap_or_else(|| "SendQ exceeded".to_string());
            }
            read = lines.read_line() => {
                match read {
                    Ok(Some((raw, truncated))) => {
                        if truncated {
                            debug!("truncated oversized line from connection {} to {MAX_LINE_OCTETS} octets", conn.id);
                        }
                        match Message::parse(&raw) {
                            Ok(msg) => {
                                debug!("<< {:?}", msg);
                                match crate::dispatch::dispatch(dir, conn, msg).await {
                                    HandlerOutcome::Continue => {}
                                    HandlerOutcome::Disconnect { reason } => return reason,
                                }
                            }
                            Err(e) => debug!("parse error from connection {}: {e}", conn.id),
                        }
                    }
                    Ok(None) => return "Connection closed".to_string(),
                    Err(e) => {
                        warn!("read failed: {e}");
                        return "Read error".to_string();
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_plain_lines() {
        let mut r = LineReader::new(std::io::Cursor::new(b"NICK alice\r\nUSER alice 0 *\r\n".to_vec()));
        let (line, truncated) = r.read_line().await.unwrap().unwrap();
        assert_eq!(line, "NICK alice");
        assert!(!truncated);
        let (line, truncated) = r.read_line().await.unwrap().unwrap();
        assert_eq!(line, "USER alice 0 *");
        assert!(!truncated);
        assert!(r.read_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn caps_a_line_with_no_terminator_instead_of_growing_unbounded() {
        let mut data = vec![b'A'; MAX_LINE_OCTETS * 4];
        data.push(b'\n');
        data.extend_from_slice(b"PING :next\r\n");
        let mut r = LineReader::new(std::io::Cursor::new(data));
        let (line, truncated) = r.read_line().await.unwrap().unwrap();
        assert_eq!(line.len(), MAX_LINE_OCTETS);
        assert!(truncated);
        let (line, truncated) = r.read_line().await.unwrap().unwrap();
        assert_eq!(line, "PING :next");
        assert!(!truncated);
    }
}
