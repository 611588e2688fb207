//! TCP accept loop (§4.C12): pure plumbing — bind, accept, spawn a worker
//! per connection. All protocol behavior lives in `worker`/`dispatch`.

use crate::directory::Directory;
use log::{error, info};
use std::sync::Arc;
use tokio::net::TcpListener;

pub async fn run(dir: Arc<Directory>, port: u16) -> std::io::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!("listening on port {port}");
    loop {
        match listener.accept().await {
            Ok((socket, addr)) => {
                let dir = Arc::clone(&dir);
                tokio::spawn(async move {
                    crate::worker::run_connection(dir, socket, addr).await;
                });
            }
            Err(e) => error!("accept failed: {e}"),
        }
    }
}
