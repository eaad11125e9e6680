//! TCP accept loop.

use crate::network::connection;
use crate::state::Mesh;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// TS6 UID allocator: the server's SID plus a six-character base-36
/// counter.
pub struct UidGenerator {
    sid: String,
    counter: AtomicU64,
}

impl UidGenerator {
    pub fn new(sid: &str) -> Self {
        Self { sid: sid.to_string(), counter: AtomicU64::new(0) }
    }

    pub fn next_uid(&self) -> String {
        const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
        let mut n = self.counter.fetch_add(1, Ordering::Relaxed);
        let mut suffix = [b'A'; 6];
        for slot in suffix.iter_mut().rev() {
            *slot = ALPHABET[(n % 36) as usize];
            n /= 36;
        }
        format!("{}{}", self.sid, String::from_utf8_lossy(&suffix))
    }
}

pub struct Gateway {
    mesh: Arc<Mesh>,
    uids: Arc<UidGenerator>,
}

impl Gateway {
    pub fn new(mesh: Arc<Mesh>) -> Self {
        let uids = Arc::new(UidGenerator::new(&mesh.server.sid));
        Self { mesh, uids }
    }

    /// Bind the configured listener and accept clients forever.
    pub async fn run(&self) -> anyhow::Result<()> {
        let addr = self.mesh.config.listen.address;
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "listening for clients");

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let mesh = Arc::clone(&self.mesh);
                    let uid = self.uids.next_uid();
                    tokio::spawn(async move {
                        if let Err(err) = connection::handle(mesh, uid, stream, peer).await {
                            error!(%peer, error = %err, "connection ended with error");
                        }
                    });
                }
                Err(err) => {
                    error!(error = %err, "accept failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uid_format_and_uniqueness() {
        let uids = UidGenerator::new("1AB");
        let first = uids.next_uid();
        let second = uids.next_uid();
        assert_eq!(first, "1ABAAAAAA");
        assert_eq!(second, "1ABAAAAAB");
        assert_eq!(first.len(), 9);
        assert_ne!(first, second);
    }
}
