//! Multi-client aggregation server.
//!
//! Every accepted TCP connection gets its own slave [`Context`]
//! (see [`connection::serve_connection`]) running as a tokio task. Slaves
//! forward static commands into one [`SharedContext`] that owns the
//! loggers and applies the bulk size to the merged stream. Brace groups
//! stay local to their connection and are dispatched whole.
//!
//! [`Context`]: crate::batching::Context

pub mod connection;

pub use connection::serve_connection;

use crate::batching::{SharedContext, SharedStats};
use crate::config::{ServerConfig, TruncationPolicy};
use crate::error::{Result, ServerError};
use crate::logger::LoggerSet;
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Summary returned when the server stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ServerStats {
    /// Connections accepted over the server's lifetime.
    pub connections: u64,
    /// Counters of the master context.
    pub master: SharedStats,
}

/// Aggregation server bound to a TCP address.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    master: Arc<SharedContext>,
    on_truncate: TruncationPolicy,
}

impl Server {
    /// Binds the listening socket and creates the master context.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound.
    pub async fn bind(config: &ServerConfig, loggers: LoggerSet) -> Result<Self> {
        let listener = TcpListener::bind(config.bind)
            .await
            .map_err(|e| ServerError::Bind {
                addr: config.bind.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            listener,
            master: Arc::new(SharedContext::new(config.bulk.bulk_size, loggers)),
            on_truncate: config.bulk.on_truncate,
        })
    }

    /// Returns the bound address.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be queried.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Returns the master context shared by every connection.
    #[must_use]
    pub fn master(&self) -> Arc<SharedContext> {
        Arc::clone(&self.master)
    }

    /// Accepts connections until `shutdown` resolves.
    ///
    /// On shutdown the server stops accepting, terminates every open
    /// connection and flushes the master's pending batch. Loggers are not
    /// shut down here; that is left to their owner.
    ///
    /// # Errors
    ///
    /// Currently infallible once bound; accept errors are logged and retried.
    pub async fn run<F>(self, shutdown: F) -> Result<ServerStats>
    where
        F: Future<Output = ()>,
    {
        let addr = self.local_addr()?;
        info!(%addr, bulk_size = self.master.bulk_size(), "aggregation server listening");

        let mut tasks = JoinSet::new();
        let mut connections = 0u64;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        connections += 1;
                        debug!(%peer, "connection accepted");
                        tasks.spawn(serve_connection(
                            stream,
                            peer,
                            Arc::clone(&self.master),
                            self.on_truncate,
                        ));
                    }
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                Some(finished) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = finished
                        && e.is_panic()
                    {
                        error!(error = %e, "connection task panicked");
                    }
                }
            }
        }

        // cancelled connections terminate their slave context on drop
        tasks.abort_all();
        while tasks.join_next().await.is_some() {}
        self.master.flush();

        let stats = ServerStats {
            connections,
            master: self.master.stats(),
        };
        info!(
            connections,
            received = stats.master.received,
            flushes = stats.master.flushes,
            "aggregation server stopped"
        );
        Ok(stats)
    }
}

/// Builds a multi-threaded tokio runtime for the server.
///
/// # Errors
///
/// Returns [`ServerError::Runtime`] if the runtime cannot be created.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("bulkmt-server")
        .build()
        .map_err(|e| ServerError::Runtime(e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BulkConfig;
    use crate::logger::Logger;
    use crate::logger::testing::RecordingLogger;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    async fn start(
        bulk_size: usize,
    ) -> (
        SocketAddr,
        Arc<SharedContext>,
        Arc<RecordingLogger>,
        oneshot::Sender<()>,
        tokio::task::JoinHandle<Result<ServerStats>>,
    ) {
        let sink = Arc::new(RecordingLogger::default());
        let set = LoggerSet::new().with(Arc::clone(&sink) as Arc<dyn Logger>);
        let config = ServerConfig::new("127.0.0.1:0", BulkConfig::with_bulk_size(bulk_size)).unwrap();
        let server = Server::bind(&config, set).await.unwrap();
        let addr = server.local_addr().unwrap();
        let master = server.master();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.run(async {
            let _ = rx.await;
        }));
        (addr, master, sink, tx, handle)
    }

    async fn wait_for_received(master: &SharedContext, expected: u64) {
        for _ in 0..200 {
            if master.stats().received >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("master did not receive {expected} commands");
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap().to_string();
        let config = ServerConfig::new(&addr, BulkConfig::default()).unwrap();

        let result = Server::bind(&config, LoggerSet::new()).await;
        assert!(matches!(
            result,
            Err(crate::Error::Server(ServerError::Bind { .. }))
        ));
    }

    #[tokio::test]
    async fn test_two_clients_fill_one_master_batch() {
        let n = 5;
        let (addr, master, sink, tx, handle) = start(2 * n).await;

        let mut a = TcpStream::connect(addr).await.unwrap();
        let mut b = TcpStream::connect(addr).await.unwrap();
        for i in 0..n {
            a.write_all(format!("a{i}\n").as_bytes()).await.unwrap();
            b.write_all(format!("b{i}\n").as_bytes()).await.unwrap();
        }
        wait_for_received(&master, (2 * n) as u64).await;

        assert_eq!(sink.count(), 1);
        assert_eq!(sink.bodies()[0].len(), 2 * n);

        drop(a);
        drop(b);
        tx.send(()).unwrap();
        let stats = handle.await.unwrap().unwrap();
        assert_eq!(stats.connections, 2);
        assert_eq!(stats.master.flushes, 1);
    }

    #[tokio::test]
    async fn test_shutdown_flushes_master_remainder() {
        let (addr, master, sink, tx, handle) = start(10).await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"x\ny\n").await.unwrap();
        wait_for_received(&master, 2).await;
        assert_eq!(sink.count(), 0);

        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();

        assert_eq!(sink.bodies(), vec![vec!["x", "y"]]);
    }
}
