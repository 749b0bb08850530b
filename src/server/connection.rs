//! Per-connection task of the aggregation server.

use crate::batching::{Context, ContextStats, SharedContext};
use crate::config::TruncationPolicy;
use crate::io::YieldReader;
use std::fmt::Display;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{info, warn};

/// Size of the read buffer for one connection.
const READ_BUFFER_SIZE: usize = 4096;

/// Drives one connection: every chunk read from `stream` is fed into a
/// slave context forwarding into `master`.
///
/// The context suspends whenever the stream has no complete line buffered
/// and resumes on the next chunk. On end of stream or a read error the
/// slave is terminated. If the task is cancelled, dropping the context
/// terminates it the same way.
pub async fn serve_connection<S, P>(
    mut stream: S,
    peer: P,
    master: Arc<SharedContext>,
    on_truncate: TruncationPolicy,
) -> ContextStats
where
    S: AsyncRead + Unpin,
    P: Display,
{
    let mut context = Context::slave(YieldReader::new(), master).with_truncation_policy(on_truncate);
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                context.receive(&buf[..n]);
            }
            Err(e) => {
                warn!(%peer, error = %e, "connection read failed");
                break;
            }
        }
    }

    context.terminate();
    let stats = context.stats();
    info!(
        %peer,
        commands = stats.commands,
        forwarded = stats.forwarded,
        "connection closed"
    );
    stats
}
