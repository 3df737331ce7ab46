//! The dispatch loop: sole reader of the manager socket.
//!
//! # States
//!
//! ```text
//! RUNNING ──cancel──► STOPPED   (socket closed, no error reported)
//!    │
//!    └──read error / EOF──► STOPPED   (error reported by the caller)
//! ```
//!
//! While RUNNING the loop waits on two things at once: the shutdown signal
//! and the next socket read.  The shutdown branch is polled first, so a
//! pending cancellation wins over buffered data.  Every successful read is
//! fed to a [`PacketFramer`]; each completed packet is routed before the next
//! read starts.  Routing only spawns tasks, so the read is the loop's one
//! blocking point.

use ami_core::PacketFramer;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::application::dispatch::Router;
use crate::infrastructure::network::AmiNetworkError;

/// Why the dispatch loop stopped.
#[derive(Debug)]
pub(crate) enum LoopExit {
    /// The shutdown signal fired (or its sender was dropped).
    Cancelled,
    /// The socket failed or reached EOF.
    Failed(AmiNetworkError),
}

/// Smallest read buffer the loop accepts; a zero-length buffer would read
/// as EOF.
const MIN_READ_BUFFER: usize = 64;

/// Reads from `reader` until cancelled or the stream fails, routing every
/// parsed message through `router`.
pub(crate) async fn run_dispatch_loop<R>(
    mut reader: R,
    mut shutdown: oneshot::Receiver<()>,
    router: &Router,
    buffer_size: usize,
) -> LoopExit
where
    R: AsyncRead + Unpin,
{
    let buffer_size = buffer_size.max(MIN_READ_BUFFER);
    let mut framer = PacketFramer::with_capacity(buffer_size * 2);
    let mut read_buf = vec![0u8; buffer_size];

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                info!("dispatch loop cancelled; closing manager connection");
                return LoopExit::Cancelled;
            }

            result = reader.read(&mut read_buf) => match result {
                Ok(0) => return LoopExit::Failed(AmiNetworkError::Closed),
                Ok(n) => {
                    framer.extend(&read_buf[..n]);
                    while let Some(msg) = framer.next_message() {
                        debug!(
                            "received packet (ActionID={:?}, Event={:?})",
                            msg.action_id(),
                            msg.event()
                        );
                        router.route(msg);
                    }
                }
                Err(e) => return LoopExit::Failed(AmiNetworkError::Read(e)),
            },
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
