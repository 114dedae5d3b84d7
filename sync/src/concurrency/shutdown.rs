//! Shutdown signaling for background tasks.
//!
//! A watch channel of unit type: subscribers only care that shutdown was
//! requested, not about any payload. All receivers observe the same signal.

use tokio::sync::watch;

/// Transmitter side of a shutdown channel.
pub type ShutdownTx = watch::Sender<()>;

/// Receiver side of a shutdown channel.
pub type ShutdownRx = watch::Receiver<()>;

/// Creates a new shutdown channel.
///
/// The receiver returned here can be dropped; further receivers are obtained
/// from the transmitter via `subscribe`.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    watch::channel(())
}
