use std::sync::Arc;

use crate::errors::Result;

/// Counters a stream session keeps while capturing.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StreamStats {
    pub frames: u64,
    pub bytes: u64
}

/// Something that can capture the drone's video stream.
///
/// The controller starts a session when the drone acknowledges `streamon`
/// and stops it on `streamoff` or when the controller is closed. At most one
/// session is active at a time.
pub trait StreamHandler: Send + Sync {
    /// Opens a new capture session for the stream at `url`.
    ///
    /// Fails with `StreamAlreadyActive` if the previous session has not
    /// been stopped.
    fn start_stream(&self, url: &str) -> Result<Arc<dyn StreamSession>>;

    fn has_active_stream(&self) -> bool;

    /// Asks the active session to stop. Fails with `NoActiveStream` if
    /// there is none.
    fn stop_stream(&self) -> Result<()>;
}

/// One capture of the video stream, from `streamon` to `streamoff`.
pub trait StreamSession: Send + Sync {
    /// Captures until the session is stopped or the stream ends.
    ///
    /// Blocks the calling thread, the controller runs it on the scheduler's
    /// blocking pool.
    fn capture(&self) -> Result<()>;

    fn stats(&self) -> StreamStats {
        StreamStats::default()
    }
}
