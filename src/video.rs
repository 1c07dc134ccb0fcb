use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytebuffer::ByteBuffer;
use log::{debug, info};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::errors::{Result, TelloError};
use crate::scheduler::lock;
use crate::stream::{StreamHandler, StreamSession, StreamStats};

const MAX_CHUNK_SIZE:usize = 1460;

// how often the capture loop checks whether it has been stopped
const POLL_INTERVAL:Duration = Duration::from_millis(100);

pub type VideoSender = mpsc::UnboundedSender<VideoFrame>;
pub type VideoReceiver = mpsc::UnboundedReceiver<VideoFrame>;

pub fn make_video_channel() -> (VideoSender, VideoReceiver) {
    mpsc::unbounded_channel()
}

/// A frame of h264-encoded video from the drone.
#[derive(Debug)]
pub struct VideoFrame {
    pub data: Vec<u8>
}

/// Captures the raw video stream and passes each frame on to a channel.
#[derive(Debug)]
pub struct VideoStreamHandler {
    sender: VideoSender,
    current: Mutex<Option<Arc<VideoSession>>>
}

impl VideoStreamHandler {
    pub fn new(sender: VideoSender) -> Self {
        Self { sender, current: Mutex::new(None) }
    }

    /// Address the current session is receiving on, if any.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        lock(&self.current).as_ref().map(|s| s.local_addr)
    }
}

impl StreamHandler for VideoStreamHandler {
    fn start_stream(&self, url: &str) -> Result<Arc<dyn StreamSession>> {
        let mut current = lock(&self.current);
        if current.as_ref().is_some_and(|s| s.is_active()) {
            return Err(TelloError::StreamAlreadyActive);
        }

        // the new session most likely binds the same port
        if let Some(previous) = current.take() {
            previous.release();
        }

        let session = Arc::new(VideoSession::open(url, self.sender.clone())?);
        *current = Some(session.clone());
        Ok(session)
    }

    fn has_active_stream(&self) -> bool {
        lock(&self.current).as_ref().is_some_and(|s| s.is_active())
    }

    fn stop_stream(&self) -> Result<()> {
        match lock(&self.current).as_ref() {
            Some(session) if session.is_active() => {
                session.stop.cancel();
                Ok(())
            }
            _ => Err(TelloError::NoActiveStream)
        }
    }
}

#[derive(Debug)]
pub struct VideoSession {
    // held by the capture loop while it runs, None once released
    sock: Mutex<Option<UdpSocket>>,
    local_addr: SocketAddr,
    stop: CancellationToken,
    sender: VideoSender,
    frames: AtomicU64,
    bytes: AtomicU64
}

impl VideoSession {
    fn open(url: &str, sender: VideoSender) -> Result<Self> {
        let address = bind_address(url)?;
        info!("[Video] START LISTENING at {address}");

        let sock = UdpSocket::bind(address)
            .map_err(|source| TelloError::Bind { address: address.to_string(), source })?;
        sock.set_read_timeout(Some(POLL_INTERVAL))?;
        let local_addr = sock.local_addr()?;

        Ok(Self {
            sock: Mutex::new(Some(sock)),
            local_addr,
            stop: CancellationToken::new(),
            sender,
            frames: AtomicU64::new(0),
            bytes: AtomicU64::new(0)
        })
    }

    /// Stops the session and closes its socket, waiting for a running
    /// capture loop to notice.
    fn release(&self) {
        self.stop.cancel();
        if lock(&self.sock).take().is_some() {
            debug!("[Video] released {}", self.local_addr);
        }
    }

    fn is_active(&self) -> bool {
        !self.stop.is_cancelled()
    }

    fn emit(&self, data: Vec<u8>) -> bool {
        self.frames.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(data.len() as u64, Ordering::Relaxed);
        self.sender.send(VideoFrame { data }).is_ok()
    }
}

impl StreamSession for VideoSession {
    /// Reassembles frames from the stream's datagrams. The drone splits each
    /// frame into chunks of `MAX_CHUNK_SIZE`, so a shorter chunk ends a frame.
    fn capture(&self) -> Result<()> {
        if !self.is_active() {
            return Err(TelloError::CaptureNotRunning);
        }

        let mut sock = lock(&self.sock);
        let Some(s) = sock.as_ref() else {
            return Err(TelloError::CaptureNotRunning);
        };

        let mut buf = ByteBuffer::new();
        let mut chunk = vec![0; MAX_CHUNK_SIZE];

        while self.is_active() {
            let n = match s.recv_from(&mut chunk) {
                Ok((n, _)) => n,
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => continue,
                Err(err) => {
                    self.stop.cancel();
                    sock.take();
                    return Err(err.into());
                }
            };

            if n == 0 {
                continue;
            }

            buf.write_bytes(&chunk[..n]);
            if n < MAX_CHUNK_SIZE {
                let frame = std::mem::replace(&mut buf, ByteBuffer::new());
                if !self.emit(frame.into_vec()) {
                    debug!("[Video] receiver dropped");
                    self.stop.cancel();
                }
            }
        }

        sock.take();
        info!("[Video] STOP LISTENING at {}", self.local_addr);
        Ok(())
    }

    fn stats(&self) -> StreamStats {
        StreamStats {
            frames: self.frames.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed)
        }
    }
}

/// "udp://0.0.0.0:11111?overrun_nonfatal=1" → "0.0.0.0:11111"
fn bind_address(url: &str) -> Result<&str> {
    let address = url.strip_prefix("udp://")
        .and_then(|rest| rest.split('?').next())
        .filter(|a| !a.is_empty());

    address.ok_or_else(|| TelloError::InvalidStreamUrl { url: url.to_string() })
}
