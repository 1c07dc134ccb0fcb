use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::net::{lookup_host, UdpSocket};
use tokio::time::timeout;

use crate::command::{Command, CommandReceiver};
use crate::errors::{Result, TelloError};
use crate::options::{ConnectionPolicy, TelloOptions};
use crate::outcome::Outcome;
use crate::scheduler::{lock, Scheduler};
use crate::state::listen_for_state;
use crate::stream::{StreamHandler, StreamSession, StreamStats};

const RESPONSE_BUFFER_SIZE:usize = 1024;

/// A connected Tello drone.
///
/// Commands are exchanged one at a time: each is sent and then exactly one
/// response is awaited before the next goes out, whether it was issued by
/// the caller or by the keep-alive.
pub struct Tello {
    link: Arc<CommandLink>,
    status_sock: Mutex<Option<Arc<UdpSocket>>>,
    scheduler: Scheduler,
    connection: ConnectionPolicy,
    stream_url: String,
    stream_handler: Option<Arc<dyn StreamHandler>>,
    stream: Mutex<Option<Arc<dyn StreamSession>>>,
    command_receiver: Mutex<Option<CommandReceiver>>,
    closed: AtomicBool
}

impl Tello {
    /// Binds the local sockets and puts the drone in command mode.
    ///
    /// Fails if a local port can't be bound. If the drone does not answer
    /// the initial "command" this is only logged, unless
    /// `TelloOptions::require_init` is set.
    ///
    pub async fn connect(options: TelloOptions) -> Result<Tello> {
        let drone_address = options.drone_address();
        let remote = lookup_host(drone_address.as_str()).await
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| TelloError::InvalidAddress { address: drone_address.clone() })?;

        info!("[Tello] CONNECT :{} → {remote}", options.command_port);

        if options.connection == ConnectionPolicy::KeepAlive && options.keep_alive_period.is_zero() {
            return Err(TelloError::InvalidPeriod);
        }

        let command_sock = bind(options.command_port).await?;
        let status_sock = Arc::new(bind(options.status_port).await?);

        let link = Arc::new(CommandLink::new(command_sock, remote, options.response_timeout));

        let scheduler = options.scheduler.unwrap_or_else(Scheduler::current);

        if options.connection == ConnectionPolicy::KeepAlive {
            let period = options.keep_alive_period;
            let keep_alive = link.clone();
            scheduler.schedule_at_fixed_rate(period, period, move || {
                let link = keep_alive.clone();
                async move {
                    let outcome = link.exchange(&Command::ReadBattery).await;
                    debug!("[Tello] keep-alive {outcome}");
                }
            })?;
            debug!("[Tello] keep-alive every {period:?}");
        }

        if let Some(sender) = options.state_sender {
            if let Err(err) = scheduler.submit(listen_for_state(status_sock.clone(), sender)) {
                // don't leave the keep-alive holding the command socket
                scheduler.abort();
                return Err(err);
            }
        }

        let drone = Tello {
            link,
            status_sock: Mutex::new(Some(status_sock)),
            scheduler,
            connection: options.connection,
            stream_url: options.stream_url,
            stream_handler: options.stream_handler,
            stream: Mutex::new(None),
            command_receiver: Mutex::new(options.command_receiver),
            closed: AtomicBool::new(false)
        };

        info!("[Tello] putting drone in command mode...");
        let outcome = drone.link.exchange(&Command::Init).await;
        if outcome.is_error() {
            if options.require_init {
                drone.close().await?;
                return Err(TelloError::InitFailed { msg: outcome.message().to_string() });
            }
            warn!("[Tello] drone did not enter command mode ({}), continuing", outcome.message());
        }
        else {
            info!("[Tello] CONNECTED");
        }

        Ok(drone)
    }

    /// Sends `command` and waits for the drone's response.
    ///
    /// Never fails: network errors and timeouts come back as an error
    /// outcome and the drone stays usable. "streamon" and "streamoff" also
    /// start and stop video capture, if a stream handler was configured.
    ///
    pub async fn execute(&self, command: &Command) -> Outcome {
        let outcome = self.link.exchange(command).await;

        match command {
            Command::StreamOn => self.start_stream(),
            Command::StreamOff => self.stop_stream(),
            _ => {}
        }

        info!("[Tello] {command} → {outcome}");
        outcome
    }

    /// Executes the commands from the channel returned by
    /// `TelloOptions::with_command` until every sender has been dropped.
    pub async fn handle_commands(&self) -> Result<()> {
        let mut receiver = lock(&self.command_receiver).take()
            .ok_or(TelloError::NoCommandChannel)?;

        while let Some(command) = receiver.recv().await {
            self.execute(&command).await;
        }

        debug!("[Tello] command channel closed");
        Ok(())
    }

    pub fn has_active_stream(&self) -> bool {
        self.stream_handler.as_ref().is_some_and(|h| h.has_active_stream())
    }

    /// Statistics of the latest stream session, if there has been one.
    pub fn stream_stats(&self) -> Option<StreamStats> {
        lock(&self.stream).as_ref().map(|s| s.stats())
    }

    pub fn connection_policy(&self) -> ConnectionPolicy {
        self.connection
    }

    pub fn remote_address(&self) -> SocketAddr {
        self.link.remote
    }

    pub fn stream_url(&self) -> &str {
        &self.stream_url
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stops the stream and the background tasks, then releases the
    /// sockets.
    ///
    /// Waits for an exchange in progress to finish. Once this returns the
    /// drone sees no more traffic from us. Closing again does nothing.
    ///
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("[Tello] already closed");
            return Ok(());
        }

        info!("[Tello] CLOSE");

        let mut result = Ok(());
        if let Some(handler) = &self.stream_handler {
            if handler.has_active_stream() {
                result = handler.stop_stream();
            }
        }

        self.scheduler.shutdown().await;
        self.link.close().await;
        lock(&self.status_sock).take();

        result
    }

    fn start_stream(&self) {
        let Some(handler) = &self.stream_handler else {
            warn!("[Tello] no stream handler, not capturing video");
            return;
        };

        if self.is_closed() {
            warn!("[Tello] closed, not starting stream");
            return;
        }

        if handler.has_active_stream() {
            warn!("[Tello] {}", TelloError::StreamAlreadyActive);
            return;
        }

        let session = match handler.start_stream(&self.stream_url) {
            Ok(session) => session,
            Err(err) => {
                warn!("[Tello] failed to start stream at {} ({err})", self.stream_url);
                return;
            }
        };

        debug!("[Tello] starting stream at {}", self.stream_url);
        let capture = session.clone();
        let submitted = self.scheduler.submit_blocking(move || {
            match capture.capture() {
                Ok(()) => debug!("[Tello] stream capture finished"),
                Err(err) => warn!("[Tello] stream capture failed ({err})"),
            }
        });

        if let Err(err) = submitted {
            warn!("[Tello] can't run stream capture ({err})");
            if let Err(err) = handler.stop_stream() {
                debug!("[Tello] {err}");
            }
            return;
        }

        *lock(&self.stream) = Some(session);
    }

    fn stop_stream(&self) {
        let Some(handler) = &self.stream_handler else {
            warn!("[Tello] no stream handler, nothing to stop");
            return;
        };

        if !handler.has_active_stream() {
            warn!("[Tello] {}", TelloError::NoActiveStream);
            return;
        }

        debug!("[Tello] stopping stream");
        if let Err(err) = handler.stop_stream() {
            warn!("[Tello] failed to stop stream ({err})");
        }
    }
}

impl Drop for Tello {
    fn drop(&mut self) {
        if self.is_closed() {
            return;
        }

        debug!("[Tello] dropped without close");
        if let Some(handler) = &self.stream_handler {
            if handler.has_active_stream() {
                let _ = handler.stop_stream();
            }
        }
        self.scheduler.abort();
    }
}

/// The command socket, guarded so that only one exchange is in flight.
///
/// UDP responses carry nothing to match them to their command, so the only
/// way to pair them is to never have two commands outstanding, and to throw
/// away the replies that arrive after their exchange gave up waiting.
struct CommandLink {
    remote: SocketAddr,
    response_timeout: Duration,
    sock: tokio::sync::Mutex<LinkState>
}

struct LinkState {
    sock: Option<UdpSocket>,
    // replies still owed for exchanges that timed out
    late_replies: usize
}

impl CommandLink {
    fn new(sock: UdpSocket, remote: SocketAddr, response_timeout: Duration) -> Self {
        Self {
            remote,
            response_timeout,
            sock: tokio::sync::Mutex::new(LinkState { sock: Some(sock), late_replies: 0 })
        }
    }

    async fn exchange(&self, command: &Command) -> Outcome {
        let msg = command.wire_text();

        let mut guard = self.sock.lock().await;
        let LinkState { sock, late_replies } = &mut *guard;
        let Some(sock) = sock.as_ref() else {
            warn!("[Tello] connection closed, not sending {msg}");
            return Outcome::error("connection closed");
        };

        let mut buf = vec![0; RESPONSE_BUFFER_SIZE];
        self.discard_pending(sock, &mut buf, late_replies);

        debug!("[Tello] SEND {msg}");
        if let Err(err) = sock.send_to(msg.as_bytes(), self.remote).await {
            warn!("[Tello] sending {msg} failed ({err})");
            return Outcome::error(err.to_string());
        }

        let received = timeout(self.response_timeout, async {
            loop {
                let (n, from) = sock.recv_from(&mut buf).await?;
                if from != self.remote {
                    debug!("[Tello] ignoring datagram from {from}");
                }
                else if *late_replies > 0 {
                    // the drone answers in order, so this belongs to an
                    // earlier exchange
                    *late_replies -= 1;
                    debug!("[Tello] discarding late reply {}", String::from_utf8_lossy(&buf[..n]));
                }
                else {
                    return Ok::<usize, std::io::Error>(n);
                }
            }
        }).await;

        let n = match received {
            Ok(Ok(n)) => n,
            Ok(Err(err)) => {
                warn!("[Tello] receiving response to {msg} failed ({err})");
                return Outcome::error(err.to_string());
            }
            Err(_) => {
                // older replies still owed are presumed lost
                *late_replies = 1;
                let err = format!("no response to {msg} within {:?}", self.response_timeout);
                warn!("[Tello] {err}");
                return Outcome::error(err);
            }
        };

        let response = String::from_utf8_lossy(&buf[..n]).into_owned();
        debug!("[Tello] RECEIVED {response}");

        Outcome::ok(response)
    }

    /// Drops whatever is already queued on the socket before a new command
    /// goes out.
    fn discard_pending(&self, sock: &UdpSocket, buf: &mut [u8], late_replies: &mut usize) {
        loop {
            match sock.try_recv_from(buf) {
                Ok((n, from)) => {
                    if from == self.remote {
                        *late_replies = late_replies.saturating_sub(1);
                    }
                    debug!("[Tello] discarding stale {} from {from}", String::from_utf8_lossy(&buf[..n]));
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => break,
                Err(err) => {
                    debug!("[Tello] {err} while discarding stale datagrams");
                    break;
                }
            }
        }
    }

    async fn close(&self) {
        self.sock.lock().await.sock.take();
    }
}

async fn bind(port: u16) -> Result<UdpSocket> {
    let local_address = format!("0.0.0.0:{port}");
    debug!("[Tello] binding local {local_address}...");
    UdpSocket::bind(&local_address).await
        .map_err(|source| TelloError::Bind { address: local_address, source })
}
