use std::sync::Arc;
use std::time::Duration;

use crate::command::*;
use crate::scheduler::Scheduler;
use crate::state::*;
use crate::stream::StreamHandler;
use crate::video::*;

pub const DEFAULT_DRONE_HOST:&str = "192.168.10.1";
pub const CONTROL_UDP_PORT:u16 = 8889;
pub const STATE_UDP_PORT:u16 = 8890;
pub const DEFAULT_STREAM_URL:&str = "udp://0.0.0.0:11111";

/// The drone drops the link after ~15s without a command.
pub const DEFAULT_KEEP_ALIVE_PERIOD:Duration = Duration::from_secs(10);
pub const DEFAULT_RESPONSE_TIMEOUT:Duration = Duration::from_secs(10);

/// How the link to the drone is kept up.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPolicy {
    /// Query the battery every keep-alive period so the drone never times
    /// out the link
    #[default]
    KeepAlive,
    /// Let the drone drop the link after its idle timeout
    TimeOut
}

/// Tello drone connection and other usage options.
pub struct TelloOptions {
    pub(crate) drone_host: String,
    pub(crate) drone_port: u16,
    pub(crate) command_port: u16,
    pub(crate) status_port: u16,
    pub(crate) stream_url: String,
    pub(crate) connection: ConnectionPolicy,
    pub(crate) keep_alive_period: Duration,
    pub(crate) response_timeout: Duration,
    pub(crate) require_init: bool,
    pub(crate) scheduler: Option<Scheduler>,
    pub(crate) stream_handler: Option<Arc<dyn StreamHandler>>,
    pub(crate) state_sender: Option<StateSender>,
    pub(crate) command_receiver: Option<CommandReceiver>
}

impl Default for TelloOptions {
    fn default() -> Self {
        Self {
            drone_host: DEFAULT_DRONE_HOST.to_string(),
            drone_port: CONTROL_UDP_PORT,
            command_port: CONTROL_UDP_PORT,
            status_port: STATE_UDP_PORT,
            stream_url: DEFAULT_STREAM_URL.to_string(),
            connection: ConnectionPolicy::default(),
            keep_alive_period: DEFAULT_KEEP_ALIVE_PERIOD,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            require_init: false,
            scheduler: None,
            stream_handler: None,
            state_sender: None,
            command_receiver: None
        }
    }
}

impl TelloOptions {
    /// Host name or IP of the drone. Its own WiFi network puts it at
    /// 192.168.10.1.
    pub fn drone_host(mut self, host: impl Into<String>) -> Self {
        self.drone_host = host.into();
        self
    }

    pub fn drone_port(mut self, port: u16) -> Self {
        self.drone_port = port;
        self
    }

    /// Local port commands are sent from and responses arrive on. 0 picks
    /// any free port.
    pub fn command_port(mut self, port: u16) -> Self {
        self.command_port = port;
        self
    }

    /// Local port the drone pushes its state to. 0 picks any free port.
    pub fn status_port(mut self, port: u16) -> Self {
        self.status_port = port;
        self
    }

    /// Where the stream handler should capture video from once the stream
    /// is switched on.
    pub fn stream_url(mut self, url: impl Into<String>) -> Self {
        self.stream_url = url.into();
        self
    }

    pub fn connection(mut self, policy: ConnectionPolicy) -> Self {
        self.connection = policy;
        self
    }

    /// Only used with `ConnectionPolicy::KeepAlive`.
    pub fn keep_alive_period(mut self, period: Duration) -> Self {
        self.keep_alive_period = period;
        self
    }

    /// How long to wait for the drone to answer a command.
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Fail to connect if the drone does not answer the initial "command".
    pub fn require_init(mut self, required: bool) -> Self {
        self.require_init = required;
        self
    }

    /// Run background work on `scheduler` instead of a scheduler of our own.
    ///
    /// *nb* closing the drone shuts the scheduler down
    ///
    pub fn with_scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Capture video with `handler` when the stream is switched on.
    pub fn with_stream_handler(mut self, handler: Arc<dyn StreamHandler>) -> Self {
        self.stream_handler = Some(handler);
        self
    }

    /// Request video from the drone as a stream of h264-encoded frames.
    ///
    /// Capture starts when "streamon" is executed and stops on "streamoff".
    ///
    /// Returns the receiver end of the channel used to pass on frames
    ///
    pub fn with_video(&mut self) -> VideoReceiver {
        let (tx, rx) = make_video_channel();
        self.stream_handler = Some(Arc::new(VideoStreamHandler::new(tx)));
        rx
    }

    /// Request state updates from the drone.
    ///
    /// *nb* As messages are sent to the UDP broadcast address 0.0.0.0 this
    /// only works in AP mode, ie using the drone's own WiFi network
    ///
    /// Returns the receiver end of the channel used to pass on updates
    ///
    pub fn with_state(&mut self) -> StateReceiver {
        let (tx, rx) = make_state_channel();
        self.state_sender = Some(tx);
        rx
    }

    /// Returns the sender end of a channel for issuing commands to the
    /// drone, see `Tello::handle_commands`.
    ///
    pub fn with_command(&mut self) -> CommandSender {
        let (tx, rx) = make_command_channel();
        self.command_receiver = Some(rx);
        tx
    }

    pub(crate) fn drone_address(&self) -> String {
        format!("{}:{}", self.drone_host, self.drone_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = TelloOptions::default();
        assert_eq!(options.drone_address(), "192.168.10.1:8889");
        assert_eq!(options.command_port, 8889);
        assert_eq!(options.status_port, 8890);
        assert_eq!(options.stream_url, "udp://0.0.0.0:11111");
        assert_eq!(options.connection, ConnectionPolicy::KeepAlive);
        assert!(options.keep_alive_period < Duration::from_secs(15));
        assert!(!options.require_init);
        assert!(options.stream_handler.is_none());
    }

    #[test]
    fn builder() {
        let mut options = TelloOptions::default()
            .drone_host("127.0.0.1")
            .drone_port(9000)
            .connection(ConnectionPolicy::TimeOut)
            .response_timeout(Duration::from_millis(500));
        let _video = options.with_video();
        let _commands = options.with_command();

        assert_eq!(options.drone_address(), "127.0.0.1:9000");
        assert_eq!(options.connection, ConnectionPolicy::TimeOut);
        assert_eq!(options.response_timeout, Duration::from_millis(500));
        assert!(options.stream_handler.is_some());
        assert!(options.command_receiver.is_some());
        assert!(options.state_sender.is_none());
    }
}
