//! Flight session controller for the Tello drone.
//!
//! [`Tello`] owns the UDP sockets, exchanges text commands with the drone one
//! at a time, optionally keeps the link alive in the background and starts
//! and stops video capture in step with the "streamon"/"streamoff" commands.

mod command;
mod errors;
mod options;
mod outcome;
mod scheduler;
mod state;
mod stream;
mod tello;
mod video;

pub use command::{make_command_channel, Command, CommandReceiver, CommandSender, FlipDirection, Parameter};
pub use errors::{Result, TelloError};
pub use options::{ConnectionPolicy, TelloOptions};
pub use outcome::{Outcome, OutcomeStatus};
pub use scheduler::Scheduler;
pub use state::{make_state_channel, DroneState, StateReceiver, StateSender, Vector3};
pub use stream::{StreamHandler, StreamSession, StreamStats};
pub use tello::Tello;
pub use video::{make_video_channel, VideoFrame, VideoReceiver, VideoSender, VideoSession, VideoStreamHandler};
