use std::fmt;
use std::str::FromStr;

use tokio::sync::mpsc;

use crate::errors::{Result, TelloError};

/// Direction of a flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipDirection {
    Left,
    Right,
    Forward,
    Back
}

impl FlipDirection {
    pub fn as_char(self) -> char {
        match self {
            FlipDirection::Left => 'l',
            FlipDirection::Right => 'r',
            FlipDirection::Forward => 'f',
            FlipDirection::Back => 'b',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'l' => Some(FlipDirection::Left),
            'r' => Some(FlipDirection::Right),
            'f' => Some(FlipDirection::Forward),
            'b' => Some(FlipDirection::Back),
            _ => None
        }
    }
}

impl fmt::Display for FlipDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// A typed command parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter {
    Int(i32),
    Direction(FlipDirection)
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parameter::Int(v) => write!(f, "{v}"),
            Parameter::Direction(d) => write!(f, "{d}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParameterKind {
    Int,
    Direction
}

/// Fixed arity and parameter kind of each protocol token.
fn signature(name: &str) -> Option<(usize, ParameterKind)> {
    match name {
        "command" | "takeoff" | "land" | "streamon" | "streamoff" | "emergency" | "stop"
        | "speed?" | "battery?" | "time?" | "wifi?" => Some((0, ParameterKind::Int)),
        "up" | "down" | "left" | "right" | "forward" | "back" | "cw" | "ccw" | "speed" => {
            Some((1, ParameterKind::Int))
        }
        "flip" => Some((1, ParameterKind::Direction)),
        "go" => Some((4, ParameterKind::Int)),
        "curve" => Some((7, ParameterKind::Int)),
        _ => None
    }
}

/// A single message of the Tello SDK text protocol.
///
/// Distances are in cm, angles in degrees and speeds in cm/s. Ranges are
/// not checked here, the drone answers out of range values with an error
/// response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Enter SDK command mode, must precede any other command
    Init,
    TakeOff,
    Land,
    /// Start the video stream on UDP port 11111
    StreamOn,
    StreamOff,
    /// Stop the motors immediately
    Emergency,
    /// Hover in place
    Stop,
    ReadSpeed,
    ReadBattery,
    ReadTime,
    ReadWifi,
    Up(i32),
    Down(i32),
    Left(i32),
    Right(i32),
    Forward(i32),
    Back(i32),
    Clockwise(i32),
    CounterClockwise(i32),
    Speed(i32),
    Flip(FlipDirection),
    /// Fly to (x, y, z) relative to the current position
    Go { x: i32, y: i32, z: i32, speed: i32 },
    /// Fly a curve through (x1, y1, z1) to (x2, y2, z2)
    Curve { x1: i32, y1: i32, z1: i32, x2: i32, y2: i32, z2: i32, speed: i32 }
}

impl Command {
    /// Builds a command from its protocol token and parameters.
    ///
    /// Fails if `name` is unknown, if the number of parameters does not match
    /// the fixed arity of the command, or if a parameter has the wrong type.
    ///
    pub fn build(name: &str, parameters: &[Parameter]) -> Result<Self> {
        let (arity, kind) = signature(name)
            .ok_or_else(|| TelloError::UnknownCommand { name: name.to_string() })?;

        if parameters.len() != arity {
            return Err(TelloError::InvalidArity {
                command: name.to_string(),
                expected: arity,
                actual: parameters.len()
            });
        }

        if kind == ParameterKind::Direction {
            return match parameters[0] {
                Parameter::Direction(d) => Ok(Command::Flip(d)),
                Parameter::Int(v) => Err(TelloError::InvalidSyntax {
                    msg: format!("\"{name}\" expects a direction, got {v}")
                })
            };
        }

        let v = parameters.iter()
            .map(|p| match p {
                Parameter::Int(v) => Ok(*v),
                Parameter::Direction(d) => Err(TelloError::InvalidSyntax {
                    msg: format!("\"{name}\" expects integers, got {d}")
                })
            })
            .collect::<Result<Vec<i32>>>()?;

        let command = match name {
            "command" => Command::Init,
            "takeoff" => Command::TakeOff,
            "land" => Command::Land,
            "streamon" => Command::StreamOn,
            "streamoff" => Command::StreamOff,
            "emergency" => Command::Emergency,
            "stop" => Command::Stop,
            "speed?" => Command::ReadSpeed,
            "battery?" => Command::ReadBattery,
            "time?" => Command::ReadTime,
            "wifi?" => Command::ReadWifi,
            "up" => Command::Up(v[0]),
            "down" => Command::Down(v[0]),
            "left" => Command::Left(v[0]),
            "right" => Command::Right(v[0]),
            "forward" => Command::Forward(v[0]),
            "back" => Command::Back(v[0]),
            "cw" => Command::Clockwise(v[0]),
            "ccw" => Command::CounterClockwise(v[0]),
            "speed" => Command::Speed(v[0]),
            "go" => Command::Go { x: v[0], y: v[1], z: v[2], speed: v[3] },
            "curve" => Command::Curve {
                x1: v[0], y1: v[1], z1: v[2],
                x2: v[3], y2: v[4], z2: v[5],
                speed: v[6]
            },
            _ => return Err(TelloError::UnknownCommand { name: name.to_string() })
        };

        Ok(command)
    }

    /// The protocol token, eg "takeoff" or "go".
    pub fn name(&self) -> &'static str {
        match self {
            Command::Init => "command",
            Command::TakeOff => "takeoff",
            Command::Land => "land",
            Command::StreamOn => "streamon",
            Command::StreamOff => "streamoff",
            Command::Emergency => "emergency",
            Command::Stop => "stop",
            Command::ReadSpeed => "speed?",
            Command::ReadBattery => "battery?",
            Command::ReadTime => "time?",
            Command::ReadWifi => "wifi?",
            Command::Up(_) => "up",
            Command::Down(_) => "down",
            Command::Left(_) => "left",
            Command::Right(_) => "right",
            Command::Forward(_) => "forward",
            Command::Back(_) => "back",
            Command::Clockwise(_) => "cw",
            Command::CounterClockwise(_) => "ccw",
            Command::Speed(_) => "speed",
            Command::Flip(_) => "flip",
            Command::Go { .. } => "go",
            Command::Curve { .. } => "curve",
        }
    }

    pub fn parameters(&self) -> Vec<Parameter> {
        use Parameter::Int;

        match *self {
            Command::Up(v)
            | Command::Down(v)
            | Command::Left(v)
            | Command::Right(v)
            | Command::Forward(v)
            | Command::Back(v)
            | Command::Clockwise(v)
            | Command::CounterClockwise(v)
            | Command::Speed(v) => vec![Int(v)],
            Command::Flip(d) => vec![Parameter::Direction(d)],
            Command::Go { x, y, z, speed } => vec![Int(x), Int(y), Int(z), Int(speed)],
            Command::Curve { x1, y1, z1, x2, y2, z2, speed } => {
                vec![Int(x1), Int(y1), Int(z1), Int(x2), Int(y2), Int(z2), Int(speed)]
            }
            _ => vec![]
        }
    }

    /// The text sent to the drone, eg "go 10 30 40 10".
    pub fn wire_text(&self) -> String {
        let mut text = self.name().to_string();
        for p in self.parameters() {
            text.push(' ');
            text.push_str(&p.to_string());
        }
        text
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wire_text())
    }
}

impl FromStr for Command {
    type Err = TelloError;

    /// Parses command text as typed by a user, eg "up 50".
    fn from_str(s: &str) -> Result<Self> {
        let mut tokens = s.split_whitespace();

        let name = tokens.next()
            .ok_or_else(|| TelloError::InvalidSyntax { msg: "empty command".to_string() })?;

        let (arity, kind) = signature(name)
            .ok_or_else(|| TelloError::UnknownCommand { name: name.to_string() })?;

        let args: Vec<&str> = tokens.collect();
        if args.len() != arity {
            return Err(TelloError::InvalidArity {
                command: name.to_string(),
                expected: arity,
                actual: args.len()
            });
        }

        let parameters = args.iter()
            .map(|a| parse_parameter(a, kind))
            .collect::<Result<Vec<_>>>()?;

        Command::build(name, &parameters)
    }
}

fn parse_parameter(token: &str, kind: ParameterKind) -> Result<Parameter> {
    match kind {
        ParameterKind::Int => token.parse::<i32>()
            .map(Parameter::Int)
            .map_err(|_| TelloError::InvalidSyntax { msg: format!("\"{token}\" is not an integer") }),
        ParameterKind::Direction => {
            let mut chars = token.chars();
            match (chars.next().and_then(FlipDirection::from_char), chars.next()) {
                (Some(d), None) => Ok(Parameter::Direction(d)),
                _ => Err(TelloError::InvalidSyntax { msg: format!("\"{token}\" is not one of l, r, f, b") })
            }
        }
    }
}

pub type CommandSender = mpsc::UnboundedSender<Command>;
pub type CommandReceiver = mpsc::UnboundedReceiver<Command>;

pub fn make_command_channel() -> (CommandSender, CommandReceiver) {
    mpsc::unbounded_channel()
}
