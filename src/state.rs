use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use log::{debug, warn};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

use crate::errors::{Result, TelloError};

const STATE_BUFFER_SIZE:usize = 1024;

pub type StateSender = mpsc::UnboundedSender<DroneState>;
pub type StateReceiver = mpsc::UnboundedReceiver<DroneState>;

pub fn make_state_channel() -> (StateSender, StateReceiver) {
    mpsc::unbounded_channel()
}

/// The live state of the drone, as pushed to the status port.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DroneState {
    /// Detected mission pad, -1 if none
    pub mission_pad: i16,
    /// Position relative to the mission pad, -100 if none
    pub mission_pad_position: Vector3<i16>,
    pub pitch: i16,
    pub roll: i16,
    pub yaw: i16,
    /// cm/s
    pub velocity: Vector3<i16>,
    /// °C
    pub temperature_low: i16,
    pub temperature_high: i16,
    /// distance from the time of flight sensor, cm
    pub time_of_flight: i16,
    /// cm
    pub height: i16,
    /// %
    pub battery: u8,
    /// cm
    pub barometer: f32,
    /// s
    pub motor_time: u16,
    pub acceleration: Vector3<f32>
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Vector3<T> {
    pub x: T,
    pub y: T,
    pub z: T
}

impl FromStr for DroneState {
    type Err = TelloError;

    /// Parses a state message received from the drone.
    ///
    /// Example message:
    /// "mid:-1;x:-100;y:-100;z:-100;mpry:-1,-1,-1;pitch:0;roll:0;yaw:-3;vgx:0;vgy:0;vgz:1;templ:58;temph:60;tof:71;h:50;bat:82;baro:-57.14;time:14;agx:17.00;agy:-4.00;agz:-956.00;"
    ///
    fn from_str(s: &str) -> Result<Self> {
        let mut state = DroneState::default();

        for field in s.trim().split(';') {
            if field.is_empty() { continue; }

            let (k, v) = field.split_once(':')
                .ok_or_else(|| TelloError::ParseError { msg: field.to_string() })?;

            match k {
                "mid" => state.mission_pad = value_as(v)?,
                "x" => state.mission_pad_position.x = value_as(v)?,
                "y" => state.mission_pad_position.y = value_as(v)?,
                "z" => state.mission_pad_position.z = value_as(v)?,
                "pitch" => state.pitch = value_as(v)?,
                "roll" => state.roll = value_as(v)?,
                "yaw" => state.yaw = value_as(v)?,
                "vgx" => state.velocity.x = value_as(v)?,
                "vgy" => state.velocity.y = value_as(v)?,
                "vgz" => state.velocity.z = value_as(v)?,
                "templ" => state.temperature_low = value_as(v)?,
                "temph" => state.temperature_high = value_as(v)?,
                "tof" => state.time_of_flight = value_as(v)?,
                "h" => state.height = value_as(v)?,
                "bat" => state.battery = value_as(v)?,
                "baro" => state.barometer = value_as(v)?,
                "time" => state.motor_time = value_as(v)?,
                "agx" => state.acceleration.x = value_as(v)?,
                "agy" => state.acceleration.y = value_as(v)?,
                "agz" => state.acceleration.z = value_as(v)?,
                _ => {}
            }
        }

        Ok(state)
    }
}

fn value_as<T: FromStr>(s: &str) -> Result<T> {
    s.parse::<T>().map_err(|_| TelloError::ParseError { msg: s.to_string() })
}

/// Forwards state pushes arriving on `sock` until the receiver goes away.
pub(crate) async fn listen_for_state(sock: Arc<UdpSocket>, sender: StateSender) {
    let local_address = sock.local_addr().map(|a| a.to_string()).unwrap_or_default();
    debug!("[State] START LISTENING at {local_address}");

    let mut buf = vec![0; STATE_BUFFER_SIZE];
    loop {
        let (n, from): (usize, SocketAddr) = match sock.recv_from(&mut buf).await {
            Ok(r) => r,
            Err(err) => {
                warn!("[State] receive failed ({err})");
                sleep(Duration::from_millis(100)).await;
                continue;
            }
        };

        let message = String::from_utf8_lossy(&buf[..n]);
        let state = match message.parse::<DroneState>() {
            Ok(state) => state,
            Err(err) => {
                warn!("[State] bad message from {from} - {err}");
                continue;
            }
        };

        if sender.send(state).is_err() {
            debug!("[State] receiver dropped, STOP LISTENING");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE:&str = "mid:-1;x:-100;y:-100;z:-100;mpry:-1,-1,-1;pitch:0;roll:2;yaw:-3;vgx:0;vgy:0;vgz:1;templ:58;temph:60;tof:71;h:50;bat:82;baro:-57.14;time:14;agx:17.00;agy:-4.00;agz:-956.00;\r\n";

    #[test]
    fn parses_state_message() {
        let state: DroneState = MESSAGE.parse().unwrap();

        assert_eq!(state.mission_pad, -1);
        assert_eq!(state.mission_pad_position, Vector3 { x: -100, y: -100, z: -100 });
        assert_eq!(state.roll, 2);
        assert_eq!(state.yaw, -3);
        assert_eq!(state.velocity.z, 1);
        assert_eq!(state.temperature_high, 60);
        assert_eq!(state.time_of_flight, 71);
        assert_eq!(state.height, 50);
        assert_eq!(state.battery, 82);
        assert_eq!(state.barometer, -57.14);
        assert_eq!(state.motor_time, 14);
        assert_eq!(state.acceleration.z, -956.0);
    }

    #[test]
    fn rejects_malformed_fields() {
        assert!(matches!("bat".parse::<DroneState>(), Err(TelloError::ParseError { .. })));
        assert!(matches!("bat:lots".parse::<DroneState>(), Err(TelloError::ParseError { msg }) if msg == "lots"));
    }

    #[tokio::test]
    async fn forwards_pushed_state() {
        let sock = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let target = sock.local_addr().unwrap();
        let (tx, mut rx) = make_state_channel();
        let listener = tokio::spawn(listen_for_state(sock, tx));

        let drone = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        drone.send_to(b"garbage", target).await.unwrap();
        drone.send_to(b"bat:55;h:120;", target).await.unwrap();

        let state = rx.recv().await.unwrap();
        assert_eq!(state.battery, 55);
        assert_eq!(state.height, 120);

        drop(rx);
        drone.send_to(b"bat:54;", target).await.unwrap();
        listener.await.unwrap();
    }
}
