extern crate tello_flight;

use tello_flight::{Command, ConnectionPolicy, Tello, TelloOptions, Result};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    fly_path().await.unwrap();
}

async fn fly_path() -> Result<()> {
    let path = [
        Command::StreamOn,
        Command::TakeOff,
        Command::Up(50),
        Command::Forward(100),
        Command::Clockwise(180),
        Command::Forward(100),
        Command::CounterClockwise(180),
        Command::Land,
        Command::StreamOff,
    ];

    let mut options = TelloOptions::default()
        .connection(ConnectionPolicy::TimeOut);

    let mut video_receiver = options.with_video();
    tokio::spawn(async move {
        while video_receiver.recv().await.is_some() {}
    });

    let drone = Tello::connect(options).await?;

    for command in path.iter() {
        let outcome = drone.execute(command).await;
        if outcome.is_error() {
            println!("{command} failed ({}), landing", outcome.message());
            drone.execute(&Command::Land).await;
            break;
        }
    }

    if let Some(stats) = drone.stream_stats() {
        println!("captured {} frames ({} bytes)", stats.frames, stats.bytes);
    }

    drone.close().await
}
