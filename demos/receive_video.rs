extern crate tello_flight;

use tokio::time::{sleep, Duration};

use tello_flight::{Command, Tello, TelloOptions, Result};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut options = TelloOptions::default();

    // we want video...
    let mut video_receiver = options.with_video();

    tokio::spawn(async move {
        while let Some(frame) = video_receiver.recv().await {
            println!("video frame: {} bytes", frame.data.len());
        }
    });

    watch(options).await.unwrap();
}

async fn watch(options: TelloOptions) -> Result<()> {
    let drone = Tello::connect(options).await?;

    drone.execute(&Command::StreamOn).await;
    sleep(Duration::from_secs(10)).await;
    drone.execute(&Command::StreamOff).await;

    if let Some(stats) = drone.stream_stats() {
        println!("{stats:?}");
    }

    drone.close().await
}
