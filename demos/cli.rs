//////////////////////////////////////////////////////////////////////////////
//
// Fly the drone by typing commands, eg "takeoff", "up 50", "flip l", "land"
//
// Usage: cargo run --example cli [drone IP]
//
// "end" closes the connection. The link is kept alive in between commands
// and any video is passed on to a channel once "streamon" is entered.
//
//////////////////////////////////////////////////////////////////////////////

extern crate tello_flight;

use std::io::BufRead;

use tello_flight::{Command, CommandSender, Tello, TelloOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut options = TelloOptions::default();
    if let Some(host) = std::env::args().nth(1) {
        options = options.drone_host(host);
    }

    // we want video...
    let mut video_receiver = options.with_video();
    tokio::spawn(async move {
        while let Some(frame) = video_receiver.recv().await {
            log::debug!("video frame: {} bytes", frame.data.len());
        }
    });

    // ...and to send commands typed at the terminal
    let command_sender = options.with_command();
    std::thread::spawn(move || read_commands(command_sender));

    let drone = Tello::connect(options).await?;
    drone.handle_commands().await?;
    drone.close().await?;

    Ok(())
}

fn read_commands(command_sender: CommandSender) {
    println!("Please enter your command:");

    for line in std::io::stdin().lock().lines() {
        let Ok(line) = line else { break };

        if line.trim() == "end" {
            break;
        }

        match line.parse::<Command>() {
            Ok(command) => {
                if command_sender.send(command).is_err() {
                    break;
                }
            }
            Err(err) => println!("{err}")
        }
    }
}
