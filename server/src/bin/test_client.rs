//! Headless click bot for exercising a running server by hand or in numbers

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use log::{info, warn};
use rand::Rng;
use shared::{ClientMessage, ServerMessage};
use tokio::time::{sleep, Duration, Instant};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

#[derive(Parser, Debug)]
#[command(author, version, about = "Connects to the click server and clicks at random")]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Display name to request
    #[arg(short, long, default_value = "bot")]
    name: String,

    /// How long to stay connected, in seconds
    #[arg(short, long, default_value = "45")]
    duration: u64,

    /// Shortest pause between clicks, in milliseconds
    #[arg(long, default_value = "50")]
    min_delay: u64,

    /// Longest pause between clicks, in milliseconds
    #[arg(long, default_value = "400")]
    max_delay: u64,
}

fn click_delay(args: &Args) -> Duration {
    let max = args.max_delay.max(args.min_delay + 1);
    Duration::from_millis(rand::thread_rng().gen_range(args.min_delay..max))
}

fn encode(message: &ClientMessage) -> Result<Message, serde_json::Error> {
    Ok(Message::Text(serde_json::to_string(message)?))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut url = Url::parse(&format!("ws://{}/", args.server))?;
    url.query_pairs_mut().append_pair("name", &args.name);

    info!("Connecting to {}", url);
    let (socket, _) = connect_async(url.as_str()).await?;
    let (mut sink, mut stream) = socket.split();

    sink.send(encode(&ClientMessage::Start)?).await?;

    let stop_at = Instant::now() + Duration::from_secs(args.duration);
    let mut next_click = Instant::now() + click_delay(&args);
    let mut clicks = 0u64;

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(stop_at) => break,

            _ = tokio::time::sleep_until(next_click) => {
                sink.send(encode(&ClientMessage::Click)?).await?;
                clicks += 1;
                next_click = Instant::now() + click_delay(&args);
            }

            incoming = stream.next() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => {
                        warn!("Server closed the connection");
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(e.into()),
                };

                match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(ServerMessage::AssignId { id, name }) => info!("Joined as {} (id {})", name, id),
                    Ok(ServerMessage::RoundStart { time_left }) => info!("Round started: {}s", time_left),
                    Ok(ServerMessage::GameOver { winner, scores }) => {
                        info!("Round over, winner {:?}, scores {:?}", winner, scores)
                    }
                    Ok(ServerMessage::State { players, time_left }) => {
                        log::debug!("{}s left, {} players", time_left, players.len())
                    }
                    Err(e) => warn!("Unreadable server message: {}", e),
                }
            }
        }
    }

    info!("Sent {} clicks, disconnecting", clicks);
    sink.close().await?;

    // Give the close frame a moment to flush
    sleep(Duration::from_millis(100)).await;
    Ok(())
}
