//! Scripted probe client: connects, grabs the flag, and walks around while
//! printing everything the server sends.

use clap::Parser;
use futures::{SinkExt, StreamExt};
use shared::{ClientPacket, FrameCodec, ServerPacket, Vec3, DEFAULT_PORT};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{interval, sleep_until, Instant};
use tokio_util::codec::Framed;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value_t = format!("127.0.0.1:{}", DEFAULT_PORT))]
    server: String,

    /// How long to stay connected, in seconds
    #[arg(short = 'd', long, default_value = "5")]
    duration: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    println!("Connecting to {}", args.server);
    let stream = TcpStream::connect(&args.server).await?;
    println!("Connected from {}", stream.local_addr()?);
    let mut framed = Framed::new(stream, FrameCodec::new());

    // Wait for the slot assignment before doing anything else
    let player_id = loop {
        match framed.next().await {
            Some(Ok(frame)) => match ServerPacket::decode(&frame) {
                Ok(ServerPacket::Welcome { player_id }) => break player_id,
                Ok(packet) => println!("Received before welcome: {:?}", packet),
                Err(e) => println!("Undecodable packet: {}", e),
            },
            Some(Err(e)) => return Err(e.into()),
            None => {
                println!("Server closed the connection (full?)");
                return Ok(());
            }
        }
    };
    println!("Assigned player id {}", player_id);

    framed.send(ClientPacket::Welcome { player_id }.encode()).await?;
    framed
        .send(
            ClientPacket::RequestFlagPickup {
                position: Vec3::ZERO,
            }
            .encode(),
        )
        .await?;
    println!("Requested flag pickup");

    let deadline = Instant::now() + Duration::from_secs(args.duration);
    let mut moves = interval(Duration::from_millis(200));
    let mut step = 0.0f32;

    loop {
        tokio::select! {
            frame = framed.next() => match frame {
                Some(Ok(frame)) => match ServerPacket::decode(&frame) {
                    Ok(packet) => println!("Received: {:?}", packet),
                    Err(e) => println!("Undecodable packet: {}", e),
                },
                Some(Err(e)) => {
                    println!("Connection error: {}", e);
                    break;
                }
                None => {
                    println!("Server closed the connection");
                    break;
                }
            },

            _ = moves.tick() => {
                step += 0.1;
                let position = Vec3::new(step.cos() * 3.0, 0.0, step.sin() * 3.0);
                let packet = ClientPacket::PlayerPosition {
                    position,
                    rotation: Vec3::new(0.0, step.to_degrees(), 0.0),
                };
                framed.send(packet.encode()).await?;
            }

            _ = sleep_until(deadline) => {
                println!("Done after {}s", args.duration);
                break;
            }
        }
    }

    Ok(())
}
