//! Performance benchmarks for the protocol and the authority

use bytes::BytesMut;
use server::broadcast::Broadcast;
use server::client_manager::{ClientManager, SessionHandle};
use server::config::GameRules;
use server::game::GameState;
use shared::{ClientPacket, FrameCodec, PlayerId, ServerPacket, Vec3};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::codec::{Decoder, Encoder};

/// Counts packets instead of sending them
#[derive(Default)]
struct CountingSink {
    sent: usize,
}

impl Broadcast for CountingSink {
    fn send_to(&mut self, _player_id: PlayerId, _packet: &ServerPacket) {
        self.sent += 1;
    }

    fn broadcast(&mut self, _packet: &ServerPacket, _exclude: Option<PlayerId>) {
        self.sent += 1;
    }
}

/// Benchmarks splitting and decoding a stream of position updates
#[test]
fn benchmark_frame_decoding() {
    let packet = ClientPacket::PlayerPosition {
        position: Vec3::new(1.5, 0.0, -3.25),
        rotation: Vec3::new(0.0, 90.0, 0.0),
    };

    let iterations = 50_000;
    let mut codec = FrameCodec::new();
    let mut stream = BytesMut::new();
    for _ in 0..iterations {
        codec.encode(packet.encode(), &mut stream).unwrap();
    }

    let start = Instant::now();
    let mut decoded = 0;
    while let Some(frame) = codec.decode(&mut stream).unwrap() {
        let _ = ClientPacket::decode(&frame).unwrap();
        decoded += 1;
    }
    let duration = start.elapsed();

    println!(
        "Frame decoding: {} packets in {:?} ({:.2} ns/packet)",
        decoded,
        duration,
        duration.as_nanos() as f64 / decoded as f64
    );

    assert_eq!(decoded, iterations);
    assert!(stream.is_empty());
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks encoding the largest common packet
#[test]
fn benchmark_state_encoding() {
    let packet = ServerPacket::PlayerState {
        player_id: 3,
        hits: 2,
        is_flag_holder: true,
        score: 42.0,
        stamina: 0.75,
        animation: "RunForward".to_string(),
    };

    let iterations = 100_000;
    let start = Instant::now();
    let mut total_bytes = 0;
    for _ in 0..iterations {
        total_bytes += packet.encode().len();
    }
    let duration = start.elapsed();

    println!(
        "State encoding: {} packets ({} bytes) in {:?}",
        iterations, total_bytes, duration
    );
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks a full match worth of score ticks plus flag churn
#[test]
fn benchmark_authority_ticks() {
    let rules = GameRules {
        win_score: 1_000.0,
        ..GameRules::default()
    };
    let mut game = GameState::new(rules);
    let mut sink = CountingSink::default();

    let iterations = 100_000;
    let start = Instant::now();
    let mut wins = 0;
    for i in 0..iterations {
        let attacker = (i % 8) as PlayerId + 1;
        match game.holder() {
            None => {
                let _ = game.request_pickup(attacker, Vec3::ZERO, &mut sink);
            }
            Some(holder) if i % 50 == 0 => {
                game.steal(attacker, holder, &mut sink);
            }
            Some(_) => {}
        }
        if game.score_tick(&mut sink).is_some() {
            wins += 1;
        }
    }
    let duration = start.elapsed();

    println!(
        "Authority: {} ticks, {} wins, {} packets in {:?}",
        iterations, wins, sink.sent, duration
    );

    assert!(wins > 0);
    assert_eq!(game.wins(), wins);
    assert!(duration.as_millis() < 2000);
}

/// Stress test for fan-out to a full server
#[test]
fn stress_test_broadcast_fanout() {
    let players = 8;
    let mut clients = ClientManager::new(players);
    let mut receivers = Vec::new();
    for connection_id in 0..players as u64 {
        let (tx, rx) = mpsc::channel(1024);
        clients.add_client(SessionHandle::new(
            connection_id,
            "127.0.0.1:9000".parse().unwrap(),
            tx,
        ));
        receivers.push(rx);
    }

    let rounds = 1_000;
    let start = Instant::now();
    for round in 0..rounds {
        let sender = (round % players) as PlayerId + 1;
        clients.broadcast(
            &ServerPacket::PlayerPosition {
                player_id: sender,
                position: Vec3::new(round as f32, 0.0, 0.0),
                rotation: Vec3::ZERO,
            },
            Some(sender),
        );
    }
    let duration = start.elapsed();

    let delivered: usize = receivers
        .iter_mut()
        .map(|rx| {
            let mut count = 0;
            while rx.try_recv().is_ok() {
                count += 1;
            }
            count
        })
        .sum();

    println!(
        "Broadcast fan-out: {} rounds to {} players in {:?}",
        rounds, players, duration
    );

    // Every round reaches everyone but the sender; queues have room for all.
    assert_eq!(delivered, rounds * (players - 1));
    assert!(duration.as_millis() < 2000);
}
