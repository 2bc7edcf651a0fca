//! Owner that sends 1000 counting bytes once a second to its single peer.
//!
//! Run with:
//!   cargo run --example pattern-owner
//!
//! In another terminal:
//!   cargo run --example pattern-reader

use std::time::Duration;

use pipeframe::endpoint::{Direction, Owner};

const CHANNEL: &str = "interface_pipe";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut owner = Owner::create(CHANNEL, Direction::Outbound)?;
    eprintln!("Waiting for a reader on {}", owner.name());

    let mut channel = owner.wait()?;
    eprintln!("Reader connected");

    let payload: Vec<u8> = (0..1000u32).map(|i| i as u8).collect();
    loop {
        if let Err(e) = channel.send(&payload) {
            eprintln!("Reader went away: {e}");
            break;
        }
        std::thread::sleep(Duration::from_secs(1));
    }

    channel.close();
    Ok(())
}
