//! Peer that prints the size and first bytes of each payload it receives.
//!
//! Start `pattern-owner` first, then:
//!   cargo run --example pattern-reader

use pipeframe::endpoint::{open, Access};

const CHANNEL: &str = "interface_pipe";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut channel = open(CHANNEL, Access::Read)?;
    eprintln!("Connected to {CHANNEL}");

    loop {
        match channel.receive() {
            Ok(payload) => {
                let head = &payload[..payload.len().min(8)];
                eprintln!("Received {} bytes: {:?}...", payload.len(), head);
            }
            Err(e) => {
                eprintln!("Channel closed: {e}");
                break;
            }
        }
    }

    Ok(())
}
