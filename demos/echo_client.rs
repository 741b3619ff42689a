//! Talks to a WebSocket echo server from the terminal.
//!
//! Every line typed is sent as a text message. `/ping` sends a ping and
//! `/close` closes the connection.
//!
//! ```text
//! RUST_LOG=wsclient=debug cargo run --example echo-client -- ws://127.0.0.1:2794
//! ```

use std::env;
use std::io::{stdin, BufRead};
use std::thread;

use tracing_subscriber::EnvFilter;
use wsclient::{ClientBuilder, Event};

fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env())
		.init();

	let uri = env::args()
		.nth(1)
		.unwrap_or_else(|| "ws://127.0.0.1:2794".to_string());

	let client = ClientBuilder::new().surface_pongs(true).build();
	let events = match client.connect(&uri) {
		Ok(events) => events,
		Err(e) => {
			eprintln!("{}", e);
			return;
		}
	};

	let printer = thread::spawn(move || {
		for event in events {
			match event {
				Event::Connected => println!("Connected to {}", uri),
				Event::TextMessage(text) => println!("Recv: {}", text),
				Event::BinaryMessage(data) => println!("Recv: {} bytes", data.len()),
				Event::Pong(_) => println!("Pong"),
				Event::Disconnected { code, reason } => {
					println!("Disconnected: {} {}", code, reason)
				}
				Event::Error { kind, message } => println!("Error ({:?}): {}", kind, message),
			}
		}
	});

	let input = stdin();
	for line in input.lock().lines() {
		let line = match line {
			Ok(line) => line,
			Err(_) => break,
		};
		match line.trim() {
			"/close" => break,
			"/ping" => client.ping(b"PING".to_vec()),
			text => client.send_text(text),
		}
	}

	client.disconnect();
	let _ = printer.join();
}
