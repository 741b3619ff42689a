//! The `Sec-WebSocket-Key` / `Sec-WebSocket-Accept` pair of the opening handshake.

use sha1::{Digest, Sha1};
use std::fmt::{self, Debug};

/// WebSocket header names
pub mod names {
	/// Key sent by the client
	pub const KEY: &str = "Sec-WebSocket-Key";
	/// Proof of the key returned by the server
	pub const ACCEPT: &str = "Sec-WebSocket-Accept";
	/// Protocol version sent by the client
	pub const VERSION: &str = "Sec-WebSocket-Version";
}

static MAGIC_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Represents a Sec-WebSocket-Key header.
///
/// Only uniqueness matters for the key, not secrecy.
#[derive(PartialEq, Clone, Copy, Default)]
pub struct WebSocketKey(pub [u8; 16]);

impl Debug for WebSocketKey {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "WebSocketKey({})", self.serialize())
	}
}

impl WebSocketKey {
	/// Generate a new, random WebSocketKey
	pub fn new() -> WebSocketKey {
		WebSocketKey(rand::random())
	}

	/// Return the Base64 encoding of this WebSocketKey
	pub fn serialize(&self) -> String {
		base64::encode(&self.0)
	}
}

/// Represents a Sec-WebSocket-Accept header
#[derive(PartialEq, Clone, Copy)]
pub struct WebSocketAccept([u8; 20]);

impl Debug for WebSocketAccept {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "WebSocketAccept({})", self.serialize())
	}
}

impl WebSocketAccept {
	/// Create a new WebSocketAccept from the given WebSocketKey
	pub fn new(key: &WebSocketKey) -> WebSocketAccept {
		WebSocketAccept::from_serialized_key(&key.serialize())
	}

	/// Computes the accept value for an already base64 encoded key.
	pub fn from_serialized_key(serialized: &str) -> WebSocketAccept {
		let mut concat_key = String::with_capacity(serialized.len() + MAGIC_GUID.len());
		concat_key.push_str(serialized);
		concat_key.push_str(MAGIC_GUID);
		let hash = Sha1::digest(concat_key.as_bytes());
		let mut array = [0u8; 20];
		array.copy_from_slice(&hash[..]);
		WebSocketAccept(array)
	}

	/// Return the Base64 encoding of this WebSocketAccept
	pub fn serialize(&self) -> String {
		base64::encode(&self.0[..])
	}

	/// Whether a received header value proves this accept, ignoring
	/// surrounding whitespace.
	pub fn matches(&self, received: &str) -> bool {
		received.trim() == self.serialize()
	}
}
