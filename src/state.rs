//! Connection lifecycle.

use std::fmt;

/// Where a connection is in its lifecycle.
///
/// A client walks `Idle -> Connecting -> Open -> Closing -> Closed` and
/// may skip ahead but never back. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
	/// `connect` hasn't been called yet.
	Idle,
	/// Dialing or running the opening handshake.
	Connecting,
	/// Messages can be exchanged.
	Open,
	/// A close frame went out or came in, the socket is about to go away.
	Closing,
	/// The socket has been released.
	Closed,
}

impl ConnectionState {
	/// Whether moving from `self` to `next` is a legal step.
	pub fn can_become(self, next: ConnectionState) -> bool {
		use self::ConnectionState::*;
		match (self, next) {
			(Idle, Connecting)
			| (Connecting, Open)
			| (Connecting, Closing)
			| (Connecting, Closed)
			| (Open, Closing)
			| (Open, Closed)
			| (Closing, Closed) => true,
			_ => false,
		}
	}

	/// Whether the connection is done for good.
	pub fn is_terminal(self) -> bool {
		self == ConnectionState::Closed
	}
}

impl Default for ConnectionState {
	fn default() -> Self {
		ConnectionState::Idle
	}
}

impl fmt::Display for ConnectionState {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		let name = match *self {
			ConnectionState::Idle => "idle",
			ConnectionState::Connecting => "connecting",
			ConnectionState::Open => "open",
			ConnectionState::Closing => "closing",
			ConnectionState::Closed => "closed",
		};
		f.write_str(name)
	}
}
