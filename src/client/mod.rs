//! Connecting to a WebSocket server and talking to it.
//!
//! A [`Client`] is a handle to one connection. `connect` hands back the
//! connection's [`Events`] right away and does the dialing and the opening
//! handshake on a dedicated I/O thread, which then keeps reading frames
//! until the connection ends. Sends can come from any thread that holds a
//! clone of the client.
//!
//! ```rust,no_run
//! use wsclient::{Client, Event};
//!
//! let client = Client::new();
//! let events = client.connect("ws://127.0.0.1:8080/chat").unwrap();
//! for event in events {
//!     match event {
//!         Event::Connected => client.send_text("hello"),
//!         Event::TextMessage(text) => {
//!             println!("{}", text);
//!             client.disconnect();
//!         }
//!         other => println!("{:?}", other),
//!     }
//! }
//! ```

mod builder;
mod worker;

pub use self::builder::{ClientBuilder, DEFAULT_CLOSE_TIMEOUT, DEFAULT_TLS_POLL_INTERVAL};

use std::fmt;
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use log::{debug, trace, warn};
use parking_lot::{Condvar, Mutex};

use self::builder::Config;
use crate::events::{Emitter, Event, Events};
use crate::handshake::{Request, Target};
use crate::message::{CloseData, OwnedMessage, CLOSE_ABNORMAL, CLOSE_NORMAL};
use crate::result::{ErrorKind, WebSocketError, WebSocketResult};
use crate::sender::Sender;
use crate::state::ConnectionState;
use crate::stream;

/// Largest payload a control frame can carry.
const MAX_CONTROL_PAYLOAD: usize = 125;

/// What the I/O thread and the client handles share.
struct Session {
	state: ConnectionState,
	/// Second handle on the socket, used to wake the reader.
	closer: Option<TcpStream>,
	emitter: Option<Emitter>,
}

pub(crate) struct Inner {
	config: Config,
	session: Mutex<Session>,
	changed: Condvar,
	sender: Sender,
}

impl Inner {
	fn new(config: Config) -> Inner {
		Inner {
			config,
			session: Mutex::new(Session {
				state: ConnectionState::Idle,
				closer: None,
				emitter: None,
			}),
			changed: Condvar::new(),
			sender: Sender::new(true),
		}
	}

	fn state(&self) -> ConnectionState {
		self.session.lock().state
	}

	/// Moves to `next` if the session is still in `from`.
	fn advance(&self, from: ConnectionState, next: ConnectionState) -> bool {
		let mut session = self.session.lock();
		if session.state != from {
			return false;
		}
		set_state(&mut session, next);
		self.changed.notify_all();
		true
	}

	/// Reports an in-session event.
	fn emit(&self, event: Event) {
		if let Some(emitter) = self.session.lock().emitter.as_mut() {
			emitter.emit(event);
		}
	}

	/// Ends the connection: releases the socket and reports `terminal`,
	/// which is computed from the state the session was in. Only the first
	/// call does anything.
	fn finish_with<F>(&self, terminal: F)
	where
		F: FnOnce(ConnectionState) -> Event,
	{
		let mut session = self.session.lock();
		if session.state == ConnectionState::Closed {
			return;
		}
		let event = terminal(session.state);
		set_state(&mut session, ConnectionState::Closed);
		if let Some(tcp) = session.closer.take() {
			if let Err(e) = stream::shutdown(&tcp) {
				trace!("shutdown failed: {}", e);
			}
		}
		if let Some(emitter) = session.emitter.as_mut() {
			emitter.finish(event);
		}
		drop(session);
		self.sender.detach();
		self.changed.notify_all();
	}

	fn finish(&self, terminal: Event) {
		self.finish_with(move |_| terminal)
	}

	/// Ends the connection because of `err`. A failure after a close was
	/// already under way is the socket going away, not an error.
	fn fail(&self, err: WebSocketError) {
		self.finish_with(move |state| {
			if state == ConnectionState::Closing {
				debug!("connection dropped while closing: {}", err);
				Event::Disconnected {
					code: CLOSE_ABNORMAL,
					reason: String::new(),
				}
			} else {
				warn!("connection failed: {}", err);
				Event::error(err.kind(), &err)
			}
		})
	}

	fn send(&self, message: OwnedMessage) {
		{
			let mut session = self.session.lock();
			match session.state {
				ConnectionState::Open => {}
				ConnectionState::Connecting | ConnectionState::Closing => {
					if let Some(emitter) = session.emitter.as_mut() {
						let err = WebSocketError::NotConnected;
						emitter.notice(Event::error(err.kind(), &err));
					}
					return;
				}
				state => {
					warn!("dropping {:?} message, connection is {}", message.opcode(), state);
					return;
				}
			}
		}
		match self.sender.send_message(message) {
			Ok(()) => {}
			Err(WebSocketError::NotConnected) => trace!("connection ended before the send"),
			Err(e) => self.fail(e),
		}
	}

	fn disconnect(&self, close: Option<CloseData>) {
		{
			let mut session = self.session.lock();
			match session.state {
				ConnectionState::Open => set_state(&mut session, ConnectionState::Closing),
				ConnectionState::Connecting => {
					// the I/O thread notices the state and finishes with 1006
					debug!("aborting connection attempt");
					set_state(&mut session, ConnectionState::Closing);
					if let Some(tcp) = session.closer.as_ref() {
						if let Err(e) = stream::shutdown(tcp) {
							trace!("shutdown failed: {}", e);
						}
					}
					return;
				}
				_ => return,
			}
		}

		debug!("sending close {:?}", close);
		if let Err(e) = self.sender.send_message(OwnedMessage::Close(close)) {
			warn!("could not send close frame: {}", e);
		}

		let deadline = Instant::now() + self.config.close_timeout;
		let mut session = self.session.lock();
		while session.state != ConnectionState::Closed {
			if self.changed.wait_until(&mut session, deadline).timed_out() {
				break;
			}
		}
		let timed_out = session.state != ConnectionState::Closed;
		drop(session);

		if timed_out {
			debug!("no close frame from the server, dropping the connection");
			self.finish(Event::Disconnected {
				code: CLOSE_ABNORMAL,
				reason: "close handshake timed out".to_string(),
			});
		}
	}
}

fn set_state(session: &mut Session, next: ConnectionState) {
	debug_assert!(
		session.state.can_become(next),
		"illegal transition {} -> {}",
		session.state,
		next
	);
	trace!("connection {} -> {}", session.state, next);
	session.state = next;
}

/// Cuts a control frame payload down to what fits in one frame.
fn control_payload(mut data: Vec<u8>) -> Vec<u8> {
	if data.len() > MAX_CONTROL_PAYLOAD {
		warn!("truncating {} byte control payload", data.len());
		data.truncate(MAX_CONTROL_PAYLOAD);
	}
	data
}

/// A WebSocket client for a single connection.
///
/// Cloning gives another handle on the same connection.
#[derive(Clone)]
pub struct Client {
	inner: Arc<Inner>,
}

impl Client {
	/// A client with the default configuration, see `ClientBuilder`.
	pub fn new() -> Client {
		ClientBuilder::new().build()
	}

	pub(crate) fn with_config(config: Config) -> Client {
		Client {
			inner: Arc::new(Inner::new(config)),
		}
	}

	/// Connects to a `ws://` or `wss://` URI.
	///
	/// Returns the connection's events. Every failure after this call,
	/// including an invalid URI, is reported as the last event on the
	/// stream. Fails with `AlreadyStarted` if the client was already used.
	pub fn connect(&self, uri: &str) -> WebSocketResult<Events> {
		self.connect_with_headers(uri, Vec::<(String, String)>::new())
	}

	/// Like `connect`, additionally sending `headers` verbatim and in order
	/// with the upgrade request.
	pub fn connect_with_headers<I, K, V>(&self, uri: &str, headers: I) -> WebSocketResult<Events>
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		let (mut emitter, events) = Emitter::channel();
		let mut session = self.inner.session.lock();
		if session.state != ConnectionState::Idle {
			return Err(WebSocketError::AlreadyStarted);
		}
		set_state(&mut session, ConnectionState::Connecting);

		let target = match Target::parse(uri) {
			Ok(target) => target,
			Err(e) => {
				debug!("rejecting {:?}: {}", uri, e);
				set_state(&mut session, ConnectionState::Closed);
				emitter.finish(Event::error(e.kind(), &e));
				return Ok(events);
			}
		};
		let headers = headers
			.into_iter()
			.map(|(k, v)| (k.into(), v.into()))
			.collect();
		let request = Request::new(&target, headers);
		session.emitter = Some(emitter);
		drop(session);

		let inner = self.inner.clone();
		let spawned = thread::Builder::new()
			.name(format!("ws-io-{}", target.host))
			.spawn(move || worker::run(&inner, &target, &request));
		if let Err(e) = spawned {
			self.inner.finish(Event::error(ErrorKind::Io, e));
		}
		Ok(events)
	}

	/// Sends a text message.
	pub fn send_text<S>(&self, text: S)
	where
		S: Into<String>,
	{
		self.inner.send(OwnedMessage::Text(text.into()))
	}

	/// Sends a binary message.
	pub fn send_binary<B>(&self, data: B)
	where
		B: Into<Vec<u8>>,
	{
		self.inner.send(OwnedMessage::Binary(data.into()))
	}

	/// Sends any message. A `Close` starts the closing handshake like
	/// `disconnect_with` does; control payloads over 125 bytes are cut.
	///
	/// Outside the `Open` state nothing is sent and an
	/// `Error { kind: NotConnected, .. }` event is reported instead.
	pub fn send(&self, message: OwnedMessage) {
		match message {
			OwnedMessage::Close(close) => self.inner.disconnect(close),
			OwnedMessage::Ping(data) => self.inner.send(OwnedMessage::Ping(control_payload(data))),
			OwnedMessage::Pong(data) => self.inner.send(OwnedMessage::Pong(control_payload(data))),
			data => self.inner.send(data),
		}
	}

	/// Sends a ping. The server's pong is only reported if the client
	/// was built with `surface_pongs(true)`.
	pub fn ping<B>(&self, payload: B)
	where
		B: Into<Vec<u8>>,
	{
		self.send(OwnedMessage::Ping(payload.into()))
	}

	/// Closes the connection with status 1000.
	///
	/// Blocks until the server answers the close frame or the close timeout
	/// passes. Does nothing unless the connection is open or connecting;
	/// an attempt still connecting is aborted.
	pub fn disconnect(&self) {
		self.disconnect_with(CLOSE_NORMAL, "")
	}

	/// Closes the connection with a specific status code and reason.
	pub fn disconnect_with<S>(&self, code: u16, reason: S)
	where
		S: Into<String>,
	{
		self.inner.disconnect(Some(CloseData::new(code, reason)))
	}

	/// Whether messages can be sent right now.
	pub fn is_connected(&self) -> bool {
		self.state() == ConnectionState::Open
	}

	/// Where the connection is in its lifecycle.
	pub fn state(&self) -> ConnectionState {
		self.inner.state()
	}
}

impl Default for Client {
	fn default() -> Self {
		Client::new()
	}
}

impl fmt::Debug for Client {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("Client")
			.field("state", &self.state())
			.field("config", &self.inner.config)
			.finish()
	}
}

#[cfg(test)]
mod tests;
