//! The event stream a connection reports to.
//!
//! Every connection has exactly one subscriber, an [`Events`] handle. Events
//! arrive in the order things happened on the wire: `Connected` first (if
//! the handshake succeeds), then messages and notices, and at most one
//! terminal `Disconnected` or `Error` after which the stream ends.
use std::fmt;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
pub use crossbeam_channel::{RecvTimeoutError, TryRecvError};
use log::{trace, warn};

use crate::result::ErrorKind;

/// Something that happened on a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
	/// The opening handshake succeeded.
	Connected,
	/// A complete text message arrived.
	TextMessage(String),
	/// A complete binary message arrived.
	BinaryMessage(Vec<u8>),
	/// A pong arrived. Only reported when the client was built with
	/// `surface_pongs(true)`.
	Pong(Vec<u8>),
	/// The connection closed. `code` is the peer's status, 1005 when it
	/// sent none and 1006 when no close frame was exchanged.
	Disconnected {
		/// Close status code
		code: u16,
		/// Close reason, possibly empty
		reason: String,
	},
	/// Something went wrong. This ends the stream unless `kind` is
	/// `ErrorKind::NotConnected`, which only reports a rejected send.
	Error {
		/// What failed
		kind: ErrorKind,
		/// Human readable description
		message: String,
	},
}

impl Event {
	pub(crate) fn error<E: fmt::Display>(kind: ErrorKind, err: E) -> Event {
		Event::Error {
			kind,
			message: err.to_string(),
		}
	}
}

/// Receiving end of a connection's events.
///
/// Dropping this stops delivery but leaves the connection up, use
/// `Client::disconnect` to close it.
#[derive(Debug)]
pub struct Events {
	rx: Receiver<Event>,
}

impl Events {
	/// Blocks until the next event. Returns `None` once the stream has ended.
	pub fn recv(&self) -> Option<Event> {
		self.rx.recv().ok()
	}

	/// Like `recv`, but gives up after `timeout`.
	pub fn recv_timeout(&self, timeout: Duration) -> Result<Event, RecvTimeoutError> {
		self.rx.recv_timeout(timeout)
	}

	/// Takes the next event if one is ready.
	pub fn try_recv(&self) -> Result<Event, TryRecvError> {
		self.rx.try_recv()
	}

	/// Blocking iterator over the remaining events.
	pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
		self.rx.iter()
	}

	/// Stops listening. Same as dropping the handle.
	pub fn cancel(self) {}
}

impl Iterator for Events {
	type Item = Event;

	fn next(&mut self) -> Option<Event> {
		self.recv()
	}
}

/// Producing end, owned by the connection.
pub(crate) struct Emitter {
	tx: Option<Sender<Event>>,
	held: Vec<Event>,
	connected: bool,
	finished: bool,
}

impl Emitter {
	pub(crate) fn channel() -> (Emitter, Events) {
		let (tx, rx) = unbounded();
		let emitter = Emitter {
			tx: Some(tx),
			held: Vec::new(),
			connected: false,
			finished: false,
		};
		(emitter, Events { rx })
	}

	/// Delivers an in-session event.
	pub(crate) fn emit(&mut self, event: Event) {
		if self.finished {
			trace!("dropping {:?} after the terminal event", event);
			return;
		}
		self.deliver(event);
	}

	/// Delivers a non-terminal notice, holding it back until `Connected`
	/// has gone out.
	pub(crate) fn notice(&mut self, event: Event) {
		if !self.connected && !self.finished {
			self.held.push(event);
		} else {
			self.emit(event);
		}
	}

	/// Reports `Connected` followed by anything held back.
	pub(crate) fn connected(&mut self) {
		if self.connected || self.finished {
			return;
		}
		self.connected = true;
		self.deliver(Event::Connected);
		self.release_held();
	}

	/// Reports the terminal event and ends the stream. Only the first call
	/// has any effect; returns whether this was it.
	pub(crate) fn finish(&mut self, terminal: Event) -> bool {
		if self.finished {
			trace!("already finished, dropping {:?}", terminal);
			return false;
		}
		self.release_held();
		self.deliver(terminal);
		self.finished = true;
		self.tx = None;
		true
	}

	pub(crate) fn is_finished(&self) -> bool {
		self.finished
	}

	fn release_held(&mut self) {
		for event in std::mem::replace(&mut self.held, Vec::new()) {
			self.deliver(event);
		}
	}

	fn deliver(&mut self, event: Event) {
		let gone = match self.tx {
			Some(ref tx) => tx.send(event).is_err(),
			None => false,
		};
		if gone {
			warn!("event subscriber went away, no more events will be delivered");
			self.tx = None;
		}
	}
}
