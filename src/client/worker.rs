//! The I/O thread behind a client.
//!
//! It dials, runs the opening handshake, and then is the only reader of the
//! socket until the connection ends. Writes happen on whichever thread sends,
//! through the client's `Sender`.

use std::io::{self, BufReader, Read};
use std::net::TcpStream;

use log::{debug, info, trace, warn};

use super::Inner;
use crate::events::Event;
use crate::handshake::{self, Request, Scheme, Target};
use crate::message::{is_valid_close_code, CloseData, OwnedMessage, CLOSE_NORMAL, CLOSE_NO_STATUS};
use crate::receiver::Receiver;
use crate::result::{WebSocketError, WebSocketResult};
use crate::state::ConnectionState;
use crate::stream::Splittable;

/// The read half of a connection, buffered once for the handshake and the
/// frames after it.
type BoxedReader = BufReader<Box<dyn Read + Send>>;

/// Entry point of the I/O thread.
pub(super) fn run(inner: &Inner, target: &Target, request: &Request) {
	match establish(inner, target, request) {
		Ok(reader) => read_loop(inner, reader),
		Err(e) => inner.fail(e),
	}
}

fn aborted() -> WebSocketError {
	io::Error::new(io::ErrorKind::ConnectionAborted, "connection attempt aborted").into()
}

fn establish(inner: &Inner, target: &Target, request: &Request) -> WebSocketResult<BoxedReader> {
	debug!("dialing {}:{}", target.host, target.port);
	let tcp = TcpStream::connect((target.dial_host.as_str(), target.port))?;
	{
		let mut session = inner.session.lock();
		if session.state != ConnectionState::Connecting {
			return Err(aborted());
		}
		session.closer = Some(tcp.try_clone()?);
	}

	match target.scheme {
		Scheme::Ws => open(inner, tcp, request),
		Scheme::Wss => establish_tls(inner, target, request, tcp),
	}
}

#[cfg(feature = "tls")]
fn establish_tls(
	inner: &Inner,
	target: &Target,
	request: &Request,
	tcp: TcpStream,
) -> WebSocketResult<BoxedReader> {
	use crate::stream::AsTcpStream;

	let connector = match inner.config.tls_connector {
		Some(ref connector) => connector.clone(),
		None => native_tls::TlsConnector::new()?,
	};
	let tls = connector.connect(&target.dial_host, tcp)?;
	// the reader and writers share the session, see `stream::Splittable`
	tls.as_tcp()
		.set_read_timeout(Some(inner.config.tls_poll_interval))?;
	open(inner, tls, request)
}

#[cfg(not(feature = "tls"))]
fn establish_tls(
	_inner: &Inner,
	_target: &Target,
	_request: &Request,
	_tcp: TcpStream,
) -> WebSocketResult<BoxedReader> {
	Err(WebSocketError::Tls(
		"wss:// needs the \"tls\" feature".to_string(),
	))
}

/// Splits the stream, runs the opening handshake over the halves and moves
/// the session to `Open`.
fn open<S>(inner: &Inner, stream: S, request: &Request) -> WebSocketResult<BoxedReader>
where
	S: Splittable,
{
	let (reader, mut writer) = stream.split()?;
	let mut reader = BufReader::new(Box::new(reader) as Box<dyn Read + Send>);
	handshake::negotiate(&mut reader, &mut writer, request)?;
	inner.sender.attach(writer);

	let mut session = inner.session.lock();
	if session.state != ConnectionState::Connecting {
		return Err(aborted());
	}
	super::set_state(&mut session, ConnectionState::Open);
	if let Some(emitter) = session.emitter.as_mut() {
		emitter.connected();
	}
	drop(session);
	inner.changed.notify_all();
	info!("websocket connection open");
	Ok(reader)
}

fn read_loop(inner: &Inner, mut reader: BoxedReader) {
	let mut receiver = Receiver::new_with_limits(
		false,
		inner.config.max_frame_size,
		inner.config.max_message_size,
	);

	loop {
		let message = match receiver.recv_message(&mut reader) {
			Ok(message) => message,
			Err(e) => {
				receiver.reset();
				protocol_failure(inner, e);
				return;
			}
		};

		match message {
			OwnedMessage::Text(text) => inner.emit(Event::TextMessage(text)),
			OwnedMessage::Binary(data) => inner.emit(Event::BinaryMessage(data)),
			OwnedMessage::Ping(data) => {
				trace!("answering ping of {} bytes", data.len());
				match inner.sender.send_message(OwnedMessage::Pong(data)) {
					Ok(()) => {}
					Err(WebSocketError::NotConnected) => return,
					Err(e) => {
						inner.fail(e);
						return;
					}
				}
			}
			OwnedMessage::Pong(data) => {
				if inner.config.surface_pongs {
					inner.emit(Event::Pong(data));
				} else {
					trace!("ignoring pong of {} bytes", data.len());
				}
			}
			OwnedMessage::Close(close) => {
				closed_by_peer(inner, close);
				return;
			}
		}
	}
}

/// Tells the server why the connection is being dropped, when the error
/// has a close code and nothing has been closed yet, then ends it.
fn protocol_failure(inner: &Inner, err: WebSocketError) {
	if let Some(code) = err.close_code() {
		if inner.advance(ConnectionState::Open, ConnectionState::Closing) {
			debug!("closing with {} after: {}", code, err);
			let close = CloseData::new(code, err.to_string());
			if let Err(e) = inner.sender.send_message(OwnedMessage::Close(Some(close))) {
				warn!("could not send close frame: {}", e);
			}
			inner.finish(Event::error(err.kind(), &err));
			return;
		}
	}
	inner.fail(err)
}

fn closed_by_peer(inner: &Inner, close: Option<CloseData>) {
	let (code, reason) = match close {
		Some(ref close) => (close.status_code, close.reason.clone()),
		None => (CLOSE_NO_STATUS, String::new()),
	};

	if inner.advance(ConnectionState::Open, ConnectionState::Closing) {
		let reply = match close {
			Some(_) if is_valid_close_code(code) => Some(CloseData::new(code, "")),
			Some(_) => Some(CloseData::new(CLOSE_NORMAL, "")),
			None => None,
		};
		debug!("server closed with {}, answering {:?}", code, reply);
		if let Err(e) = inner.sender.send_message(OwnedMessage::Close(reply)) {
			warn!("could not answer close frame: {}", e);
		}
	} else {
		debug!("server answered close with {}", code);
	}

	inner.finish(Event::Disconnected { code, reason });
}
