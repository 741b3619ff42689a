//! The result type used within wsclient

use std::io;
use std::str::Utf8Error;

use thiserror::Error;

/// The type used for WebSocket results
pub type WebSocketResult<T> = Result<T, WebSocketError>;

/// Represents a WebSocket error
#[derive(Debug, Error)]
pub enum WebSocketError {
	/// The URI has no scheme, or a scheme other than `ws` / `wss`
	#[error("URL scheme has to be \"ws\" or \"wss\", got {0:?}")]
	UrlScheme(String),
	/// The URI could not be parsed, or has no host
	#[error("invalid URL: {0}")]
	Url(String),
	/// The opening handshake failed
	#[error("handshake failed: {0}")]
	Handshake(#[from] HandshakeError),
	/// A WebSocket protocol error
	#[error("protocol error: {0}")]
	Protocol(&'static str),
	/// A text message or close reason was not valid UTF-8
	#[error("invalid UTF-8 payload: {0}")]
	Utf8(#[from] Utf8Error),
	/// An input/output error
	#[error("I/O failure: {0}")]
	Io(#[from] io::Error),
	/// A TLS error, or `wss` requested without TLS support
	#[error("TLS failure: {0}")]
	Tls(String),
	/// A message was sent while the connection was not open
	#[error("not connected")]
	NotConnected,
	/// `connect` was called on a client that has already been used
	#[error("client has already been started")]
	AlreadyStarted,
	/// A frame or message exceeded the configured size limit
	#[error("{what} of {size} bytes exceeds the limit of {limit} bytes")]
	TooLarge {
		/// Either "frame" or "message"
		what: &'static str,
		/// Declared or accumulated size
		size: u64,
		/// The configured limit
		limit: u64,
	},
}

impl WebSocketError {
	/// The classification carried on `Event::Error`.
	pub fn kind(&self) -> ErrorKind {
		match *self {
			WebSocketError::UrlScheme(_) | WebSocketError::Url(_) => ErrorKind::Url,
			WebSocketError::Handshake(_) => ErrorKind::Handshake,
			WebSocketError::Protocol(_)
			| WebSocketError::Utf8(_)
			| WebSocketError::TooLarge { .. } => ErrorKind::Protocol,
			WebSocketError::Io(_) => ErrorKind::Io,
			WebSocketError::Tls(_) => ErrorKind::Tls,
			WebSocketError::NotConnected => ErrorKind::NotConnected,
			WebSocketError::AlreadyStarted => ErrorKind::AlreadyStarted,
		}
	}

	/// Close status code to send the peer before dropping the connection
	/// because of this error, if any.
	pub(crate) fn close_code(&self) -> Option<u16> {
		match *self {
			WebSocketError::Protocol(_) => Some(1002),
			WebSocketError::Utf8(_) => Some(1007),
			WebSocketError::TooLarge { .. } => Some(1009),
			_ => None,
		}
	}
}

impl From<url::ParseError> for WebSocketError {
	fn from(err: url::ParseError) -> WebSocketError {
		WebSocketError::Url(err.to_string())
	}
}

#[cfg(feature = "tls")]
impl From<native_tls::Error> for WebSocketError {
	fn from(err: native_tls::Error) -> WebSocketError {
		WebSocketError::Tls(err.to_string())
	}
}

#[cfg(feature = "tls")]
impl<S> From<native_tls::HandshakeError<S>> for WebSocketError {
	fn from(err: native_tls::HandshakeError<S>) -> WebSocketError {
		match err {
			native_tls::HandshakeError::Failure(e) => e.into(),
			native_tls::HandshakeError::WouldBlock(_) => {
				WebSocketError::Tls("TLS handshake interrupted".to_string())
			}
		}
	}
}

/// Reasons the opening handshake can fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeError {
	/// The stream closed before a status line arrived
	#[error("received no reply from server")]
	NoReply,
	/// The server answered with something other than `101 Switching Protocols`
	#[error("unexpected status {code} {reason}")]
	Status {
		/// HTTP status code
		code: u16,
		/// Reason phrase, possibly empty
		reason: String,
	},
	/// `Sec-WebSocket-Accept` did not match the key that was sent
	#[error("bad Sec-WebSocket-Accept header value")]
	BadAccept,
	/// The response carried no `Sec-WebSocket-Accept` header
	#[error("no Sec-WebSocket-Accept header")]
	MissingAccept,
	/// The response could not be parsed
	#[error("malformed response: {0}")]
	Malformed(&'static str),
}

/// Error classification delivered with `Event::Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	/// Bad scheme, unparseable URI or missing host
	Url,
	/// The opening handshake failed
	Handshake,
	/// The server violated the framing protocol
	Protocol,
	/// Reading from or writing to the stream failed
	Io,
	/// TLS setup failed
	Tls,
	/// A send was attempted outside the `Open` state
	NotConnected,
	/// `connect` was called twice
	AlreadyStarted,
}
