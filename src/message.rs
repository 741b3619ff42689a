//! Module containing the message types exchanged over a connection.
use crate::dataframe::{DataFrame, Opcode};
use crate::result::{WebSocketError, WebSocketResult};
use crate::util::bytes_to_string;
use byteorder::{BigEndian, ByteOrder};

/// Status code for a normal closure.
pub const CLOSE_NORMAL: u16 = 1000;
/// Reported when a close frame carried no status code.
pub const CLOSE_NO_STATUS: u16 = 1005;
/// Reported when the connection ended without a close frame from the peer.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Longest reason that fits in a control frame next to the 2 byte code.
const MAX_CLOSE_REASON: usize = 123;

/// Represents an owned WebSocket message.
///
/// `Text` and `Binary` are data messages, possibly reassembled from several
/// frames. The control variants always travel in a single frame.
#[derive(Eq, PartialEq, Clone, Debug)]
pub enum OwnedMessage {
	/// A message containing UTF-8 text data
	Text(String),
	/// A message containing binary data
	Binary(Vec<u8>),
	/// A message which indicates closure of the WebSocket connection.
	/// This message may or may not contain data.
	Close(Option<CloseData>),
	/// A ping message - should be responded to with a pong message
	/// carrying the same data.
	Ping(Vec<u8>),
	/// A pong message, sent in response to a Ping message.
	Pong(Vec<u8>),
}

impl OwnedMessage {
	/// Checks if this message is a close message.
	///
	///```rust
	///# use wsclient::OwnedMessage;
	///assert!(OwnedMessage::Close(None).is_close());
	///```
	pub fn is_close(&self) -> bool {
		match *self {
			OwnedMessage::Close(_) => true,
			_ => false,
		}
	}

	/// Checks if this message is a control message.
	/// Control messages are either `Close`, `Ping`, or `Pong`.
	///
	///```rust
	///# use wsclient::OwnedMessage;
	///assert!(OwnedMessage::Ping(vec![]).is_control());
	///assert!(!OwnedMessage::Text("1337".to_string()).is_control());
	///```
	pub fn is_control(&self) -> bool {
		match *self {
			OwnedMessage::Close(_) | OwnedMessage::Ping(_) | OwnedMessage::Pong(_) => true,
			_ => false,
		}
	}

	/// Checks if this message is a data message.
	/// Data messages are either `Text` or `Binary`.
	pub fn is_data(&self) -> bool {
		!self.is_control()
	}

	/// The opcode this message is sent with.
	pub fn opcode(&self) -> Opcode {
		match *self {
			OwnedMessage::Text(_) => Opcode::Text,
			OwnedMessage::Binary(_) => Opcode::Binary,
			OwnedMessage::Close(_) => Opcode::Close,
			OwnedMessage::Ping(_) => Opcode::Ping,
			OwnedMessage::Pong(_) => Opcode::Pong,
		}
	}

	/// Converts this message into the single, unfragmented frame that
	/// carries it.
	pub fn into_dataframe(self) -> DataFrame {
		let opcode = self.opcode();
		let data = match self {
			OwnedMessage::Text(txt) => txt.into_bytes(),
			OwnedMessage::Binary(bin) => bin,
			OwnedMessage::Ping(data) | OwnedMessage::Pong(data) => data,
			OwnedMessage::Close(None) => Vec::new(),
			OwnedMessage::Close(Some(close)) => close.into_bytes(),
		};
		DataFrame::new(true, opcode, data)
	}

	/// Encodes this message as one masked client frame.
	pub fn encode(self) -> WebSocketResult<Vec<u8>> {
		self.into_dataframe().encode(true)
	}
}

impl From<String> for OwnedMessage {
	fn from(text: String) -> Self {
		OwnedMessage::Text(text)
	}
}

impl<'a> From<&'a str> for OwnedMessage {
	fn from(text: &'a str) -> Self {
		OwnedMessage::Text(text.to_string())
	}
}

impl From<Vec<u8>> for OwnedMessage {
	fn from(buf: Vec<u8>) -> Self {
		OwnedMessage::Binary(buf)
	}
}

/// Represents data contained in a Close message
#[derive(Eq, PartialEq, Clone, Debug)]
pub struct CloseData {
	/// The status-code of the CloseData
	pub status_code: u16,
	/// The reason-phrase of the CloseData
	pub reason: String,
}

impl CloseData {
	/// Create a new CloseData object.
	///
	/// Reasons longer than 123 bytes are cut at a character boundary so the
	/// frame stays within the control frame limit.
	pub fn new<S>(status_code: u16, reason: S) -> CloseData
	where
		S: Into<String>,
	{
		let mut reason = reason.into();
		if reason.len() > MAX_CLOSE_REASON {
			let mut end = MAX_CLOSE_REASON;
			while !reason.is_char_boundary(end) {
				end -= 1;
			}
			reason.truncate(end);
		}
		CloseData {
			status_code,
			reason,
		}
	}

	/// Parses the payload of a close frame.
	///
	/// An empty payload carries no status; a single byte is malformed.
	pub fn parse(payload: &[u8]) -> WebSocketResult<Option<CloseData>> {
		match payload.len() {
			0 => Ok(None),
			1 => Err(WebSocketError::Protocol("Close frame payload of one byte")),
			_ => {
				let status_code = BigEndian::read_u16(&payload[..2]);
				let reason = bytes_to_string(&payload[2..])?;
				Ok(Some(CloseData {
					status_code,
					reason,
				}))
			}
		}
	}

	/// Convert this into a vector of bytes
	pub fn into_bytes(self) -> Vec<u8> {
		let mut buf = Vec::with_capacity(2 + self.reason.len());
		buf.extend_from_slice(&self.status_code.to_be_bytes());
		buf.extend_from_slice(self.reason.as_bytes());
		buf
	}
}

/// Whether `code` may appear in a close frame on the wire (RFC6455 7.4).
pub fn is_valid_close_code(code: u16) -> bool {
	match code {
		1000..=1003 | 1007..=1014 | 3000..=4999 => true,
		_ => false,
	}
}
