//! Reassembly of incoming frames into messages.

use std::io::Read;

use log::trace;

use crate::dataframe::{DataFrame, Opcode};
use crate::message::{CloseData, OwnedMessage};
use crate::result::{WebSocketError, WebSocketResult};

/// Default per-frame payload limit, 16 MiB.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 << 20;
/// Default limit on a reassembled message, 64 MiB.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 << 20;

/// A data message being accumulated from continuation frames.
#[derive(Debug)]
struct Partial {
	opcode: Opcode,
	data: Vec<u8>,
}

/// Turns a sequence of frames into messages.
///
/// Control frames are handed back as soon as they arrive and never touch an
/// in-progress fragmented message.
#[derive(Debug)]
pub struct Receiver {
	current: Option<Partial>,
	mask: bool,
	max_dataframe_size: usize,
	max_message_size: usize,
}

impl Receiver {
	/// Create a new Receiver. `mask` says whether incoming frames must be
	/// masked, which is never the case for a client.
	pub fn new(mask: bool) -> Receiver {
		Receiver::new_with_limits(mask, DEFAULT_MAX_FRAME_SIZE, DEFAULT_MAX_MESSAGE_SIZE)
	}

	/// Create a new Receiver with size limits on single frames and on
	/// reassembled messages.
	pub fn new_with_limits(
		mask: bool,
		max_dataframe_size: usize,
		max_message_size: usize,
	) -> Receiver {
		Receiver {
			current: None,
			mask,
			max_dataframe_size,
			max_message_size,
		}
	}

	/// Whether a fragmented message is waiting for more frames.
	pub fn is_fragmented(&self) -> bool {
		self.current.is_some()
	}

	/// Drops any partly reassembled message.
	pub fn reset(&mut self) {
		self.current = None;
	}

	/// Reads a single data frame from `reader`.
	pub fn recv_dataframe<R>(&mut self, reader: &mut R) -> WebSocketResult<DataFrame>
	where
		R: Read,
	{
		DataFrame::read_dataframe_with_limit(reader, self.mask, self.max_dataframe_size)
	}

	/// Reads frames until a complete message or a control frame is available.
	pub fn recv_message<R>(&mut self, reader: &mut R) -> WebSocketResult<OwnedMessage>
	where
		R: Read,
	{
		loop {
			let frame = self.recv_dataframe(reader)?;
			if let Some(message) = self.push(frame)? {
				return Ok(message);
			}
		}
	}

	/// Feeds one frame to the reassembly state machine.
	///
	/// Returns the completed message, the control message carried by a
	/// control frame, or `None` if more fragments are needed.
	pub fn push(&mut self, frame: DataFrame) -> WebSocketResult<Option<OwnedMessage>> {
		if frame.reserved != [false; 3] {
			return Err(WebSocketError::Protocol("Unsupported reserved bits received"));
		}

		match frame.opcode {
			Opcode::Close => Ok(Some(OwnedMessage::Close(CloseData::parse(&frame.data)?))),
			Opcode::Ping => Ok(Some(OwnedMessage::Ping(frame.data))),
			Opcode::Pong => Ok(Some(OwnedMessage::Pong(frame.data))),
			Opcode::Continuation => {
				let mut partial = self.current.take().ok_or(WebSocketError::Protocol(
					"Unexpected continuation data frame opcode",
				))?;
				let size = partial.data.len() + frame.data.len();
				self.check_message_size(size)?;
				partial.data.extend_from_slice(&frame.data);
				trace!("continuation frame, {} bytes buffered", partial.data.len());
				if frame.finished {
					finish(partial.opcode, partial.data).map(Some)
				} else {
					self.current = Some(partial);
					Ok(None)
				}
			}
			Opcode::Text | Opcode::Binary => {
				if self.current.is_some() {
					return Err(WebSocketError::Protocol(
						"Unexpected data frame opcode while fragmented",
					));
				}
				self.check_message_size(frame.data.len())?;
				if frame.finished {
					finish(frame.opcode, frame.data).map(Some)
				} else {
					self.current = Some(Partial {
						opcode: frame.opcode,
						data: frame.data,
					});
					Ok(None)
				}
			}
		}
	}

	fn check_message_size(&self, size: usize) -> WebSocketResult<()> {
		if size > self.max_message_size {
			return Err(WebSocketError::TooLarge {
				what: "message",
				size: size as u64,
				limit: self.max_message_size as u64,
			});
		}
		Ok(())
	}
}

fn finish(opcode: Opcode, data: Vec<u8>) -> WebSocketResult<OwnedMessage> {
	match opcode {
		Opcode::Text => match String::from_utf8(data) {
			Ok(text) => Ok(OwnedMessage::Text(text)),
			Err(e) => Err(e.utf8_error().into()),
		},
		Opcode::Binary => Ok(OwnedMessage::Binary(data)),
		_ => Err(WebSocketError::Protocol("Unsupported opcode received")),
	}
}
