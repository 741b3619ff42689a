//! Module containing the data frame type and its wire codec.
use crate::result::{WebSocketError, WebSocketResult};
use crate::util::header as dfh;
use crate::util::header::{DataFrameFlags, DataFrameHeader};
use crate::util::mask;
use log::trace;
use std::io::{self, Read, Write};

/// Represents a WebSocket data frame.
///
/// The data held in a DataFrame is never masked.
/// Masking/unmasking is done when sending and receiving the data frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
	/// Whether or no this constitutes the end of a message
	pub finished: bool,
	/// The reserved portion of the data frame (RFC6455 5.2)
	pub reserved: [bool; 3],
	/// The opcode associated with this data frame
	pub opcode: Opcode,
	/// The payload associated with this data frame
	pub data: Vec<u8>,
}

impl DataFrame {
	/// Creates a new DataFrame.
	pub fn new(finished: bool, opcode: Opcode, data: Vec<u8>) -> DataFrame {
		DataFrame {
			finished,
			reserved: [false; 3],
			opcode,
			data,
		}
	}

	/// Take the header and (still masked, if masked) body of a frame and
	/// combine them into a DataFrame.
	///
	/// Frames coming from a server must not be masked; `should_be_masked`
	/// is `false` on the client side.
	pub fn read_dataframe_body(
		header: DataFrameHeader,
		body: Vec<u8>,
		should_be_masked: bool,
	) -> WebSocketResult<Self> {
		let finished = header.flags.contains(DataFrameFlags::FIN);

		let reserved = [
			header.flags.contains(DataFrameFlags::RSV1),
			header.flags.contains(DataFrameFlags::RSV2),
			header.flags.contains(DataFrameFlags::RSV3),
		];

		let opcode = Opcode::new(header.opcode)
			.ok_or(WebSocketError::Protocol("Reserved data frame opcode"))?;

		let data = match header.mask {
			Some(key) => {
				if !should_be_masked {
					return Err(WebSocketError::Protocol("Expected unmasked data frame"));
				}
				let mut body = body;
				mask::mask_in_place(key, &mut body);
				body
			}
			None => {
				if should_be_masked {
					return Err(WebSocketError::Protocol("Expected masked data frame"));
				}
				body
			}
		};

		Ok(DataFrame {
			finished,
			reserved,
			opcode,
			data,
		})
	}

	/// Reads a DataFrame from a Reader, or errors out if the header declares
	/// a payload longer than `limit`.
	pub fn read_dataframe_with_limit<R>(
		reader: &mut R,
		should_be_masked: bool,
		limit: usize,
	) -> WebSocketResult<Self>
	where
		R: Read,
	{
		let header = dfh::read_header(reader)?;

		if header.len > limit as u64 {
			return Err(WebSocketError::TooLarge {
				what: "frame",
				size: header.len,
				limit: limit as u64,
			});
		}
		if header.mask.is_some() && !should_be_masked {
			// checked before the body is read so nothing is buffered for it
			return Err(WebSocketError::Protocol("Expected unmasked data frame"));
		}

		let mut data: Vec<u8> = Vec::with_capacity(header.len as usize);
		let read = reader.take(header.len).read_to_end(&mut data)?;
		if (read as u64) < header.len {
			return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "incomplete payload").into());
		}

		let frame = DataFrame::read_dataframe_body(header, data, should_be_masked)?;
		trace!(
			"read frame {:?} fin={} len={}",
			frame.opcode,
			frame.finished,
			frame.data.len()
		);
		Ok(frame)
	}

	/// Reads a DataFrame from a Reader.
	pub fn read_dataframe<R>(reader: &mut R, should_be_masked: bool) -> WebSocketResult<Self>
	where
		R: Read,
	{
		DataFrame::read_dataframe_with_limit(reader, should_be_masked, usize::max_value())
	}

	/// Serializes this frame, masking the payload with a fresh random key
	/// when `mask` is set.
	pub fn encode(&self, mask: bool) -> WebSocketResult<Vec<u8>> {
		let key = if mask { Some(mask::gen_mask()) } else { None };
		self.encode_with_key(key)
	}

	/// Serializes this frame with an explicit masking key.
	pub fn encode_with_key(&self, key: Option<[u8; 4]>) -> WebSocketResult<Vec<u8>> {
		let mut flags = DataFrameFlags::empty();
		if self.finished {
			flags.insert(DataFrameFlags::FIN);
		}
		if self.reserved[0] {
			flags.insert(DataFrameFlags::RSV1);
		}
		if self.reserved[1] {
			flags.insert(DataFrameFlags::RSV2);
		}
		if self.reserved[2] {
			flags.insert(DataFrameFlags::RSV3);
		}

		let header = DataFrameHeader {
			flags,
			opcode: self.opcode as u8,
			mask: key,
			len: self.data.len() as u64,
		};

		let mut out = Vec::with_capacity(header.size() + self.data.len());
		dfh::write_header(&mut out, header)?;
		let start = out.len();
		out.extend_from_slice(&self.data);
		if let Some(key) = key {
			mask::mask_in_place(key, &mut out[start..]);
		}
		Ok(out)
	}

	/// Writes a DataFrame to a Writer in a single `write_all`.
	pub fn write_to(&self, writer: &mut dyn Write, mask: bool) -> WebSocketResult<()> {
		let bytes = self.encode(mask)?;
		writer.write_all(&bytes)?;
		Ok(())
	}
}

/// Represents a WebSocket data frame opcode
#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub enum Opcode {
	/// A continuation data frame
	Continuation = 0,
	/// A UTF-8 text data frame
	Text = 1,
	/// A binary data frame
	Binary = 2,
	/// A close data frame
	Close = 8,
	/// A ping data frame
	Ping = 9,
	/// A pong data frame
	Pong = 10,
}

impl Opcode {
	/// Attempts to form an Opcode from a nibble.
	///
	/// Returns `None` for reserved or out of range opcodes.
	pub fn new(op: u8) -> Option<Opcode> {
		Some(match op {
			0 => Opcode::Continuation,
			1 => Opcode::Text,
			2 => Opcode::Binary,
			8 => Opcode::Close,
			9 => Opcode::Ping,
			10 => Opcode::Pong,
			_ => return None,
		})
	}

	/// Close, Ping and Pong.
	pub fn is_control(self) -> bool {
		(self as u8) >= 8
	}
}
