//! Utility functions for reading and writing data frame headers.

use crate::result::{WebSocketError, WebSocketResult};
use bitflags::bitflags;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

bitflags! {
	/// Flags relevant to a WebSocket data frame.
	pub struct DataFrameFlags: u8 {
		/// Marks this dataframe as the last dataframe
		const FIN = 0x80;
		/// First reserved bit
		const RSV1 = 0x40;
		/// Second reserved bit
		const RSV2 = 0x20;
		/// Third reserved bit
		const RSV3 = 0x10;
	}
}

/// Represents a data frame header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataFrameHeader {
	/// The bit flags for the first byte of the header.
	pub flags: DataFrameFlags,
	/// The opcode of the header - must be < 16.
	pub opcode: u8,
	/// The masking key, if any.
	pub mask: Option<[u8; 4]>,
	/// The length of the payload.
	pub len: u64,
}

impl DataFrameHeader {
	/// Number of bytes this header occupies on the wire.
	pub fn size(&self) -> usize {
		2 + match self.len {
			0..=125 => 0,
			126..=65535 => 2,
			_ => 8,
		} + if self.mask.is_some() { 4 } else { 0 }
	}
}

/// Writes a data frame header.
pub fn write_header(writer: &mut dyn Write, header: DataFrameHeader) -> WebSocketResult<()> {
	if header.opcode > 0xF {
		return Err(WebSocketError::Protocol("Invalid data frame opcode"));
	}
	if header.opcode >= 8 && header.len >= 126 {
		return Err(WebSocketError::Protocol("Control frame length too long"));
	}
	if header.len > i64::max_value() as u64 {
		return Err(WebSocketError::Protocol("Data frame length too long"));
	}

	writer.write_u8(header.flags.bits() | header.opcode)?;

	let mask_bit = if header.mask.is_some() { 0x80 } else { 0x00 };
	match header.len {
		0..=125 => writer.write_u8(mask_bit | header.len as u8)?,
		126..=65535 => {
			writer.write_u8(mask_bit | 126)?;
			writer.write_u16::<BigEndian>(header.len as u16)?;
		}
		_ => {
			writer.write_u8(mask_bit | 127)?;
			writer.write_u64::<BigEndian>(header.len)?;
		}
	}

	if let Some(mask) = header.mask {
		writer.write_all(&mask)?
	}

	Ok(())
}

/// Reads a data frame header.
///
/// Blocks until the whole header has arrived; short reads are retried by
/// the underlying `read_exact` calls.
pub fn read_header<R>(reader: &mut R) -> WebSocketResult<DataFrameHeader>
where
	R: Read,
{
	let byte0 = reader.read_u8()?;
	let byte1 = reader.read_u8()?;

	let flags = DataFrameFlags::from_bits_truncate(byte0);
	let opcode = byte0 & 0x0F;

	let len = match byte1 & 0x7F {
		126 => {
			let len = u64::from(reader.read_u16::<BigEndian>()?);
			if len <= 125 {
				return Err(WebSocketError::Protocol("Invalid data frame length"));
			}
			len
		}
		127 => {
			let len = reader.read_u64::<BigEndian>()?;
			if len & (1 << 63) != 0 {
				return Err(WebSocketError::Protocol("Data frame length too long"));
			}
			if len <= 65535 {
				return Err(WebSocketError::Protocol("Invalid data frame length"));
			}
			len
		}
		short => u64::from(short),
	};

	if opcode >= 8 {
		if len >= 126 {
			return Err(WebSocketError::Protocol("Control frame length too long"));
		}
		if !flags.contains(DataFrameFlags::FIN) {
			return Err(WebSocketError::Protocol("Illegal fragmented control frame"));
		}
	}

	let mask = if byte1 & 0x80 == 0x80 {
		let mut key = [0u8; 4];
		reader.read_exact(&mut key)?;
		Some(key)
	} else {
		None
	};

	Ok(DataFrameHeader {
		flags,
		opcode,
		mask,
		len,
	})
}
