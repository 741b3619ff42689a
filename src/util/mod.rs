//! Utility functions for various portions of wsclient.

pub mod header;
pub mod mask;

use std::io::{self, BufRead, Read};
use std::str::from_utf8;
use std::str::Utf8Error;

/// Transforms a u8 slice into an owned String
pub fn bytes_to_string(data: &[u8]) -> Result<String, Utf8Error> {
	let utf8 = from_utf8(data)?;
	Ok(utf8.to_string())
}

/// Reads one `\n` terminated line out of a buffered reader. Nothing past the
/// line is consumed, so bytes that follow stay in `reader`'s buffer. A `\r`
/// before the `\n` is dropped.
///
/// Returns `Ok(None)` if the stream ends before a complete line arrives.
/// Lines longer than `limit` bytes fail with `InvalidData`.
pub fn read_line<R>(reader: &mut R, limit: usize) -> io::Result<Option<Vec<u8>>>
where
	R: BufRead,
{
	let mut line = Vec::new();
	reader
		.take(limit as u64 + 1)
		.read_until(b'\n', &mut line)?;
	if line.last() == Some(&b'\n') {
		line.pop();
		if line.last() == Some(&b'\r') {
			line.pop();
		}
		return Ok(Some(line));
	}
	if line.len() > limit {
		return Err(io::Error::new(
			io::ErrorKind::InvalidData,
			"header line too long",
		));
	}
	Ok(None)
}
