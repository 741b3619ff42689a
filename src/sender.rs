//! The write half of a connection.

use std::io::Write;

use log::trace;
use parking_lot::Mutex;

use crate::dataframe::DataFrame;
use crate::message::OwnedMessage;
use crate::result::{WebSocketError, WebSocketResult};

/// Sends frames over a shared write half.
///
/// Frames are encoded on the calling thread and written whole while the
/// lock is held, so frames from concurrent senders never interleave.
pub struct Sender {
	writer: Mutex<Option<Box<dyn Write + Send>>>,
	mask: bool,
}

impl Sender {
	/// Create a new Sender with nothing to write to yet. `mask` says whether
	/// outgoing frames are masked, which a client always does.
	pub fn new(mask: bool) -> Sender {
		Sender {
			writer: Mutex::new(None),
			mask,
		}
	}

	/// Starts writing to `writer`.
	pub fn attach<W>(&self, writer: W)
	where
		W: Write + Send + 'static,
	{
		*self.writer.lock() = Some(Box::new(writer));
	}

	/// Drops the write half. Later sends fail with `NotConnected`.
	pub fn detach(&self) {
		self.writer.lock().take();
	}

	/// Sends a single data frame to the remote endpoint.
	pub fn send_dataframe(&self, dataframe: &DataFrame) -> WebSocketResult<()> {
		let bytes = dataframe.encode(self.mask)?;
		trace!(
			"sending {:?} frame, {} payload bytes",
			dataframe.opcode,
			dataframe.data.len()
		);
		self.write_bytes(&bytes)
	}

	/// Sends a message as one unfragmented frame.
	pub fn send_message(&self, message: OwnedMessage) -> WebSocketResult<()> {
		self.send_dataframe(&message.into_dataframe())
	}

	fn write_bytes(&self, bytes: &[u8]) -> WebSocketResult<()> {
		let mut writer = self.writer.lock();
		let writer = writer.as_mut().ok_or(WebSocketError::NotConnected)?;
		writer.write_all(bytes)?;
		writer.flush()?;
		Ok(())
	}
}
