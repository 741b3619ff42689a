//! Provides the stream types a connection runs over.

use std::io::{self, Read, Write};
pub use std::net::Shutdown;
use std::net::TcpStream;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

#[cfg(feature = "tls")]
pub use native_tls::TlsStream;

/// The ability access a borrow to an underlying TcpStream,
/// so one can set options on the stream or shut it down.
pub trait AsTcpStream {
	/// Get a borrow of the TcpStream
	fn as_tcp(&self) -> &TcpStream;
}

impl AsTcpStream for TcpStream {
	fn as_tcp(&self) -> &TcpStream {
		self
	}
}

#[cfg(feature = "tls")]
impl AsTcpStream for TlsStream<TcpStream> {
	fn as_tcp(&self) -> &TcpStream {
		self.get_ref()
	}
}

/// Some streams can be split up into separate reading and writing components
/// that can be used from different threads at the same time.
pub trait Splittable {
	/// The reading component of this type
	type Reader: Read + Send + 'static;
	/// The writing component of this type
	type Writer: Write + Send + 'static;

	/// Split apart this type into a reading and writing component.
	fn split(self) -> io::Result<(Self::Reader, Self::Writer)>;
}

impl Splittable for TcpStream {
	type Reader = TcpStream;
	type Writer = TcpStream;

	fn split(self) -> io::Result<(TcpStream, TcpStream)> {
		self.try_clone().map(|s| (s, self))
	}
}

/// A TLS session can't be duplicated, so both halves share it behind a lock.
///
/// The socket must have a read timeout set: the reader gives the lock up
/// every time a read times out, which is when writers get their turn.
#[cfg(feature = "tls")]
impl Splittable for TlsStream<TcpStream> {
	type Reader = SharedReader<TlsStream<TcpStream>>;
	type Writer = SharedWriter<TlsStream<TcpStream>>;

	fn split(self) -> io::Result<(Self::Reader, Self::Writer)> {
		Ok(SharedReader::pair(self))
	}
}

/// Reading half of a stream shared between two threads.
pub struct SharedReader<S>(Arc<Mutex<S>>);

/// Writing half of a stream shared between two threads.
pub struct SharedWriter<S>(Arc<Mutex<S>>);

impl<S> SharedReader<S>
where
	S: Read + Write,
{
	/// Splits `stream` into halves sharing it. See `Splittable` for the
	/// read timeout requirement.
	pub fn pair(stream: S) -> (SharedReader<S>, SharedWriter<S>) {
		let shared = Arc::new(Mutex::new(stream));
		(SharedReader(shared.clone()), SharedWriter(shared))
	}
}

impl<S> Read for SharedReader<S>
where
	S: Read,
{
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		loop {
			let mut stream = self.0.lock();
			match stream.read(buf) {
				// a timed out read consumed nothing, let a writer in and retry
				Err(ref e)
					if e.kind() == io::ErrorKind::WouldBlock
						|| e.kind() == io::ErrorKind::TimedOut =>
				{
					MutexGuard::unlock_fair(stream);
				}
				Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
				other => return other,
			}
		}
	}
}

impl<S> Write for SharedWriter<S>
where
	S: Write,
{
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.0.lock().write(buf)
	}

	fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
		self.0.lock().write_all(buf)
	}

	fn flush(&mut self) -> io::Result<()> {
		self.0.lock().flush()
	}
}

/// Shuts both directions of `tcp` down, waking a reader blocked on it.
pub fn shutdown(tcp: &TcpStream) -> io::Result<()> {
	match tcp.shutdown(Shutdown::Both) {
		// already gone
		Err(ref e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
		other => other,
	}
}
