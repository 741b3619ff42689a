//! Builder-style configuration for clients.

use std::fmt;
use std::time::Duration;

#[cfg(feature = "tls")]
use native_tls::TlsConnector;

use super::Client;
use crate::receiver::{DEFAULT_MAX_FRAME_SIZE, DEFAULT_MAX_MESSAGE_SIZE};

/// How long `disconnect` waits for the peer's close frame by default.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);
/// Read timeout a TLS reader polls with by default.
pub const DEFAULT_TLS_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Settings shared by everything a client spawns.
#[derive(Clone)]
pub(crate) struct Config {
	#[cfg(feature = "tls")]
	pub(crate) tls_connector: Option<TlsConnector>,
	pub(crate) close_timeout: Duration,
	pub(crate) max_frame_size: usize,
	pub(crate) max_message_size: usize,
	pub(crate) surface_pongs: bool,
	pub(crate) tls_poll_interval: Duration,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			#[cfg(feature = "tls")]
			tls_connector: None,
			close_timeout: DEFAULT_CLOSE_TIMEOUT,
			max_frame_size: DEFAULT_MAX_FRAME_SIZE,
			max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
			surface_pongs: false,
			tls_poll_interval: DEFAULT_TLS_POLL_INTERVAL,
		}
	}
}

impl fmt::Debug for Config {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		let mut s = f.debug_struct("Config");
		#[cfg(feature = "tls")]
		s.field("tls_connector", &self.tls_connector.is_some());
		s.field("close_timeout", &self.close_timeout)
			.field("max_frame_size", &self.max_frame_size)
			.field("max_message_size", &self.max_message_size)
			.field("surface_pongs", &self.surface_pongs)
			.field("tls_poll_interval", &self.tls_poll_interval)
			.finish()
	}
}

/// Build clients with a builder-style API
///
/// ```rust
/// # use std::time::Duration;
/// use wsclient::ClientBuilder;
///
/// let client = ClientBuilder::new()
///     .close_timeout(Duration::from_secs(1))
///     .max_message_size(1 << 20)
///     .surface_pongs(true)
///     .build();
/// assert!(!client.is_connected());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClientBuilder {
	config: Config,
}

impl ClientBuilder {
	/// A builder with every option at its default.
	pub fn new() -> Self {
		ClientBuilder::default()
	}

	/// Use `connector` for `wss` connections instead of one with the
	/// platform's default trust settings.
	#[cfg(feature = "tls")]
	pub fn tls_connector(mut self, connector: TlsConnector) -> Self {
		self.config.tls_connector = Some(connector);
		self
	}

	/// How long `disconnect` waits for the server to answer the close frame
	/// before dropping the socket.
	pub fn close_timeout(mut self, timeout: Duration) -> Self {
		self.config.close_timeout = timeout;
		self
	}

	/// Largest payload accepted in a single incoming frame.
	pub fn max_frame_size(mut self, size: usize) -> Self {
		self.config.max_frame_size = size;
		self
	}

	/// Largest incoming message, after reassembly.
	pub fn max_message_size(mut self, size: usize) -> Self {
		self.config.max_message_size = size;
		self
	}

	/// Report incoming pongs as `Event::Pong` instead of dropping them.
	pub fn surface_pongs(mut self, surface: bool) -> Self {
		self.config.surface_pongs = surface;
		self
	}

	/// How often a TLS reader gives writers a turn at the shared stream.
	pub fn tls_poll_interval(mut self, interval: Duration) -> Self {
		self.config.tls_poll_interval = interval;
		self
	}

	/// Creates the client. Nothing is dialed until `Client::connect`.
	pub fn build(self) -> Client {
		Client::with_config(self.config)
	}
}
