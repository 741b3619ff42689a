#![warn(missing_docs)]
#![deny(unused_mut)]

//! wsclient is an event-driven WebSocket (RFC6455) client.
//!
//! # Clients
//! A [`Client`] connects to a `ws://` or `wss://` URI and reports everything
//! that happens on the connection as [`Event`]s on the [`Events`] handle
//! returned by `connect`. The opening handshake and all reading happen on a
//! dedicated I/O thread; sends can come from any thread. To change timeouts,
//! size limits or TLS settings use the [`ClientBuilder`].
//!
//! ```rust,no_run
//! use wsclient::{Client, Event};
//!
//! let client = Client::new();
//! let events = client.connect("wss://echo.example.com/").unwrap();
//! assert_eq!(events.recv(), Some(Event::Connected));
//! client.send_text("hello");
//! if let Some(Event::TextMessage(echo)) = events.recv() {
//!     assert_eq!(echo, "hello");
//! }
//! client.disconnect();
//! ```
//!
//! # TLS
//! `wss://` connections need the `tls` feature, on by default, which uses
//! `native-tls`.
//!
//! # Lower levels
//! The frame codec (`dataframe`, `message`, `receiver`) and the handshake
//! (`handshake`, `header`) only need `Read`/`Write` and can be used on their
//! own.

pub mod client;
pub mod dataframe;
pub mod events;
pub mod handshake;
pub mod header;
pub mod message;
pub mod receiver;
pub mod result;
pub mod sender;
pub mod state;
pub mod stream;
pub mod util;

pub use self::client::{Client, ClientBuilder};
pub use self::events::{Event, Events};
pub use self::message::CloseData;
pub use self::message::OwnedMessage;
pub use self::state::ConnectionState;

pub use self::result::ErrorKind;
pub use self::result::HandshakeError;
pub use self::result::WebSocketError;
pub use self::result::WebSocketResult;

pub use url;
