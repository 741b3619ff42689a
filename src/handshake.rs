//! The client side of the opening handshake.
//!
//! The request is written in a single buffered write. The response is read
//! line by line out of a `BufRead`; frames the server sends right behind the
//! header block stay in its buffer for the frame reader.

use std::io::{self, BufRead, Write};
use std::str;

use log::debug;
use url::{Host, Url};

use crate::header::{names, WebSocketAccept, WebSocketKey};
use crate::result::{HandshakeError, WebSocketError, WebSocketResult};
use crate::util::read_line;

const MAX_LINE: usize = 8 * 1024;
const MAX_HEADERS: usize = 128;

/// Whether a connection is made over plain TCP or TLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
	/// `ws://`
	Ws,
	/// `wss://`
	Wss,
}

impl Scheme {
	/// Port used when the URI does not name one.
	pub fn default_port(self) -> u16 {
		match self {
			Scheme::Ws => 80,
			Scheme::Wss => 443,
		}
	}

	fn origin_scheme(self) -> &'static str {
		match self {
			Scheme::Ws => "http",
			Scheme::Wss => "https",
		}
	}
}

/// Where to connect and what to ask for, derived from a `ws`/`wss` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
	/// Transport to use
	pub scheme: Scheme,
	/// Host as it appears in the `Host` and `Origin` headers, IPv6
	/// literals in brackets
	pub host: String,
	/// Host name or address to dial, IPv6 literals without brackets
	pub dial_host: String,
	/// Explicit port, or the scheme's default
	pub port: u16,
	/// Path plus `?query`, never empty
	pub resource: String,
}

impl Target {
	/// Parses and validates a WebSocket URI.
	pub fn parse(uri: &str) -> WebSocketResult<Target> {
		let url = match Url::parse(uri) {
			Ok(url) => url,
			Err(url::ParseError::RelativeUrlWithoutBase) => {
				return Err(WebSocketError::UrlScheme(String::new()))
			}
			Err(e) => return Err(e.into()),
		};
		Target::from_url(&url)
	}

	/// Validates an already parsed URI.
	pub fn from_url(url: &Url) -> WebSocketResult<Target> {
		let scheme = match url.scheme() {
			"ws" => Scheme::Ws,
			"wss" => Scheme::Wss,
			other => return Err(WebSocketError::UrlScheme(other.to_string())),
		};
		let (host, dial_host) = match url.host() {
			Some(Host::Domain(name)) if !name.is_empty() => (name.to_string(), name.to_string()),
			Some(Host::Ipv4(addr)) => (addr.to_string(), addr.to_string()),
			Some(Host::Ipv6(addr)) => (format!("[{}]", addr), addr.to_string()),
			_ => return Err(WebSocketError::Url(format!("{} has no host", url))),
		};
		let port = url.port().unwrap_or_else(|| scheme.default_port());

		let mut resource = if url.path().is_empty() {
			"/".to_string()
		} else {
			url.path().to_string()
		};
		if let Some(query) = url.query() {
			if !query.is_empty() {
				resource.push('?');
				resource.push_str(query);
			}
		}

		Ok(Target {
			scheme,
			host,
			dial_host,
			port,
			resource,
		})
	}

	/// `http://host` or `https://host`.
	pub fn origin(&self) -> String {
		format!("{}://{}", self.scheme.origin_scheme(), self.host)
	}
}

/// The upgrade request a client sends.
#[derive(Debug, Clone)]
pub struct Request {
	/// Path and query
	pub resource: String,
	/// Value of the `Host` header
	pub host: String,
	/// Value of the `Origin` header
	pub origin: String,
	/// The key whose accept value the server must return
	pub key: WebSocketKey,
	/// Extra headers, sent verbatim and in order after the fixed set
	pub extra_headers: Vec<(String, String)>,
}

impl Request {
	/// Builds a request for `target` with a fresh random key.
	pub fn new(target: &Target, extra_headers: Vec<(String, String)>) -> Request {
		Request {
			resource: target.resource.clone(),
			host: target.host.clone(),
			origin: target.origin(),
			key: WebSocketKey::new(),
			extra_headers,
		}
	}

	/// Serializes the request, terminating blank line included.
	pub fn to_bytes(&self) -> Vec<u8> {
		let mut out = String::with_capacity(256);
		out.push_str(&format!("GET {} HTTP/1.1\r\n", self.resource));
		out.push_str("Upgrade: websocket\r\n");
		out.push_str("Connection: Upgrade\r\n");
		out.push_str(&format!("Host: {}\r\n", self.host));
		out.push_str(&format!("Origin: {}\r\n", self.origin));
		out.push_str(&format!("{}: {}\r\n", names::KEY, self.key.serialize()));
		out.push_str(&format!("{}: 13\r\n", names::VERSION));
		for (name, value) in &self.extra_headers {
			out.push_str(&format!("{}: {}\r\n", name, value));
		}
		out.push_str("\r\n");
		out.into_bytes()
	}

	/// Writes the request and flushes.
	pub fn write_to<W>(&self, writer: &mut W) -> WebSocketResult<()>
	where
		W: Write,
	{
		writer.write_all(&self.to_bytes())?;
		writer.flush()?;
		Ok(())
	}
}

/// A parsed handshake response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
	/// Status code, always 101 for a successful handshake
	pub status: u16,
	/// Reason phrase
	pub reason: String,
	/// Headers in the order received
	pub headers: Vec<(String, String)>,
}

impl Response {
	/// First header named `name`, compared case-insensitively.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers
			.iter()
			.find(|(n, _)| n.eq_ignore_ascii_case(name))
			.map(|(_, v)| v.as_str())
	}
}

/// Reads the server's response and checks it against `key`.
pub fn read_response<R>(reader: &mut R, key: &WebSocketKey) -> WebSocketResult<Response>
where
	R: BufRead,
{
	let status_line = match next_line(reader)? {
		Some(ref line) if line.is_empty() => return Err(HandshakeError::NoReply.into()),
		Some(line) => line,
		None => return Err(HandshakeError::NoReply.into()),
	};
	let (status, reason) = parse_status_line(&status_line)?;
	debug!("handshake response status {} {}", status, reason);
	if status != 101 {
		return Err(HandshakeError::Status { code: status, reason }.into());
	}

	let expected = WebSocketAccept::new(key);
	let mut headers = Vec::new();
	let mut validated = false;
	loop {
		let line = next_line(reader)?
			.ok_or(HandshakeError::Malformed("stream ended inside the header block"))?;
		if line.is_empty() {
			break;
		}
		if headers.len() >= MAX_HEADERS {
			return Err(HandshakeError::Malformed("too many headers").into());
		}
		let (name, value) = parse_header(&line)?;
		if name.eq_ignore_ascii_case(names::ACCEPT) {
			if !expected.matches(&value) {
				return Err(HandshakeError::BadAccept.into());
			}
			validated = true;
		}
		headers.push((name, value));
	}

	if !validated {
		return Err(HandshakeError::MissingAccept.into());
	}

	Ok(Response {
		status,
		reason,
		headers,
	})
}

/// Runs the whole handshake over the two halves of a connection.
///
/// Anything the server sent after the response is left in `reader`, so the
/// same reader must be used for the frames that follow.
pub fn negotiate<R, W>(
	reader: &mut R,
	writer: &mut W,
	request: &Request,
) -> WebSocketResult<Response>
where
	R: BufRead,
	W: Write,
{
	debug!("sending upgrade request for {}", request.resource);
	request.write_to(writer)?;
	read_response(reader, &request.key)
}

fn next_line<R>(reader: &mut R) -> WebSocketResult<Option<Vec<u8>>>
where
	R: BufRead,
{
	read_line(reader, MAX_LINE).map_err(|e| -> WebSocketError {
		if e.kind() == io::ErrorKind::InvalidData {
			HandshakeError::Malformed("header line too long").into()
		} else {
			e.into()
		}
	})
}

fn parse_status_line(line: &[u8]) -> Result<(u16, String), HandshakeError> {
	let line =
		str::from_utf8(line).map_err(|_| HandshakeError::Malformed("status line is not UTF-8"))?;
	let mut parts = line.splitn(3, ' ');
	let version = parts.next().unwrap_or("");
	if !version.starts_with("HTTP/") {
		return Err(HandshakeError::Malformed("status line has no HTTP version"));
	}
	let status = parts
		.next()
		.and_then(|code| code.parse::<u16>().ok())
		.ok_or(HandshakeError::Malformed("status line has no status code"))?;
	let reason = parts.next().unwrap_or("").trim().to_string();
	Ok((status, reason))
}

fn parse_header(line: &[u8]) -> Result<(String, String), HandshakeError> {
	let line =
		str::from_utf8(line).map_err(|_| HandshakeError::Malformed("header is not UTF-8"))?;
	let colon = line
		.find(':')
		.ok_or(HandshakeError::Malformed("header line without a colon"))?;
	let name = line[..colon].trim();
	if name.is_empty() {
		return Err(HandshakeError::Malformed("header line without a name"));
	}
	Ok((name.to_string(), line[colon + 1..].trim().to_string()))
}
