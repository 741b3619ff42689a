use std::io::{BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::*;
use crate::dataframe::{DataFrame, Opcode};
use crate::events::RecvTimeoutError;
use crate::header::WebSocketAccept;
use crate::util::read_line;

const WAIT: Duration = Duration::from_secs(5);

/// Runs `script` against the first connection made to the returned URI.
fn serve<F>(script: F) -> (String, JoinHandle<()>)
where
	F: FnOnce(TcpStream) + Send + 'static,
{
	let listener = TcpListener::bind("127.0.0.1:0").unwrap();
	let uri = format!("ws://127.0.0.1:{}/chat?room=1", listener.local_addr().unwrap().port());
	(uri, accept_one(listener, script))
}

fn accept_one<F>(listener: TcpListener, script: F) -> JoinHandle<()>
where
	F: FnOnce(TcpStream) + Send + 'static,
{
	thread::spawn(move || {
		let (stream, _) = listener.accept().unwrap();
		script(stream)
	})
}

/// Reads the upgrade request, returning its lines without the blank one.
///
/// Clients send nothing else before the response, so the buffer can go.
fn read_request<S: Read>(stream: &mut S) -> Vec<String> {
	let mut reader = BufReader::new(stream);
	let mut lines = Vec::new();
	loop {
		let line = read_line(&mut reader, 8192).unwrap().expect("request ended early");
		if line.is_empty() {
			return lines;
		}
		lines.push(String::from_utf8(line).unwrap());
	}
}

fn accept_for(request: &[String]) -> String {
	let key = request
		.iter()
		.find_map(|l| l.strip_prefix("Sec-WebSocket-Key: "))
		.expect("no key");
	WebSocketAccept::from_serialized_key(key).serialize()
}

fn response_for(request: &[String]) -> String {
	format!(
		"HTTP/1.1 101 Switching Protocols\r\n\
		 Upgrade: websocket\r\n\
		 Connection: Upgrade\r\n\
		 Sec-WebSocket-Accept: {}\r\n\r\n",
		accept_for(request)
	)
}

fn handshake<S: Read + Write>(stream: &mut S) -> Vec<String> {
	let request = read_request(stream);
	stream.write_all(response_for(&request).as_bytes()).unwrap();
	request
}

fn send_frame<S: Write>(stream: &mut S, fin: bool, opcode: Opcode, data: &[u8]) {
	DataFrame::new(fin, opcode, data.to_vec())
		.write_to(stream, false)
		.unwrap();
}

fn read_frame<S: Read>(stream: &mut S) -> DataFrame {
	DataFrame::read_dataframe(stream, true).unwrap()
}

/// Answers the client's close frame, returning its payload.
fn answer_close<S: Read + Write>(stream: &mut S) -> Vec<u8> {
	let frame = read_frame(stream);
	assert_eq!(frame.opcode, Opcode::Close);
	send_frame(stream, true, Opcode::Close, &frame.data);
	frame.data
}

fn assert_released(stream: &mut TcpStream) {
	stream.set_read_timeout(Some(WAIT)).unwrap();
	let mut buf = [0u8; 16];
	match stream.read(&mut buf) {
		Ok(0) => (),
		Err(ref e) if e.kind() == std::io::ErrorKind::ConnectionReset => (),
		other => panic!("socket still open: {:?}", other),
	}
}

fn next(events: &Events) -> Event {
	events.recv_timeout(WAIT).expect("no event in time")
}

fn assert_ended(events: &Events) {
	assert_eq!(events.recv_timeout(WAIT), Err(RecvTimeoutError::Disconnected));
}

fn disconnected(code: u16, reason: &str) -> Event {
	Event::Disconnected {
		code,
		reason: reason.to_string(),
	}
}

fn error_kind(event: Event) -> ErrorKind {
	match event {
		Event::Error { kind, .. } => kind,
		other => panic!("expected an error, got {:?}", other),
	}
}

#[test]
fn connects_and_closes_cleanly() {
	let (uri, server) = serve(|mut stream| {
		let request = handshake(&mut stream);
		assert_eq!(request[0], "GET /chat?room=1 HTTP/1.1");
		assert!(request.contains(&"Host: 127.0.0.1".to_string()));
		assert!(request.contains(&"Origin: http://127.0.0.1".to_string()));
		assert!(request.contains(&"Sec-WebSocket-Version: 13".to_string()));
		assert_eq!(request.last().unwrap(), "X-Token: abc");
		assert_eq!(answer_close(&mut stream), vec![0x03, 0xE8]);
		assert_released(&mut stream);
	});

	let client = Client::new();
	let events = client
		.connect_with_headers(&uri, vec![("X-Token", "abc")])
		.unwrap();
	assert_eq!(next(&events), Event::Connected);
	assert!(client.is_connected());

	client.disconnect();
	assert_eq!(next(&events), disconnected(1000, ""));
	assert_ended(&events);
	assert_eq!(client.state(), ConnectionState::Closed);
	server.join().unwrap();
}

#[test]
fn delivers_messages_and_answers_pings() {
	let (uri, server) = serve(|mut stream| {
		handshake(&mut stream);
		send_frame(&mut stream, true, Opcode::Text, b"hi");
		send_frame(&mut stream, false, Opcode::Text, b"hel");
		send_frame(&mut stream, true, Opcode::Ping, b"are you there");
		send_frame(&mut stream, true, Opcode::Continuation, b"lo");
		send_frame(&mut stream, true, Opcode::Binary, &[1, 2, 3]);

		let pong = read_frame(&mut stream);
		assert_eq!(pong.opcode, Opcode::Pong);
		assert_eq!(pong.data, b"are you there".to_vec());
		answer_close(&mut stream);
	});

	let client = Client::new();
	let events = client.connect(&uri).unwrap();
	assert_eq!(next(&events), Event::Connected);
	assert_eq!(next(&events), Event::TextMessage("hi".into()));
	assert_eq!(next(&events), Event::TextMessage("hello".into()));
	assert_eq!(next(&events), Event::BinaryMessage(vec![1, 2, 3]));
	client.disconnect();
	assert_eq!(next(&events), disconnected(1000, ""));
	assert_ended(&events);
	server.join().unwrap();
}

#[test]
fn rejected_handshake_is_the_only_event() {
	let (uri, server) = serve(|mut stream| {
		read_request(&mut stream);
		stream
			.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n")
			.unwrap();
		assert_released(&mut stream);
	});

	let client = Client::new();
	let events = client.connect(&uri).unwrap();
	let all: Vec<Event> = events.collect();
	assert_eq!(all.len(), 1);
	match all[0] {
		Event::Error {
			kind: ErrorKind::Handshake,
			ref message,
		} => assert!(message.contains("404"), "{}", message),
		ref other => panic!("unexpected {:?}", other),
	}
	assert_eq!(client.state(), ConnectionState::Closed);
	server.join().unwrap();
}

#[test]
fn wrong_accept_fails_the_handshake() {
	let (uri, server) = serve(|mut stream| {
		read_request(&mut stream);
		stream
			.write_all(
				b"HTTP/1.1 101 Switching Protocols\r\n\
				  Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\r\n",
			)
			.unwrap();
	});

	let events = Client::new().connect(&uri).unwrap();
	assert_eq!(error_kind(next(&events)), ErrorKind::Handshake);
	assert_ended(&events);
	server.join().unwrap();
}

#[test]
fn server_close_is_echoed() {
	let (uri, server) = serve(|mut stream| {
		handshake(&mut stream);
		send_frame(&mut stream, true, Opcode::Close, b"\x03\xE8");
		let echo = read_frame(&mut stream);
		assert_eq!(echo.opcode, Opcode::Close);
		assert_eq!(echo.data, vec![0x03, 0xE8]);
		assert_released(&mut stream);
	});

	let client = Client::new();
	let events = client.connect(&uri).unwrap();
	assert_eq!(next(&events), Event::Connected);
	assert_eq!(next(&events), disconnected(1000, ""));
	assert_ended(&events);
	assert!(!client.is_connected());
	server.join().unwrap();
}

#[test]
fn empty_and_invalid_close_codes() {
	let (uri, server) = serve(|mut stream| {
		handshake(&mut stream);
		send_frame(&mut stream, true, Opcode::Close, b"");
		let echo = read_frame(&mut stream);
		assert_eq!(echo.opcode, Opcode::Close);
		assert!(echo.data.is_empty());
	});
	let events = Client::new().connect(&uri).unwrap();
	assert_eq!(next(&events), Event::Connected);
	assert_eq!(next(&events), disconnected(1005, ""));
	server.join().unwrap();

	let (uri, server) = serve(|mut stream| {
		handshake(&mut stream);
		// 1006 may never appear on the wire
		send_frame(&mut stream, true, Opcode::Close, b"\x03\xEEbye");
		let echo = read_frame(&mut stream);
		assert_eq!(echo.data, vec![0x03, 0xE8]);
	});
	let events = Client::new().connect(&uri).unwrap();
	assert_eq!(next(&events), Event::Connected);
	assert_eq!(next(&events), disconnected(1006, "bye"));
	server.join().unwrap();
}

#[test]
fn send_before_open_reports_not_connected() {
	let (go, wait) = mpsc::channel::<()>();
	let (uri, server) = serve(move |mut stream| {
		wait.recv().unwrap();
		handshake(&mut stream);
		send_frame(&mut stream, true, Opcode::Text, b"still here");
		let frame = read_frame(&mut stream);
		assert_eq!(frame.data, b"after".to_vec());
		answer_close(&mut stream);
	});

	let client = Client::new();
	client.send_text("ignored while idle");
	let events = client.connect(&uri).unwrap();
	client.send_text("too early");
	go.send(()).unwrap();

	assert_eq!(next(&events), Event::Connected);
	assert_eq!(error_kind(next(&events)), ErrorKind::NotConnected);
	assert_eq!(next(&events), Event::TextMessage("still here".into()));
	client.send_text("after");
	client.disconnect();
	assert_eq!(next(&events), disconnected(1000, ""));
	assert_ended(&events);

	client.send_text("ignored once closed");
	server.join().unwrap();
}

#[test]
fn protocol_errors_close_with_a_status() {
	let cases: Vec<(Vec<u8>, u16)> = vec![
		// header of a ping with a 126 byte payload
		(vec![0x89, 0x7E, 0x00, 0x7E], 1002),
		// masked frame from the server
		(vec![0x81, 0x81, 1, 2, 3, 4, b'x' ^ 1], 1002),
		// reserved opcode
		(vec![0x83, 0x00], 1002),
		// invalid UTF-8 text
		(vec![0x81, 0x02, 0xff, 0xfe], 1007),
	];

	for (wire, code) in cases {
		let (uri, server) = serve(move |mut stream| {
			handshake(&mut stream);
			stream.write_all(&wire).unwrap();
			let close = read_frame(&mut stream);
			assert_eq!(close.opcode, Opcode::Close);
			assert_eq!(&close.data[..2], &code.to_be_bytes()[..]);
			assert_released(&mut stream);
		});
		let events = Client::new().connect(&uri).unwrap();
		assert_eq!(next(&events), Event::Connected);
		assert_eq!(error_kind(next(&events)), ErrorKind::Protocol);
		assert_ended(&events);
		server.join().unwrap();
	}
}

#[test]
fn oversized_messages_close_with_1009() {
	let (uri, server) = serve(|mut stream| {
		handshake(&mut stream);
		send_frame(&mut stream, false, Opcode::Binary, &[0; 8]);
		send_frame(&mut stream, true, Opcode::Continuation, &[0; 8]);
		let close = read_frame(&mut stream);
		assert_eq!(&close.data[..2], &[0x03, 0xF1][..]);
	});

	let events = ClientBuilder::new()
		.max_message_size(10)
		.build()
		.connect(&uri)
		.unwrap();
	assert_eq!(next(&events), Event::Connected);
	assert_eq!(error_kind(next(&events)), ErrorKind::Protocol);
	assert_ended(&events);
	server.join().unwrap();
}

#[test]
fn eof_while_open_is_an_io_error() {
	let (uri, server) = serve(|mut stream| {
		handshake(&mut stream);
	});
	let client = Client::new();
	let events = client.connect(&uri).unwrap();
	assert_eq!(next(&events), Event::Connected);
	assert_eq!(error_kind(next(&events)), ErrorKind::Io);
	assert_ended(&events);
	assert_eq!(client.state(), ConnectionState::Closed);
	server.join().unwrap();
}

#[test]
fn unanswered_close_times_out() {
	let (uri, server) = serve(|mut stream| {
		handshake(&mut stream);
		let close = read_frame(&mut stream);
		assert_eq!(close.data, b"\x0F\xA0done".to_vec());
		assert_released(&mut stream);
	});

	let client = ClientBuilder::new()
		.close_timeout(Duration::from_millis(200))
		.build();
	let events = client.connect(&uri).unwrap();
	assert_eq!(next(&events), Event::Connected);
	client.disconnect_with(4000, "done");
	match next(&events) {
		Event::Disconnected { code: 1006, .. } => (),
		other => panic!("unexpected {:?}", other),
	}
	assert_ended(&events);
	// a second disconnect is a no-op
	client.disconnect();
	server.join().unwrap();
}

#[test]
fn disconnect_aborts_a_pending_handshake() {
	let (uri, server) = serve(|mut stream| {
		read_request(&mut stream);
		assert_released(&mut stream);
	});

	let client = Client::new();
	let events = client.connect(&uri).unwrap();
	thread::sleep(Duration::from_millis(100));
	assert_eq!(client.state(), ConnectionState::Connecting);
	client.disconnect();
	match next(&events) {
		Event::Disconnected { code: 1006, .. } => (),
		other => panic!("unexpected {:?}", other),
	}
	assert_ended(&events);
	server.join().unwrap();
}

#[test]
fn pongs_surface_when_asked() {
	let (uri, server) = serve(|mut stream| {
		handshake(&mut stream);
		let ping = read_frame(&mut stream);
		assert_eq!(ping.opcode, Opcode::Ping);
		assert_eq!(ping.data.len(), 125);
		send_frame(&mut stream, true, Opcode::Pong, &ping.data[..3]);
		answer_close(&mut stream);
	});

	let client = ClientBuilder::new().surface_pongs(true).build();
	let events = client.connect(&uri).unwrap();
	assert_eq!(next(&events), Event::Connected);
	client.ping(vec![7u8; 300]);
	assert_eq!(next(&events), Event::Pong(vec![7, 7, 7]));
	client.disconnect();
	assert_eq!(next(&events), disconnected(1000, ""));
	server.join().unwrap();
}

#[test]
fn echo_round_trip() {
	let (uri, server) = serve(|mut stream| {
		handshake(&mut stream);
		for _ in 0..2 {
			let frame = read_frame(&mut stream);
			send_frame(&mut stream, true, frame.opcode, &frame.data);
		}
		answer_close(&mut stream);
	});

	let client = Client::new();
	let events = client.connect(&uri).unwrap();
	assert_eq!(next(&events), Event::Connected);
	let other = client.clone();
	thread::spawn(move || other.send_text("from another thread"))
		.join()
		.unwrap();
	client.send(OwnedMessage::Binary(vec![0; 70_000]));
	assert_eq!(next(&events), Event::TextMessage("from another thread".into()));
	assert_eq!(next(&events), Event::BinaryMessage(vec![0; 70_000]));
	client.send(OwnedMessage::Close(Some(CloseData::new(1000, ""))));
	assert_eq!(next(&events), disconnected(1000, ""));
	server.join().unwrap();
}

#[test]
fn connect_twice_is_rejected() {
	let client = Client::new();
	let events = client.connect("http://example.com/").unwrap();
	assert_eq!(error_kind(next(&events)), ErrorKind::Url);
	assert_ended(&events);
	match client.connect("ws://127.0.0.1:1/") {
		Err(WebSocketError::AlreadyStarted) => (),
		other => panic!("unexpected {:?}", other),
	}
}

#[test]
fn invalid_uris_end_the_stream() {
	for uri in &["not a uri", "ws://", "ftp://example.com/"] {
		let client = Client::new();
		let events = client.connect(uri).unwrap();
		assert_eq!(error_kind(next(&events)), ErrorKind::Url, "{}", uri);
		assert_ended(&events);
		assert_eq!(client.state(), ConnectionState::Closed);
	}
}

#[test]
fn refused_connection_is_an_io_error() {
	let port = {
		let listener = TcpListener::bind("127.0.0.1:0").unwrap();
		listener.local_addr().unwrap().port()
	};
	let events = Client::new()
		.connect(&format!("ws://127.0.0.1:{}/", port))
		.unwrap();
	assert_eq!(error_kind(next(&events)), ErrorKind::Io);
	assert_ended(&events);
}

#[test]
fn frames_sent_with_the_response_are_delivered() {
	let (uri, server) = serve(|mut stream| {
		let request = read_request(&mut stream);
		let mut reply = response_for(&request).into_bytes();
		for frame in &[
			DataFrame::new(true, Opcode::Text, b"first".to_vec()),
			DataFrame::new(true, Opcode::Binary, vec![9]),
		] {
			reply.extend(frame.encode(false).unwrap());
		}
		stream.write_all(&reply).unwrap();
		answer_close(&mut stream);
	});

	let client = Client::new();
	let events = client.connect(&uri).unwrap();
	assert_eq!(next(&events), Event::Connected);
	assert_eq!(next(&events), Event::TextMessage("first".into()));
	assert_eq!(next(&events), Event::BinaryMessage(vec![9]));
	client.disconnect();
	assert_eq!(next(&events), disconnected(1000, ""));
	assert_ended(&events);
	server.join().unwrap();
}

#[test]
fn ipv6_literal_hosts_connect() {
	let listener = match TcpListener::bind("[::1]:0") {
		Ok(listener) => listener,
		// no IPv6 loopback on this machine
		Err(_) => return,
	};
	let uri = format!("ws://[::1]:{}/v6", listener.local_addr().unwrap().port());
	let server = accept_one(listener, |mut stream| {
		let request = handshake(&mut stream);
		assert!(request.contains(&"Host: [::1]".to_string()));
		assert!(request.contains(&"Origin: http://[::1]".to_string()));
		send_frame(&mut stream, true, Opcode::Text, b"over v6");
		answer_close(&mut stream);
	});

	let client = Client::new();
	let events = client.connect(&uri).unwrap();
	assert_eq!(next(&events), Event::Connected);
	assert_eq!(next(&events), Event::TextMessage("over v6".into()));
	client.disconnect();
	assert_eq!(next(&events), disconnected(1000, ""));
	server.join().unwrap();
}

#[cfg(feature = "tls")]
#[test]
fn wss_round_trip_over_loopback() {
	let identity = native_tls::Identity::from_pkcs8(
		include_bytes!("testdata/localhost.crt"),
		include_bytes!("testdata/localhost.key"),
	)
	.unwrap();
	let acceptor = native_tls::TlsAcceptor::new(identity).unwrap();
	let listener = TcpListener::bind("127.0.0.1:0").unwrap();
	let uri = format!("wss://127.0.0.1:{}/secure", listener.local_addr().unwrap().port());
	let server = accept_one(listener, move |tcp| {
		let mut tls = acceptor.accept(tcp).unwrap();
		let request = handshake(&mut tls);
		assert_eq!(request[0], "GET /secure HTTP/1.1");
		assert!(request.contains(&"Origin: https://127.0.0.1".to_string()));
		send_frame(&mut tls, true, Opcode::Text, b"welcome");
		send_frame(&mut tls, true, Opcode::Ping, b"tls");

		// the pong comes from the I/O thread, the binary from the test thread
		let (mut ponged, mut echoed) = (false, false);
		while !(ponged && echoed) {
			let frame = read_frame(&mut tls);
			if frame.opcode == Opcode::Pong {
				assert_eq!(frame.data, b"tls".to_vec());
				ponged = true;
			} else {
				send_frame(&mut tls, true, frame.opcode, &frame.data);
				echoed = true;
			}
		}
		answer_close(&mut tls);
	});

	let connector = native_tls::TlsConnector::builder()
		.danger_accept_invalid_certs(true)
		.build()
		.unwrap();
	let client = ClientBuilder::new()
		.tls_connector(connector)
		.tls_poll_interval(Duration::from_millis(10))
		.build();
	let events = client.connect(&uri).unwrap();
	assert_eq!(next(&events), Event::Connected);
	assert_eq!(next(&events), Event::TextMessage("welcome".into()));
	// the reader is parked on the socket, the write still gets through
	client.send_binary(vec![4; 20_000]);
	assert_eq!(next(&events), Event::BinaryMessage(vec![4; 20_000]));
	client.disconnect();
	assert_eq!(next(&events), disconnected(1000, ""));
	assert_ended(&events);
	server.join().unwrap();
}

#[cfg(feature = "tls")]
#[test]
fn untrusted_certificates_fail_the_connection() {
	let identity = native_tls::Identity::from_pkcs8(
		include_bytes!("testdata/localhost.crt"),
		include_bytes!("testdata/localhost.key"),
	)
	.unwrap();
	let acceptor = native_tls::TlsAcceptor::new(identity).unwrap();
	let listener = TcpListener::bind("127.0.0.1:0").unwrap();
	let uri = format!("wss://127.0.0.1:{}/", listener.local_addr().unwrap().port());
	let server = accept_one(listener, move |tcp| {
		// the client walks away during the TLS handshake
		let _ = acceptor.accept(tcp);
	});

	let events = Client::new().connect(&uri).unwrap();
	assert_eq!(error_kind(next(&events)), ErrorKind::Tls);
	assert_ended(&events);
	server.join().unwrap();
}

