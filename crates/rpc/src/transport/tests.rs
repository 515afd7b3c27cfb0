use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio_util::codec::Framed;

use super::*;
use crate::codec::FrameCodec;
use crate::correlation::CallId;

/// Client transport plus the server end of the pipe.
fn pair() -> (Transport, Framed<DuplexStream, FrameCodec>) {
	let (client, server) = tokio::io::duplex(4096);
	let (reader, writer) = tokio::io::split(client);
	let transport = Transport::from_io(reader, writer, &Handle::current());
	(transport, Framed::new(server, FrameCodec::new()))
}

async fn reply(server: &mut Framed<DuplexStream, FrameCodec>, msg: serde_json::Value) {
	let body = serde_json::to_vec(&msg).unwrap();
	server.send(Bytes::from(body)).await.unwrap();
}

#[tokio::test]
async fn send_fails_before_connected() {
	let (transport, _server) = pair();
	let err = transport.send(&Request::new("ConnectionInfoReq")).unwrap_err();
	assert!(matches!(err, Error::Transport(_)));
}

#[tokio::test]
async fn round_trips_request_and_response() {
	let (mut transport, mut server) = pair();
	assert_eq!(transport.recv().await, Some(TransportEvent::Connected));
	assert!(transport.is_connected());

	let mut req = Request::new("ConnectionInfoReq");
	req.id = CallId(1);
	transport.send(&req).unwrap();

	let frame = server.next().await.unwrap().unwrap();
	let sent: serde_json::Value = serde_json::from_slice(&frame).unwrap();
	assert_eq!(sent, json!({"callId": 1, "req": {"typehint": "ConnectionInfoReq"}}));

	reply(&mut server, json!({"callId": 1, "payload": {"typehint": "ConnectionInfo", "version": "1.0"}})).await;
	let Some(TransportEvent::Message(Inbound::Response(resp))) = transport.recv().await else {
		panic!("expected a response");
	};
	assert_eq!(resp.id, CallId(1));
	assert_eq!(resp.result.unwrap().str("version"), Some("1.0"));
}

#[tokio::test]
async fn undecodable_frames_are_skipped() {
	let (mut transport, mut server) = pair();
	assert_eq!(transport.recv().await, Some(TransportEvent::Connected));

	server.send(Bytes::from_static(b"{not json")).await.unwrap();
	reply(&mut server, json!({"payload": {"typehint": "AnalyzerReadyEvent"}})).await;

	let Some(TransportEvent::Message(Inbound::Event(event))) = transport.recv().await else {
		panic!("expected an event");
	};
	assert_eq!(event.kind(), "AnalyzerReadyEvent");
}

#[tokio::test]
async fn peer_close_ends_the_stream() {
	let (mut transport, server) = pair();
	assert_eq!(transport.recv().await, Some(TransportEvent::Connected));
	drop(server);

	assert_eq!(
		transport.recv().await,
		Some(TransportEvent::Disconnected(DisconnectReason::Closed))
	);
	assert!(!transport.is_connected());
	assert_eq!(transport.recv().await, None);
}

#[tokio::test]
async fn bad_header_is_a_crash() {
	let (client, mut server) = tokio::io::duplex(4096);
	let (reader, writer) = tokio::io::split(client);
	let mut transport = Transport::from_io(reader, writer, &Handle::current());
	assert_eq!(transport.recv().await, Some(TransportEvent::Connected));

	server.write_all(b"zz0001{").await.unwrap();
	let Some(TransportEvent::Disconnected(reason)) = transport.recv().await else {
		panic!("expected disconnect");
	};
	assert!(reason.is_crash());
	assert!(matches!(reason, DisconnectReason::Failed(Error::Protocol(_))));
}

#[tokio::test]
async fn shutdown_reports_disconnect() {
	let (mut transport, _server) = pair();
	assert_eq!(transport.recv().await, Some(TransportEvent::Connected));

	transport.shutdown(false);
	assert!(!transport.is_connected());
	assert_eq!(
		transport.recv().await,
		Some(TransportEvent::Disconnected(DisconnectReason::Shutdown))
	);
}

#[tokio::test]
async fn refused_connection_reports_connect_failed() {
	let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	drop(listener);

	let mut transport = Transport::open(Endpoint::Tcp(addr.to_string()), &Handle::current(), Duration::from_secs(5));
	let Some(TransportEvent::Disconnected(DisconnectReason::ConnectFailed(err))) = transport.recv().await else {
		panic!("expected connect failure");
	};
	assert!(matches!(err, Error::Connection { .. }));
	assert_eq!(transport.recv().await, None);
}

#[tokio::test]
async fn events_are_a_stream() {
	let (transport, mut server) = pair();
	reply(&mut server, json!({"payload": {"typehint": "IndexerReadyEvent"}})).await;
	drop(server);

	let events: Vec<_> = transport.collect().await;
	assert_eq!(events.len(), 3);
	assert_eq!(events[0], TransportEvent::Connected);
	assert!(matches!(&events[1], TransportEvent::Message(Inbound::Event(e)) if e.kind() == "IndexerReadyEvent"));
	assert_eq!(events[2], TransportEvent::Disconnected(DisconnectReason::Closed));
}
