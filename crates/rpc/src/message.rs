//! JSON message model.
//!
//! Outbound requests are `{"callId": n, "req": {"typehint": ..., ...}}`.
//! Inbound messages are `{"callId"?: n, "payload": {"typehint": ..., ...}}`; the presence of
//! `callId` distinguishes a [`Response`] from an [`Event`]. Unknown fields are ignored.

use serde_json::{Map, Value as JsonValue, json};

use crate::correlation::CallId;
use crate::error::{Error, Result, ServerError};

/// Payload typehints that denote a failed response.
const ERROR_TYPEHINTS: [&str; 2] = ["EnsimeServerError", "RpcError"];

/// An outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
	/// Correlation id, assigned by the registry.
	pub id: CallId,
	/// Command name (`typehint` on the wire).
	pub typehint: String,
	/// Parameter set, flattened next to the typehint.
	pub params: Map<String, JsonValue>,
}

impl Request {
	/// Creates a request with no parameters and a placeholder id.
	pub fn new(typehint: impl Into<String>) -> Self {
		Self {
			id: CallId(0),
			typehint: typehint.into(),
			params: Map::new(),
		}
	}

	/// Adds a parameter.
	#[must_use]
	pub fn param(mut self, key: &str, value: impl Into<JsonValue>) -> Self {
		self.params.insert(key.to_owned(), value.into());
		self
	}

	/// Serializes the request into its wire JSON.
	pub fn to_json(&self) -> JsonValue {
		let mut req = Map::with_capacity(self.params.len() + 1);
		req.insert("typehint".into(), JsonValue::String(self.typehint.clone()));
		for (key, value) in &self.params {
			req.insert(key.clone(), value.clone());
		}
		json!({ "callId": self.id.0, "req": req })
	}

	/// Encodes the request into frame body bytes.
	pub fn encode(&self) -> Result<Vec<u8>> {
		Ok(serde_json::to_vec(&self.to_json())?)
	}
}

/// A typed payload: the typehint plus the full JSON object it came in.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
	/// Payload type tag.
	pub typehint: String,
	/// Complete payload object (including `typehint`).
	pub body: JsonValue,
}

impl Payload {
	/// Builds a payload from a JSON object carrying a `typehint` field.
	pub fn from_json(body: JsonValue) -> Result<Self> {
		let typehint = body
			.get("typehint")
			.and_then(JsonValue::as_str)
			.ok_or_else(|| Error::Protocol("payload without typehint".into()))?
			.to_owned();
		Ok(Self { typehint, body })
	}

	/// Field accessor.
	pub fn get(&self, key: &str) -> Option<&JsonValue> {
		self.body.get(key)
	}

	/// String field accessor.
	pub fn str(&self, key: &str) -> Option<&str> {
		self.get(key).and_then(JsonValue::as_str)
	}

	/// Integer field accessor.
	pub fn u64(&self, key: &str) -> Option<u64> {
		self.get(key).and_then(JsonValue::as_u64)
	}

	/// Array field accessor; missing or mistyped fields yield an empty slice.
	pub fn array(&self, key: &str) -> &[JsonValue] {
		self.get(key)
			.and_then(JsonValue::as_array)
			.map(Vec::as_slice)
			.unwrap_or_default()
	}
}

/// A response to one of our requests.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
	/// Correlation id echoed by the server.
	pub id: CallId,
	/// Success payload or the server's error.
	pub result: std::result::Result<Payload, ServerError>,
}

/// An unsolicited server push.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
	/// The event payload; its typehint is the event type.
	pub payload: Payload,
}

impl Event {
	/// The event type tag.
	pub fn kind(&self) -> &str {
		&self.payload.typehint
	}
}

/// Classification of an inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
	/// Reply to a request.
	Response(Response),
	/// Server push.
	Event(Event),
}

impl Inbound {
	/// Decodes a frame body.
	pub fn decode(bytes: &[u8]) -> Result<Self> {
		let msg: JsonValue = serde_json::from_slice(bytes)?;
		Self::from_json(msg)
	}

	/// Classifies an already parsed message.
	pub fn from_json(mut msg: JsonValue) -> Result<Self> {
		let payload = msg
			.get_mut("payload")
			.map(JsonValue::take)
			.ok_or_else(|| Error::Protocol("message without payload".into()))?;
		let payload = Payload::from_json(payload)?;

		let Some(id) = msg.get("callId").and_then(JsonValue::as_u64) else {
			return Ok(Self::Event(Event { payload }));
		};

		let result = if ERROR_TYPEHINTS.contains(&payload.typehint.as_str()) {
			Err(ServerError {
				code: payload.get("code").and_then(JsonValue::as_i64),
				message: payload
					.str("description")
					.or_else(|| payload.str("detail"))
					.unwrap_or("unspecified server error")
					.to_owned(),
			})
		} else {
			Ok(payload)
		};

		Ok(Self::Response(Response {
			id: CallId(id),
			result,
		}))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn request_flattens_params_next_to_typehint() {
		let mut req = Request::new("TypeAtPointReq")
			.param("file", "/src/A.scala")
			.param("range", json!({"from": 10, "to": 14}));
		req.id = CallId(7);

		assert_eq!(
			req.to_json(),
			json!({
				"callId": 7,
				"req": {
					"typehint": "TypeAtPointReq",
					"file": "/src/A.scala",
					"range": {"from": 10, "to": 14},
				}
			})
		);
	}

	#[test]
	fn message_with_call_id_is_a_response() {
		let msg = br#"{"callId": 3, "payload": {"typehint": "BasicTypeInfo", "name": "Int", "extra": [1]}}"#;
		let Inbound::Response(resp) = Inbound::decode(msg).unwrap() else {
			panic!("expected response");
		};
		assert_eq!(resp.id, CallId(3));
		let payload = resp.result.unwrap();
		assert_eq!(payload.typehint, "BasicTypeInfo");
		assert_eq!(payload.str("name"), Some("Int"));
	}

	#[test]
	fn message_without_call_id_is_an_event() {
		let msg = br#"{"payload": {"typehint": "AnalyzerReadyEvent"}}"#;
		let Inbound::Event(event) = Inbound::decode(msg).unwrap() else {
			panic!("expected event");
		};
		assert_eq!(event.kind(), "AnalyzerReadyEvent");
	}

	#[test]
	fn error_payloads_become_server_errors() {
		let msg = br#"{"callId": 9, "payload": {"typehint": "EnsimeServerError", "description": "boom"}}"#;
		let Inbound::Response(resp) = Inbound::decode(msg).unwrap() else {
			panic!("expected response");
		};
		assert_eq!(
			resp.result,
			Err(ServerError {
				code: None,
				message: "boom".into()
			})
		);

		let msg = br#"{"callId": 10, "payload": {"typehint": "RpcError", "detail": "bad", "code": 42}}"#;
		let Inbound::Response(resp) = Inbound::decode(msg).unwrap() else {
			panic!("expected response");
		};
		assert_eq!(resp.result.unwrap_err().code, Some(42));
	}

	#[test]
	fn malformed_messages_are_protocol_errors() {
		assert!(matches!(Inbound::decode(b"not json"), Err(Error::Protocol(_))));
		assert!(matches!(Inbound::decode(br#"{"callId": 1}"#), Err(Error::Protocol(_))));
		assert!(matches!(
			Inbound::decode(br#"{"payload": {"name": "x"}}"#),
			Err(Error::Protocol(_))
		));
	}
}
