//! JSON framing for the node protocol.
//!
//! TCP messages are one JSON object per line; UDP probes are one JSON object per datagram.
//! Unknown fields are ignored, missing required fields are rejected before anything acts on
//! the message.

use serde::Serialize;
use serde_json::Value;

use crate::constants::MAX_MESSAGE_LEN;
use crate::error::ProtocolError;
use crate::schemas::{NodeRequest, NodeResponse, ProbeMessage};

pub fn decode_request(line: &str) -> Result<NodeRequest, ProtocolError> {
    if line.len() > MAX_MESSAGE_LEN {
        return Err(ProtocolError::TooLarge(MAX_MESSAGE_LEN));
    }

    let value: Value =
        serde_json::from_str(line.trim()).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    if !value.is_object() {
        return Err(ProtocolError::Malformed("expected a JSON object".into()));
    }

    let action = match value.get("action") {
        None | Some(Value::Null) => return Err(ProtocolError::MissingAction),
        Some(Value::String(action)) => action.clone(),
        Some(other) => {
            return Err(ProtocolError::InvalidField(format!(
                "action must be a string, got {other}"
            )));
        }
    };
    if !NodeRequest::ACTIONS.contains(&action.as_str()) {
        return Err(ProtocolError::UnknownAction(action));
    }

    let request: NodeRequest =
        serde_json::from_value(value).map_err(|e| ProtocolError::InvalidField(e.to_string()))?;
    request.validate()?;

    Ok(request)
}

pub fn decode_response(line: &str) -> Result<NodeResponse, ProtocolError> {
    serde_json::from_str(line.trim()).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

pub fn decode_probe(datagram: &[u8]) -> Result<ProbeMessage, ProtocolError> {
    serde_json::from_slice(datagram).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

/// Serializes a message without a trailing newline; line framing belongs to the transport.
pub fn encode<T: Serialize>(msg: &T) -> Result<String, ProtocolError> {
    serde_json::to_string(msg).map_err(|e| ProtocolError::Encode(e.to_string()))
}

pub fn encode_probe(msg: &ProbeMessage) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec(msg).map_err(|e| ProtocolError::Encode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::HeartbeatRequest;

    #[test]
    fn heartbeat_defaults_optional_cpu_load() {
        let line = r#"{"action":"HEARTBEAT","node_id":"n1","reserved_storage_gb":1.5,"timestamp":42}"#;
        let req = decode_request(line).unwrap();
        assert_eq!(
            req,
            NodeRequest::Heartbeat(HeartbeatRequest {
                node_id: "n1".into(),
                reserved_storage_gb: 1.5,
                cpu_load: None,
                timestamp: 42.0,
            })
        );
    }

    #[test]
    fn heartbeat_timestamp_accepts_float_seconds() {
        let line = r#"{"action":"HEARTBEAT","node_id":"n1","reserved_storage_gb":0,"timestamp":1700000000.5}"#;
        match decode_request(line) {
            Ok(NodeRequest::Heartbeat(hb)) => assert_eq!(hb.timestamp, 1700000000.5),
            other => panic!("expected heartbeat, got {other:?}"),
        }

        let missing = r#"{"action":"HEARTBEAT","node_id":"n1","reserved_storage_gb":0}"#;
        assert!(matches!(
            decode_request(missing),
            Err(ProtocolError::InvalidField(_))
        ));
    }

    #[test]
    fn null_action_is_missing() {
        assert_eq!(
            decode_request(r#"{"action":null}"#),
            Err(ProtocolError::MissingAction)
        );
    }

    #[test]
    fn oversized_line_rejected() {
        let line = " ".repeat(MAX_MESSAGE_LEN + 1);
        assert_eq!(
            decode_request(&line),
            Err(ProtocolError::TooLarge(MAX_MESSAGE_LEN))
        );
    }
}
