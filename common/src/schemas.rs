use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// Liveness state of a storage node as seen by the controller.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
    Active,
    Suspect,
    Unreachable,
}

impl NodeStatus {
    /// Edges reachable through status marking. Revival from `Unreachable` only happens through
    /// re-registration, which is not a status mark.
    pub fn can_transition_to(self, next: NodeStatus) -> bool {
        matches!(
            (self, next),
            (NodeStatus::Active, NodeStatus::Suspect)
                | (NodeStatus::Suspect, NodeStatus::Active)
                | (NodeStatus::Suspect, NodeStatus::Unreachable)
        )
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeStatus::Active => write!(f, "ACTIVE"),
            NodeStatus::Suspect => write!(f, "SUSPECT"),
            NodeStatus::Unreachable => write!(f, "UNREACHABLE"),
        }
    }
}

// Node -> controller, TCP, one JSON object per line.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeRequest {
    Register(RegisterRequest),
    Heartbeat(HeartbeatRequest),
    ListNodes {},
    Stats {},
}

impl NodeRequest {
    pub const ACTIONS: [&'static str; 4] = ["REGISTER", "HEARTBEAT", "LIST_NODES", "STATS"];

    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            NodeRequest::Register(r) => r.validate(),
            NodeRequest::Heartbeat(h) => h.validate(),
            NodeRequest::ListNodes {} | NodeRequest::Stats {} => Ok(()),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterRequest {
    pub node_id: String,
    pub host: String,
    pub heartbeat_port: u16,
    pub probe_port: u16,
    pub cpu: u32,
    pub memory_gb: u64,
    pub storage_gb: u64,
    pub bandwidth_mbps: u64,
}

impl RegisterRequest {
    fn validate(&self) -> Result<(), ProtocolError> {
        validate_node_id(&self.node_id)?;
        if self.host.trim().is_empty() {
            return Err(ProtocolError::InvalidField("host must not be empty".into()));
        }
        if self.probe_port == 0 {
            return Err(ProtocolError::InvalidField("probe_port must not be 0".into()));
        }
        if self.storage_gb == 0 {
            return Err(ProtocolError::InvalidField("storage_gb must be positive".into()));
        }
        if self.bandwidth_mbps == 0 {
            return Err(ProtocolError::InvalidField("bandwidth_mbps must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HeartbeatRequest {
    pub node_id: String,
    pub reserved_storage_gb: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_load: Option<f64>,
    /// Sender wall-clock. Any JSON number is accepted (UTC ms or float seconds). Informational
    /// only; the controller's clock decides liveness.
    pub timestamp: f64,
}

impl HeartbeatRequest {
    fn validate(&self) -> Result<(), ProtocolError> {
        validate_node_id(&self.node_id)?;
        if !self.reserved_storage_gb.is_finite() || self.reserved_storage_gb < 0.0 {
            return Err(ProtocolError::InvalidField(
                "reserved_storage_gb must be a non-negative number".into(),
            ));
        }
        if let Some(load) = self.cpu_load
            && !load.is_finite()
        {
            return Err(ProtocolError::InvalidField("cpu_load must be a number".into()));
        }
        Ok(())
    }
}

fn validate_node_id(node_id: &str) -> Result<(), ProtocolError> {
    if node_id.trim().is_empty() {
        return Err(ProtocolError::InvalidField("node_id must not be empty".into()));
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Protocol,
    UnknownNode,
    ReRegister,
}

// Controller -> node. `OK` doubles as the acknowledgement; queries fill in their payload.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status")]
pub enum NodeResponse {
    #[serde(rename = "OK")]
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        nodes: Option<Vec<NodeView>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stats: Option<NetworkStats>,
        /// Set on heartbeat acks: the controller's reservation for the sender, in GB.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reserved_storage_gb: Option<f64>,
    },
    #[serde(rename = "ERROR")]
    Error {
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<ErrorCode>,
    },
}

impl NodeResponse {
    pub fn ack() -> Self {
        NodeResponse::Ok {
            nodes: None,
            stats: None,
            reserved_storage_gb: None,
        }
    }

    pub fn heartbeat_ack(reserved_storage_gb: f64) -> Self {
        NodeResponse::Ok {
            nodes: None,
            stats: None,
            reserved_storage_gb: Some(reserved_storage_gb),
        }
    }

    pub fn error(code: ErrorCode, reason: impl Into<String>) -> Self {
        NodeResponse::Error {
            reason: reason.into(),
            code: Some(code),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, NodeResponse::Ok { .. })
    }
}

// Controller <-> node, UDP liveness channel.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProbeMessage {
    Ping { node_id: String },
    Pong { node_id: String },
}

/// Read-only view of one registry entry, as exposed for external inspection.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NodeView {
    pub node_id: String,
    pub host: String,
    pub heartbeat_port: u16,
    pub probe_port: u16,
    pub status: NodeStatus,
    pub cpu: u32,
    pub memory_gb: u64,
    pub declared_storage_gb: u64,
    pub declared_bandwidth_mbps: u64,
    pub reserved_storage_gb: f64,
    pub available_storage_gb: f64,
    pub last_heartbeat_age_ms: u64,
    pub registered_at_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported_reserved_gb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported_cpu_load: Option<f64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct NetworkStats {
    pub total_nodes: usize,
    pub active_nodes: usize,
    pub suspect_nodes: usize,
    pub unreachable_nodes: usize,
    pub total_connections: u64,
    pub total_bytes_placed: u64,
    pub total_storage_capacity_gb: u64,
    pub available_storage_gb: f64,
    pub total_bandwidth_mbps: u64,
}

// Client -> controller admin API.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TransferRequest {
    pub file_name: String,
    pub size_mb: f64,
    pub replication_factor: usize,
}
