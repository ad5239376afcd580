/// Rejection reasons for node-protocol messages. A message that fails to decode never reaches
/// the registry.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("missing action")]
    MissingAction,
    #[error("unknown action: {0}")]
    UnknownAction(String),
    #[error("invalid message: {0}")]
    InvalidField(String),
    #[error("message exceeds {0} bytes")]
    TooLarge(usize),
    #[error("failed to encode message: {0}")]
    Encode(String),
}
