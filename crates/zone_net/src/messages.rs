//! Control messages exchanged with a zone over NATS.
//!
//! All message types derive `Serialize` and `Deserialize` for MessagePack
//! transport.

use serde::{Deserialize, Serialize};

/// A participant asks to enter the zone.
/// Published on [`subjects::join`](crate::subjects::join).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    /// The participant's entity identifier.
    pub client_id: u64,
    /// Display name for the participant's avatar.
    pub name: String,
}

/// A participant leaves the zone.
/// Published on [`subjects::leave`](crate::subjects::leave).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRequest {
    /// The departing participant's entity identifier.
    pub client_id: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_request_roundtrip() {
        let msg = JoinRequest {
            client_id: 42,
            name: "wanderer".to_string(),
        };
        let bytes = rmp_serde::to_vec(&msg).unwrap();
        let restored: JoinRequest = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(restored, msg);
    }

    #[test]
    fn test_leave_request_rejects_join_payload() {
        let bytes = rmp_serde::to_vec(&"not a leave request").unwrap();
        let result: Result<LeaveRequest, _> = rmp_serde::from_slice(&bytes);
        assert!(result.is_err());
    }
}
