//! NATS subject hierarchy.
//!
//! All zone subjects are prefixed with `zone.<key>` where the key is the
//! zone's `<type>.<instance>.<clone>` triple, so several zones can share a
//! NATS cluster.

/// Root prefix for all zone NATS subjects.
pub const PREFIX: &str = "zone";

/// Build the subject a client publishes [`JoinRequest`](crate::messages::JoinRequest)s on.
///
/// `zone.<key>.join`
#[must_use]
pub fn join(zone_key: &str) -> String {
    format!("{PREFIX}.{zone_key}.join")
}

/// Build the subject a client publishes [`LeaveRequest`](crate::messages::LeaveRequest)s on.
///
/// `zone.<key>.leave`
#[must_use]
pub fn leave(zone_key: &str) -> String {
    format!("{PREFIX}.{zone_key}.leave")
}

/// Build the subject a client receives its replication and gameplay traffic on.
///
/// `zone.<key>.client.<client_id>.replica`
#[must_use]
pub fn client_replica(zone_key: &str, client_id: u64) -> String {
    format!("{PREFIX}.{zone_key}.client.{client_id}.replica")
}
