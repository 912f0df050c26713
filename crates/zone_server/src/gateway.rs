//! NATS join/leave gateway.
//!
//! Participants enter a zone by publishing a [`JoinRequest`] on
//! `zone.<key>.join` and leave with a [`LeaveRequest`] on `zone.<key>.leave`.
//! Each joined client's replication frames go out on
//! `zone.<key>.client.<id>.replica`.

use std::sync::Arc;

use futures::StreamExt;
use tracing::{info, warn};
use zone_entity::EntityId;
use zone_net::messages::{JoinRequest, LeaveRequest};
use zone_net::{ImmediateVisibility, NatsConnection, NatsTransport, Transport, subjects};

use crate::client::Client;
use crate::error::ZoneError;
use crate::props::Avatar;
use crate::zone::Zone;

/// Admit a participant: build its avatar and client, register it, and show
/// its avatar to everyone already in the zone.
///
/// # Errors
///
/// Returns [`ZoneError::DuplicateEntity`] if the id is already in the zone.
pub async fn admit(
    zone: &Zone,
    request: JoinRequest,
    transport: Arc<dyn Transport>,
) -> Result<Arc<Client>, ZoneError> {
    let avatar = Arc::new(Avatar::new(EntityId(request.client_id), request.name));
    let client = Arc::new(Client::new(
        avatar,
        Arc::new(ImmediateVisibility::new()),
        transport,
    ));

    zone.register_client(client.clone()).await?;
    zone.construct_to_others(client.avatar(), client.id());
    Ok(client)
}

/// Let a participant go.
///
/// # Errors
///
/// Returns [`ZoneError::NotFound`] if no such client is in the zone.
pub fn release(zone: &Zone, request: &LeaveRequest) -> Result<(), ZoneError> {
    zone.remove_client(EntityId(request.client_id))?;
    Ok(())
}

/// Serve join and leave requests for `zone` until it stops.
///
/// # Errors
///
/// Returns [`ZoneError::Net`] if the subscriptions cannot be set up.
/// Malformed or rejected requests are logged and skipped.
pub async fn run(zone: Arc<Zone>, conn: NatsConnection) -> Result<(), ZoneError> {
    let key = zone.id().key();
    let join_subject = subjects::join(&key);
    let leave_subject = subjects::leave(&key);
    let mut joins = conn.subscribe(&join_subject).await?;
    let mut leaves = conn.subscribe(&leave_subject).await?;
    info!(zone = %zone.id(), join = join_subject, leave = leave_subject, "gateway listening");

    loop {
        tokio::select! {
            () = zone.stopped() => break,
            Some(msg) = joins.next() => {
                let request: JoinRequest = match zone_net::decode(msg.payload.as_ref()) {
                    Ok(request) => request,
                    Err(e) => {
                        warn!(zone = %zone.id(), error = %e, "malformed join request");
                        continue;
                    }
                };
                let client_id = request.client_id;
                let transport = NatsTransport::spawn(
                    conn.clone(),
                    subjects::client_replica(&key, client_id),
                );
                if let Err(e) = admit(&zone, request, Arc::new(transport)).await {
                    warn!(zone = %zone.id(), client_id, error = %e, "join rejected");
                }
            }
            Some(msg) = leaves.next() => {
                match zone_net::decode::<LeaveRequest>(msg.payload.as_ref()) {
                    Ok(request) => {
                        if let Err(e) = release(&zone, &request) {
                            warn!(zone = %zone.id(), client_id = request.client_id, error = %e, "leave ignored");
                        }
                    }
                    Err(e) => warn!(zone = %zone.id(), error = %e, "malformed leave request"),
                }
            }
            else => break,
        }
    }

    info!(zone = %zone.id(), "gateway stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use zone_net::{ChannelTransport, FrameKind};

    use super::*;
    use crate::config::ZoneConfig;
    use crate::testing::{drain_frames, test_zone};

    fn join(client_id: u64, name: &str) -> JoinRequest {
        JoinRequest {
            client_id,
            name: name.into(),
        }
    }

    #[tokio::test]
    async fn test_admitted_clients_see_each_other() {
        let zone = test_zone(ZoneConfig::new());
        let (first_tx, mut first_rx) = ChannelTransport::pair();
        admit(&zone, join(1, "first"), Arc::new(first_tx)).await.unwrap();
        assert!(drain_frames(&mut first_rx).is_empty());

        let (second_tx, mut second_rx) = ChannelTransport::pair();
        admit(&zone, join(2, "second"), Arc::new(second_tx)).await.unwrap();

        // Each sees exactly the other's avatar.
        let to_first = drain_frames(&mut first_rx);
        let to_second = drain_frames(&mut second_rx);
        assert_eq!(to_first.len(), 1);
        assert_eq!(to_second.len(), 1);
        assert_eq!(to_first[0].kind, FrameKind::Construction);
    }

    #[tokio::test]
    async fn test_release_destroys_avatar() {
        let zone = test_zone(ZoneConfig::new());
        let (first_tx, mut first_rx) = ChannelTransport::pair();
        admit(&zone, join(1, "first"), Arc::new(first_tx)).await.unwrap();
        let (second_tx, _second_rx) = ChannelTransport::pair();
        admit(&zone, join(2, "second"), Arc::new(second_tx)).await.unwrap();
        drain_frames(&mut first_rx);

        release(&zone, &LeaveRequest { client_id: 2 }).unwrap();
        let frames = drain_frames(&mut first_rx);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].kind, FrameKind::Destruction);

        assert!(matches!(
            release(&zone, &LeaveRequest { client_id: 2 }),
            Err(ZoneError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_join_rejected() {
        let zone = test_zone(ZoneConfig::new());
        let (tx, _rx) = ChannelTransport::pair();
        admit(&zone, join(1, "first"), Arc::new(tx.clone())).await.unwrap();
        let err = admit(&zone, join(1, "again"), Arc::new(tx)).await.unwrap_err();
        assert!(matches!(err, ZoneError::DuplicateEntity(_)));
    }
}
