//! Replication frames.
//!
//! Every frame is a bit stream starting with a one-byte kind:
//!
//! ```text
//! Construction  [u8 kind = 0x24][1 bit = 1][u16 network id][construct payload]
//! Serialization [u8 kind = 0x27][u16 network id][state payload]
//! Destruction   [u8 kind = 0x25][u16 network id]
//! ```
//!
//! The payloads are written by the entity itself through its
//! [`NetworkEntity`](zone_entity::NetworkEntity) writers; this module only
//! owns the header.

use zone_entity::{BitReader, BitWriter};

use crate::error::NetError;

/// A per-(client, entity) replica identifier granted by a visibility
/// collaborator. Never global: the same entity may carry different ids for
/// different clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetworkId(pub u16);

impl std::fmt::Display for NetworkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The one-byte frame kind prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    /// A client learns about a new replica.
    Construction = 0x24,
    /// A client forgets a replica.
    Destruction = 0x25,
    /// A state update for an existing replica.
    Serialization = 0x27,
}

impl TryFrom<u8> for FrameKind {
    type Error = NetError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0x24 => Ok(Self::Construction),
            0x25 => Ok(Self::Destruction),
            0x27 => Ok(Self::Serialization),
            other => Err(NetError::MalformedFrame(format!(
                "unknown frame kind {other:#04x}"
            ))),
        }
    }
}

/// The decoded header of a replication frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// What the frame does.
    pub kind: FrameKind,
    /// The replica the frame addresses.
    pub network_id: NetworkId,
}

impl FrameHeader {
    /// Parse a header from the front of `reader`, leaving the cursor at the
    /// start of the payload.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::MalformedFrame`] for an unknown kind or a
    /// construction frame without its explicit bit, and
    /// [`NetError::Truncated`] if the stream ends inside the header.
    pub fn read(reader: &mut BitReader<'_>) -> Result<Self, NetError> {
        let kind = FrameKind::try_from(reader.read_u8()?)?;
        if kind == FrameKind::Construction && !reader.read_bit()? {
            return Err(NetError::MalformedFrame(
                "construction frame without explicit bit".to_string(),
            ));
        }
        let network_id = NetworkId(reader.read_u16()?);
        Ok(Self { kind, network_id })
    }

    /// Parse the header of a complete frame.
    ///
    /// # Errors
    ///
    /// See [`FrameHeader::read`].
    pub fn parse(frame: &[u8]) -> Result<Self, NetError> {
        Self::read(&mut BitReader::new(frame))
    }
}

/// Build a construction frame. `write_payload` appends the entity's
/// construct payload after the header.
pub fn construction(network_id: NetworkId, write_payload: impl FnOnce(&mut BitWriter)) -> Vec<u8> {
    let mut out = BitWriter::new();
    out.write_u8(FrameKind::Construction as u8);
    out.write_bit(true);
    out.write_u16(network_id.0);
    write_payload(&mut out);
    out.into_bytes()
}

/// Build a serialization frame. `write_payload` appends the entity's state
/// payload after the header.
pub fn serialization(
    network_id: NetworkId,
    write_payload: impl FnOnce(&mut BitWriter),
) -> Vec<u8> {
    let mut out = BitWriter::new();
    out.write_u8(FrameKind::Serialization as u8);
    out.write_u16(network_id.0);
    write_payload(&mut out);
    out.into_bytes()
}

/// Build a destruction frame.
#[must_use]
pub fn destruction(network_id: NetworkId) -> Vec<u8> {
    let mut out = BitWriter::new();
    out.write_u8(FrameKind::Destruction as u8);
    out.write_u16(network_id.0);
    out.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_layout() {
        let frame = construction(NetworkId(0x0102), |w| w.write_u8(0xAA));
        // kind, then the explicit bit shifts everything after it by one.
        assert_eq!(frame[0], 0x24);
        assert_eq!(frame.len(), 5);

        let mut reader = BitReader::new(&frame);
        let header = FrameHeader::read(&mut reader).unwrap();
        assert_eq!(header.kind, FrameKind::Construction);
        assert_eq!(header.network_id, NetworkId(0x0102));
        assert_eq!(reader.read_u8().unwrap(), 0xAA);
    }

    #[test]
    fn test_serialization_layout_is_byte_aligned() {
        let frame = serialization(NetworkId(7), |w| w.write_u32(0xDEAD_BEEF));
        assert_eq!(frame, vec![0x27, 7, 0, 0xEF, 0xBE, 0xAD, 0xDE]);
    }

    #[test]
    fn test_destruction_layout() {
        assert_eq!(destruction(NetworkId(300)), vec![0x25, 0x2C, 0x01]);
        let header = FrameHeader::parse(&destruction(NetworkId(300))).unwrap();
        assert_eq!(header.kind, FrameKind::Destruction);
        assert_eq!(header.network_id, NetworkId(300));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let err = FrameHeader::parse(&[0x99, 0, 0]).unwrap_err();
        assert!(matches!(err, NetError::MalformedFrame(_)));
    }

    #[test]
    fn test_construction_requires_explicit_bit() {
        // 0x24 followed by a cleared explicit bit.
        let err = FrameHeader::parse(&[0x24, 0x00, 0x00, 0x00]).unwrap_err();
        assert!(matches!(err, NetError::MalformedFrame(_)));
    }

    #[test]
    fn test_truncated_header() {
        let err = FrameHeader::parse(&[0x25, 0x01]).unwrap_err();
        assert!(matches!(err, NetError::Truncated(_)));
    }
}
