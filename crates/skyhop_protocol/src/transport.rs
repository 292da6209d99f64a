use std::io::{self, Read, Write};
use std::sync::{Mutex, mpsc};

use tracing::warn;

use crate::protocol::PeerMessage;

/// Largest frame body accepted by [`read_message`].
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Carries [`PeerMessage`]s between this peer and the others.
pub trait PeerTransport: Send + Sync + 'static {
    fn send(&self, msg: PeerMessage);
    fn receive(&self) -> Vec<PeerMessage>;
}

// --- Serialization helpers (length-prefixed bincode framing) ---

/// Write a message as a 4-byte big-endian length followed by its bincode body.
pub fn write_message<W: Write, T: serde::Serialize>(writer: &mut W, msg: &T) -> io::Result<()> {
    let data =
        bincode::serialize(msg).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    if data.len() > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("frame of {} bytes exceeds {MAX_FRAME_LEN}", data.len()),
        ));
    }
    let len = (data.len() as u32).to_be_bytes();
    writer.write_all(&len)?;
    writer.write_all(&data)?;
    writer.flush()?;
    Ok(())
}

/// Read one message written by [`write_message`].
pub fn read_message<R: Read, T: serde::de::DeserializeOwned>(reader: &mut R) -> io::Result<T> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {len} bytes exceeds {MAX_FRAME_LEN}"),
        ));
    }
    let mut data = vec![0u8; len];
    reader.read_exact(&mut data)?;
    bincode::deserialize(&data).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

// --- Local transport (same-process via mpsc channels) ---

/// One end of an in-process link. Messages cross the channel as encoded frames
/// so both ends exercise the wire format.
pub struct LocalPeerTransport {
    tx: mpsc::Sender<Vec<u8>>,
    rx: Mutex<mpsc::Receiver<Vec<u8>>>,
}

impl PeerTransport for LocalPeerTransport {
    fn send(&self, msg: PeerMessage) {
        let mut frame = Vec::new();
        if let Err(e) = write_message(&mut frame, &msg) {
            warn!("Dropping unencodable message for entity {}: {e}", msg.entity_id());
            return;
        }
        // The other end may already be gone; nothing left to deliver to.
        let _ = self.tx.send(frame);
    }

    fn receive(&self) -> Vec<PeerMessage> {
        let rx = match self.rx.lock() {
            Ok(rx) => rx,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut messages = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            match read_message(&mut frame.as_slice()) {
                Ok(msg) => messages.push(msg),
                Err(e) => warn!("Skipping malformed frame: {e}"),
            }
        }
        messages
    }
}

/// Create two local transports connected to each other.
pub fn create_local_link() -> (LocalPeerTransport, LocalPeerTransport) {
    let (a_tx, b_rx) = mpsc::channel();
    let (b_tx, a_rx) = mpsc::channel();
    (
        LocalPeerTransport {
            tx: a_tx,
            rx: Mutex::new(a_rx),
        },
        LocalPeerTransport {
            tx: b_tx,
            rx: Mutex::new(b_rx),
        },
    )
}

#[cfg(test)]
mod tests {
    use bevy_math::{Quat, Vec3};

    use super::*;
    use crate::animation::AnimationState;

    fn pose(entity_id: u64, timestamp: f64) -> PeerMessage {
        PeerMessage::Pose {
            entity_id,
            timestamp,
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_y(0.5),
        }
    }

    #[test]
    fn frame_is_length_prefixed() {
        let msg = PeerMessage::Animation {
            entity_id: 7,
            state: AnimationState::Run,
        };
        let mut frame = Vec::new();
        write_message(&mut frame, &msg).unwrap();

        let body_len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(body_len, frame.len() - 4);
        // The animation travels as one byte at the end of the body.
        assert_eq!(frame.last(), Some(&AnimationState::Run.code()));

        let decoded: PeerMessage = read_message(&mut frame.as_slice()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn oversized_length_is_rejected() {
        let mut frame = ((MAX_FRAME_LEN + 1) as u32).to_be_bytes().to_vec();
        frame.extend_from_slice(&[0; 8]);
        let err = read_message::<_, PeerMessage>(&mut frame.as_slice()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn truncated_frame_is_an_error() {
        let mut frame = Vec::new();
        write_message(&mut frame, &pose(1, 0.5)).unwrap();
        frame.truncate(frame.len() - 3);
        let err = read_message::<_, PeerMessage>(&mut frame.as_slice()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn local_link_delivers_in_order_both_ways() {
        let (a, b) = create_local_link();
        a.send(pose(1, 0.1));
        a.send(pose(1, 0.2));
        b.send(PeerMessage::Despawn { entity_id: 2 });

        assert_eq!(b.receive(), vec![pose(1, 0.1), pose(1, 0.2)]);
        assert!(b.receive().is_empty());
        assert_eq!(a.receive(), vec![PeerMessage::Despawn { entity_id: 2 }]);
    }

    #[test]
    fn send_after_peer_dropped_is_silent() {
        let (a, b) = create_local_link();
        drop(b);
        a.send(pose(3, 1.0));
        assert!(a.receive().is_empty());
    }
}
