use crate::{chord::message::ChordMessage, error::{ChordError, Result}};


pub mod udp_adaptor;
pub use udp_adaptor::UdpAdaptor;

/// Size of the big-endian length field in front of every message.
pub const LENGTH_PREFIX: usize = 8;

/// Largest datagram the listener will read.
pub const MAX_DATAGRAM: usize = 65_507;


/// Frame a message as one datagram: 8-byte big-endian body length, then
/// exactly that many bytes of serialized message.
pub fn pack(msg: &ChordMessage) -> Result<Vec<u8>>{
	let body = serde_json::to_vec(msg)?;
	let mut frame = Vec::with_capacity(LENGTH_PREFIX + body.len());
	frame.extend_from_slice(&(body.len() as u64).to_be_bytes());
	frame.extend_from_slice(&body);
	Ok(frame)
}

pub fn unpack(datagram: &[u8]) -> Result<ChordMessage>{
	if datagram.len() < LENGTH_PREFIX {
		return Err(ChordError::Frame(format!("{} bytes is shorter than the length prefix", datagram.len())));
	}
	let (prefix, body) = datagram.split_at(LENGTH_PREFIX);
	let mut len = [0u8; LENGTH_PREFIX];
	len.copy_from_slice(prefix);
	let len = u64::from_be_bytes(len);
	if len != body.len() as u64 {
		return Err(ChordError::Frame(format!("length prefix says {} bytes but {} followed", len, body.len())));
	}
	Ok(serde_json::from_slice(body)?)
}


#[cfg(test)]
mod tests {
	use super::*;
	use crate::chord::message::Msg;

	#[test]
	fn frame_starts_with_big_endian_length() {
		let msg = ChordMessage::new(1, Msg::GetPredecessorRequest);
		let frame = pack(&msg).unwrap();
		let body_len = frame.len() - LENGTH_PREFIX;
		assert_eq!(&frame[..LENGTH_PREFIX], &(body_len as u64).to_be_bytes());
		assert_eq!(frame[0..7], [0u8; 7]);
	}

	#[test]
	fn request_survives_the_wire() {
		let msg = ChordMessage::new(99, Msg::StartFindSuccessorRequest { key: u64::MAX });
		let parsed = unpack(&pack(&msg).unwrap()).unwrap();
		assert_eq!(parsed, msg);
		assert_eq!(parsed.msg.case(), msg.msg.case());
	}

	#[test]
	fn short_datagram_is_rejected() {
		assert!(matches!(unpack(&[0, 0, 1]), Err(ChordError::Frame(_))));
	}

	#[test]
	fn truncated_body_is_rejected() {
		let msg = ChordMessage::new(5, Msg::GetSuccessorListRequest);
		let frame = pack(&msg).unwrap();
		assert!(matches!(unpack(&frame[..frame.len() - 1]), Err(ChordError::Frame(_))));
	}

	#[test]
	fn garbage_body_is_codec_error() {
		let mut frame = 3u64.to_be_bytes().to_vec();
		frame.extend_from_slice(b"{x}");
		assert!(matches!(unpack(&frame), Err(ChordError::Codec(_))));
	}
}
