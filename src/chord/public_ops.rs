use std::net::SocketAddrV4;

use tracing::{debug, warn};

use crate::{adaptor::unpack, error::Result, node::Node};

use super::{ChordCore, message::{Msg, MessageResponse, PROTOCOL_VERSION}};


impl ChordCore{

	/// Decode one inbound datagram. Requests are answered right away from
	/// local state and yield a not-set response; responses are returned so
	/// the listener can hand them to the waiting request.
	pub(crate) async fn process_chord_msg(&self, datagram: &[u8], from: SocketAddrV4) -> Result<MessageResponse>{
		let message = unpack(datagram)?;
		if message.version != PROTOCOL_VERSION {
			warn!("{} speaks protocol version {}, expected {}", from, message.version, PROTOCOL_VERSION);
		}

		if message.msg.is_response() {
			return Ok(MessageResponse::from(message));
		}

		if let Some(reply) = self.answer(&message.msg) {
			self.adaptor.send(from, &message.reply_with(reply)).await?;
		}
		Ok(MessageResponse::not_set())
	}

	fn answer(&self, request: &Msg) -> Option<Msg>{
		match request{
			Msg::GetPredecessorRequest => {
				let node = self.state.read().predecessor.unwrap_or(Node::UNSET);
				Some(Msg::GetPredecessorResponse { node })
			},
			Msg::StartFindSuccessorRequest { key } => {
				let (node, resolved) = self.state.read().lookup_step(*key);
				Some(Msg::StartFindSuccessorResponse { node, resolved })
			},
			Msg::GetSuccessorListRequest => {
				let successors = self.state.read().successor_list.clone();
				Some(Msg::GetSuccessorListResponse { successors })
			},
			Msg::NotifyRequest { node } => {
				if self.state.write().notified(*node) {
					debug!("predecessor is now {}", node);
				}
				None
			},
			Msg::CheckPredecessorRequest => Some(Msg::CheckPredecessorResponse),

			// Responses never reach here
			Msg::GetPredecessorResponse { .. }
			| Msg::StartFindSuccessorResponse { .. }
			| Msg::GetSuccessorListResponse { .. }
			| Msg::CheckPredecessorResponse => None,
		}
	}
}


#[cfg(test)]
mod tests {
	use std::{net::{Ipv4Addr, SocketAddrV4}, time::Duration};

	use crate::chord::{message::{ChordMessage, Msg, MsgCase}, state::RingState, test_support::{FakePeer, test_core}};
	use crate::{adaptor::pack, error::ChordError, node::Node};

	#[tokio::test]
	async fn answers_predecessor_after_notify() {
		let core = test_core(100).await;
		let peer = FakePeer::bind(50).await;
		let addr = core.adaptor.local_addr();

		let answer = peer.ask(addr, Msg::GetPredecessorRequest).await;
		assert_eq!(answer.msg, Msg::GetPredecessorResponse { node: Node::UNSET });

		let frame = pack(&ChordMessage::new(2, Msg::NotifyRequest { node: peer.node })).unwrap();
		core.process_chord_msg(&frame, peer.node.socket_addr()).await.unwrap();
		assert!(peer.recv_within(Duration::from_millis(100)).await.is_none());

		let answer = peer.ask(addr, Msg::GetPredecessorRequest).await;
		assert_eq!(answer.msg, Msg::GetPredecessorResponse { node: peer.node });
	}

	#[tokio::test]
	async fn answers_lookup_step_and_successor_list() {
		let core = test_core(100).await;
		let peer = FakePeer::bind(700).await;
		let successor = Node::new(300, SocketAddrV4::new(Ipv4Addr::LOCALHOST, 3));
		let next = Node::new(400, SocketAddrV4::new(Ipv4Addr::LOCALHOST, 4));
		let self_node = core.self_node();
		{
			let mut state = core.state.write();
			*state = RingState::joined(self_node, successor);
			state.refresh_successor_list(&[next], 4);
		}
		let addr = core.adaptor.local_addr();

		let answer = peer.ask(addr, Msg::StartFindSuccessorRequest { key: 250 }).await;
		assert_eq!(answer.msg, Msg::StartFindSuccessorResponse { node: successor, resolved: true });
		let answer = peer.ask(addr, Msg::StartFindSuccessorRequest { key: 350 }).await;
		assert_eq!(answer.msg, Msg::StartFindSuccessorResponse { node: successor, resolved: false });

		let answer = peer.ask(addr, Msg::GetSuccessorListRequest).await;
		assert_eq!(answer.msg, Msg::GetSuccessorListResponse { successors: vec![successor, next] });

		let answer = peer.ask(addr, Msg::CheckPredecessorRequest).await;
		assert_eq!(answer.msg, Msg::CheckPredecessorResponse);
	}

	#[tokio::test]
	async fn responses_are_classified_not_answered() {
		let core = test_core(100).await;
		let from = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 9);
		let frame = pack(&ChordMessage::new(11, Msg::GetSuccessorListResponse { successors: vec![] })).unwrap();

		let response = core.process_chord_msg(&frame, from).await.unwrap();
		assert_eq!(response.seq, 11);
		assert!(response.is(MsgCase::GetSuccessorListResponse));
	}

	#[tokio::test]
	async fn garbage_is_rejected() {
		let core = test_core(100).await;
		let from = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 9);
		let err = core.process_chord_msg(b"nope", from).await.unwrap_err();
		assert!(matches!(err, ChordError::Frame(_)));
		assert!(!err.is_fatal());
	}
}
