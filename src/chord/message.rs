use serde::{Serialize, Deserialize};

use crate::node::Node;

/// Stamped on every outgoing message. Peers log a mismatch but do not reject it.
pub const PROTOCOL_VERSION: u32 = 417;


/// Envelope of every datagram body. `seq` is picked by the requester and
/// echoed back in the response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordMessage{
	pub version: u32,
	pub seq: u64,
	pub msg: Msg,
}

impl ChordMessage{
	pub fn new(seq: u64, msg: Msg) -> Self{
		ChordMessage{
			version: PROTOCOL_VERSION,
			seq,
			msg,
		}
	}

	/// Build the response to this message, keeping its sequence number.
	pub fn reply_with(&self, msg: Msg) -> Self{
		ChordMessage::new(self.seq, msg)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Msg{
	// Stabilize
	GetPredecessorRequest,
	GetPredecessorResponse{node: Node},
	NotifyRequest{node: Node},

	// Routing
	/// One lookup step. The responder answers from its own state without
	/// forwarding: `resolved` means `node` is the successor of `key`,
	/// otherwise `node` is the next hop to ask.
	StartFindSuccessorRequest{key: u64},
	StartFindSuccessorResponse{node: Node, resolved: bool},

	// Fault tolerance
	GetSuccessorListRequest,
	GetSuccessorListResponse{successors: Vec<Node>},
	CheckPredecessorRequest,
	CheckPredecessorResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgCase{
	NotSet,
	GetPredecessorRequest,
	GetPredecessorResponse,
	NotifyRequest,
	StartFindSuccessorRequest,
	StartFindSuccessorResponse,
	GetSuccessorListRequest,
	GetSuccessorListResponse,
	CheckPredecessorRequest,
	CheckPredecessorResponse,
}

impl Msg{
	pub fn case(&self) -> MsgCase{
		match self{
			Msg::GetPredecessorRequest => MsgCase::GetPredecessorRequest,
			Msg::GetPredecessorResponse { .. } => MsgCase::GetPredecessorResponse,
			Msg::NotifyRequest { .. } => MsgCase::NotifyRequest,
			Msg::StartFindSuccessorRequest { .. } => MsgCase::StartFindSuccessorRequest,
			Msg::StartFindSuccessorResponse { .. } => MsgCase::StartFindSuccessorResponse,
			Msg::GetSuccessorListRequest => MsgCase::GetSuccessorListRequest,
			Msg::GetSuccessorListResponse { .. } => MsgCase::GetSuccessorListResponse,
			Msg::CheckPredecessorRequest => MsgCase::CheckPredecessorRequest,
			Msg::CheckPredecessorResponse => MsgCase::CheckPredecessorResponse,
		}
	}

	pub fn is_response(&self) -> bool{
		matches!(self,
			Msg::GetPredecessorResponse { .. }
			| Msg::StartFindSuccessorResponse { .. }
			| Msg::GetSuccessorListResponse { .. }
			| Msg::CheckPredecessorResponse
		)
	}
}


/// A decoded response, as handed from the dispatcher to whoever is waiting
/// for it. Callers must check `msg_case` before trusting the other fields.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageResponse{
	pub seq: u64,
	pub msg_case: MsgCase,
	pub node: Node,
	pub resolved: bool,
	pub successors: Vec<Node>,
}

impl MessageResponse{
	pub fn not_set() -> Self{
		MessageResponse{
			seq: 0,
			msg_case: MsgCase::NotSet,
			node: Node::UNSET,
			resolved: false,
			successors: Vec::new(),
		}
	}

	pub fn is(&self, case: MsgCase) -> bool{
		self.msg_case == case
	}
}

impl From<ChordMessage> for MessageResponse{
	fn from(message: ChordMessage) -> Self {
		let mut response = MessageResponse{
			seq: message.seq,
			msg_case: message.msg.case(),
			..MessageResponse::not_set()
		};
		match message.msg{
			Msg::GetPredecessorResponse { node } => {
				response.node = node;
			},
			Msg::StartFindSuccessorResponse { node, resolved } => {
				response.node = node;
				response.resolved = resolved;
			},
			Msg::GetSuccessorListResponse { successors } => {
				response.successors = successors;
			},
			Msg::CheckPredecessorResponse => {},
			// Requests carry nothing a waiter could use
			_ => {
				response.msg_case = MsgCase::NotSet;
			},
		}
		response
	}
}


#[cfg(test)]
mod tests {
	use super::*;
	use std::net::{Ipv4Addr, SocketAddrV4};

	#[test]
	fn response_fields_are_carried_over() {
		let node = Node::new(12, SocketAddrV4::new(Ipv4Addr::LOCALHOST, 5000));
		let message = ChordMessage::new(7, Msg::StartFindSuccessorResponse { node, resolved: true });
		let response = MessageResponse::from(message);
		assert_eq!(response.seq, 7);
		assert!(response.is(MsgCase::StartFindSuccessorResponse));
		assert_eq!(response.node, node);
		assert!(response.resolved);
	}

	#[test]
	fn requests_do_not_become_responses() {
		let message = ChordMessage::new(3, Msg::GetSuccessorListRequest);
		assert!(!message.msg.is_response());
		assert!(MessageResponse::from(message).is(MsgCase::NotSet));
	}

	#[test]
	fn reply_keeps_seq_and_version() {
		let request = ChordMessage::new(41, Msg::CheckPredecessorRequest);
		let reply = request.reply_with(Msg::CheckPredecessorResponse);
		assert_eq!(reply.seq, 41);
		assert_eq!(reply.version, PROTOCOL_VERSION);
	}
}
