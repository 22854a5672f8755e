use std::net::SocketAddrV4;

use tracing::{instrument, debug, trace};

use crate::{chord_id::M, error::{ChordError, Result}, node::Node};

use super::{ChordCore, message::{Msg, MsgCase}};


impl ChordCore{

	/// Resolve the node currently believed to succeed `id` on the ring.
	/// Answers locally when `id` falls between this node and its successor,
	/// otherwise walks the ring one hop at a time, at most M hops.
	#[instrument(skip(self), fields(node = self.key()))]
	pub(crate) async fn find_successor(&self, id: u64) -> Result<Node>{
		let (next, resolved) = self.state.read().lookup_step(id);
		if resolved {
			return Ok(next);
		}

		let result = self.find_successor_from(next.socket_addr(), id).await;
		if let Err(ChordError::Timeout { peer, .. }) = &result {
			if *peer == next.socket_addr() {
				// our own routing entry is not answering
				debug!("clearing unresponsive finger {}", next);
				self.state.write().forget(&next);
			}
		}
		result
	}

	/// Iterative lookup starting at `start`. Each hop answers one step from its
	/// own state: either the successor of `id`, or the next hop to ask.
	pub(crate) async fn find_successor_from(&self, start: SocketAddrV4, id: u64) -> Result<Node>{
		let mut hop = start;
		for hops in 0..M {
			let response = self.adaptor.request(hop, Msg::StartFindSuccessorRequest { key: id }, MsgCase::StartFindSuccessorResponse).await?;
			if !response.is(MsgCase::StartFindSuccessorResponse) {
				return Err(ChordError::Timeout{peer: hop, expected: MsgCase::StartFindSuccessorResponse});
			}
			if !response.node.is_set() {
				return Err(ChordError::UnsetNode{peer: hop, id});
			}
			if !response.node.is_routable() {
				return Err(ChordError::UnroutableNode{peer: hop, id, node: response.node});
			}
			if response.resolved {
				trace!("{} resolved to {} after {} hops", id, response.node, hops + 1);
				return Ok(response.node);
			}

			let next = response.node.socket_addr();
			if next == hop {
				return Err(ChordError::RoutingLoop{peer: hop, id});
			}
			hop = next;
		}
		Err(ChordError::HopLimit{id, hops: M})
	}

	/// Furthest finger preceding `id`; this node when none does. No I/O.
	pub(crate) fn closest_preceding_node(&self, id: u64) -> Node{
		self.state.read().closest_preceding_node(id)
	}
}
