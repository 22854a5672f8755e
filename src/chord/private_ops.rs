use std::net::SocketAddrV4;

use tracing::{instrument, info, debug, warn};

use crate::{chord_id::element_of, error::Result, node::Node};

use super::{ChordCore, message::{Msg, MsgCase}, state::RingState};


impl ChordCore{

	/// Become part of the ring that `bootstrap` belongs to by asking it for
	/// the successor of our own key.
	#[instrument(skip(self), fields(node = self.key()))]
	pub(crate) async fn join(&self, bootstrap: SocketAddrV4) -> Result<Node>{
		let self_node = self.self_node();
		let successor = self.find_successor_from(bootstrap, self_node.key).await?;
		*self.state.write() = RingState::joined(self_node, successor);
		info!("joined through {}, successor is {}", bootstrap, successor);
		Ok(successor)
	}

	/// Stabilize routine:
	/// 1. ask the successor for its predecessor
	/// 2. if that node sits between us and the successor, it is the new successor
	/// 3. notify the successor about us, then refresh the successor list
	///
	/// An unanswered probe keeps the current successor; enough of them in a
	/// row and the next entry of the successor list takes over.
	#[instrument(skip(self), fields(node = self.key()))]
	pub(crate) async fn stabilize(&self) -> Result<()>{
		let successor = self.state.read().successor;
		if !successor.is_set() {
			return Ok(());
		}

		let response = self.adaptor.request(successor.socket_addr(), Msg::GetPredecessorRequest, MsgCase::GetPredecessorResponse).await?;
		if response.is(MsgCase::GetPredecessorResponse) {
			let mut state = self.state.write();
			state.successor_misses = 0;
			let candidate = response.node;
			if candidate.is_routable() && element_of(candidate.key, state.hash(), state.successor.key, false) {
				info!("new successor {} (was {})", candidate, state.successor);
				state.adopt_successor(candidate);
			}
		}else{
			let mut state = self.state.write();
			state.successor_misses += 1;
			if state.successor_misses >= self.config.successor_failure_threshold {
				let dead = state.successor;
				let next = state.promote_next_successor();
				warn!("successor {} stopped answering, falling back to {}", dead, next);
			}
		}

		self.notify().await?;
		self.fix_successor_list().await
	}

	/// Tell the successor that we believe we are its predecessor.
	pub(crate) async fn notify(&self) -> Result<()>{
		let (successor, self_node) = {
			let state = self.state.read();
			(state.successor, state.self_node)
		};
		if !successor.is_set() {
			return Ok(());
		}
		self.adaptor.post(successor.socket_addr(), Msg::NotifyRequest { node: self_node }).await
	}

	/// Replace the successor list with [successor] followed by the
	/// successor's own list. Left untouched if the successor does not answer.
	#[instrument(skip(self), fields(node = self.key()))]
	pub(crate) async fn fix_successor_list(&self) -> Result<()>{
		let successor = self.state.read().successor;
		if !successor.is_set() {
			return Ok(());
		}

		let response = self.adaptor.request(successor.socket_addr(), Msg::GetSuccessorListRequest, MsgCase::GetSuccessorListResponse).await?;
		if response.is(MsgCase::GetSuccessorListResponse) {
			let mut state = self.state.write();
			if state.successor == successor {
				state.refresh_successor_list(&response.successors, self.config.successor_list_ceiling());
			}
		}
		Ok(())
	}

	/// Refresh one finger per call, round-robin.
	#[instrument(skip(self), fields(node = self.key()))]
	pub(crate) async fn fix_fingers(&self) -> Result<()>{
		let (index, target) = self.state.write().advance_fix_index();
		match self.find_successor(target).await {
			Ok(node) => {
				self.state.write().set_finger(index, node);
			},
			Err(e) if e.is_fatal() => return Err(e),
			Err(e) => {
				debug!("finger {} not refreshed: {}", index, e);
			},
		}
		Ok(())
	}

	/// Clear the predecessor if it no longer answers.
	#[instrument(skip(self), fields(node = self.key()))]
	pub(crate) async fn check_predecessor(&self) -> Result<()>{
		let predecessor = match self.state.read().predecessor {
			Some(predecessor) => predecessor,
			None => return Ok(()),
		};

		let response = self.adaptor.request(predecessor.socket_addr(), Msg::CheckPredecessorRequest, MsgCase::CheckPredecessorResponse).await?;
		if !response.is(MsgCase::CheckPredecessorResponse) {
			let mut state = self.state.write();
			if state.predecessor == Some(predecessor) {
				info!("predecessor {} stopped answering", predecessor);
				state.predecessor = None;
			}
		}
		Ok(())
	}
}
