use std::fmt;

use crate::{chord_id::{element_of, ChordId, M}, node::Node};


/// Everything one node knows about the ring. Owned by a single RwLock in
/// ChordCore. Lists are replaced whole, never edited in place, so a reader
/// always sees a complete list.
#[derive(Debug, Clone, PartialEq)]
pub struct RingState{
	pub self_node: Node,
	pub predecessor: Option<Node>,
	pub successor: Node,
	pub finger_table: Vec<Node>,
	pub successor_list: Vec<Node>,
	pub fix_index: usize,
	pub successor_misses: u32,
}

impl RingState{

	/// State of a node that is alone on a new ring.
	pub fn new(self_node: Node) -> Self{
		RingState{
			self_node,
			predecessor: None,
			successor: self_node,
			finger_table: vec![Node::UNSET; M],
			successor_list: vec![self_node],
			fix_index: M - 1,
			successor_misses: 0,
		}
	}

	/// State of a node that learned its successor from a bootstrap peer.
	pub fn joined(self_node: Node, successor: Node) -> Self{
		RingState{
			successor,
			successor_list: vec![successor],
			..RingState::new(self_node)
		}
	}

	pub fn hash(&self) -> u64{
		self.self_node.key
	}

	/// Furthest finger that still precedes `id`, or this node if none does.
	pub fn closest_preceding_node(&self, id: u64) -> Node{
		for finger in self.finger_table.iter().rev() {
			if finger.is_set() && element_of(finger.key, self.hash(), id, false) {
				return *finger;
			}
		}
		self.self_node
	}

	/// One lookup step answered from local state only. Returns the node and
	/// whether it is the final answer (`true`) or the next hop (`false`).
	pub fn lookup_step(&self, id: u64) -> (Node, bool){
		if element_of(id, self.hash(), self.successor.key, true) {
			return (self.successor, true);
		}
		let closest = self.closest_preceding_node(id);
		if closest != self.self_node {
			(closest, false)
		}else if self.successor.is_set() && self.successor != self.self_node {
			// no usable finger, walk the successor pointers instead
			(self.successor, false)
		}else{
			(self.self_node, true)
		}
	}

	/// A closer successor was found between this node and the old one.
	pub fn adopt_successor(&mut self, node: Node){
		let mut list = self.successor_list.clone();
		match list.first_mut() {
			Some(first) => *first = node,
			None => list.push(node),
		}
		self.successor = node;
		self.successor_list = list;
		self.successor_misses = 0;
	}

	/// Rebuild the successor list from the successor's own list.
	/// Unset or unreachable entries are skipped, copying stops once the list
	/// wraps back to this node or the successor, and the result never exceeds
	/// `ceiling` entries.
	pub fn refresh_successor_list(&mut self, reported: &[Node], ceiling: usize){
		let mut list = Vec::with_capacity(ceiling.min(reported.len() + 1));
		list.push(self.successor);
		for node in reported {
			if list.len() >= ceiling || *node == self.self_node || *node == self.successor {
				break;
			}
			if node.is_routable() {
				list.push(*node);
			}
		}
		self.successor_list = list;
	}

	/// Drop the current successor and promote the next entry of the
	/// successor list. With no entry left the node becomes its own successor.
	pub fn promote_next_successor(&mut self) -> Node{
		let list: Vec<Node> = self.successor_list.iter()
			.skip(1)
			.filter(|node| node.is_set())
			.copied()
			.collect();
		let dead = self.successor;
		self.successor_list = if list.is_empty() { vec![self.self_node] } else { list };
		self.successor = self.successor_list[0];
		self.successor_misses = 0;
		self.forget(&dead);
		self.successor
	}

	/// Advance the finger cursor and return the index to refresh together
	/// with the id whose successor belongs there.
	pub fn advance_fix_index(&mut self) -> (usize, u64){
		self.fix_index = u64::next_index(self.fix_index);
		(self.fix_index, self.hash().calculate_finger(self.fix_index))
	}

	pub fn set_finger(&mut self, index: usize, node: Node){
		let mut table = self.finger_table.clone();
		table[index] = node;
		self.finger_table = table;
	}

	/// Clear every finger that points at `node`.
	pub fn forget(&mut self, node: &Node){
		if self.finger_table.contains(node) {
			self.finger_table = self.finger_table.iter()
				.map(|finger| if finger == node { Node::UNSET } else { *finger })
				.collect();
		}
	}

	/// Another node claims to be our predecessor.
	pub fn notified(&mut self, node: Node) -> bool{
		if !node.is_routable() {
			return false;
		}
		let accept = match &self.predecessor {
			Some(predecessor) => element_of(node.key, predecessor.key, self.hash(), false),
			None => true,
		};
		if accept {
			self.predecessor = Some(node);
		}
		accept
	}
}

impl fmt::Display for RingState{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "Self: {}", self.self_node)?;
		match &self.predecessor {
			Some(predecessor) => writeln!(f, "Predecessor: {}", predecessor)?,
			None => writeln!(f, "Predecessor: <none>")?,
		}
		writeln!(f, "Successor: {}", self.successor)?;

		writeln!(f, "Successor list:")?;
		for (i, node) in self.successor_list.iter().enumerate() {
			writeln!(f, "  [{}] {}", i, node)?;
		}

		// only resolved fingers, consecutive duplicates folded
		writeln!(f, "Finger table:")?;
		let mut last = Node::UNSET;
		for (i, finger) in self.finger_table.iter().enumerate() {
			if finger.is_set() && *finger != last {
				writeln!(f, "  [{}] {}", i, finger)?;
				last = *finger;
			}
		}
		Ok(())
	}
}
