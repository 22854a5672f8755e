use std::{fmt, net::{Ipv4Addr, SocketAddrV4}};

use serde::{Serialize, Deserialize};

use crate::chord_id::hash_address;

/// Identity of a ring participant. Copied and compared by value.
/// A key of 0 marks an unset entry in the finger table or successor list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node{
	pub key: u64,
	pub address: Ipv4Addr,
	pub port: u16,
}

impl Node{
	pub const UNSET: Node = Node{
		key: 0,
		address: Ipv4Addr::UNSPECIFIED,
		port: 0,
	};

	pub fn new(key: u64, addr: SocketAddrV4) -> Node{
		Node{
			key,
			address: *addr.ip(),
			port: addr.port(),
		}
	}

	/// A node positioned by the hash of its own address.
	pub fn from_addr(addr: SocketAddrV4) -> Node{
		Node::new(hash_address(&addr), addr)
	}

	pub fn is_set(&self) -> bool{
		self.key != 0
	}

	/// Whether a datagram can be sent to this node at all. Nodes reported by
	/// peers must pass this before they are adopted anywhere.
	pub fn is_routable(&self) -> bool{
		self.is_set()
			&& self.port != 0
			&& !self.address.is_unspecified()
			&& !self.address.is_broadcast()
	}

	pub fn socket_addr(&self) -> SocketAddrV4{
		SocketAddrV4::new(self.address, self.port)
	}
}

impl Default for Node{
	fn default() -> Self {
		Node::UNSET
	}
}

impl fmt::Display for Node{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.is_set() {
			write!(f, "{} {}:{}", self.key, self.address, self.port)
		}else{
			write!(f, "<unset>")
		}
	}
}
