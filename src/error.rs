use std::{io, net::SocketAddrV4, path::PathBuf};

use crate::{chord::message::MsgCase, node::Node};

pub type Result<T> = std::result::Result<T, ChordError>;

#[derive(Debug, thiserror::Error)]
pub enum ChordError{
	#[error("failed to bind udp socket on {addr}: {source}")]
	Bind{addr: SocketAddrV4, source: io::Error},
	#[error("failed to send datagram to {peer}: {source}")]
	Send{peer: SocketAddrV4, source: io::Error},
	#[error("malformed frame: {0}")]
	Frame(String),
	#[error("chord message codec error: {0}")]
	Codec(#[from] serde_json::Error),

	#[error("no {expected:?} from {peer} before the response deadline")]
	Timeout{peer: SocketAddrV4, expected: MsgCase},
	#[error("{peer} answered the lookup for {id} with an unset node")]
	UnsetNode{peer: SocketAddrV4, id: u64},
	#[error("{peer} pointed the lookup for {id} at unreachable node {node}")]
	UnroutableNode{peer: SocketAddrV4, id: u64, node: Node},
	#[error("lookup for {id} was routed back to {peer}")]
	RoutingLoop{peer: SocketAddrV4, id: u64},
	#[error("lookup for {id} did not resolve within {hops} hops")]
	HopLimit{id: u64, hops: usize},

	#[error("could not join the ring through any of {0} addresses")]
	JoinFailed(usize),
	#[error("failed to read config {path:?}: {source}")]
	Config{path: PathBuf, source: io::Error},
}

impl ChordError{
	/// Fatal errors stop the node. Everything else is retried on the next
	/// maintenance tick.
	pub fn is_fatal(&self) -> bool{
		matches!(self, ChordError::Bind{..} | ChordError::Send{..})
	}
}
