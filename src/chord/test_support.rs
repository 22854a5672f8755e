use std::{net::{Ipv4Addr, SocketAddr, SocketAddrV4}, sync::Arc, time::Duration};

use tokio::{net::UdpSocket, time::timeout};
use tokio_util::sync::CancellationToken;

use crate::{adaptor::{pack, unpack}, config::ChordConfig, node::Node};

use super::{listen, message::{ChordMessage, Msg}, ChordCore};


/// A core with its listener running, on a loopback port, with short timeouts.
pub(crate) async fn test_core(key: u64) -> Arc<ChordCore>{
	let config = ChordConfig{
		response_timeout_ms: 200,
		successor_failure_threshold: 2,
		max_successors: 4,
		..Default::default()
	};
	let core = ChordCore::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0), Some(key), config).await.unwrap();
	tokio::spawn(listen(core.clone(), CancellationToken::new()));
	core
}

pub(crate) struct Request{
	pub msg: Msg,
	pub seq: u64,
	pub from: SocketAddr,
}

/// A scripted peer: a bare socket the test reads requests from and answers by hand.
pub(crate) struct FakePeer{
	socket: UdpSocket,
	pub node: Node,
}

impl FakePeer{
	pub async fn bind(key: u64) -> Self{
		let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0)).await.unwrap();
		let addr = match socket.local_addr().unwrap() {
			SocketAddr::V4(addr) => addr,
			SocketAddr::V6(_) => unreachable!(),
		};
		FakePeer{
			socket,
			node: Node::new(key, addr),
		}
	}

	pub async fn recv(&self) -> Request{
		self.recv_within(Duration::from_secs(5)).await.expect("fake peer got no request")
	}

	pub async fn recv_within(&self, limit: Duration) -> Option<Request>{
		let mut buf = vec![0u8; 4096];
		let (len, from) = timeout(limit, self.socket.recv_from(&mut buf)).await.ok()?.unwrap();
		let message = unpack(&buf[..len]).unwrap();
		Some(Request{
			msg: message.msg,
			seq: message.seq,
			from,
		})
	}

	pub async fn reply(&self, request: &Request, msg: Msg){
		let frame = pack(&ChordMessage::new(request.seq, msg)).unwrap();
		self.socket.send_to(&frame, request.from).await.unwrap();
	}

	/// Send a request of our own to `to` and return the decoded answer.
	pub async fn ask(&self, to: SocketAddrV4, msg: Msg) -> ChordMessage{
		let frame = pack(&ChordMessage::new(1, msg)).unwrap();
		self.socket.send_to(&frame, to).await.unwrap();
		let mut buf = vec![0u8; 4096];
		let (len, _) = timeout(Duration::from_secs(5), self.socket.recv_from(&mut buf)).await.unwrap().unwrap();
		unpack(&buf[..len]).unwrap()
	}
}
