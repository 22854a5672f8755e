use std::{io, net::{SocketAddr, SocketAddrV4}, sync::atomic::{AtomicU64, Ordering}, time::Duration};

use tokio::{net::UdpSocket, sync::{mpsc::{self, Receiver, Sender}, Mutex}, time::{timeout, Instant}};
use tracing::{debug, trace, warn};

use super::pack;
use crate::{chord::message::{ChordMessage, MessageResponse, Msg, MsgCase}, error::{ChordError, Result}};

/// Longest single wait on the inbox before the deadline is checked again.
const POLL_SLICE: Duration = Duration::from_secs(1);


/// The node's single UDP socket, plus the inbox through which the listener
/// hands decoded responses to the request that is waiting for them.
#[derive(Debug)]
pub struct UdpAdaptor{
	socket: UdpSocket,
	local_addr: SocketAddrV4,
	response_timeout: Duration,
	next_seq: AtomicU64,

	inbox_tx: Sender<MessageResponse>,
	// Holding this lock is what makes a request "in flight"; only one at a time.
	inbox: Mutex<Receiver<MessageResponse>>,
}

impl UdpAdaptor{

	pub async fn bind(addr: SocketAddrV4, response_timeout: Duration) -> Result<Self>{
		let socket = UdpSocket::bind(addr).await.map_err(|source| ChordError::Bind{addr, source})?;
		let local_addr = match socket.local_addr() {
			Ok(SocketAddr::V4(local)) => local,
			Ok(SocketAddr::V6(_)) => addr,
			Err(source) => return Err(ChordError::Bind{addr, source}),
		};
		let (inbox_tx, inbox_rx) = mpsc::channel(50);

		Ok(UdpAdaptor{
			socket,
			local_addr,
			response_timeout,
			next_seq: AtomicU64::new(rand::random::<u32>() as u64),
			inbox_tx,
			inbox: Mutex::new(inbox_rx),
		})
	}

	/// The address the socket actually bound to.
	pub fn local_addr(&self) -> SocketAddrV4{
		self.local_addr
	}

	pub async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>{
		self.socket.recv_from(buf).await
	}

	/// Send one framed message. A socket level failure is fatal for the
	/// node; a lost datagram is not noticed here.
	pub async fn send(&self, to: SocketAddrV4, msg: &ChordMessage) -> Result<()>{
		let frame = pack(msg)?;
		trace!("sending {:?} to {}", msg.msg.case(), to);
		self.socket.send_to(&frame, to).await.map_err(|source| ChordError::Send{peer: to, source})?;
		Ok(())
	}

	/// Send a message nobody waits on a response for.
	pub async fn post(&self, to: SocketAddrV4, msg: Msg) -> Result<()>{
		let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
		self.send(to, &ChordMessage::new(seq, msg)).await
	}

	/// Send a request and wait for the response of type `expected`.
	/// Returns a not-set response if nothing matching arrived in time; the
	/// request is never retried here.
	pub async fn request(&self, to: SocketAddrV4, msg: Msg, expected: MsgCase) -> Result<MessageResponse>{
		let mut inbox = self.inbox.lock().await;
		// responses to earlier requests that timed out
		while let Ok(stale) = inbox.try_recv() {
			trace!("dropping stale {:?} (seq {})", stale.msg_case, stale.seq);
		}

		let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
		self.send(to, &ChordMessage::new(seq, msg)).await?;
		let response = self.await_response(&mut inbox, seq, expected).await;
		if !response.is(expected) {
			debug!("no {:?} from {} within {:?}", expected, to, self.response_timeout);
		}
		Ok(response)
	}

	async fn await_response(&self, inbox: &mut Receiver<MessageResponse>, seq: u64, expected: MsgCase) -> MessageResponse{
		let deadline = Instant::now() + self.response_timeout;
		loop{
			let now = Instant::now();
			if now >= deadline {
				break;
			}
			let slice = (deadline - now).min(POLL_SLICE);
			match timeout(slice, inbox.recv()).await {
				Ok(Some(response)) => {
					if response.seq == seq && response.is(expected) {
						return response;
					}
					trace!("discarding {:?} (seq {}) while waiting for {:?} (seq {})", response.msg_case, response.seq, expected, seq);
				},
				Ok(None) => break, // adaptor is being dropped
				Err(_) => {}, // slice elapsed, check the deadline
			}
		}
		MessageResponse::not_set()
	}

	/// Hand a decoded response to the waiting request. Dropped if nobody
	/// is keeping up with the inbox.
	pub fn deliver(&self, response: MessageResponse){
		if let Err(e) = self.inbox_tx.try_send(response) {
			warn!("response inbox full, dropping response: {}", e);
		}
	}
}
