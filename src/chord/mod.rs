use crate::{adaptor::{UdpAdaptor, MAX_DATAGRAM}, config::ChordConfig, error::{ChordError, Result}, node::Node};

use std::{
	net::{SocketAddr, SocketAddrV4},
	path::Path,
	sync::Arc,
	time::Duration,
};

use parking_lot::RwLock;
use rand::Rng;
use tokio::{select, task::JoinHandle, time::{interval_at, Instant, Interval, MissedTickBehavior}};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};


pub mod message;
pub mod state;

mod routing;
mod private_ops;
mod public_ops;

#[cfg(test)]
pub(crate) mod test_support;

use message::MsgCase;
use state::RingState;


/// Shared by the listener task, the maintenance task and the handle.
/// The ring state lock is never held across an await.
#[derive(Debug)]
pub(crate) struct ChordCore{
	pub(crate) state: RwLock<RingState>,
	pub(crate) adaptor: UdpAdaptor,
	pub(crate) config: ChordConfig,
}

impl ChordCore{

	/// Bind the socket and start out alone on a new ring. Without an explicit
	/// key the node is placed by the hash of the address it bound to.
	pub(crate) async fn bind(addr: SocketAddrV4, key: Option<u64>, config: ChordConfig) -> Result<Arc<Self>>{
		let adaptor = UdpAdaptor::bind(addr, config.response_timeout()).await?;
		let local_addr = adaptor.local_addr();
		if local_addr.ip().is_unspecified() {
			warn!("bound to {}, peers will not be able to reach the advertised address", local_addr);
		}
		let self_node = match key {
			Some(key) => Node::new(key, local_addr),
			None => Node::from_addr(local_addr),
		};

		Ok(Arc::new(ChordCore{
			state: RwLock::new(RingState::new(self_node)),
			adaptor,
			config,
		}))
	}

	pub(crate) fn self_node(&self) -> Node{
		self.state.read().self_node
	}

	pub(crate) fn key(&self) -> u64{
		self.self_node().key
	}

	pub(crate) fn snapshot(&self) -> RingState{
		self.state.read().clone()
	}
}


/// The Chord itself. This struct acts like a builder in that it is created
/// and modified before being consumed by the start method which then
/// returns another type, ChordHandle.
#[derive(Debug)]
pub struct Chord{
	listen_addr: SocketAddrV4,
	key: Option<u64>,
	join_list: Vec<SocketAddrV4>,
	join_or_create: bool,
	maintenance: bool,
	config: ChordConfig,
}

impl Chord{

	/// Creates a new Chord that will listen on the given address.
	/// Port 0 picks a free port when the node starts.
	pub fn new(listen_addr: SocketAddrV4) -> Self{
		Chord{
			listen_addr,
			key: None,
			join_list: Vec::new(),
			join_or_create: false,
			maintenance: true,
			config: ChordConfig::default(),
		}
	}

	/// Create a new Chord with its timers and limits read from a JSON file.
	pub async fn from_config_file<P: AsRef<Path>>(listen_addr: SocketAddrV4, path: P) -> Result<Self>{
		let config = ChordConfig::from_file(path).await?;
		let mut chord = Chord::new(listen_addr);
		chord.set_config(config);
		Ok(chord)
	}

	/// Place the node at a fixed key instead of the hash of its address.
	pub fn set_key(&mut self, key: u64){
		self.key = Some(key);
	}

	pub fn set_config(&mut self, config: ChordConfig){
		self.config = config;
	}

	/// Give the chord a list of addresses to try to join when it starts.
	/// If Some address is passed to start() it will be tried before these.
	pub fn set_join_list(&mut self, list: Vec<SocketAddrV4>){
		self.join_list = list;
	}

	/// Set if this chord will create a new ring when every join attempt fails
	pub fn set_join_or_create(&mut self, join_or_create: bool){
		self.join_or_create = join_or_create;
	}

	/// Turn the periodic stabilize/fix_fingers/fix_successor_list/check_predecessor
	/// timers on or off. With them off, the operations only run when called
	/// through the handle.
	pub fn set_maintenance(&mut self, maintenance: bool){
		self.maintenance = maintenance;
	}

	/// Starts the node, consuming the Chord and returning a ChordHandle.
	///
	/// With an empty join list (and no join address) the node creates a new
	/// ring. Otherwise each address is asked in turn for the successor of
	/// this node's key; the first answer is adopted.
	pub async fn start(self, join_addr: Option<SocketAddrV4>) -> Result<ChordHandle>{
		let mut join_list = Vec::new();
		if let Some(addr) = join_addr {
			join_list.push(addr);
		}
		join_list.extend(self.join_list.iter().copied());

		let core = ChordCore::bind(self.listen_addr, self.key, self.config).await?;
		let token = CancellationToken::new();
		info!("node {} listening on {}", core.key(), core.adaptor.local_addr());

		// Start listener task, joining needs it to receive answers
		let listener_handle = tokio::spawn(listen(core.clone(), token.clone()));

		if !join_list.is_empty() {
			let mut joined = false;
			for addr in join_list.iter() {
				match core.join(*addr).await {
					Ok(_) => {
						joined = true;
						break;
					},
					Err(e) if e.is_fatal() => {
						token.cancel();
						return Err(e);
					},
					// if no valid response, try next address
					Err(e) => {
						warn!("could not join through {}: {}", addr, e);
					},
				}
			}
			if !joined {
				if !self.join_or_create {
					token.cancel();
					return Err(ChordError::JoinFailed(join_list.len()));
				}
				info!("no bootstrap node answered, creating a new ring");
			}
		}else{
			info!("creating a new ring");
		}

		// Start maintenance task
		let maintenance_handle = if self.maintenance {
			Some(tokio::spawn(maintain(core.clone(), token.clone())))
		}else{
			None
		};

		Ok(ChordHandle{
			core,
			token,
			listener_handle,
			maintenance_handle,
		})
	}
}


/// Sole reader of the socket: answers requests and hands responses to
/// whoever is waiting for them.
pub(crate) async fn listen(core: Arc<ChordCore>, token: CancellationToken){
	let mut buf = vec![0u8; MAX_DATAGRAM];
	loop{
		let (len, from) = select! {
			_ = token.cancelled() => break,
			received = core.adaptor.recv_from(&mut buf) => match received {
				Ok(received) => received,
				Err(e) => {
					warn!("receive failed: {}", e);
					continue;
				},
			},
		};
		let from = match from {
			SocketAddr::V4(from) => from,
			SocketAddr::V6(from) => {
				debug!("ignoring datagram from {}", from);
				continue;
			},
		};

		match core.process_chord_msg(&buf[..len], from).await {
			Ok(response) => {
				if !response.is(MsgCase::NotSet) {
					core.adaptor.deliver(response);
				}
			},
			Err(e) if e.is_fatal() => {
				error!("node {} stopping: {}", core.key(), e);
				token.cancel();
				break;
			},
			Err(e) => {
				debug!("dropping datagram from {}: {}", from, e);
			},
		}
	}
	debug!("listener for node {} terminating", core.key());
}

/// Runs the periodic operations on their own timers, one at a time, until
/// the node is stopped or hits a fatal error.
async fn maintain(core: Arc<ChordCore>, token: CancellationToken){
	let mut stabilize = jittered_interval(core.config.stabilize_interval());
	let mut fix_fingers = jittered_interval(core.config.fix_fingers_interval());
	let mut fix_successor_list = jittered_interval(core.config.fix_successor_list_interval());
	let mut check_predecessor = jittered_interval(core.config.check_predecessor_interval());

	loop{
		let result = select! {
			_ = token.cancelled() => break,
			_ = stabilize.tick() => core.stabilize().await,
			_ = fix_fingers.tick() => core.fix_fingers().await,
			_ = fix_successor_list.tick() => core.fix_successor_list().await,
			_ = check_predecessor.tick() => core.check_predecessor().await,
		};
		match result {
			Ok(()) => {},
			Err(e) if e.is_fatal() => {
				error!("node {} stopping: {}", core.key(), e);
				token.cancel();
				break;
			},
			Err(e) => {
				debug!("maintenance step failed: {}", e);
			},
		}
	}
	debug!("maintenance for node {} terminating", core.key());
}

/// An interval whose first tick is offset by a random fraction of the period,
/// so nodes started together do not probe each other in lock-step.
fn jittered_interval(period: Duration) -> Interval{
	let period = period.max(Duration::from_millis(1));
	let offset = rand::thread_rng().gen_range(0..=period.as_millis() as u64);
	let mut interval = interval_at(Instant::now() + Duration::from_millis(offset), period);
	interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
	interval
}



/// A ChordHandle represents a connection to a started Chord.
pub struct ChordHandle{
	core: Arc<ChordCore>,
	token: CancellationToken,
	listener_handle: JoinHandle<()>,
	maintenance_handle: Option<JoinHandle<()>>,
}

impl ChordHandle{

	/// This node's identity on the ring.
	pub fn node(&self) -> Node{
		self.core.self_node()
	}

	/// A copy of the node's current ring state. Its Display impl prints it.
	pub fn snapshot(&self) -> RingState{
		self.core.snapshot()
	}

	/// Find the node responsible for `key`.
	pub async fn lookup(&self, key: u64) -> Result<Node>{
		let node = self.core.find_successor(key).await?;
		info!("key {} is held by {}", key, node);
		Ok(node)
	}

	pub async fn find_successor(&self, id: u64) -> Result<Node>{
		self.core.find_successor(id).await
	}

	pub fn closest_preceding_node(&self, id: u64) -> Node{
		self.core.closest_preceding_node(id)
	}

	pub async fn stabilize(&self) -> Result<()>{
		self.core.stabilize().await
	}

	pub async fn fix_fingers(&self) -> Result<()>{
		self.core.fix_fingers().await
	}

	pub async fn fix_successor_list(&self) -> Result<()>{
		self.core.fix_successor_list().await
	}

	pub async fn check_predecessor(&self) -> Result<()>{
		self.core.check_predecessor().await
	}

	/// False once the node was stopped or hit a fatal error.
	pub fn is_running(&self) -> bool{
		!self.token.is_cancelled()
	}

	/// Resolves when the node stops for any reason.
	pub async fn stopped(&self){
		self.token.cancelled().await
	}

	/// Force the chord to stop
	pub async fn stop(self){
		self.token.cancel();
		if let Err(e) = self.listener_handle.await {
			debug!("listener task ended abnormally: {}", e);
		}
		if let Some(handle) = self.maintenance_handle {
			handle.abort();
			match handle.await {
				Err(e) if !e.is_cancelled() => debug!("maintenance task ended abnormally: {}", e),
				_ => {},
			}
		}
	}
}
