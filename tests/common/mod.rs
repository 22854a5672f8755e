
use std::{net::{Ipv4Addr, SocketAddrV4}, time::Duration};

use chord_ring::{Chord, ChordConfig, ChordHandle};
use tokio::time::{sleep, Instant};
use tracing_subscriber::EnvFilter;


pub fn init_tracing(){
	let _ = tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}

pub fn loopback() -> SocketAddrV4{
	SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0)
}

/// Timers short enough for a ring to settle within a few seconds.
pub fn fast_config() -> ChordConfig{
	ChordConfig{
		stabilize_interval_ms: 100,
		fix_fingers_interval_ms: 20,
		fix_successor_list_interval_ms: 200,
		check_predecessor_interval_ms: 300,
		response_timeout_ms: 200,
		max_successors: 4,
		successor_failure_threshold: 2,
	}
}

/// Start one node per key. The first creates the ring, the rest join through it.
pub async fn make_nodes(keys: &[u64]) -> Vec<ChordHandle>{
	let mut v: Vec<ChordHandle> = Vec::new();
	for key in keys{
		let mut chord = Chord::new(loopback());
		chord.set_key(*key);
		chord.set_config(fast_config());
		let join_addr = v.first().map(|first| first.node().socket_addr());
		let handle = chord.start(join_addr).await.expect("Chords should be able to start");
		v.push(handle);
	}
	v
}

/// Keys sorted around the ring; the successor of each is the next one.
pub fn ring_order(handles: &[&ChordHandle]) -> Vec<u64>{
	let mut keys: Vec<u64> = handles.iter().map(|h| h.node().key).collect();
	keys.sort_unstable();
	keys
}

/// True when every node's successor, successor list head and predecessor
/// agree with key order.
pub fn is_consistent(handles: &[&ChordHandle]) -> bool{
	let keys = ring_order(handles);
	handles.iter().all(|handle| {
		let state = handle.snapshot();
		let i = keys.iter().position(|k| *k == state.self_node.key).unwrap();
		let next = keys[(i + 1) % keys.len()];
		let prev = keys[(i + keys.len() - 1) % keys.len()];
		state.successor.key == next
			&& state.successor_list[0] == state.successor
			&& state.predecessor.map(|p| p.key) == Some(prev)
	})
}

/// Owner of `id`: the first key at or after it, wrapping around.
pub fn owner_of(keys: &[u64], id: u64) -> u64{
	keys.iter().copied().find(|k| *k >= id).unwrap_or(keys[0])
}

pub async fn wait_until<F: Fn() -> bool>(limit: Duration, condition: F) -> bool{
	let deadline = Instant::now() + limit;
	while Instant::now() < deadline {
		if condition() {
			return true;
		}
		sleep(Duration::from_millis(50)).await;
	}
	condition()
}
