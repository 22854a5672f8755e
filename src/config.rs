use std::{path::Path, time::Duration};

use serde::{Serialize, Deserialize};
use tokio::fs;

use crate::error::{ChordError, Result};

/// Timers and limits of a chord node. Every field has a default, so a config
/// file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChordConfig{
	pub stabilize_interval_ms: u64,
	pub fix_fingers_interval_ms: u64,
	pub fix_successor_list_interval_ms: u64,
	pub check_predecessor_interval_ms: u64,
	/// Total time a request waits for its response.
	pub response_timeout_ms: u64,
	/// Ceiling on the successor list length, successor included.
	pub max_successors: usize,
	/// Consecutive unanswered stabilize probes before the successor is
	/// replaced by the next entry of the successor list.
	pub successor_failure_threshold: u32,
}

impl Default for ChordConfig{
	fn default() -> Self {
		ChordConfig{
			stabilize_interval_ms: 1000,
			fix_fingers_interval_ms: 500,
			fix_successor_list_interval_ms: 1000,
			check_predecessor_interval_ms: 2000,
			response_timeout_ms: 1000,
			max_successors: 8,
			successor_failure_threshold: 3,
		}
	}
}

impl ChordConfig{

	pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self>{
		let data = fs::read_to_string(&path).await.map_err(|source| ChordError::Config{
			path: path.as_ref().to_path_buf(),
			source,
		})?;
		let config = serde_json::from_str(&data)?;
		Ok(config)
	}

	pub fn stabilize_interval(&self) -> Duration{
		Duration::from_millis(self.stabilize_interval_ms)
	}

	pub fn fix_fingers_interval(&self) -> Duration{
		Duration::from_millis(self.fix_fingers_interval_ms)
	}

	pub fn fix_successor_list_interval(&self) -> Duration{
		Duration::from_millis(self.fix_successor_list_interval_ms)
	}

	pub fn check_predecessor_interval(&self) -> Duration{
		Duration::from_millis(self.check_predecessor_interval_ms)
	}

	pub fn response_timeout(&self) -> Duration{
		Duration::from_millis(self.response_timeout_ms)
	}

	/// Ceiling on the successor list, never below one entry.
	pub fn successor_list_ceiling(&self) -> usize{
		self.max_successors.max(1)
	}
}
