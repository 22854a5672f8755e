use std::net::SocketAddrV4;

use sha2::{Digest, Sha256};

/// Number of bits in an identifier, and therefore the number of fingers.
pub const M: usize = 64;

/// Tests if `x` lies in the circular interval `(lower, upper)`, or
/// `(lower, upper]` when `inclusive` is set.
///
/// When `lower == upper` the interval spans the whole ring: `(a, a)` is every
/// identifier except `a`, and `(a, a]` is every identifier.
pub fn element_of(x: u64, lower: u64, upper: u64, inclusive: bool) -> bool {
	if inclusive && x == upper {
		return true;
	}
	if lower < upper {
		x > lower && x < upper
	} else if lower > upper {
		x > lower || x < upper
	} else {
		x != lower
	}
}

/// A ChordId is a point around the chord ring. The ring here is fixed to
/// 64 bits, so this is only implemented for u64.
pub trait ChordId: Copy {
	/// Tests if self is in the range (lower, upper], or (lower, upper) when
	/// not inclusive.
	fn is_element_of(&self, lower: Self, upper: Self, inclusive: bool) -> bool;
	/// The id that finger `index` should point at the successor of.
	fn calculate_finger(&self, index: usize) -> Self;
	/// Calculate the next finger index, wrapping back to 0 after M - 1.
	fn next_index(prev_index: usize) -> usize;
}

impl ChordId for u64 {
	fn is_element_of(&self, lower: u64, upper: u64, inclusive: bool) -> bool {
		element_of(*self, lower, upper, inclusive)
	}

	fn calculate_finger(&self, index: usize) -> u64 {
		self.wrapping_add(1u64 << index)
	}

	fn next_index(prev_index: usize) -> usize {
		let next_index = prev_index + 1;
		if next_index >= M {
			0
		} else {
			next_index
		}
	}
}

/// Position of a node on the ring, derived from its address.
pub fn hash_address(addr: &SocketAddrV4) -> u64 {
	let mut hasher = Sha256::new();
	hasher.update(addr.ip().octets());
	hasher.update(addr.port().to_be_bytes());
	let digest = hasher.finalize();

	let mut key = [0u8; 8];
	key.copy_from_slice(&digest[..8]);
	match u64::from_be_bytes(key) {
		0 => 1, // 0 is reserved for unset nodes
		key => key,
	}
}
