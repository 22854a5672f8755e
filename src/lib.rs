//! One node of a Chord ring over UDP: a 64-bit identifier space, a finger
//! table, a successor list, and the periodic stabilization that keeps them
//! consistent while peers join, leave or fail.

pub mod chord;
pub use chord::{Chord, ChordHandle, state::RingState};

pub mod adaptor;

pub mod chord_id;
pub use chord_id::{element_of, M};

pub mod config;
pub use config::ChordConfig;

pub mod error;
pub use error::{ChordError, Result};

pub mod node;
pub use node::Node;
