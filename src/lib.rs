//! Reads actors and the enmity list out of a running FFXIV client.
//!
//! ```no_run
//! use ffxiv_enmity::Session;
//!
//! let mut session = Session::attach_first()?;
//! if session.is_usable() {
//!     for entry in session.get_threat_table() {
//!         println!("{:>3}% {}", entry.hate_rate, entry.name);
//!     }
//! }
//! # Ok::<(), ffxiv_enmity::EngineError>(())
//! ```

pub mod anchor;
pub mod bytes;
pub mod enmity;
pub mod entity;
pub mod error;
pub mod memory;
pub mod offsets;
pub mod pattern;
pub mod scanner;
pub mod session;

#[cfg(test)]
mod mock;

pub use enmity::EnmityEntry;
pub use entity::{Combatant, ObjectType};
pub use error::EngineError;
pub use offsets::ClientVariant;
pub use session::{find_client_processes, ClientProcess, Session, Snapshot};
