//! Fixed-capacity pool of reference-counted audio blocks.
//!
//! [`BlockPool`] owns the storage; [`AudioBlockMut`] and [`AudioBlockRef`] are RAII
//! handles that borrow it. Dropping the last handle to a slot returns it to the
//! free set.

pub mod pool;
pub mod ref_types;

pub use pool::{AudioBlockData, BlockHandle, BlockPool};
pub use ref_types::{AudioBlockMut, AudioBlockRef};
