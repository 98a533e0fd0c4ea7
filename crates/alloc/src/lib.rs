//! A typed growable array with a pluggable allocator, growth policy and size type.
//!
//! [`GrowVec`] is configured when it is constructed:
//!
//! - the allocator hook ([`Allocator`]) acquires, resizes and releases its storage, and is handed
//!   a per-vector context on every call,
//! - the round-up policy ([`RoundUp`]) picks the capacity when writing past the end,
//! - the size type ([`Size`]) counts elements and slots.
//!
//! ```
//! use elastic_alloc::{capacity, Config, GrowVec, Traced, TryGlobal};
//!
//! let mut slots: GrowVec<u32, u16, Traced<TryGlobal>, &str> = GrowVec::with_config(Config {
//!     alloc: Traced(TryGlobal),
//!     roundup: capacity::smear,
//!     context: "slots",
//! });
//!
//! slots.insert(19, 2).unwrap();
//! assert_eq!(slots.len(), 20);
//! assert_eq!(slots.capacity(), 32);
//! assert_eq!(slots.at(19), Ok(&2));
//! ```
//!
//! Contract violations, like popping from an empty vector, panic. Resource failures are returned
//! as [`Error`]s and leave the vector unchanged, except with the default [`Global`] hook, which
//! treats running out of memory as fatal.

pub mod arena;
pub mod capacity;
pub mod containers;
pub mod error;
pub mod global;
pub mod size;
pub mod traced;
pub mod traits;

pub use arena::Arena;
pub use capacity::RoundUp;
pub use containers::vec::{Config, GrowVec};
pub use error::{AllocError, Error};
pub use global::{Global, TryGlobal};
pub use size::Size;
pub use traced::Traced;
pub use traits::Allocator;
