//! In-memory data model.
//!
//! [`Keyspace`] maps keys to [`Entry`] values with optional deadlines;
//! [`SortedSet`] backs the `Z*` family.

pub mod keyspace;
pub mod sorted_set;
pub mod value;

pub use keyspace::Keyspace;
pub use sorted_set::{ScoreBound, ScoreRange, SortedSet};
pub use value::{Entry, Value};
