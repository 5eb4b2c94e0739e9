//! Reference search domains.
//!
//! Small, self-contained implementations of [`crate::domain::Domain`] used
//! by the tests, the benchmarks and the `main` binary.

pub mod graph;
pub mod grid;
pub mod tiles;
