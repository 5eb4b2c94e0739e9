//! Implementation of search algorithms.
//!
//! These algorithms can do path-finding on any [`Domain`](crate::domain::Domain).

pub mod arastar;
pub mod best_first;
pub mod lsslrtastar;
