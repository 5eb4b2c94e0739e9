use shadow_rs::shadow;

shadow!(build);

// Internals
// ---------
pub mod debug;
pub mod derank;
pub mod heap_primitives;
pub mod timer;

// Data structures
// ---------------
pub mod data_structures;

// Search space and problems
// -------------------------
pub mod cost;
pub mod domain;
pub mod limits;
pub mod options;
pub mod report;
pub mod search;

// Problems
// --------
pub mod problems;

// Algorithms
// ----------
pub mod algorithms;
