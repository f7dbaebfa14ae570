//! Request-path settlement computations.

pub mod act;
