//! Core processing building blocks: band registry, grids, mask propagation,
//! index formulas and processing parameters. These are the pure primitives
//! consumed by the high-level `api` module.
pub mod grid;
pub mod indices;
pub mod mask;
pub mod params;
pub mod registry;
