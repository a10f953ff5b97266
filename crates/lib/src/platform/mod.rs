//! Host platform locations.

pub mod paths;
