//! Value types shared by every window manager component

pub mod geometry;

pub use geometry::{Extents, Geometry, Strut};
