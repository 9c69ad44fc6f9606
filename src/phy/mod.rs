//! Physical-layer timing model.

pub mod airtime;
