//! Common data types

pub mod geometry;
pub mod motion;
pub mod scan;
pub mod telemetry;

pub use geometry::*;
pub use motion::*;
pub use scan::*;
pub use telemetry::*;
