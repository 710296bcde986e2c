//! Fundamental types shared by every layer.
//!
//! - [`PlainOldDataType`] and [`AlembicPod`] - element kinds
//! - [`DataType`] - POD + extent
//! - [`Dimensions`] - array sample shape
//! - [`Error`] / [`Result`] - error handling

mod data_type;
mod dimensions;
mod error;
mod pod;

pub use data_type::*;
pub use dimensions::*;
pub use error::*;
pub use pod::*;

/// Time value in seconds.
pub type Chrono = f64;
