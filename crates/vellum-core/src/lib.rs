mod block;
mod bridge;
mod classify;
mod core;
mod error;
mod html;
mod marks;
mod ops;
mod paste;
mod selection;
mod table;

pub use crate::block::*;
pub use crate::bridge::*;
pub use crate::classify::*;
pub use crate::core::*;
pub use crate::error::*;
pub use crate::html::*;
pub use crate::marks::*;
pub use crate::ops::*;
pub use crate::paste::*;
pub use crate::selection::*;
pub use crate::table::*;
