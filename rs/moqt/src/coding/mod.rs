//! The low-level encoding primitives shared by every stream family.
//!
//! You should not use this module directly; see [crate] for the high-level API.

mod decode;
mod encode;
mod reader;
mod stream;
mod writer;

pub use decode::*;
pub use encode::*;
pub use reader::*;
pub use stream::*;
pub use writer::*;
