//! Range math and chunk planning.
//!
//! Clamps the caller's range against the resource size, builds Range header
//! values, and cuts the range into ordered chunks on demand.

mod chunk;
mod range;

pub use chunk::{chunk_size, max_part, Chunk, ChunkPlanner};
pub use range::HttpRange;
