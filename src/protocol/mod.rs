//! Wire protocol: length-prefixed transfers and their reassembly
//!
//! Every transfer in either direction is `[u32 LE length][payload]`.

pub mod frame;
pub mod reassembly;

pub use frame::{encode_frame, read_header};
pub use reassembly::{FrameReassembler, Ingest, Payload, ReassemblyStats};
