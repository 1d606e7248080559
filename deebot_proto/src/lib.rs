//! Codecs for the vendor's firmware protocol: typed request/response
//! framing for every ecovacs service, topic message decoders, and the
//! LZMA-based submap and trace-path decompression.

mod frame;
pub mod services;
mod submap;
mod topics;
mod trace;
mod types;

pub use frame::*;
pub use submap::*;
pub use topics::*;
pub use trace::*;
pub use types::*;
