//! Little-endian payload cursors for the firmware's binary service protocol.

mod payload_reader;
mod payload_writer;

pub use payload_reader::PayloadReader;
pub use payload_writer::PayloadWriter;
