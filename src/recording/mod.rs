pub mod codec;
pub mod header;
pub mod reader;
pub mod writer;

pub use header::{RecordingHeader, DATA_SENTINEL, FORMAT_VERSION, MAGIC};
pub use reader::RecordingReader;
pub use writer::{RecordingWriter, WriterState};
