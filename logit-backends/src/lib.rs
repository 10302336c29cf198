//! Local sinks for the tracing pipeline: console and file backends plus the
//! line formatters they share.

pub mod buffer;
pub mod console;
pub mod file;
pub mod format;

pub use buffer::WriteBuffer;
pub use console::{ConsoleBackend, ConsoleConfig};
pub use file::{FileBackend, FileConfig};
pub use format::{EventFormatter, JsonFormatter, TextFormatter};
