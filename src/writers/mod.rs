//! Writer implementations and the registry that creates them by name

pub mod console;
pub mod file;
pub mod json;
pub mod registry;
pub mod rolling_file;

pub use console::{ConsoleStream, ConsoleWriter};
pub use file::FileWriter;
pub use json::JsonWriter;
pub use registry::{WriterContext, WriterFactory, WriterOptions, WriterRegistry};
pub use rolling_file::{LabelStrategy, RollingFileWriter, RotationPolicy, RotationTrigger};

pub use crate::core::Writer;
