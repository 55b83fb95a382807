pub mod compile;
pub mod config;
pub mod emit;
pub mod index;
pub mod report;

pub use compile::{Compilation, CompileError, compile};
pub use config::{CompileConfig, ConfigError, ConfigFile, Overrides, Settings};
pub use emit::{
    EmitError, EmitOptions, OutputFormat, QcRow, StagedWrite, emit_artifact, emit_outputs, emit_qc,
};
pub use index::HashCollision;
pub use report::CompilationReport;
