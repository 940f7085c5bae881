//! Build orchestration: staleness decisions, compiler invocation, native
//! delegation.

pub mod javac;
pub mod native;
pub mod orchestrator;
pub mod stamp;

pub use javac::{CompileSpec, Toolchain};
pub use native::NativeBuilder;
pub use orchestrator::{BuildOptions, BuildReport, Orchestrator};
pub use stamp::TimeStampFile;
