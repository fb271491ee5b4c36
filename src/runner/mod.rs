pub mod aggregator;
pub mod invocation;
pub mod process;
pub mod reader;
pub mod reporter;
pub mod supervisor;
pub mod tools;
pub mod types;

pub use aggregator::{Aggregator, SampleCollector};
pub use invocation::RunnerInvocation;
pub use process::{Clock, Launcher, SystemClock, SystemLauncher, WorkerProcess};
pub use reader::{SamplesReader, SharedReader};
pub use reporter::RunReporter;
pub use supervisor::{ArtifactPaths, LoadSettings, RunnerState, TestRunner};
pub use tools::{Interpreter, RequiredTool, WorkerScript, check_tools};
pub use types::{RunMode, RunSummary, SampleRecord, SampleStatus};
