pub mod codec;
pub mod config;
pub mod orchestrator;
pub mod rules;
pub mod scan;
pub mod transform;
pub mod watch;

pub use codec::{CodecError, MidiFile, Payload, TimedEvent, Track};
pub use config::{Config, ConfigError, WatchSettings};
pub use orchestrator::{ContentHash, Orchestrator, ProcessError, ProcessOutcome};
pub use rules::RuleSet;
pub use scan::ScanFilter;
pub use transform::{Edit, Pipeline, TransformError};
pub use watch::{Controller, ControllerHandle, watch_root};
