pub mod archive;
pub mod entry;
pub mod environment;
pub mod error;
pub mod events;
pub mod gateway;
pub mod job;
pub mod lifecycle;

pub use environment::{Environment, EnvironmentBuilder, EnvironmentHandle};
pub use events::{EventSink, LifecycleEvent, LifecycleState};
pub use job::JobRunner;
pub use lifecycle::{LaunchSettings, LifecycleManager, TestRequest};
