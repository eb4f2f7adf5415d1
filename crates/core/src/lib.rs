pub mod comparer;
pub mod config;
pub mod executor;
pub mod metrics;
pub mod naming;
pub mod pipeline;
pub mod processors;
pub mod scheduler;
pub mod source;
pub mod testing;

pub use comparer::{
    AlwaysEqualComparer, ComparerKind, NameComparer, OriginComparer, ReferenceComparer,
    SourceComparer,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DaemonConfig,
};
pub use executor::{
    Executor, ExecutorConfig, ExecutorError, ExecutorStatus, LifecycleEvent, LifecycleEventKind,
    LifecycleObserver, SubscriptionId,
};
pub use naming::{FileInfo, NamePattern, NamePatternError};
pub use pipeline::{
    Pipeline, PipelineBuilder, PipelineDefinition, PipelineError, Processor, ProcessorError,
};
pub use processors::{
    build_pipelines, FnProcessor, LogProcessor, MoveProcessor, PipelineConfig, ProcessorConfig,
    RenameProcessor,
};
pub use scheduler::{PollingScheduler, SchedulerConfig, SchedulerError, SchedulerStatus};
pub use source::{FileSource, LocalFile, SourceError, SourceHandle};
