pub mod event;
pub mod registry;

pub use event::{PipelineEvent, Stage};
pub use registry::{EventBroadcaster, EventSink, JobReporter, SubscriberId, Subscription};
