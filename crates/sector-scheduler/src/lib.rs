//! Event scheduler (world loop) for the Arcane Sector server.
//!
//! Merges three kinds of input into one ordered stream, consumed by a
//! single task that owns all world state:
//!
//! - packets posted by connection tasks,
//! - internal special events,
//! - timers and reply deadlines armed by suspended continuations.
//!
//! # Integration
//!
//! ```ignore
//! let (handle, events) = sector_scheduler::channel();
//! let scheduler = Scheduler::new(game, events, SchedulerConfig::default());
//! let world_task = tokio::spawn(scheduler.run());
//! handle.post_special(MySpecial::Boot);
//! // ... later
//! handle.shutdown();
//! let game = world_task.await?;
//! ```

mod continuation;
mod correlation;
mod deferred;
mod error;
mod event;
mod scheduler;

pub use continuation::{Continuation, Handled, Resume, Step, Suspension};
pub use correlation::{CorrelationKey, CorrelationRegistry};
pub use deferred::DeferredQueue;
pub use error::{HandlerError, SchedulerError};
pub use event::{Event, EventReceiver, SchedulerHandle, SpecialEvent, channel};
pub use scheduler::{
    Handlers, PacketHandler, Scheduler, SchedulerConfig, SchedulerMetrics,
    SpecialHandler, WorldLogic,
};
