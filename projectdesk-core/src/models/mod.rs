//! Domain models for ProjectDesk.
//!
//! Every secondary entity references exactly one [`Project`]:
//!
//! - [`Message`]: chat thread between the user and the assistant persona.
//! - [`LogEntry`]: append-only activity log (execution runs and the like).
//! - [`Feature`] → [`Milestone`] → [`Goal`]: the project plan.
//! - [`Output`], [`Sale`]: generated content and recorded revenue.
//! - [`GenerationTask`]: queued content-generation jobs.
//! - [`CredentialSet`]: per-platform credential fields.
//!
//! [`Notification`] is the wire shape pushed to clients when rows are created.

mod credential;
mod log;
mod message;
mod notification;
mod output;
mod plan;
mod project;
mod sale;
mod task;
mod user;

pub use credential::*;
pub use log::*;
pub use message::*;
pub use notification::*;
pub use output::*;
pub use plan::*;
pub use project::*;
pub use sale::*;
pub use task::*;
pub use user::*;
