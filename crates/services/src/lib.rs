pub mod auth;
pub mod cache;
pub mod checklist;
pub mod dao;
pub mod envelope;
pub mod query;
pub mod report;
pub mod resource;
pub mod task;

pub use auth::AuthService;
pub use cache::{ListCache, build_cache};
pub use checklist::ChecklistStore;
pub use dao::*;
pub use envelope::ResponsePayload;
pub use query::{ListQuery, ListQueryEngine, ListResult};
pub use report::ReportAggregator;
pub use resource::{ResourceKind, ResourceService};
pub use task::TaskService;
