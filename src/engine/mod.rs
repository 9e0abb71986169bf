// engine module: session-scoped aggregation, calendar and notification sync

pub mod aggregate;
pub mod calendar;
mod interface;
pub mod notifications;
mod refresh;
mod session;
pub mod stub;

pub use aggregate::{AggregateError, aggregate_stats};
pub use calendar::{CalendarError, build_calendar, synthesize_calendar};
pub use interface::DataProvider;
pub use notifications::{
    FetchOptions, FetchOutcome, NotificationSync, ReadScope, SyncError, SyncState,
};
pub use refresh::RefreshTask;
pub use session::{Session, SessionContext};
pub use stub::StubProvider;
