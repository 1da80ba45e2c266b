pub mod batch;
pub mod config;
pub mod dedup;
pub mod error;
pub mod fetch;
pub mod ledger;
pub mod model;
pub mod projection;
pub mod service;
pub mod span;
pub mod storage;

pub use batch::{assign, Assignment};
pub use config::{AccountConfig, AppConfig, Endpoints, FetchSettings, PersonaConfig};
pub use dedup::{is_new, DedupKey};
pub use error::{ConfigError, FetchError, StoreError, TimelineError};
pub use fetch::{fetch_account, run_fetch, AccountStatus, AccountSummary, FetchConfig, RunSummary};
pub use ledger::TimelineLedger;
pub use model::{
    Account, AccountId, Activity, ActivityContent, ActivityId, BatchPolicy, ContentKind,
    Credentials, EntryId, HighWaterMark, NormalizedActivity, ServiceKind, Span, TimelineEntry,
};
pub use projection::{project, EntryView, Render, RenderedActivity, TimelineQuery};
pub use service::{AdapterRegistry, FetchedBatch};
pub use span::update_span;
pub use storage::{IngestOutcome, TimelineStore};
