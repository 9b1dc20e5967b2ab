//! Secret stores, OAuth token lifecycle and the Google Calendar client.
//!
//! One proxy invocation walks through this crate in order:
//!
//! ```text
//!  SecretStore ──► TokenManager ──► Transport
//!                       │               │
//!                 TokenRefresher   CalendarConnector
//!                (token endpoint)       │
//!                                       ▼
//!                                  CalendarApi ──► resolve_calendar_id
//!                                       │
//!                                       ▼
//!                                 list_events ──► RawEvent
//! ```

pub mod error;
pub mod google;
pub mod provider;
pub mod resolver;
pub mod secret;

pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use provider::{
    BoxFuture, CalendarApi, CalendarConnector, CalendarListEntry, CalendarListPage, EventQuery,
};
pub use resolver::resolve_calendar_id;
pub use secret::{
    FileSecretStore, MemorySecretStore, PassSecretStore, SecretError, SecretResult, SecretStore,
};
