// Mountain hut reservation watcher: polls the booking calendar, emails when a date opens up

pub mod availability;
pub mod config;
pub mod date_range;
pub mod event_data;
pub mod notifier;
pub mod watcher;

// Re-export key types for convenience
pub use availability::{check_availability, parse_service_date, AvailabilityStatus};
pub use config::{AppConfig, ConfigError, MailConfig, UpstreamConfig, WatchConfig};
pub use date_range::{DateRange, RangePolicy};
pub use event_data::{
    decode_nested_json, EventCollection, EventDataClient, EventRecord, EventSource, FetchError,
    QueryParameters,
};
pub use notifier::{Notification, Notifier, NotifyError, SmtpNotifier};
pub use watcher::{AvailabilityWatcher, RunOutcome};
