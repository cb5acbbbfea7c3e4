pub mod comparison_service;
pub mod notification_service;
pub mod price_service;
pub mod recurrence_service;
pub mod savings_service;

pub use comparison_service::{ComparisonService, FeeComparison};
pub use notification_service::{EventKind, Notifier, ScheduleEvent, WebhookNotifier};
pub use price_service::PriceService;
pub use recurrence_service::{RecurrenceGenerator, RecurrenceSummary};
pub use savings_service::{SavingsService, SavingsStats};
