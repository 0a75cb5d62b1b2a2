pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod intent;
pub mod reply;

pub use domain::chat::ChatId;
pub use domain::debtor::Debtor;
pub use domain::invoice::{CreateOutcome, InvoiceHeader, NewDebtor, NewInvoice};
pub use domain::sales::SalesSummary;
pub use domain::stock::StockItem;
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use intent::{IntentKind, IntentResult};
pub use reply::{ReplyButton, ReplyFormat, ReplyMessage};
