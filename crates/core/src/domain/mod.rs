pub mod chat;
pub mod debtor;
pub mod fields;
pub mod invoice;
pub mod sales;
pub mod stock;
