//! Chat surface of the assistant.
//!
//! - **Polling** (`polling`) - transport seam, long-polling runner with
//!   reconnect backoff, working placeholder then edit-in-place replies
//! - **Events** (`events`) - commands, text messages, button presses and the
//!   dispatcher that hands them to a [`events::ConversationService`]
//! - **Commands** (`commands`) - `/start`, `/help`, `/menu`, `/cancel`,
//!   `/invoice`, `/debtor`
//! - **Keyboard** (`keyboard`) - inline keyboards and outgoing message bodies
//! - **Telegram** (`telegram`) - Bot API transport
//!
//! ```text
//! Telegram updates → PollingRunner → EventDispatcher → ConversationService
//!                         ↓
//!              placeholder edited into the reply
//! ```

pub mod commands;
pub mod events;
pub mod keyboard;
pub mod polling;
pub mod telegram;
