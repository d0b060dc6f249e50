pub mod core;
pub mod dispatch;
pub mod fallback;
pub mod memory;
pub mod news;
pub mod query;
pub mod tokens;
pub mod typing;

// Re-exports
pub use crate::core::config::CoincubConfig;
pub use crate::dispatch::Dispatcher;
pub use crate::tokens::extract_tokens;
