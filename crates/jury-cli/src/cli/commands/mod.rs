pub mod analyze;
pub mod dispatch;
pub mod judge;
pub mod validate;

pub use dispatch::dispatch;
