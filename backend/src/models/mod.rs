pub mod filter;
pub mod frame;
pub mod session;
pub mod time;

pub use filter::*;
pub use frame::*;
pub use session::*;
