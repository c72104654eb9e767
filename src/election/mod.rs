mod elector;
mod promotion;
mod state;
mod waiter;

pub use elector::*;
pub use promotion::*;
pub use state::*;
