mod limiter;
mod persistence;
pub use limiter::*;
pub use persistence::*;
