// HTTP routes
pub mod capture;
pub mod health;
pub mod stream;
pub mod tickets;

pub use capture::*;
pub use health::*;
pub use stream::*;
pub use tickets::*;
