pub mod builder;
pub mod handler;
pub mod listener;
pub mod response;
pub mod router;

pub use builder::{BoundServer, ServerBuilder};
pub use handler::RequestHandler;
pub use router::{Route, Router};
