//! TCP accept loop and connection registry.
//!
//! The server admits at most one connection per remote IP address. A newer
//! connection from the same address closes the older one before it is
//! admitted.

mod registry;
#[allow(clippy::module_inception)]
mod server;

pub use registry::{REPLACED_REASON, Registry};
pub use server::{SHUTDOWN_REASON, Server, WebSocket};
