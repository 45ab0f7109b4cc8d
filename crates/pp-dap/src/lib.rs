pub mod adapter;
pub mod error;
pub mod executor;
pub mod handler;
pub mod log;
pub mod protocol;
pub mod server;

pub use adapter::ManifestAdapter;
pub use error::AdapterError;
pub use executor::ManifestRunner;
pub use protocol::{DebuggerMessage, LaunchArgs};
pub use server::{serve, start};
