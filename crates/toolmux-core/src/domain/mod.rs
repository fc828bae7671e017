mod plugin;
mod server;
mod status;

pub use plugin::{Capability, ToolPlugin};
pub use server::{ConfigTier, ServerConfig, TransportSpec, TransportType};
pub use status::ServerStatus;
