// Adapters layer: concrete implementations of the domain ports.

pub mod http;
pub mod resources;

pub use http::HttpServiceCaller;
pub use resources::LocalResources;
