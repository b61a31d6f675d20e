//! Port traits decoupling the domain from concrete IO.

pub mod config_port;
pub mod price_port;
pub mod store_port;
pub mod execution_port;
pub mod judgment_port;
