mod initialize;
pub use initialize::Initializer;

mod config;
pub use config::{Config, StoreConfig, SweepConfig};

pub mod env {
    pub const LOG_DIRECTIVE: &str = "TTLSWEEP_LOG";
    pub const CONFIG_PATH: &str = "TTLSWEEP_CONFIG";
}
