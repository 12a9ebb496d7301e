//! Unified configuration layer.
//!
//! Every environment variable read goes through this module; other crates use
//! the structured configs instead of calling `std::env::var` directly.
//!
//! - `loader`: env_or, env_optional, env_bool helpers and the set/remove wrappers
//! - `schema`: InterpreterConfig, RunnerConfig, GateConfig, ObservabilityConfig
//! - `env_keys`: key constants

pub mod env_keys;
pub mod loader;
pub mod schema;

pub use loader::{
    env_bool, env_optional, env_or, load_dotenv, load_dotenv_from_dir, remove_env_var,
    set_env_var, ScopedEnvGuard,
};
pub use schema::{GateConfig, InterpreterConfig, ObservabilityConfig, RunnerConfig};
