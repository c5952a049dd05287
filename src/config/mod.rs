//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, env secret override)
//!     → validation.rs (semantic checks)
//!     → GuardConfig (validated, immutable)
//!     → handed to RequestGuard at startup
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → RequestGuard::apply_update (secret rotation, limit swap)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    CookieConfig, CsrfConfig, CsrfStrategy, GuardConfig, IdentityConfig, ListenerConfig,
    LogFormat, ObservabilityConfig, RateLimitConfig, RateLimitRule, SameSitePolicy,
    SecretString, SecurityConfig, StoreBackend, StoreConfig, TimeoutConfig, TlsConfig,
    UpstreamConfig,
};
