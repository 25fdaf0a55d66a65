// Modelcheck library entry point

pub mod internal {
    pub mod checks {
        pub mod builtin;
        pub mod executor;
        pub mod registry;
        pub mod result;
    }
    pub mod model {
        pub mod handle;
    }
    pub mod backend {
        pub mod api;
        pub mod store;
    }
    pub mod gateway {
        pub mod api;
        pub mod client;
        pub mod durable;
        pub mod service;
    }
    pub mod config;
}

// Re-export key types for external use
pub use internal::backend::store::{Job, JobStatus, JobStore, StoreError};
pub use internal::checks::builtin::CoreSource;
pub use internal::checks::executor::{CheckExecutor, ExecMode, ExecOptions};
pub use internal::checks::registry::{
    CheckError, CheckFunction, CheckOptions, CheckerRegistry, DiscoveryError, PluginSource,
    RegisteredCheck,
};
pub use internal::checks::result::{CheckResult, CheckStatus, RowError};
pub use internal::gateway::client::{BackendClient, BackendError, HttpBackendClient};
pub use internal::gateway::durable::{DurableError, DurableRecord, GatewayStore, TerminalStatus};
pub use internal::gateway::service::{GatewayError, GatewayJobStatus, JobGateway, JobStatusView};
pub use internal::model::handle::{ModelElement, ModelError, ModelHandle};
