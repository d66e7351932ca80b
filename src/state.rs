//! Shared application state injected into all handlers.

use std::sync::Arc;

use crate::application::services::{CodeService, RedirectPolicy, Resolver};
use crate::domain::repositories::CodeRepository;
use crate::utils::code_generator::CodeGenerator;

#[derive(Clone)]
pub struct AppState {
    pub code_service: Arc<CodeService<dyn CodeRepository>>,
    pub resolver: Arc<Resolver<dyn CodeRepository>>,
    pub repository: Arc<dyn CodeRepository>,
}

impl AppState {
    /// Wires the services around one registry.
    pub fn new(
        repository: Arc<dyn CodeRepository>,
        generator: CodeGenerator,
        public_base_url: impl Into<String>,
        policy: RedirectPolicy,
    ) -> Self {
        let code_service = Arc::new(CodeService::new(
            repository.clone(),
            generator,
            public_base_url,
            policy.allowed_schemes.clone(),
        ));
        let resolver = Arc::new(Resolver::new(repository.clone(), policy));

        Self {
            code_service,
            resolver,
            repository,
        }
    }
}
