//! The built runtime (§5): contract metadata, target, interceptor chain,
//! transport client, and config combined into one immutable object shared
//! across caller threads. Only options and the retryer are cloned per
//! invocation (§5); everything here is read-only after construction.

use crate::config::ClientConfig;
use crate::contract::{parse_interface, InterfaceDecl, OperationMetadata};
use crate::error::Error;
use crate::executor::{self, ResponseMode};
use crate::interceptor::InterceptorChain;
use crate::invocation::{ExecutionContext, ExecutionResult, OperationCall};
use crate::target::Target;
use crate::template_builder::ExpanderRegistry;
use indexmap::IndexMap;
use reqwest::Client;
use std::time::Duration;

/// An immutable, constructed client for one or more declared interfaces.
pub struct Runtime {
    operations: IndexMap<String, OperationMetadata>,
    target: Box<dyn Target>,
    interceptors: InterceptorChain,
    client: Client,
    config: ClientConfig,
    expanders: ExpanderRegistry,
}

impl Runtime {
    /// Parses every declared interface's operations (§4.4) and builds the
    /// transport client from `config`'s request options (§6).
    ///
    /// # Errors
    /// Returns a contract error if any interface is malformed (§4.4).
    pub fn build(
        interfaces: &[InterfaceDecl],
        target: Box<dyn Target>,
        interceptors: InterceptorChain,
        config: ClientConfig,
        expanders: ExpanderRegistry,
    ) -> Result<Self, Error> {
        let mut operations = IndexMap::new();
        for interface in interfaces {
            for operation in parse_interface(interface)? {
                operations.insert(operation.identity.clone(), operation);
            }
        }
        let redirect_policy =
            if config.options.follow_redirects { reqwest::redirect::Policy::default() } else { reqwest::redirect::Policy::none() };
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.options.connect_timeout_millis))
            .redirect(redirect_policy)
            .build()
            .map_err(|e| Error::configuration_error(format!("failed to build transport client: {e}")))?;
        Ok(Self { operations, target, interceptors, client, config, expanders })
    }

    /// Dispatches one operation call through the pipeline (§4.7).
    ///
    /// # Errors
    /// Returns `Error::operation_not_found` if `call.operation_id` was never
    /// declared, or whatever the pipeline itself produces.
    pub async fn invoke(
        &self,
        call: OperationCall,
        context: &ExecutionContext,
        mode: ResponseMode,
    ) -> Result<ExecutionResult, Error> {
        let metadata = self
            .operations
            .get(&call.operation_id)
            .ok_or_else(|| Error::operation_not_found(&call.operation_id))?;
        executor::execute(
            &self.client,
            metadata,
            &call.argv,
            &self.expanders,
            &self.interceptors,
            self.target.as_ref(),
            &self.config,
            context,
            mode,
        )
        .await
    }

    #[must_use]
    pub fn operation(&self, identity: &str) -> Option<&OperationMetadata> {
        self.operations.get(identity)
    }
}
