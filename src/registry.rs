//! Explicit operation registry.
//!
//! Every executable operation is registered once, at server construction, under a
//! string key together with its duration estimator. Handlers and estimators are typed
//! on their own argument struct; the registry erases those types behind a JSON decode
//! step so the dispatcher can stay generic.
//!
//! Because [`OperationRegistry::register`] takes the handler and its estimator together,
//! an operation without an estimate cannot be registered at all.

use crate::command::{HandlerResult, OperationCall, MAX_ARGS_LEN};
use crate::driver::Execution;
use crate::error::DispatchError;
use futures::future::{self, BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Argument type for operations that take none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoArgs {}

type PrepareFn<D> =
    dyn Fn(serde_json::Value) -> Result<PreparedOperation<D>, serde_json::Error> + Send + Sync;

struct OperationEntry<D> {
    simulation_aware: bool,
    prepare: Box<PrepareFn<D>>,
}

/// An operation whose arguments decoded successfully, ready to estimate or run.
pub struct PreparedOperation<D> {
    name: &'static str,
    simulation_aware: bool,
    estimate: Box<dyn Fn() -> anyhow::Result<u64> + Send + Sync>,
    run: Box<dyn FnOnce(Execution<D>) -> BoxFuture<'static, HandlerResult> + Send>,
}

impl<D> fmt::Debug for PreparedOperation<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedOperation")
            .field("name", &self.name)
            .field("simulation_aware", &self.simulation_aware)
            .finish_non_exhaustive()
    }
}

impl<D> PreparedOperation<D> {
    /// Registered key.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the handler also runs (with [`Execution::Simulated`]) in simulated mode.
    pub fn is_simulation_aware(&self) -> bool {
        self.simulation_aware
    }

    /// Estimated execution time in seconds.
    pub fn estimate(&self) -> anyhow::Result<u64> {
        (self.estimate)()
    }

    /// Run the handler.
    pub fn run(self, execution: Execution<D>) -> BoxFuture<'static, HandlerResult> {
        (self.run)(execution)
    }
}

/// Map from operation key to `(handler, estimator)` for one driver type.
pub struct OperationRegistry<D> {
    operations: HashMap<&'static str, OperationEntry<D>>,
}

impl<D> Default for OperationRegistry<D> {
    fn default() -> Self {
        Self {
            operations: HashMap::new(),
        }
    }
}

impl<D> fmt::Debug for OperationRegistry<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("operations", &self.names())
            .finish()
    }
}

impl<D: Send + Sync + 'static> OperationRegistry<D> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hardware operation.
    ///
    /// In simulated mode the handler is never called; the dispatcher waits for the
    /// estimate instead.
    ///
    /// # Panics
    /// Panics if `name` is already registered.
    pub fn register<A, H, Fut, E>(
        &mut self,
        name: &'static str,
        handler: H,
        estimator: E,
    ) -> &mut Self
    where
        A: DeserializeOwned + Clone + Send + Sync + 'static,
        H: Fn(Arc<D>, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
        E: Fn(&A) -> anyhow::Result<u64> + Send + Sync + 'static,
    {
        self.insert(name, false, estimator, move |execution: Execution<D>, args: A| {
            match execution {
                Execution::Hardware(driver) => handler(driver, args).boxed(),
                Execution::Simulated => future::ready::<HandlerResult>(Err(anyhow::anyhow!(
                    "operation '{name}' requires connected hardware"
                )))
                .boxed(),
            }
        })
    }

    /// Register an operation whose handler also runs in simulated mode.
    ///
    /// The handler receives [`Execution::Simulated`] during dry runs and is expected to
    /// take a cheaper path that does not touch hardware.
    ///
    /// # Panics
    /// Panics if `name` is already registered.
    pub fn register_simulation_aware<A, H, Fut, E>(
        &mut self,
        name: &'static str,
        handler: H,
        estimator: E,
    ) -> &mut Self
    where
        A: DeserializeOwned + Clone + Send + Sync + 'static,
        H: Fn(Execution<D>, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
        E: Fn(&A) -> anyhow::Result<u64> + Send + Sync + 'static,
    {
        self.insert(name, true, estimator, move |execution: Execution<D>, args: A| {
            handler(execution, args).boxed()
        })
    }

    fn insert<A, R, E>(
        &mut self,
        name: &'static str,
        simulation_aware: bool,
        estimator: E,
        run: R,
    ) -> &mut Self
    where
        A: DeserializeOwned + Clone + Send + Sync + 'static,
        R: Fn(Execution<D>, A) -> BoxFuture<'static, HandlerResult> + Send + Sync + 'static,
        E: Fn(&A) -> anyhow::Result<u64> + Send + Sync + 'static,
    {
        if self.operations.contains_key(name) {
            panic!("Operation '{name}' is already registered");
        }

        let run = Arc::new(run);
        let estimator = Arc::new(estimator);
        let prepare =
            move |value: serde_json::Value| -> Result<PreparedOperation<D>, serde_json::Error> {
                let args: A = serde_json::from_value(value)?;
                let estimate_args = args.clone();
                let estimator = Arc::clone(&estimator);
                let run = Arc::clone(&run);
                Ok(PreparedOperation {
                    name,
                    simulation_aware,
                    estimate: Box::new(move || (*estimator)(&estimate_args)),
                    run: Box::new(move |execution| (*run)(execution, args)),
                })
            };

        self.operations.insert(
            name,
            OperationEntry {
                simulation_aware,
                prepare: Box::new(prepare),
            },
        );
        self
    }

    /// Resolve a call to its registered operation and decode its arguments.
    pub fn prepare(&self, call: &OperationCall) -> Result<PreparedOperation<D>, DispatchError> {
        let entry = self
            .operations
            .get(call.name.as_str())
            .ok_or_else(|| DispatchError::UnrecognizedCommand(call.name.clone()))?;

        if call.args.len() > MAX_ARGS_LEN {
            return Err(DispatchError::InvalidArguments(format!(
                "arguments too large: {} bytes (max {})",
                call.args.len(),
                MAX_ARGS_LEN
            )));
        }

        let value = call.args_value().map_err(|e| {
            DispatchError::InvalidArguments(format!("malformed arguments for '{}': {e}", call.name))
        })?;

        (entry.prepare)(value).map_err(|e| {
            DispatchError::InvalidArguments(format!("invalid arguments for '{}': {e}", call.name))
        })
    }
}

impl<D> OperationRegistry<D> {
    /// Whether an operation is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    /// Whether `name` is registered as simulation-aware.
    pub fn is_simulation_aware(&self, name: &str) -> bool {
        self.operations
            .get(name)
            .is_some_and(|entry| entry.simulation_aware)
    }

    /// Registered keys, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.operations.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Number of registered operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
