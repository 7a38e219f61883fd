//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use ember_bind::host::{Builtins, Instance};
use ember_bind::{
    BinderConfig, CallSiteId, ClassTable, DispatchError, OperationDescriptor, Runtime, Value,
};

/// A class table plus a runtime bound to it.
pub struct World {
    pub table: Arc<ClassTable>,
    pub b: Builtins,
    pub runtime: Runtime,
}

impl World {
    pub fn new() -> Self {
        Self::with_config(BinderConfig::default())
    }

    pub fn with_config(config: BinderConfig) -> Self {
        init_tracing();
        let table = Arc::new(ClassTable::new());
        let b = *table.builtins();
        let runtime = Runtime::new(table.clone(), config);
        Self { table, b, runtime }
    }

    /// Call `name` at site `site`.
    pub fn call(&self, site: u64, name: &str, receiver: &Value, args: Vec<Value>) -> Result<Value, DispatchError> {
        let descriptor = OperationDescriptor::call(name, args.len());
        self.runtime.dispatch(CallSiteId::new(site), &descriptor, receiver, args)
    }

    pub fn instance(&self, class: ember_bind::TypeRef) -> Value {
        Instance::new(class).into_value()
    }

    /// Resolution count of a call site.
    pub fn resolutions(&self, site: u64) -> u64 {
        self.runtime
            .sites()
            .get(CallSiteId::new(site))
            .map_or(0, |s| s.stats().snapshot().resolutions)
    }
}

/// A method body returning a fixed tag, to tell overloads apart.
pub fn tag(name: &'static str) -> impl Fn(&Value, &[Value]) -> Result<Value, ember_bind::HostError> + Send + Sync {
    move |_, _| Ok(Value::str(name))
}

/// Install a test subscriber once; honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
