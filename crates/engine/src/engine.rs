//! The example engine: per-API resolvers plus the example cache, with an explicit lifecycle.

use crate::cache::{CacheEntry, ExampleCache, cache_key};
use crate::clock::{Clock, SystemClock};
use crate::composition::flatten_request_body;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::operation::{OperationDescriptor, ParamLocation, get_operation};
use crate::render::{
    BodyExample, ExampleField, GeneratedExample, RenderContext, RequestExample, render,
};
use crate::resolver::SchemaResolver;
use crate::response_shape::{ResponseShape, analyze};
use crate::schema::SchemaNode;
use crate::synth::{EXAMPLE_STRING, ExampleSynthesizer};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct ExampleEngine {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    cache: ExampleCache,
    resolvers: Mutex<HashMap<String, Arc<SchemaResolver>>>,
    shut_down: AtomicBool,
}

impl std::fmt::Debug for ExampleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExampleEngine")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

impl ExampleEngine {
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the configuration is invalid.
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the configuration is invalid.
    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let cache = ExampleCache::new(
            config.cache.capacity,
            config.cache.ttl()?,
            Arc::clone(&clock),
        );
        Ok(Self {
            config,
            clock,
            cache,
            resolvers: Mutex::new(HashMap::new()),
            shut_down: AtomicBool::new(false),
        })
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn cache(&self) -> &ExampleCache {
        &self.cache
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// The memoizing resolver for `api`. A different document instance replaces the resolver
    /// (and its memo) and drops the examples cached for `api`.
    #[must_use]
    pub fn resolver(&self, api: &str, document: &Arc<Value>) -> Arc<SchemaResolver> {
        let (resolver, replaced) = {
            let mut resolvers = self.resolvers.lock();
            if let Some(existing) = resolvers.get(api)
                && Arc::ptr_eq(existing.document(), document)
            {
                return Arc::clone(existing);
            }
            tracing::debug!(api, "creating schema resolver");
            let resolver = Arc::new(SchemaResolver::new(Arc::clone(document)));
            let replaced = resolvers
                .insert(api.to_string(), Arc::clone(&resolver))
                .is_some();
            (resolver, replaced)
        };
        if replaced {
            let examples = self.cache.invalidate_api(api);
            tracing::debug!(api, examples, "document changed; cached examples dropped");
        }
        resolver
    }

    /// Cached example for an already looked-up operation.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EngineShutDown`] after [`Self::shutdown`].
    pub fn build_example(
        &self,
        api: &str,
        document: &Arc<Value>,
        operation: &OperationDescriptor,
    ) -> Result<Arc<CacheEntry>> {
        self.ensure_open()?;
        let resolver = self.resolver(api, document);
        let key = cache_key(api, &operation.path, &operation.method);
        self.cache
            .get_or_build(&key, || Ok(self.generate_with_shape(api, &resolver, operation)))
    }

    /// Cached example for `method path`, looking the operation up on a miss.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EngineShutDown`] after [`Self::shutdown`], or the lookup error
    /// ([`EngineError::PathNotFound`] / [`EngineError::OperationNotFound`]).
    pub fn example_for(
        &self,
        api: &str,
        document: &Arc<Value>,
        path: &str,
        method: &str,
    ) -> Result<Arc<CacheEntry>> {
        self.ensure_open()?;
        let resolver = self.resolver(api, document);
        let key = cache_key(api, path, method);
        self.cache.get_or_build(&key, || {
            let operation = get_operation(&resolver, path, method)?;
            Ok(self.generate_with_shape(api, &resolver, &operation))
        })
    }

    /// Build an example without touching the cache.
    #[must_use]
    pub fn generate(
        &self,
        api: &str,
        resolver: &SchemaResolver,
        operation: &OperationDescriptor,
    ) -> GeneratedExample {
        self.generate_with_shape(api, resolver, operation).0
    }

    fn generate_with_shape(
        &self,
        api: &str,
        resolver: &SchemaResolver,
        operation: &OperationDescriptor,
    ) -> (GeneratedExample, Option<ResponseShape>) {
        tracing::debug!(api, method = %operation.method, path = %operation.path, "generating example");
        let synth = ExampleSynthesizer::new(resolver, self.clock.as_ref(), self.config.max_depth);
        let request = request_example(resolver, &synth, operation);
        let shape = analyze(resolver, operation);
        let example = render(
            RenderContext {
                api,
                client_module: &self.config.client_module,
            },
            operation,
            &request,
            shape.as_ref(),
        );
        (example, shape)
    }

    /// Synthesized example value for a schema node.
    #[must_use]
    pub fn example_value(&self, resolver: &SchemaResolver, node: &SchemaNode) -> Option<Value> {
        ExampleSynthesizer::new(resolver, self.clock.as_ref(), self.config.max_depth)
            .synthesize(node, None)
    }

    /// Drop every resolver and cached example (documents were reloaded).
    pub fn invalidate_all(&self) {
        let resolvers = {
            let mut map = self.resolvers.lock();
            let n = map.len();
            map.clear();
            n
        };
        let examples = self.cache.len();
        self.cache.clear();
        tracing::info!(resolvers, examples, "example engine caches invalidated");
    }

    /// Invalidate everything and refuse further builds.
    pub fn shutdown(&self) {
        self.invalidate_all();
        self.shut_down.store(true, Ordering::Release);
        tracing::info!("example engine shut down");
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_shut_down() {
            return Err(EngineError::EngineShutDown);
        }
        Ok(())
    }
}

fn request_example(
    resolver: &SchemaResolver,
    synth: &ExampleSynthesizer<'_>,
    operation: &OperationDescriptor,
) -> RequestExample {
    let mut request = RequestExample::default();

    for param in &operation.parameters {
        match param.location {
            ParamLocation::Header | ParamLocation::Cookie => {
                request
                    .side_params
                    .push((param.location, param.name.clone(), param.required));
                continue;
            }
            ParamLocation::Path | ParamLocation::Query => {}
        }

        let value = param.example.clone().or_else(|| {
            param
                .schema
                .as_ref()
                .and_then(|schema| synth.synthesize(schema, Some(&param.name)))
        });
        let value = match value {
            Some(v) => v,
            None if param.required => Value::String(EXAMPLE_STRING.to_string()),
            None => continue,
        };

        let field = ExampleField {
            name: param.name.clone(),
            value,
            required: param.required,
        };
        if param.location == ParamLocation::Path {
            request.path_params.push(field);
        } else {
            request.query_params.push(field);
        }
    }

    request.body = operation
        .request_body
        .as_ref()
        .and_then(|body| body.schema.as_ref())
        .and_then(|node| {
            let flattened = flatten_request_body(resolver, node);
            if flattened.properties.is_empty() {
                return synth.synthesize(node, None).map(BodyExample::Whole);
            }
            let fields = flattened
                .fields()
                .filter_map(|(name, prop, required)| {
                    synth.synthesize(prop, Some(name)).map(|value| ExampleField {
                        name: name.to_string(),
                        value,
                        required,
                    })
                })
                .collect();
            Some(BodyExample::Fields {
                fields,
                union_variants: flattened.union_variants,
            })
        });

    request
}
