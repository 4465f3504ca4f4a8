//! `OpenAPI` `$ref` resolver.
//!
//! Only local refs (`#/...`) are supported: each loaded document is resolved in isolation, so
//! file and URL refs are reported as [`ResolveError::External`].
//!
//! Schema resolutions are memoized by the exact ref string for the lifetime of the resolver. A
//! resolver is bound to one loaded document; reloading the document means building a new
//! resolver (see [`crate::engine::ExampleEngine::invalidate_all`]).

use crate::error::ResolveError;
use crate::schema::{InlineSchema, ResolvedSchema, SchemaNode};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug)]
pub struct SchemaResolver {
    document: Arc<Value>,
    memo: Mutex<HashMap<String, Arc<ResolvedSchema>>>,
}

impl SchemaResolver {
    #[must_use]
    pub fn new(document: Arc<Value>) -> Self {
        Self {
            document,
            memo: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn document(&self) -> &Arc<Value> {
        &self.document
    }

    /// Resolve a schema `$ref`, following ref-to-ref chains.
    ///
    /// # Errors
    ///
    /// Returns an error if the ref is not local, a pointer segment is missing, or the ref chain
    /// loops back on itself.
    pub fn resolve(&self, reference: &str) -> Result<Arc<ResolvedSchema>, ResolveError> {
        // Held across the walk so check-then-insert is atomic.
        let mut memo = self.memo.lock();
        if let Some(hit) = memo.get(reference) {
            return Ok(Arc::clone(hit));
        }

        let mut seen: HashSet<&str> = HashSet::new();
        let mut current = reference;

        loop {
            if !seen.insert(current) {
                return Err(ResolveError::Cyclic(reference.to_string()));
            }

            let value = self.resolve_value(current)?;
            if let Some(next) = value.get("$ref").and_then(Value::as_str) {
                current = next;
                continue;
            }

            let resolved = Arc::new(ResolvedSchema(InlineSchema::from_value(value)));
            memo.insert(reference.to_string(), Arc::clone(&resolved));
            return Ok(resolved);
        }
    }

    /// Resolve a node to an inline schema: inline nodes are cloned, refs go through
    /// [`Self::resolve`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::resolve`].
    pub fn resolve_node(&self, node: &SchemaNode) -> Result<Arc<ResolvedSchema>, ResolveError> {
        match node {
            SchemaNode::Reference(r) => self.resolve(r),
            SchemaNode::Inline(schema) => Ok(Arc::new(ResolvedSchema((**schema).clone()))),
        }
    }

    /// Walk a local ref to the raw JSON value it points at. Not memoized.
    ///
    /// Used for non-schema components (`#/components/parameters/...`,
    /// `#/components/requestBodies/...`, `#/components/responses/...`).
    ///
    /// # Errors
    ///
    /// Returns an error if the ref is not of the form `#/...` or any segment is missing.
    pub fn resolve_value(&self, reference: &str) -> Result<&Value, ResolveError> {
        let Some(pointer) = reference.strip_prefix("#/") else {
            return Err(ResolveError::External(reference.to_string()));
        };

        let mut cur: &Value = &self.document;
        for raw in pointer.split('/') {
            let segment = raw.replace("~1", "/").replace("~0", "~");
            let next = match cur {
                Value::Object(map) => map.get(&segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            cur = next.ok_or_else(|| ResolveError::Missing {
                reference: reference.to_string(),
                segment: segment.clone(),
            })?;
        }
        Ok(cur)
    }

    /// Follow a raw value through `$ref`s until it is no longer a reference object.
    ///
    /// # Errors
    ///
    /// Returns an error if a ref cannot be walked or the chain is cyclic.
    pub fn deref_value<'a>(&'a self, value: &'a Value) -> Result<&'a Value, ResolveError> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut cur = value;
        while let Some(reference) = cur.get("$ref").and_then(Value::as_str) {
            if !seen.insert(reference) {
                return Err(ResolveError::Cyclic(reference.to_string()));
            }
            cur = self.resolve_value(reference)?;
        }
        Ok(cur)
    }

    #[must_use]
    pub fn memo_len(&self) -> usize {
        self.memo.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaType;
    use serde_json::json;

    fn resolver(doc: Value) -> SchemaResolver {
        SchemaResolver::new(Arc::new(doc))
    }

    #[test]
    fn resolves_component_schema() {
        let r = resolver(json!({
            "components": {"schemas": {"User": {
                "type": "object",
                "properties": {"id": {"type": "string", "format": "uuid"}}
            }}}
        }));
        let user = r.resolve("#/components/schemas/User").unwrap();
        assert_eq!(user.schema_type, Some(SchemaType::Object));
        assert!(user.properties.contains_key("id"));
    }

    #[test]
    fn memoizes_by_ref_string() {
        let r = resolver(json!({"components": {"schemas": {"A": {"type": "string"}}}}));
        let first = r.resolve("#/components/schemas/A").unwrap();
        let second = r.resolve("#/components/schemas/A").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(r.memo_len(), 1);
    }

    #[test]
    fn follows_ref_chains_and_detects_cycles() {
        let r = resolver(json!({"components": {"schemas": {
            "Alias": {"$ref": "#/components/schemas/Target"},
            "Target": {"type": "integer"},
            "Loop1": {"$ref": "#/components/schemas/Loop2"},
            "Loop2": {"$ref": "#/components/schemas/Loop1"}
        }}}));
        let alias = r.resolve("#/components/schemas/Alias").unwrap();
        assert_eq!(alias.schema_type, Some(SchemaType::Integer));

        let err = r.resolve("#/components/schemas/Loop1").unwrap_err();
        assert!(matches!(err, ResolveError::Cyclic(_)));
        assert_eq!(r.memo_len(), 1);
    }

    #[test]
    fn external_and_missing_refs_are_not_found() {
        let r = resolver(json!({"components": {"schemas": {}}}));
        assert!(matches!(
            r.resolve("common.yaml#/components/schemas/A"),
            Err(ResolveError::External(_))
        ));
        assert!(matches!(
            r.resolve("https://example.com/spec.json#/A"),
            Err(ResolveError::External(_))
        ));
        assert!(matches!(r.resolve("#"), Err(ResolveError::External(_))));

        let err = r.resolve("#/components/schemas/Nope").unwrap_err();
        assert_eq!(
            err,
            ResolveError::Missing {
                reference: "#/components/schemas/Nope".to_string(),
                segment: "Nope".to_string()
            }
        );
    }

    #[test]
    fn decodes_pointer_escapes_and_array_indices() {
        let r = resolver(json!({
            "paths": {"/users/{id}": {"get": {"parameters": [{"name": "id"}]}}}
        }));
        let v = r
            .resolve_value("#/paths/~1users~1{id}/get/parameters/0/name")
            .unwrap();
        assert_eq!(v, &json!("id"));
    }

    #[test]
    fn scalar_intermediate_is_missing() {
        let r = resolver(json!({"info": {"title": "t"}}));
        assert!(matches!(
            r.resolve_value("#/info/title/deeper"),
            Err(ResolveError::Missing { .. })
        ));
    }
}
