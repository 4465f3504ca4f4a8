//! Loaded `OpenAPI` documents, keyed by API name.

use crate::error::{Result, ServerError};
use apiscope_engine::{OperationSummary, list_operations};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const SPEC_EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

/// One loaded API.
#[derive(Debug)]
pub struct ApiSpec {
    pub name: String,
    pub source: PathBuf,
    pub document: Arc<Value>,
    pub title: Option<String>,
    pub version: Option<String>,
    pub operations: Vec<OperationSummary>,
}

impl ApiSpec {
    #[must_use]
    pub fn new(name: String, source: PathBuf, document: Value) -> Self {
        let info = document.get("info");
        let info_str = |key: &str| {
            info.and_then(|i| i.get(key))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let title = info_str("title");
        let version = info_str("version");
        let operations = list_operations(&document);
        Self {
            name,
            source,
            document: Arc::new(document),
            title,
            version,
            operations,
        }
    }
}

/// Where specs come from.
#[async_trait]
pub trait SpecSource: Send + Sync {
    /// Load every available spec. Individual unreadable specs are skipped; only a source-level
    /// failure is an error.
    async fn load(&self) -> Result<Vec<ApiSpec>>;

    fn describe(&self) -> String;
}

/// `*.json` / `*.yaml` / `*.yml` files in one directory; the API name is the file stem.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl SpecSource for DirectorySource {
    async fn load(&self) -> Result<Vec<ApiSpec>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(|e| {
            ServerError::Config(format!(
                "failed to read specs directory '{}': {e}",
                self.dir.display()
            ))
        })?;

        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if is_spec_file(&path) && entry.file_type().await.is_ok_and(|t| t.is_file()) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut specs: Vec<ApiSpec> = Vec::new();
        for path in paths {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            if specs.iter().any(|s| s.name == name) {
                tracing::warn!(api = %name, path = %path.display(), "duplicate API name; file skipped");
                continue;
            }
            match load_spec_file(&path).await {
                Ok(document) => {
                    tracing::info!(api = %name, path = %path.display(), "loaded OpenAPI spec");
                    specs.push(ApiSpec::new(name, path, document));
                }
                Err(e) => {
                    tracing::warn!(api = %name, error = %e, "skipping unreadable spec");
                }
            }
        }
        Ok(specs)
    }

    fn describe(&self) -> String {
        format!("directory {}", self.dir.display())
    }
}

fn is_spec_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SPEC_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

async fn load_spec_file(path: &Path) -> Result<Value> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ServerError::SpecRead {
            path: path.display().to_string(),
            source: e,
        })?;
    parse_document(&path.display().to_string(), &content)
}

/// Parse a JSON or YAML document into a JSON value (YAML keys are stringified).
///
/// # Errors
///
/// Returns [`ServerError::SpecParse`] if the content is neither JSON nor YAML, or its top level
/// is not a mapping.
pub fn parse_document(location: &str, content: &str) -> Result<Value> {
    let value = match serde_json::from_str::<Value>(content) {
        Ok(v) => v,
        Err(_) => {
            let yaml: serde_yaml::Value =
                serde_yaml::from_str(content).map_err(|e| ServerError::SpecParse {
                    path: location.to_string(),
                    message: e.to_string(),
                })?;
            yaml_to_json(yaml)
        }
    };
    if !value.is_object() {
        return Err(ServerError::SpecParse {
            path: location.to_string(),
            message: "top-level value is not a mapping".to_string(),
        });
    }
    Ok(value)
}

/// YAML allows non-string keys (`200:` in `responses`); JSON does not.
fn yaml_to_json(value: serde_yaml::Value) -> Value {
    use serde_yaml::Value as Y;
    match value {
        Y::Null => Value::Null,
        Y::Bool(b) => Value::Bool(b),
        Y::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(Number::from_f64)
                    .map_or(Value::Null, Value::Number)
            }
        }
        Y::String(s) => Value::String(s),
        Y::Sequence(items) => Value::Array(items.into_iter().map(yaml_to_json).collect()),
        Y::Mapping(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                out.insert(yaml_key(k), yaml_to_json(v));
            }
            Value::Object(out)
        }
        Y::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        other => match yaml_to_json(other) {
            Value::String(s) => s,
            v => v.to_string(),
        },
    }
}

/// Current set of loaded APIs. Reload swaps the whole set.
pub struct SpecRegistry {
    source: Box<dyn SpecSource>,
    apis: RwLock<Arc<BTreeMap<String, Arc<ApiSpec>>>>,
}

impl SpecRegistry {
    #[must_use]
    pub fn new(source: Box<dyn SpecSource>) -> Self {
        Self {
            source,
            apis: RwLock::new(Arc::new(BTreeMap::new())),
        }
    }

    /// Reload from the source, replacing the current set.
    ///
    /// # Errors
    ///
    /// Returns an error if the source itself cannot be read; the previous set is kept.
    pub async fn reload(&self) -> Result<usize> {
        let specs = self.source.load().await?;
        let map: BTreeMap<String, Arc<ApiSpec>> = specs
            .into_iter()
            .map(|s| (s.name.clone(), Arc::new(s)))
            .collect();
        let count = map.len();
        *self.apis.write() = Arc::new(map);
        tracing::info!(source = %self.source.describe(), apis = count, "specs loaded");
        Ok(count)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<ApiSpec>> {
        self.apis.read().get(name).cloned()
    }

    /// # Errors
    ///
    /// Returns [`ServerError::UnknownApi`] if `name` is not loaded.
    pub fn require(&self, name: &str) -> Result<Arc<ApiSpec>> {
        self.get(name)
            .ok_or_else(|| ServerError::UnknownApi(name.to_string()))
    }

    /// All APIs, ordered by name.
    #[must_use]
    pub fn list(&self) -> Vec<Arc<ApiSpec>> {
        self.apis.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML_SPEC: &str = r"
openapi: 3.0.0
info:
  title: Pets
  version: 1.2.3
paths:
  /pets:
    get:
      operationId: listPets
      responses:
        200:
          description: ok
";

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[tokio::test]
    async fn loads_json_and_yaml_and_skips_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "pets.yaml", YAML_SPEC);
        write(
            dir.path(),
            "store.json",
            r#"{"openapi":"3.0.0","info":{"title":"Store"},"paths":{}}"#,
        );
        write(dir.path(), "broken.yml", "paths: [unclosed");
        write(dir.path(), "notes.txt", "not a spec");
        write(dir.path(), "pets.json", r#"{"paths":{}}"#);

        let registry = SpecRegistry::new(Box::new(DirectorySource::new(dir.path())));
        assert_eq!(registry.reload().await.unwrap(), 2);

        let names: Vec<_> = registry.list().iter().map(|s| s.name.clone()).collect();
        assert_eq!(names, ["pets", "store"]);

        // `pets.json` sorts first, so it wins the name.
        let pets = registry.require("pets").unwrap();
        assert!(pets.source.ends_with("pets.json"));
        assert!(matches!(
            registry.require("broken"),
            Err(ServerError::UnknownApi(_))
        ));
    }

    #[tokio::test]
    async fn reload_replaces_the_set() {
        let dir = tempfile::tempdir().unwrap();
        let registry = SpecRegistry::new(Box::new(DirectorySource::new(dir.path())));
        assert_eq!(registry.reload().await.unwrap(), 0);

        write(dir.path(), "pets.yaml", YAML_SPEC);
        assert_eq!(registry.reload().await.unwrap(), 1);
        let pets = registry.get("pets").unwrap();
        assert_eq!(pets.title.as_deref(), Some("Pets"));
        assert_eq!(pets.version.as_deref(), Some("1.2.3"));
        assert_eq!(pets.operations.len(), 1);
    }

    #[tokio::test]
    async fn missing_directory_keeps_previous_set() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "pets.yaml", YAML_SPEC);
        let registry = SpecRegistry::new(Box::new(DirectorySource::new(dir.path())));
        registry.reload().await.unwrap();

        std::fs::remove_file(dir.path().join("pets.yaml")).unwrap();
        std::fs::remove_dir(dir.path()).unwrap();
        assert!(matches!(
            registry.reload().await,
            Err(ServerError::Config(_))
        ));
        assert!(registry.get("pets").is_some());
    }

    #[test]
    fn yaml_integer_keys_become_strings() {
        let doc = parse_document("pets.yaml", YAML_SPEC).unwrap();
        let responses = doc.pointer("/paths/~1pets/get/responses").unwrap();
        assert!(responses.get("200").is_some());
        assert_eq!(doc["info"]["version"], Value::from("1.2.3"));
    }

    #[test]
    fn scalar_document_is_rejected() {
        assert!(matches!(
            parse_document("x.yaml", "just a string"),
            Err(ServerError::SpecParse { .. })
        ));
    }
}
