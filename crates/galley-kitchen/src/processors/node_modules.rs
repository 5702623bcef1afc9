//! Bare specifier resolution through `node_modules`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use galley_graph::url::{file_url_to_path, is_bare_specifier, path_to_file_url};
use galley_graph::{Reference, ReferenceKind, ReferenceParams};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::error::{CookError, HookError, HookResult};
use crate::hooks::{ContentProcessor, HookPhase};
use crate::kitchen::KitchenContext;
use crate::runtime::{Runtime, RuntimeError};

type Manifest = Option<Arc<Value>>;

/// Parsed `package.json` files, read at most once per path.
///
/// Concurrent readers of the same path share one read. Missing files are
/// cached as `None`; failed reads are not cached.
#[derive(Debug, Clone, Default)]
pub struct ManifestCache {
    entries: Arc<Mutex<FxHashMap<PathBuf, Arc<OnceCell<Manifest>>>>>,
}

impl ManifestCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn read(&self, runtime: &dyn Runtime, path: &Path) -> HookResult<Manifest> {
        let cell = self
            .entries
            .lock()
            .entry(path.to_path_buf())
            .or_default()
            .clone();
        let manifest = cell
            .get_or_try_init(|| async {
                match runtime.read_file(path).await {
                    Ok(bytes) => serde_json::from_slice::<Value>(&bytes)
                        .map(|value| Some(Arc::new(value)))
                        .map_err(|err| {
                            HookError::Other(
                                anyhow::Error::new(err)
                                    .context(format!("invalid {}", path.display())),
                            )
                        }),
                    Err(RuntimeError::FileNotFound(_)) => Ok(None),
                    Err(err) => Err(HookError::Other(anyhow::Error::new(err))),
                }
            })
            .await?;
        Ok(manifest.clone())
    }

    pub fn invalidate(&self, path: &Path) {
        self.entries.lock().remove(path);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `react` -> (`react`, None); `@scope/pkg/sub/x.js` -> (`@scope/pkg`, Some(`sub/x.js`)).
fn split_package_specifier(specifier: &str) -> (&str, Option<&str>) {
    let name_end = if specifier.starts_with('@') {
        specifier
            .match_indices('/')
            .nth(1)
            .map_or(specifier.len(), |(index, _)| index)
    } else {
        specifier.find('/').unwrap_or(specifier.len())
    };
    let subpath = specifier[name_end..].trim_start_matches('/');
    let subpath = (!subpath.is_empty()).then_some(subpath);
    (&specifier[..name_end], subpath)
}

/// Target of a conditional export value (`"./x.js"` or `{ "import": .., "default": .. }`).
fn export_target(value: &Value) -> Option<&str> {
    match value {
        Value::String(target) => Some(target),
        Value::Object(conditions) => ["import", "module", "browser", "default"]
            .iter()
            .find_map(|condition| conditions.get(*condition))
            .and_then(export_target),
        _ => None,
    }
}

/// Entry file of a package: `exports["."]`, `module`, `main`, then `index.js`.
fn package_entry(manifest: &Value) -> String {
    let from_exports = manifest.get("exports").and_then(|exports| match exports {
        Value::Object(map) if map.contains_key(".") => map.get(".").and_then(export_target),
        other => export_target(other),
    });
    from_exports
        .or_else(|| manifest.get("module").and_then(Value::as_str))
        .or_else(|| manifest.get("main").and_then(Value::as_str))
        .unwrap_or("index.js")
        .trim_start_matches("./")
        .to_string()
}

/// Resolves bare specifiers and `#` subpath imports of javascript references.
///
/// Each resolution records an implicit reference from the owner to the
/// `package.json` it used, so editing the manifest invalidates the owner.
#[derive(Debug, Clone, Default)]
pub struct NodeModulesResolver {
    cache: ManifestCache,
}

impl NodeModulesResolver {
    pub fn new(cache: ManifestCache) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &ManifestCache {
        &self.cache
    }

    async fn resolve_package(
        &self,
        specifier: &str,
        owner_dir: &Path,
        ctx: &KitchenContext,
    ) -> HookResult<Option<(PathBuf, PathBuf)>> {
        let (name, subpath) = split_package_specifier(specifier);
        for directory in owner_dir.ancestors() {
            let package_dir = directory.join("node_modules").join(name);
            let manifest_path = package_dir.join("package.json");
            let Some(manifest) = self.cache.read(ctx.runtime().as_ref(), &manifest_path).await?
            else {
                continue;
            };
            let target = match subpath {
                Some(subpath) => package_dir.join(subpath),
                None => package_dir.join(package_entry(&manifest)),
            };
            return Ok(Some((target, manifest_path)));
        }
        Ok(None)
    }

    async fn resolve_subpath_import(
        &self,
        specifier: &str,
        owner_dir: &Path,
        ctx: &KitchenContext,
    ) -> HookResult<Option<(PathBuf, PathBuf)>> {
        for directory in owner_dir.ancestors() {
            let manifest_path = directory.join("package.json");
            let Some(manifest) = self.cache.read(ctx.runtime().as_ref(), &manifest_path).await?
            else {
                continue;
            };
            let target = manifest
                .get("imports")
                .and_then(|imports| imports.get(specifier))
                .and_then(export_target)
                .map(|target| directory.join(target.trim_start_matches("./")));
            return Ok(target.map(|target| (target, manifest_path)));
        }
        Ok(None)
    }

    fn record_manifest(
        reference: &Reference,
        manifest_path: &Path,
        ctx: &KitchenContext,
    ) -> Result<(), CookError> {
        let graph = ctx.graph();
        let manifest_url = path_to_file_url(manifest_path);
        let params = ReferenceParams::new(
            reference.owner.clone(),
            ReferenceKind::PackageManifest,
            manifest_url.clone(),
        )
        .implicit(true);
        let id = graph.create_reference(params)?;
        graph.resolve_reference(id, manifest_url)?;
        graph.reuse_or_create_url_info(id)?;
        graph.add_reference(id)?;
        graph.add_implicit_reference(reference.id, id)?;
        Ok(())
    }
}

#[async_trait]
impl ContentProcessor for NodeModulesResolver {
    fn name(&self) -> &str {
        "node-modules-resolver"
    }

    fn phase(&self) -> HookPhase {
        HookPhase::Resolve
    }

    async fn resolve_reference(
        &self,
        reference: &Reference,
        ctx: &KitchenContext,
    ) -> HookResult<Option<String>> {
        let specifier = reference.specifier.as_str();
        let subpath_import = specifier.starts_with('#');
        if !reference.kind.is_js_context() || !(subpath_import || is_bare_specifier(specifier)) {
            return Ok(None);
        }
        let Some(owner_dir) = file_url_to_path(&reference.owner)
            .and_then(|path| path.parent().map(Path::to_path_buf))
        else {
            return Ok(None);
        };

        let resolved = if subpath_import {
            self.resolve_subpath_import(specifier, &owner_dir, ctx)
                .await?
        } else {
            self.resolve_package(specifier, &owner_dir, ctx).await?
        };
        let Some((target, manifest_path)) = resolved else {
            return Ok(None);
        };
        Self::record_manifest(reference, &manifest_path, ctx).map_err(HookError::Cook)?;
        Ok(Some(path_to_file_url(&target)))
    }

    fn invalidate(&self, url: &str) {
        if url.ends_with("/package.json") {
            if let Some(path) = file_url_to_path(url) {
                self.cache.invalidate(&path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn splits_scoped_and_plain_names() {
        assert_eq!(split_package_specifier("react"), ("react", None));
        assert_eq!(
            split_package_specifier("lodash/fp/map.js"),
            ("lodash", Some("fp/map.js"))
        );
        assert_eq!(split_package_specifier("@scope/pkg"), ("@scope/pkg", None));
        assert_eq!(
            split_package_specifier("@scope/pkg/sub"),
            ("@scope/pkg", Some("sub"))
        );
    }

    #[test]
    fn entry_prefers_exports_then_module_then_main() {
        assert_eq!(
            package_entry(&json!({"exports": {".": {"import": "./esm/index.js"}}, "main": "cjs.js"})),
            "esm/index.js"
        );
        assert_eq!(package_entry(&json!({"exports": "./x.js"})), "x.js");
        assert_eq!(
            package_entry(&json!({"module": "m.js", "main": "c.js"})),
            "m.js"
        );
        assert_eq!(package_entry(&json!({"main": "./lib/c.js"})), "lib/c.js");
        assert_eq!(package_entry(&json!({})), "index.js");
    }

    #[tokio::test]
    async fn cache_reads_each_path_once() {
        let runtime = crate::runtime::MemoryRuntime::new()
            .with_file("/p/node_modules/a/package.json", r#"{"main":"a.js"}"#);
        let cache = ManifestCache::new();
        let path = Path::new("/p/node_modules/a/package.json");
        let first = cache.read(&runtime, path).await.unwrap().unwrap();
        runtime.insert("/p/node_modules/a/package.json", r#"{"main":"b.js"}"#);
        let second = cache.read(&runtime, path).await.unwrap().unwrap();
        assert_eq!(first, second);

        cache.invalidate(path);
        let third = cache.read(&runtime, path).await.unwrap().unwrap();
        assert_eq!(third["main"], "b.js");
        assert!(cache.read(&runtime, Path::new("/nope/package.json")).await.unwrap().is_none());
    }
}
