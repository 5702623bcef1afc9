//! Two-pass build orchestration.
//!
//! ```text
//!  raw pass ──▶ bundler (optional) ──▶ shape pass ──▶ versioning ──▶ BuildOutput
//!     │                                    │
//!     └ source content, relative specs     └ build paths, placeholders
//! ```
//!
//! The raw kitchen cooks sources as-is. The shape kitchen re-cooks the raw
//! content in a fresh graph whose specifiers point to build paths; versions
//! are only known once every node is shaped, so specifiers are placeholders
//! until [`Versioning`] resolves them.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::future::try_join_all;
use galley_config::{BuildOptions, ConfigError, GalleyConfig, KitchenOptions};
use galley_graph::url::path_to_file_url;
use galley_graph::{ReferenceKind, UrlGraph, UrlInfo};
use galley_kitchen::processors::default_processors;
use galley_kitchen::{
    CancellationToken, ContentProcessor, CookError, HookRegistry, Kitchen, KitchenMode, Runtime,
};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::build_urls::BuildUrls;
use crate::bundler::{Bundler, bundle_raw_graph};
use crate::entry_builds::{EntrySignals, entry_of};
use crate::error::{BuildError, Result};
use crate::output::BuildOutput;
use crate::placeholders::Placeholders;
use crate::shape::{ShapeState, shape_registry};
use crate::strategy::{TextInjector, VersionMappingInjector, VersioningStrategy};
use crate::versioning::Versioning;

/// A configured build. Consumed by [`run`](Self::run).
pub struct Build {
    root_url: String,
    entry_points: Vec<String>,
    options: BuildOptions,
    kitchen_options: KitchenOptions,
    runtime: Arc<dyn Runtime>,
    raw_processors: HookRegistry,
    scanners: HookRegistry,
    bundler: Option<Arc<dyn Bundler>>,
    injector: Arc<dyn VersionMappingInjector>,
    strategies: FxHashMap<ReferenceKind, VersioningStrategy>,
    cancellation: CancellationToken,
}

impl std::fmt::Debug for Build {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Build")
            .field("root_url", &self.root_url)
            .field("entry_points", &self.entry_points)
            .field("options", &self.options)
            .field("bundler", &self.bundler.as_ref().map(|b| b.name().to_string()))
            .finish()
    }
}

impl Build {
    /// Build of the project at `root_url` with the default raw processors.
    pub fn new(root_url: impl Into<String>, runtime: Arc<dyn Runtime>) -> Self {
        let mut root_url = root_url.into();
        if !root_url.ends_with('/') {
            root_url.push('/');
        }
        Self {
            root_url,
            entry_points: Vec::new(),
            options: BuildOptions::default(),
            kitchen_options: KitchenOptions::default(),
            runtime,
            raw_processors: default_processors(),
            scanners: HookRegistry::new(),
            bundler: None,
            injector: Arc::new(TextInjector),
            strategies: FxHashMap::default(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn from_config(config: &GalleyConfig, runtime: Arc<dyn Runtime>) -> Result<Self> {
        config.validate()?;
        let root = std::path::absolute(&config.root_directory).map_err(ConfigError::Io)?;
        let mut root_url = path_to_file_url(&root);
        if !root_url.ends_with('/') {
            root_url.push('/');
        }
        Ok(Self::new(root_url, runtime)
            .options(config.build.clone())
            .kitchen_options(config.kitchen.clone()))
    }

    /// Entry point, relative to the root.
    pub fn entry_point(mut self, specifier: impl Into<String>) -> Self {
        self.entry_points.push(specifier.into());
        self
    }

    pub fn options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    pub fn kitchen_options(mut self, options: KitchenOptions) -> Self {
        self.kitchen_options = options;
        self
    }

    /// Replace the processors of the raw pass (scanners excluded).
    pub fn raw_processors(mut self, registry: HookRegistry) -> Self {
        self.raw_processors = registry;
        self
    }

    /// Processor used by the raw pass only.
    pub fn raw_processor<P: ContentProcessor + 'static>(mut self, processor: P) -> Self {
        self.raw_processors.add(processor);
        self
    }

    /// Reference scanner, run in both passes.
    pub fn scanner<P: ContentProcessor + 'static>(mut self, scanner: P) -> Self {
        self.scanners.add(scanner);
        self
    }

    pub fn bundler(mut self, bundler: Arc<dyn Bundler>) -> Self {
        self.bundler = Some(bundler);
        self
    }

    pub fn injector(mut self, injector: Arc<dyn VersionMappingInjector>) -> Self {
        self.injector = injector;
        self
    }

    /// Override how references of `kind` observe versions.
    pub fn strategy(mut self, kind: ReferenceKind, strategy: VersioningStrategy) -> Self {
        self.strategies.insert(kind, strategy);
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Token aborting the build when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    fn kitchen(&self, graph: UrlGraph, registry: HookRegistry) -> Result<Kitchen> {
        Ok(Kitchen::builder(graph, self.runtime.clone())
            .mode(KitchenMode::Build)
            .options(self.kitchen_options.clone())
            .registry(registry)
            .cancellation(self.cancellation.clone())
            .build()?)
    }

    /// Run both passes and version the result. Nothing is written.
    pub async fn run(self) -> Result<BuildOutput> {
        if self.entry_points.is_empty() {
            return Err(BuildError::NoEntryPoints);
        }
        let started = Instant::now();
        tracing::info!(root = %self.root_url, entries = self.entry_points.len(), "build started");

        // Raw pass
        let mut raw_registry = self.raw_processors.clone();
        for processor in self.scanners.clone().into_ordered() {
            raw_registry.add_shared(processor);
        }
        let raw = self.kitchen(UrlGraph::new(self.root_url.clone()), raw_registry)?;
        let mut entry_urls: Vec<String> = Vec::with_capacity(self.entry_points.len());
        for specifier in &self.entry_points {
            let resolved = raw.add_entry_point(specifier).await?;
            if !entry_urls.contains(&resolved.url) {
                entry_urls.push(resolved.url);
            }
        }
        raw.cook_graph(&entry_urls).await?;
        tracing::debug!(nodes = raw.graph().len(), "raw pass cooked");

        let bundled_into = match &self.bundler {
            Some(bundler) => bundle_raw_graph(bundler.as_ref(), &raw).await?,
            None => FxHashMap::default(),
        };

        // Shape pass
        let build_directory = self.options.build_directory.to_string_lossy();
        let build_directory_url = format!(
            "{}{}/",
            self.root_url,
            build_directory.trim_matches('/')
        );
        let state = Arc::new(ShapeState {
            raw: raw.graph().clone(),
            options: self.options.clone(),
            build_urls: BuildUrls::new(self.options.clone(), self.root_url.clone()),
            placeholders: Placeholders::new(),
            bundled_into,
            entry_urls: entry_urls.iter().cloned().collect::<FxHashSet<_>>(),
            strategies: self.strategies.clone(),
            build_directory_url,
        });
        let shape = self.kitchen(
            UrlGraph::new(self.root_url.clone()),
            shape_registry(&state, self.scanners.clone()),
        )?;
        for url in &entry_urls {
            shape.add_entry_point(url).await?;
        }
        let signals = EntrySignals::new(&entry_urls);
        try_join_all(
            entry_urls
                .iter()
                .map(|url| build_entry(&shape, &signals, url)),
        )
        .await?;
        tracing::debug!(nodes = shape.graph().len(), "shape pass cooked");

        // Versioning
        let is_excluded =
            |info: &UrlInfo| raw.is_excluded_from_versioning(info) || shape.is_excluded_from_versioning(info);
        let output = Versioning::new(shape.graph(), &state, &is_excluded).run(self.injector.as_ref())?;

        tracing::info!(
            files = output.files.len(),
            bytes = output.total_bytes(),
            versioned = output.versions.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "build finished"
        );
        Ok(output)
    }

    /// [`run`](Self::run), then write the output below the build directory.
    pub async fn run_and_write(self) -> Result<(BuildOutput, Vec<PathBuf>)> {
        let runtime = self.runtime.clone();
        let token = self.cancellation.clone();
        let directory = self.output_directory()?;
        let output = self.run().await?;
        if token.is_cancelled() {
            return Err(CookError::Aborted.into());
        }
        let written = output.write_to(runtime.as_ref(), &directory).await?;
        Ok((output, written))
    }

    /// Build directory on disk; relative directories are below the root.
    pub fn output_directory(&self) -> Result<PathBuf> {
        let root = galley_graph::url::file_url_to_path(&self.root_url).ok_or_else(|| {
            ConfigError::InvalidValue {
                field: "root_directory".to_string(),
                hint: format!("`{}` is not a file url", self.root_url),
            }
        })?;
        Ok(join_build_directory(&root, &self.options.build_directory))
    }
}

fn join_build_directory(root: &Path, build_directory: &Path) -> PathBuf {
    if build_directory.is_absolute() {
        build_directory.to_path_buf()
    } else {
        root.join(build_directory)
    }
}

/// Shape one entry, then fill the entry build nodes below it.
///
/// An entry signals completion before waiting on others, so entries
/// referencing each other never wait in a cycle.
async fn build_entry(shape: &Kitchen, signals: &EntrySignals, entry_url: &str) -> Result<()> {
    shape.cook_graph(&[entry_url.to_string()]).await?;
    signals.complete(entry_url);

    let graph = shape.graph();
    let token = shape.context().cancellation().clone();
    for url in graph.strong_dependencies(entry_url)? {
        let Some(other) = entry_of(&url) else {
            continue;
        };
        tokio::select! {
            biased;
            _ = token.cancelled() => return Err(CookError::Aborted.into()),
            _ = signals.wait(other) => {}
        }
        let Some(content) = graph.url_info(other).and_then(|info| info.content().cloned()) else {
            continue;
        };
        graph.update_url_info(&url, |info| info.set_content(content))?;
    }
    Ok(())
}
