//! Cook pipeline: fetch, transform, finalize.

use std::future::Future;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use galley_graph::{Content, CookStatus, UrlInfo, UrlType};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tracing::Instrument;

use super::dependencies::Dependencies;
use super::inflight::{self, Claim, CookOutcome};
use super::resolve::is_ignored_url;
use super::Kitchen;
use crate::error::{code_frame, CookError, ErrorSite, FetchErrorCode, HookError, Result};
use crate::hooks::{ContentProcessor, FetchedContent, TransformedContent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Fetch,
    Transform,
    Finalize,
}

fn stage_error(stage: Stage, hook: &str, url_info: &UrlInfo, err: HookError) -> CookError {
    let url = url_info.url.clone();
    let fetch_error = |code: FetchErrorCode, reason: String| CookError::Fetch {
        url: url_info.url.clone(),
        code,
        reason,
        site: None,
    };
    match err {
        HookError::Cook(err) => err,
        HookError::Parse {
            message,
            line,
            column,
        } => CookError::Parse {
            frame: url_info
                .text()
                .map(|text| code_frame(text, line, column))
                .unwrap_or_default(),
            url,
            line,
            column,
            message,
            site: None,
        },
        HookError::NotFound(reason) => fetch_error(FetchErrorCode::NotFound, reason),
        HookError::NotAllowed(reason) => fetch_error(FetchErrorCode::NotAllowed, reason),
        HookError::DirectoryReferenceNotAllowed(reason) => {
            fetch_error(FetchErrorCode::DirectoryReferenceNotAllowed, reason)
        }
        HookError::Other(err) => match stage {
            Stage::Fetch => fetch_error(FetchErrorCode::Failed, format!("{hook}: {err:#}")),
            Stage::Transform => CookError::Transform {
                url,
                hook: hook.to_string(),
                reason: format!("{err:#}"),
                site: None,
            },
            Stage::Finalize => CookError::Finalize {
                url,
                hook: hook.to_string(),
                reason: format!("{err:#}"),
                site: None,
            },
        },
    }
}

fn check_shape(
    processor: &dyn ContentProcessor,
    operation: &'static str,
    url_info: &UrlInfo,
    content: &Content,
    url_type: Option<UrlType>,
) -> Result<()> {
    let textual = url_type.or(url_info.url_type).is_some_and(UrlType::is_textual);
    if textual && matches!(content, Content::Binary(_)) {
        return Err(CookError::HookContract {
            hook: processor.name().to_string(),
            operation,
            reason: format!("binary content for textual url `{}`", url_info.url),
        });
    }
    Ok(())
}

fn apply_transformed(info: &mut UrlInfo, transformed: TransformedContent) {
    info.set_content(transformed.content);
    if transformed.sourcemap.is_some() {
        info.sourcemap = transformed.sourcemap;
    }
    if let Some(url_type) = transformed.url_type {
        info.url_type = Some(url_type);
        info.content_type = Some(
            transformed
                .content_type
                .unwrap_or_else(|| url_type.default_content_type().to_string()),
        );
    } else if transformed.content_type.is_some() {
        info.content_type = transformed.content_type;
    }
}

impl Kitchen {
    /// Run `future` unless the session is cancelled first.
    pub(crate) async fn cancellable<F: Future>(&self, future: F) -> Result<F::Output> {
        let token = self.context().cancellation();
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(CookError::Aborted),
            output = future => Ok(output),
        }
    }

    /// Cook `url` once; concurrent calls share the same pass.
    ///
    /// Returns immediately for cooked nodes. In dev a pass that started
    /// before the node was last modified never satisfies a caller.
    pub async fn cook(&self, url: &str) -> Result<()> {
        loop {
            self.context().check_cancelled()?;
            let (status, modified_at) = self
                .graph()
                .with_url_info(url, |info| (info.status(), info.modified_at))?;
            if status == CookStatus::Cooked {
                return Ok(());
            }

            match self.inner.in_flight.claim(url, modified_at) {
                Claim::Waiter {
                    receiver,
                    modified_at: started_at,
                } => {
                    let outcome = self.cancellable(inflight::wait(receiver)).await?;
                    match outcome {
                        Some(Ok(CookOutcome::Cooked)) => {
                            if self.context().is_dev() && self.modified_since(url, started_at)? {
                                continue;
                            }
                            return Ok(());
                        }
                        Some(Err(err)) => return Err(err),
                        Some(Ok(CookOutcome::Superseded)) | None => continue,
                    }
                }
                Claim::Owner(guard) => {
                    let result = self.cook_pass(url, modified_at).await;
                    guard.complete(result.clone());
                    match result? {
                        CookOutcome::Cooked => return Ok(()),
                        CookOutcome::Superseded => {
                            tracing::debug!(url, "cook superseded by a newer change");
                            continue;
                        }
                    }
                }
            }
        }
    }

    fn modified_since(&self, url: &str, started_at: u64) -> Result<bool> {
        Ok(self
            .graph()
            .with_url_info(url, |info| info.modified_at > started_at)?)
    }

    /// Cook `urls` and everything they strongly reference.
    ///
    /// Children fan out concurrently; a url is visited once per call so
    /// cycles terminate. The first error is returned and pending cooks are
    /// dropped.
    pub async fn cook_graph(&self, urls: &[String]) -> Result<()> {
        let visited = Mutex::new(FxHashSet::default());
        let mut pending: FuturesUnordered<_> = urls
            .iter()
            .map(|url| self.cook_tree(url.clone(), &visited))
            .collect();
        while let Some(result) = pending.next().await {
            result?;
        }
        Ok(())
    }

    fn cook_tree<'a>(
        &'a self,
        url: String,
        visited: &'a Mutex<FxHashSet<String>>,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            if !visited.lock().insert(url.clone()) {
                return Ok(());
            }
            if let Err(err) = self.cook(&url).await {
                if self.contains_error(&url, &err) {
                    return Ok(());
                }
                return Err(err);
            }

            let mut pending: FuturesUnordered<_> = self
                .children_to_cook(&url)?
                .into_iter()
                .map(|child| self.cook_tree(child, visited))
                .collect();
            while let Some(result) = pending.next().await {
                result?;
            }
            Ok(())
        }
        .boxed()
    }

    /// Urls strongly referenced by `url` that can be cooked.
    fn children_to_cook(&self, url: &str) -> Result<Vec<String>> {
        let mut children: Vec<String> = Vec::new();
        for reference in self.graph().references_to_others(url)? {
            if !reference.is_strong() || reference.kind.is_abstract() {
                continue;
            }
            let Some(target) = reference.url() else {
                continue;
            };
            if is_ignored_url(target) || children.iter().any(|c| c == target) {
                continue;
            }
            children.push(target.to_string());
        }
        Ok(children)
    }

    /// Log and swallow errors of inline content in dev.
    pub(crate) fn contains_error(&self, url: &str, err: &CookError) -> bool {
        let ctx = self.context();
        if !ctx.is_dev() || !ctx.options().contain_inline_errors || err.is_aborted() {
            return false;
        }
        let inline = self
            .graph()
            .with_url_info(url, |info| info.is_inline)
            .unwrap_or(false);
        if inline {
            tracing::warn!(url, code = err.code_str(), "{err}");
        }
        inline
    }

    async fn cook_pass(&self, url: &str, started_at: u64) -> Result<CookOutcome> {
        let span = tracing::debug_span!("cook", url);
        async {
            match self.run_stages(url, started_at).await {
                Ok(outcome) => Ok(outcome),
                Err(err) => {
                    let graph = self.graph();
                    let aborted = err.is_aborted();
                    let marked = graph.update_url_info(url, |info| {
                        if info.modified_at != started_at {
                            return Ok(());
                        }
                        if aborted {
                            info.reset();
                            Ok(())
                        } else {
                            info.set_status(CookStatus::Errored)
                        }
                    });
                    if let Err(graph_err) = marked.and_then(|status| status) {
                        tracing::debug!(error = %graph_err, "could not mark the node as failed");
                    }
                    if !aborted {
                        tracing::debug!(code = err.code_str(), "cook failed");
                    }
                    Err(err.with_site(self.node_site(url)))
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Apply `f` to the node unless it was modified after `started_at`.
    fn commit(
        &self,
        url: &str,
        started_at: u64,
        f: impl FnOnce(&mut UrlInfo) -> galley_graph::Result<()>,
    ) -> Result<bool> {
        let committed = self.graph().update_url_info(url, |info| {
            if info.modified_at != started_at {
                return Ok(false);
            }
            f(info).map(|()| true)
        })??;
        Ok(committed)
    }

    fn url_info(&self, url: &str) -> Result<UrlInfo> {
        self.graph()
            .url_info(url)
            .ok_or_else(|| CookError::from(galley_graph::GraphError::UnknownUrl(url.to_string())))
    }

    async fn run_stages(&self, url: &str, started_at: u64) -> Result<CookOutcome> {
        let started = self.commit(url, started_at, |info| {
            if info.status() != CookStatus::Uncooked {
                info.reset();
            }
            info.set_status(CookStatus::Fetching)
        })?;
        if !started {
            return Ok(CookOutcome::Superseded);
        }

        if is_ignored_url(url) {
            let done = self.commit(url, started_at, |info| {
                info.content_finalized = true;
                info.set_status(CookStatus::Cooked)
            })?;
            return Ok(if done {
                CookOutcome::Cooked
            } else {
                CookOutcome::Superseded
            });
        }

        tracing::trace!("fetch");
        let info = self.url_info(url)?;
        let fetched = self.fetch(&info).await?;
        let has_content = fetched.is_some();
        let fetched_ok = match fetched {
            Some(fetched) => self.commit(url, started_at, |info| {
                apply_fetched(info, fetched);
                info.set_status(CookStatus::Transforming)
            })?,
            None => {
                tracing::warn!(url, "no processor fetched content");
                self.commit(url, started_at, |info| {
                    info.set_status(CookStatus::Transforming)
                })?
            }
        };
        if !fetched_ok {
            return Ok(CookOutcome::Superseded);
        }

        if has_content {
            tracing::trace!("transform");
            let snapshot = self.graph().start_collecting(url)?;
            let dependencies = Dependencies::new(self.clone(), url);
            let transformed = self.transform(url, started_at, &dependencies).await;
            match transformed {
                Ok(true) => {
                    let outcome = self.graph().finish_collecting(snapshot)?;
                    if !outcome.pruned.is_empty() {
                        tracing::debug!(pruned = outcome.pruned.len(), "references pruned");
                    }
                }
                Ok(false) => {
                    self.graph().abort_collecting(snapshot)?;
                    return Ok(CookOutcome::Superseded);
                }
                Err(err) => {
                    self.graph().abort_collecting(snapshot)?;
                    return Err(err);
                }
            }
        }

        tracing::trace!("finalize");
        let mutations = self.take_late_mutations(url);
        let finalizing = self.commit(url, started_at, move |info| {
            info.set_status(CookStatus::Finalizing)?;
            for mutation in mutations {
                mutation(info);
            }
            Ok(())
        })?;
        if !finalizing {
            return Ok(CookOutcome::Superseded);
        }
        if has_content && !self.finalize(url, started_at).await? {
            return Ok(CookOutcome::Superseded);
        }

        let cooked = self.commit(url, started_at, |info| {
            info.content_finalized = true;
            info.set_status(CookStatus::Cooked)
        })?;
        Ok(if cooked {
            CookOutcome::Cooked
        } else {
            CookOutcome::Superseded
        })
    }

    /// First processor returning content wins.
    async fn fetch(&self, info: &UrlInfo) -> Result<Option<FetchedContent>> {
        let ctx = self.context();
        for processor in self.processors() {
            let fetched = self
                .cancellable(processor.fetch_url_content(info, ctx))
                .await?
                .map_err(|err| stage_error(Stage::Fetch, processor.name(), info, err))?;
            let Some(fetched) = fetched else {
                continue;
            };
            if fetched.content_type.as_deref().is_some_and(str::is_empty) {
                return Err(CookError::HookContract {
                    hook: processor.name().to_string(),
                    operation: "fetch_url_content",
                    reason: "empty content type".to_string(),
                });
            }
            check_shape(
                processor.as_ref(),
                "fetch_url_content",
                info,
                &fetched.content,
                fetched.url_type,
            )?;
            tracing::trace!(hook = processor.name(), bytes = fetched.content.len(), "fetched");
            return Ok(Some(fetched));
        }
        Ok(None)
    }

    /// Every processor may rewrite content. `Ok(false)` when superseded.
    async fn transform(
        &self,
        url: &str,
        started_at: u64,
        dependencies: &Dependencies,
    ) -> Result<bool> {
        let ctx = self.context();
        for processor in self.processors() {
            let info = self.url_info(url)?;
            let transformed = self
                .cancellable(processor.transform_url_content(&info, dependencies, ctx))
                .await?
                .map_err(|err| stage_error(Stage::Transform, processor.name(), &info, err))?;
            let Some(transformed) = transformed else {
                continue;
            };
            check_shape(
                processor.as_ref(),
                "transform_url_content",
                &info,
                &transformed.content,
                transformed.url_type,
            )?;
            tracing::trace!(hook = processor.name(), "transformed");
            let applied = self.commit(url, started_at, |info| {
                apply_transformed(info, transformed);
                Ok(())
            })?;
            if !applied {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn finalize(&self, url: &str, started_at: u64) -> Result<bool> {
        let ctx = self.context();
        for processor in self.processors() {
            let info = self.url_info(url)?;
            let finalized = self
                .cancellable(processor.finalize_url_content(&info, ctx))
                .await?
                .map_err(|err| stage_error(Stage::Finalize, processor.name(), &info, err))?;
            let Some(finalized) = finalized else {
                continue;
            };
            check_shape(
                processor.as_ref(),
                "finalize_url_content",
                &info,
                &finalized.content,
                finalized.url_type,
            )?;
            let applied = self.commit(url, started_at, |info| {
                apply_transformed(info, finalized);
                Ok(())
            })?;
            if !applied {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Site of the first project reference that brought `url` in.
    fn node_site(&self, url: &str) -> Option<ErrorSite> {
        let id = self
            .graph()
            .with_url_info(url, |info| info.first_reference)
            .ok()
            .flatten()?;
        self.reference_site(id)
    }
}

fn apply_fetched(info: &mut UrlInfo, fetched: FetchedContent) {
    let url_type = fetched
        .url_type
        .or(info.url_type)
        .or_else(|| {
            fetched
                .content_type
                .as_deref()
                .map(UrlType::from_content_type)
        })
        .unwrap_or_else(|| UrlType::from_url(&info.url));
    let content_type = fetched
        .content_type
        .or_else(|| info.content_type.clone())
        .unwrap_or_else(|| url_type.default_content_type().to_string());
    info.url_type = Some(url_type);
    info.content_type = Some(content_type);
    info.original_content = Some(fetched.content.clone());
    info.set_content(fetched.content);
    info.headers = fetched.headers;
}
