//! Reference resolution, redirection and formatting.

use galley_graph::url::{is_absolute_url, is_bare_specifier, protocol, url_without_hash, url_without_search};
use galley_graph::{Reference, ReferenceId, ReferenceParams, Trace, UrlType};

use super::Kitchen;
use crate::error::{CookError, ErrorSite, HookError, Result};

/// Protocol of urls kept in the graph but never fetched.
pub const IGNORE_PROTOCOL: &str = "ignore:";

pub fn is_ignored_url(url: &str) -> bool {
    url.starts_with(IGNORE_PROTOCOL)
}

/// Url of content embedded in `owner`, e.g. `file:///a.html@L3C5.js`.
pub fn inline_url(owner: &str, trace: Option<&Trace>, url_type: UrlType, id: ReferenceId) -> String {
    let base = url_without_search(url_without_hash(owner));
    match trace {
        Some(trace) => format!(
            "{base}@L{}C{}{}",
            trace.line,
            trace.column,
            url_type.extension()
        ),
        None => format!("{base}@{}{}", id.0, url_type.extension()),
    }
}

/// Outcome of [`Kitchen::resolve_reference`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedReference {
    /// Last reference of the redirect chain.
    pub id: ReferenceId,
    pub url: String,
    pub generated_specifier: String,
}

fn resolve_error(reference: &Reference, hook: &str, err: HookError) -> CookError {
    match err {
        HookError::Cook(err) => err,
        other => CookError::Resolve {
            specifier: reference.specifier.clone(),
            reason: format!("{hook}: {other}"),
            site: None,
        },
    }
}

impl Kitchen {
    /// Create a reference and run it through resolve, redirect and format.
    ///
    /// The target node exists afterwards and the reference is attached to
    /// both ends (abstract references stay detached).
    pub async fn resolve_reference(&self, params: ReferenceParams) -> Result<ResolvedReference> {
        let ctx = self.context();
        ctx.check_cancelled()?;
        let graph = self.graph();
        let id = graph.create_reference(params)?;
        let reference = self.reference(id)?;

        let id = self
            .resolve_chain(&reference)
            .await
            .map_err(|err| err.with_site(self.reference_site(id)))?;

        let url = graph.reuse_or_create_url_info(id)?;
        let generated_specifier = self.format_reference(id)?;
        graph.add_reference(id)?;
        tracing::trace!(
            owner = %reference.owner,
            specifier = %reference.specifier,
            url = %url,
            "reference resolved"
        );
        Ok(ResolvedReference {
            id,
            url,
            generated_specifier,
        })
    }

    /// Resolved url of `reference`, followed by redirects.
    async fn resolve_chain(&self, reference: &Reference) -> Result<ReferenceId> {
        let id = reference.id;
        let url = match &reference.inline {
            Some(inline) => inline_url(
                &reference.owner,
                reference.trace.as_ref(),
                inline.url_type,
                id,
            ),
            None => self.run_resolvers(reference).await?,
        };
        let url = self.apply_exclusions(url)?;
        let ignored = is_ignored_url(&url);
        self.graph().resolve_reference(id, url)?;
        if ignored {
            return Ok(id);
        }
        self.run_redirects(id).await
    }

    async fn run_resolvers(&self, reference: &Reference) -> Result<String> {
        let ctx = self.context();
        for processor in self.processors() {
            let resolved = self
                .cancellable(processor.resolve_reference(reference, ctx))
                .await?
                .map_err(|err| resolve_error(reference, processor.name(), err))?;
            let Some(url) = resolved else {
                continue;
            };
            if !is_absolute_url(&url) {
                return Err(CookError::HookContract {
                    hook: processor.name().to_string(),
                    operation: "resolve_reference",
                    reason: format!("`{url}` is not an absolute url"),
                });
            }
            tracing::trace!(hook = processor.name(), specifier = %reference.specifier, %url, "resolved");
            return Ok(url);
        }

        let reason = if is_bare_specifier(&reference.specifier) {
            "bare specifier not handled by any resolver"
        } else {
            "no resolver handled it"
        };
        Err(CookError::Resolve {
            specifier: reference.specifier.clone(),
            reason: reason.to_string(),
            site: None,
        })
    }

    /// Turn ignored urls into `ignore:` urls; reject unsupported protocols in dev.
    fn apply_exclusions(&self, url: String) -> Result<String> {
        let ctx = self.context();
        if is_ignored_url(&url) {
            return Ok(url);
        }
        if ctx.is_ignored(&url) {
            return Ok(format!("{IGNORE_PROTOCOL}{url}"));
        }
        let scheme = protocol(&url).unwrap_or_default();
        if ctx.options().supports_protocol(scheme) {
            return Ok(url);
        }
        if ctx.is_dev() {
            return Err(CookError::ProtocolNotSupported {
                protocol: scheme.to_string(),
                url,
                site: None,
            });
        }
        Ok(format!("{IGNORE_PROTOCOL}{url}"))
    }

    async fn run_redirects(&self, id: ReferenceId) -> Result<ReferenceId> {
        let ctx = self.context();
        let max_redirects = ctx.options().max_redirects;
        let mut current = id;
        let mut redirects = 0;

        'chain: loop {
            let reference = self.reference(current)?;
            let current_url = reference.url().unwrap_or_default().to_string();
            for processor in self.processors() {
                let redirected = self
                    .cancellable(processor.redirect_reference(&reference, ctx))
                    .await?
                    .map_err(|err| resolve_error(&reference, processor.name(), err))?;
                let Some(next_url) = redirected else {
                    continue;
                };
                if next_url == current_url {
                    continue;
                }
                if !is_absolute_url(&next_url) {
                    return Err(CookError::HookContract {
                        hook: processor.name().to_string(),
                        operation: "redirect_reference",
                        reason: format!("`{next_url}` is not an absolute url"),
                    });
                }
                redirects += 1;
                if redirects > max_redirects {
                    return Err(CookError::Resolve {
                        specifier: reference.specifier.clone(),
                        reason: format!("more than {max_redirects} redirects"),
                        site: None,
                    });
                }
                tracing::debug!(hook = processor.name(), from = %current_url, to = %next_url, "redirected");
                current = self.graph().redirect_reference(current, next_url)?;
                continue 'chain;
            }
            return Ok(current);
        }
    }

    /// Compute and store the generated specifier of `id`.
    ///
    /// Ignored urls keep their original specifier. Without a formatter the
    /// generated (or resolved) url is used.
    pub fn format_reference(&self, id: ReferenceId) -> Result<String> {
        let reference = self.reference(id)?;
        let url = reference
            .url()
            .ok_or_else(|| CookError::from(galley_graph::GraphError::UnresolvedReference(id)))?;

        let generated = if is_ignored_url(url) {
            reference.specifier.clone()
        } else {
            let mut formatted = None;
            for processor in self.processors() {
                let result = processor
                    .format_reference(&reference, self.context())
                    .map_err(|err| resolve_error(&reference, processor.name(), err))?;
                if let Some(specifier) = result {
                    if specifier.is_empty() {
                        return Err(CookError::HookContract {
                            hook: processor.name().to_string(),
                            operation: "format_reference",
                            reason: "empty specifier".to_string(),
                        });
                    }
                    formatted = Some(specifier);
                    break;
                }
            }
            formatted.unwrap_or_else(|| reference.effective_url().unwrap_or(url).to_string())
        };

        self.graph()
            .update_reference(id, |r| r.generated_specifier = Some(generated.clone()))?;
        Ok(generated)
    }

    /// Site of the first project reference leading to `id`.
    pub(crate) fn reference_site(&self, id: ReferenceId) -> Option<ErrorSite> {
        let reference = self.graph().first_project_reference(id).ok()?;
        reference.trace.as_ref().map(ErrorSite::from)
    }
}
