mod support;

use std::sync::Arc;

use async_trait::async_trait;
use galley_config::KitchenOptions;
use galley_graph::{CookStatus, Reference, UrlType};
use galley_kitchen::{
    ContentProcessor, CookError, FetchErrorCode, HookPhase, HookResult, KitchenContext,
    KitchenMode, MemoryRuntime, is_ignored_url,
};
use support::{file, kitchen, kitchen_with, url};

#[tokio::test]
async fn missing_file_reports_the_referencing_site() {
    let runtime = MemoryRuntime::new().with_file(
        file("index.html"),
        "<p>hello</p>\n<script src=\"./missing.js\"></script>\n",
    );
    let kitchen = kitchen(&runtime, KitchenMode::Build);
    let entry = kitchen.add_entry_point("./index.html").await.unwrap();
    let err = kitchen.cook_graph(&[entry.url]).await.unwrap_err();

    assert_eq!(err.code_str(), "FETCH_URL_CONTENT_ERROR");
    assert_eq!(err.fetch_code(), Some(FetchErrorCode::NotFound));
    let site = err.site().unwrap();
    assert_eq!(site.url, url("index.html"));
    assert_eq!((site.line, site.column), (2, 14));
    assert_eq!(
        kitchen.graph().url_info(&url("missing.js")).unwrap().status(),
        CookStatus::Errored
    );
}

#[tokio::test]
async fn unresolved_bare_specifier_names_the_specifier() {
    let runtime = MemoryRuntime::new().with_file(file("main.js"), "import _ from 'lodash';\n");
    let kitchen = kitchen(&runtime, KitchenMode::Build);
    let entry = kitchen.add_entry_point("./main.js").await.unwrap();
    let err = kitchen.cook(&entry.url).await.unwrap_err();

    assert_eq!(err.code_str(), "RESOLVE_URL_ERROR");
    let CookError::Resolve { specifier, .. } = &err else {
        panic!("expected a resolve error, got {err:?}");
    };
    assert_eq!(specifier, "lodash");
    let site = err.site().unwrap();
    assert_eq!((site.url.as_str(), site.line), (url("main.js").as_str(), 1));
}

fn ftp_project() -> MemoryRuntime {
    MemoryRuntime::new().with_file(
        file("b.css"),
        "body { background: url(ftp://example.com/bg.png); }\n",
    )
}

#[tokio::test]
async fn unsupported_protocol_fails_in_dev() {
    let runtime = ftp_project();
    let kitchen = kitchen(&runtime, KitchenMode::Dev);
    let entry = kitchen.add_entry_point("./b.css").await.unwrap();
    let err = kitchen.cook(&entry.url).await.unwrap_err();

    assert_eq!(err.code_str(), "PROTOCOL_NOT_SUPPORTED");
    assert!(matches!(err, CookError::ProtocolNotSupported { ref protocol, .. } if protocol == "ftp:"));
}

#[tokio::test]
async fn unsupported_protocol_is_ignored_in_build() {
    let runtime = ftp_project();
    let kitchen = kitchen(&runtime, KitchenMode::Build);
    let entry = kitchen.add_entry_point("./b.css").await.unwrap();
    kitchen.cook_graph(&[entry.url.clone()]).await.unwrap();

    let graph = kitchen.graph();
    let css = graph.url_info(&entry.url).unwrap();
    assert_eq!(css.text(), Some("body { background: url(ftp://example.com/bg.png); }\n"));
    let ignored = "ignore:ftp://example.com/bg.png";
    assert!(graph.contains(ignored));
    kitchen.cook(ignored).await.unwrap();
    let info = graph.url_info(ignored).unwrap();
    assert_eq!(info.status(), CookStatus::Cooked);
    assert!(info.content().is_none());
}

#[tokio::test]
async fn ignore_patterns_keep_a_node_without_fetching() {
    let runtime = MemoryRuntime::new()
        .with_file(file("main.js"), "import './vendor/big.js';\nimport './a.js';\n")
        .with_file(file("a.js"), "export {};\n");
    let options = KitchenOptions {
        ignore: vec![r"/vendor/".to_string()],
        ..KitchenOptions::default()
    };
    let kitchen = kitchen_with(&runtime, KitchenMode::Build, options, Vec::new());
    let entry = kitchen.add_entry_point("./main.js").await.unwrap();
    kitchen.cook_graph(&[entry.url.clone()]).await.unwrap();

    let dependencies = kitchen.graph().dependencies(&entry.url).unwrap();
    assert_eq!(dependencies.len(), 2);
    assert!(is_ignored_url(&dependencies[0]));
    assert_eq!(dependencies[1], url("a.js"));
    let main = kitchen.graph().url_info(&entry.url).unwrap();
    assert!(main.text().unwrap().contains("import './vendor/big.js';"));
}

#[tokio::test]
async fn fragments_outside_scripts_are_not_dependencies() {
    let runtime = MemoryRuntime::new().with_file(
        file("a.css"),
        ".x { mask: url(#shape); }\n",
    );
    let kitchen = kitchen(&runtime, KitchenMode::Build);
    let entry = kitchen.add_entry_point("./a.css").await.unwrap();
    kitchen.cook(&entry.url).await.unwrap();

    assert!(kitchen.graph().dependencies(&entry.url).unwrap().is_empty());
    assert_eq!(
        kitchen.graph().url_info(&entry.url).unwrap().text(),
        Some(".x { mask: url(#shape); }\n")
    );
}

/// Sends `old.js` to `new.js`.
struct Rename;

#[async_trait]
impl ContentProcessor for Rename {
    fn name(&self) -> &str {
        "rename"
    }

    fn phase(&self) -> HookPhase {
        HookPhase::Resolve
    }

    async fn redirect_reference(
        &self,
        reference: &Reference,
        _ctx: &KitchenContext,
    ) -> HookResult<Option<String>> {
        let target = reference.url().unwrap_or_default();
        Ok(target
            .strip_suffix("old.js")
            .map(|base| format!("{base}new.js")))
    }
}

#[tokio::test]
async fn redirects_create_a_new_reference() {
    let runtime = MemoryRuntime::new()
        .with_file(file("main.js"), "import './old.js';\n")
        .with_file(file("new.js"), "export {};\n");
    let kitchen = kitchen_with(
        &runtime,
        KitchenMode::Build,
        KitchenOptions::default(),
        vec![Arc::new(Rename)],
    );
    let entry = kitchen.add_entry_point("./main.js").await.unwrap();
    kitchen.cook_graph(&[entry.url.clone()]).await.unwrap();

    let graph = kitchen.graph();
    let main = graph.url_info(&entry.url).unwrap();
    assert_eq!(main.text(), Some("import './new.js';\n"));

    let references = graph.references_to_others(&entry.url).unwrap();
    assert_eq!(references.len(), 1);
    let redirected = &references[0];
    assert_eq!(redirected.url(), Some(url("new.js").as_str()));
    let original = graph.reference(redirected.original.unwrap()).unwrap();
    assert_eq!(original.url(), Some(url("old.js").as_str()));
    assert_eq!(original.next, Some(redirected.id));
    assert!(!graph.contains(&url("old.js")));
}

/// Redirects `a.js` urls to themselves with one more `x`.
struct Endless;

#[async_trait]
impl ContentProcessor for Endless {
    fn name(&self) -> &str {
        "endless"
    }

    async fn redirect_reference(
        &self,
        reference: &Reference,
        _ctx: &KitchenContext,
    ) -> HookResult<Option<String>> {
        Ok(reference
            .url()
            .filter(|url| url.contains("/a.js"))
            .map(|url| format!("{url}x")))
    }
}

#[tokio::test]
async fn redirect_chains_are_bounded() {
    let runtime = MemoryRuntime::new().with_file(file("main.js"), "import './a.js';\n");
    let options = KitchenOptions {
        max_redirects: 3,
        ..KitchenOptions::default()
    };
    let kitchen = kitchen_with(&runtime, KitchenMode::Build, options, vec![Arc::new(Endless)]);
    let entry = kitchen.add_entry_point("./main.js").await.unwrap();
    let err = kitchen.cook(&entry.url).await.unwrap_err();
    assert_eq!(err.code_str(), "RESOLVE_URL_ERROR");
    assert!(err.to_string().contains("more than 3 redirects"));
}

/// Resolves everything to a relative path.
struct Sloppy;

#[async_trait]
impl ContentProcessor for Sloppy {
    fn name(&self) -> &str {
        "sloppy"
    }

    fn phase(&self) -> HookPhase {
        HookPhase::Virtual
    }

    async fn resolve_reference(
        &self,
        _reference: &Reference,
        _ctx: &KitchenContext,
    ) -> HookResult<Option<String>> {
        Ok(Some("./relative.js".to_string()))
    }
}

#[tokio::test]
async fn relative_resolution_breaks_the_hook_contract() {
    let runtime = MemoryRuntime::new();
    let kitchen = kitchen_with(
        &runtime,
        KitchenMode::Build,
        KitchenOptions::default(),
        vec![Arc::new(Sloppy)],
    );
    let err = kitchen.add_entry_point("./main.js").await.unwrap_err();
    assert_eq!(err.code_str(), "HOOK_CONTRACT_ERROR");
}

#[tokio::test]
async fn packages_resolve_through_their_manifest() {
    let runtime = MemoryRuntime::new()
        .with_file(file("main.js"), "import { x } from 'pkg';\n")
        .with_file(
            file("node_modules/pkg/package.json"),
            r#"{ "name": "pkg", "main": "lib.js" }"#,
        )
        .with_file(file("node_modules/pkg/lib.js"), "export const x = 1;\n");
    let kitchen = kitchen(&runtime, KitchenMode::Dev);
    let entry = kitchen.add_entry_point("./main.js").await.unwrap();
    kitchen.cook_graph(&[entry.url.clone()]).await.unwrap();

    let graph = kitchen.graph();
    assert_eq!(
        graph.url_info(&entry.url).unwrap().text(),
        Some("import { x } from './node_modules/pkg/lib.js';\n")
    );
    let manifest = url("node_modules/pkg/package.json");
    assert_eq!(
        graph.urls_with_implicit_reference_to(&manifest).unwrap(),
        vec![entry.url.clone()]
    );
    assert!(!graph.is_used(&manifest).unwrap());

    let invalidated = kitchen.invalidate(&manifest).unwrap();
    assert!(invalidated.contains(&entry.url));
    assert_eq!(
        graph.url_info(&entry.url).unwrap().status(),
        CookStatus::Uncooked
    );
}

#[tokio::test]
async fn directories_need_a_reference_that_allows_them() {
    let runtime = MemoryRuntime::new()
        .with_file(file("assets/a.png"), "a")
        .with_file(file("assets/b.png"), "b")
        .with_file(file("icons/x.png"), "x")
        .with_file(file("a.css"), "body { background: url(./icons/); }\n");
    let kitchen = kitchen(&runtime, KitchenMode::Build);

    let listing = kitchen.add_entry_point("./assets/").await.unwrap();
    kitchen.cook(&listing.url).await.unwrap();
    let info = kitchen.graph().url_info(&listing.url).unwrap();
    assert_eq!(info.url_type, Some(UrlType::Directory));
    assert_eq!(info.text(), Some(r#"["a.png","b.png"]"#));

    let css = kitchen.add_entry_point("./a.css").await.unwrap();
    let err = kitchen.cook_graph(&[css.url]).await.unwrap_err();
    assert_eq!(
        err.fetch_code(),
        Some(FetchErrorCode::DirectoryReferenceNotAllowed)
    );
}
