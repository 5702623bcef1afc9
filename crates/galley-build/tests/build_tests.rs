mod support;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use galley_build::{Build, BundledContent, Bundler, VersioningStrategy};
use galley_config::{BuildOptions, GalleyConfig, VersioningMethod};
use galley_graph::{ReferenceKind, UrlInfo, UrlType};
use galley_kitchen::processors::PatternScanner;
use galley_kitchen::{HookResult, KitchenContext, MemoryRuntime, NativeRuntime};
use support::{build, file, site, text, versioned};

fn util_project() -> MemoryRuntime {
    MemoryRuntime::new()
        .with_file(
            file("main.js"),
            "import { x } from './util.js?v=1';\nconsole.log(x);\n",
        )
        .with_file(file("util.js"), "export const x = 1;\n")
}

#[tokio::test]
async fn specifiers_point_to_manifest_paths() {
    let runtime = util_project();
    let output = build(&runtime).entry_point("./main.js").run().await.unwrap();

    let util = versioned(&output, "js/util.js");
    assert!(util.starts_with("js/util-") && util.ends_with(".js"), "{util}");
    assert_eq!(util.len(), "js/util-.js".len() + 8);
    assert!(output.file(util).is_some());
    assert!(text(&output, "main.js").contains(&format!("from '/{util}'")));

    let main = output.file("main.js").unwrap();
    assert!(main.is_entry_point);
    assert!(!output.versions.contains_key("main.js"));
}

#[tokio::test]
async fn versions_follow_content() {
    let runtime = util_project();
    let first = build(&runtime).entry_point("./main.js").run().await.unwrap();
    let util = versioned(&first, "js/util.js").to_string();

    runtime.insert(
        file("main.js"),
        "import { x } from './util.js?v=1';\nconsole.log(x + 1);\n",
    );
    let entry_changed = build(&runtime).entry_point("./main.js").run().await.unwrap();
    assert_eq!(versioned(&entry_changed, "js/util.js"), util);

    runtime.insert(file("util.js"), "export const x = 2;\n");
    let util_changed = build(&runtime).entry_point("./main.js").run().await.unwrap();
    assert_ne!(versioned(&util_changed, "js/util.js"), util);
}

#[tokio::test]
async fn builds_are_deterministic() {
    let runtime = site();
    let first = build(&runtime).entry_point("./index.html").run().await.unwrap();
    let second = build(&runtime).entry_point("./index.html").run().await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn static_references_carry_dependency_versions() {
    let runtime = site();
    let first = build(&runtime).entry_point("./index.html").run().await.unwrap();

    let css = versioned(&first, "css/b.css");
    let png = versioned(&first, "other/c.png");
    let main = versioned(&first, "js/main.js");
    let html = text(&first, "index.html");
    assert!(html.contains(&format!("href=\"/{css}\"")), "{html}");
    assert!(html.contains(&format!("src=\"/{main}\"")), "{html}");
    assert!(text(&first, css).contains(&format!("url(/{png})")));
    assert!(first.file(png).unwrap().content.as_text().is_none());
    assert!(!first.versions.contains_key("index.html"));

    runtime.insert(file("c.png"), vec![0x89, b'P', b'N', b'G', 0x00]);
    let second = build(&runtime).entry_point("./index.html").run().await.unwrap();
    assert_ne!(versioned(&second, "other/c.png"), png);
    assert_ne!(versioned(&second, "css/b.css"), css);
    assert_eq!(versioned(&second, "js/main.js"), main);
    assert_eq!(
        versioned(&second, "js/util.js"),
        versioned(&first, "js/util.js")
    );
}

#[tokio::test]
async fn search_param_versions_are_written_without_search() {
    let runtime = util_project();
    let options = BuildOptions {
        versioning_method: VersioningMethod::SearchParam,
        ..BuildOptions::default()
    };
    let (output, written) = build(&runtime)
        .entry_point("./main.js")
        .options(options)
        .run_and_write()
        .await
        .unwrap();

    let util = versioned(&output, "js/util.js");
    assert!(util.starts_with("js/util.js?v="), "{util}");
    assert!(text(&output, "main.js").contains(&format!("from '/{util}'")));

    assert!(written.contains(&PathBuf::from("/project/dist/js/util.js")));
    assert_eq!(
        runtime.contents(Path::new("/project/dist/js/util.js")),
        Some(b"export const x = 1;\n".to_vec())
    );
    let manifest = runtime
        .contents(Path::new("/project/dist/build_manifest.json"))
        .unwrap();
    assert!(String::from_utf8_lossy(&manifest).contains(util));
}

#[tokio::test]
async fn without_versioning_paths_stay_plain() {
    let runtime = util_project();
    let options = BuildOptions {
        versioning: false,
        ..BuildOptions::default()
    };
    let output = build(&runtime)
        .entry_point("./main.js")
        .options(options)
        .run()
        .await
        .unwrap();

    assert!(output.versions.is_empty());
    assert!(output.file("js/util.js").is_some());
    assert!(text(&output, "main.js").contains("from '/js/util.js'"));
}

#[tokio::test]
async fn dynamic_imports_use_the_global_lookup() {
    let runtime = MemoryRuntime::new()
        .with_file(file("main.js"), "import('./lazy.js').then((m) => m.run());\n")
        .with_file(file("lazy.js"), "export const run = () => 1;\n");
    let output = build(&runtime).entry_point("./main.js").run().await.unwrap();

    let lazy = versioned(&output, "js/lazy.js");
    let main = text(&output, "main.js");
    assert!(main.starts_with("globalThis.__galley_versions__"), "{main}");
    assert!(main.contains(&format!("\"/js/lazy.js\":\"/{lazy}\"")), "{main}");
    assert!(main.contains("import(__v__(\"/js/lazy.js\"))"), "{main}");
}

#[tokio::test]
async fn import_map_strategy_keeps_importers_stable() {
    let runtime = site();
    let first = build(&runtime)
        .entry_point("./index.html")
        .strategy(ReferenceKind::JsImport, VersioningStrategy::ImportMap)
        .run()
        .await
        .unwrap();

    let util = versioned(&first, "js/util.js").to_string();
    let main = versioned(&first, "js/main.js").to_string();
    assert!(text(&first, &main).contains("from '/js/util.js'"));
    let html = text(&first, "index.html");
    assert!(
        html.starts_with(&format!(
            "<html><head>\n<script type=\"importmap\">{{\"imports\":{{\"/js/util.js\":\"/{util}\"}}}}</script>"
        )),
        "{html}"
    );

    runtime.insert(file("util.js"), "export const x = 2;\n");
    let second = build(&runtime)
        .entry_point("./index.html")
        .strategy(ReferenceKind::JsImport, VersioningStrategy::ImportMap)
        .run()
        .await
        .unwrap();
    assert_ne!(versioned(&second, "js/util.js"), util);
    assert_eq!(versioned(&second, "js/main.js"), main);
}

struct ConcatBundler;

#[async_trait]
impl Bundler for ConcatBundler {
    fn name(&self) -> &str {
        "concat"
    }

    fn url_type(&self) -> UrlType {
        UrlType::JsModule
    }

    async fn bundle(
        &self,
        nodes: &[UrlInfo],
        _ctx: &KitchenContext,
    ) -> HookResult<BTreeMap<String, BundledContent>> {
        let content: String = nodes.iter().filter_map(|node| node.text()).collect();
        let sources = nodes.iter().map(|node| node.url.clone()).collect();
        Ok(BTreeMap::from([(
            nodes[0].url.clone(),
            BundledContent::new(content, sources),
        )]))
    }
}

#[tokio::test]
async fn absorbed_sources_point_to_their_bundle() {
    let runtime = MemoryRuntime::new()
        .with_file(
            file("index.html"),
            "<script src=\"./a.js\"></script><script src=\"./b.js\"></script>\n",
        )
        .with_file(file("a.js"), "console.log('a');\n")
        .with_file(file("b.js"), "console.log('b');\n");
    let output = build(&runtime)
        .entry_point("./index.html")
        .bundler(Arc::new(ConcatBundler))
        .run()
        .await
        .unwrap();

    let bundle = versioned(&output, "js/a.js");
    assert_eq!(
        text(&output, bundle),
        "console.log('a');\nconsole.log('b');\n"
    );
    let html = text(&output, "index.html");
    assert_eq!(html.matches(&format!("src=\"/{bundle}\"")).count(), 2, "{html}");
    assert!(output.files.keys().all(|path| !path.starts_with("js/b")));
}

#[tokio::test]
async fn entry_points_referencing_each_other_are_built_once() {
    let runtime = site();
    let output = build(&runtime)
        .entry_point("./index.html")
        .entry_point("./main.js")
        .run()
        .await
        .unwrap();

    assert!(text(&output, "index.html").contains("src=\"/main.js\""));
    assert!(output.file("main.js").unwrap().is_entry_point);
    assert!(output.files.keys().all(|path| !path.starts_with("js/main")));
    let util = versioned(&output, "js/util.js");
    assert!(text(&output, "main.js").contains(&format!("from '/{util}'")));
}

#[tokio::test]
async fn excluded_types_keep_their_path() {
    let runtime = MemoryRuntime::new()
        .with_file(
            file("index.html"),
            "<link rel=\"manifest\" href=\"./app.webmanifest\">\n",
        )
        .with_file(file("app.webmanifest"), "{\"name\":\"app\"}\n");
    let output = build(&runtime).entry_point("./index.html").run().await.unwrap();

    assert!(output.file("other/app.webmanifest").is_some());
    assert!(output.versions.is_empty());
    assert!(text(&output, "index.html").contains("href=\"/other/app.webmanifest\""));
}

fn assets_project() -> MemoryRuntime {
    MemoryRuntime::new()
        .with_file(
            file("main.js"),
            "import './assets/a.js';\nimport './b.js';\nconst assets = new URL('./assets/', import.meta.url);\n",
        )
        .with_file(file("assets/a.js"), "export const a = 1;\n")
        .with_file(file("b.js"), "export const b = 1;\n")
}

fn directory_version(output: &galley_build::BuildOutput) -> String {
    output
        .versions
        .iter()
        .find(|(path, _)| path.ends_with("assets/"))
        .map(|(_, version)| version.clone())
        .unwrap_or_else(|| panic!("no directory version: {:?}", output.versions))
}

#[tokio::test]
async fn directory_versions_follow_the_files_inside() {
    let runtime = assets_project();
    let first = build(&runtime).entry_point("./main.js").run().await.unwrap();
    let assets = directory_version(&first);
    let b = versioned(&first, "js/b.js").to_string();

    runtime.insert(file("b.js"), "export const b = 2;\n");
    let outside = build(&runtime).entry_point("./main.js").run().await.unwrap();
    assert_ne!(versioned(&outside, "js/b.js"), b);
    assert_eq!(directory_version(&outside), assets);

    runtime.insert(file("assets/a.js"), "export const a = 2;\n");
    let inside = build(&runtime).entry_point("./main.js").run().await.unwrap();
    assert_ne!(directory_version(&inside), assets);
}

#[tokio::test]
async fn a_cancelled_build_writes_nothing() {
    let runtime = site();
    let build = build(&runtime).entry_point("./index.html");
    build.cancellation_token().cancel();

    let err = build.run_and_write().await.unwrap_err();
    assert!(err.is_aborted());
    assert!(
        runtime
            .paths()
            .iter()
            .all(|path| !path.starts_with("/project/dist"))
    );
}

#[tokio::test]
async fn missing_files_fail_the_build() {
    let runtime = MemoryRuntime::new().with_file(file("main.js"), "import './gone.js';\n");
    let err = build(&runtime)
        .entry_point("./main.js")
        .run()
        .await
        .unwrap_err();
    assert!(!err.is_aborted());
    assert!(err.to_string().contains("gone.js"), "{err}");
}

#[test]
fn config_roots_become_file_urls() {
    let config = GalleyConfig {
        root_directory: PathBuf::from("/project"),
        ..GalleyConfig::default()
    };
    let build = Build::from_config(&config, Arc::new(MemoryRuntime::new())).unwrap();
    assert_eq!(
        build.output_directory().unwrap(),
        PathBuf::from("/project/dist")
    );
}

#[tokio::test]
async fn native_builds_land_in_the_build_directory() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    std::fs::write(root.join("main.js"), "import { x } from './util.js';\n").unwrap();
    std::fs::write(root.join("util.js"), "export const x = 1;\n").unwrap();
    let config = GalleyConfig {
        root_directory: root.to_path_buf(),
        ..GalleyConfig::default()
    };

    let (output, written) = Build::from_config(&config, Arc::new(NativeRuntime::new()))
        .unwrap()
        .entry_point("./main.js")
        .scanner(PatternScanner::js())
        .run_and_write()
        .await
        .unwrap();

    let util = versioned(&output, "js/util.js");
    assert!(root.join("dist").join(util).is_file());
    assert!(written.contains(&root.join("dist").join("main.js")));
    assert!(root.join("dist").join("build_manifest.json").is_file());
}
