// tests/pipeline_scenarios.rs

mod common;

use std::sync::Arc;

use assetdag::clean::clean;
use assetdag::dag::TaskStatus;
use assetdag::engine::Runner;
use assetdag::fs::RealFileSystem;
use assetdag::transform::AdapterRegistry;
use assetdag_test_utils::builders::{ConfigFileBuilder, TaskConfigBuilder};
use assetdag_test_utils::fake_transform::FakeTypescript;
use common::{Project, init_tracing, pipeline, with_timeout};

fn registry_with_fake_typescript() -> AdapterRegistry {
    let mut registry = AdapterRegistry::with_defaults();
    registry.register(Arc::new(FakeTypescript));
    registry
}

#[tokio::test]
async fn typescript_output_is_identical_across_runs() {
    init_tracing();
    let project = Project::new();
    project.write("src/app/app.module.ts", "export const app = 1;\n");
    project.write("src/app/feature/list.ts", "export const list = [];\n");
    project.write("src/app/typings.d.ts", "declare const x: number;\n");

    let cfg = ConfigFileBuilder::new()
        .with_task(
            "scripts",
            TaskConfigBuilder::transform(&["src/app/**/*.ts", "!src/app/**/*.d.ts"], "{temp}js/")
                .pipe("typescript")
                .build(),
        )
        .build();
    let (graph, backend, _shutdown) = pipeline(&cfg, project.root(), registry_with_fake_typescript());
    let runner = Runner::new(graph, backend);

    with_timeout(runner.run("scripts")).await.unwrap();
    let first = project.read(".tmp/js/feature/list.js");
    assert_eq!(first, "// compiled\nexport const list = [];\n");
    assert!(project.exists(".tmp/js/app.module.js"));
    assert!(!project.exists(".tmp/js/typings.d.js"));

    with_timeout(runner.run("scripts")).await.unwrap();
    assert_eq!(project.read(".tmp/js/feature/list.js"), first);
}

#[tokio::test]
async fn clean_finishes_before_styles_are_written() {
    let project = Project::new();
    project.write(".tmp/styles/stale.css", "old");
    project.write(".tmp/styles/app.css", "also old");
    project.write("src/styles/_colors.scss", "$accent: #c00;\n");
    project.write("src/styles/app.scss", "@import 'colors';\na { color: $accent; }\n");

    let cfg = ConfigFileBuilder::new()
        .with_task("clean-styles", TaskConfigBuilder::clean(&["{temp}styles/"]).build())
        .with_task(
            "styles",
            TaskConfigBuilder::transform(&["src/styles/**/*.scss"], "{temp}styles/")
                .after("clean-styles")
                .pipe("sass")
                .build(),
        )
        .build();
    let (graph, backend, _shutdown) = pipeline(&cfg, project.root(), AdapterRegistry::with_defaults());

    let report = with_timeout(Runner::new(graph, backend).run("styles"))
        .await
        .unwrap();
    assert_eq!(report.completed, vec!["clean-styles", "styles"]);
    assert!(!project.exists(".tmp/styles/stale.css"));
    assert!(!project.exists(".tmp/styles/_colors.css"));
    let css = project.read(".tmp/styles/app.css");
    assert!(css.contains("color: #c00"), "unexpected css: {css}");
}

#[tokio::test]
async fn compile_error_fails_dependents_but_not_siblings() {
    let project = Project::new();
    project.write("src/app/broken.ts", "SYNTAX ERROR\n");
    project.write("src/styles/app.scss", "a { color: red; }\n");
    project.write("src/index.html", "<!-- inject:js -->\n<!-- endinject -->\n");

    let cfg = ConfigFileBuilder::new()
        .with_task(
            "scripts",
            TaskConfigBuilder::transform(&["src/app/**/*.ts"], "{temp}js/")
                .pipe("typescript")
                .build(),
        )
        .with_task(
            "styles",
            TaskConfigBuilder::transform(&["src/styles/*.scss"], "{temp}styles/")
                .pipe("sass")
                .build(),
        )
        .with_task(
            "inject",
            TaskConfigBuilder::inject("src/index.html", "{temp}")
                .after("scripts")
                .after("styles")
                .target(Some("js"), &["{temp}js/**/*.js"])
                .build(),
        )
        .build();
    let (graph, backend, _shutdown) = pipeline(&cfg, project.root(), registry_with_fake_typescript());

    let report = with_timeout(Runner::new(graph, backend).execute("inject", None))
        .await
        .unwrap();
    assert_eq!(report.status_of("scripts"), TaskStatus::Failed);
    assert_eq!(report.status_of("styles"), TaskStatus::Done);
    assert_eq!(report.status_of("inject"), TaskStatus::Failed);
    assert!(report.errors["scripts"].contains("unexpected token"));
    assert!(!project.exists(".tmp/js/broken.js"));
    assert!(project.exists(".tmp/styles/app.css"));
    assert!(!project.exists(".tmp/index.html"));
}

#[tokio::test]
async fn injection_is_idempotent() {
    let project = Project::new();
    project.write(
        "src/index.html",
        "<html>\n  <body>\n    <!-- inject:vendor -->\n    <!-- endinject -->\n    <!-- inject:js -->\n    <!-- endinject -->\n  </body>\n</html>\n",
    );
    project.write("bower_components/jquery/dist/jquery.js", "");
    project.write(".tmp/js/app.module.js", "");
    project.write(".tmp/js/zz.js", "");

    let cfg = ConfigFileBuilder::new()
        .with_task(
            "inject",
            TaskConfigBuilder::inject("src/index.html", "{temp}")
                .target(Some("vendor"), &["bower_components/jquery/dist/jquery.js"])
                .target(Some("js"), &["{temp}js/**/*.js"])
                .build(),
        )
        .build();
    let (graph, backend, _shutdown) = pipeline(&cfg, project.root(), AdapterRegistry::with_defaults());
    let runner = Runner::new(graph, backend);

    with_timeout(runner.run("inject")).await.unwrap();
    let first = project.read(".tmp/index.html");
    assert!(first.contains(r#"<script src="../bower_components/jquery/dist/jquery.js"></script>"#));
    assert!(first.contains(r#"<script src="js/app.module.js"></script>"#));
    assert!(first.starts_with("<html>\n  <body>\n"));

    with_timeout(runner.run("inject")).await.unwrap();
    assert_eq!(project.read(".tmp/index.html"), first);
}

#[tokio::test]
async fn optimize_bundles_and_rewrites_the_document() {
    let project = Project::new();
    project.write(
        ".tmp/index.html",
        "<head>\n  <!-- build:css styles/app.css -->\n  <link rel=\"stylesheet\" href=\"styles/a.css\">\n  <link rel=\"stylesheet\" href=\"styles/b.css\">\n  <!-- endbuild -->\n</head>\n",
    );
    project.write(".tmp/styles/a.css", "a { color: red; }");
    project.write(".tmp/styles/b.css", "b { color: #0000ff; }");

    let cfg = ConfigFileBuilder::new()
        .with_task(
            "optimize",
            TaskConfigBuilder::optimize("{temp}index.html", "{build}")
                .filter("**/*.css", "css-minify")
                .build(),
        )
        .build();
    let (graph, backend, _shutdown) = pipeline(&cfg, project.root(), AdapterRegistry::with_defaults());

    with_timeout(Runner::new(graph, backend).run("optimize"))
        .await
        .unwrap();
    assert_eq!(project.read("build/styles/app.css"), "a{color:red}b{color:#00f}");
    assert_eq!(
        project.read("build/index.html"),
        "<head>\n  <link rel=\"stylesheet\" href=\"styles/app.css\">\n</head>\n"
    );
}

#[test]
fn clean_with_no_matches_succeeds() {
    let project = Project::new();
    let report = clean(
        &RealFileSystem,
        project.root(),
        &[".tmp/**/*.js".to_string(), "build/".to_string()],
    )
    .unwrap();
    assert_eq!(report.deleted, 0);
    assert!(report.failures.is_empty());
}
