#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use invoicer_pipeline::paths::ASSET_MANIFEST;
use invoicer_pipeline::{
    CompileFailure, ErrorKind, LocalRenderer, PipelineConfig, RenderError, ResourceJanitor,
};
use tempfile::TempDir;

const SOURCE: &str = "\\documentclass{dapper-invoice}\n\\begin{document}Acme\\end{document}\n";

struct Fixture {
    root: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let root = TempDir::new().expect("root");
        for relative in ASSET_MANIFEST {
            let path = root.path().join("assets").join(relative);
            fs::create_dir_all(path.parent().expect("parent")).expect("mkdir assets");
            fs::write(&path, relative.as_bytes()).expect("write asset");
        }
        fs::create_dir_all(root.path().join("scratch")).expect("mkdir scratch");
        Fixture { root }
    }

    fn path(&self, relative: &str) -> PathBuf {
        self.root.path().join(relative)
    }

    fn log(&self) -> PathBuf {
        self.path("compiler.log")
    }

    fn log_lines(&self) -> Vec<String> {
        fs::read_to_string(self.log())
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Compiler stand-in: `body` runs in the working area after the
    /// invocation has been appended to the log.
    fn compiler(&self, body: &str) -> PathBuf {
        let script = self.path("compiler.sh");
        let text = format!(
            "#!/bin/sh\necho \"$PWD|$*\" >> '{}'\n{body}\n",
            self.log().display()
        );
        fs::write(&script, text).expect("write stub");
        script
    }

    fn config(&self, script: &Path) -> PipelineConfig {
        PipelineConfig {
            compiler: "sh".to_string(),
            compiler_args: vec![script.display().to_string()],
            asset_dir: Some(self.path("assets")),
            scratch_dir: Some(self.path("scratch")),
            release_delay_ms: 0,
            ..PipelineConfig::default()
        }
    }

    fn renderer(&self, body: &str) -> LocalRenderer {
        let config = self.config(&self.compiler(body));
        LocalRenderer::new(ResourceJanitor::new(config.scratch_dir.clone()), &config)
    }

    async fn wait_for_empty_scratch(&self) {
        for _ in 0..100 {
            let left = fs::read_dir(self.path("scratch")).expect("scratch").count();
            if left == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("working areas were not removed");
    }
}

#[tokio::test]
async fn rerun_signal_triggers_exactly_one_more_pass() {
    let fx = Fixture::new();
    let renderer = fx.renderer(
        "echo 'LaTeX Warning: Label(s) may have changed. Rerun to get cross-references right.'\ncp render.tex render.pdf",
    );
    let dest = fx.path("out/invoice.pdf");

    let artifact = renderer.render(SOURCE, &dest).await.expect("render");
    assert_eq!(fx.log_lines().len(), 2, "always-rerun output must stop at two passes");
    assert_eq!(artifact.path, dest);
    assert_eq!(fs::read_to_string(&dest).expect("artifact"), SOURCE);
}

#[tokio::test]
async fn settled_output_runs_once() {
    let fx = Fixture::new();
    let renderer = fx.renderer("echo 'Output written on render.pdf (1 page).'\ncp render.tex render.pdf");

    renderer.render(SOURCE, &fx.path("invoice.pdf")).await.expect("render");
    assert_eq!(fx.log_lines().len(), 1);
}

#[tokio::test]
async fn compiler_is_invoked_with_fixed_flags_inside_the_area() {
    let fx = Fixture::new();
    let renderer = fx.renderer("cp render.tex render.pdf");

    renderer.render(SOURCE, &fx.path("invoice.pdf")).await.expect("render");
    let lines = fx.log_lines();
    let (cwd, args) = lines[0].split_once('|').expect("log line");
    assert_eq!(args, "-synctex=1 -interaction=nonstopmode render.tex");
    let cwd = Path::new(cwd);
    assert!(
        cwd.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("invoicer-")),
        "unexpected working dir {cwd:?}"
    );
}

#[tokio::test]
async fn assets_are_staged_before_compiling() {
    let fx = Fixture::new();
    let renderer = fx.renderer(
        "test -f Fonts/FontAwesome.otf && test -f Fonts/OpenSans-Regular.ttf && test -f dapper-invoice.cls || exit 3\ncp render.tex render.pdf",
    );

    renderer.render(SOURCE, &fx.path("invoice.pdf")).await.expect("render");
}

#[tokio::test]
async fn failing_compiler_reports_its_output() {
    let fx = Fixture::new();
    let renderer = fx.renderer("echo '! Undefined control sequence.'\nexit 1");
    let dest = fx.path("invoice.pdf");

    let err = renderer.render(SOURCE, &dest).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Compile);
    match &err {
        RenderError::Compile {
            reason: CompileFailure::Exit { pass, .. },
            output,
        } => {
            assert_eq!(*pass, 1);
            assert!(output.contains("Undefined control sequence"), "output: {output}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!dest.exists());
    fx.wait_for_empty_scratch().await;
}

#[tokio::test]
async fn failing_second_pass_is_a_compile_error() {
    let fx = Fixture::new();
    let marker = fx.path("first-pass-done");
    let body = format!(
        "if [ -f '{m}' ]; then echo 'fatal on rerun'; exit 1; fi\ntouch '{m}'\necho Rerun\ncp render.tex render.pdf",
        m = marker.display()
    );
    let renderer = fx.renderer(&body);

    let err = renderer.render(SOURCE, &fx.path("invoice.pdf")).await.unwrap_err();
    assert!(
        matches!(err, RenderError::Compile { reason: CompileFailure::Exit { pass: 2, .. }, .. }),
        "got: {err}"
    );
    assert!(err.compiler_output().expect("output").contains("fatal on rerun"));
}

#[tokio::test]
async fn missing_pdf_is_a_compile_error() {
    let fx = Fixture::new();
    let renderer = fx.renderer("echo 'No pages of output.'");
    let dest = fx.path("invoice.pdf");

    let err = renderer.render(SOURCE, &dest).await.unwrap_err();
    assert!(
        matches!(err, RenderError::Compile { reason: CompileFailure::MissingArtifact { .. }, .. }),
        "got: {err}"
    );
    assert!(err.compiler_output().expect("output").contains("No pages of output"));
    assert!(!dest.exists());
}

#[tokio::test]
async fn missing_assets_fail_before_the_compiler_runs() {
    let fx = Fixture::new();
    fs::remove_file(fx.path("assets/dapper-invoice.cls")).expect("remove asset");
    let renderer = fx.renderer("cp render.tex render.pdf");

    let err = renderer.render(SOURCE, &fx.path("invoice.pdf")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resource);
    assert!(fx.log_lines().is_empty());
}

#[tokio::test]
async fn unknown_compiler_is_a_spawn_failure() {
    let fx = Fixture::new();
    let config = PipelineConfig {
        compiler: fx.path("no-such-compiler").display().to_string(),
        ..fx.config(&fx.compiler(""))
    };
    let renderer = LocalRenderer::new(ResourceJanitor::new(config.scratch_dir.clone()), &config);

    let err = renderer.render(SOURCE, &fx.path("invoice.pdf")).await.unwrap_err();
    assert!(
        matches!(err, RenderError::Compile { reason: CompileFailure::Spawn { .. }, .. }),
        "got: {err}"
    );
}

#[tokio::test]
async fn hung_compiler_is_stopped_by_the_timeout() {
    let fx = Fixture::new();
    let config = PipelineConfig {
        compile_timeout_secs: Some(1),
        ..fx.config(&fx.compiler("sleep 30"))
    };
    let renderer = LocalRenderer::new(ResourceJanitor::new(config.scratch_dir.clone()), &config);

    let err = renderer.render(SOURCE, &fx.path("invoice.pdf")).await.unwrap_err();
    assert!(
        matches!(err, RenderError::Compile { reason: CompileFailure::TimedOut { pass: 1, .. }, .. }),
        "got: {err}"
    );
}

#[tokio::test]
async fn working_areas_are_removed_after_success() {
    let fx = Fixture::new();
    let renderer = fx.renderer("cp render.tex render.pdf");

    renderer.render(SOURCE, &fx.path("invoice.pdf")).await.expect("render");
    fx.wait_for_empty_scratch().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_renders_use_separate_areas() {
    let fx = Fixture::new();
    let renderer = fx.renderer("sleep 0.2\ncp render.tex render.pdf");
    let first = fx.path("first.pdf");
    let second = fx.path("second.pdf");

    let (a, b) = tokio::join!(
        renderer.render("first source", &first),
        renderer.render("second source", &second),
    );
    a.expect("first render");
    b.expect("second render");

    assert_eq!(fs::read_to_string(&first).expect("first"), "first source");
    assert_eq!(fs::read_to_string(&second).expect("second"), "second source");

    let dirs: std::collections::BTreeSet<String> = fx
        .log_lines()
        .iter()
        .filter_map(|line| line.split_once('|').map(|(cwd, _)| cwd.to_string()))
        .collect();
    assert_eq!(dirs.len(), 2, "renders shared a working area: {dirs:?}");
}
