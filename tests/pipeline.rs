use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use camino::{Utf8Path, Utf8PathBuf};
use image::{Rgba, RgbaImage};
use kumitate::{Error, Node, Orchestrator, Task, io, pipeline};

fn tempdir() -> (tempfile::TempDir, Utf8PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    (dir, root)
}

fn sample_site(source: &Utf8Path) {
    io::write(source.join("sass/_vars.scss"), "$accent: #c03;\n").unwrap();
    io::write(
        source.join("sass/style.scss"),
        "@import 'vars';\n\nbody {\n  a {\n    color: $accent;\n  }\n}\n",
    )
    .unwrap();

    std::fs::create_dir_all(source.join("img/photos")).unwrap();
    RgbaImage::from_pixel(8, 8, Rgba([10, 120, 200, 255]))
        .save(source.join("img/photos/sky.png"))
        .unwrap();

    io::write(
        source.join("img/icons/close.svg"),
        "<svg viewBox=\"0 0 10 10\">\n  <path d=\"M0 0L10 10\"/>\n</svg>\n",
    )
    .unwrap();

    io::write(
        source.join("index.html"),
        "<!DOCTYPE html>\n<html>\n  <body>\n    <h1>Hello</h1>\n  </body>\n</html>\n",
    )
    .unwrap();

    io::write(source.join("fonts/sans.woff2"), b"wOF2 font bytes").unwrap();
}

fn standard(root: &Utf8Path) -> Orchestrator {
    let mut orchestrator = Orchestrator::new(root.join("source"), root.join("build"));
    pipeline::register(&mut orchestrator).unwrap();
    orchestrator
}

/// Every file under `dir`, keyed by its path relative to `dir`.
fn snapshot(dir: &Utf8Path) -> BTreeMap<String, Vec<u8>> {
    let mut files = BTreeMap::new();
    let mut stack = vec![dir.to_path_buf()];

    while let Some(next) = stack.pop() {
        for entry in next.read_dir_utf8().unwrap() {
            let path = entry.unwrap().into_path();
            if path.is_dir() {
                stack.push(path);
            } else {
                let key = path.strip_prefix(dir).unwrap().to_string();
                files.insert(key, std::fs::read(&path).unwrap());
            }
        }
    }

    files
}

/// A task writing a marker file named after itself.
fn marker(name: &'static str) -> Task {
    Task::new(name, move |ctx| {
        io::write(ctx.output.join(name), name)?;
        Ok(1)
    })
}

fn failing(name: &'static str) -> Task {
    Task::new(name, move |_| Err(anyhow::anyhow!("{name} exploded")))
}

#[test]
fn test_full_build() {
    let (_guard, root) = tempdir();
    sample_site(&root.join("source"));

    let orchestrator = standard(&root);
    let report = orchestrator.execute(&pipeline::build()).unwrap();
    assert_eq!(report.tasks.len(), 8);

    let build = root.join("build");

    let css = std::fs::read_to_string(build.join("css/style.min.css")).unwrap();
    assert!(css.contains("body a{color:"));
    assert!(!css.contains('\n'));

    let sprite = std::fs::read_to_string(build.join("img/sprite.svg")).unwrap();
    assert!(sprite.contains(r#"<symbol id="close" viewBox="0 0 10 10">"#));

    let html = std::fs::read_to_string(build.join("index.html")).unwrap();
    assert_eq!(html, "<!DOCTYPE html><html><body><h1>Hello</h1></body></html>");
    assert!(!html.contains("<script>"));

    assert!(build.join("img/photos/sky.png").is_file());
    assert!(build.join("img/photos/sky.webp").is_file());
    assert!(build.join("img/icons/close.svg").is_file());
    assert_eq!(std::fs::read(build.join("fonts/sans.woff2")).unwrap(), b"wOF2 font bytes");

    // nothing lands next to the sources
    assert!(!root.join("source/img/photos/sky.webp").exists());
    assert!(!root.join("source/img/sprite.svg").exists());
}

#[test]
fn test_stale_source_sprite_is_ignored() {
    let (_guard, root) = tempdir();
    sample_site(&root.join("source"));
    io::write(
        root.join("source/img/sprite.svg"),
        r#"<svg><symbol id="OLD"/></svg>"#,
    )
    .unwrap();

    standard(&root).execute(&pipeline::build()).unwrap();

    let sprite = std::fs::read_to_string(root.join("build/img/sprite.svg")).unwrap();
    assert!(sprite.contains(r#"<symbol id="close""#), "{sprite}");
    assert!(!sprite.contains("OLD"), "{sprite}");
}

#[test]
fn test_build_removes_stale_output() {
    let (_guard, root) = tempdir();
    sample_site(&root.join("source"));
    io::write(root.join("build/old/stale.txt"), "stale").unwrap();

    standard(&root).execute(&pipeline::build()).unwrap();

    assert!(!root.join("build/old").exists());
    assert!(root.join("build/index.html").is_file());
}

#[test]
fn test_build_is_reproducible() {
    let (_guard, root) = tempdir();
    sample_site(&root.join("source"));
    let orchestrator = standard(&root);

    orchestrator.execute(&pipeline::build()).unwrap();
    let first = snapshot(&root.join("build"));

    orchestrator.execute(&pipeline::build()).unwrap();
    let second = snapshot(&root.join("build"));

    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn test_sequence_fails_fast() {
    let (_guard, root) = tempdir();
    let mut orchestrator = Orchestrator::new(root.join("source"), root.join("build"));
    orchestrator.register(marker("a")).unwrap();
    orchestrator.register(failing("b")).unwrap();
    orchestrator.register(marker("c")).unwrap();

    let node = Node::sequence([Node::task("a"), Node::task("b"), Node::task("c")]);
    let err = orchestrator.execute(&node).unwrap_err();

    assert!(matches!(&err, Error::TaskExecution { task, .. } if task == "b"));
    assert!(err.to_string().contains("b exploded"));
    assert!(root.join("build/a").is_file());
    assert!(!root.join("build/c").exists());
}

#[test]
fn test_parallel_runs_every_branch() {
    let (_guard, root) = tempdir();
    let mut orchestrator = Orchestrator::new(root.join("source"), root.join("build"));
    orchestrator.register(marker("a")).unwrap();
    orchestrator.register(failing("b")).unwrap();
    orchestrator.register(marker("c")).unwrap();

    let node = Node::parallel([Node::task("a"), Node::task("b"), Node::task("c")]);
    let err = orchestrator.execute(&node).unwrap_err();

    assert!(matches!(&err, Error::TaskExecution { task, .. } if task == "b"));
    assert!(root.join("build/a").is_file());
    assert!(root.join("build/c").is_file());
}

#[test]
fn test_parallel_aggregates_failures() {
    let (_guard, root) = tempdir();
    let mut orchestrator = Orchestrator::new(root.join("source"), root.join("build"));
    orchestrator.register(failing("a")).unwrap();
    orchestrator.register(marker("b")).unwrap();
    orchestrator.register(failing("c")).unwrap();

    let node = Node::parallel([Node::task("a"), Node::task("b"), Node::task("c")]);
    let err = orchestrator.execute(&node).unwrap_err();

    assert!(matches!(&err, Error::Parallel(errors) if errors.len() == 2));

    assert_eq!(err.failed_tasks(), vec!["a", "c"]);
    assert!(root.join("build/b").is_file());
}

#[test]
fn test_parallel_reports_declared_order() {
    let (_guard, root) = tempdir();
    let mut orchestrator = Orchestrator::new(root.join("source"), root.join("build"));
    orchestrator
        .register(Task::new("slow", |_| {
            std::thread::sleep(std::time::Duration::from_millis(100));
            Ok(1)
        }))
        .unwrap();
    orchestrator.register(marker("fast")).unwrap();

    let node = Node::parallel([Node::task("slow"), Node::task("fast")]);
    let report = orchestrator.execute(&node).unwrap();

    let names: Vec<_> = report.tasks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["slow", "fast"]);
}

#[test]
fn test_unknown_task_fails_before_running() {
    let (_guard, root) = tempdir();
    let calls = Arc::new(AtomicUsize::new(0));

    let mut orchestrator = Orchestrator::new(root.join("source"), root.join("build"));
    let counter = calls.clone();
    orchestrator
        .register(Task::new("a", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        }))
        .unwrap();

    let node = Node::sequence([Node::task("a"), Node::task("missing")]);
    let err = orchestrator.execute(&node).unwrap_err();

    assert!(matches!(err, Error::UnknownTask(name) if name == "missing"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let err = orchestrator.run_task("missing").unwrap_err();
    assert!(matches!(err, Error::UnknownTask(_)));
}

#[test]
fn test_duplicate_task_keeps_first() {
    let (_guard, root) = tempdir();
    let mut orchestrator = Orchestrator::new(root.join("source"), root.join("build"));
    orchestrator.register(marker("styles")).unwrap();

    let err = orchestrator.register(failing("styles")).unwrap_err();
    assert!(matches!(err, Error::DuplicateTask(name) if name == "styles"));

    orchestrator.run_task("styles").unwrap();
    assert!(root.join("build/styles").is_file());
}

#[test]
fn test_single_task_run() {
    let (_guard, root) = tempdir();
    sample_site(&root.join("source"));
    let orchestrator = standard(&root);

    let report = orchestrator.run_task("fonts").unwrap();
    assert_eq!(report.name, "fonts");
    assert_eq!(report.files, 1);
    assert!(root.join("build/fonts/sans.woff2").is_file());
    assert!(!root.join("build/index.html").exists());
}

#[test]
fn test_clean_missing_output() {
    let (_guard, root) = tempdir();
    let orchestrator = standard(&root);

    assert_eq!(orchestrator.clean().unwrap(), 0);
    assert_eq!(orchestrator.run_task("clean").unwrap().files, 0);
}
