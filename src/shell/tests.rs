use std::fs;
use std::rc::Rc;
use std::time::Duration;

use super::*;
use crate::executor::{Context, SessionState, Val};
use crate::io::{Captured, Output};
use crate::modules::{ModuleLoader, SearchPath};
use crate::resolver::{pack_directory, LocalArchives, Resolver};

struct Harness {
    shell: BuiltinShell,
    ctx: Context,
    streams: Streams,
    out: Captured,
    err: Captured,
}

fn harness(cwd: &std::path::Path, resolver: Option<Rc<Resolver>>) -> Harness {
    let loader = ModuleLoader::new(SearchPath::default());
    harness_with(cwd, loader, resolver)
}

fn harness_with(
    cwd: &std::path::Path,
    loader: Rc<ModuleLoader>,
    resolver: Option<Rc<Resolver>>,
) -> Harness {
    let (out_sink, out) = Output::capture();
    let (err_sink, err) = Output::capture();
    let streams = Streams::new(out_sink.clone(), err_sink);
    let ctx = Context::new(loader, out_sink, SessionState::new());
    let shell = BuiltinShell::with_cwd(ctx.clone(), streams.clone(), resolver, cwd);
    Harness {
        shell,
        ctx,
        streams,
        out,
        err,
    }
}

impl Harness {
    fn dispatch(&self, line: &str, pending: &mut Option<Task>) -> bool {
        dispatch(&self.shell, line, &[], &self.streams, pending)
    }
}

#[test]
fn test_parse_line_splits_segments() {
    assert_eq!(
        parse_line(" echo a  b ; ; pwd"),
        vec![
            ShellCommand {
                name: "echo".to_string(),
                args: vec!["a".to_string(), "b".to_string()],
            },
            ShellCommand {
                name: "pwd".to_string(),
                args: vec![],
            },
        ]
    );
    assert!(parse_line("  ;  ").is_empty());
}

#[test]
fn test_unknown_command_is_not_claimed() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), None);
    let mut pending = None;

    assert!(!h.dispatch("unknowncmd foo", &mut pending));
    assert!(pending.is_none());
    assert_eq!(h.out.contents(), "");
    assert_eq!(h.err.contents(), "");
}

#[test]
fn test_unclaimed_segment_runs_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), None);
    let mut pending = None;

    assert!(!h.dispatch("echo first; unknowncmd", &mut pending));
    assert_eq!(h.out.contents(), "");
}

#[test]
fn test_echo_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), None);
    let mut pending = None;

    assert!(h.dispatch("echo arg1 arg2", &mut pending));
    let first = h.out.contents();
    h.out.clear();
    assert!(h.dispatch("echo arg1 arg2", &mut pending));

    assert_eq!(first, "arg1 arg2\n");
    assert_eq!(h.out.contents(), first);
}

#[test]
fn test_segments_run_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), None);
    let mut pending = None;

    assert!(h.dispatch("echo one; echo two", &mut pending));
    assert_eq!(h.out.contents(), "one\ntwo\n");
}

#[test]
fn test_ls_cd_pwd() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    fs::create_dir(root.join("sub")).unwrap();
    fs::write(root.join("b.txt"), "").unwrap();
    let h = harness(&root, None);
    let mut pending = None;

    h.dispatch("ls", &mut pending);
    assert_eq!(h.out.contents(), "b.txt\nsub/\n");
    h.out.clear();

    h.dispatch("cd sub; pwd", &mut pending);
    assert_eq!(h.out.contents(), format!("{}\n", root.join("sub").display()));
    assert_eq!(h.shell.cwd(), root.join("sub"));
}

#[test]
fn test_cd_to_missing_directory_reports() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), None);
    let mut pending = None;

    assert!(h.dispatch("cd nowhere", &mut pending));
    assert!(h.err.contents().starts_with("cd: "));
    assert_eq!(h.shell.cwd(), dir.path());
}

#[test]
fn test_cat_stops_at_first_error() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.txt"), "alpha\nbeta\n").unwrap();
    fs::write(dir.path().join("c.txt"), "gamma\n").unwrap();
    let h = harness(dir.path(), None);
    let mut pending = None;

    h.dispatch("cat a.txt missing.txt c.txt", &mut pending);
    assert_eq!(h.out.contents(), "alpha\nbeta\n");
    assert!(h.err.contents().contains("missing.txt"));
}

#[test]
fn test_exit_sets_session_flag() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), None);
    let mut pending = None;

    assert!(!h.ctx.session.exit_requested());
    h.dispatch("exit", &mut pending);
    assert!(h.ctx.session.exit_requested());
}

#[test]
fn test_stream_commands_are_unsupported() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), None);
    let mut pending = None;

    assert!(h.dispatch("watch logs", &mut pending));
    assert_eq!(
        h.err.contents(),
        "watch: streaming commands are not implemented\n"
    );
}

#[test]
fn test_install_without_resolver() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), None);
    let mut pending = None;

    assert!(h.dispatch("install greet", &mut pending));
    assert_eq!(h.err.contents(), "install: no package index configured\n");
}

#[tokio::test]
async fn test_script_becomes_pending_task() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("setup.flow"),
        "let count = len(argv)\nlet last = argv[2]\n",
    )
    .unwrap();
    let h = harness(dir.path(), None);
    let mut pending = None;

    let extra = vec!["extra".to_string()];
    assert!(dispatch(
        &h.shell,
        "setup.flow first",
        &extra,
        &h.streams,
        &mut pending
    ));
    assert!(!h.ctx.globals.contains("count"), "not run until awaited");

    let resume = pending.take().unwrap().await.unwrap();
    assert!(resume.is_noop());
    assert_eq!(h.ctx.globals.get("count"), Some(Val::Num(3.0)));
    assert_eq!(
        h.ctx.globals.get("last"),
        Some(Val::Str("extra".to_string()))
    );
}

#[tokio::test]
async fn test_script_failure_surfaces_from_task() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("bad.flow"), "let x = nope\n").unwrap();
    let h = harness(dir.path(), None);
    let mut pending = None;

    h.dispatch("bad.flow", &mut pending);
    let failure = pending.take().unwrap().await.unwrap_err();
    assert!(failure.to_string().starts_with("UNDEFINED_VARIABLE"));
}

#[tokio::test]
async fn test_background_install() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("greet");
    fs::create_dir(&src).unwrap();
    fs::write(src.join("mod.flow"), "let hello = 1\n").unwrap();
    let archives = dir.path().join("archives");
    fs::create_dir(&archives).unwrap();
    pack_directory(&src, "greet", "1.0", &archives.join("greet.zip")).unwrap();

    let search_path = SearchPath::default();
    let loader = ModuleLoader::new(search_path.clone());
    let (resolver_err, _) = Output::capture();
    let resolver = Rc::new(Resolver::new(
        dir.path().join("site"),
        search_path,
        Box::new(LocalArchives::new(&archives)),
        loader.clone(),
        Streams::new(Output::capture().0, resolver_err),
    ));
    let h = harness_with(dir.path(), loader, Some(resolver));

    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let mut pending = None;
            assert!(h.dispatch("install greet", &mut pending));
            assert_eq!(h.out.contents(), "", "install runs in the background");

            for _ in 0..500 {
                if !h.out.contents().is_empty() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;

    assert_eq!(h.out.contents(), "Installed greet 1.0 (2 files)\n");
    assert!(h.ctx.loader.find("greet").is_some());
}
