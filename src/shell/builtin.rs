//! Commands available at every console

use anyhow::{anyhow, bail, Context as _};
use futures::FutureExt;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

use super::{Capability, Shell};
use crate::compiler::{compile, BoundUnit, CompileFlags, CompileMode, Compiled};
use crate::executor::errors::IMPORT_ERROR;
use crate::executor::{Context, Failure, Val};
use crate::io::Streams;
use crate::modules::ModuleCache;
use crate::resolver::{ResolutionRequest, Resolver};
use crate::task::{Resume, Task};

const HELP: &[(&str, &str)] = &[
    ("help", "show this list"),
    ("pwd", "print the working directory"),
    ("cd DIR", "change the working directory"),
    ("ls [DIR..]", "list directory contents"),
    ("cat FILE..", "print files"),
    ("echo ARGS..", "print the arguments"),
    ("modules", "list importable modules"),
    ("install PKG..", "install packages in the background"),
    ("exit", "leave the console"),
    ("FILE.flow [ARGS..]", "run a script in the console namespace"),
];

/// The console's shell: file commands against a shell-local working
/// directory, plus session and package commands.
#[derive(Clone)]
pub struct BuiltinShell {
    ctx: Context,
    streams: Streams,
    resolver: Option<Rc<Resolver>>,
    cwd: Rc<RefCell<PathBuf>>,
}

impl BuiltinShell {
    pub fn new(ctx: Context, streams: Streams, resolver: Option<Rc<Resolver>>) -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::with_cwd(ctx, streams, resolver, cwd)
    }

    pub fn with_cwd(
        ctx: Context,
        streams: Streams,
        resolver: Option<Rc<Resolver>>,
        cwd: impl Into<PathBuf>,
    ) -> Self {
        Self {
            ctx,
            streams,
            resolver,
            cwd: Rc::new(RefCell::new(cwd.into())),
        }
    }

    pub fn cwd(&self) -> PathBuf {
        self.cwd.borrow().clone()
    }

    /// A lines capability computed up front
    fn listing(f: impl Fn(&[String]) -> anyhow::Result<Vec<String>> + 'static) -> Capability {
        Capability::lines(move |args| {
            let lines = f(args)?;
            Ok(Box::new(lines.into_iter().map(Ok::<String, anyhow::Error>)))
        })
    }

    fn pwd(&self) -> Capability {
        let cwd = Rc::clone(&self.cwd);
        Self::listing(move |_| Ok(vec![cwd.borrow().display().to_string()]))
    }

    fn cd(&self) -> Capability {
        let cwd = Rc::clone(&self.cwd);
        let loader = Rc::clone(&self.ctx.loader);
        Capability::call(move |args| {
            let target = match args {
                [] => std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .ok_or_else(|| anyhow!("HOME not set"))?,
                [dir] => resolve(&cwd.borrow(), dir),
                _ => bail!("too many arguments"),
            };
            let target = target
                .canonicalize()
                .with_context(|| format!("{}: no such directory", target.display()))?;
            if !target.is_dir() {
                bail!("{}: not a directory", target.display());
            }
            debug!(dir = %target.display(), "changing directory");
            *cwd.borrow_mut() = target;
            loader.invalidate_caches();
            Ok(())
        })
    }

    fn ls(&self) -> Capability {
        let cwd = Rc::clone(&self.cwd);
        Self::listing(move |args| {
            let base = cwd.borrow().clone();
            if args.is_empty() {
                return list_dir(&base);
            }
            let mut lines = Vec::new();
            for (i, arg) in args.iter().enumerate() {
                if args.len() > 1 {
                    if i > 0 {
                        lines.push(String::new());
                    }
                    lines.push(format!("{}:", arg));
                }
                lines.extend(list_dir(&resolve(&base, arg))?);
            }
            Ok(lines)
        })
    }

    fn cat(&self) -> Capability {
        let cwd = Rc::clone(&self.cwd);
        Capability::lines(move |args| {
            if args.is_empty() {
                bail!("missing file operand");
            }
            let paths: Vec<PathBuf> = args.iter().map(|a| resolve(&cwd.borrow(), a)).collect();
            Ok(Box::new(paths.into_iter().flat_map(|path| {
                match fs::read_to_string(&path) {
                    Ok(text) => text.lines().map(|l| Ok(l.to_string())).collect::<Vec<_>>(),
                    Err(e) => vec![Err(anyhow!("{}: {}", path.display(), e))],
                }
            })))
        })
    }

    fn modules(&self) -> Capability {
        let loader = Rc::clone(&self.ctx.loader);
        Self::listing(move |_| {
            Ok(loader
                .available()
                .into_iter()
                .map(|name| {
                    if loader.is_loaded(&name) {
                        format!("{} (loaded)", name)
                    } else {
                        name
                    }
                })
                .collect())
        })
    }

    fn install(&self) -> Capability {
        let Some(resolver) = self.resolver.clone() else {
            return Capability::call(|_| bail!("no package index configured"));
        };
        let out = self.streams.out.clone();
        Capability::background(move |packages| {
            let resolver = Rc::clone(&resolver);
            let out = out.clone();
            async move {
                if packages.is_empty() {
                    bail!("missing package operand");
                }
                for package in packages {
                    let report = resolver.install(&package).await?;
                    out.line(format!(
                        "Installed {} {} ({} files)",
                        report.manifest.name, report.manifest.version, report.files
                    ));
                }
                Ok::<(), anyhow::Error>(())
            }
            .boxed_local()
        })
    }

    fn exit(&self) -> Capability {
        let session = self.ctx.session.clone();
        Capability::call(move |_| {
            session.request_exit();
            Ok(())
        })
    }
}

impl Shell for BuiltinShell {
    fn capability(&self, name: &str) -> Option<Capability> {
        let capability = match name {
            "help" => Self::listing(|_| {
                Ok(HELP
                    .iter()
                    .map(|(usage, text)| format!("{:<20}{}", usage, text))
                    .collect())
            }),
            "pwd" => self.pwd(),
            "cd" => self.cd(),
            "ls" => self.ls(),
            "cat" => self.cat(),
            "echo" => Self::listing(|args| Ok(vec![args.join(" ")])),
            "modules" => self.modules(),
            "install" => self.install(),
            "exit" => self.exit(),
            "watch" => Capability::Stream,
            _ => return None,
        };
        Some(capability)
    }

    fn source(&self, path: &str, args: Vec<String>) -> Task {
        let path = resolve(&self.cwd.borrow(), path);
        let ctx = self.ctx.clone();
        let resolver = self.resolver.clone();

        Box::pin(async move {
            let filename = path.display().to_string();
            let source = tokio::fs::read_to_string(&path).await.map_err(|e| {
                Failure::throw(IMPORT_ERROR, format!("cannot read {}: {}", filename, e))
            })?;

            let unit = match compile(
                &source,
                &filename,
                CompileMode::Exec,
                CompileFlags::interactive(),
            ) {
                Compiled::Ready(unit) => unit,
                Compiled::Incomplete => {
                    return Err(Failure::throw(
                        IMPORT_ERROR,
                        format!("{}: unexpected end of file", filename),
                    ))
                }
                Compiled::Invalid(syntax) => {
                    return Err(Failure::throw(IMPORT_ERROR, syntax.to_string()))
                }
            };

            let argv = std::iter::once(filename.clone())
                .chain(args)
                .map(Val::Str)
                .collect();
            ctx.globals.set("argv", Val::List(argv));

            debug!(script = %filename, "sourcing script");
            let script = BoundUnit::new(unit, ctx);
            match script.invoke().await {
                Ok(_) => Ok(Resume::Noop),
                Err(Failure::MissingModule { name, line }) => match resolver {
                    Some(resolver) => {
                        let failure = Failure::MissingModule {
                            name: name.clone(),
                            line,
                        };
                        let request = ResolutionRequest::new(name, failure, Some(script));
                        Ok(resolver.resolve(request).await)
                    }
                    None => Err(Failure::MissingModule { name, line }),
                },
                Err(failure) => Err(failure),
            }
        })
    }
}

fn resolve(cwd: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

fn list_dir(dir: &Path) -> anyhow::Result<Vec<String>> {
    let mut names = Vec::new();
    let entries =
        fs::read_dir(dir).with_context(|| format!("cannot access '{}'", dir.display()))?;
    for entry in entries {
        let entry = entry?;
        let mut name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type()?.is_dir() {
            name.push('/');
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}
