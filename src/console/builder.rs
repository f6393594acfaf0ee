use std::rc::Rc;
use tracing::debug;

use super::{Console, Prompts};
use crate::config::Config;
use crate::executor::{Context, SessionState};
use crate::io::Streams;
use crate::modules::{ModuleLoader, SearchPath};
use crate::resolver::{ArchiveFetcher, FetchChain, IndexFetcher, LocalArchives, Resolver};
use crate::shell::{BuiltinShell, Shell};

/// Options for building a console
struct ConsoleOptions {
    config: Config,
    streams: Option<Streams>,
    fetcher: Option<Box<dyn ArchiveFetcher>>,
    resolver: bool,
    shell: bool,
}

impl Default for ConsoleOptions {
    fn default() -> Self {
        Self {
            config: Config::default(),
            streams: None,
            fetcher: None,
            resolver: true,
            shell: true,
        }
    }
}

/// Builder for wiring a console to its collaborators
pub struct ConsoleBuilder {
    options: ConsoleOptions,
}

impl ConsoleBuilder {
    /// Create a new builder with default options
    pub fn new() -> Self {
        Self {
            options: ConsoleOptions::default(),
        }
    }

    /// Use a loaded configuration
    pub fn config(mut self, config: Config) -> Self {
        self.options.config = config;
        self
    }

    /// Write output and errors somewhere other than stdout/stderr
    pub fn streams(mut self, streams: Streams) -> Self {
        self.options.streams = Some(streams);
        self
    }

    /// Replace the archive fetcher derived from the configuration
    pub fn fetcher(mut self, fetcher: impl ArchiveFetcher + 'static) -> Self {
        self.options.fetcher = Some(Box::new(fetcher));
        self
    }

    /// Set whether missing modules are installed and resumed
    pub fn resolver(mut self, enabled: bool) -> Self {
        self.options.resolver = enabled;
        self
    }

    /// Set whether invalid one-liners are offered to the shell
    pub fn shell(mut self, enabled: bool) -> Self {
        self.options.shell = enabled;
        self
    }

    pub fn build(self) -> Console {
        build(self.options)
    }
}

impl Default for ConsoleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Local archives first, then the package index when one is configured
pub fn default_fetcher(config: &Config) -> FetchChain {
    let chain = FetchChain::new().with(LocalArchives::new(&config.archive_dir));
    match &config.index_url {
        Some(url) => chain.with(IndexFetcher::new(url, &config.archive_dir)),
        None => chain,
    }
}

fn build(options: ConsoleOptions) -> Console {
    let ConsoleOptions {
        config,
        streams,
        fetcher,
        resolver,
        shell,
    } = options;

    let streams = streams.unwrap_or_else(Streams::stdio);
    let search_path = SearchPath::new(config.search_path.iter().cloned());
    // Packages installed by an earlier session are importable straight away
    if config.install_dir.is_dir() {
        search_path.register(&config.install_dir);
    }

    let loader = ModuleLoader::new(search_path.clone());
    let ctx = Context::new(Rc::clone(&loader), streams.out.clone(), SessionState::new());

    let resolver = resolver.then(|| {
        let fetcher = fetcher
            .unwrap_or_else(|| Box::new(default_fetcher(&config)) as Box<dyn ArchiveFetcher>);
        Rc::new(Resolver::new(
            &config.install_dir,
            search_path.clone(),
            fetcher,
            loader.clone(),
            streams.clone(),
        ))
    });

    let shell = shell.then(|| {
        Rc::new(BuiltinShell::new(ctx.clone(), streams.clone(), resolver.clone())) as Rc<dyn Shell>
    });

    debug!(
        search_path = ?search_path.dirs(),
        install_dir = %config.install_dir.display(),
        resolver = resolver.is_some(),
        shell = shell.is_some(),
        "console built"
    );

    let mut console = Console::new(ctx, streams);
    console.prompts = Prompts {
        ps1: config.ps1,
        ps2: config.ps2,
    };
    console.resolver = resolver;
    console.shell = shell;
    console
}
