//! Module search path, directory listing cache and loaded-module table
//!
//! A module named `m` is found in the first search-path directory holding
//! either `m.flow` or `m/mod.flow`. Directory listings are cached; a package
//! installed after a listing was taken stays invisible until the cache is
//! invalidated, which is exactly what the resolver does after extraction.

use futures::future::LocalBoxFuture;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, trace};

use crate::compiler::{compile, CompileFlags, CompileMode, Compiled};
use crate::executor::errors::{self, Failure};
use crate::executor::{run_statements, stdlib, Context, Namespace};

pub const SOURCE_SUFFIX: &str = ".flow";
const PACKAGE_ENTRY: &str = "mod.flow";

/* ===================== Search Path ===================== */

/// Ordered module search directories, shared between the loader and resolver
#[derive(Clone, Default)]
pub struct SearchPath {
    dirs: Rc<RefCell<Vec<PathBuf>>>,
}

impl SearchPath {
    pub fn new(dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        let path = Self::default();
        for dir in dirs {
            path.register(dir);
        }
        path
    }

    /// Append `dir` unless already present; returns whether it was added
    pub fn register(&self, dir: impl Into<PathBuf>) -> bool {
        let dir = dir.into();
        let mut dirs = self.dirs.borrow_mut();
        if dirs.contains(&dir) {
            return false;
        }
        dirs.push(dir);
        true
    }

    pub fn contains(&self, dir: &Path) -> bool {
        self.dirs.borrow().iter().any(|d| d == dir)
    }

    pub fn dirs(&self) -> Vec<PathBuf> {
        self.dirs.borrow().clone()
    }
}

/* ===================== Module Cache ===================== */

/// What the resolver needs from the import machinery after an install
pub trait ModuleCache {
    /// Forget every cached directory listing
    fn invalidate_caches(&self);

    /// Rescan `dir` now; returns how many modules it offers
    fn explore(&self, dir: &Path) -> std::io::Result<usize>;
}

/* ===================== Modules ===================== */

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleOrigin {
    Builtin,
    File(PathBuf),
}

pub struct Module {
    name: String,
    origin: ModuleOrigin,
    namespace: Namespace,
}

impl Module {
    pub fn new(name: impl Into<String>, origin: ModuleOrigin, namespace: Namespace) -> Self {
        Self {
            name: name.into(),
            origin,
            namespace,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> &ModuleOrigin {
        &self.origin
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }
}

/* ===================== Loader ===================== */

pub struct ModuleLoader {
    search_path: SearchPath,
    listings: RefCell<HashMap<PathBuf, BTreeSet<String>>>,
    loaded: RefCell<HashMap<String, Rc<Module>>>,
}

impl ModuleLoader {
    pub fn new(search_path: SearchPath) -> Rc<Self> {
        Rc::new(Self {
            search_path,
            listings: RefCell::new(HashMap::new()),
            loaded: RefCell::new(HashMap::new()),
        })
    }

    pub fn search_path(&self) -> &SearchPath {
        &self.search_path
    }

    pub fn loaded_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.loaded.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.borrow().contains_key(name)
    }

    /// Locate the source file for `name` using cached listings
    pub fn find(&self, name: &str) -> Option<PathBuf> {
        for dir in self.search_path.dirs() {
            if !self.listing(&dir).contains(name) {
                continue;
            }
            let file = dir.join(format!("{}{}", name, SOURCE_SUFFIX));
            if file.is_file() {
                return Some(file);
            }
            let package = dir.join(name).join(PACKAGE_ENTRY);
            if package.is_file() {
                return Some(package);
            }
        }
        None
    }

    /// Every importable module name: builtins plus the search path
    pub fn available(&self) -> Vec<String> {
        let mut names: BTreeSet<String> =
            stdlib::BUILTIN_MODULES.iter().map(|s| s.to_string()).collect();
        for dir in self.search_path.dirs() {
            names.extend(self.listing(&dir));
        }
        names.into_iter().collect()
    }

    fn listing(&self, dir: &Path) -> BTreeSet<String> {
        if let Some(cached) = self.listings.borrow().get(dir) {
            return cached.clone();
        }
        // Unreadable directories list as empty until the next invalidation
        let listing = scan_dir(dir).unwrap_or_default();
        self.listings
            .borrow_mut()
            .insert(dir.to_path_buf(), listing.clone());
        listing
    }

    /// Import `name`, executing its body the first time.
    ///
    /// Raises [`Failure::MissingModule`] when nothing on the search path provides it.
    pub fn import(
        self: &Rc<Self>,
        name: &str,
        ctx: &Context,
    ) -> LocalBoxFuture<'static, Result<Rc<Module>, Failure>> {
        let loader = Rc::clone(self);
        let name = name.to_string();
        let ctx = ctx.clone();

        Box::pin(async move {
            if let Some(module) = loader.loaded.borrow().get(&name) {
                return Ok(Rc::clone(module));
            }

            if let Some(namespace) = stdlib::builtin_module(&name, &loader) {
                let module = Rc::new(Module::new(&name, ModuleOrigin::Builtin, namespace));
                loader.loaded.borrow_mut().insert(name, Rc::clone(&module));
                return Ok(module);
            }

            let Some(path) = loader.find(&name) else {
                debug!(module = %name, "module not found on search path");
                return Err(Failure::missing_module(name));
            };

            loader.load_file(name, path, ctx).await
        })
    }

    async fn load_file(
        self: Rc<Self>,
        name: String,
        path: PathBuf,
        ctx: Context,
    ) -> Result<Rc<Module>, Failure> {
        debug!(module = %name, path = %path.display(), "loading module");
        // Read synchronously: an import must not suspend the statement running it
        let source = std::fs::read_to_string(&path).map_err(|e| {
            Failure::throw(
                errors::IMPORT_ERROR,
                format!("cannot read {}: {}", path.display(), e),
            )
        })?;

        let filename = path.display().to_string();
        let unit = match compile(&source, &filename, CompileMode::Exec, CompileFlags::default()) {
            Compiled::Ready(unit) => unit,
            Compiled::Incomplete => {
                return Err(Failure::throw(
                    errors::IMPORT_ERROR,
                    format!("{}: unexpected end of file", filename),
                ))
            }
            Compiled::Invalid(syntax) => {
                return Err(Failure::throw(errors::IMPORT_ERROR, syntax.to_string()))
            }
        };

        let namespace = Namespace::new();
        let module = Rc::new(Module::new(
            &name,
            ModuleOrigin::File(path),
            namespace.clone(),
        ));
        // Registered before the body runs so cyclic imports see the partial module
        self.loaded
            .borrow_mut()
            .insert(name.clone(), Rc::clone(&module));

        if let Err(failure) = run_statements(&unit.body, ctx.with_globals(namespace), false).await {
            self.loaded.borrow_mut().remove(&name);
            return Err(failure);
        }
        Ok(module)
    }
}

impl ModuleCache for ModuleLoader {
    fn invalidate_caches(&self) {
        let mut listings = self.listings.borrow_mut();
        trace!(entries = listings.len(), "invalidating module listings");
        listings.clear();
    }

    fn explore(&self, dir: &Path) -> std::io::Result<usize> {
        let listing = scan_dir(dir)?;
        let count = listing.len();
        debug!(dir = %dir.display(), modules = count, "explored module directory");
        self.listings
            .borrow_mut()
            .insert(dir.to_path_buf(), listing);
        Ok(count)
    }
}

/// Names of the modules a directory provides
fn scan_dir(dir: &Path) -> std::io::Result<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        if path.is_dir() {
            if path.join(PACKAGE_ENTRY).is_file() {
                names.insert(file_name.to_string());
            }
        } else if let Some(stem) = file_name.strip_suffix(SOURCE_SUFFIX) {
            names.insert(stem.to_string());
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_register_is_idempotent() {
        let path = SearchPath::new(vec![PathBuf::from("a")]);
        assert!(path.register("b"));
        assert!(!path.register("a"));
        assert!(!path.register("b"));
        assert_eq!(path.dirs(), vec![PathBuf::from("a"), PathBuf::from("b")]);
    }

    #[test]
    fn test_find_file_and_package_modules() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("alpha.flow"), "let a = 1\n").unwrap();
        fs::create_dir(dir.path().join("beta")).unwrap();
        fs::write(dir.path().join("beta").join("mod.flow"), "let b = 2\n").unwrap();
        fs::create_dir(dir.path().join("not_a_package")).unwrap();

        let loader = ModuleLoader::new(SearchPath::new(vec![dir.path().to_path_buf()]));

        assert_eq!(loader.find("alpha"), Some(dir.path().join("alpha.flow")));
        assert_eq!(
            loader.find("beta"),
            Some(dir.path().join("beta").join("mod.flow"))
        );
        assert_eq!(loader.find("not_a_package"), None);
    }

    #[test]
    fn test_stale_listing_until_invalidated() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ModuleLoader::new(SearchPath::new(vec![dir.path().to_path_buf()]));

        assert_eq!(loader.find("late"), None);
        fs::write(dir.path().join("late.flow"), "let x = 1\n").unwrap();
        assert_eq!(loader.find("late"), None, "listing is cached");

        loader.invalidate_caches();
        assert!(loader.find("late").is_some());
    }

    #[test]
    fn test_explore_refreshes_one_directory() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ModuleLoader::new(SearchPath::new(vec![dir.path().to_path_buf()]));
        assert_eq!(loader.find("fresh"), None);

        fs::write(dir.path().join("fresh.flow"), "").unwrap();
        assert_eq!(loader.explore(dir.path()).unwrap(), 1);
        assert!(loader.find("fresh").is_some());
    }

    #[test]
    fn test_available_includes_builtins() {
        let loader = ModuleLoader::new(SearchPath::default());
        let names = loader.available();
        assert!(names.contains(&"math".to_string()));
        assert!(names.contains(&"json".to_string()));
    }
}
