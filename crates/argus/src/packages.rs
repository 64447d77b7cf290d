//! Lazily loaded packages and the process-wide cache.
//!
//! A [`Package`] starts empty: the cache hands out the descriptor on first
//! mention of an import path, and the evaluator fills its member
//! environment only when the scan policy allows a deep scan. Loading is
//! monotone — once `loaded` flips, lookups consult the populated
//! environment and nothing ever unloads.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use ahash::AHashMap;

use crate::{env::Env, scope::FileScope};

/// One package, possibly not yet scanned.
#[derive(Debug)]
pub(crate) struct Package {
    pub import_path: String,
    /// The declared package name, filled at load time; defaults to the
    /// last path segment so diagnostics stay readable for shallow
    /// packages.
    pub name: RefCell<String>,
    /// Top-level members (types, functions, constants, variables). Empty
    /// until loaded.
    pub env: Env,
    /// Unified import scope over the package's files, set at load time.
    pub file_scope: RefCell<Option<Rc<FileScope>>>,
    pub loaded: Cell<bool>,
}

impl Package {
    fn new(import_path: &str) -> Self {
        let simple = import_path.rsplit('/').next().unwrap_or(import_path);
        Self {
            import_path: import_path.to_owned(),
            name: RefCell::new(simple.to_owned()),
            env: Env::new(),
            loaded: Cell::new(false),
            file_scope: RefCell::new(None),
        }
    }
}

/// Map of import path -> package, shared by every frame of one evaluator.
#[derive(Debug, Default)]
pub(crate) struct PackageCache {
    packages: RefCell<AHashMap<String, Rc<Package>>>,
}

impl PackageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetches the package for `import_path`, creating the empty
    /// descriptor on first touch.
    pub fn get_or_create(&self, import_path: &str) -> Rc<Package> {
        let mut packages = self.packages.borrow_mut();
        if let Some(pkg) = packages.get(import_path) {
            return Rc::clone(pkg);
        }
        let pkg = Rc::new(Package::new(import_path));
        packages.insert(import_path.to_owned(), Rc::clone(&pkg));
        pkg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_touch_creates_an_empty_package() {
        let cache = PackageCache::new();
        let pkg = cache.get_or_create("example.com/util");
        assert!(!pkg.loaded.get());
        assert_eq!(*pkg.name.borrow(), "util");
        assert!(pkg.env.get_all().is_empty());
    }

    #[test]
    fn repeated_queries_share_one_descriptor() {
        let cache = PackageCache::new();
        let a = cache.get_or_create("example.com/util");
        let b = cache.get_or_create("example.com/util");
        assert!(Rc::ptr_eq(&a, &b));
    }
}
