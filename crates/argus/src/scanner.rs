//! The external scanner adapter: locating and parsing package sources.
//!
//! A [`SourceSet`] maps import paths into a tree of sources: an overlay of
//! in-memory files keyed by project-relative path (the spec'd collaborator
//! shape, and what tests use), plus optional on-disk roots. Overlay
//! entries shadow disk files of the same path.

use std::{collections::BTreeMap, fs, path::PathBuf};

use argus_syntax::{ast, parse_file};

use crate::error::{ErrorKind, EvalError, Pos};

/// The sources one interpreter instance can scan.
#[derive(Debug)]
pub struct SourceSet {
    /// Import-path prefix that maps to the root of this source tree.
    module_path: String,
    /// project-relative path -> file content; shadows disk.
    overlay: BTreeMap<String, String>,
    /// Optional on-disk root the module path maps to.
    root: Option<PathBuf>,
}

/// A located, parsed package ready for member registration.
#[derive(Debug)]
pub(crate) struct ScannedPackage {
    pub name: String,
    pub files: Vec<ast::File>,
}

impl SourceSet {
    /// A source set rooted at `module_path` (e.g. `example.com/app`), with
    /// no sources yet.
    #[must_use]
    pub fn new(module_path: impl Into<String>) -> Self {
        Self {
            module_path: module_path.into(),
            overlay: BTreeMap::new(),
            root: None,
        }
    }

    /// Adds or replaces an in-memory file at a project-relative path.
    pub fn add_overlay(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.overlay.insert(path.into(), content.into());
    }

    /// Points the module path at an on-disk directory.
    pub fn set_root(&mut self, dir: impl Into<PathBuf>) {
        self.root = Some(dir.into());
    }

    /// The module path this set serves.
    #[must_use]
    pub fn module_path(&self) -> &str {
        &self.module_path
    }

    /// The project-relative directory an import path maps to, or `None`
    /// when the path is outside this module.
    fn dir_for(&self, import_path: &str) -> Option<String> {
        if import_path == self.module_path {
            return Some(String::new());
        }
        import_path
            .strip_prefix(&self.module_path)
            .and_then(|rest| rest.strip_prefix('/'))
            .map(str::to_owned)
    }

    /// Locates and parses every source file of `import_path`.
    ///
    /// Files come from the overlay first, then from disk under the root;
    /// an overlay entry shadows the disk file at the same relative path.
    /// A package with no files is a Resolution error — the caller decides
    /// whether policy allows getting here at all.
    pub(crate) fn scan(&self, import_path: &str) -> Result<ScannedPackage, EvalError> {
        let Some(dir) = self.dir_for(import_path) else {
            return Err(EvalError::new(
                ErrorKind::Resolution,
                format!("package {import_path} is outside module {}", self.module_path),
                "<scanner>",
                Pos::NONE,
            ));
        };

        let mut sources: BTreeMap<String, String> = BTreeMap::new();
        if let Some(root) = &self.root {
            let dir_path = if dir.is_empty() { root.clone() } else { root.join(&dir) };
            if let Ok(entries) = fs::read_dir(&dir_path) {
                for entry in entries.flatten() {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    if !name.ends_with(".go") || name.ends_with("_test.go") {
                        continue;
                    }
                    let rel = if dir.is_empty() { name.clone() } else { format!("{dir}/{name}") };
                    if let Ok(content) = fs::read_to_string(entry.path()) {
                        sources.insert(rel, content);
                    }
                }
            }
        }
        for (path, content) in &self.overlay {
            let in_dir = match path.rsplit_once('/') {
                Some((parent, file)) => parent == dir && file.ends_with(".go"),
                None => dir.is_empty() && path.ends_with(".go"),
            };
            if in_dir {
                sources.insert(path.clone(), content.clone());
            }
        }

        if sources.is_empty() {
            return Err(EvalError::new(
                ErrorKind::Resolution,
                format!("package {import_path} has no source files"),
                "<scanner>",
                Pos::NONE,
            ));
        }

        let mut files = Vec::with_capacity(sources.len());
        for (path, content) in &sources {
            let file = parse_file(path, content).map_err(|err| {
                EvalError::new(
                    ErrorKind::Syntax,
                    err.to_string(),
                    path.clone(),
                    err.pos().unwrap_or(Pos::NONE),
                )
            })?;
            files.push(file);
        }

        let name = files[0].package.name.clone();
        Ok(ScannedPackage { name, files })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_files_resolve_by_import_path() {
        let mut sources = SourceSet::new("example.com/app");
        sources.add_overlay("main.go", "package main\n\nfunc main() {}\n");
        sources.add_overlay("util/strings.go", "package util\n\nfunc Upper() {}\n");

        let root = sources.scan("example.com/app").unwrap();
        assert_eq!(root.name, "main");
        assert_eq!(root.files.len(), 1);

        let util = sources.scan("example.com/app/util").unwrap();
        assert_eq!(util.name, "util");
    }

    #[test]
    fn import_outside_module_is_a_resolution_error() {
        let sources = SourceSet::new("example.com/app");
        let err = sources.scan("other.org/lib").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Resolution);
    }

    #[test]
    fn package_with_no_files_is_an_error() {
        let sources = SourceSet::new("example.com/app");
        let err = sources.scan("example.com/app/missing").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Resolution);
    }
}
