//! Per-file import state.

use indexmap::IndexMap;

use argus_syntax::ast;

/// Import aliasing and dot-imports for one source file (or, for a loaded
/// package, the union over its files). Immutable after construction.
#[derive(Debug, Default)]
pub(crate) struct FileScope {
    /// local name -> import path.
    aliases: IndexMap<String, String>,
    /// Import paths whose exported names are visible unqualified, in
    /// import order.
    dot_imports: Vec<String>,
}

impl FileScope {
    /// Builds the unified scope over a package's parsed files.
    ///
    /// Later files never override an alias introduced earlier; dot imports
    /// keep first-seen order, deduplicated.
    pub fn from_files(files: &[ast::File]) -> Self {
        let mut scope = Self::default();
        for file in files {
            for import in &file.imports {
                if import.is_dot() {
                    if !scope.dot_imports.contains(&import.path) {
                        scope.dot_imports.push(import.path.clone());
                    }
                } else if let Some(local) = import.local_name() {
                    scope.aliases.entry(local.to_owned()).or_insert_with(|| import.path.clone());
                }
            }
        }
        scope
    }

    /// The import path a bare identifier aliases, if any.
    pub fn alias_path(&self, name: &str) -> Option<&str> {
        self.aliases.get(name).map(String::as_str)
    }

    /// Dot-imported paths in import order.
    pub fn dot_imports(&self) -> &[String] {
        &self.dot_imports
    }
}

#[cfg(test)]
mod tests {
    use argus_syntax::parse_file;

    use super::*;

    #[test]
    fn aliases_and_dot_imports_collected_across_files() {
        let a = parse_file("a.go", "package p\n\nimport (\n\t\"fmt\"\n\tex \"example.com/x\"\n)\n").unwrap();
        let b = parse_file("b.go", "package p\n\nimport . \"strings\"\n").unwrap();
        let scope = FileScope::from_files(&[a, b]);
        assert_eq!(scope.alias_path("fmt"), Some("fmt"));
        assert_eq!(scope.alias_path("ex"), Some("example.com/x"));
        assert_eq!(scope.dot_imports(), ["strings"]);
    }

    #[test]
    fn blank_imports_bind_no_name() {
        let f = parse_file("a.go", "package p\n\nimport _ \"example.com/side\"\n").unwrap();
        let scope = FileScope::from_files(&[f]);
        assert_eq!(scope.alias_path("side"), None);
        assert_eq!(scope.alias_path("_"), None);
    }
}
