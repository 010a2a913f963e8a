//! Import discovery visitor that finds every import statement in a Python module,
//! including those nested within functions, classes, conditionals and `try` blocks.

use ruff_python_ast::visitor::{Visitor, walk_stmt};
use ruff_python_ast::{ModModule, Stmt, StmtImport, StmtImportFrom};

/// An import discovered during AST traversal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredImport {
    /// Dotted module path as written; `None` for `from . import x`
    pub module_name: Option<String>,
    /// Number of leading dots; zero for absolute imports
    pub level: u32,
    /// Names of the enclosing functions and classes, outermost first
    pub scope: Vec<String>,
}

impl DiscoveredImport {
    /// First component of the module path as written, leading dots aside.
    ///
    /// `from .models import User` yields `models`; only `from . import x` has no root.
    pub fn root_module(&self) -> Option<&str> {
        self.module_name
            .as_deref()
            .and_then(|name| name.split('.').next())
            .filter(|root| !root.is_empty())
    }
}

/// Visitor that discovers all imports in a Python module
#[derive(Debug, Default)]
pub struct ImportDiscoveryVisitor {
    imports: Vec<DiscoveredImport>,
    scope_stack: Vec<String>,
}

impl ImportDiscoveryVisitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_imports(self) -> Vec<DiscoveredImport> {
        self.imports
    }

    /// Visit a module and discover all imports
    pub fn visit_module(&mut self, module: &ModModule) {
        for stmt in &module.body {
            self.visit_stmt(stmt);
        }
    }

    fn record_import(&mut self, stmt: &StmtImport) {
        for alias in &stmt.names {
            self.imports.push(DiscoveredImport {
                module_name: Some(alias.name.to_string()),
                level: 0,
                scope: self.scope_stack.clone(),
            });
        }
    }

    fn record_import_from(&mut self, stmt: &StmtImportFrom) {
        self.imports.push(DiscoveredImport {
            module_name: stmt.module.as_ref().map(ToString::to_string),
            level: stmt.level,
            scope: self.scope_stack.clone(),
        });
    }
}

impl<'a> Visitor<'a> for ImportDiscoveryVisitor {
    fn visit_stmt(&mut self, stmt: &'a Stmt) {
        match stmt {
            Stmt::Import(import_stmt) => self.record_import(import_stmt),
            Stmt::ImportFrom(import_from) => self.record_import_from(import_from),
            Stmt::FunctionDef(func) => {
                self.scope_stack.push(func.name.to_string());
                walk_stmt(self, stmt);
                self.scope_stack.pop();
            }
            Stmt::ClassDef(class) => {
                self.scope_stack.push(class.name.to_string());
                walk_stmt(self, stmt);
                self.scope_stack.pop();
            }
            _ => walk_stmt(self, stmt),
        }
    }
}
