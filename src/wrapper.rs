//! Wrapper headers handed to the binding generator.
//!
//! A wrapper is rendered in a fixed section order: platform macros, parser
//! shims, forward declarations, vendor includes. Everything an include
//! requires therefore textually precedes it.

use crate::error::{Result, WrapError, check_identifier};
use crate::macros::{Guard, MacroDef, MacroTable, has_builtin_fallback, has_builtin_fallback_end};
use crate::shim::{MacroRole, Shim, ShimSet};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    C,
    Cxx,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderRef {
    /// `#include <path>`
    System(String),
    /// `#include "path"`
    Local(String),
}

impl HeaderRef {
    pub fn path(&self) -> &str {
        match self {
            Self::System(p) | Self::Local(p) => p,
        }
    }

    pub fn directive(&self) -> String {
        match self {
            Self::System(p) => format!("#include <{}>", p),
            Self::Local(p) => format!("#include \"{}\"", p),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Include {
    header: HeaderRef,
    requires: Vec<String>,
}

impl Include {
    pub fn header(&self) -> &HeaderRef {
        &self.header
    }

    /// Macros or namespaces that must be declared before this include.
    pub fn requires(&self) -> &[String] {
        &self.requires
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardDecl {
    Namespace(String),
}

impl ForwardDecl {
    pub fn name(&self) -> &str {
        match self {
            Self::Namespace(n) => n,
        }
    }

    pub fn render(&self) -> String {
        match self {
            Self::Namespace(n) => format!("namespace {} {{}}", n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapperHeader {
    name: String,
    include_guard: String,
    description: Vec<String>,
    language: Language,
    platform: Vec<MacroDef>,
    shims: ShimSet,
    forward_decls: Vec<ForwardDecl>,
    includes: Vec<Include>,
}

impl WrapperHeader {
    pub fn builder(name: impl Into<String>) -> WrapperBuilder {
        WrapperBuilder::new(name.into())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_name(&self) -> String {
        format!("{}.h", self.name)
    }

    pub fn include_guard(&self) -> &str {
        &self.include_guard
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn platform_macros(&self) -> &[MacroDef] {
        &self.platform
    }

    pub fn shims(&self) -> &ShimSet {
        &self.shims
    }

    pub fn forward_decls(&self) -> &[ForwardDecl] {
        &self.forward_decls
    }

    pub fn includes(&self) -> &[Include] {
        &self.includes
    }

    /// Every injected macro with the reason it is there.
    pub fn macros(&self) -> impl Iterator<Item = (MacroRole, &MacroDef)> {
        self.platform
            .iter()
            .map(|def| (MacroRole::Platform, def))
            .chain(self.shims.iter().map(|s| (s.role(), s.def())))
    }

    /// Macro table this wrapper contributes to a translation unit.
    pub fn macro_table(&self) -> Result<MacroTable> {
        let mut table = MacroTable::new();
        for (_, def) in self.macros() {
            table.define(def.clone())?;
        }
        Ok(table)
    }

    pub fn render(&self) -> String {
        let mut sections = Vec::new();

        if !self.platform.is_empty() {
            let mut section = String::from("// Platform macros\n");
            for def in &self.platform {
                section.push_str(&def.render());
            }
            sections.push(section);
        }

        if !self.shims.is_empty() {
            let mut section = String::from("// Parser shims\n");
            let builtins = self.shims.has_builtin_shims();
            if builtins {
                section.push_str(&has_builtin_fallback());
            }
            for shim in &self.shims {
                section.push_str(&shim.def().render());
            }
            if builtins {
                section.push_str(&has_builtin_fallback_end());
            }
            sections.push(section);
        }

        if !self.forward_decls.is_empty() {
            let mut section = String::from("// Forward declarations\n");
            for decl in &self.forward_decls {
                section.push_str(&decl.render());
                section.push('\n');
            }
            sections.push(section);
        }

        if !self.includes.is_empty() {
            let mut section = String::from("// Vendor headers\n");
            for include in &self.includes {
                section.push_str(&include.header.directive());
                section.push('\n');
            }
            sections.push(section);
        }

        let mut out = format!(
            "// Generated by rocwrap from the `{}` wrapper definition. Do not edit.\n",
            self.name
        );
        for line in &self.description {
            out.push_str(&format!("// {}\n", line));
        }
        out.push('\n');
        out.push_str(&format!("#ifndef {0}\n#define {0}\n", self.include_guard));
        for section in sections {
            out.push('\n');
            out.push_str(&section);
        }
        out.push('\n');
        out.push_str(&format!("#endif // {}\n", self.include_guard));
        out
    }

    /// Write `<name>.h` into `dir`, leaving an identical file untouched.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        let rendered = self.render();

        if fs::read(&path).is_ok_and(|current| current == rendered.as_bytes()) {
            tracing::debug!(path = %path.display(), "wrapper unchanged");
            return Ok(path);
        }

        fs::write(&path, rendered)?;
        tracing::debug!(path = %path.display(), "wrapper written");
        Ok(path)
    }

    /// Locate every include on disk. Local includes are looked up in
    /// `local_dirs` first, then in `search_dirs`.
    pub fn resolve_includes(
        &self,
        search_dirs: &[PathBuf],
        local_dirs: &[PathBuf],
    ) -> Result<Vec<PathBuf>> {
        self.includes
            .iter()
            .map(|include| {
                let candidates: Vec<PathBuf> = match &include.header {
                    HeaderRef::System(_) => search_dirs.to_vec(),
                    HeaderRef::Local(_) => {
                        local_dirs.iter().chain(search_dirs).cloned().collect()
                    }
                };
                let path = include.header.path();
                candidates
                    .iter()
                    .map(|dir| dir.join(path))
                    .find(|p| p.is_file())
                    .ok_or_else(|| WrapError::MissingVendorHeader {
                        header: path.to_string(),
                        searched: candidates.clone(),
                    })
            })
            .collect()
    }
}

pub fn default_include_guard(name: &str) -> String {
    let upper: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("ROCWRAP_{}_H", upper)
}

pub struct WrapperBuilder {
    name: String,
    include_guard: Option<String>,
    description: Vec<String>,
    language: Language,
    platform: Vec<MacroDef>,
    shims: Vec<Shim>,
    forward_decls: Vec<ForwardDecl>,
    includes: Vec<Include>,
    error: Option<WrapError>,
}

impl WrapperBuilder {
    fn new(name: String) -> Self {
        Self {
            name,
            include_guard: None,
            description: Vec::new(),
            language: Language::C,
            platform: Vec::new(),
            shims: Vec::new(),
            forward_decls: Vec::new(),
            includes: Vec::new(),
            error: None,
        }
    }

    fn record<T>(&mut self, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.error.get_or_insert(err);
                None
            }
        }
    }

    pub fn include_guard(mut self, guard: impl Into<String>) -> Self {
        self.include_guard = Some(guard.into());
        self
    }

    pub fn description(mut self, line: impl Into<String>) -> Self {
        self.description.push(line.into());
        self
    }

    pub fn language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn platform_macro(mut self, name: &str, value: impl ToString) -> Self {
        let def = MacroDef::object(name, value.to_string());
        if let Some(def) = self.record(def) {
            self.platform.push(def.with_guard(Guard::IfUndefined));
        }
        self
    }

    pub fn shim(mut self, shim: Result<Shim>) -> Self {
        if let Some(shim) = self.record(shim) {
            self.shims.push(shim);
        }
        self
    }

    pub fn shims(mut self, set: &ShimSet) -> Self {
        self.shims.extend(set.iter().cloned());
        self
    }

    pub fn forward_namespace(mut self, name: &str) -> Self {
        if self.record(check_identifier(name)).is_some() {
            self.forward_decls.push(ForwardDecl::Namespace(name.to_string()));
        }
        self
    }

    pub fn include_system(self, path: &str) -> Self {
        self.include(HeaderRef::System(path.to_string()), &[])
    }

    pub fn include_local(self, path: &str) -> Self {
        self.include(HeaderRef::Local(path.to_string()), &[])
    }

    pub fn include(mut self, header: HeaderRef, requires: &[&str]) -> Self {
        self.includes.push(Include {
            header,
            requires: requires.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    pub fn build(self) -> Result<WrapperHeader> {
        if let Some(err) = self.error {
            return Err(err);
        }

        check_identifier(&self.name.replace('-', "_"))?;
        let include_guard = self
            .include_guard
            .unwrap_or_else(|| default_include_guard(&self.name));
        check_identifier(&include_guard)?;

        // platform macros and shims share one namespace
        let mut table = MacroTable::new();
        let mut platform = Vec::new();
        for def in self.platform {
            if table.define(def.clone())? == crate::macros::Defined::Inserted {
                platform.push(def);
            }
        }
        let mut shims = ShimSet::new();
        for shim in self.shims {
            table.define(shim.def().clone())?;
            shims.insert(shim)?;
        }

        if self.language == Language::C && !self.forward_decls.is_empty() {
            return Err(WrapError::InvalidConfig(format!(
                "wrapper {} declares namespaces but is not C++",
                self.name
            )));
        }

        for (i, include) in self.includes.iter().enumerate() {
            if self.includes[..i].iter().any(|prev| prev.header == include.header) {
                return Err(WrapError::DuplicateInclude(include.header.path().to_string()));
            }
            for symbol in &include.requires {
                let declared = table.contains(symbol)
                    || self.forward_decls.iter().any(|d| d.name() == symbol);
                if !declared {
                    return Err(WrapError::OrderingViolation {
                        header: include.header.path().to_string(),
                        symbol: symbol.clone(),
                    });
                }
            }
        }

        Ok(WrapperHeader {
            name: self.name,
            include_guard,
            description: self.description,
            language: self.language,
            platform,
            shims,
            forward_decls: self.forward_decls,
            includes: self.includes,
        })
    }
}

/// Several wrappers included into one translation unit.
#[derive(Debug, Clone, Default)]
pub struct Composition {
    wrappers: Vec<WrapperHeader>,
    table: MacroTable,
}

impl Composition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a wrapper. Shared macros must carry identical definitions.
    pub fn push(&mut self, wrapper: WrapperHeader) -> Result<()> {
        if self.wrappers.iter().any(|w| w.include_guard == wrapper.include_guard) {
            return Err(WrapError::InvalidConfig(format!(
                "include guard {} used twice",
                wrapper.include_guard
            )));
        }
        let mut table = self.table.clone();
        for (_, def) in wrapper.macros() {
            table.define(def.clone())?;
        }
        self.table = table;
        self.wrappers.push(wrapper);
        Ok(())
    }

    pub fn wrappers(&self) -> &[WrapperHeader] {
        &self.wrappers
    }

    pub fn macro_table(&self) -> &MacroTable {
        &self.table
    }

    pub fn language(&self) -> Language {
        if self.wrappers.iter().any(|w| w.language == Language::Cxx) {
            Language::Cxx
        } else {
            Language::C
        }
    }

    /// The translation unit as the preprocessor sees it.
    pub fn render(&self) -> String {
        self.wrappers
            .iter()
            .map(WrapperHeader::render)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
