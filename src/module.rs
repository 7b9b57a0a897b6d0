//! Binding-generation units: one wrapper header, the library it links, and
//! what the generator needs to know to parse it.

use crate::catalogue::{CatalogueEntry, PLATFORM_MACRO};
use crate::config::GeneratorConfig;
use crate::error::{Result, WrapError};
use crate::wrapper::{Language, WrapperHeader};
use bitflags::bitflags;
use std::collections::HashSet;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ModuleFlags: u32 {
        /// Parse as C++ (`-x c++`).
        const NEEDS_CPP = 1 << 0;
        /// Force-include `stdint.h` and `stddef.h` before the wrapper.
        const NEEDS_STD_TYPES = 1 << 1;
        /// Keep bindgen's layout tests in the output.
        const LAYOUT_TESTS = 1 << 2;
    }
}

impl Default for ModuleFlags {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleConfig {
    pub name: String,
    /// Library to link, `None` for header-only vendors.
    pub lib_name: Option<String>,
    pub wrapper: WrapperHeader,
    /// Include directories relative to `<rocm>/include`.
    pub rocm_includes: Vec<String>,
    pub extra_args: Vec<String>,
    /// Headers clang force-includes ahead of the wrapper.
    pub pre_includes: Vec<String>,
    pub allowlist_prefixes: Vec<String>,
    pub dependencies: Vec<String>,
    pub flags: ModuleFlags,
}

impl ModuleConfig {
    pub fn new(wrapper: WrapperHeader) -> Self {
        let flags = match wrapper.language() {
            Language::Cxx => ModuleFlags::NEEDS_CPP,
            Language::C => ModuleFlags::empty(),
        };
        Self {
            name: wrapper.name().to_string(),
            lib_name: None,
            wrapper,
            rocm_includes: Vec::new(),
            extra_args: Vec::new(),
            pre_includes: Vec::new(),
            allowlist_prefixes: Vec::new(),
            dependencies: Vec::new(),
            flags,
        }
    }

    /// Module for a catalogue entry, generated from `wrapper`.
    pub fn from_catalogue(entry: &CatalogueEntry, wrapper: WrapperHeader) -> Self {
        let mut module = Self::new(wrapper);
        module.name = entry.name.to_string();
        module.lib_name = entry.lib.map(str::to_string);
        module.dependencies = entry.dependencies.iter().map(|d| d.to_string()).collect();
        module.allowlist_prefixes = entry.allowlist.iter().map(|p| p.to_string()).collect();
        module.rocm_includes = entry.rocm_includes.iter().map(|r| r.to_string()).collect();
        module.pre_includes = entry.pre_includes.iter().map(|h| h.to_string()).collect();
        module.extra_args = entry.extra_args.iter().map(|a| a.to_string()).collect();
        if entry.cxx {
            module.flags |= ModuleFlags::NEEDS_CPP;
        }
        if entry.std_types {
            module.flags |= ModuleFlags::NEEDS_STD_TYPES;
        }
        module
    }

    pub fn link(mut self, lib: &str) -> Self {
        self.lib_name = Some(lib.to_string());
        self
    }

    pub fn depends_on(mut self, module: &str) -> Self {
        self.dependencies.push(module.to_string());
        self
    }

    pub fn allowlist(mut self, prefix: &str) -> Self {
        self.allowlist_prefixes.push(prefix.to_string());
        self
    }

    pub fn rocm_include(mut self, relative: &str) -> Self {
        self.rocm_includes.push(relative.to_string());
        self
    }

    pub fn clang_arg(mut self, arg: &str) -> Self {
        self.extra_args.push(arg.to_string());
        self
    }

    pub fn pre_include(mut self, header: &str) -> Self {
        self.pre_includes.push(header.to_string());
        self
    }

    pub fn with_flags(mut self, flags: ModuleFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn is_cpp(&self) -> bool {
        self.flags.contains(ModuleFlags::NEEDS_CPP) || self.wrapper.language() == Language::Cxx
    }

    /// Arguments handed to libclang for this module.
    pub fn clang_args(&self, config: &GeneratorConfig) -> Vec<String> {
        let include_dir = config.include_dir();
        let mut args = vec![
            format!("-D{}", PLATFORM_MACRO),
            format!("-I{}", include_dir.display()),
        ];

        for relative in &self.rocm_includes {
            args.push(format!("-I{}", include_dir.join(relative).display()));
        }

        if self.is_cpp() {
            args.push("-x".to_string());
            args.push("c++".to_string());
        }

        if self.flags.contains(ModuleFlags::NEEDS_STD_TYPES) {
            for header in ["stdint.h", "stddef.h"] {
                args.push("--include".to_string());
                args.push(header.to_string());
            }
        }

        for header in &self.pre_includes {
            args.push("--include".to_string());
            args.push(header.clone());
        }

        args.extend(self.extra_args.iter().cloned());
        args.extend(config.extra_clang_args.iter().cloned());
        args
    }

    /// Directories searched for the wrapper's vendor includes.
    pub fn search_dirs(&self, config: &GeneratorConfig) -> Vec<std::path::PathBuf> {
        let include_dir = config.include_dir();
        let mut dirs = vec![include_dir.clone()];
        dirs.extend(self.rocm_includes.iter().map(|r| include_dir.join(r)));
        dirs
    }
}

/// Order modules so every dependency precedes its dependents. Otherwise the
/// declaration order is kept.
pub fn sort_by_dependencies(modules: &[ModuleConfig]) -> Result<Vec<&ModuleConfig>> {
    fn visit<'m>(
        name: &str,
        modules: &'m [ModuleConfig],
        result: &mut Vec<&'m ModuleConfig>,
        visited: &mut HashSet<String>,
        visiting: &mut HashSet<String>,
    ) -> Result<()> {
        if visited.contains(name) {
            return Ok(());
        }
        if !visiting.insert(name.to_string()) {
            return Err(WrapError::CircularDependency(name.to_string()));
        }

        let module = modules
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| WrapError::UnknownModule(name.to_string()))?;
        for dep in &module.dependencies {
            visit(dep, modules, result, visited, visiting)?;
        }

        visiting.remove(name);
        visited.insert(name.to_string());
        result.push(module);
        Ok(())
    }

    let mut result = Vec::with_capacity(modules.len());
    let mut visited = HashSet::new();
    let mut visiting = HashSet::new();
    for module in modules {
        visit(&module.name, modules, &mut result, &mut visited, &mut visiting)?;
    }
    Ok(result)
}

/// `mod.rs` placed next to a module's generated `bindings.rs`.
pub fn render_module_index(module: &ModuleConfig) -> String {
    let mut content = format!(
        "//! Bindings for {}\n//! Generated by rocwrap - do not modify\n\npub mod bindings;\n\npub use bindings::*;\n",
        module.name
    );
    if !module.dependencies.is_empty() {
        content.push('\n');
        for dep in &module.dependencies {
            content.push_str(&format!("pub use super::{}::*;\n", dep));
        }
    }
    content
}
