//! Runs bindgen over rendered wrappers, one module at a time.

use crate::catalogue::{BLOCKED_FILES, FP_CONSTANTS, OPAQUE_TYPES, SYSTEM_ITEMS};
use crate::config::GeneratorConfig;
use crate::diagnostic::classify_failure;
use crate::error::{Result, WrapError};
use crate::module::{ModuleConfig, ModuleFlags, render_module_index, sort_by_dependencies};
use bindgen::{BindgenError, CargoCallbacks};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedModule {
    pub name: String,
    pub wrapper: PathBuf,
    pub bindings: PathBuf,
    pub index: PathBuf,
}

pub struct BindingGenerator {
    config: GeneratorConfig,
    modules: Vec<ModuleConfig>,
    cargo_directives: bool,
}

impl BindingGenerator {
    pub fn new(config: GeneratorConfig, modules: Vec<ModuleConfig>) -> Self {
        Self {
            config,
            modules,
            cargo_directives: false,
        }
    }

    /// Print `cargo:` link and rerun directives. Only meaningful from a
    /// build script.
    pub fn cargo_directives(mut self, enabled: bool) -> Self {
        self.cargo_directives = enabled;
        self
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn generate_all(&self) -> Result<Vec<GeneratedModule>> {
        if self.config.skip_bindgen {
            warn!("SKIP_BINDGEN is set, not generating bindings");
            if self.cargo_directives {
                println!("cargo:warning=Skipping bindgen as SKIP_BINDGEN is set");
            }
            return Ok(Vec::new());
        }

        let out_dir = self.config.out_dir()?.clone();
        let sorted = sort_by_dependencies(&self.modules)?;

        if self.cargo_directives {
            println!("cargo:rustc-link-search=native={}", self.config.lib_dir().display());
        }

        let mut generated = Vec::with_capacity(sorted.len());
        for (index, module) in sorted.into_iter().enumerate() {
            generated.push(self.generate_module(module, &out_dir, index == 0)?);
        }
        Ok(generated)
    }

    fn generate_module(
        &self,
        module: &ModuleConfig,
        out_dir: &Path,
        preserve_fp_constants: bool,
    ) -> Result<GeneratedModule> {
        let _span = tracing::info_span!("module", name = %module.name).entered();

        let include_dir = out_dir.join("include");
        let wrapper = module.wrapper.write_to(&include_dir)?;
        module
            .wrapper
            .resolve_includes(&module.search_dirs(&self.config), &[include_dir])?;

        if self.cargo_directives {
            if let Some(lib) = &module.lib_name {
                println!("cargo:rustc-link-lib={}", lib);
            }
            println!("cargo:rerun-if-changed={}", wrapper.display());
        }

        let bindings = self
            .builder_for(module, &wrapper, preserve_fp_constants)
            .generate()
            .map_err(|e| {
                let err = bindgen_failure(&module.name, e)
                    .with_context(&wrapper.display().to_string());
                if err.is_shimmable() {
                    warn!(error = %err, "parser stopped on an unshimmed symbol");
                }
                err
            })?;

        let module_dir = out_dir.join(&module.name);
        fs::create_dir_all(&module_dir)?;
        let bindings_path = module_dir.join("bindings.rs");
        bindings.write_to_file(&bindings_path)?;
        let index_path = module_dir.join("mod.rs");
        fs::write(&index_path, render_module_index(module))?;

        info!(path = %bindings_path.display(), "generated bindings");
        Ok(GeneratedModule {
            name: module.name.clone(),
            wrapper,
            bindings: bindings_path,
            index: index_path,
        })
    }

    /// The bindgen invocation for one module.
    pub fn builder_for(
        &self,
        module: &ModuleConfig,
        header: &Path,
        preserve_fp_constants: bool,
    ) -> bindgen::Builder {
        let clang_args = module.clang_args(&self.config);
        debug!(?clang_args, "configuring bindgen");

        let mut builder = bindgen::Builder::default()
            .header(header.display().to_string())
            .derive_default(true)
            .layout_tests(module.flags.contains(ModuleFlags::LAYOUT_TESTS))
            .clang_args(clang_args);

        for file in BLOCKED_FILES {
            builder = builder.blocklist_file(*file);
        }
        for ty in OPAQUE_TYPES {
            builder = builder.opaque_type(*ty);
        }

        for prefix in &module.allowlist_prefixes {
            let pattern = format!("{}.*", prefix);
            builder = builder
                .allowlist_function(&pattern)
                .allowlist_type(&pattern)
                .allowlist_var(&pattern);
        }

        for item in SYSTEM_ITEMS {
            builder = builder.blocklist_item(*item);
        }

        if !preserve_fp_constants {
            for item in FP_CONSTANTS {
                builder = builder.blocklist_item(*item);
            }
        }

        if self.cargo_directives {
            builder = builder.parse_callbacks(Box::new(CargoCallbacks::new()));
        }

        builder
    }
}

fn bindgen_failure(module: &str, error: BindgenError) -> WrapError {
    match error {
        BindgenError::ClangDiagnostic(output) => classify_failure(module, &output),
        BindgenError::NotExist(path) => WrapError::MissingVendorHeader {
            header: path.display().to_string(),
            searched: Vec::new(),
        },
        other => WrapError::Generation {
            module: module.to_string(),
            message: other.to_string(),
        },
    }
}
