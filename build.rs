fn main() {
    for var in ["ROCM_PATH", "SKIP_BINDGEN", "ROCWRAP_EXTRA_CLANG_ARGS"] {
        println!("cargo:rerun-if-env-changed={}", var);
    }
    println!("cargo:rerun-if-changed=src/catalogue.rs");

    #[cfg(feature = "vendor-bindings")]
    vendor::generate();
}

#[cfg(feature = "vendor-bindings")]
#[allow(dead_code)]
mod catalogue {
    include!("src/catalogue.rs");
}

/// Raw bindings for the shipped wrappers in `include/`. The wrappers already
/// carry the platform macro and the parser shims; the module table is the
/// library's own catalogue.
#[cfg(feature = "vendor-bindings")]
mod vendor {
    use crate::catalogue::{
        self, BLOCKED_FILES, DEFAULT_ROCM_PATH, EXTRA_CLANG_ARGS_VAR, FP_CONSTANTS, MODULES,
        OPAQUE_TYPES, ROCM_PATH_VAR, SKIP_BINDGEN_VAR, SYSTEM_ITEMS,
    };
    use std::env;
    use std::fs;
    use std::path::PathBuf;

    pub fn generate() {
        let out_path = PathBuf::from(env::var("OUT_DIR").unwrap());

        if env::var(SKIP_BINDGEN_VAR).is_ok() {
            println!("cargo:warning=Skipping bindgen as SKIP_BINDGEN is set");
            for module in MODULES {
                fs::write(out_path.join(format!("{}.rs", module.name)), "")
                    .expect("Couldn't write empty bindings");
            }
            return;
        }

        let rocm_path = env::var(ROCM_PATH_VAR)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ROCM_PATH));
        let extra_args = env::var(EXTRA_CLANG_ARGS_VAR)
            .map(|v| catalogue::split_clang_args(&v))
            .unwrap_or_default();
        let include_dir = rocm_path.join("include");
        println!("cargo:rustc-link-search=native={}", rocm_path.join("lib").display());

        let mut generated: Vec<&str> = Vec::with_capacity(MODULES.len());
        for module in MODULES {
            if let Some(dep) = module.dependencies.iter().find(|&&d| !generated.contains(&d)) {
                panic!("module {} is listed before its dependency {}", module.name, dep);
            }

            let header = format!("include/{}.h", module.name);
            println!("cargo:rerun-if-changed={}", header);
            if let Some(lib) = module.lib {
                println!("cargo:rustc-link-lib={}", lib);
            }

            let mut builder = bindgen::Builder::default()
                .header(header)
                .clang_args(catalogue::clang_args(module, &include_dir, &extra_args))
                .parse_callbacks(Box::new(bindgen::CargoCallbacks::new()))
                .derive_default(true)
                .layout_tests(false);

            for file in BLOCKED_FILES {
                builder = builder.blocklist_file(*file);
            }
            for ty in OPAQUE_TYPES {
                builder = builder.opaque_type(*ty);
            }
            for item in SYSTEM_ITEMS {
                builder = builder.blocklist_item(*item);
            }
            // math.h constants stay in the first module only
            if !generated.is_empty() {
                for item in FP_CONSTANTS {
                    builder = builder.blocklist_item(*item);
                }
            }

            for prefix in module.allowlist {
                let pattern = format!("{}.*", prefix);
                builder = builder
                    .allowlist_function(&pattern)
                    .allowlist_type(&pattern)
                    .allowlist_var(&pattern);
            }

            let bindings = builder
                .generate()
                .unwrap_or_else(|e| panic!("Unable to generate bindings for {}: {}", module.name, e));

            bindings
                .write_to_file(out_path.join(format!("{}.rs", module.name)))
                .unwrap_or_else(|e| panic!("Couldn't write bindings for {}: {}", module.name, e));

            generated.push(module.name);
        }
    }
}
