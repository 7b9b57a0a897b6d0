// Module catalogue and generator settings shared by the library and the
// build script. build.rs pulls this file in with `include!`, so it may only
// use std.

/// One binding-generation unit. The wrapper is `include/<name>.h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogueEntry {
    pub name: &'static str,
    /// Library to link, `None` for header-only vendors.
    pub lib: Option<&'static str>,
    /// Modules generated before this one. The catalogue lists them earlier.
    pub dependencies: &'static [&'static str],
    pub allowlist: &'static [&'static str],
    /// Include directories relative to `<rocm>/include`.
    pub rocm_includes: &'static [&'static str],
    pub cxx: bool,
    /// Force-include `stdint.h` and `stddef.h`.
    pub std_types: bool,
    pub pre_includes: &'static [&'static str],
    pub extra_args: &'static [&'static str],
}

const LIBRARY: CatalogueEntry = CatalogueEntry {
    name: "",
    lib: None,
    dependencies: &["hip"],
    allowlist: &[],
    rocm_includes: &[],
    cxx: true,
    std_types: false,
    pre_includes: &[],
    extra_args: &[],
};

/// Every shipped module, dependencies first.
pub const MODULES: &[CatalogueEntry] = &[
    CatalogueEntry {
        name: "hip",
        lib: Some("amdhip64"),
        dependencies: &[],
        allowlist: &["hip", "HIP", "cuda"],
        ..LIBRARY
    },
    CatalogueEntry {
        name: "rocblas",
        lib: Some("rocblas"),
        allowlist: &["rocblas_"],
        ..LIBRARY
    },
    CatalogueEntry {
        name: "rocsolver",
        lib: Some("rocsolver"),
        dependencies: &["hip", "rocblas"],
        allowlist: &["rocsolver_"],
        ..LIBRARY
    },
    CatalogueEntry {
        name: "rocfft",
        lib: Some("rocfft"),
        allowlist: &["rocfft_"],
        ..LIBRARY
    },
    CatalogueEntry {
        name: "rocsparse",
        lib: Some("rocsparse"),
        allowlist: &["rocsparse_"],
        rocm_includes: &["rocsparse/internal"],
        std_types: true,
        ..LIBRARY
    },
    CatalogueEntry {
        name: "miopen",
        lib: Some("MIOpen"),
        allowlist: &["miopen", "MIOPEN"],
        std_types: true,
        ..LIBRARY
    },
    CatalogueEntry {
        name: "rocrand",
        lib: Some("rocrand"),
        allowlist: &["rocrand_"],
        ..LIBRARY
    },
    CatalogueEntry {
        name: "rocprofiler",
        lib: Some("rocprofiler64"),
        allowlist: &["rocprofiler", "ROCPROFILER", "activity_"],
        rocm_includes: &["rocprofiler"],
        std_types: true,
        ..LIBRARY
    },
    CatalogueEntry {
        name: "rocwmma",
        allowlist: &["rocwmma"],
        pre_includes: &["string", "type_traits"],
        extra_args: &["-std=c++17"],
        ..LIBRARY
    },
];

pub const DEFAULT_ROCM_PATH: &str = "/opt/rocm";
pub const ROCM_PATH_VAR: &str = "ROCM_PATH";
pub const SKIP_BINDGEN_VAR: &str = "SKIP_BINDGEN";
pub const EXTRA_CLANG_ARGS_VAR: &str = "ROCWRAP_EXTRA_CLANG_ARGS";

pub const PLATFORM_MACRO: &str = "__HIP_PLATFORM_AMD__";

pub const BLOCKED_FILES: &[&str] = &[".*stdlib.h", ".*stdio.h", "stdint.h", "stddef.h"];

pub const OPAQUE_TYPES: &[&str] = &["_Value"];

/// libc and libstdc++ internals that leak through the vendor headers.
pub const SYSTEM_ITEMS: &[&str] = &[
    "_GLIBCXX_.*",
    "_FEATURES_H",
    "__GLIBC.*",
    "__USE_.*",
    "_STDC_PREDEF_H",
    "__STDC_.*",
    "__gnu_cxx::.*",
    "_Value",
];

/// Floating-point classification constants from `math.h`. Only the first
/// generated module keeps them.
pub const FP_CONSTANTS: &[&str] = &[
    "FP_INT_UPWARD",
    "FP_INT_DOWNWARD",
    "FP_INT_TOWARDZERO",
    "FP_INT_TONEARESTFROMZERO",
    "FP_INT_TONEAREST",
    "FP_NAN",
    "FP_INFINITE",
    "FP_ZERO",
    "FP_SUBNORMAL",
    "FP_NORMAL",
];

/// `ROCWRAP_EXTRA_CLANG_ARGS` is whitespace separated.
pub fn split_clang_args(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

/// Arguments handed to libclang for `entry`.
pub fn clang_args(
    entry: &CatalogueEntry,
    include_dir: &std::path::Path,
    extra: &[String],
) -> Vec<String> {
    let mut args = vec![
        format!("-D{}", PLATFORM_MACRO),
        format!("-I{}", include_dir.display()),
    ];
    for relative in entry.rocm_includes {
        args.push(format!("-I{}", include_dir.join(relative).display()));
    }
    if entry.cxx {
        args.push("-x".to_string());
        args.push("c++".to_string());
    }
    if entry.std_types {
        for header in ["stdint.h", "stddef.h"] {
            args.push("--include".to_string());
            args.push(header.to_string());
        }
    }
    for header in entry.pre_includes {
        args.push("--include".to_string());
        args.push(header.to_string());
    }
    args.extend(entry.extra_args.iter().map(|a| a.to_string()));
    args.extend(extra.iter().cloned());
    args
}
