//! The ROCm wrappers this crate ships and the modules that generate
//! bindings from them.
//!
//! The headers under `include/` are these definitions rendered; a test keeps
//! the two in sync.

use crate::catalogue::{MODULES, PLATFORM_MACRO as PLATFORM};
use crate::error::{Result, WrapError};
use crate::module::ModuleConfig;
use crate::shim::ShimSet;
use crate::wrapper::{HeaderRef, Language, WrapperHeader};

fn system(path: &str) -> HeaderRef {
    HeaderRef::System(path.to_string())
}

/// A library whose public header only needs the platform macro.
fn library(name: &str, description: &str, header: &str) -> Result<WrapperHeader> {
    WrapperHeader::builder(name)
        .description(description)
        .language(Language::Cxx)
        .platform_macro(PLATFORM, 1)
        .include(system(header), &[PLATFORM])
        .build()
}

pub fn hip() -> Result<WrapperHeader> {
    library(
        "hip",
        "HIP runtime API, the base the other ROCm wrappers build on.",
        "hip/hip_runtime_api.h",
    )
}

pub fn rocblas() -> Result<WrapperHeader> {
    library("rocblas", "rocBLAS dense linear algebra.", "rocblas/rocblas.h")
}

pub fn rocsolver() -> Result<WrapperHeader> {
    library(
        "rocsolver",
        "rocSOLVER LAPACK routines, built on rocBLAS.",
        "rocsolver/rocsolver.h",
    )
}

pub fn rocfft() -> Result<WrapperHeader> {
    library("rocfft", "rocFFT fast Fourier transforms.", "rocfft/rocfft.h")
}

pub fn rocsparse() -> Result<WrapperHeader> {
    library("rocsparse", "rocSPARSE sparse linear algebra.", "rocsparse/rocsparse.h")
}

pub fn miopen() -> Result<WrapperHeader> {
    library("miopen", "MIOpen deep learning primitives.", "miopen/miopen.h")
}

pub fn rocrand() -> Result<WrapperHeader> {
    library("rocrand", "rocRAND random number generation.", "rocrand/rocrand.h")
}

/// rocprofiler plus the local `activity.h`, which rocprofiler installs next
/// to its main header.
pub fn rocprofiler() -> Result<WrapperHeader> {
    WrapperHeader::builder("rocprofiler")
        .description("ROCm profiler API and the activity records it reports.")
        .language(Language::Cxx)
        .platform_macro(PLATFORM, 1)
        .include(system("rocprofiler/rocprofiler.h"), &[PLATFORM])
        .include_local("activity.h")
        .build()
}

pub fn rocwmma() -> Result<WrapperHeader> {
    let shims = ShimSet::amdgcn();
    let device_helpers: Vec<&str> = shims.iter().map(|s| s.name()).collect();

    let mut rocwmma_requires = vec!["__hip_internal"];
    rocwmma_requires.extend(&device_helpers);

    WrapperHeader::builder("rocwmma")
        .description("rocWMMA matrix-multiply intrinsics. The AMDGCN builtins and wavefront size")
        .description("are stubbed so the host-side parser gets through the device helpers.")
        .language(Language::Cxx)
        .platform_macro(PLATFORM, 1)
        .shims(&shims)
        .forward_namespace("__hip_internal")
        .include(system("hip/hip_runtime_api.h"), &[PLATFORM])
        .include_system("rocwmma/rocwmma-version.hpp")
        .include(system("rocwmma/rocwmma_transforms.hpp"), &["__hip_internal"])
        .include(system("rocwmma/rocwmma.hpp"), &rocwmma_requires)
        .include_system("rocwmma/rocwmma_coop.hpp")
        .build()
}

/// The wrapper shipped for catalogue module `name`.
pub fn wrapper(name: &str) -> Result<WrapperHeader> {
    match name {
        "hip" => hip(),
        "rocblas" => rocblas(),
        "rocsolver" => rocsolver(),
        "rocfft" => rocfft(),
        "rocsparse" => rocsparse(),
        "miopen" => miopen(),
        "rocrand" => rocrand(),
        "rocprofiler" => rocprofiler(),
        "rocwmma" => rocwmma(),
        other => Err(WrapError::UnknownModule(other.to_string())),
    }
}

/// Every shipped wrapper, in catalogue order.
pub fn wrappers() -> Result<Vec<WrapperHeader>> {
    MODULES.iter().map(|entry| wrapper(entry.name)).collect()
}

/// Module catalogue in declaration order, which already puts dependencies
/// first.
pub fn modules() -> Result<Vec<ModuleConfig>> {
    MODULES
        .iter()
        .map(|entry| Ok(ModuleConfig::from_catalogue(entry, wrapper(entry.name)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::{clang_args, split_clang_args};
    use crate::config::GeneratorConfig;
    use crate::module::{ModuleFlags, sort_by_dependencies};
    use crate::shim::MacroRole;

    #[test]
    fn rocwmma_keeps_vendor_include_order() {
        let wrapper = rocwmma().unwrap();
        let order: Vec<&str> = wrapper.includes().iter().map(|i| i.header().path()).collect();
        assert_eq!(
            order,
            [
                "hip/hip_runtime_api.h",
                "rocwmma/rocwmma-version.hpp",
                "rocwmma/rocwmma_transforms.hpp",
                "rocwmma/rocwmma.hpp",
                "rocwmma/rocwmma_coop.hpp",
            ]
        );
        assert_eq!(wrapper.forward_decls().len(), 1);
    }

    #[test]
    fn rocprofiler_pulls_in_activity_header() {
        let wrapper = rocprofiler().unwrap();
        assert_eq!(
            wrapper.includes().last().unwrap().header(),
            &HeaderRef::Local("activity.h".into())
        );
        assert!(wrapper.shims().is_empty());
        let roles: Vec<MacroRole> = wrapper.macros().map(|(role, _)| role).collect();
        assert_eq!(roles, [MacroRole::Platform]);
    }

    #[test]
    fn catalogue_is_declared_in_dependency_order() {
        let modules = modules().unwrap();
        let sorted = sort_by_dependencies(&modules).unwrap();
        let declared: Vec<&str> = modules.iter().map(|m| m.name.as_str()).collect();
        let ordered: Vec<&str> = sorted.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(ordered, declared);
        assert_eq!(declared[0], "hip");
        assert_eq!(declared.len(), 9);
        assert!(sorted.iter().all(|m| m.is_cpp()));
    }

    #[test]
    fn catalogue_links_and_dependencies() {
        let modules = modules().unwrap();
        let find = |name: &str| modules.iter().find(|m| m.name == name).unwrap();

        assert!(find("rocwmma").lib_name.is_none());
        assert_eq!(find("miopen").lib_name.as_deref(), Some("MIOpen"));
        assert_eq!(find("rocsolver").dependencies, ["hip", "rocblas"]);
        assert_eq!(find("rocsparse").rocm_includes, ["rocsparse/internal"]);
        assert!(find("rocsparse").flags.contains(ModuleFlags::NEEDS_STD_TYPES));
        assert!(!find("rocblas").flags.contains(ModuleFlags::NEEDS_STD_TYPES));
        for module in &modules {
            assert_eq!(module.wrapper.name(), module.name);
        }
    }

    #[test]
    fn build_script_args_match_module_args() {
        let config = GeneratorConfig {
            rocm_path: "/usr/local/rocm".into(),
            extra_clang_args: split_clang_args("-DFOO=1 -v"),
            ..GeneratorConfig::default()
        };
        for (entry, module) in MODULES.iter().zip(modules().unwrap()) {
            assert_eq!(
                clang_args(entry, &config.include_dir(), &config.extra_clang_args),
                module.clang_args(&config),
                "{}",
                entry.name
            );
        }
    }

    #[test]
    fn unknown_wrapper_name() {
        assert!(matches!(wrapper("rocmagic"), Err(WrapError::UnknownModule(m)) if m == "rocmagic"));
    }

    #[test]
    fn library_wrappers_include_one_header() {
        let wrapper = rocsparse().unwrap();
        let includes: Vec<&str> = wrapper.includes().iter().map(|i| i.header().path()).collect();
        assert_eq!(includes, ["rocsparse/rocsparse.h"]);
        assert!(wrapper.shims().is_empty());
        assert_eq!(wrapper.platform_macros().len(), 1);
    }
}
