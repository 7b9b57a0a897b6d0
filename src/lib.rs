//! Header normalization for generating Rust bindings to ROCm vendor headers.
//!
//! Vendor headers such as rocWMMA reference AMDGCN builtins and device macros
//! that libclang does not know when bindgen parses them for the host. This
//! crate describes the wrapper headers that get the parser through: guarded
//! platform macros, zero-returning builtin shims, placeholder namespaces and
//! the vendor includes in their required order.

/// Module table and generator settings, shared with the build script.
pub mod catalogue;
pub mod config;
pub mod diagnostic;
pub mod error;
#[cfg(feature = "generate")]
pub mod generate;
pub mod macros;
pub mod module;
pub mod preprocess;
pub mod shim;
#[cfg(feature = "vendor-bindings")]
pub mod sys;
pub mod vendor;
pub mod wrapper;

pub use catalogue::CatalogueEntry;
pub use config::GeneratorConfig;
pub use diagnostic::{Diagnostic, Remedy};
pub use error::{Result, WrapError};
#[cfg(feature = "generate")]
pub use generate::{BindingGenerator, GeneratedModule};
pub use macros::{Guard, MacroDef, MacroTable};
pub use module::{ModuleConfig, ModuleFlags};
pub use preprocess::{Environment, Evaluation};
pub use shim::{MacroRole, Shim, ShimSet};
pub use wrapper::{Composition, HeaderRef, Language, WrapperHeader};

use std::path::{Path, PathBuf};

/// Write the shipped ROCm wrappers into `dir`.
pub fn write_vendor_wrappers(dir: &Path) -> Result<Vec<PathBuf>> {
    vendor::wrappers()?
        .iter()
        .map(|wrapper| wrapper.write_to(dir))
        .collect()
}
