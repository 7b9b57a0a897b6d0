use crate::catalogue::{EXTRA_CLANG_ARGS_VAR, ROCM_PATH_VAR, SKIP_BINDGEN_VAR, split_clang_args};
use crate::error::{Result, WrapError};
use std::path::PathBuf;

pub use crate::catalogue::DEFAULT_ROCM_PATH;

/// Settings for a binding generation run, normally read from the
/// environment of a build script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub rocm_path: PathBuf,
    pub skip_bindgen: bool,
    pub extra_clang_args: Vec<String>,
    pub out_dir: Option<PathBuf>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            rocm_path: PathBuf::from(DEFAULT_ROCM_PATH),
            skip_bindgen: false,
            extra_clang_args: Vec::new(),
            out_dir: None,
        }
    }
}

impl GeneratorConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    ///
    /// - `ROCM_PATH`: ROCm installation root, `/opt/rocm` when unset or empty
    /// - `SKIP_BINDGEN`: present means generation is skipped
    /// - `ROCWRAP_EXTRA_CLANG_ARGS`: whitespace separated clang arguments
    /// - `OUT_DIR`: where generated bindings go
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let rocm_path = lookup(ROCM_PATH_VAR)
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ROCM_PATH));

        let extra_clang_args = lookup(EXTRA_CLANG_ARGS_VAR)
            .map(|args| split_clang_args(&args))
            .unwrap_or_default();

        Self {
            rocm_path,
            skip_bindgen: lookup(SKIP_BINDGEN_VAR).is_some(),
            extra_clang_args,
            out_dir: lookup("OUT_DIR").map(PathBuf::from),
        }
    }

    pub fn include_dir(&self) -> PathBuf {
        self.rocm_path.join("include")
    }

    pub fn lib_dir(&self) -> PathBuf {
        self.rocm_path.join("lib")
    }

    pub fn out_dir(&self) -> Result<&PathBuf> {
        self.out_dir
            .as_ref()
            .ok_or_else(|| WrapError::InvalidConfig("OUT_DIR is not set".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = GeneratorConfig::from_lookup(lookup(&[]));
        assert_eq!(config, GeneratorConfig::default());
        assert_eq!(config.include_dir(), PathBuf::from("/opt/rocm/include"));
        assert!(config.out_dir().is_err());
    }

    #[test]
    fn reads_variables() {
        let config = GeneratorConfig::from_lookup(lookup(&[
            ("ROCM_PATH", "/usr/local/rocm-6.2"),
            ("SKIP_BINDGEN", ""),
            ("ROCWRAP_EXTRA_CLANG_ARGS", " -DFOO=1  -v "),
            ("OUT_DIR", "/tmp/out"),
        ]));
        assert_eq!(config.lib_dir(), PathBuf::from("/usr/local/rocm-6.2/lib"));
        assert!(config.skip_bindgen);
        assert_eq!(config.extra_clang_args, ["-DFOO=1", "-v"]);
        assert_eq!(config.out_dir().unwrap(), &PathBuf::from("/tmp/out"));
    }

    #[test]
    fn empty_rocm_path_falls_back() {
        let config = GeneratorConfig::from_lookup(lookup(&[("ROCM_PATH", "  ")]));
        assert_eq!(config.rocm_path, PathBuf::from(DEFAULT_ROCM_PATH));
    }
}
