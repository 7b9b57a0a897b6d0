//! Parser compatibility shims.
//!
//! A shim stands in for a compiler builtin or an architecture macro that the
//! binding generator's front end does not know. Builtin shims are guarded with
//! `__has_builtin`, arch shims with `#ifndef`, so neither replaces the real
//! thing when the device toolchain compiles the same headers.

use crate::error::{Result, WrapError};
use crate::macros::MacroDef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MacroRole {
    Platform,
    Builtin,
    Arch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shim {
    role: MacroRole,
    def: MacroDef,
}

impl Shim {
    pub fn role(&self) -> MacroRole {
        self.role
    }

    pub fn def(&self) -> &MacroDef {
        &self.def
    }

    pub fn name(&self) -> &str {
        self.def.name()
    }
}

/// Builtins referenced by rocWMMA's cross-lane helpers.
const AMDGCN_BUILTINS: &[(&str, usize)] = &[
    ("__builtin_amdgcn_ds_bpermute", 2),
    ("__builtin_amdgcn_ds_permute", 2),
    ("__builtin_amdgcn_mov_dpp", 5),
    ("__builtin_amdgcn_uicmp", 3),
    ("__builtin_amdgcn_mbcnt_lo", 2),
    ("__builtin_amdgcn_mbcnt_hi", 2),
];

pub const WAVEFRONT_SIZE: &str = "__AMDGCN_WAVEFRONT_SIZE";
pub const DEFAULT_WAVEFRONT_SIZE: u32 = 64;

/// Ordered set of shims, unique by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShimSet {
    shims: Vec<Shim>,
}

impl ShimSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The AMDGCN builtins and wavefront size rocWMMA needs to get past the
    /// host-side parser.
    pub fn amdgcn() -> Self {
        let mut shims: Vec<Shim> = AMDGCN_BUILTINS
            .iter()
            .map(|&(name, arity)| Shim {
                role: MacroRole::Builtin,
                def: MacroDef::known_builtin_stub(name, arity),
            })
            .collect();
        shims.push(Shim {
            role: MacroRole::Arch,
            def: MacroDef::known_object(WAVEFRONT_SIZE, DEFAULT_WAVEFRONT_SIZE.to_string()),
        });
        Self { shims }
    }

    pub fn builtin(name: &str, arity: usize) -> Result<Shim> {
        Ok(Shim {
            role: MacroRole::Builtin,
            def: MacroDef::builtin_stub(name, arity)?,
        })
    }

    pub fn arch(name: &str, value: impl ToString) -> Result<Shim> {
        Ok(Shim {
            role: MacroRole::Arch,
            def: MacroDef::object(name, value.to_string())?,
        })
    }

    /// Add a shim. Re-adding an identical shim is a no-op; a different
    /// definition under the same name is rejected.
    pub fn insert(&mut self, shim: Shim) -> Result<bool> {
        if let Some(existing) = self.get(shim.name()) {
            if existing.def.same_definition(&shim.def) {
                return Ok(false);
            }
            return Err(WrapError::MacroRedefinition {
                name: shim.name().to_string(),
                existing: existing.def.definition(),
                new: shim.def.definition(),
            });
        }
        tracing::debug!(shim = shim.name(), role = ?shim.role, "adding shim");
        self.shims.push(shim);
        Ok(true)
    }

    pub fn get(&self, name: &str) -> Option<&Shim> {
        self.shims.iter().find(|s| s.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Shim> {
        self.shims.iter()
    }

    pub fn len(&self) -> usize {
        self.shims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shims.is_empty()
    }

    pub fn has_builtin_shims(&self) -> bool {
        self.shims.iter().any(|s| s.role == MacroRole::Builtin)
    }
}

impl<'a> IntoIterator for &'a ShimSet {
    type Item = &'a Shim;
    type IntoIter = std::slice::Iter<'a, Shim>;

    fn into_iter(self) -> Self::IntoIter {
        self.shims.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amdgcn_catalogue() {
        let set = ShimSet::amdgcn();
        assert_eq!(set.len(), 7);
        assert!(set.has_builtin_shims());

        let bpermute = set.get("__builtin_amdgcn_ds_bpermute").unwrap();
        assert_eq!(bpermute.role(), MacroRole::Builtin);
        assert_eq!(bpermute.def().definition(), "__builtin_amdgcn_ds_bpermute(a, b) (0)");

        let wave = set.get("__AMDGCN_WAVEFRONT_SIZE").unwrap();
        assert_eq!(wave.role(), MacroRole::Arch);
        assert_eq!(wave.def().body(), "64");
    }

    #[test]
    fn amdgcn_catalogue_passes_validation() {
        let set = ShimSet::amdgcn();
        for &(name, arity) in AMDGCN_BUILTINS {
            assert_eq!(&ShimSet::builtin(name, arity).unwrap(), set.get(name).unwrap());
        }
        let wave = ShimSet::arch(WAVEFRONT_SIZE, DEFAULT_WAVEFRONT_SIZE).unwrap();
        assert_eq!(&wave, set.get(WAVEFRONT_SIZE).unwrap());
        assert_eq!(set.len(), AMDGCN_BUILTINS.len() + 1);
    }

    #[test]
    fn insert_is_idempotent() {
        let mut set = ShimSet::amdgcn();
        let again = ShimSet::builtin("__builtin_amdgcn_ds_permute", 2).unwrap();
        assert!(!set.insert(again).unwrap());

        let added = ShimSet::builtin("__builtin_amdgcn_readfirstlane", 1).unwrap();
        assert!(set.insert(added).unwrap());
        assert_eq!(set.iter().last().unwrap().name(), "__builtin_amdgcn_readfirstlane");
    }

    #[test]
    fn insert_rejects_different_arity() {
        let mut set = ShimSet::amdgcn();
        let wrong = ShimSet::builtin("__builtin_amdgcn_ds_permute", 3).unwrap();
        assert!(matches!(
            set.insert(wrong),
            Err(WrapError::MacroRedefinition { .. })
        ));
    }
}
