//! Macro definitions as injected into wrapper headers, and the macro table of
//! a single translation unit.

use crate::error::{Result, WrapError, check_identifier};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;

/// Condition under which an injected macro takes effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Guard {
    /// `#ifndef NAME`
    IfUndefined,
    /// `#if !defined(NAME) && !__has_builtin(NAME)`
    IfNotBuiltin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroDef {
    name: String,
    params: Option<Vec<String>>,
    body: String,
    guard: Guard,
}

impl MacroDef {
    /// Object-like macro, `#define NAME body`.
    pub fn object(name: impl Into<String>, body: impl Into<String>) -> Result<Self> {
        let def = Self {
            name: name.into(),
            params: None,
            body: body.into(),
            guard: Guard::IfUndefined,
        };
        def.validate()?;
        Ok(def)
    }

    /// Function-like macro, `#define NAME(params) body`.
    pub fn function<P, S>(name: impl Into<String>, params: P, body: impl Into<String>) -> Result<Self>
    where
        P: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let def = Self {
            name: name.into(),
            params: Some(params.into_iter().map(Into::into).collect()),
            body: body.into(),
            guard: Guard::IfUndefined,
        };
        def.validate()?;
        Ok(def)
    }

    /// Zero-returning stand-in for a compiler builtin taking `arity` arguments.
    pub fn builtin_stub(name: impl Into<String>, arity: usize) -> Result<Self> {
        let params = (0..arity).map(param_name);
        Ok(Self::function(name, params, "(0)")?.with_guard(Guard::IfNotBuiltin))
    }

    /// Object-like macro with a name fixed in this crate's tables.
    pub(crate) fn known_object(name: &'static str, body: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            params: None,
            body: body.into(),
            guard: Guard::IfUndefined,
        }
    }

    /// Builtin stub with a name fixed in this crate's tables.
    pub(crate) fn known_builtin_stub(name: &'static str, arity: usize) -> Self {
        Self {
            name: name.to_string(),
            params: Some((0..arity).map(param_name).collect()),
            body: "(0)".to_string(),
            guard: Guard::IfNotBuiltin,
        }
    }

    pub fn with_guard(mut self, guard: Guard) -> Self {
        self.guard = guard;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> Option<&[String]> {
        self.params.as_deref()
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn guard(&self) -> Guard {
        self.guard
    }

    pub fn is_function_like(&self) -> bool {
        self.params.is_some()
    }

    /// Two definitions are interchangeable when name, parameters and body
    /// match. The guard does not take part.
    pub fn same_definition(&self, other: &MacroDef) -> bool {
        self.name == other.name && self.params == other.params && self.body == other.body
    }

    /// Text following `#define `.
    pub fn definition(&self) -> String {
        let mut text = self.name.clone();
        if let Some(params) = &self.params {
            text.push('(');
            text.push_str(&params.join(", "));
            text.push(')');
        }
        if !self.body.is_empty() {
            text.push(' ');
            text.push_str(&self.body);
        }
        text
    }

    /// Guarded definition block, newline terminated.
    pub fn render(&self) -> String {
        let condition = match self.guard {
            Guard::IfUndefined => format!("#ifndef {}", self.name),
            Guard::IfNotBuiltin => format!(
                "#if !defined({0}) && !__has_builtin({0})",
                self.name
            ),
        };
        format!("{}\n#define {}\n#endif\n", condition, self.definition())
    }

    /// Parse the remainder of a `#define` directive.
    pub fn parse_define(rest: &str) -> Result<Self> {
        let rest = rest.trim_start();
        let name_len = rest
            .find(|c: char| !(c == '_' || c.is_ascii_alphanumeric()))
            .unwrap_or(rest.len());
        let (name, tail) = rest.split_at(name_len);

        if let Some(after_paren) = tail.strip_prefix('(') {
            let close = after_paren.find(')').ok_or_else(|| {
                WrapError::InvalidConfig(format!("unterminated parameter list in `{}`", rest))
            })?;
            let params: Vec<&str> = after_paren[..close]
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .collect();
            Self::function(name, params, after_paren[close + 1..].trim())
        } else {
            Self::object(name, tail.trim())
        }
    }

    fn validate(&self) -> Result<()> {
        check_identifier(&self.name)?;
        if let Some(params) = &self.params {
            for (i, param) in params.iter().enumerate() {
                check_identifier(param)?;
                if params[..i].contains(param) {
                    return Err(WrapError::InvalidConfig(format!(
                        "duplicate parameter `{}` in macro {}",
                        param, self.name
                    )));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for MacroDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.definition())
    }
}

/// Set while the wrapper's own `__has_builtin` fallback is in effect.
pub(crate) const HAS_BUILTIN_FALLBACK: &str = "ROCWRAP_HAS_BUILTIN_FALLBACK";

/// Opens a builtin shim block: `__has_builtin(x)` reads as 0 on front ends
/// without the operator.
pub(crate) fn has_builtin_fallback() -> String {
    format!(
        "#ifndef __has_builtin\n#define __has_builtin(x) 0\n#define {}\n#endif\n",
        HAS_BUILTIN_FALLBACK
    )
}

/// Closes a builtin shim block. The fallback does not outlive it.
pub(crate) fn has_builtin_fallback_end() -> String {
    format!(
        "#ifdef {0}\n#undef __has_builtin\n#undef {0}\n#endif\n",
        HAS_BUILTIN_FALLBACK
    )
}

fn param_name(index: usize) -> String {
    let letter = (b'a' + (index % 26) as u8) as char;
    if index < 26 {
        letter.to_string()
    } else {
        format!("{}{}", letter, index / 26)
    }
}

/// Outcome of [`MacroTable::define`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Defined {
    Inserted,
    /// An identical definition was already present.
    Unchanged,
}

/// The macro table of one translation unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroTable {
    macros: BTreeMap<String, MacroDef>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `def`. A differing definition of an existing name is a
    /// [`WrapError::MacroRedefinition`].
    pub fn define(&mut self, def: MacroDef) -> Result<Defined> {
        match self.macros.entry(def.name.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(def);
                Ok(Defined::Inserted)
            }
            Entry::Occupied(existing) if existing.get().same_definition(&def) => {
                Ok(Defined::Unchanged)
            }
            Entry::Occupied(existing) => Err(WrapError::MacroRedefinition {
                name: def.name.clone(),
                existing: existing.get().definition(),
                new: def.definition(),
            }),
        }
    }

    /// Replace any existing definition.
    pub fn force(&mut self, def: MacroDef) -> Option<MacroDef> {
        self.macros.insert(def.name.clone(), def)
    }

    pub fn undef(&mut self, name: &str) -> Option<MacroDef> {
        self.macros.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&MacroDef> {
        self.macros.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MacroDef> {
        self.macros.values()
    }
}
