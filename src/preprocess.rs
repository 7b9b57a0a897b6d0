//! A minimal preprocessor over the directives wrapper headers use.
//!
//! It answers one question: given the macros and builtins a front end
//! already knows, which injected definitions become effective and which
//! vendor headers get included. Tokens outside directives are not expanded.

use crate::error::{Result, WrapError};
use crate::macros::{MacroDef, MacroTable};
use crate::catalogue::PLATFORM_MACRO;
use crate::shim::{ShimSet, WAVEFRONT_SIZE};
use std::collections::{BTreeMap, BTreeSet};

/// What a front end knows before it reads the first line.
#[derive(Debug, Clone)]
pub struct Environment {
    predefined: MacroTable,
    builtins: BTreeSet<String>,
    has_builtin_operator: bool,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            predefined: MacroTable::new(),
            builtins: BTreeSet::new(),
            has_builtin_operator: true,
        }
    }
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// libclang as driven by bindgen for the host target: no AMDGCN builtins
    /// and no device macros.
    pub fn bindgen_host() -> Self {
        Self::new()
    }

    /// hipcc compiling device code for an AMDGCN target.
    pub fn amdgcn_device(wavefront_size: u32) -> Self {
        let mut env = Self::new();
        for shim in ShimSet::amdgcn().iter() {
            if shim.def().is_function_like() {
                env.builtins.insert(shim.name().to_string());
            }
        }
        for (name, value) in [
            (PLATFORM_MACRO, "1".to_string()),
            ("__HIP_DEVICE_COMPILE__", "1".to_string()),
            (WAVEFRONT_SIZE, wavefront_size.to_string()),
        ] {
            env.predefined.force(MacroDef::known_object(name, value));
        }
        env
    }

    pub fn predefine(mut self, def: MacroDef) -> Self {
        self.predefined.force(def);
        self
    }

    pub fn with_builtin(mut self, name: impl Into<String>) -> Self {
        self.builtins.insert(name.into());
        self
    }

    /// Front end without the `__has_builtin` operator (GCC before 10).
    pub fn without_has_builtin(mut self) -> Self {
        self.has_builtin_operator = false;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Predefined,
    /// Defined by the evaluated text on this (1-based) line.
    Injected { line: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub def: MacroDef,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redefinition {
    pub name: String,
    pub line: usize,
    pub previous: String,
    pub new: String,
}

#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    table: BTreeMap<String, Definition>,
    includes: Vec<String>,
    redefinitions: Vec<Redefinition>,
}

impl Evaluation {
    pub fn effective(&self, name: &str) -> Option<&Definition> {
        self.table.get(name)
    }

    /// Definitions the evaluated text introduced and that survived to the end.
    pub fn injected(&self) -> impl Iterator<Item = &Definition> {
        self.table
            .values()
            .filter(|d| matches!(d.origin, Origin::Injected { .. }))
    }

    pub fn includes(&self) -> &[String] {
        &self.includes
    }

    /// `#define`s that replaced a different definition, which clang reports
    /// as `-Wmacro-redefined`.
    pub fn redefinitions(&self) -> &[Redefinition] {
        &self.redefinitions
    }
}

struct Frame {
    parent_active: bool,
    taken: bool,
    active: bool,
}

struct Evaluator<'a> {
    env: &'a Environment,
    eval: Evaluation,
    stack: Vec<Frame>,
}

impl Evaluator<'_> {
    fn active(&self) -> bool {
        self.stack.last().is_none_or(|f| f.active)
    }

    fn is_defined(&self, name: &str) -> bool {
        self.eval.table.contains_key(name)
            || (name == "__has_builtin" && self.env.has_builtin_operator)
    }

    fn has_builtin(&self, name: &str, line: usize, text: &str) -> Result<bool> {
        if let Some(fallback) = self.eval.table.get("__has_builtin") {
            return Ok(fallback.def.body().trim() != "0");
        }
        if self.env.has_builtin_operator {
            return Ok(self.env.builtins.contains(name));
        }
        Err(unsupported(line, text))
    }

    fn condition(&self, expr: &str, line: usize, text: &str) -> Result<bool> {
        let mut result = true;
        for term in expr.split("&&") {
            let mut term = term.trim();
            let mut negate = false;
            while let Some(rest) = term.strip_prefix('!') {
                negate = !negate;
                term = rest.trim_start();
            }
            let value = if let Some(name) = call_argument(term, "defined") {
                self.is_defined(name)
            } else if let Some(name) = term.strip_prefix("defined ") {
                self.is_defined(name.trim())
            } else if let Some(name) = call_argument(term, "__has_builtin") {
                self.has_builtin(name, line, text)?
            } else if term == "1" || term == "0" {
                term == "1"
            } else {
                return Err(unsupported(line, text));
            };
            result &= value != negate;
        }
        Ok(result)
    }

    fn push(&mut self, condition: bool) {
        let parent_active = self.active();
        let active = parent_active && condition;
        self.stack.push(Frame {
            parent_active,
            taken: active,
            active,
        });
    }

    fn directive(&mut self, line: usize, raw: &str) -> Result<()> {
        let text = raw.split("//").next().unwrap_or(raw).trim();
        let body = text.trim_start_matches('#').trim_start();
        let (keyword, rest) = body
            .split_once(char::is_whitespace)
            .map(|(k, r)| (k, r.trim()))
            .unwrap_or((body, ""));

        match keyword {
            "ifndef" => {
                let cond = !self.is_defined(rest);
                self.push(cond);
            }
            "ifdef" => {
                let cond = self.is_defined(rest);
                self.push(cond);
            }
            "if" => {
                let cond = if self.active() {
                    self.condition(rest, line, text)?
                } else {
                    false
                };
                self.push(cond);
            }
            "else" => {
                let frame = self
                    .stack
                    .last_mut()
                    .ok_or(WrapError::UnbalancedConditional { line })?;
                frame.active = frame.parent_active && !frame.taken;
                frame.taken = true;
            }
            "endif" => {
                self.stack
                    .pop()
                    .ok_or(WrapError::UnbalancedConditional { line })?;
            }
            _ if !self.active() => {}
            "define" => {
                let def = MacroDef::parse_define(rest)?;
                self.define(def, line);
            }
            "undef" => {
                self.eval.table.remove(rest);
            }
            "include" => {
                let path = rest.trim_matches(|c| matches!(c, '<' | '>' | '"'));
                self.eval.includes.push(path.to_string());
            }
            "pragma" => {}
            _ => return Err(unsupported(line, text)),
        }
        Ok(())
    }

    fn define(&mut self, def: MacroDef, line: usize) {
        if let Some(existing) = self.eval.table.get(def.name()) {
            if existing.def.same_definition(&def) {
                return;
            }
            tracing::debug!(name = def.name(), line, "macro redefined");
            self.eval.redefinitions.push(Redefinition {
                name: def.name().to_string(),
                line,
                previous: existing.def.definition(),
                new: def.definition(),
            });
        }
        self.eval.table.insert(
            def.name().to_string(),
            Definition {
                def,
                origin: Origin::Injected { line },
            },
        );
    }
}

fn call_argument<'t>(term: &'t str, function: &str) -> Option<&'t str> {
    term.strip_prefix(function)?
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
        .map(str::trim)
}

fn unsupported(line: usize, text: &str) -> WrapError {
    WrapError::UnsupportedDirective {
        line,
        text: text.to_string(),
    }
}

/// Run the directives of `text` against `env`.
pub fn evaluate(text: &str, env: &Environment) -> Result<Evaluation> {
    let mut evaluator = Evaluator {
        env,
        eval: Evaluation::default(),
        stack: Vec::new(),
    };
    for def in env.predefined.iter() {
        evaluator.eval.table.insert(
            def.name().to_string(),
            Definition {
                def: def.clone(),
                origin: Origin::Predefined,
            },
        );
    }

    let mut last = 0;
    for (index, line) in text.lines().enumerate() {
        last = index + 1;
        if line.trim_start().starts_with('#') {
            evaluator.directive(last, line.trim_start())?;
        }
    }

    if !evaluator.stack.is_empty() {
        return Err(WrapError::UnbalancedConditional { line: last });
    }
    tracing::debug!(
        injected = evaluator.eval.injected().count(),
        includes = evaluator.eval.includes.len(),
        "evaluated directives"
    );
    Ok(evaluator.eval)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHIM: &str = "\
#ifndef __has_builtin
#define __has_builtin(x) 0
#define ROCWRAP_HAS_BUILTIN_FALLBACK
#endif
#if !defined(__builtin_amdgcn_ds_bpermute) && !__has_builtin(__builtin_amdgcn_ds_bpermute)
#define __builtin_amdgcn_ds_bpermute(a, b) (0)
#endif
#ifndef __AMDGCN_WAVEFRONT_SIZE
#define __AMDGCN_WAVEFRONT_SIZE 64
#endif
#ifdef ROCWRAP_HAS_BUILTIN_FALLBACK
#undef __has_builtin
#undef ROCWRAP_HAS_BUILTIN_FALLBACK
#endif
#include <rocwmma/rocwmma.hpp>
";

    #[test]
    fn host_front_end_takes_the_shims() {
        let eval = evaluate(SHIM, &Environment::bindgen_host()).unwrap();
        let stub = eval.effective("__builtin_amdgcn_ds_bpermute").unwrap();
        assert_eq!(stub.def.body(), "(0)");
        assert_eq!(stub.origin, Origin::Injected { line: 6 });
        assert_eq!(eval.includes(), ["rocwmma/rocwmma.hpp"]);
        // clang has the operator, so the fallback stays out
        assert!(eval.effective("__has_builtin").is_none());
    }

    #[test]
    fn device_environment_predefines_target_macros() {
        let env = Environment::amdgcn_device(32);
        let eval = evaluate("", &env).unwrap();
        for name in ["__HIP_PLATFORM_AMD__", "__HIP_DEVICE_COMPILE__", "__AMDGCN_WAVEFRONT_SIZE"] {
            let def = eval.effective(name).unwrap();
            assert_eq!(def.origin, Origin::Predefined, "{}", name);
        }
        assert_eq!(eval.effective("__AMDGCN_WAVEFRONT_SIZE").unwrap().def.body(), "32");
    }

    #[test]
    fn device_toolchain_keeps_real_definitions() {
        let eval = evaluate(SHIM, &Environment::amdgcn_device(32)).unwrap();
        assert_eq!(eval.injected().count(), 0);
        let wave = eval.effective("__AMDGCN_WAVEFRONT_SIZE").unwrap();
        assert_eq!(wave.origin, Origin::Predefined);
        assert_eq!(wave.def.body(), "32");
        assert!(eval.redefinitions().is_empty());
    }

    #[test]
    fn front_end_without_operator_uses_fallback() {
        let env = Environment::bindgen_host().without_has_builtin();
        let eval = evaluate(SHIM, &env).unwrap();
        assert!(eval.effective("__builtin_amdgcn_ds_bpermute").is_some());
        // the fallback is gone again before the vendor include
        assert!(eval.effective("__has_builtin").is_none());
        assert!(eval.effective("ROCWRAP_HAS_BUILTIN_FALLBACK").is_none());
        assert_eq!(eval.injected().count(), 2);
    }

    #[test]
    fn else_branch_and_nesting() {
        let text = "#ifdef A\n#define B 1\n#else\n#ifndef C\n#define B 2\n#endif\n#endif\n";
        let eval = evaluate(text, &Environment::new()).unwrap();
        assert_eq!(eval.effective("B").unwrap().def.body(), "2");
    }

    #[test]
    fn differing_redefinition_is_reported() {
        let text = "#define X 1\n#define X 1\n#define X 2\n";
        let eval = evaluate(text, &Environment::new()).unwrap();
        assert_eq!(eval.redefinitions().len(), 1);
        assert_eq!(eval.redefinitions()[0].line, 3);
        assert_eq!(eval.effective("X").unwrap().def.body(), "2");
    }

    #[test]
    fn malformed_input() {
        assert!(matches!(
            evaluate("#ifndef X\n", &Environment::new()),
            Err(WrapError::UnbalancedConditional { line: 1 })
        ));
        assert!(matches!(
            evaluate("#endif\n", &Environment::new()),
            Err(WrapError::UnbalancedConditional { line: 1 })
        ));
        assert!(matches!(
            evaluate("#if X > 3\n#endif\n", &Environment::new()),
            Err(WrapError::UnsupportedDirective { line: 1, .. })
        ));
        assert!(matches!(
            evaluate("#error nope\n", &Environment::new()),
            Err(WrapError::UnsupportedDirective { .. })
        ));
    }

    #[test]
    fn inactive_branches_are_not_evaluated() {
        let text = "#ifdef NEVER\n#if X > 3\n#error nope\n#endif\n#endif\n";
        assert!(evaluate(text, &Environment::new()).is_ok());
    }
}
