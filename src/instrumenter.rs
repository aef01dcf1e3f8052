/* Copyright (c) Meta Platforms, Inc. and affiliates. All rights reserved.
 *
 * This source code is licensed under the Apache 2.0 license found in
 * the LICENSE file in the root directory of this source tree.
 */
use std::fmt;

use log::trace;

use crate::core_types::*;
use crate::state::ProgramState;

/// A source-to-source transformation applied to sampled statements before they are assembled.
/// Implementations must not change the number or the order of the statements.
pub trait Instrumenter {
    /// Used to name the artifacts produced with this instrumenter.
    fn tag(&self) -> &'static str;
    /// Import declarations that the instrumented statements depend on.
    fn imports(&self) -> &'static [&'static str];
    fn instrument(&self, state: &ProgramState, statements: &[String]) -> Vec<String>;
}

// The baseline: statements are left untouched.
pub struct NoInstrumenter;

impl Instrumenter for NoInstrumenter {
    fn tag(&self) -> &'static str {
        "none"
    }
    fn imports(&self) -> &'static [&'static str] {
        &[]
    }
    fn instrument(&self, _state: &ProgramState, statements: &[String]) -> Vec<String> {
        statements.to_vec()
    }
}

pub const TAINT_RUNTIME_IMPORT: &str = "import edu.columbia.cs.psl.phosphor.runtime.MultiTainter;";

/// Taints every variable where it is declared, by routing its initial value through the taint runtime:
///   int x_3 = x_1 + 4;
/// becomes
///   int x_3 = MultiTainter.taintedInt(x_1 + 4, "x_3");
/// Only the exact declaration shape emitted by the generator is recognized, everything else is left alone.
pub struct NaiveInstrumenter;

impl NaiveInstrumenter {
    // Returns the declared variable and its initial value.
    fn match_declaration(statement: &str) -> Option<(&str, &str)> {
        let body = statement.strip_prefix("int ")?.strip_suffix(";\n")?;
        let (name, rhs) = body.split_once(" = ")?;
        let num = name.strip_prefix(VAR_NAME_STUB)?;
        if num.is_empty() || !num.bytes().all(|b| b.is_ascii_digit()) || rhs.is_empty() {
            return None;
        }
        Some((name, rhs))
    }
}

impl Instrumenter for NaiveInstrumenter {
    fn tag(&self) -> &'static str {
        "naive"
    }
    fn imports(&self) -> &'static [&'static str] {
        &[TAINT_RUNTIME_IMPORT]
    }
    fn instrument(&self, _state: &ProgramState, statements: &[String]) -> Vec<String> {
        statements
            .iter()
            .map(|statement| match Self::match_declaration(statement) {
                Some((name, rhs)) => {
                    trace!("naive instrumentation of {}", name);
                    format!(
                        "int {} = MultiTainter.taintedInt({}, \"{}\");\n",
                        name, rhs, name
                    )
                }
                None => statement.clone(),
            })
            .collect()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum InstrumentationKind {
    None,
    Naive,
}
impl InstrumentationKind {
    pub fn instrumenter(self) -> Box<dyn Instrumenter> {
        match self {
            InstrumentationKind::None => Box::new(NoInstrumenter),
            InstrumentationKind::Naive => Box::new(NaiveInstrumenter),
        }
    }
}
impl fmt::Display for InstrumentationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.instrumenter().tag())
    }
}
