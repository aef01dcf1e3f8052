/* Copyright (c) Meta Platforms, Inc. and affiliates. All rights reserved.
 *
 * This source code is licensed under the Apache 2.0 license found in
 * the LICENSE file in the root directory of this source tree.
 */
use std::fmt;

use crate::core_types::*;
use crate::generator::Config;
use crate::instrumenter::Instrumenter;
use crate::state::BranchPoint;
use crate::state::ProgramState;

pub const ARTIFACT_EXTENSION: &str = ".java";

/// e.g. P_3_naive
pub fn artifact_name(prefix: &str, index: usize, tag: &str) -> String {
    format!("{}_{}_{}", prefix, index, tag)
}

/// The sampled statements of one program, together with the state that produced them.
/// The state is finished: nothing samples from it anymore, it is only read by instrumenters.
#[derive(Clone, Debug)]
pub struct Program {
    pub seed: u64,
    pub config: Config,
    statements: Vec<String>,
    state: ProgramState,
}
impl Program {
    pub fn new(seed: u64, config: Config, statements: Vec<String>, state: ProgramState) -> Self {
        assert_eq!(state.scope_depth(), 0);
        Program {
            seed,
            config,
            statements,
            state,
        }
    }
    pub fn statements(&self) -> &[String] {
        &self.statements
    }
    pub fn state(&self) -> &ProgramState {
        &self.state
    }
    pub fn meaningful_count(&self) -> u32 {
        self.state.meaningful_count()
    }
    pub fn branch_points(&self) -> &[BranchPoint] {
        self.state.branch_points()
    }

    pub fn assemble(&self, name: &str, instrumenter: &dyn Instrumenter) -> Artifact {
        let statements = instrumenter.instrument(&self.state, &self.statements);
        assert_eq!(statements.len(), self.statements.len());
        Artifact {
            name: name.to_owned(),
            seed: self.seed,
            config: self.config,
            instrumentation: instrumenter.tag(),
            imports: instrumenter.imports(),
            statements,
        }
    }
}

/// A self-contained compilation unit.
/// run() returns how many assignments and loop iterations were executed,
/// which both lets a driver check that enough work was done and keeps the compiler from removing that work.
#[derive(Clone, Debug)]
pub struct Artifact {
    pub name: String,
    pub seed: u64,
    pub config: Config,
    pub instrumentation: &'static str,
    imports: &'static [&'static str],
    statements: Vec<String>,
}
impl Artifact {
    pub fn file_name(&self) -> String {
        self.name.clone() + ARTIFACT_EXTENSION
    }
    pub fn statements(&self) -> &[String] {
        &self.statements
    }
}
impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let config = self.config;
        write!(
            f,
            "// To regenerate:\n// taintgen --min-meaningful {} --num-vars {} --max-int {} generate --seed {} --instrumentation {} {}\n",
            config.min_meaningful,
            config.num_vars,
            config.max_int,
            self.seed,
            self.instrumentation,
            self.name,
        )?;
        write!(
            f,
            "// adding `--grammar <FILE>` if the program was sampled from a custom grammar\n"
        )?;
        for import in self.imports {
            write!(f, "{}\n", import)?;
        }
        write!(f, "\nclass {} {{\n", self.name)?;
        write!(
            f,
            "\tpublic static int {}(int x, int y) {{ if (y != 0) {{ return x / y; }} else {{ return x / (y + 1); }} }}\n",
            SAFE_DIV
        )?;
        write!(
            f,
            "\tpublic static int {}(int x, int y) {{ if (y != 0) {{ return x % y; }} else {{ return x % (y + 1); }} }}\n",
            SAFE_MOD
        )?;
        write!(f, "\tpublic static long run() {{\n")?;
        write!(f, "\t\tlong {} = 0;\n", EXEC_COUNTER)?;
        for statement in &self.statements {
            write!(f, "{}", statement)?;
        }
        write!(f, "\t\treturn {};\n", EXEC_COUNTER)?;
        write!(f, "\t}}\n")?;
        write!(f, "\tpublic static void main(String[] args) {{\n")?;
        write!(f, "\t\tSystem.out.println(run());\n")?;
        write!(f, "\t}}\n")?;
        write!(f, "}}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrumenter::NaiveInstrumenter;
    use crate::instrumenter::NoInstrumenter;
    use crate::instrumenter::TAINT_RUNTIME_IMPORT;

    fn program() -> Program {
        let config = Config {
            min_meaningful: 1,
            num_vars: 0,
            max_int: 10,
        };
        let statements = vec![
            "int x_0 = 4;\n".to_string(),
            "execCount++;\n".to_string(),
        ];
        Program::new(5, config, statements, ProgramState::from_config(&config, 5))
    }

    #[test]
    fn names_are_deterministic() {
        assert_eq!(artifact_name("P", 3, "naive"), "P_3_naive");
        let artifact = program().assemble(&artifact_name("P", 0, "none"), &NoInstrumenter);
        assert_eq!(artifact.file_name(), "P_0_none.java");
    }

    #[test]
    fn baseline_layout() {
        let text = program().assemble("A", &NoInstrumenter).to_string();
        assert!(text.starts_with("// To regenerate:\n// taintgen --min-meaningful 1 --num-vars 0 --max-int 10 generate --seed 5 --instrumentation none A\n"));
        assert!(!text.contains("import "));
        let class = text.find("class A {").unwrap();
        let div = text.find("public static int safeDiv(int x, int y)").unwrap();
        let modulo = text.find("public static int safeMod(int x, int y)").unwrap();
        let run = text.find("public static long run() {\n\t\tlong execCount = 0;\n").unwrap();
        let body = text.find("int x_0 = 4;\nexecCount++;\n\t\treturn execCount;\n").unwrap();
        let main = text.find("System.out.println(run());").unwrap();
        assert!(class < div && div < modulo && modulo < run && run < body && body < main);
        assert!(text.ends_with("}\n"));
        assert_eq!(text.matches('{').count(), text.matches('}').count());
    }

    #[test]
    fn naive_layout() {
        let artifact = program().assemble("B", &NaiveInstrumenter);
        assert_eq!(artifact.instrumentation, "naive");
        let text = artifact.to_string();
        let import = text.find(TAINT_RUNTIME_IMPORT).unwrap();
        let class = text.find("class B {").unwrap();
        assert!(import < class);
        assert!(text.contains("int x_0 = MultiTainter.taintedInt(4, \"x_0\");\n"));
    }

    #[test]
    fn helpers_guard_against_zero() {
        let text = program().assemble("C", &NoInstrumenter).to_string();
        assert!(text.contains("return x / (y + 1);"));
        assert!(text.contains("return x % (y + 1);"));
    }
}
