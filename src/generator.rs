/* Copyright (c) Meta Platforms, Inc. and affiliates. All rights reserved.
 *
 * This source code is licensed under the Apache 2.0 license found in
 * the LICENSE file in the root directory of this source tree.
 */
use log::debug;
use log::trace;

use crate::core_types::*;
use crate::grammar::ChoicePoint;
use crate::grammar::Grammar;
use crate::grammar::Production;
use crate::grammar::Production::*;
use crate::grammar::is_distribution;
use crate::program::Program;
use crate::state::BranchKind;
use crate::state::ProgramState;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub min_meaningful: u32,
    // 0 means that every assignment introduces a fresh variable
    pub num_vars: u32,
    pub max_int: i32,
}
impl Default for Config {
    fn default() -> Self {
        Config {
            min_meaningful: DEFAULT_MIN_MEANINGFUL,
            num_vars: 0,
            max_int: DEFAULT_MAX_INT,
        }
    }
}

pub fn gen_program(grammar: &Grammar, seed: u64, config: Config) -> Program {
    let mut state = ProgramState::from_config(&config, seed);
    let statements = sample(grammar, &mut state, config.num_vars);
    debug!(
        "gen_program: seed={}, fragments={}, meaningful={}/{}, max_int={}, vars={}, branch_points={}",
        seed,
        statements.len(),
        state.meaningful_count(),
        state.min_meaningful(),
        state.max_int(),
        state.vars_introduced(),
        state.branch_points().len()
    );
    Program::new(seed, config, statements, state)
}

/// Samples statements until the state has seen enough meaningful ones.
/// The result may overshoot the threshold, since a single statement can contain many others.
/// With num_vars > 0, the program starts by declaring that many variables, which assignments then overwrite.
pub fn sample(grammar: &Grammar, state: &mut ProgramState, num_vars: u32) -> Vec<String> {
    let mut program = Vec::new();
    state.with_scope(|state| {
        for _ in 0..num_vars {
            let (name, declaration) = gen_declaration(grammar, state);
            state.declare_pool_var(name);
            program.push(declaration);
        }
        while !state.is_done() {
            program.extend(gen_stmt(grammar, state));
        }
    });
    program
}

// Linear scan over the cumulative weights: ties go to the earliest candidate.
fn choose_production(
    grammar: &Grammar,
    state: &mut ProgramState,
    choice: ChoicePoint,
) -> Production {
    let productions = choice.productions();
    let weights = grammar.weights(choice);
    assert!(
        is_distribution(weights.iter().copied()),
        "weights of the {} choice point do not form a distribution: {:?}",
        choice,
        weights
    );
    let draw = state.draw_unit();
    let p = pick_production(productions, &weights, draw);
    trace!("choose_production: {} (draw={})", p, draw);
    p
}

// The weights may sum to slightly less than 1: a draw past their total goes to the first candidate.
// Candidates with weight 0 are never picked.
fn pick_production(productions: &[Production], weights: &[Weight], draw: f64) -> Production {
    let mut accumulator = 0.0;
    for (p, w) in productions.iter().zip(weights) {
        accumulator += w;
        if *w > 0.0 && draw <= accumulator {
            return *p;
        }
    }
    productions
        .iter()
        .zip(weights)
        .find(|(_, w)| **w > 0.0)
        .map_or(productions[0], |(p, _)| *p)
}

fn gen_stmt(grammar: &Grammar, state: &mut ProgramState) -> Vec<String> {
    match choose_production(grammar, state, ChoicePoint::Statement) {
        Assign => gen_assign(grammar, state),
        Conditional => gen_conditional(grammar, state),
        Loop => gen_loop(grammar, state),
        Nop => vec![gen_nop()],
        Sequence => gen_sequence(grammar, state),
        p => unreachable!("{} is not a statement", p),
    }
}

fn counter_increment() -> String {
    format!("{}++;\n", EXEC_COUNTER)
}

// int x_n = aexp;
// The name is bound only after the expression is sampled, so it can't refer to itself.
fn gen_declaration(grammar: &Grammar, state: &mut ProgramState) -> (String, String) {
    let name = state.make_fresh_var();
    let rhs = gen_arith_expr(grammar, state);
    let declaration = format!("int {} = {};\n", name, rhs);
    (name, declaration)
}

fn gen_assign(grammar: &Grammar, state: &mut ProgramState) -> Vec<String> {
    let assignment = match state.pick_pool_var() {
        Some(target) => {
            let rhs = gen_arith_expr(grammar, state);
            format!("{} = {};\n", target, rhs)
        }
        None => {
            let (name, declaration) = gen_declaration(grammar, state);
            state.bind_var(name);
            declaration
        }
    };
    state.count_meaningful();
    vec![assignment, counter_increment()]
}

fn gen_conditional(grammar: &Grammar, state: &mut ProgramState) -> Vec<String> {
    state.add_branch_point(BranchKind::Conditional);
    let condition = gen_bool_expr(grammar, state);
    let mut code = vec![format!("if ({}) {{\n", condition)];
    code.extend(state.with_scope(|state| gen_stmt(grammar, state)));
    code.push("} else {\n".to_string());
    code.extend(state.with_scope(|state| gen_stmt(grammar, state)));
    code.push("}\n".to_string());
    state.count_meaningful();
    code
}

// Loops are always of the shape
//   int x_k = aexp;
//   while (x_k < N) { body; execCount++; x_k++; }
// with x_k fresh and N a positive literal, so that they terminate.
// Nothing ever assigns to x_k except the increment: in pool mode only pool variables are overwritten.
fn gen_loop(grammar: &Grammar, state: &mut ProgramState) -> Vec<String> {
    state.add_branch_point(BranchKind::Loop);
    let (counter, init) = gen_declaration(grammar, state);
    state.bind_var(counter.clone());
    let bound = state.draw_literal();
    let mut code = vec![init, format!("while ({} < {}) {{\n", counter, bound)];
    code.extend(state.with_scope(|state| gen_stmt(grammar, state)));
    code.push(counter_increment());
    code.push(format!("{}++;\n", counter));
    code.push("}\n".to_string());
    state.count_meaningful();
    code
}

// Not meaningful: otherwise a run of skips could satisfy the threshold.
fn gen_nop() -> String {
    "//skip\n".to_string()
}

// Once the threshold is reached, sequences are empty, which is what stops the recursion.
fn gen_sequence(grammar: &Grammar, state: &mut ProgramState) -> Vec<String> {
    if state.is_done() {
        return Vec::new();
    }
    let mut code = gen_stmt(grammar, state);
    code.extend(gen_stmt(grammar, state));
    code
}

fn gen_arith_expr(grammar: &Grammar, state: &mut ProgramState) -> String {
    match choose_production(grammar, state, ChoicePoint::ArithExpr) {
        Int => gen_literal(state),
        Var => gen_var_or_literal(state),
        ArithBinop => gen_arith_binop(grammar, state),
        p => unreachable!("{} is not an arithmetic expression", p),
    }
}

fn gen_literal(state: &mut ProgramState) -> String {
    state.draw_literal().to_string()
}

// Falls back to a literal when no variable is in scope yet.
fn gen_var_or_literal(state: &mut ProgramState) -> String {
    match state.pick_visible_var() {
        Some(v) => v,
        None => gen_literal(state),
    }
}

// Operands are always variables when possible, to create as many data flows as possible.
// Division and modulo go through helpers that never divide by zero.
fn gen_arith_binop(grammar: &Grammar, state: &mut ProgramState) -> String {
    let op = choose_production(grammar, state, ChoicePoint::ArithOp);
    let lhs = gen_var_or_literal(state);
    let rhs = gen_var_or_literal(state);
    match op {
        Plus => format!("{} + {}", lhs, rhs),
        Minus => format!("{} - {}", lhs, rhs),
        Times => format!("{} * {}", lhs, rhs),
        Div => format!("{}({}, {})", SAFE_DIV, lhs, rhs),
        Mod => format!("{}({}, {})", SAFE_MOD, lhs, rhs),
        p => unreachable!("{} is not an arithmetic operator", p),
    }
}

fn gen_bool_expr(grammar: &Grammar, state: &mut ProgramState) -> String {
    match choose_production(grammar, state, ChoicePoint::BoolExpr) {
        True => "true".to_string(),
        False => "false".to_string(),
        Compare => {
            let lhs = gen_var_or_literal(state);
            let op = gen_comparison_op(grammar, state);
            let rhs = gen_var_or_literal(state);
            format!("{} {} {}", lhs, op, rhs)
        }
        // Sub-expressions are parenthesized so that precedence never matters
        Or => {
            let lhs = gen_bool_expr(grammar, state);
            let rhs = gen_bool_expr(grammar, state);
            format!("({}) || ({})", lhs, rhs)
        }
        And => {
            let lhs = gen_bool_expr(grammar, state);
            let rhs = gen_bool_expr(grammar, state);
            format!("({}) && ({})", lhs, rhs)
        }
        Not => format!("!({})", gen_bool_expr(grammar, state)),
        p => unreachable!("{} is not a boolean expression", p),
    }
}

fn gen_comparison_op(grammar: &Grammar, state: &mut ProgramState) -> &'static str {
    match choose_production(grammar, state, ChoicePoint::CompareOp) {
        Lt => "<",
        Gt => ">",
        Le => "<=",
        Ge => ">=",
        Ne => "!=",
        Eq => "==",
        p => unreachable!("{} is not a comparison operator", p),
    }
}
