/* Copyright (c) Meta Platforms, Inc. and affiliates. All rights reserved.
 *
 * This source code is licensed under the Apache 2.0 license found in
 * the LICENSE file in the root directory of this source tree.
 */
use log::debug;
use log::trace;
use rand::prelude::IteratorRandom;
use rand::SeedableRng;
use rand_distr::Distribution;
use rand_distr::Standard;
use rand_distr::Uniform;

use crate::core_types::*;
use crate::generator::Config;

/* The target language has plain block scoping:
 * - every conditional branch and every loop body lives in its own scope, opened and closed through with_scope
 * - a variable is visible iff it is in one of the scopes currently on the stack
 * - names come from a single counter, so they are never reused, even across sibling scopes
 * The state is created fresh for every sampled program, and must not be reused, as it owns the rng.
 */

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BranchKind {
    Conditional,
    Loop,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BranchPoint {
    pub kind: BranchKind,
    // ordinal among the branch points of the run, in emission order
    pub site: u32,
    // scope depth at the point where the construct starts
    pub depth: usize,
}

#[derive(Clone, Debug)]
pub struct ProgramState {
    rng: rand_chacha::ChaCha8Rng,
    scopes: Vec<Vec<String>>,
    next_var: VarNum,
    // Top-level variables that assignments overwrite, when sampling with a variable pool.
    pool: Vec<String>,
    meaningful_count: u32,
    min_meaningful: u32,
    max_int: i32,
    branch_points: Vec<BranchPoint>,
}
impl ProgramState {
    pub fn new(min_meaningful: u32, seed: u64) -> Self {
        ProgramState {
            rng: rand_chacha::ChaCha8Rng::seed_from_u64(seed),
            scopes: Vec::new(),
            next_var: 0,
            pool: Vec::new(),
            meaningful_count: 0,
            min_meaningful,
            max_int: DEFAULT_MAX_INT,
            branch_points: Vec::new(),
        }
    }
    pub fn from_config(config: &Config, seed: u64) -> Self {
        assert!(config.max_int > 1, "literals are drawn from [1, max_int)");
        ProgramState {
            max_int: config.max_int,
            ..ProgramState::new(config.min_meaningful, seed)
        }
    }

    pub fn is_done(&self) -> bool {
        self.meaningful_count >= self.min_meaningful
    }
    pub fn count_meaningful(&mut self) {
        self.meaningful_count += 1;
    }
    pub fn meaningful_count(&self) -> u32 {
        self.meaningful_count
    }
    pub fn min_meaningful(&self) -> u32 {
        self.min_meaningful
    }
    pub fn max_int(&self) -> i32 {
        self.max_int
    }

    fn push_scope(&mut self) {
        self.scopes.push(Vec::new());
        debug!("push_scope: depth={}", self.scopes.len());
    }
    fn pop_scope(&mut self) {
        let scope = self.scopes.pop();
        assert!(scope.is_some(), "unbalanced scope stack");
        debug!(
            "pop_scope: depth={}, discarded={:?}",
            self.scopes.len(),
            scope
        );
    }
    /// Runs `f` inside a new innermost scope, which is discarded afterwards.
    pub fn with_scope<T, F: FnOnce(&mut Self) -> T>(&mut self, f: F) -> T {
        self.push_scope();
        let depth = self.scopes.len();
        let result = f(self);
        assert_eq!(depth, self.scopes.len());
        self.pop_scope();
        result
    }
    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn visible_vars(&self) -> impl Iterator<Item = &String> {
        self.scopes.iter().flatten()
    }
    // All visible variables are equally likely, whatever their depth.
    pub fn pick_visible_var(&mut self) -> Option<String> {
        self.scopes.iter().flatten().choose(&mut self.rng).cloned()
    }

    // The new name is not visible until bind_var is called,
    // so that the expression defining it can't refer to it.
    pub fn make_fresh_var(&mut self) -> String {
        let v = self.next_var;
        self.next_var += 1;
        let name = var_name(v);
        trace!("make_fresh_var: {}", name);
        name
    }
    pub fn bind_var(&mut self, name: String) {
        match self.scopes.last_mut() {
            Some(scope) => scope.push(name),
            None => panic!("bind_var({}) called outside of any scope", name),
        }
    }
    pub fn vars_introduced(&self) -> VarNum {
        self.next_var
    }

    pub fn declare_pool_var(&mut self, name: String) {
        self.pool.push(name.clone());
        self.bind_var(name);
    }
    pub fn pick_pool_var(&mut self) -> Option<String> {
        self.pool.iter().choose(&mut self.rng).cloned()
    }

    pub fn add_branch_point(&mut self, kind: BranchKind) {
        let point = BranchPoint {
            kind,
            site: self.branch_points.len() as u32,
            depth: self.scopes.len(),
        };
        debug!("add_branch_point: {:?}", point);
        self.branch_points.push(point);
    }
    pub fn branch_points(&self) -> &[BranchPoint] {
        &self.branch_points
    }

    // Uniform in [0, 1)
    pub fn draw_unit(&mut self) -> f64 {
        Standard.sample(&mut self.rng)
    }
    pub fn draw_literal(&mut self) -> i32 {
        Uniform::new(1, self.max_int).sample(&mut self.rng)
    }
}
