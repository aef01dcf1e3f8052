/* Copyright (c) Meta Platforms, Inc. and affiliates. All rights reserved.
 *
 * This source code is licensed under the Apache 2.0 license found in
 * the LICENSE file in the root directory of this source tree.
 */
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;

use log::debug;
use thiserror::Error;

use crate::core_types::*;

// Allowed noise when checking that the weights of a choice point sum to 1.
pub const WEIGHT_TOLERANCE: Weight = 0.01;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Production {
    // statements
    Assign,
    Conditional,
    Loop,
    Nop,
    Sequence,
    // arithmetic expressions
    Int,
    Var,
    ArithBinop,
    // arithmetic operators
    Plus,
    Minus,
    Times,
    Div,
    Mod,
    // boolean expressions
    True,
    False,
    Compare,
    Or,
    And,
    Not,
    // comparison operators
    Lt,
    Gt,
    Le,
    Ge,
    Ne,
    Eq,
}
impl Production {
    /// Tokens are case-insensitive, and most productions accept a symbolic synonym.
    pub fn from_token(token: &str) -> Option<Self> {
        use Production::*;
        let production = match token.to_lowercase().as_str() {
            "aasgn" | "assign" => Assign,
            "condition" | "conditional" | "if" => Conditional,
            "loop" | "while" => Loop,
            "nop" | "skip" => Nop,
            "composition" | "sequence" | "seq" => Sequence,
            "int" => Int,
            "var" => Var,
            "abinop" => ArithBinop,
            "plus" | "+" => Plus,
            "minus" | "-" => Minus,
            "times" | "*" => Times,
            "div" | "/" => Div,
            "mod" | "%" => Mod,
            "true" => True,
            "false" => False,
            "bbinop" => Compare,
            "lor" | "or" | "||" | "|" => Or,
            "land" | "and" | "&&" | "&" => And,
            "not" | "!" => Not,
            "lt" | "<" => Lt,
            "gt" | ">" => Gt,
            "le" | "<=" => Le,
            "ge" | ">=" => Ge,
            "ne" | "!=" | "<>" => Ne,
            "eq" | "==" | "=" => Eq,
            _ => return None,
        };
        Some(production)
    }
}
impl fmt::Display for Production {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Production::Assign => "aasgn",
            Production::Conditional => "condition",
            Production::Loop => "loop",
            Production::Nop => "nop",
            Production::Sequence => "composition",
            Production::Int => "int",
            Production::Var => "var",
            Production::ArithBinop => "abinop",
            Production::Plus => "plus",
            Production::Minus => "minus",
            Production::Times => "times",
            Production::Div => "div",
            Production::Mod => "mod",
            Production::True => "true",
            Production::False => "false",
            Production::Compare => "bbinop",
            Production::Or => "lor",
            Production::And => "land",
            Production::Not => "not",
            Production::Lt => "lt",
            Production::Gt => "gt",
            Production::Le => "le",
            Production::Ge => "ge",
            Production::Ne => "ne",
            Production::Eq => "eq",
        };
        write!(f, "{}", token)
    }
}

/// A set of productions offered together at one recursion site of the sampler.
/// The weights of each choice point must form a probability distribution on their own.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChoicePoint {
    Statement,
    ArithExpr,
    ArithOp,
    BoolExpr,
    CompareOp,
}
impl ChoicePoint {
    pub fn productions(self) -> &'static [Production] {
        use Production::*;
        match self {
            ChoicePoint::Statement => &[Assign, Conditional, Loop, Nop, Sequence],
            ChoicePoint::ArithExpr => &[Int, Var, ArithBinop],
            ChoicePoint::ArithOp => &[Plus, Minus, Times, Div, Mod],
            ChoicePoint::BoolExpr => &[True, False, Compare, Or, And, Not],
            ChoicePoint::CompareOp => &[Lt, Gt, Le, Ge, Ne, Eq],
        }
    }
}
impl fmt::Display for ChoicePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChoicePoint::Statement => write!(f, "statement"),
            ChoicePoint::ArithExpr => write!(f, "arithmetic expression"),
            ChoicePoint::ArithOp => write!(f, "arithmetic operator"),
            ChoicePoint::BoolExpr => write!(f, "boolean expression"),
            ChoicePoint::CompareOp => write!(f, "comparison operator"),
        }
    }
}

pub const ALL_CHOICE_POINTS: &[ChoicePoint] = &[
    ChoicePoint::Statement,
    ChoicePoint::ArithExpr,
    ChoicePoint::ArithOp,
    ChoicePoint::BoolExpr,
    ChoicePoint::CompareOp,
];

#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("line {line}: unknown production symbol '{token}'")]
    UnknownProduction { line: usize, token: String },
    #[error("line {line}: missing weight")]
    MissingWeight { line: usize },
    #[error("line {line}: invalid weight '{value}'")]
    InvalidWeight { line: usize, value: String },
    #[error("line {line}: expected a production and a weight only")]
    TrailingTokens { line: usize },
    #[error("line {line}: production '{production}' is given a weight twice")]
    DuplicateProduction { line: usize, production: Production },
    #[error("no weight given for production '{0}'")]
    MissingProduction(Production),
    #[error("weights of the {choice} choice point sum to {sum}, not 1")]
    UnnormalizedChoice { choice: ChoicePoint, sum: Weight },
    #[error("aasgn, condition and loop all have weight 0, so sampling could never terminate")]
    NoMeaningfulStatement,
    #[error("could not read grammar from {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub fn is_distribution<I: IntoIterator<Item = Weight>>(weights: I) -> bool {
    let mut sum = 0.0;
    for w in weights {
        if w < 0.0 {
            return false;
        }
        sum += w;
    }
    sum >= 1.0 - WEIGHT_TOLERANCE && sum <= 1.0 + WEIGHT_TOLERANCE
}

/// Maps every production to its probability, conditional on the choice point it belongs to.
/// Only validated grammars can be constructed.
#[derive(Clone, Debug, PartialEq)]
pub struct Grammar {
    weights: HashMap<Production, Weight>,
}
impl Grammar {
    pub fn uniform() -> Self {
        let mut weights = HashMap::new();
        for choice in ALL_CHOICE_POINTS {
            let productions = choice.productions();
            for p in productions {
                weights.insert(*p, 1.0 / productions.len() as Weight);
            }
        }
        Grammar { weights }
    }

    pub fn parse(text: &str) -> Result<Self, GrammarError> {
        let mut weights = HashMap::new();
        for (i, raw_line) in text.lines().enumerate() {
            let line = i + 1;
            let mut tokens = raw_line.split_whitespace();
            let token = match tokens.next() {
                None => continue,
                Some(t) if t.starts_with('#') => continue,
                Some(t) => t,
            };
            let production =
                Production::from_token(token).ok_or_else(|| GrammarError::UnknownProduction {
                    line,
                    token: token.to_string(),
                })?;
            let value = tokens.next().ok_or(GrammarError::MissingWeight { line })?;
            let weight = match value.parse::<Weight>() {
                Ok(w) if w.is_finite() && w >= 0.0 => w,
                _ => {
                    return Err(GrammarError::InvalidWeight {
                        line,
                        value: value.to_string(),
                    });
                }
            };
            if tokens.next().is_some() {
                return Err(GrammarError::TrailingTokens { line });
            }
            if weights.insert(production, weight).is_some() {
                return Err(GrammarError::DuplicateProduction { line, production });
            }
        }
        let grammar = Grammar { weights };
        grammar.validate()?;
        debug!("parsed grammar: {:?}", grammar.weights);
        Ok(grammar)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, GrammarError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| GrammarError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    fn validate(&self) -> Result<(), GrammarError> {
        for choice in ALL_CHOICE_POINTS {
            if let Some(p) = choice
                .productions()
                .iter()
                .find(|p| !self.weights.contains_key(*p))
            {
                return Err(GrammarError::MissingProduction(*p));
            }
            let weights = self.weights(*choice);
            if !is_distribution(weights.iter().copied()) {
                return Err(GrammarError::UnnormalizedChoice {
                    choice: *choice,
                    sum: weights.iter().sum(),
                });
            }
        }
        let meaningful = [
            Production::Assign,
            Production::Conditional,
            Production::Loop,
        ];
        if meaningful.iter().all(|p| self.weights[p] == 0.0) {
            return Err(GrammarError::NoMeaningfulStatement);
        }
        Ok(())
    }

    pub fn weight(&self, p: Production) -> Weight {
        // validate() guarantees that every production of every choice point has a weight
        self.weights[&p]
    }

    pub fn weights(&self, choice: ChoicePoint) -> Vec<Weight> {
        choice.productions().iter().map(|p| self.weight(*p)).collect()
    }
}
impl FromStr for Grammar {
    type Err = GrammarError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Grammar::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIFORM_TEXT: &str = "
aasgn 0.2
condition 0.2
loop 0.2
nop 0.2
composition 0.2
int 0.3333
var 0.3333
abinop 0.3334
plus 0.2
minus 0.2
times 0.2
div 0.2
mod 0.2
true 0.1666
false 0.1666
bbinop 0.1667
lor 0.1667
land 0.1667
not 0.1667
lt 0.1666
gt 0.1666
le 0.1667
ge 0.1667
ne 0.1667
eq 0.1667
";

    #[test]
    fn uniform_is_normalized_per_choice_point() {
        let g = Grammar::uniform();
        for choice in ALL_CHOICE_POINTS {
            assert!(is_distribution(g.weights(*choice)), "{}", choice);
        }
        assert_eq!(g.weight(Production::Assign), 0.2);
        assert_eq!(g.weight(Production::Int), 1.0 / 3.0);
    }

    #[test]
    fn parses_word_tokens() {
        let g = Grammar::parse(UNIFORM_TEXT).unwrap();
        assert_eq!(g.weight(Production::Sequence), 0.2);
        assert_eq!(g.weight(Production::ArithBinop), 0.3334);
    }

    #[test]
    fn symbolic_synonyms_and_case_are_accepted() {
        let text = UNIFORM_TEXT
            .replace("plus", "+")
            .replace("mod", "%")
            .replace("lor", "||")
            .replace("land", "&")
            .replace("not", "!")
            .replace("ne ", "<> ")
            .replace("eq", "==")
            .replace("aasgn", "AASGN")
            .replace("condition", "Condition");
        let g = Grammar::parse(&text).unwrap();
        assert_eq!(g, Grammar::parse(UNIFORM_TEXT).unwrap());
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let text = format!("# statement weights\n\n{}\n   \n", UNIFORM_TEXT);
        assert!(Grammar::parse(&text).is_ok());
    }

    #[test]
    fn unknown_token_reports_its_line() {
        let text = UNIFORM_TEXT.replace("times", "pow");
        match Grammar::parse(&text) {
            Err(GrammarError::UnknownProduction { line, token }) => {
                assert_eq!(line, 12);
                assert_eq!(token, "pow");
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn malformed_weights_are_rejected() {
        assert!(matches!(
            Grammar::parse("aasgn\n"),
            Err(GrammarError::MissingWeight { line: 1 })
        ));
        assert!(matches!(
            Grammar::parse("aasgn abc\n"),
            Err(GrammarError::InvalidWeight { line: 1, .. })
        ));
        assert!(matches!(
            Grammar::parse("aasgn -0.2\n"),
            Err(GrammarError::InvalidWeight { line: 1, .. })
        ));
        assert!(matches!(
            Grammar::parse("aasgn 0.2 0.3\n"),
            Err(GrammarError::TrailingTokens { line: 1 })
        ));
        assert!(matches!(
            Grammar::parse("aasgn 0.2\nassign 0.2\n"),
            Err(GrammarError::DuplicateProduction {
                line: 2,
                production: Production::Assign
            })
        ));
    }

    #[test]
    fn missing_production_is_rejected() {
        let text = UNIFORM_TEXT.replace("nop 0.2\n", "");
        assert!(matches!(
            Grammar::parse(&text),
            Err(GrammarError::MissingProduction(Production::Nop))
        ));
    }

    #[test]
    fn unnormalized_choice_point_is_rejected() {
        let text = UNIFORM_TEXT.replace("loop 0.2", "loop 0.5");
        match Grammar::parse(&text) {
            Err(GrammarError::UnnormalizedChoice { choice, sum }) => {
                assert_eq!(choice, ChoicePoint::Statement);
                assert!((sum - 1.3).abs() < 1e-9);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn grammar_that_cannot_terminate_is_rejected() {
        let text = UNIFORM_TEXT
            .replace("aasgn 0.2", "aasgn 0")
            .replace("condition 0.2", "condition 0")
            .replace("loop 0.2", "loop 0")
            .replace("nop 0.2", "nop 0.5")
            .replace("composition 0.2", "composition 0.5");
        assert!(matches!(
            Grammar::parse(&text),
            Err(GrammarError::NoMeaningfulStatement)
        ));
    }

    #[test]
    fn tolerance_allows_rounding_noise() {
        assert!(is_distribution([0.333, 0.333, 0.333]));
        assert!(!is_distribution([0.3, 0.3, 0.3]));
        assert!(!is_distribution([1.5, -0.5]));
    }

    #[test]
    fn tolerance_bounds_are_inclusive() {
        assert!(is_distribution([0.33, 0.33, 0.33]));
        assert!(is_distribution([0.34, 0.34, 0.33]));
        assert!(is_distribution([0.495, 0.495]));
        assert!(is_distribution([0.2, 0.2, 0.2, 0.2, 0.19]));
        assert!(!is_distribution([0.33, 0.33, 0.32]));
        assert!(!is_distribution([0.34, 0.34, 0.34]));
    }

    #[test]
    fn hand_rounded_weights_are_accepted() {
        let thirds = UNIFORM_TEXT
            .replace("int 0.3333", "int 0.33")
            .replace("var 0.3333", "var 0.33")
            .replace("abinop 0.3334", "abinop 0.33");
        assert!(Grammar::parse(&thirds).is_ok());
        let over = UNIFORM_TEXT
            .replace("int 0.3333", "int 0.34")
            .replace("var 0.3333", "var 0.34")
            .replace("abinop 0.3334", "abinop 0.33");
        assert!(Grammar::parse(&over).is_ok());
        let halves = UNIFORM_TEXT
            .replace("aasgn 0.2", "aasgn 0.495")
            .replace("condition 0.2", "condition 0")
            .replace("loop 0.2", "loop 0.495")
            .replace("nop 0.2", "nop 0")
            .replace("composition 0.2", "composition 0");
        let g = Grammar::parse(&halves).unwrap();
        assert_eq!(g.weight(Production::Loop), 0.495);
    }
}
