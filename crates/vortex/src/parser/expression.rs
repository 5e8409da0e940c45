//! Expression tree for the restricted binding grammar.
//!
//! Every node here corresponds to one accepted shape; the parser never
//! produces a tree outside of these forms, so the interpreter does not need
//! to re-validate anything.

use smallvec::SmallVec;
use std::fmt;

/// Dotted property path, e.g. `user.address.city`.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub segments: SmallVec<[String; 4]>,
}

impl Path {
    pub fn new(segments: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn root(&self) -> &str {
        self.segments.first().map(String::as_str).unwrap_or_default()
    }

    pub fn dotted(&self) -> String {
        self.segments.join(".")
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.dotted())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Text(String),
    Number(f64),
    Bool(bool),
}

/// Right-hand side of a comparison or assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal(Literal),
    Path(Path),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    StrictEqual,
    StrictNotEqual,
    LooseEqual,
    LooseNotEqual,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// `path op number`, optionally wrapped in parentheses.
#[derive(Debug, Clone, PartialEq)]
pub struct Arithmetic {
    pub path: Path,
    pub op: ArithmeticOp,
    pub number: f64,
    pub parenthesized: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConcatPart {
    Literal(Literal),
    Path(Path),
    Arithmetic(Arithmetic),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Path(Path),
    Compare {
        left: Path,
        op: CompareOp,
        right: Operand,
    },
    Arithmetic(Arithmetic),
    Concat(Vec<ConcatPart>),
    Logical {
        left: Box<Expr>,
        op: LogicalOp,
        right: Box<Expr>,
    },
    Not(Path),
    Ternary {
        condition: Path,
        then: Literal,
        otherwise: Literal,
    },
}

impl Expr {
    /// State paths read by this expression, in source order, deduplicated.
    pub fn paths(&self) -> Vec<&Path> {
        let mut paths = Vec::new();
        self.collect_paths(&mut paths);
        let mut unique: Vec<&Path> = Vec::with_capacity(paths.len());
        for path in paths {
            if !unique.contains(&path) {
                unique.push(path);
            }
        }
        unique
    }

    fn collect_paths<'a>(&'a self, paths: &mut Vec<&'a Path>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Path(path) | Expr::Not(path) => paths.push(path),
            Expr::Compare { left, right, .. } => {
                paths.push(left);
                if let Operand::Path(right) = right {
                    paths.push(right);
                }
            }
            Expr::Arithmetic(arithmetic) => paths.push(&arithmetic.path),
            Expr::Concat(parts) => {
                for part in parts {
                    match part {
                        ConcatPart::Literal(_) => {}
                        ConcatPart::Path(path) => paths.push(path),
                        ConcatPart::Arithmetic(arithmetic) => paths.push(&arithmetic.path),
                    }
                }
            }
            Expr::Logical { left, right, .. } => {
                left.collect_paths(paths);
                right.collect_paths(paths);
            }
            Expr::Ternary { condition, .. } => paths.push(condition),
        }
    }
}

/// `<item> in <list>` clause of a list-expansion directive.
#[derive(Debug, Clone, PartialEq)]
pub struct ForClause {
    pub item: String,
    pub list: Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Increment,
    Decrement,
}

/// The only statement shapes an event handler may run.
#[derive(Debug, Clone, PartialEq)]
pub enum EventAction {
    /// `name()`: call a function stored in state.
    Call(String),
    /// `path++` / `path--`
    Step { target: Path, step: Step },
    /// `path = operand`
    Assign { target: Path, value: Operand },
}
