//! Executable expression IR produced by lowering.
//!
//! An [`Expr`] is a closed tree evaluated by [`eval`](crate::eval). Scoped
//! constructs (filters, projections, reductions) push a frame holding the
//! current item; `Current(depth)` reads the frame `depth` levels out.

use std::fmt;
use std::sync::Arc;

use crate::error::EvalError;
use crate::value::{DataType, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

pub type NativeFn = Arc<dyn Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync>;

/// A resolved function body with the name it was called by.
#[derive(Clone)]
pub struct Callable {
    pub name: String,
    pub body: NativeFn,
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callable({})", self.name)
    }
}

#[derive(Debug, Clone)]
pub enum Expr {
    Constant(Value),
    Current(usize),
    /// Index of the item being iterated `depth` frames out, 1-based.
    LoopIndex(usize),
    Parameter(String),
    Member {
        object: Box<Expr>,
        name: String,
    },
    Convert {
        value: Box<Expr>,
        to: DataType,
    },
    /// Arithmetic dispatched on runtime kinds.
    Arith {
        op: ArithOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Concat(Box<Expr>, Box<Expr>),
    DateAdd {
        date: Box<Expr>,
        offset: Box<Expr>,
        minus: bool,
    },
    ListConcat(Box<Expr>, Box<Expr>),
    Negate(Box<Expr>),
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logic {
        op: LogicOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    IsNull(Box<Expr>),
    If {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Call {
        function: Callable,
        args: Vec<Expr>,
    },
    ListIndex {
        list: Box<Expr>,
        index: Box<Expr>,
    },
    ListRange {
        list: Box<Expr>,
        from: Box<Expr>,
        to: Box<Expr>,
    },
    Filter {
        list: Box<Expr>,
        predicate: Box<Expr>,
    },
    Select {
        list: Box<Expr>,
        body: Box<Expr>,
    },
    SelectMany {
        list: Box<Expr>,
        body: Box<Expr>,
    },
    Reduce {
        list: Box<Expr>,
        body: Box<Expr>,
    },
    Compose {
        list: Box<Expr>,
        fields: Box<Expr>,
    },
    BuildList(Vec<Expr>),
    BuildObject(Vec<(String, Expr)>),
}

impl Expr {
    pub fn boxed(self) -> Box<Expr> {
        Box::new(self)
    }

    pub fn member(object: Expr, name: impl Into<String>) -> Expr {
        Expr::Member {
            object: object.boxed(),
            name: name.into(),
        }
    }

    pub fn convert(self, to: DataType) -> Expr {
        match self {
            Expr::Constant(value) => Expr::Constant(value.convert(to)),
            other => Expr::Convert {
                value: other.boxed(),
                to,
            },
        }
    }
}
