use crate::error::CompileError;
use crate::expr::{ArithOp, CompareOp, Expr, LogicOp};
use crate::node::{NodeId, NodeKind};
use crate::value::{DataType, Value};

use super::{BuildContext, ExpressionWrapper, Lowerer};

type Operands = (ExpressionWrapper, ExpressionWrapper);

fn arith(op: ArithOp, left: ExpressionWrapper, right: ExpressionWrapper) -> Expr {
    Expr::Arith {
        op,
        left: left.expr.boxed(),
        right: right.expr.boxed(),
    }
}

/// Type a parameter takes next to an operand of `sibling` in `+`.
fn addition_hint(sibling: &ExpressionWrapper) -> DataType {
    match sibling.expected() {
        DataType::Number => DataType::Number,
        DataType::Text | DataType::DateTime => DataType::Text,
        DataType::List => DataType::List,
        _ => DataType::Object,
    }
}

/// Name of the first operand when both are unsettled parameters.
fn linked_name(left: &ExpressionWrapper, right: &ExpressionWrapper) -> Option<String> {
    if left.pending && right.pending {
        left.parameter.clone()
    } else {
        None
    }
}

impl Lowerer<'_> {
    /// `@a + @b` stays pending under `a` while the pair is undecided, so
    /// the surrounding operator settles both.
    fn carry_link(&self, mut wrapper: ExpressionWrapper, linked: Option<String>) -> ExpressionWrapper {
        if let Some(name) = linked {
            if wrapper.data_type() == DataType::Object && self.params.type_of(&name).is_none() {
                wrapper.parameter = Some(name);
                wrapper.pending = true;
            }
        }
        wrapper
    }

    fn operands(&mut self, id: NodeId, ctx: &BuildContext<'_>) -> Result<Operands, CompileError> {
        let left = self.slot(id, 0)?;
        let right = self.slot(id, 1)?;
        let left = self.lower_node(left, ctx)?;
        let right = self.lower_node(right, ctx)?;
        Ok((left, right))
    }

    fn mismatch(&self, id: NodeId, left: &ExpressionWrapper, right: &ExpressionWrapper) -> CompileError {
        CompileError::invalid_operand(
            self.tree.token(id),
            format!("cannot apply to {} and {}", left.value_type, right.value_type),
        )
    }

    pub(super) fn add(
        &mut self,
        id: NodeId,
        ctx: &BuildContext<'_>,
    ) -> Result<ExpressionWrapper, CompileError> {
        let (left, right) = self.operands(id, ctx)?;
        let linked = linked_name(&left, &right);
        let (left, right) = self.settle_pair(left, right, addition_hint)?;
        use DataType::{List, Number, Object, Text};

        let wrapper = match (left.expected(), right.expected()) {
            (Number, Number) => ExpressionWrapper::of(
                arith(ArithOp::Add, left.align(), right.align()),
                Number,
                id,
            ),
            (DataType::DateTime, Text) => ExpressionWrapper::of(
                Expr::DateAdd {
                    date: left.align().expr.boxed(),
                    offset: right.align().expr.boxed(),
                    minus: false,
                },
                DataType::DateTime,
                id,
            ),
            (Text, DataType::DateTime) => ExpressionWrapper::of(
                Expr::DateAdd {
                    date: right.align().expr.boxed(),
                    offset: left.align().expr.boxed(),
                    minus: false,
                },
                DataType::DateTime,
                id,
            ),
            (Text, _) | (_, Text) => ExpressionWrapper::of(
                Expr::Concat(
                    left.convert(Text).expr.boxed(),
                    right.convert(Text).expr.boxed(),
                ),
                Text,
                id,
            ),
            (List, List) => {
                let item_type = match (left.item_type, right.item_type) {
                    (Some(a), Some(b)) if a == b => Some(a),
                    _ => Some(Object),
                };
                let members = match (&left.members, &right.members) {
                    (Some(a), Some(b)) => {
                        let mut merged = (**a).clone();
                        merged.union(b);
                        Some(merged.into())
                    }
                    (a, b) => a.clone().or_else(|| b.clone()),
                };
                let prefix = left.prefix.clone().or_else(|| right.prefix.clone());
                ExpressionWrapper::of(
                    Expr::ListConcat(left.expr.boxed(), right.expr.boxed()),
                    List,
                    id,
                )
                .with_items(item_type)
                .with_members(members)
                .with_prefix(prefix)
            }
            (Object, _) | (_, Object) => {
                ExpressionWrapper::of(arith(ArithOp::Add, left, right), Object, id)
            }
            _ => return Err(self.mismatch(id, &left, &right)),
        };
        Ok(self.carry_link(wrapper, linked))
    }

    pub(super) fn subtract(
        &mut self,
        id: NodeId,
        ctx: &BuildContext<'_>,
    ) -> Result<ExpressionWrapper, CompileError> {
        let (left, right) = self.operands(id, ctx)?;
        if left.is_void() {
            let operand = self.settle(right, DataType::Number)?;
            return match operand.expected() {
                DataType::Number | DataType::Object => Ok(ExpressionWrapper::of(
                    Expr::Negate(operand.convert(DataType::Number).expr.boxed()),
                    DataType::Number,
                    id,
                )),
                _ => Err(CompileError::invalid_operand(
                    self.tree.token(id),
                    format!("cannot negate {}", operand.value_type),
                )),
            };
        }

        let linked = linked_name(&left, &right);
        let (left, right) = self.settle_pair(left, right, |sibling| match sibling.expected() {
            DataType::DateTime => DataType::Text,
            _ => DataType::Number,
        })?;
        let wrapper = match (left.expected(), right.expected()) {
            (DataType::Number, DataType::Number) => ExpressionWrapper::of(
                arith(ArithOp::Subtract, left.align(), right.align()),
                DataType::Number,
                id,
            ),
            (DataType::DateTime, DataType::Text) => ExpressionWrapper::of(
                Expr::DateAdd {
                    date: left.align().expr.boxed(),
                    offset: right.align().expr.boxed(),
                    minus: true,
                },
                DataType::DateTime,
                id,
            ),
            (DataType::Object, _) | (_, DataType::Object) => ExpressionWrapper::of(
                arith(ArithOp::Subtract, left, right),
                DataType::Object,
                id,
            ),
            _ => return Err(self.mismatch(id, &left, &right)),
        };
        Ok(self.carry_link(wrapper, linked))
    }

    /// `*` and `/`.
    pub(super) fn multiplicative(
        &mut self,
        id: NodeId,
        ctx: &BuildContext<'_>,
    ) -> Result<ExpressionWrapper, CompileError> {
        let op = match self.tree.kind(id) {
            NodeKind::Divide => ArithOp::Divide,
            _ => ArithOp::Multiply,
        };
        let (left, right) = self.operands(id, ctx)?;
        let left = self.settle(left, DataType::Number)?;
        let right = self.settle(right, DataType::Number)?;
        match (left.expected(), right.expected()) {
            (DataType::Number, DataType::Number) => Ok(ExpressionWrapper::of(
                arith(op, left.align(), right.align()),
                DataType::Number,
                id,
            )),
            (DataType::Object, _) | (_, DataType::Object) => {
                Ok(ExpressionWrapper::of(arith(op, left, right), DataType::Object, id))
            }
            _ => Err(self.mismatch(id, &left, &right)),
        }
    }

    pub(super) fn compare(
        &mut self,
        id: NodeId,
        op: CompareOp,
        ctx: &BuildContext<'_>,
    ) -> Result<ExpressionWrapper, CompileError> {
        let left_id = self.slot(id, 0)?;
        let right_id = self.slot(id, 1)?;

        if matches!(op, CompareOp::Equal | CompareOp::NotEqual) {
            let checked = if self.is_null_constant(right_id) {
                Some(left_id)
            } else if self.is_null_constant(left_id) {
                Some(right_id)
            } else {
                None
            };
            if let Some(operand) = checked {
                let operand = self.lower(operand, ctx)?;
                let mut expr = Expr::IsNull(operand.expr.boxed());
                if op == CompareOp::NotEqual {
                    expr = Expr::Not(expr.boxed());
                }
                return Ok(ExpressionWrapper::of(expr, DataType::Boolean, id));
            }
        }

        let (left, right) = self.operands(id, ctx)?;
        let (left, right) = self.settle_pair(left, right, |sibling| sibling.expected())?;
        let (left, right) = match (left.expected(), right.expected()) {
            (DataType::Text, DataType::DateTime) | (DataType::DateTime, DataType::Text) => (
                left.convert(DataType::DateTime),
                right.convert(DataType::DateTime),
            ),
            (DataType::Text, other) if other != DataType::Text && !right.is_parameter() => {
                (left, right.convert(DataType::Text))
            }
            (other, DataType::Text) if other != DataType::Text && !left.is_parameter() => {
                (left.convert(DataType::Text), right)
            }
            _ => (left.align(), right.align()),
        };
        Ok(ExpressionWrapper::of(
            Expr::Compare {
                op,
                left: left.expr.boxed(),
                right: right.expr.boxed(),
            },
            DataType::Boolean,
            id,
        ))
    }

    pub(super) fn like(
        &mut self,
        id: NodeId,
        ctx: &BuildContext<'_>,
    ) -> Result<ExpressionWrapper, CompileError> {
        let (value, pattern) = self.operands(id, ctx)?;
        let value = self.settle(value, DataType::Text)?;
        let pattern = self.settle(pattern, DataType::Text)?;
        self.call("like", vec![value, pattern], id, true)
    }

    /// `and` and `or`.
    pub(super) fn logic(
        &mut self,
        id: NodeId,
        ctx: &BuildContext<'_>,
    ) -> Result<ExpressionWrapper, CompileError> {
        let op = match self.tree.kind(id) {
            NodeKind::Or => LogicOp::Or,
            _ => LogicOp::And,
        };
        let (left, right) = self.operands(id, ctx)?;
        let left = self.settle(left, DataType::Boolean)?;
        let right = self.settle(right, DataType::Boolean)?;
        Ok(ExpressionWrapper::of(
            Expr::Logic {
                op,
                left: left.convert(DataType::Boolean).expr.boxed(),
                right: right.convert(DataType::Boolean).expr.boxed(),
            },
            DataType::Boolean,
            id,
        ))
    }

    pub(super) fn not(
        &mut self,
        id: NodeId,
        ctx: &BuildContext<'_>,
    ) -> Result<ExpressionWrapper, CompileError> {
        let operand = self.slot(id, 1)?;
        let operand = self.lower_node(operand, ctx)?;
        let operand = self.settle(operand, DataType::Boolean)?;
        Ok(ExpressionWrapper::of(
            Expr::Not(operand.convert(DataType::Boolean).expr.boxed()),
            DataType::Boolean,
            id,
        ))
    }

    /// `value between [low, high)`. Bounds and value are compared as dates
    /// when any of them is a date, otherwise as numbers.
    pub(super) fn between(
        &mut self,
        id: NodeId,
        ctx: &BuildContext<'_>,
    ) -> Result<ExpressionWrapper, CompileError> {
        let flag = |slot: usize| -> Result<bool, CompileError> {
            let node = self.slot(id, slot)?;
            self.tree.token(node).flag().ok_or_else(|| {
                CompileError::invalid_operand(self.tree.token(node), "expected a bracket")
            })
        };
        let low_inclusive = flag(1)?;
        let high_inclusive = flag(4)?;

        let mut operands = Vec::with_capacity(3);
        for slot in [0, 2, 3] {
            let node = self.slot(id, slot)?;
            operands.push(self.lower_node(node, ctx)?);
        }
        let target = if operands
            .iter()
            .any(|w| !w.pending && w.expected() == DataType::DateTime)
        {
            DataType::DateTime
        } else {
            DataType::Number
        };

        let mut args = Vec::with_capacity(5);
        for operand in operands {
            let operand = self.settle(operand, target)?;
            args.push(operand.convert(target));
        }
        for inclusive in [low_inclusive, high_inclusive] {
            args.push(ExpressionWrapper::of(
                Expr::Constant(Value::Boolean(inclusive)),
                DataType::Boolean,
                id,
            ));
        }
        self.call("between", args, id, true)
    }
}
