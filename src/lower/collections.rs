use std::sync::Arc;

use crate::error::CompileError;
use crate::expr::Expr;
use crate::node::{NodeId, NodeKind};
use crate::schema::RuntimeMembers;
use crate::value::{DataType, Value};

use super::{BuildContext, ExpressionWrapper, Lowerer};

impl Lowerer<'_> {
    /// `list[index]`, `list[condition]`, `list[from..to]` and the `[a, b]`
    /// literal (an array with an empty target).
    pub(super) fn array(
        &mut self,
        id: NodeId,
        ctx: &BuildContext<'_>,
    ) -> Result<ExpressionWrapper, CompileError> {
        let target = self.slot(id, 0)?;
        let indexes = self.tree.arguments(id, 1);
        if self.tree.kind(target) == NodeKind::Empty {
            return self.list_literal(id, &indexes, ctx);
        }

        let list = self.lower(target, ctx)?;
        if !list.is_list() && !list.is_dynamic() {
            return Err(CompileError::not_a_list(self.tree.token(target)));
        }
        let &[index] = indexes.as_slice() else {
            return Err(CompileError::invalid_operand(
                self.tree.token(id),
                "expected exactly one index",
            ));
        };

        if self.tree.kind(index) == NodeKind::Range {
            return self.list_range(id, index, list, ctx);
        }

        let condition = {
            let items = ctx.child(&list, true);
            self.lower_node(index, &items)?
        };
        if condition.data_type() == DataType::Boolean {
            let expr = Expr::Filter {
                list: list.expr.boxed(),
                predicate: condition.expr.boxed(),
            };
            return Ok(ExpressionWrapper::of(expr, DataType::List, id)
                .with_items(list.item_type)
                .with_members(list.members)
                .with_prefix(list.prefix));
        }
        if !(condition.pending || condition.expected() == DataType::Number) {
            return Err(CompileError::invalid_operand(
                self.tree.token(index),
                format!("cannot index a list with {}", condition.value_type),
            ));
        }

        // A position is evaluated outside the item scope.
        let position = self.lower_node(index, ctx)?;
        let position = self.settle(position, DataType::Number)?;
        let expr = Expr::ListIndex {
            list: list.expr.boxed(),
            index: position.convert(DataType::Number).expr.boxed(),
        };
        Ok(
            ExpressionWrapper::of(expr, list.item_type.unwrap_or(DataType::Object), id)
                .with_members(list.members)
                .with_prefix(list.prefix),
        )
    }

    fn list_range(
        &mut self,
        id: NodeId,
        range: NodeId,
        list: ExpressionWrapper,
        ctx: &BuildContext<'_>,
    ) -> Result<ExpressionWrapper, CompileError> {
        let (from, to) = (self.tree.left(range), self.tree.right(range));
        let mut bound = |node: Option<NodeId>, missing: Value| -> Result<Expr, CompileError> {
            match node {
                Some(node) if self.tree.kind(node) != NodeKind::Empty => {
                    let bound = self.lower_node(node, ctx)?;
                    let bound = self.settle(bound, DataType::Number)?;
                    Ok(bound.convert(DataType::Number).expr)
                }
                _ => Ok(Expr::Constant(missing)),
            }
        };
        let from = bound(from, Value::from(1))?;
        let to = bound(to, Value::Null)?;
        let expr = Expr::ListRange {
            list: list.expr.boxed(),
            from: from.boxed(),
            to: to.boxed(),
        };
        Ok(ExpressionWrapper::of(expr, DataType::List, id)
            .with_items(list.item_type)
            .with_members(list.members)
            .with_prefix(list.prefix))
    }

    fn list_literal(
        &mut self,
        id: NodeId,
        elements: &[NodeId],
        ctx: &BuildContext<'_>,
    ) -> Result<ExpressionWrapper, CompileError> {
        let mut items = Vec::with_capacity(elements.len());
        let mut item_type: Option<DataType> = None;
        let mut members: Option<RuntimeMembers> = None;
        for &element in elements {
            let element = self.lower(element, ctx)?;
            item_type = match item_type {
                None => Some(element.data_type()),
                Some(t) if t == element.data_type() => Some(t),
                Some(_) => Some(DataType::Object),
            };
            if let Some(element_members) = &element.members {
                members
                    .get_or_insert_with(RuntimeMembers::new)
                    .union(element_members);
            }
            items.push(element.expr);
        }
        Ok(ExpressionWrapper::of(Expr::BuildList(items), DataType::List, id)
            .with_items(Some(item_type.unwrap_or(DataType::Object)))
            .with_members(members.map(Arc::new)))
    }

    /// `{a, b: expr}`. Unnamed fields take the name of the member they read,
    /// otherwise `_1`, `_2`, ... by position.
    pub(super) fn object(
        &mut self,
        id: NodeId,
        ctx: &BuildContext<'_>,
    ) -> Result<ExpressionWrapper, CompileError> {
        let mut fields = Vec::new();
        let mut members = RuntimeMembers::new();
        for (i, field) in self.tree.arguments(id, 0).into_iter().enumerate() {
            let (name, value) = if self.tree.kind(field) == NodeKind::Colon {
                let label = self.slot(field, 0)?;
                (self.tree.text(label).to_string(), self.slot(field, 1)?)
            } else {
                (self.field_name(field, i), field)
            };
            let value = self.lower(value, ctx)?;
            let nested = match (&value.members, &value.prefix) {
                (None, Some(prefix)) => RuntimeMembers::from_schema(ctx.schema, prefix),
                (nested, _) => nested.clone(),
            };
            members.insert(&name, value.data_type(), nested);
            fields.push((name, value.expr));
        }
        Ok(ExpressionWrapper::of(Expr::BuildObject(fields), DataType::Object, id)
            .with_members(Some(Arc::new(members))))
    }

    fn field_name(&self, field: NodeId, position: usize) -> String {
        let mut node = field;
        loop {
            match self.tree.kind(node) {
                NodeKind::MemberAccess => return self.tree.text(node).to_string(),
                NodeKind::Parameter => return self.tree.token(node).parameter_name().to_string(),
                NodeKind::Dot => match self.tree.right(node) {
                    Some(right) => return self.tree.text(right).to_string(),
                    None => break,
                },
                NodeKind::Array => match self.tree.left(node) {
                    Some(left) => node = left,
                    None => break,
                },
                _ => break,
            }
        }
        format!("_{}", position + 1)
    }

    /// `list => body`, one body result per item. Without a list the current
    /// value is iterated.
    pub(super) fn yield_items(
        &mut self,
        id: NodeId,
        ctx: &BuildContext<'_>,
    ) -> Result<ExpressionWrapper, CompileError> {
        let list = match self.tree.left(id) {
            Some(left) if self.tree.kind(left) != NodeKind::Empty => self.lower(left, ctx)?,
            _ => self.default_argument(id, ctx),
        };
        if !matches!(list.data_type(), DataType::List | DataType::Object) {
            return Err(CompileError::invalid_operator(self.tree.token(id)));
        }
        let body = self.slot(id, 1)?;
        let body = {
            let items = ctx.child(&list, true);
            self.lower(body, &items)?
        };
        let body_type = body.data_type();
        let expr = Expr::Select {
            list: list.expr.boxed(),
            body: body.expr.boxed(),
        };
        Ok(ExpressionWrapper::of(expr, DataType::List, id)
            .with_items(Some(body_type))
            .with_members(body.members)
            .with_prefix(body.prefix))
    }

    /// `list -> body`, the body evaluated once with the whole list current.
    pub(super) fn reduce(
        &mut self,
        id: NodeId,
        ctx: &BuildContext<'_>,
    ) -> Result<ExpressionWrapper, CompileError> {
        let left = self.slot(id, 0)?;
        let list = self.lower(left, ctx)?;
        if !list.is_list() {
            return Err(CompileError::invalid_operand(
                self.tree.token(left),
                format!("cannot reduce {}", list.value_type),
            ));
        }
        let body = self.slot(id, 1)?;
        let body = {
            let whole = ctx.child(&list, false);
            self.lower(body, &whole)?
        };
        let expr = Expr::Reduce {
            list: list.expr.boxed(),
            body: body.expr.boxed(),
        };
        Ok(ExpressionWrapper::new(expr, body.value_type, id)
            .with_items(body.item_type)
            .with_members(body.members)
            .with_prefix(body.prefix))
    }

    /// `list | {fields}`, adding computed fields to every item.
    pub(super) fn compose(
        &mut self,
        id: NodeId,
        ctx: &BuildContext<'_>,
    ) -> Result<ExpressionWrapper, CompileError> {
        let left = self.slot(id, 0)?;
        let list = self.lower(left, ctx)?;
        if !list.is_list() {
            return Err(CompileError::invalid_operand(
                self.tree.token(left),
                format!("cannot compose {}", list.value_type),
            ));
        }
        let right = self.slot(id, 1)?;
        let fields = self.lower(right, ctx)?;

        let mut members = fields.members.as_deref().cloned().unwrap_or_default();
        if let Some(existing) = &list.members {
            members.union(existing);
        }
        let expr = Expr::Compose {
            list: list.expr.boxed(),
            fields: fields.expr.boxed(),
        };
        Ok(ExpressionWrapper::of(expr, DataType::List, id)
            .with_items(Some(DataType::Object))
            .with_members(Some(Arc::new(members)))
            .with_prefix(list.prefix))
    }
}
