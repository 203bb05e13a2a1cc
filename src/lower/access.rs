use std::sync::LazyLock;

use regex::Regex;

use crate::error::CompileError;
use crate::expr::Expr;
use crate::node::{NodeId, NodeKind};
use crate::schema::{ITEM_MEMBER, MemberDefinition, RuntimeMembers};
use crate::value::{DataType, Value};

use super::{BuildContext, ExpressionWrapper, Found, Lowerer};

static POSITIONAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$(\d+)$").unwrap_or_else(|_| unreachable!("positional pattern is valid"))
});

const LOOP_INDEX: &str = "$i";

/// Reads `name` from each item of `list`, flattening list members.
fn project(list: Expr, definition: &MemberDefinition) -> Expr {
    let body = Expr::member(Expr::Current(0), &definition.actual_name).boxed();
    if definition.data_type == DataType::List {
        Expr::SelectMany {
            list: list.boxed(),
            body,
        }
    } else {
        Expr::Select {
            list: list.boxed(),
            body,
        }
    }
}

impl Lowerer<'_> {
    pub(super) fn member_access(
        &mut self,
        id: NodeId,
        ctx: &BuildContext<'_>,
    ) -> Result<ExpressionWrapper, CompileError> {
        let name = self.tree.text(id);

        if name.eq_ignore_ascii_case(LOOP_INDEX) {
            let depth = ctx
                .loop_depth()
                .ok_or_else(|| CompileError::unknown_member(name))?;
            return Ok(ExpressionWrapper::of(
                Expr::LoopIndex(depth),
                DataType::Number,
                id,
            ));
        }
        if let Some(position) = POSITIONAL
            .captures(name)
            .and_then(|caps| caps[1].parse::<i64>().ok())
        {
            return Ok(ExpressionWrapper::of(
                Expr::ListIndex {
                    list: Expr::Current(0).boxed(),
                    index: Expr::Constant(Value::from(position)).boxed(),
                },
                DataType::Object,
                id,
            ));
        }

        match ctx.lookup(name) {
            Some(found) => Ok(self.found_member(found, id, ctx)),
            None if ctx.is_dynamic() => Ok(ExpressionWrapper::of(
                Expr::member(Expr::Current(0), name),
                DataType::Object,
                id,
            )),
            None => Err(CompileError::unknown_member(name)),
        }
    }

    fn found_member(&self, found: Found, id: NodeId, ctx: &BuildContext<'_>) -> ExpressionWrapper {
        let Found {
            definition,
            members,
            up,
            holder,
            via_default_scope,
            from_schema,
        } = found;

        let mut holder_expr = Expr::Current(up);
        if via_default_scope {
            holder_expr = Expr::member(holder_expr, &definition.scope);
        }
        let prefix = (from_schema && definition.is_container()).then(|| definition.unique_name.clone());
        let item_type = if from_schema {
            ctx.item_type_of(&definition)
        } else {
            (definition.data_type == DataType::List).then_some(DataType::Object)
        };

        if holder == DataType::List {
            let (item_type, members) = match definition.data_type {
                DataType::List => (item_type, members),
                DataType::Object => (Some(DataType::Object), members),
                scalar => (Some(scalar), None),
            };
            return ExpressionWrapper::of(project(holder_expr, &definition), DataType::List, id)
                .with_items(item_type)
                .with_members(members)
                .with_prefix(prefix);
        }

        let mut wrapper = ExpressionWrapper::of(
            Expr::member(holder_expr, &definition.actual_name),
            definition.data_type,
            id,
        )
        .with_items(item_type)
        .with_members(members)
        .with_prefix(prefix);
        wrapper.member = Some(definition);
        wrapper
    }

    /// `_`, the current value.
    pub(super) fn default_argument(&self, id: NodeId, ctx: &BuildContext<'_>) -> ExpressionWrapper {
        let member = if ctx.current_type == DataType::List {
            None
        } else {
            ctx.scope
                .as_deref()
                .and_then(|scope| ctx.schema.get(ITEM_MEMBER, scope))
                .cloned()
        };
        let mut wrapper = ExpressionWrapper::of(Expr::Current(0), ctx.current_type, id)
            .with_items(ctx.item_type)
            .with_members(ctx.local.clone())
            .with_prefix(ctx.scope.clone());
        wrapper.member = member;
        wrapper.implicit = true;
        wrapper
    }

    /// `left.name`. Over a list this projects every item.
    pub(super) fn dot(
        &mut self,
        id: NodeId,
        ctx: &BuildContext<'_>,
    ) -> Result<ExpressionWrapper, CompileError> {
        let left_id = self.slot(id, 0)?;
        let right_id = self.slot(id, 1)?;
        if self.tree.kind(right_id) != NodeKind::MemberAccess {
            return Err(CompileError::invalid_operand(
                self.tree.token(right_id),
                "expected a member name",
            ));
        }
        if self.tree.kind(left_id) == NodeKind::DefaultArgument {
            return self.member_access(right_id, ctx);
        }

        let left = self.lower(left_id, ctx)?;
        let name = self.tree.text(right_id);

        let runtime = left.members.as_ref().and_then(|m| m.get(name)).cloned();
        let resolved = match runtime {
            Some(member) => Some((member.definition, member.members, false)),
            None => left
                .prefix
                .as_deref()
                .and_then(|prefix| ctx.schema.get(name, prefix))
                .map(|definition| (definition.clone(), None, true)),
        };

        let Some((definition, members, from_schema)) = resolved else {
            let described = left.members.is_some()
                || left.prefix.as_deref().is_some_and(|prefix| ctx.describes(prefix));
            if described {
                return Err(CompileError::unknown_member(self.tree.render(id)));
            }
            return self.dynamic_read(left, name, id);
        };

        let prefix = (from_schema && definition.is_container()).then(|| definition.unique_name.clone());
        let item_type = if from_schema {
            ctx.item_type_of(&definition)
        } else {
            (definition.data_type == DataType::List).then_some(DataType::Object)
        };
        let members = match (members, &prefix) {
            (None, Some(prefix)) => RuntimeMembers::from_schema(ctx.schema, prefix),
            (members, _) => members,
        };

        if left.is_list() {
            let (item_type, members, prefix) = match definition.data_type {
                DataType::List => (item_type, members, prefix),
                DataType::Object => (Some(DataType::Object), members, prefix),
                scalar => (Some(scalar), None, None),
            };
            return Ok(
                ExpressionWrapper::of(project(left.expr, &definition), DataType::List, id)
                    .with_items(item_type)
                    .with_members(members)
                    .with_prefix(prefix),
            );
        }

        let mut wrapper = ExpressionWrapper::of(
            Expr::member(left.expr, &definition.actual_name),
            definition.data_type,
            id,
        )
        .with_items(item_type)
        .with_members(members)
        .with_prefix(prefix);
        wrapper.member = Some(definition);
        Ok(wrapper)
    }

    /// A member read from a value whose shape nothing describes.
    fn dynamic_read(
        &self,
        left: ExpressionWrapper,
        name: &str,
        id: NodeId,
    ) -> Result<ExpressionWrapper, CompileError> {
        let opaque_items = left.item_type.unwrap_or(DataType::Object) == DataType::Object;
        if left.is_list() && opaque_items {
            let expr = Expr::Select {
                list: left.expr.boxed(),
                body: Expr::member(Expr::Current(0), name).boxed(),
            };
            return Ok(ExpressionWrapper::of(expr, DataType::List, id)
                .with_items(Some(DataType::Object)));
        }
        if left.data_type() == DataType::Object {
            return Ok(ExpressionWrapper::of(
                Expr::member(left.expr, name),
                DataType::Object,
                id,
            ));
        }
        Err(CompileError::unknown_member(self.tree.render(id)))
    }

    /// `name <- expr`, binding the statement result for later statements.
    pub(super) fn export(
        &mut self,
        id: NodeId,
        ctx: &BuildContext<'_>,
    ) -> Result<ExpressionWrapper, CompileError> {
        if id != self.root {
            return Err(CompileError::invalid_operator(self.tree.token(id)));
        }
        let target = self.slot(id, 0)?;
        if self.tree.kind(target) != NodeKind::MemberAccess {
            return Err(CompileError::invalid_operand(
                self.tree.token(target),
                "expected a name to export to",
            ));
        }
        self.export = Some(self.tree.text(target).to_string());
        let value = self.slot(id, 1)?;
        self.lower(value, ctx)
    }
}
