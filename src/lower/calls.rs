use std::sync::Arc;

use crate::error::CompileError;
use crate::expr::Expr;
use crate::functions::ArgumentType;
use crate::node::NodeId;
use crate::schema::RuntimeMembers;
use crate::value::DataType;

use super::{BuildContext, ExpressionWrapper, Lowerer};

impl Lowerer<'_> {
    /// `name(args...)`. Slot 0 holds the name, the arguments follow.
    pub(super) fn method(
        &mut self,
        id: NodeId,
        ctx: &BuildContext<'_>,
    ) -> Result<ExpressionWrapper, CompileError> {
        let name_node = self.slot(id, 0)?;
        let name = self.tree.text(name_node).to_string();
        let arguments = self.tree.arguments(id, 1);

        if name.eq_ignore_ascii_case("if") {
            return self.conditional(id, &arguments, ctx);
        }

        let mut args = Vec::with_capacity(arguments.len());
        for argument in arguments {
            args.push(self.lower_node(argument, ctx)?);
        }
        self.call(&name, args, id, false)
    }

    /// `if(condition, then, otherwise)`, evaluating one branch only.
    fn conditional(
        &mut self,
        id: NodeId,
        arguments: &[NodeId],
        ctx: &BuildContext<'_>,
    ) -> Result<ExpressionWrapper, CompileError> {
        let [condition, then, otherwise] = arguments else {
            return Err(CompileError::InvalidMethodCall {
                name: "if".to_string(),
                arguments: format!("{} arguments", arguments.len()),
            });
        };
        let condition = self.lower_node(*condition, ctx)?;
        let condition = self.settle(condition, DataType::Boolean)?;
        let then = self.lower(*then, ctx)?;
        let otherwise = self.lower(*otherwise, ctx)?;

        let shared = then.value_type == otherwise.value_type;
        let data_type = if shared {
            then.data_type()
        } else {
            DataType::Object
        };
        let item_type = if shared && then.item_type == otherwise.item_type {
            then.item_type
        } else {
            None
        };
        let members = then.members.clone().or_else(|| otherwise.members.clone());
        Ok(ExpressionWrapper::of(
            Expr::If {
                condition: condition.convert(DataType::Boolean).expr.boxed(),
                then: then.expr.boxed(),
                otherwise: otherwise.expr.boxed(),
            },
            data_type,
            id,
        )
        .with_items(item_type)
        .with_members(members))
    }

    /// Resolves `name` over the built-in library, then the external one,
    /// and calls it with `args` aligned to the chosen overload.
    pub(super) fn call(
        &mut self,
        name: &str,
        args: Vec<ExpressionWrapper>,
        node: NodeId,
        include_internal: bool,
    ) -> Result<ExpressionWrapper, CompileError> {
        let args = self.settle_arguments(name, args, include_internal)?;
        let types: Vec<ArgumentType> = args
            .iter()
            .map(|arg| ArgumentType {
                static_type: arg.data_type(),
                member_type: arg.member.as_ref().map(|m| m.data_type),
            })
            .collect();

        let resolution = self
            .registry
            .resolve(name, &types, include_internal)
            .or_else(|| self.externals.resolve(name, &types, include_internal))
            .ok_or_else(|| CompileError::InvalidMethodCall {
                name: name.to_string(),
                arguments: types
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            })?;

        let exprs = args
            .into_iter()
            .zip(&resolution.conversions)
            .map(|(arg, target)| arg.convert(*target).expr)
            .collect();
        let signature = &resolution.function.signature;
        let members = (!signature.item_fields.is_empty()).then(|| {
            let mut members = RuntimeMembers::new();
            for (field, data_type) in &signature.item_fields {
                members.insert(field, *data_type, None);
            }
            Arc::new(members)
        });

        Ok(ExpressionWrapper::new(
            Expr::Call {
                function: resolution.function.callable(),
                args: exprs,
            },
            signature.returns,
            node,
        )
        .with_items(signature.item_type)
        .with_members(members))
    }

    /// Parameter arguments take the type the first overload declares at
    /// their position.
    fn settle_arguments(
        &mut self,
        name: &str,
        args: Vec<ExpressionWrapper>,
        include_internal: bool,
    ) -> Result<Vec<ExpressionWrapper>, CompileError> {
        if !args.iter().any(|arg| arg.pending) {
            return Ok(args);
        }
        let arity = args.len();
        let signature = self
            .registry
            .candidates(name, arity, include_internal)
            .into_iter()
            .chain(self.externals.candidates(name, arity, include_internal))
            .next()
            .map(|f| f.signature.clone());

        let mut settled = Vec::with_capacity(arity);
        for (i, arg) in args.into_iter().enumerate() {
            let hint = signature
                .as_ref()
                .and_then(|s| s.param_at(i))
                .filter(|p| !p.fallback)
                .map(|p| p.data_type)
                .unwrap_or(DataType::Object);
            settled.push(self.settle(arg, hint)?);
        }
        Ok(settled)
    }
}
