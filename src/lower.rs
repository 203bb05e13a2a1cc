//! Type-directed lowering from syntax tree to [`Expr`].
//!
//! Every node lowers to an [`ExpressionWrapper`]: the expression plus its
//! static type, the schema member it reads and the members known for the
//! values it produces. Operators use those types to pick an operation and
//! insert conversions:
//!
//! ```text
//! Time + '1d'          datetime + text   ->  date offset
//! Name + Age           text + number     ->  concatenation
//! Items[Price > 3]     boolean index     ->  filter
//! Items[2]             number index      ->  element
//! Items.Price          list member       ->  projection
//! ```
//!
//! Parameters take the type their position asks for. When two parameters
//! only constrain each other, [`ParameterManager`] links them until one of
//! them meets a concrete type.

mod access;
mod calls;
mod collections;
mod context;
mod operators;
mod params;
mod wrapper;

pub use context::{BuildContext, Found};
pub use params::{ParameterDefinition, ParameterManager};
pub use wrapper::ExpressionWrapper;

use tracing::debug;

use crate::error::CompileError;
use crate::expr::Expr;
use crate::functions::FunctionRegistry;
use crate::node::{NodeId, NodeKind, Tree};
use crate::parser::SyntaxTree;
use crate::schema::MemberDescriptor;
use crate::token::{Literal, TokenKind};
use crate::value::{DataType, Value, ValueType};

/// Result of lowering one statement.
#[derive(Debug, Clone)]
pub struct Lowered {
    pub expr: Expr,
    pub value_type: ValueType,
    pub item_type: Option<DataType>,
    pub parameters: Vec<ParameterDefinition>,
    /// Name bound by a top-level `name <- expr`.
    pub export: Option<String>,
}

/// Lowers the statement in `syntax` against `schema`.
pub fn lower(
    syntax: &SyntaxTree,
    schema: &dyn MemberDescriptor,
    registry: &FunctionRegistry,
    externals: &FunctionRegistry,
    declared: &[ParameterDefinition],
) -> Result<Lowered, CompileError> {
    let mut lowerer = Lowerer {
        tree: syntax.tree(),
        registry,
        externals,
        params: ParameterManager::with_declared(declared)?,
        export: None,
        root: syntax.root(),
    };
    let ctx = BuildContext::root(schema);
    let result = lowerer.lower(syntax.root(), &ctx)?;
    let parameters = lowerer.params.finish()?;
    debug!(
        value_type = %result.value_type,
        parameters = parameters.len(),
        "lowered statement"
    );
    Ok(Lowered {
        expr: result.expr,
        value_type: result.value_type,
        item_type: result.item_type,
        parameters,
        export: lowerer.export,
    })
}

pub(crate) struct Lowerer<'a> {
    tree: &'a Tree,
    registry: &'a FunctionRegistry,
    externals: &'a FunctionRegistry,
    params: ParameterManager,
    export: Option<String>,
    root: NodeId,
}

impl<'a> Lowerer<'a> {
    /// Lowers `id`; a parameter operand settles as `Object`.
    fn lower(
        &mut self,
        id: NodeId,
        ctx: &BuildContext<'_>,
    ) -> Result<ExpressionWrapper, CompileError> {
        let wrapper = self.lower_node(id, ctx)?;
        self.settle(wrapper, DataType::Object)
    }

    /// Lowers `id`, leaving a parameter operand for the caller to settle.
    fn lower_node(
        &mut self,
        id: NodeId,
        ctx: &BuildContext<'_>,
    ) -> Result<ExpressionWrapper, CompileError> {
        match self.tree.kind(id) {
            NodeKind::Constant => Ok(self.constant(id)),
            NodeKind::MemberAccess => self.member_access(id, ctx),
            NodeKind::Parameter => self.parameter(id),
            NodeKind::DefaultArgument => Ok(self.default_argument(id, ctx)),
            NodeKind::Empty => Ok(ExpressionWrapper::void(id)),
            NodeKind::Dot => self.dot(id, ctx),
            NodeKind::Add => self.add(id, ctx),
            NodeKind::Subtract => self.subtract(id, ctx),
            NodeKind::Multiply | NodeKind::Divide => self.multiplicative(id, ctx),
            NodeKind::Compare(op) => self.compare(id, op, ctx),
            NodeKind::Like => self.like(id, ctx),
            NodeKind::And | NodeKind::Or => self.logic(id, ctx),
            NodeKind::Not => self.not(id, ctx),
            NodeKind::Between => self.between(id, ctx),
            NodeKind::Method => self.method(id, ctx),
            NodeKind::Array => self.array(id, ctx),
            NodeKind::Object => self.object(id, ctx),
            NodeKind::Yield => self.yield_items(id, ctx),
            NodeKind::Reduce => self.reduce(id, ctx),
            NodeKind::Compose => self.compose(id, ctx),
            NodeKind::Export => self.export(id, ctx),
            NodeKind::Range => Err(CompileError::invalid_operand(
                self.tree.token(id),
                "a range is only valid inside an index",
            )),
            NodeKind::Colon => Err(CompileError::invalid_operator(self.tree.token(id))),
            NodeKind::MethodName | NodeKind::Flag => {
                Err(CompileError::unsupported(self.tree.token(id)))
            }
        }
    }

    /// Child in `slot`, failing on a structurally incomplete node.
    fn slot(&self, id: NodeId, slot: usize) -> Result<NodeId, CompileError> {
        self.tree
            .children(id)
            .get(slot)
            .copied()
            .flatten()
            .ok_or_else(|| CompileError::invalid_operator(self.tree.token(id)))
    }

    fn constant(&self, id: NodeId) -> ExpressionWrapper {
        let token = self.tree.token(id);
        let (value, data_type) = match (&token.literal, token.kind) {
            (_, TokenKind::ConstantNull) => (Value::Null, DataType::Object),
            (Some(Literal::Number(n)), _) => (Value::Number(*n), DataType::Number),
            (Some(Literal::Boolean(b)), _) => (Value::Boolean(*b), DataType::Boolean),
            (Some(Literal::Text(s)), _) => (Value::Text(s.clone()), DataType::Text),
            (None, _) => (Value::Text(token.text.clone()), DataType::Text),
        };
        ExpressionWrapper::of(Expr::Constant(value), data_type, id)
    }

    fn is_null_constant(&self, id: NodeId) -> bool {
        self.tree.token(id).kind == TokenKind::ConstantNull
    }

    fn parameter(&mut self, id: NodeId) -> Result<ExpressionWrapper, CompileError> {
        let name = self.tree.token(id).parameter_name().to_string();
        let data_type = self.params.type_of(&name).unwrap_or(DataType::Object);
        let mut wrapper = ExpressionWrapper::of(Expr::Parameter(name.clone()), data_type, id);
        wrapper.parameter = Some(name);
        wrapper.pending = true;
        Ok(wrapper)
    }

    /// Settles a pending parameter operand as `hint`.
    fn settle(
        &mut self,
        mut wrapper: ExpressionWrapper,
        hint: DataType,
    ) -> Result<ExpressionWrapper, CompileError> {
        if !wrapper.pending {
            return Ok(wrapper);
        }
        let name = wrapper.parameter.clone().unwrap_or_default();
        let data_type = self.params.resolve(&name, hint)?;
        wrapper.pending = false;
        wrapper.value_type = data_type.into();
        Ok(wrapper)
    }

    /// Settles the operands of a binary node. A parameter takes the hint
    /// derived from its sibling; two parameters are linked.
    fn settle_pair(
        &mut self,
        left: ExpressionWrapper,
        right: ExpressionWrapper,
        hint: impl Fn(&ExpressionWrapper) -> DataType,
    ) -> Result<(ExpressionWrapper, ExpressionWrapper), CompileError> {
        match (left.pending, right.pending) {
            (true, true) => {
                let a = left.parameter.clone().unwrap_or_default();
                let b = right.parameter.clone().unwrap_or_default();
                let settled = self.params.link(&a, &b)?.unwrap_or(DataType::Object);
                let fix = |mut w: ExpressionWrapper| {
                    w.pending = false;
                    w.value_type = settled.into();
                    w
                };
                Ok((fix(left), fix(right)))
            }
            (true, false) => {
                let hint = hint(&right);
                Ok((self.settle(left, hint)?, right))
            }
            (false, true) => {
                let hint = hint(&left);
                Ok((left, self.settle(right, hint)?))
            }
            (false, false) => Ok((left, right)),
        }
    }
}
