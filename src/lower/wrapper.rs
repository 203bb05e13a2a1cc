use std::sync::Arc;

use crate::expr::Expr;
use crate::node::NodeId;
use crate::schema::{MemberDefinition, RuntimeMembers};
use crate::value::{DataType, ValueType};

/// A lowered expression with what the compiler knows about it.
#[derive(Debug, Clone)]
pub struct ExpressionWrapper {
    pub expr: Expr,
    pub value_type: ValueType,
    /// Element type when `value_type` is a list.
    pub item_type: Option<DataType>,
    /// Schema member this expression reads, if it reads exactly one.
    pub member: Option<MemberDefinition>,
    /// Unique name whose schema children describe this value or its items.
    pub prefix: Option<String>,
    /// Members of values built by the expression itself.
    pub members: Option<Arc<RuntimeMembers>>,
    /// Set for `@name` operands, and for sums of two linked parameters.
    pub parameter: Option<String>,
    /// A parameter operand whose type is not settled yet.
    pub(crate) pending: bool,
    /// `_` or an omitted left operand standing for the current value.
    pub(crate) implicit: bool,
    pub node: NodeId,
}

impl ExpressionWrapper {
    pub fn new(expr: Expr, value_type: ValueType, node: NodeId) -> Self {
        ExpressionWrapper {
            expr,
            value_type,
            item_type: None,
            member: None,
            prefix: None,
            members: None,
            parameter: None,
            pending: false,
            implicit: false,
            node,
        }
    }

    pub fn of(expr: Expr, data_type: DataType, node: NodeId) -> Self {
        ExpressionWrapper::new(expr, data_type.into(), node)
    }

    pub fn void(node: NodeId) -> Self {
        ExpressionWrapper::new(Expr::Constant(Default::default()), ValueType::Void, node)
    }

    pub fn with_items(mut self, item_type: Option<DataType>) -> Self {
        self.item_type = item_type;
        self
    }

    pub fn with_members(mut self, members: Option<Arc<RuntimeMembers>>) -> Self {
        self.members = members;
        self
    }

    pub fn with_prefix(mut self, prefix: Option<String>) -> Self {
        self.prefix = prefix;
        self
    }

    /// Static type, `Object` for the void operand.
    pub fn data_type(&self) -> DataType {
        self.value_type.data_type().unwrap_or(DataType::Object)
    }

    /// The type coercions are driven by: the schema member's declared type
    /// when the static type is open, otherwise the static type.
    pub fn expected(&self) -> DataType {
        match (self.data_type(), &self.member) {
            (DataType::Object, Some(member)) => member.data_type,
            (data_type, _) => data_type,
        }
    }

    pub fn is_void(&self) -> bool {
        self.value_type == ValueType::Void
    }

    pub fn is_list(&self) -> bool {
        self.value_type == ValueType::List
    }

    pub fn is_dynamic(&self) -> bool {
        self.value_type == ValueType::Object && self.member.is_none()
    }

    pub fn is_parameter(&self) -> bool {
        self.parameter.is_some()
    }

    /// Converts to `target`. `Object` and the current type are no-ops.
    pub fn convert(mut self, target: DataType) -> Self {
        if target == DataType::Object || self.value_type.data_type() == Some(target) {
            return self;
        }
        self.expr = self.expr.convert(target);
        self.value_type = target.into();
        self.member = None;
        if target != DataType::List {
            self.item_type = None;
            self.members = None;
            self.prefix = None;
        }
        self
    }

    /// Converts to the expected type.
    pub fn align(self) -> Self {
        let expected = self.expected();
        self.convert(expected)
    }
}
