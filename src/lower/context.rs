use std::sync::Arc;

use crate::schema::{ITEM_MEMBER, MemberDefinition, MemberDescriptor, RuntimeMembers};
use crate::value::DataType;

use super::ExpressionWrapper;

/// Lowering scope. Every context but the root corresponds to one evaluator
/// frame pushed by a filter, projection or reduction, so the distance to an
/// ancestor context is the `Current` depth that reads its value.
#[derive(Debug, Clone)]
pub struct BuildContext<'a> {
    parent: Option<&'a BuildContext<'a>>,
    pub schema: &'a dyn MemberDescriptor,
    /// Unique-name prefix of the schema members describing the current
    /// value, `Some("")` at the root.
    pub scope: Option<String>,
    /// Members of a current value built by the expression itself.
    pub local: Option<Arc<RuntimeMembers>>,
    pub current_type: DataType,
    pub item_type: Option<DataType>,
    /// Whether the frame walks list items (and so has a loop index).
    pub iterating: bool,
}

/// Where a member name resolved.
#[derive(Debug, Clone)]
pub struct Found {
    pub definition: MemberDefinition,
    pub members: Option<Arc<RuntimeMembers>>,
    /// Contexts between the lookup and the one that resolved it.
    pub up: usize,
    /// Type of the value held by the resolving context.
    pub holder: DataType,
    /// Resolved through the schema's default scope.
    pub via_default_scope: bool,
    /// Resolved through the schema rather than runtime members.
    pub from_schema: bool,
}

impl<'a> BuildContext<'a> {
    pub fn root(schema: &'a dyn MemberDescriptor) -> Self {
        let current_type = schema.root_kind();
        let item_type = (current_type == DataType::List).then(|| {
            schema
                .get(ITEM_MEMBER, "")
                .map(|d| d.data_type)
                .unwrap_or(DataType::Object)
        });
        BuildContext {
            parent: None,
            schema,
            scope: Some(String::new()),
            local: None,
            current_type,
            item_type,
            iterating: false,
        }
    }

    /// Context for the items of `list` (`iterating`) or for the whole list.
    pub fn child<'b>(&'b self, list: &ExpressionWrapper, iterating: bool) -> BuildContext<'b>
    where
        'a: 'b,
    {
        let (scope, local) = if list.implicit {
            (self.scope.clone(), self.local.clone())
        } else {
            (list.prefix.clone(), list.members.clone())
        };
        let (current_type, item_type) = if iterating {
            (list.item_type.unwrap_or(DataType::Object), None)
        } else {
            (DataType::List, list.item_type)
        };
        BuildContext {
            parent: Some(self),
            schema: self.schema,
            scope,
            local,
            current_type,
            item_type,
            iterating,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// The current value's type is unknown and nothing describes it.
    pub fn is_dynamic(&self) -> bool {
        self.current_type == DataType::Object && self.scope.is_none() && self.local.is_none()
    }

    /// Resolves `name` in this context, then in each enclosing one.
    pub fn lookup(&self, name: &str) -> Option<Found> {
        let mut up = 0;
        let mut frame = Some(self);
        while let Some(ctx) = frame {
            if let Some(found) = ctx.lookup_local(name, up) {
                return Some(found);
            }
            frame = ctx.parent;
            up += 1;
        }
        None
    }

    fn lookup_local(&self, name: &str, up: usize) -> Option<Found> {
        if let Some(member) = self.local.as_ref().and_then(|local| local.get(name)) {
            return Some(Found {
                definition: member.definition.clone(),
                members: member.members.clone(),
                up,
                holder: self.current_type,
                via_default_scope: false,
                from_schema: false,
            });
        }
        let scope = self.scope.as_deref()?;
        let definition = self.schema.get(name, scope)?;
        let via_default_scope = scope.is_empty()
            && !definition.scope.is_empty()
            && self.schema.default_scope() == Some(definition.scope.as_str());
        Some(Found {
            definition: definition.clone(),
            members: None,
            up,
            holder: self.current_type,
            via_default_scope,
            from_schema: true,
        })
    }

    /// Frames between this context and the nearest one walking list items.
    pub fn loop_depth(&self) -> Option<usize> {
        let mut up = 0;
        let mut frame = Some(self);
        while let Some(ctx) = frame {
            if ctx.iterating {
                return Some(up);
            }
            frame = ctx.parent;
            up += 1;
        }
        None
    }

    /// Whether the schema lists any member below `prefix`.
    pub fn describes(&self, prefix: &str) -> bool {
        self.schema.definitions().any(|d| {
            d.parent
                .as_deref()
                .unwrap_or_default()
                .eq_ignore_ascii_case(prefix)
        })
    }

    /// Element type of a list member: its `_` member, else objects.
    pub fn item_type_of(&self, definition: &MemberDefinition) -> Option<DataType> {
        if definition.data_type != DataType::List {
            return None;
        }
        Some(
            self.schema
                .get(ITEM_MEMBER, &definition.unique_name)
                .map(|d| d.data_type)
                .unwrap_or(DataType::Object),
        )
    }
}
