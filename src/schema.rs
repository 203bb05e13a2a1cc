//! Schemas describe the members an expression may read.
//!
//! Members are addressed by their unique dotted name. Lookups happen
//! relative to a prefix, the unique name of the member whose items are in
//! scope:
//!
//! ```text
//! Orders                 list of objects
//! Orders.Id              number
//! Orders.Lines           list of objects
//! Orders.Lines.Price     number
//!
//! get("Price", "Orders.Lines")  ->  Orders.Lines.Price
//! ```
//!
//! A provider may carry a default scope: a root member whose fields can be
//! named without its prefix.

mod member;
mod reader;
mod runtime;

use std::fmt;

use indexmap::IndexMap;
use tracing::trace;

pub use member::MemberDefinition;
pub use reader::{ITEM_MEMBER, SchemaReader};
pub use runtime::{RuntimeMember, RuntimeMembers};

use crate::error::CompileError;
use crate::value::{DataType, ValueType};

/// Read access to a schema. Shared read-only between compilations.
pub trait MemberDescriptor: Send + Sync + fmt::Debug {
    /// Member at `prefix.path`, falling back to the default scope.
    fn get(&self, path: &str, prefix: &str) -> Option<&MemberDefinition>;

    fn get_by_actual_name(&self, name: &str) -> Option<&MemberDefinition>;

    fn add(&mut self, definition: MemberDefinition) -> Result<(), CompileError>;

    fn definitions(&self) -> Box<dyn Iterator<Item = &MemberDefinition> + '_>;

    fn default_scope(&self) -> Option<&str>;

    /// `List` when the data root is a list of items.
    fn root_kind(&self) -> DataType;
}

#[derive(Debug, Clone)]
pub struct SchemaProvider {
    members: IndexMap<String, MemberDefinition>,
    default_scope: Option<String>,
    root_kind: DataType,
}

impl Default for SchemaProvider {
    fn default() -> Self {
        SchemaProvider {
            members: IndexMap::new(),
            default_scope: None,
            root_kind: DataType::Object,
        }
    }
}

fn key(unique_name: &str) -> String {
    unique_name.to_lowercase()
}

impl SchemaProvider {
    pub fn new() -> Self {
        SchemaProvider::default()
    }

    /// A provider whose root object member `scope` may be left out of paths.
    pub fn with_default_scope(scope: &str) -> Self {
        let mut provider = SchemaProvider::new();
        provider
            .members
            .insert(key(scope), MemberDefinition::new(scope, DataType::Object));
        provider.default_scope = Some(scope.to_string());
        provider
    }

    pub fn with_root_kind(mut self, root_kind: DataType) -> Self {
        self.root_kind = root_kind;
        self
    }

    pub fn set_root_kind(&mut self, root_kind: DataType) {
        self.root_kind = root_kind;
    }

    /// Adds a root member, a shorthand for [`MemberDescriptor::add`].
    pub fn member(mut self, name: &str, data_type: DataType) -> Result<Self, CompileError> {
        self.add(MemberDefinition::new(name, data_type))?;
        Ok(self)
    }

    /// Adds a member below `parent` (by unique name).
    pub fn member_in(
        mut self,
        parent: &str,
        name: &str,
        data_type: DataType,
    ) -> Result<Self, CompileError> {
        self.add(MemberDefinition::new(name, data_type).within(parent))?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, unique_name: &str) -> bool {
        self.members.contains_key(&key(unique_name))
    }

    /// Grafts every member of `other` below a new root member `scope`.
    ///
    /// The new member is a list when `other` describes a list root.
    pub fn merge(&mut self, other: &dyn MemberDescriptor, scope: &str) -> Result<(), CompileError> {
        self.add(MemberDefinition::new(scope, other.root_kind()))?;
        for definition in other.definitions() {
            let parent = match &definition.parent {
                Some(parent) => format!("{}.{}", scope, parent),
                None => scope.to_string(),
            };
            let grafted = MemberDefinition::new(&definition.name, definition.data_type)
                .with_actual_name(&definition.actual_name)
                .within(parent);
            self.add(grafted)?;
        }
        Ok(())
    }
}

impl MemberDescriptor for SchemaProvider {
    fn get(&self, path: &str, prefix: &str) -> Option<&MemberDefinition> {
        let full = if prefix.is_empty() {
            path.to_string()
        } else {
            format!("{}.{}", prefix, path)
        };
        if let Some(definition) = self.members.get(&key(&full)) {
            return Some(definition);
        }
        let scope = self.default_scope.as_deref()?;
        self.members.get(&key(&format!("{}.{}", scope, full)))
    }

    fn get_by_actual_name(&self, name: &str) -> Option<&MemberDefinition> {
        let mut found = self
            .members
            .values()
            .filter(|d| d.actual_name.eq_ignore_ascii_case(name));
        let first = found.next()?;
        if first.actual_name == name {
            return Some(first);
        }
        found.find(|d| d.actual_name == name).or(Some(first))
    }

    fn add(&mut self, mut definition: MemberDefinition) -> Result<(), CompileError> {
        match definition.parent.clone() {
            Some(parent) => {
                let scope = self.members.get(&key(&parent)).ok_or_else(|| {
                    CompileError::InvalidSchema(format!(
                        "scope `{}` of member `{}` is not defined",
                        parent, definition.name
                    ))
                })?;
                if !scope.is_container() {
                    return Err(CompileError::InvalidSchema(format!(
                        "scope `{}` of member `{}` is a {}",
                        parent, definition.name, scope.data_type
                    )));
                }
                definition.unique_name = scope.child_name(&definition.name);
                definition.scope = scope.name.clone();
                definition.parent = Some(scope.unique_name.clone());
                definition.context_type = scope.data_type;
            }
            None => {
                definition.unique_name = definition.name.clone();
                definition.scope = String::new();
                definition.context_type = self.root_kind;
            }
        }
        definition.value_type = ValueType::from(definition.data_type);

        let unique = key(&definition.unique_name);
        if self.members.contains_key(&unique) {
            let repeated_scope = self
                .default_scope
                .as_deref()
                .is_some_and(|scope| key(scope) == unique);
            if repeated_scope {
                return Ok(());
            }
            return Err(CompileError::InvalidSchema(format!(
                "member `{}` is defined twice",
                definition.unique_name
            )));
        }
        trace!(member = %definition.unique_name, data_type = %definition.data_type, "schema member");
        self.members.insert(unique, definition);
        Ok(())
    }

    fn definitions(&self) -> Box<dyn Iterator<Item = &MemberDefinition> + '_> {
        Box::new(self.members.values())
    }

    fn default_scope(&self) -> Option<&str> {
        self.default_scope.as_deref()
    }

    fn root_kind(&self) -> DataType {
        self.root_kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_unique_names() {
        let schema = SchemaProvider::new()
            .member("Orders", DataType::List)
            .and_then(|s| s.member_in("Orders", "Lines", DataType::List))
            .and_then(|s| s.member_in("Orders.Lines", "Price", DataType::Number))
            .unwrap();
        let price = schema.get("price", "orders.lines").unwrap();
        assert_eq!(price.unique_name, "Orders.Lines.Price");
        assert_eq!(price.scope, "Lines");
        assert_eq!(price.context_type, DataType::List);
    }

    #[test]
    fn test_default_scope_fallback() {
        let schema = SchemaProvider::with_default_scope("Data")
            .member_in("Data", "Name", DataType::Text)
            .unwrap();
        assert_eq!(schema.get("Name", "").unwrap().unique_name, "Data.Name");
        assert!(schema.clone().member("Data", DataType::Object).is_ok());
    }

    #[test]
    fn test_rejects_bad_definitions() {
        let schema = SchemaProvider::new().member("Age", DataType::Number).unwrap();
        assert!(matches!(
            schema.clone().member("age", DataType::Number),
            Err(CompileError::InvalidSchema(_))
        ));
        assert!(matches!(
            schema.clone().member_in("Age", "X", DataType::Number),
            Err(CompileError::InvalidSchema(_))
        ));
        assert!(matches!(
            schema.member_in("Missing", "X", DataType::Number),
            Err(CompileError::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_actual_name_prefers_exact_case() {
        let mut schema = SchemaProvider::new();
        schema
            .add(MemberDefinition::new("A", DataType::Number).with_actual_name("value"))
            .unwrap();
        schema
            .add(MemberDefinition::new("B", DataType::Text).with_actual_name("Value"))
            .unwrap();
        assert_eq!(schema.get_by_actual_name("Value").unwrap().name, "B");
        assert_eq!(schema.get_by_actual_name("VALUE").unwrap().name, "A");
    }
}
