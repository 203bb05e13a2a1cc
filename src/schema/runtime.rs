use std::sync::Arc;

use indexmap::IndexMap;

use super::{MemberDefinition, MemberDescriptor};
use crate::value::DataType;

/// A member known only at compile time, with the members of its items.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeMember {
    pub definition: MemberDefinition,
    pub members: Option<Arc<RuntimeMembers>>,
}

/// Members of values built by the expression itself: object and array
/// literals, projections, function results. Lets later `.name` and `[...]`
/// accesses on those values resolve.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeMembers {
    members: IndexMap<String, RuntimeMember>,
}

impl RuntimeMembers {
    pub fn new() -> Self {
        RuntimeMembers::default()
    }

    pub fn insert(
        &mut self,
        name: &str,
        data_type: DataType,
        members: Option<Arc<RuntimeMembers>>,
    ) {
        let member = RuntimeMember {
            definition: MemberDefinition::new(name, data_type),
            members,
        };
        self.members.insert(name.to_lowercase(), member);
    }

    pub fn get(&self, name: &str) -> Option<&RuntimeMember> {
        self.members.get(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RuntimeMember> {
        self.members.values()
    }

    /// Adds the members of `other` not already present.
    pub fn union(&mut self, other: &RuntimeMembers) {
        for (key, member) in &other.members {
            self.members.entry(key.clone()).or_insert_with(|| member.clone());
        }
    }

    /// Copies the schema subtree below `parent` (by unique name).
    pub fn from_schema(schema: &dyn MemberDescriptor, parent: &str) -> Option<Arc<RuntimeMembers>> {
        let mut members = RuntimeMembers::new();
        for definition in schema
            .definitions()
            .filter(|d| d.parent.as_deref().is_some_and(|p| p.eq_ignore_ascii_case(parent)))
        {
            let nested = if definition.is_container() {
                RuntimeMembers::from_schema(schema, &definition.unique_name)
            } else {
                None
            };
            let member = RuntimeMember {
                definition: MemberDefinition::new(&definition.name, definition.data_type)
                    .with_actual_name(&definition.actual_name),
                members: nested,
            };
            members.members.insert(definition.name.to_lowercase(), member);
        }
        (!members.is_empty()).then(|| Arc::new(members))
    }
}
