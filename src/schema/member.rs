use crate::value::{DataType, ValueType};

/// One named member of a schema.
///
/// `unique_name` is the dotted path from the root (`Order.Items.Price`),
/// `scope` the short name of the enclosing member and `parent` its unique
/// name. Members at the root have an empty scope and no parent.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberDefinition {
    pub name: String,
    /// Field name in the data, may differ from `name` in case.
    pub actual_name: String,
    pub unique_name: String,
    pub scope: String,
    pub parent: Option<String>,
    pub data_type: DataType,
    pub value_type: ValueType,
    /// Kind of the enclosing container, `Object` or `List`.
    pub context_type: DataType,
}

impl MemberDefinition {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        let name = name.into();
        MemberDefinition {
            actual_name: name.clone(),
            unique_name: name.clone(),
            name,
            scope: String::new(),
            parent: None,
            data_type,
            value_type: data_type.into(),
            context_type: DataType::Object,
        }
    }

    /// Places the member below `parent`, given by unique name.
    pub fn within(mut self, parent: impl Into<String>) -> Self {
        let parent = parent.into();
        self.parent = (!parent.is_empty()).then_some(parent);
        self
    }

    pub fn with_actual_name(mut self, actual_name: impl Into<String>) -> Self {
        self.actual_name = actual_name.into();
        self
    }

    pub fn is_container(&self) -> bool {
        matches!(self.data_type, DataType::List | DataType::Object)
    }

    /// Unique name of a child member called `name`.
    pub fn child_name(&self, name: &str) -> String {
        format!("{}.{}", self.unique_name, name)
    }
}
