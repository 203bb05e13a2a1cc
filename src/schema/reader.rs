use tracing::debug;

use super::{MemberDefinition, MemberDescriptor, SchemaProvider};
use crate::error::CompileError;
use crate::value::{DataType, Value};

/// Infers a schema from a sample value.
///
/// Object fields become members of the enclosing member. List items
/// contribute their fields to the list member itself; scalar or nested
/// list items are described by a `_` member. When several items share a
/// field, the first definition wins.
#[derive(Debug, Default)]
pub struct SchemaReader {
    schema: SchemaProvider,
}

/// Name of the member describing scalar list items.
pub const ITEM_MEMBER: &str = "_";

impl SchemaReader {
    pub fn read(sample: &Value) -> Result<SchemaProvider, CompileError> {
        let mut reader = SchemaReader::default();
        match sample {
            Value::List(items) => {
                reader.schema.set_root_kind(DataType::List);
                reader.items("", items)?;
            }
            Value::Object(record) => {
                for (name, value) in record.flattened() {
                    reader.field("", &name, &value)?;
                }
            }
            _ => {}
        }
        debug!(members = reader.schema.len(), "inferred schema");
        Ok(reader.schema)
    }

    fn field(&mut self, parent: &str, name: &str, value: &Value) -> Result<(), CompileError> {
        let unique = if parent.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", parent, name)
        };
        if self.schema.contains(&unique) {
            return self.nested(&unique, value);
        }
        let data_type = value.data_type().unwrap_or(DataType::Object);
        self.schema
            .add(MemberDefinition::new(name, data_type).within(parent))?;
        self.nested(&unique, value)
    }

    fn nested(&mut self, unique: &str, value: &Value) -> Result<(), CompileError> {
        let is_container = self
            .schema
            .get(unique, "")
            .is_some_and(|d| d.is_container());
        if !is_container {
            return Ok(());
        }
        match value {
            Value::Object(record) => {
                for (name, value) in record.flattened() {
                    self.field(unique, &name, &value)?;
                }
                Ok(())
            }
            Value::List(items) => self.items(unique, items),
            _ => Ok(()),
        }
    }

    fn items(&mut self, parent: &str, items: &[Value]) -> Result<(), CompileError> {
        for item in items {
            match item {
                Value::Null => {}
                Value::Object(record) => {
                    for (name, value) in record.flattened() {
                        self.field(parent, &name, &value)?;
                    }
                }
                other => self.field(parent, ITEM_MEMBER, other)?,
            }
        }
        Ok(())
    }
}
