use indexmap::IndexMap;
use tracing::debug;

use crate::error::CompileError;
use crate::value::DataType;

/// A named parameter and the type its value is converted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDefinition {
    pub name: String,
    pub data_type: DataType,
}

impl ParameterDefinition {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        ParameterDefinition {
            name: name.into(),
            data_type,
        }
    }
}

/// Converges every use of a parameter name onto one type.
///
/// A use in a typed position finalizes the name. Uses whose type depends
/// only on another parameter (`@a + @b`) are linked into an undecided
/// group that is finalized as a whole by the first typed use of any member.
#[derive(Debug, Default)]
pub struct ParameterManager {
    finalized: IndexMap<String, ParameterDefinition>,
    undecided: Vec<Vec<String>>,
}

fn key(name: &str) -> String {
    name.to_lowercase()
}

fn check_name(name: &str) -> Result<(), CompileError> {
    if name.is_empty() || name.contains(['.', '-', '"', '\'']) {
        return Err(CompileError::InvalidParameterName {
            name: name.to_string(),
        });
    }
    Ok(())
}

impl ParameterManager {
    pub fn new() -> Self {
        ParameterManager::default()
    }

    /// Seeds declared parameters. Their types only widen from `Object`.
    pub fn with_declared(declared: &[ParameterDefinition]) -> Result<Self, CompileError> {
        let mut manager = ParameterManager::new();
        for definition in declared {
            check_name(&definition.name)?;
            manager
                .finalized
                .insert(key(&definition.name), definition.clone());
        }
        Ok(manager)
    }

    pub fn type_of(&self, name: &str) -> Option<DataType> {
        self.finalized.get(&key(name)).map(|d| d.data_type)
    }

    /// Settles `name` as `expected` and returns the type it ends up with.
    pub fn resolve(&mut self, name: &str, expected: DataType) -> Result<DataType, CompileError> {
        check_name(name)?;
        let k = key(name);

        if let Some(existing) = self.finalized.get_mut(&k) {
            if existing.data_type == expected || expected == DataType::Object {
                return Ok(existing.data_type);
            }
            if existing.data_type == DataType::Object {
                debug!(parameter = %existing.name, data_type = %expected, "widened parameter");
                existing.data_type = expected;
                return Ok(expected);
            }
            return Err(CompileError::ConflictParameterType {
                name: existing.name.clone(),
                existing: existing.data_type,
                requested: expected,
            });
        }

        if let Some(index) = self.undecided.iter().position(|g| g.contains(&k)) {
            let group = self.undecided.remove(index);
            debug!(parameters = ?group, data_type = %expected, "finalized parameter group");
            for member in group {
                self.finalized
                    .insert(member.clone(), ParameterDefinition::new(member, expected));
            }
            if let Some(definition) = self.finalized.get_mut(&k) {
                definition.name = name.to_string();
            }
            return Ok(expected);
        }

        debug!(parameter = %name, data_type = %expected, "finalized parameter");
        self.finalized
            .insert(k, ParameterDefinition::new(name, expected));
        Ok(expected)
    }

    /// Links two parameters whose types depend on each other. Returns the
    /// settled type when either one is already final.
    pub fn link(&mut self, a: &str, b: &str) -> Result<Option<DataType>, CompileError> {
        check_name(a)?;
        check_name(b)?;
        for (known, other) in [(a, b), (b, a)] {
            if let Some(data_type) = self.type_of(known) {
                self.resolve(other, data_type)?;
                return Ok(Some(self.type_of(known).unwrap_or(data_type)));
            }
        }

        let (ka, kb) = (key(a), key(b));
        let ga = self.undecided.iter().position(|g| g.contains(&ka));
        let gb = self.undecided.iter().position(|g| g.contains(&kb));
        match (ga, gb) {
            (Some(x), Some(y)) if x == y => {}
            (Some(x), Some(y)) => {
                let (keep, drop) = if x < y { (x, y) } else { (y, x) };
                let moved = self.undecided.remove(drop);
                self.undecided[keep].extend(moved);
            }
            (Some(x), None) => self.undecided[x].push(kb),
            (None, Some(y)) => self.undecided[y].push(ka),
            (None, None) => {
                let mut group = vec![ka];
                if kb != group[0] {
                    group.push(kb);
                }
                self.undecided.push(group);
            }
        }
        Ok(None)
    }

    /// All finalized parameters. Fails if a group never got a type.
    pub fn finish(self) -> Result<Vec<ParameterDefinition>, CompileError> {
        if let Some(name) = self.undecided.first().and_then(|g| g.first()) {
            return Err(CompileError::InvalidParameterOperation { name: name.clone() });
        }
        Ok(self.finalized.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widen_and_conflict() {
        let mut manager = ParameterManager::new();
        assert_eq!(manager.resolve("x", DataType::Object).unwrap(), DataType::Object);
        assert_eq!(manager.resolve("X", DataType::Number).unwrap(), DataType::Number);
        assert_eq!(manager.resolve("x", DataType::Object).unwrap(), DataType::Number);
        assert!(matches!(
            manager.resolve("x", DataType::Text),
            Err(CompileError::ConflictParameterType { .. })
        ));
    }

    #[test]
    fn test_group_finalizes_together() {
        let mut manager = ParameterManager::new();
        assert_eq!(manager.link("a", "b").unwrap(), None);
        assert_eq!(manager.link("b", "c").unwrap(), None);
        manager.resolve("c", DataType::Number).unwrap();
        assert_eq!(manager.type_of("a"), Some(DataType::Number));
        assert_eq!(manager.finish().unwrap().len(), 3);
    }

    #[test]
    fn test_unsettled_group_fails() {
        let mut manager = ParameterManager::new();
        manager.link("a", "b").unwrap();
        assert!(matches!(
            manager.finish(),
            Err(CompileError::InvalidParameterOperation { .. })
        ));
    }

    #[test]
    fn test_rejects_bad_names() {
        let mut manager = ParameterManager::new();
        assert!(matches!(
            manager.resolve("a.b", DataType::Number),
            Err(CompileError::InvalidParameterName { .. })
        ));
    }
}
