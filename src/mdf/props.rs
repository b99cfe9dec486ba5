//! Property sharing policy
//!
//! A definition keyed `owner.name` belongs to that owner alone and always
//! yields a fresh property. A definition keyed by the bare name is shared:
//! every owner that declares the name gets the same property object.

use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::Result;
use crate::model::PropId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sharing {
    /// Created for one owner; never memoized
    Private,
    /// Created once and reused by every owner declaring the name
    Shared,
}

/// The definition an owner's property name resolves to
#[derive(Debug, Clone, Copy)]
pub struct PropDefinition<'a> {
    /// `PropDefinitions` key the definition was found under
    pub key: &'a str,
    pub spec: &'a Value,
    pub sharing: Sharing,
}

/// Find the definition for property `name` declared by `owner`
///
/// The owner-qualified key wins over the bare name.
pub fn lookup_definition<'a>(defs: &'a Mapping, owner: &str, name: &str) -> Option<PropDefinition<'a>> {
    let qualified = format!("{}.{}", owner, name);
    for (sharing, wanted) in [(Sharing::Private, qualified.as_str()), (Sharing::Shared, name)] {
        if let Some((key, spec)) = defs.iter().find(|(k, _)| k.as_str() == Some(wanted)) {
            if let Some(key) = key.as_str() {
                return Some(PropDefinition { key, spec, sharing });
            }
        }
    }
    None
}

/// Memo of shared properties for one build
#[derive(Debug, Default)]
pub struct PropertyTable {
    shared: BTreeMap<String, PropId>,
    claimed: BTreeSet<String>,
}

impl PropertyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The property for `name` under `def`, building it with `create` when needed
    pub fn obtain<F>(&mut self, def: &PropDefinition<'_>, name: &str, create: F) -> Result<PropId>
    where
        F: FnOnce() -> Result<PropId>,
    {
        self.claimed.insert(def.key.to_string());
        match def.sharing {
            Sharing::Private => create(),
            Sharing::Shared => {
                if let Some(id) = self.shared.get(name) {
                    return Ok(*id);
                }
                let id = create()?;
                self.shared.insert(name.to_string(), id);
                Ok(id)
            }
        }
    }

    /// The shared property memoized under `name`
    pub fn shared(&self, name: &str) -> Option<PropId> {
        self.shared.get(name).copied()
    }

    /// True when `id` is in the shared memo
    pub fn contains(&self, id: PropId) -> bool {
        self.shared.values().any(|p| *p == id)
    }

    /// Definition keys never claimed by any owner, sorted
    pub fn unclaimed(&self, defs: &Mapping) -> Vec<String> {
        let mut keys: Vec<String> = defs
            .keys()
            .filter_map(Value::as_str)
            .filter(|k| !self.claimed.contains(*k))
            .map(str::to_string)
            .collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Model, Property};

    fn defs() -> Mapping {
        serde_yaml::from_str(
            "status: {Type: string}\ncase.status: {Enum: [open, closed]}\nunused: {Type: integer}\n",
        )
        .unwrap()
    }

    #[test]
    fn test_qualified_definition_wins() {
        let defs = defs();
        let def = lookup_definition(&defs, "case", "status").unwrap();
        assert_eq!(def.key, "case.status");
        assert_eq!(def.sharing, Sharing::Private);

        let def = lookup_definition(&defs, "sample", "status").unwrap();
        assert_eq!(def.key, "status");
        assert_eq!(def.sharing, Sharing::Shared);

        assert!(lookup_definition(&defs, "case", "missing").is_none());
    }

    #[test]
    fn test_shared_memoized_private_fresh() {
        let defs = defs();
        let mut model = Model::new("test");
        let mut table = PropertyTable::new();
        let make = |model: &mut Model| model.new_prop(Property::new("status", "test"));

        let shared = lookup_definition(&defs, "sample", "status").unwrap();
        let a = table.obtain(&shared, "status", || Ok(make(&mut model))).unwrap();
        let b = table.obtain(&shared, "status", || Ok(make(&mut model))).unwrap();
        assert_eq!(a, b);

        let private = lookup_definition(&defs, "case", "status").unwrap();
        let c = table.obtain(&private, "status", || Ok(make(&mut model))).unwrap();
        assert_ne!(a, c);
        assert!(table.contains(a));
        assert!(!table.contains(c));
        assert_eq!(table.shared("status"), Some(a));

        assert_eq!(table.unclaimed(&defs), vec!["unused".to_string()]);
    }
}
