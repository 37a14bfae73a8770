//! Predicate schema: the bidirectional predicate name <-> id map.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{GrteError, Result};

/// Relation types known to a model, indexed by predicate id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredicateSchema {
    id2predicate: Vec<String>,
    predicate2id: HashMap<String, usize>,
}

impl PredicateSchema {
    /// Build from names in id order. Duplicate names are rejected.
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let id2predicate: Vec<String> = names.into_iter().map(Into::into).collect();
        let mut predicate2id = HashMap::with_capacity(id2predicate.len());
        for (id, name) in id2predicate.iter().enumerate() {
            if predicate2id.insert(name.clone(), id).is_some() {
                return Err(GrteError::InvalidSchema(format!(
                    "duplicate predicate {name:?}"
                )));
            }
        }
        Ok(Self {
            id2predicate,
            predicate2id,
        })
    }

    /// Parse a schema from JSON.
    ///
    /// Accepts `[{"0": "name", ...}, {"name": 0, ...}]` (only the first map is
    /// read) or a plain list of names.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        let items = value
            .as_array()
            .ok_or_else(|| GrteError::InvalidSchema("expected a JSON array".into()))?;

        match items.first() {
            Some(Value::Object(id2predicate)) => {
                let mut pairs = Vec::with_capacity(id2predicate.len());
                for (key, name) in id2predicate {
                    let id: usize = key.parse().map_err(|_| {
                        GrteError::InvalidSchema(format!("predicate id {key:?} is not a number"))
                    })?;
                    let name = name.as_str().ok_or_else(|| {
                        GrteError::InvalidSchema(format!("predicate {key} is not a string"))
                    })?;
                    pairs.push((id, name.to_string()));
                }
                pairs.sort_by_key(|(id, _)| *id);
                if pairs.iter().enumerate().any(|(i, (id, _))| i != *id) {
                    return Err(GrteError::InvalidSchema(
                        "predicate ids must be contiguous from 0".into(),
                    ));
                }
                Self::from_names(pairs.into_iter().map(|(_, name)| name))
            }
            _ => {
                let names = Vec::<String>::deserialize(&value)?;
                Self::from_names(names)
            }
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn len(&self) -> usize {
        self.id2predicate.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id2predicate.is_empty()
    }

    pub fn id(&self, name: &str) -> Option<usize> {
        self.predicate2id.get(name).copied()
    }

    pub fn name(&self, id: usize) -> Option<&str> {
        self.id2predicate.get(id).map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.id2predicate
    }
}
