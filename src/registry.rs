//! Characteristic schema table.

use crate::ast::{CharId, CharSchema};
use crate::codec::CodecError;
use crate::parser;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

const BUILTIN: &str = include_str!("../schemas/builtin.gatt");

/// Schemas keyed by canonical identifier. Registered schemas are immutable.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<CharId, Arc<CharSchema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        SchemaRegistry::default()
    }

    /// The embedded SIG and vendor table.
    pub fn builtin() -> Result<Self, CodecError> {
        let mut registry = SchemaRegistry::new();
        registry.parse_source(BUILTIN)?;
        Ok(registry)
    }

    /// Parse schema source and register every definition. Either all definitions are
    /// registered or none are. Returns how many were registered.
    pub fn parse_source(&mut self, source: &str) -> Result<usize, CodecError> {
        let defs = parser::parse(source)?;
        for (id, schema) in &defs {
            schema.validate().map_err(|e| with_id(id, e))?;
        }
        let n = defs.len();
        for (id, schema) in defs {
            self.insert(id, schema);
        }
        Ok(n)
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<usize, CodecError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)?;
        let n = self.parse_source(&source)?;
        debug!(path = %path.display(), schemas = n, "loaded schema file");
        Ok(n)
    }

    /// Validate and register, replacing any existing schema.
    pub fn register(&mut self, id: impl Into<CharId>, schema: CharSchema) -> Result<(), CodecError> {
        schema.validate()?;
        self.insert(id.into(), schema);
        Ok(())
    }

    fn insert(&mut self, id: CharId, schema: CharSchema) {
        if self.schemas.insert(id.clone(), Arc::new(schema)).is_some() {
            debug!(%id, "replaced existing schema");
        }
    }

    pub fn get(&self, id: &CharId) -> Option<Arc<CharSchema>> {
        self.schemas.get(id).cloned()
    }

    pub fn contains(&self, id: &CharId) -> bool {
        self.schemas.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Registered identifiers, sorted.
    pub fn ids(&self) -> Vec<&CharId> {
        let mut ids: Vec<&CharId> = self.schemas.keys().collect();
        ids.sort();
        ids
    }
}

fn with_id(id: &CharId, e: CodecError) -> CodecError {
    match e {
        CodecError::InvalidSchema(msg) => CodecError::InvalidSchema(format!("{}: {}", id, msg)),
        other => other,
    }
}
