//! Property types and tags.
//!
//! Reference data shared by every property of a tenant. Names are unique
//! (case-sensitive, compared after trimming).

use serde::{Deserialize, Serialize};

use realty_core::{AggregateId, DomainError, DomainResult};

/// Default ordering weight for new property types.
pub const DEFAULT_TYPE_SEQUENCE: u32 = 1;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyTypeId(pub AggregateId);

impl PropertyTypeId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(pub AggregateId);

impl TagId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyType {
    pub id: PropertyTypeId,
    pub name: String,
    pub sequence: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyTag {
    pub id: TagId,
    pub name: String,
    pub color: u32,
}

/// Per-tenant catalog of property types and tags.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    types: Vec<PropertyType>,
    tags: Vec<PropertyTag>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_type(
        &mut self,
        id: PropertyTypeId,
        name: &str,
        sequence: Option<u32>,
    ) -> DomainResult<&PropertyType> {
        let name = normalize_name(name)?;
        if self.types.iter().any(|t| t.name == name) {
            return Err(DomainError::conflict(format!(
                "property type '{name}' already exists"
            )));
        }

        self.types.push(PropertyType {
            id,
            name,
            sequence: sequence.unwrap_or(DEFAULT_TYPE_SEQUENCE),
        });
        Ok(&self.types[self.types.len() - 1])
    }

    pub fn add_tag(&mut self, id: TagId, name: &str, color: u32) -> DomainResult<&PropertyTag> {
        let name = normalize_name(name)?;
        if self.tags.iter().any(|t| t.name == name) {
            return Err(DomainError::conflict(format!("tag '{name}' already exists")));
        }

        self.tags.push(PropertyTag { id, name, color });
        Ok(&self.tags[self.tags.len() - 1])
    }

    pub fn property_type(&self, id: PropertyTypeId) -> Option<&PropertyType> {
        self.types.iter().find(|t| t.id == id)
    }

    pub fn tag(&self, id: TagId) -> Option<&PropertyTag> {
        self.tags.iter().find(|t| t.id == id)
    }

    /// Ordered by `(sequence, name)`.
    pub fn types_ordered(&self) -> Vec<&PropertyType> {
        let mut types: Vec<&PropertyType> = self.types.iter().collect();
        types.sort_by(|a, b| a.sequence.cmp(&b.sequence).then_with(|| a.name.cmp(&b.name)));
        types
    }

    /// Ordered by name.
    pub fn tags_ordered(&self) -> Vec<&PropertyTag> {
        let mut tags: Vec<&PropertyTag> = self.tags.iter().collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        tags
    }

    /// Ensures every referenced type/tag exists in this catalog.
    pub fn ensure_known(
        &self,
        property_type_id: Option<PropertyTypeId>,
        tag_ids: &[TagId],
    ) -> DomainResult<()> {
        if let Some(id) = property_type_id {
            if self.property_type(id).is_none() {
                return Err(DomainError::validation(format!("unknown property type {}", id.0)));
            }
        }
        if let Some(missing) = tag_ids.iter().find(|id| self.tag(**id).is_none()) {
            return Err(DomainError::validation(format!("unknown tag {}", missing.0)));
        }
        Ok(())
    }
}

fn normalize_name(name: &str) -> DomainResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("name cannot be empty"));
    }
    Ok(name.to_string())
}
