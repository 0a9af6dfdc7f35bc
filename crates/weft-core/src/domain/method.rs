//! The method shape that flows through the pipeline.
//!
//! [`Method`] starts as a flat copy of a [`CapabilityMethod`] plus the owning
//! capability's naming context, and is then rewritten by pipeline stages.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::domain::capability::{Capability, CapabilityMethod, LinkMetadata, MethodParam};

/// Tag prefix marking a CRUD operation: `crud:create` or `crud:create:Entity`.
pub const CRUD_TAG_PREFIX: &str = "crud:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CrudOp {
    Create,
    Read,
    Update,
    Delete,
    List,
}

impl CrudOp {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create" => Some(Self::Create),
            "read" => Some(Self::Read),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            "list" => Some(Self::List),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::List => "list",
        }
    }
}

impl fmt::Display for CrudOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What CRUD restructuring did to a method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrudShape {
    pub op: CrudOp,
    pub entity: String,
    /// Synthesized input type (`CreateBookmark`, `UpdateBookmark`).
    pub data_type: Option<String>,
    /// Original parameters collapsed into `data`.
    pub fields: Vec<MethodParam>,
    /// Expression rebuilding the original arguments from `data`.
    pub transform: Option<String>,
    /// Bind name of the sibling read method, for create only.
    pub read_after: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Method {
    /// Bind-point name. Rewritten by prefixing.
    pub name: String,
    /// Name as declared, kept for human-readable naming.
    pub original_name: String,
    pub capability: String,
    pub capability_prefix: String,
    pub entity: String,
    pub params: Vec<MethodParam>,
    pub return_type: String,
    pub is_collection: bool,
    pub tags: BTreeSet<String>,
    pub description: String,
    pub link: Option<LinkMetadata>,
    pub crud: Option<CrudShape>,
}

impl Method {
    pub fn from_declared(capability: &Capability, declared: &CapabilityMethod) -> Self {
        Self {
            name: declared.name.clone(),
            original_name: declared.name.clone(),
            capability: capability.name().to_string(),
            capability_prefix: capability.prefix(),
            entity: capability.entity(),
            params: declared.params.clone(),
            return_type: declared.return_type.clone(),
            is_collection: declared.is_collection,
            tags: declared.tags.clone(),
            description: declared.description.clone(),
            link: capability.link().cloned(),
            crud: None,
        }
    }

    /// CRUD operation and optional explicit entity from the tag set.
    pub fn crud_tag(&self) -> Option<(CrudOp, Option<&str>)> {
        self.tags.iter().find_map(|tag| {
            let rest = tag.strip_prefix(CRUD_TAG_PREFIX)?;
            let mut parts = rest.splitn(2, ':');
            let op = CrudOp::parse(parts.next()?)?;
            Some((op, parts.next().filter(|e| !e.is_empty())))
        })
    }

    pub fn has_any_tag(&self, tags: &BTreeSet<String>) -> bool {
        !self.tags.is_disjoint(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::capability::Reach;

    #[test]
    fn crud_tag_with_and_without_entity() {
        let cap = Capability::declare(
            "BookmarkMgmt",
            Reach::Global,
            vec![
                CapabilityMethod::new("add").tag("crud:create"),
                CapabilityMethod::new("addFolder").tag("crud:create:Folder"),
                CapabilityMethod::new("misc").tag("crud:frobnicate"),
            ],
        )
        .unwrap();
        let methods: Vec<_> = cap
            .methods()
            .iter()
            .map(|m| Method::from_declared(&cap, m))
            .collect();

        assert_eq!(methods[0].crud_tag(), Some((CrudOp::Create, None)));
        assert_eq!(
            methods[1].crud_tag(),
            Some((CrudOp::Create, Some("Folder")))
        );
        assert_eq!(methods[2].crud_tag(), None);
        assert_eq!(methods[0].capability_prefix, "bookmark");
    }
}
