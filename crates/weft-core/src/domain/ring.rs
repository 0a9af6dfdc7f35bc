//! Ring graph: the layered architecture a weave runs over.
//!
//! A ring is one layer of the application: the core engine, a platform
//! wrapper around it (Android service, iOS bridge, desktop direct calls), an
//! aggregating plugin ring spanning several platform rings, or the UI-facing
//! domain ring on top.
//!
//! Rings are immutable and reference-counted. Identity is the allocation,
//! not the name: two rings called `core` are distinct nodes, while one core
//! shared by two platform rings is visited once.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::capability::ReachLevel;
use crate::domain::error::DomainError;

// ── RingKind ─────────────────────────────────────────────────────────────────

/// Closed set of ring kinds. Every ring carries its kind from construction;
/// nothing is inferred from the ring's shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RingKind {
    /// The domain engine. Wraps nothing.
    Core,
    /// Android background-service ring.
    Android,
    /// iOS bridge ring.
    Ios,
    /// Desktop direct-call ring.
    Desktop,
    /// Cross-process plugin ring aggregating platform rings.
    Plugin,
    /// UI-facing domain-type ring.
    Frontend,
}

/// Structural role a kind plays in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RingRole {
    Core,
    Wrapping,
    Aggregating,
}

impl RingKind {
    pub const ALL: [RingKind; 6] = [
        Self::Core,
        Self::Android,
        Self::Ios,
        Self::Desktop,
        Self::Plugin,
        Self::Frontend,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Android => "android",
            Self::Ios => "ios",
            Self::Desktop => "desktop",
            Self::Plugin => "plugin",
            Self::Frontend => "frontend",
        }
    }

    pub const fn role(&self) -> RingRole {
        match self {
            Self::Core => RingRole::Core,
            Self::Android | Self::Ios | Self::Desktop | Self::Frontend => RingRole::Wrapping,
            Self::Plugin => RingRole::Aggregating,
        }
    }

    /// Which capability reach a ring of this kind receives.
    pub const fn reach_level(&self) -> ReachLevel {
        match self {
            Self::Core => ReachLevel::Core,
            Self::Android | Self::Ios | Self::Desktop => ReachLevel::Platform,
            Self::Plugin | Self::Frontend => ReachLevel::Front,
        }
    }
}

impl fmt::Display for RingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RingKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "core" => Ok(Self::Core),
            "android" => Ok(Self::Android),
            "ios" => Ok(Self::Ios),
            "desktop" => Ok(Self::Desktop),
            "plugin" | "tauri" => Ok(Self::Plugin),
            "frontend" | "ui" | "domain" => Ok(Self::Frontend),
            other => Err(DomainError::UnknownRingKind(other.to_string())),
        }
    }
}

// ── Ring ─────────────────────────────────────────────────────────────────────

/// Stable identity of a ring node for the lifetime of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RingId(usize);

/// A node in the architecture graph. Cheap to clone; clones share identity.
#[derive(Clone)]
pub struct Ring(Arc<RingNode>);

struct RingNode {
    name: String,
    kind: RingKind,
    export: Option<String>,
    inners: Vec<Ring>,
}

impl Ring {
    pub fn builder(kind: RingKind, name: impl Into<String>) -> RingBuilder {
        RingBuilder {
            kind,
            name: name.into(),
            export: None,
            inners: Vec::new(),
        }
    }

    /// Shorthand for a core ring with no export name.
    pub fn core(name: impl Into<String>) -> Self {
        Self(Arc::new(RingNode {
            name: name.into(),
            kind: RingKind::Core,
            export: None,
            inners: Vec::new(),
        }))
    }

    pub fn id(&self) -> RingId {
        RingId(Arc::as_ptr(&self.0) as *const () as usize)
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn kind(&self) -> RingKind {
        self.0.kind
    }

    pub fn role(&self) -> RingRole {
        self.0.kind.role()
    }

    pub fn export(&self) -> Option<&str> {
        self.0.export.as_deref()
    }

    pub fn inners(&self) -> &[Ring] {
        &self.0.inners
    }

    /// Reference identity, not structural equality.
    pub fn same_as(&self, other: &Ring) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Ring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ring")
            .field("name", &self.0.name)
            .field("kind", &self.0.kind)
            .field("export", &self.0.export)
            .field(
                "inners",
                &self.0.inners.iter().map(|r| r.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Builder enforcing the kind/role contract at construction time.
#[derive(Debug)]
pub struct RingBuilder {
    kind: RingKind,
    name: String,
    export: Option<String>,
    inners: Vec<Ring>,
}

impl RingBuilder {
    pub fn export(mut self, export: impl Into<String>) -> Self {
        self.export = Some(export.into());
        self
    }

    pub fn wraps(mut self, inner: &Ring) -> Self {
        self.inners.push(inner.clone());
        self
    }

    pub fn wraps_all<'a>(mut self, inners: impl IntoIterator<Item = &'a Ring>) -> Self {
        self.inners.extend(inners.into_iter().cloned());
        self
    }

    /// # Errors
    ///
    /// `InvalidRing` when the number of inner rings does not fit the kind's
    /// role, or when an aggregating ring lists the same inner twice.
    pub fn build(self) -> Result<Ring, DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::InvalidRing {
                name: self.name,
                reason: "ring name cannot be empty".into(),
            });
        }

        let count = self.inners.len();
        let reason = match self.kind.role() {
            RingRole::Core if count > 0 => Some(format!("a {} ring wraps nothing", self.kind)),
            RingRole::Wrapping if count != 1 => Some(format!(
                "a {} ring wraps exactly one inner ring, got {count}",
                self.kind
            )),
            RingRole::Aggregating if count == 0 => Some(format!(
                "a {} ring aggregates at least one inner ring",
                self.kind
            )),
            _ => None,
        };
        if let Some(reason) = reason {
            return Err(DomainError::InvalidRing {
                name: self.name,
                reason,
            });
        }

        for (i, a) in self.inners.iter().enumerate() {
            if self.inners[..i].iter().any(|b| a.same_as(b)) {
                return Err(DomainError::InvalidRing {
                    name: self.name,
                    reason: format!("inner ring '{}' listed twice", a.name()),
                });
            }
        }

        Ok(Ring(Arc::new(RingNode {
            name: self.name,
            kind: self.kind,
            export: self.export,
            inners: self.inners,
        })))
    }
}

// ── RingGraph ────────────────────────────────────────────────────────────────

/// The architecture as a set of named root rings.
#[derive(Debug, Clone, Default)]
pub struct RingGraph {
    roots: Vec<(String, Ring)>,
}

impl RingGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(mut self, name: impl Into<String>, ring: &Ring) -> Self {
        self.add_root(name, ring);
        self
    }

    pub fn add_root(&mut self, name: impl Into<String>, ring: &Ring) {
        self.roots.push((name.into(), ring.clone()));
    }

    pub fn roots(&self) -> impl Iterator<Item = (&str, &Ring)> {
        self.roots.iter().map(|(n, r)| (n.as_str(), r))
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_aliases() {
        assert_eq!("tauri".parse::<RingKind>().unwrap(), RingKind::Plugin);
        assert_eq!("UI".parse::<RingKind>().unwrap(), RingKind::Frontend);
        assert!("web".parse::<RingKind>().is_err());
    }

    #[test]
    fn identity_is_by_reference() {
        let a = Ring::core("core");
        let b = Ring::core("core");
        assert!(!a.same_as(&b));
        assert_ne!(a.id(), b.id());
        assert!(a.same_as(&a.clone()));
        assert_eq!(a.id(), a.clone().id());
    }

    #[test]
    fn wrapping_ring_requires_one_inner() {
        let core = Ring::core("core");
        assert!(Ring::builder(RingKind::Android, "android").build().is_err());
        let ring = Ring::builder(RingKind::Android, "android")
            .export("app-android")
            .wraps(&core)
            .build()
            .unwrap();
        assert_eq!(ring.role(), RingRole::Wrapping);
        assert_eq!(ring.export(), Some("app-android"));
        assert!(ring.inners()[0].same_as(&core));
    }

    #[test]
    fn core_ring_cannot_wrap() {
        let core = Ring::core("core");
        let err = Ring::builder(RingKind::Core, "other")
            .wraps(&core)
            .build()
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidRing { .. }));
    }

    #[test]
    fn aggregator_rejects_duplicate_inner() {
        let core = Ring::core("core");
        let desktop = Ring::builder(RingKind::Desktop, "desktop")
            .wraps(&core)
            .build()
            .unwrap();
        let result = Ring::builder(RingKind::Plugin, "plugin")
            .wraps(&desktop)
            .wraps(&desktop)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn reach_level_follows_kind() {
        assert_eq!(RingKind::Core.reach_level(), ReachLevel::Core);
        assert_eq!(RingKind::Ios.reach_level(), ReachLevel::Platform);
        assert_eq!(RingKind::Frontend.reach_level(), ReachLevel::Front);
    }
}
