//! Capability declarations ("managements").
//!
//! A capability is a named bundle of methods the core exposes, together with
//! how far out through the rings it reaches. Capabilities are declared
//! eagerly as plain values; nothing is discovered by reflection.
//!
//! ```rust
//! use weft_core::domain::{Capability, CapabilityMethod, MethodParam, Reach};
//!
//! let bookmarks = Capability::declare(
//!     "BookmarkMgmt",
//!     Reach::Global,
//!     vec![
//!         CapabilityMethod::new("addBookmark")
//!             .param(MethodParam::new("url", "string"))
//!             .param(MethodParam::optional("title", "string"))
//!             .returns("Bookmark")
//!             .tag("crud:create"),
//!     ],
//! )
//! .unwrap();
//! assert_eq!(bookmarks.prefix(), "bookmark");
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;
use crate::domain::naming::{to_pascal_case, to_snake_case};

/// Suffixes stripped from a capability name to derive its prefix and entity.
const CAPABILITY_SUFFIXES: &[&str] = &["Management", "Manager", "Mgmt", "Mgr"];

// ── Reach ────────────────────────────────────────────────────────────────────

/// How far a capability reaches through the rings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reach {
    /// Core ring only.
    Private,
    /// Core plus its direct platform wrappers.
    Local,
    /// Every ring, including the UI-facing ones.
    Global,
}

/// The reach level a generator works at. Each level receives every
/// capability a wider level receives, plus its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReachLevel {
    Core,
    Platform,
    Front,
}

impl Reach {
    /// Outermost level this reach is visible at.
    pub const fn max_level(&self) -> ReachLevel {
        match self {
            Self::Private => ReachLevel::Core,
            Self::Local => ReachLevel::Platform,
            Self::Global => ReachLevel::Front,
        }
    }

    pub fn visible_at(&self, level: ReachLevel) -> bool {
        level <= self.max_level()
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Local => "local",
            Self::Global => "global",
        }
    }
}

impl fmt::Display for Reach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Reach {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "private" => Ok(Self::Private),
            "local" => Ok(Self::Local),
            "global" => Ok(Self::Global),
            other => Err(DomainError::InvalidCapability {
                name: String::new(),
                reason: format!("unknown reach '{other}'"),
            }),
        }
    }
}

impl ReachLevel {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Core => "core",
            Self::Platform => "platform",
            Self::Front => "front",
        }
    }
}

impl FromStr for ReachLevel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "core" => Ok(Self::Core),
            "platform" => Ok(Self::Platform),
            "front" => Ok(Self::Front),
            other => Err(DomainError::InvalidTreadle {
                name: String::new(),
                reason: format!("unknown reach level '{other}'"),
            }),
        }
    }
}

// ── Methods ──────────────────────────────────────────────────────────────────

/// A declared parameter. `ty` is a generic type token (`string`, `number`,
/// `Bookmark`, `string[]`), mapped per target at emission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodParam {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub optional: bool,
}

impl MethodParam {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            optional: false,
        }
    }

    pub fn optional(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            optional: true,
            ..Self::new(name, ty)
        }
    }
}

/// A method as declared on a capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityMethod {
    pub name: String,
    pub params: Vec<MethodParam>,
    pub return_type: String,
    pub is_collection: bool,
    pub tags: BTreeSet<String>,
    pub description: String,
}

impl CapabilityMethod {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            return_type: "void".into(),
            is_collection: false,
            tags: BTreeSet::new(),
            description: String::new(),
        }
    }

    pub fn param(mut self, param: MethodParam) -> Self {
        self.params.push(param);
        self
    }

    pub fn returns(mut self, ty: impl Into<String>) -> Self {
        self.return_type = ty.into();
        self
    }

    pub fn collection(mut self) -> Self {
        self.is_collection = true;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

// ── Link metadata ────────────────────────────────────────────────────────────

/// Semantics of the field wrapper holding a capability's implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldWrapper {
    /// The field may be absent (`Option<T>`).
    Optional,
    /// Access goes through a mutual-exclusion guard (`Mutex<T>`).
    Mutex,
}

/// Which field of the owning structure implements a capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkMetadata {
    pub field: String,
    #[serde(default)]
    pub wrappers: Vec<FieldWrapper>,
}

impl LinkMetadata {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            wrappers: Vec::new(),
        }
    }

    pub fn wrapped(mut self, wrapper: FieldWrapper) -> Self {
        self.wrappers.push(wrapper);
        self
    }

    pub fn is_optional(&self) -> bool {
        self.wrappers.contains(&FieldWrapper::Optional)
    }

    pub fn is_guarded(&self) -> bool {
        self.wrappers.contains(&FieldWrapper::Mutex)
    }
}

// ── Capability ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    name: String,
    reach: Reach,
    methods: Vec<CapabilityMethod>,
    link: Option<LinkMetadata>,
    prefix: Option<String>,
}

impl Capability {
    /// Declare a capability.
    ///
    /// # Errors
    ///
    /// `InvalidCapability` for an empty name, an unnamed method, or two
    /// methods with the same name.
    pub fn declare(
        name: impl Into<String>,
        reach: Reach,
        methods: Vec<CapabilityMethod>,
    ) -> Result<Self, DomainError> {
        let capability = Self {
            name: name.into(),
            reach,
            methods,
            link: None,
            prefix: None,
        };
        capability.validate()?;
        Ok(capability)
    }

    pub fn with_link(mut self, link: LinkMetadata) -> Self {
        self.link = Some(link);
        self
    }

    /// Override the derived prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::InvalidCapability {
                name: self.name.clone(),
                reason: "capability name cannot be empty".into(),
            });
        }

        let mut seen = BTreeSet::new();
        for method in &self.methods {
            if method.name.trim().is_empty() {
                return Err(DomainError::InvalidCapability {
                    name: self.name.clone(),
                    reason: "method name cannot be empty".into(),
                });
            }
            if !seen.insert(method.name.as_str()) {
                return Err(DomainError::InvalidCapability {
                    name: self.name.clone(),
                    reason: format!("duplicate method '{}'", method.name),
                });
            }
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reach(&self) -> Reach {
        self.reach
    }

    pub fn methods(&self) -> &[CapabilityMethod] {
        &self.methods
    }

    pub fn link(&self) -> Option<&LinkMetadata> {
        self.link.as_ref()
    }

    /// Name with any management suffix removed: `BookmarkMgmt` → `Bookmark`.
    pub fn stem(&self) -> &str {
        CAPABILITY_SUFFIXES
            .iter()
            .find_map(|suffix| {
                self.name
                    .strip_suffix(suffix)
                    .filter(|stem| !stem.is_empty())
            })
            .unwrap_or(&self.name)
    }

    /// snake_case prefix for bind-point names.
    pub fn prefix(&self) -> String {
        self.prefix
            .clone()
            .unwrap_or_else(|| to_snake_case(self.stem()))
    }

    /// PascalCase entity used for synthesized CRUD types.
    pub fn entity(&self) -> String {
        to_pascal_case(self.stem())
    }
}
