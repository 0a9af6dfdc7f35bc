//! Declarative architecture manifest (`weft.toml`).
//!
//! Describes the rings, the capabilities and the treadles of a workspace so
//! that a weave can run without writing Rust.
//!
//! # `weft.toml` format
//!
//! ```toml
//! [graph]
//! roots = ["android", "plugin"]     # optional; default: every unwrapped ring
//!
//! [[rings]]
//! name = "engine"
//! kind = "core"
//!
//! [[rings]]
//! name   = "android"
//! kind   = "android"
//! export = "app-android"
//! wraps  = ["engine"]
//!
//! [[capabilities]]
//! name   = "BookmarkMgmt"
//! reach  = "global"                 # private | local | global
//! link   = { field = "bookmarks", wrappers = ["optional", "mutex"] }
//!
//! [[capabilities.methods]]
//! name    = "addBookmark"
//! params  = [{ name = "url", type = "string" }, { name = "title", type = "string", optional = true }]
//! returns = "number"
//! tags    = ["crud:create"]
//!
//! [[treadles]]
//! name   = "jni"
//! match  = ["android->core"]
//! prefix = true
//! crud   = true
//! target = "rust-jni"
//!
//! [[treadles.outputs]]
//! template = "jni/bridge.rs"
//! path     = "{export}/src/jni/{capability.prefix}.rs"
//! each     = "capability"           # one output per capability in the method list
//!
//! [[treadles.patches]]
//! template = "jni/mod-decl.rs"
//! path     = "{export}/src/lib.rs"
//! block    = "mod-decl"
//! anchor   = { at = "after", pattern = "^pub mod " }
//!
//! [[treadles.hookups]]
//! kind     = "cargo-dependency"
//! manifest = "{export}/Cargo.toml"
//! name     = "jni"
//! version  = "0.21"
//! ```

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use weft_core::application::treadle::SpecScope;
use weft_core::application::{
    CompiledTreadle, Hookup, Matrix, OutputSpec, PatchSpec, SkipIf, TreadleDefinition,
};
use weft_core::domain::{
    Anchor, Capability, CapabilityMethod, DataBag, DomainError, EmitTarget, Language,
    LinkMetadata, Method, MethodParam, Reach, ReachLevel, Ring, RingGraph, RingKind,
};
use weft_core::error::{WeftError, WeftResult};

use crate::filesystem::map_io_error;
use crate::hookups::{CargoDependency, DependencySource, JsonDependency};

/// Conventional file name, looked up at the workspace root.
pub const MANIFEST_FILE: &str = "weft.toml";

// ── Manifest types ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ManifestFile {
    pub graph: Option<GraphSection>,
    #[serde(default)]
    pub rings: Vec<RingEntry>,
    #[serde(default)]
    pub capabilities: Vec<CapabilityEntry>,
    #[serde(default)]
    pub treadles: Vec<TreadleEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphSection {
    /// Ring names to start the walk from.
    pub roots: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RingEntry {
    pub name: String,
    pub kind: String,
    pub export: Option<String>,
    #[serde(default)]
    pub wraps: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CapabilityEntry {
    pub name: String,
    pub reach: Reach,
    pub prefix: Option<String>,
    pub link: Option<LinkMetadata>,
    #[serde(default)]
    pub methods: Vec<MethodEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MethodEntry {
    pub name: String,
    #[serde(default)]
    pub params: Vec<ParamEntry>,
    pub returns: Option<String>,
    #[serde(default)]
    pub collection: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TreadleEntry {
    pub name: String,
    /// `"outer->inner"` kind pairs.
    #[serde(rename = "match")]
    pub matches: Vec<String>,
    #[serde(default)]
    pub prefix: bool,
    #[serde(default)]
    pub crud: bool,
    pub level: Option<String>,
    #[serde(default)]
    pub exclude_tags: Vec<String>,
    pub target: Option<String>,
    #[serde(default)]
    pub outputs: Vec<OutputEntry>,
    #[serde(default)]
    pub patches: Vec<PatchEntry>,
    #[serde(default)]
    pub hookups: Vec<HookupEntry>,
}

/// Fan-out unit for `each`.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Each {
    Capability,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipEntry {
    Exists,
    NoMethods,
    Falsy(String),
}

impl From<SkipEntry> for SkipIf {
    fn from(entry: SkipEntry) -> Self {
        match entry {
            SkipEntry::Exists => SkipIf::Exists,
            SkipEntry::NoMethods => SkipIf::NoMethods,
            SkipEntry::Falsy(key) => SkipIf::Falsy(key),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputEntry {
    pub template: String,
    pub path: String,
    pub target: Option<String>,
    pub capability: Option<String>,
    pub each: Option<Each>,
    pub skip_if: Option<SkipEntry>,
    #[serde(default)]
    pub context: DataBag,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatchEntry {
    pub template: String,
    pub path: String,
    pub block: String,
    pub language: Option<String>,
    pub target: Option<String>,
    #[serde(default)]
    pub anchor: Anchor,
    #[serde(default)]
    pub create_if_missing: bool,
    pub capability: Option<String>,
    pub each: Option<Each>,
    pub skip_if: Option<SkipEntry>,
    #[serde(default)]
    pub context: DataBag,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case", deny_unknown_fields)]
pub enum HookupEntry {
    CargoDependency {
        manifest: String,
        name: String,
        version: Option<String>,
        path: Option<String>,
        #[serde(default)]
        workspace: bool,
    },
    JsonDependency {
        manifest: String,
        name: String,
        version: String,
        section: Option<String>,
    },
}

// ── Loaded result ────────────────────────────────────────────────────────────

/// Everything a weave needs, built from a manifest.
#[derive(Debug, Clone, Default)]
pub struct WeaveManifest {
    pub graph: RingGraph,
    /// All rings, in declaration order.
    pub rings: Vec<Ring>,
    pub capabilities: Vec<Capability>,
    pub treadles: Vec<TreadleDefinition>,
}

impl WeaveManifest {
    pub fn ring(&self, name: &str) -> Option<&Ring> {
        self.rings.iter().find(|r| r.name() == name)
    }

    /// Compile every treadle and register it for its match pairs. A pair
    /// claimed by two treadles goes to the later one.
    pub fn matrix(&self) -> WeftResult<Matrix> {
        let mut matrix = Matrix::new();
        for def in &self.treadles {
            for (outer, inner) in def.matches() {
                if matrix.contains(*outer, *inner) {
                    warn!(
                        treadle = def.name(),
                        pair = %format!("{outer}->{inner}"),
                        "pair already registered; later treadle wins"
                    );
                }
            }
            CompiledTreadle::compile(def.clone())?.register(&mut matrix);
        }
        Ok(matrix)
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

/// Loads a [`WeaveManifest`] from a `weft.toml` file.
///
/// # Example
///
/// ```no_run
/// use weft_adapters::manifest_loader::ManifestLoader;
///
/// let manifest = ManifestLoader::new("./weft.toml").load()?;
/// println!("{} rings", manifest.rings.len());
/// # Ok::<(), weft_core::error::WeftError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ManifestLoader {
    path: PathBuf,
}

impl ManifestLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Loader for `weft.toml` under `root`.
    pub fn in_workspace(root: impl AsRef<Path>) -> Self {
        Self::new(root.as_ref().join(MANIFEST_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// # Errors
    ///
    /// - `FilesystemError` if the file cannot be read
    /// - `Configuration` if it is not valid TOML or has unknown fields
    /// - `InvalidRing` / `UnknownRingKind` / `InvalidCapability` /
    ///   `InvalidTreadle` for declarations that do not hold together
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> WeftResult<WeaveManifest> {
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|e| map_io_error(&self.path, e, "read manifest"))?;
        parse_manifest(&raw).map_err(|e| match e {
            WeftError::Configuration { message } => WeftError::Configuration {
                message: format!("{}: {message}", self.path.display()),
            },
            other => other,
        })
    }
}

/// Parse and validate manifest text.
pub fn parse_manifest(raw: &str) -> WeftResult<WeaveManifest> {
    let file: ManifestFile = toml::from_str(raw).map_err(|e| WeftError::Configuration {
        message: format!("invalid manifest: {e}"),
    })?;

    let rings = build_rings(&file.rings)?;
    let graph = build_graph(&file, &rings)?;
    let capabilities = build_capabilities(&file.capabilities)?;
    let treadles = build_treadles(file.treadles)?;

    debug!(
        rings = rings.len(),
        capabilities = capabilities.len(),
        treadles = treadles.len(),
        "manifest loaded"
    );
    Ok(WeaveManifest {
        graph,
        rings,
        capabilities,
        treadles,
    })
}

// ── Rings ────────────────────────────────────────────────────────────────────

fn invalid_ring(name: &str, reason: impl Into<String>) -> DomainError {
    DomainError::InvalidRing {
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn build_rings(entries: &[RingEntry]) -> Result<Vec<Ring>, DomainError> {
    let mut by_name: HashMap<&str, &RingEntry> = HashMap::new();
    for entry in entries {
        if by_name.insert(entry.name.as_str(), entry).is_some() {
            return Err(invalid_ring(&entry.name, "declared twice"));
        }
    }

    let mut built: HashMap<String, Ring> = HashMap::new();
    let mut rings = Vec::with_capacity(entries.len());
    for entry in entries {
        let ring = build_ring(entry, &by_name, &mut built, &mut Vec::new())?;
        rings.push(ring);
    }
    Ok(rings)
}

/// Inner rings first, so every `Ring` is built once and shared.
fn build_ring(
    entry: &RingEntry,
    by_name: &HashMap<&str, &RingEntry>,
    built: &mut HashMap<String, Ring>,
    path: &mut Vec<String>,
) -> Result<Ring, DomainError> {
    if let Some(ring) = built.get(&entry.name) {
        return Ok(ring.clone());
    }
    if path.contains(&entry.name) {
        path.push(entry.name.clone());
        return Err(invalid_ring(
            &entry.name,
            format!("cycle through {}", path.join(" -> ")),
        ));
    }

    path.push(entry.name.clone());
    let mut inners = Vec::with_capacity(entry.wraps.len());
    for inner in &entry.wraps {
        let inner_entry = by_name
            .get(inner.as_str())
            .ok_or_else(|| invalid_ring(&entry.name, format!("wraps unknown ring '{inner}'")))?;
        inners.push(build_ring(inner_entry, by_name, built, path)?);
    }
    path.pop();

    let kind = RingKind::from_str(&entry.kind)?;
    let mut builder = Ring::builder(kind, &entry.name).wraps_all(&inners);
    if let Some(export) = &entry.export {
        builder = builder.export(export);
    }
    let ring = builder.build()?;
    built.insert(entry.name.clone(), ring.clone());
    Ok(ring)
}

fn build_graph(file: &ManifestFile, rings: &[Ring]) -> Result<RingGraph, DomainError> {
    let find = |name: &str| rings.iter().find(|r| r.name() == name);
    let mut graph = RingGraph::new();

    match &file.graph {
        Some(section) => {
            for root in &section.roots {
                let ring = find(root)
                    .ok_or_else(|| invalid_ring(root, "listed as a graph root but not declared"))?;
                graph.add_root(root.clone(), ring);
            }
        }
        None => {
            let wrapped: BTreeSet<&str> = file
                .rings
                .iter()
                .flat_map(|r| r.wraps.iter().map(String::as_str))
                .collect();
            for ring in rings.iter().filter(|r| !wrapped.contains(r.name())) {
                graph.add_root(ring.name().to_string(), ring);
            }
        }
    }

    if graph.is_empty() && !rings.is_empty() {
        warn!("manifest declares rings but no graph roots");
    }
    Ok(graph)
}

// ── Capabilities ─────────────────────────────────────────────────────────────

fn build_capabilities(entries: &[CapabilityEntry]) -> Result<Vec<Capability>, DomainError> {
    let mut seen = BTreeSet::new();
    let mut capabilities = Vec::with_capacity(entries.len());

    for entry in entries {
        if !seen.insert(entry.name.as_str()) {
            return Err(DomainError::InvalidCapability {
                name: entry.name.clone(),
                reason: "declared twice".into(),
            });
        }

        let methods = entry
            .methods
            .iter()
            .map(|m| {
                let mut method = CapabilityMethod::new(&m.name).describe(&m.description);
                for param in &m.params {
                    method = method.param(if param.optional {
                        MethodParam::optional(&param.name, &param.ty)
                    } else {
                        MethodParam::new(&param.name, &param.ty)
                    });
                }
                if let Some(returns) = &m.returns {
                    method = method.returns(returns);
                }
                if m.collection {
                    method = method.collection();
                }
                for tag in &m.tags {
                    method = method.tag(tag);
                }
                method
            })
            .collect();

        let mut capability = Capability::declare(&entry.name, entry.reach, methods)?;
        if let Some(prefix) = &entry.prefix {
            capability = capability.with_prefix(prefix);
        }
        if let Some(link) = &entry.link {
            capability = capability.with_link(link.clone());
        }
        capabilities.push(capability);
    }
    Ok(capabilities)
}

// ── Treadles ─────────────────────────────────────────────────────────────────

fn invalid_treadle(name: &str, reason: impl Into<String>) -> DomainError {
    DomainError::InvalidTreadle {
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn parse_pair(treadle: &str, raw: &str) -> Result<(RingKind, RingKind), DomainError> {
    let (outer, inner) = raw
        .split_once("->")
        .ok_or_else(|| invalid_treadle(treadle, format!("match '{raw}' is not 'outer->inner'")))?;
    Ok((
        RingKind::from_str(outer.trim())?,
        RingKind::from_str(inner.trim())?,
    ))
}

fn parse_target(raw: Option<&str>) -> Result<Option<EmitTarget>, DomainError> {
    raw.map(EmitTarget::from_str).transpose()
}

/// Distinct capabilities of a method list, in order, with the fields a
/// fanned-out spec may interpolate.
fn capability_groups(methods: &[Method]) -> Vec<(String, Value)> {
    let mut seen = BTreeSet::new();
    methods
        .iter()
        .filter(|m| seen.insert(m.capability.clone()))
        .map(|m| {
            (
                m.capability.clone(),
                json!({
                    "name": m.capability,
                    "prefix": m.capability_prefix,
                    "entity": m.entity,
                }),
            )
        })
        .collect()
}

fn build_treadles(entries: Vec<TreadleEntry>) -> Result<Vec<TreadleDefinition>, DomainError> {
    let mut seen = BTreeSet::new();
    let mut treadles = Vec::with_capacity(entries.len());

    for entry in entries {
        if !seen.insert(entry.name.clone()) {
            return Err(invalid_treadle(&entry.name, "declared twice"));
        }
        treadles.push(build_treadle(entry)?);
    }
    Ok(treadles)
}

fn build_treadle(entry: TreadleEntry) -> Result<TreadleDefinition, DomainError> {
    let name = entry.name;
    let mut builder = TreadleDefinition::builder(&name);

    for raw in &entry.matches {
        let (outer, inner) = parse_pair(&name, raw)?;
        builder = builder.matches(outer, inner);
    }
    if entry.prefix {
        builder = builder.prefix_methods();
    }
    if entry.crud {
        builder = builder.restructure_crud();
    }
    if let Some(level) = &entry.level {
        let level = ReachLevel::from_str(level)
            .map_err(|_| invalid_treadle(&name, format!("unknown level '{level}'")))?;
        builder = builder.level(level);
    }
    for tag in entry.exclude_tags {
        builder = builder.exclude_tag(tag);
    }
    if let Some(target) = parse_target(entry.target.as_deref())? {
        builder = builder.target(target);
    }

    for output in entry.outputs {
        let mut spec = OutputSpec::new(output.template, output.path);
        spec.context = output.context;
        spec.capability = output.capability;
        spec.target = parse_target(output.target.as_deref())?;
        spec.skip_if = output.skip_if.map(SkipIf::from);

        builder = match output.each {
            Some(Each::Capability) => builder.outputs_from(move |scope: &SpecScope<'_>| {
                capability_groups(scope.methods)
                    .into_iter()
                    .map(|(cap, value)| spec.clone().for_capability(cap).with("capability", value))
                    .collect()
            }),
            None => builder.output(spec),
        };
    }

    for patch in entry.patches {
        let mut spec = PatchSpec::new(patch.template, patch.path, patch.block).anchor(patch.anchor);
        if patch.create_if_missing {
            spec = spec.create_if_missing();
        }
        if let Some(language) = &patch.language {
            spec = spec.language(Language::from_str(language)?);
        }
        spec.context = patch.context;
        spec.capability = patch.capability;
        spec.target = parse_target(patch.target.as_deref())?;
        spec.skip_if = patch.skip_if.map(SkipIf::from);

        builder = match patch.each {
            Some(Each::Capability) => builder.patches_from(move |scope: &SpecScope<'_>| {
                capability_groups(scope.methods)
                    .into_iter()
                    .map(|(cap, value)| spec.clone().for_capability(cap).with("capability", value))
                    .collect()
            }),
            None => builder.patch(spec),
        };
    }

    for hookup in entry.hookups {
        builder = builder.shared_hookup(build_hookup(&name, hookup)?);
    }

    builder.build()
}

fn build_hookup(treadle: &str, entry: HookupEntry) -> Result<Arc<dyn Hookup>, DomainError> {
    Ok(match entry {
        HookupEntry::CargoDependency {
            manifest,
            name,
            version,
            path,
            workspace,
        } => {
            let source = match (version, path, workspace) {
                (Some(version), None, false) => DependencySource::Version(version),
                (None, Some(path), false) => DependencySource::Path(path),
                (None, None, true) => DependencySource::Workspace,
                _ => {
                    return Err(invalid_treadle(
                        treadle,
                        format!("cargo dependency '{name}' needs exactly one of version, path or workspace"),
                    ));
                }
            };
            Arc::new(CargoDependency::new(manifest, name, source))
        }
        HookupEntry::JsonDependency {
            manifest,
            name,
            version,
            section,
        } => {
            let mut hookup = JsonDependency::new(manifest, name, version);
            if let Some(section) = section {
                hookup = hookup.section(section);
            }
            Arc::new(hookup)
        }
    })
}
