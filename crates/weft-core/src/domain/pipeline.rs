//! Pure method-list pipeline.
//!
//! A pipeline flattens the capabilities visible at one reach level into a
//! method list, folds it through ordered stages, and only then applies the
//! tag exclusion set. Exclusion is a separate field rather than a stage so
//! it cannot be interleaved with transformations: a tag added by the last
//! stage is still seen by the filter.
//!
//! Stages are plain functions `Vec<Method> -> Vec<Method>` with no access to
//! the filesystem or any other state.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::domain::capability::{Capability, MethodParam, ReachLevel};
use crate::domain::method::{CrudOp, CrudShape, Method};
use crate::domain::naming::to_snake_case;

/// One transformation stage.
pub type Stage = Arc<dyn Fn(Vec<Method>) -> Vec<Method> + Send + Sync>;

#[derive(Clone)]
pub struct MethodPipeline {
    level: ReachLevel,
    stages: Vec<Stage>,
    exclude: BTreeSet<String>,
}

impl MethodPipeline {
    pub fn new(level: ReachLevel) -> Self {
        Self {
            level,
            stages: Vec::new(),
            exclude: BTreeSet::new(),
        }
    }

    /// Append a stage. Stages run in insertion order.
    pub fn stage(mut self, stage: impl Fn(Vec<Method>) -> Vec<Method> + Send + Sync + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn shared_stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn exclude_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn level(&self) -> ReachLevel {
        self.level
    }

    pub fn run(&self, capabilities: &[Capability]) -> Vec<Method> {
        let methods = collect_methods(capabilities, self.level);
        let transformed = self
            .stages
            .iter()
            .fold(methods, |acc, stage| stage(acc));
        exclude_tagged(transformed, &self.exclude)
    }
}

impl fmt::Debug for MethodPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodPipeline")
            .field("level", &self.level)
            .field("stages", &self.stages.len())
            .field("exclude", &self.exclude)
            .finish()
    }
}

/// Flatten every capability visible at `level`, in declaration order.
pub fn collect_methods(capabilities: &[Capability], level: ReachLevel) -> Vec<Method> {
    capabilities
        .iter()
        .filter(|c| c.reach().visible_at(level))
        .flat_map(|c| c.methods().iter().map(move |m| Method::from_declared(c, m)))
        .collect()
}

/// `{capability_prefix}_{method_name}` in snake case.
pub fn prefix_methods(methods: Vec<Method>) -> Vec<Method> {
    methods
        .into_iter()
        .map(|mut m| {
            m.name = format!(
                "{}_{}",
                to_snake_case(&m.capability_prefix),
                to_snake_case(&m.original_name)
            );
            m
        })
        .collect()
}

/// Drop methods whose tags intersect `exclude`. Untagged methods always stay.
pub fn exclude_tagged(methods: Vec<Method>, exclude: &BTreeSet<String>) -> Vec<Method> {
    if exclude.is_empty() {
        return methods;
    }
    methods
        .into_iter()
        .filter(|m| m.tags.is_empty() || !m.has_any_tag(exclude))
        .collect()
}

/// Rewrite CRUD-tagged methods into their canonical interface shape.
pub fn restructure_crud(methods: Vec<Method>) -> Vec<Method> {
    // (capability, entity) -> bind name of the read method
    let reads: Vec<(String, String, String)> = methods
        .iter()
        .filter_map(|m| {
            let (op, entity) = m.crud_tag()?;
            (op == CrudOp::Read).then(|| {
                (
                    m.capability.clone(),
                    entity.map_or_else(|| m.entity.clone(), str::to_string),
                    m.name.clone(),
                )
            })
        })
        .collect();

    methods
        .into_iter()
        .map(|m| {
            let Some((op, entity)) = m.crud_tag() else {
                return m;
            };
            let entity = entity.map_or_else(|| m.entity.clone(), str::to_string);
            match op {
                CrudOp::Create => {
                    let read_after = reads
                        .iter()
                        .find(|(cap, e, _)| *cap == m.capability && *e == entity)
                        .map(|(_, _, name)| name.clone());
                    if read_after.is_none() {
                        warn!(
                            capability = %m.capability,
                            method = %m.original_name,
                            entity = %entity,
                            "create method has no sibling read; no read-after-create linkage"
                        );
                    }
                    restructure_create(m, entity, read_after)
                }
                CrudOp::Update => restructure_update(m, entity),
                CrudOp::Delete => restructure_delete(m, entity),
                CrudOp::Read | CrudOp::List => {
                    let mut m = m;
                    m.crud = Some(CrudShape {
                        op,
                        entity,
                        data_type: None,
                        fields: Vec::new(),
                        transform: None,
                        read_after: None,
                    });
                    m
                }
            }
        })
        .collect()
}

fn restructure_create(mut m: Method, entity: String, read_after: Option<String>) -> Method {
    let data_type = format!("Create{entity}");
    let fields = std::mem::take(&mut m.params);
    m.params = vec![MethodParam::new("data", data_type.clone())];
    m.crud = Some(CrudShape {
        op: CrudOp::Create,
        transform: Some(data_expression(&fields)),
        data_type: Some(data_type),
        fields,
        entity,
        read_after,
    });
    m
}

fn restructure_update(mut m: Method, entity: String) -> Method {
    if m.params.is_empty() {
        warn!(method = %m.original_name, "update method has no identifier parameter; left unchanged");
        return m;
    }
    let mut params = std::mem::take(&mut m.params);
    let rest = params.split_off(1);
    let mut id = params.remove(0);
    id.name = "id".into();

    let data_type = format!("Update{entity}");
    m.params = vec![id];
    let (data_type, transform) = if rest.is_empty() {
        (None, None)
    } else {
        m.params.push(MethodParam::new("data", data_type.clone()));
        (Some(data_type), Some(data_expression(&rest)))
    };
    m.crud = Some(CrudShape {
        op: CrudOp::Update,
        entity,
        data_type,
        fields: rest,
        transform,
        read_after: None,
    });
    m
}

fn restructure_delete(mut m: Method, entity: String) -> Method {
    if m.params.is_empty() {
        warn!(method = %m.original_name, "delete method has no identifier parameter; left unchanged");
        return m;
    }
    let mut id = m.params.remove(0);
    id.name = "id".into();
    m.params = vec![id];
    m.crud = Some(CrudShape {
        op: CrudOp::Delete,
        entity,
        data_type: None,
        fields: Vec::new(),
        transform: None,
        read_after: None,
    });
    m
}

/// `{ url: data.url, title: data.title }`
fn data_expression(fields: &[MethodParam]) -> String {
    if fields.is_empty() {
        return "{}".into();
    }
    let inner = fields
        .iter()
        .map(|f| format!("{0}: data.{0}", f.name))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{ {inner} }}")
}
