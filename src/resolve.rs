//! Reference resolution: converting between physical indices and logical
//! names.
//!
//! The byte format stores cross-record references as signed positions into a
//! *concatenation order* — a fixed, version-specific ordering of the scoped
//! containers' record lists (ranked by sub-kind, container record order
//! preserved within a rank).  The public API exposes them as target names.
//!
//! Both directions are pure scene-to-scene projections: [`resolve`] turns a
//! freshly parsed, index-tagged scene into a name-tagged one, and
//! [`unresolve`] turns a name-tagged scene back into an index-tagged one.
//! `unresolve` runs [`disambiguate`] internally before any lookup, because
//! index values depend on the final, collision-free name set; both passes
//! complete before a single byte is emitted.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::{FormatError, Result};
use crate::registry::VariantRegistry;
use crate::scene::Scene;

// ── Reference ────────────────────────────────────────────────────────────────

/// A directed edge from one record's field to another record.
///
/// `Index` is the physical projection (the stored integer, scoped to the
/// concatenation order); `Name` is the logical projection.  `None` is the
/// null reference, stored on disk as the index −1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Reference {
    None,
    Index(i32),
    Name(String),
}

impl Reference {
    /// The raw index this reference serializes as.  A named reference is an
    /// internal-consistency error: `unresolve` must run before writing.
    pub fn to_index(&self) -> Result<i32> {
        match self {
            Reference::None     => Ok(-1),
            Reference::Index(i) => Ok(*i),
            Reference::Name(n)  => Err(FormatError::InternalConsistency(format!(
                "reference to {n:?} was not unresolved to an index before serialization"
            ))),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Reference::None)
    }
}

/// Implemented by payload types whose fields contain references.  Fields are
/// visited in a fixed, layout order.
pub trait HasRefs {
    fn visit_refs<F>(&mut self, f: F) -> Result<()>
    where
        F: FnMut(&mut Reference) -> Result<()>;
}

// ── Concatenation order ──────────────────────────────────────────────────────

/// `(container index, record index)` pairs of the scoped records, in the
/// format's fixed concatenation order: ranked by sub-kind, stable within a
/// rank.  Read and write must use the identical order or indices silently
/// point at the wrong record.
fn concat_order<R: VariantRegistry>(scene: &Scene<R::Payload>, reg: &R) -> Vec<(usize, usize)> {
    let scope = reg.reference_scope();
    let mut entries: Vec<(usize, usize, usize)> = Vec::new();
    for (ci, container) in scene.containers.iter().enumerate() {
        if !scope.contains(&container.name.as_str()) {
            continue;
        }
        for (ri, record) in container.records.iter().enumerate() {
            entries.push((reg.concat_rank(&record.payload), ci, ri));
        }
    }
    entries.sort_by_key(|&(rank, _, _)| rank);
    entries.into_iter().map(|(_, ci, ri)| (ci, ri)).collect()
}

fn concat_names<R: VariantRegistry>(scene: &Scene<R::Payload>, reg: &R) -> Vec<String> {
    concat_order(scene, reg)
        .into_iter()
        .map(|(ci, ri)| scene.containers[ci].records[ri].name.clone())
        .collect()
}

// ── Resolve: index → name ────────────────────────────────────────────────────

/// Project a parsed, index-tagged scene into its name-tagged form.
///
/// Index −1 becomes [`Reference::None`]; any other out-of-bounds or negative
/// index is an [`FormatError::OffsetOutOfRange`].
pub fn resolve<R>(scene: &Scene<R::Payload>, reg: &R) -> Result<Scene<R::Payload>>
where
    R: VariantRegistry,
    R::Payload: HasRefs,
{
    let names = concat_names(scene, reg);
    let mut out = scene.clone();
    for container in &mut out.containers {
        for record in &mut container.records {
            let record_name = record.name.clone();
            record.payload.visit_refs(|r| {
                let mapped = match &*r {
                    Reference::None => None,
                    Reference::Index(-1) => Some(Reference::None),
                    Reference::Index(i) => {
                        let i = *i;
                        if i < 0 || i as usize >= names.len() {
                            return Err(FormatError::OffsetOutOfRange {
                                value:   i as i64,
                                bound:   names.len() as u64,
                                context: "reference index",
                            });
                        }
                        Some(Reference::Name(names[i as usize].clone()))
                    }
                    Reference::Name(_) => {
                        return Err(FormatError::InternalConsistency(format!(
                            "record {record_name:?} already carries named references"
                        )))
                    }
                };
                if let Some(m) = mapped {
                    *r = m;
                }
                Ok(())
            })?;
        }
    }
    Ok(out)
}

// ── Disambiguation ───────────────────────────────────────────────────────────

/// Uniqueness-adjust a name multiset: the first occurrence keeps the bare
/// name, later occurrences get `"{name} (n)"` with n counting from 2, where
/// `name` is always the original name (suffixes never stack).  The scan
/// repeats until a full pass renames nothing, since a generated suffix can
/// itself collide with a pre-existing distinct name.
pub fn disambiguate_names(names: &[String]) -> Vec<String> {
    let mut current: Vec<String> = names.to_vec();
    let mut next_suffix: HashMap<String, usize> = HashMap::new();
    loop {
        let mut seen: HashSet<String> = HashSet::new();
        let mut renames = 0usize;
        for i in 0..current.len() {
            if !seen.insert(current[i].clone()) {
                let n = next_suffix.entry(names[i].clone()).or_insert(1);
                *n += 1;
                current[i] = format!("{} ({})", names[i], n);
                seen.insert(current[i].clone());
                renames += 1;
            }
        }
        if renames == 0 {
            return current;
        }
    }
}

/// Apply [`disambiguate_names`] to the scene's name-resolution scope, in
/// concatenation order.  Idempotent once names are collision-free.
pub fn disambiguate<R>(scene: &Scene<R::Payload>, reg: &R) -> Scene<R::Payload>
where
    R: VariantRegistry,
{
    let order = concat_order(scene, reg);
    let originals: Vec<String> = order
        .iter()
        .map(|&(ci, ri)| scene.containers[ci].records[ri].name.clone())
        .collect();
    let adjusted = disambiguate_names(&originals);

    let mut out = scene.clone();
    for (&(ci, ri), name) in order.iter().zip(adjusted) {
        out.containers[ci].records[ri].name = name;
    }
    out
}

// ── Unresolve: name → index ──────────────────────────────────────────────────

/// Project a name-tagged scene back into its index-tagged form, ready for
/// serialization.
///
/// Disambiguation runs first so the lookups and the physical indices agree
/// with the names that will actually be written.  A name with no record in
/// the concatenated scope is a [`FormatError::ReferenceLookupFailure`].
pub fn unresolve<R>(scene: &Scene<R::Payload>, reg: &R) -> Result<Scene<R::Payload>>
where
    R: VariantRegistry,
    R::Payload: HasRefs,
{
    let mut out = disambiguate(scene, reg);
    let names = concat_names(&out, reg);
    for container in &mut out.containers {
        for record in &mut container.records {
            let record_name = record.name.clone();
            record.payload.visit_refs(|r| {
                let mapped = match &*r {
                    Reference::None => Reference::Index(-1),
                    Reference::Name(n) => {
                        // First match in concatenation order.
                        let pos = names.iter().position(|cand| cand == n).ok_or_else(|| {
                            FormatError::ReferenceLookupFailure {
                                name:   n.clone(),
                                record: record_name.clone(),
                            }
                        })?;
                        Reference::Index(pos as i32)
                    }
                    Reference::Index(_) => {
                        return Err(FormatError::InternalConsistency(format!(
                            "record {record_name:?} already carries index references"
                        )))
                    }
                };
                *r = mapped;
                Ok(())
            })?;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn duplicate_names_are_numbered_in_order() {
        let out = disambiguate_names(&names(&["Door", "Door", "Door"]));
        assert_eq!(out, names(&["Door", "Door (2)", "Door (3)"]));
    }

    #[test]
    fn first_occurrence_keeps_bare_name() {
        let out = disambiguate_names(&names(&["Lamp", "Door", "Lamp"]));
        assert_eq!(out, names(&["Lamp", "Door", "Lamp (2)"]));
    }

    #[test]
    fn generated_suffix_collision_reaches_fixpoint() {
        // The second "Door" is renamed to "Door (2)", colliding with the
        // pre-existing record of that name, which is renamed on the next pass.
        let out = disambiguate_names(&names(&["Door", "Door", "Door (2)"]));
        let unique: HashSet<&String> = out.iter().collect();
        assert_eq!(unique.len(), out.len());
        assert_eq!(out[0], "Door");
        assert_eq!(out[1], "Door (2)");
        assert!(out[2].starts_with("Door (2)"));
    }

    #[test]
    fn disambiguation_is_idempotent_on_unique_names() {
        let input = names(&["A", "B", "C"]);
        assert_eq!(disambiguate_names(&input), input);
    }
}
