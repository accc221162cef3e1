use std::collections::{BTreeMap, BTreeSet};

use voldeps_core::bare_name;

use crate::{DependencyDelta, ModelDelta, ProjectDependencyRecord};

fn index_by_name<'a, I>(specifiers: I) -> BTreeMap<&'a str, &'a str>
where
    I: IntoIterator<Item = &'a String>,
{
    specifiers
        .into_iter()
        .map(|specifier| (bare_name(specifier), specifier.as_str()))
        .collect()
}

/// Compares a recorded specifier set with a requested one by bare package
/// name. A name present on both sides with a different full specifier is
/// reported once, as `updated`, carrying the requested specifier.
pub fn diff_specifiers<'a, O, N>(old: O, new: N) -> DependencyDelta
where
    O: IntoIterator<Item = &'a String>,
    N: IntoIterator<Item = &'a String>,
{
    let old = index_by_name(old);
    let new = index_by_name(new);

    let mut delta = DependencyDelta::default();
    for (name, specifier) in &new {
        match old.get(name) {
            None => {
                delta.added.insert((*specifier).to_string());
            }
            Some(previous) if previous != specifier => {
                delta.updated.insert((*specifier).to_string());
            }
            Some(_) => {}
        }
    }
    for (name, specifier) in &old {
        if !new.contains_key(name) {
            delta.removed.insert((*specifier).to_string());
        }
    }
    delta
}

/// Declared models (source → ids) against the models already registered.
pub fn diff_models(
    record: &ProjectDependencyRecord,
    declared: &BTreeMap<String, Vec<String>>,
) -> ModelDelta {
    let mut declared_ids = BTreeSet::new();
    let mut added = Vec::new();
    for (source, ids) in declared {
        for id in ids {
            declared_ids.insert(id.as_str());
            if !record.models.contains_key(id) {
                added.push((id.clone(), source.clone()));
            }
        }
    }

    let removed = record
        .models
        .keys()
        .filter(|id| !declared_ids.contains(id.as_str()))
        .cloned()
        .collect();

    ModelDelta { added, removed }
}
