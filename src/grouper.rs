// 🔍 Duplicate Grouper - Partition a scope's entities by natural key
//
// Scope is already bounded by the caller (one depot's papers, one source's
// accounts). Groups of size 1 are not duplicates and are dropped; groups of
// size >= 2 become candidate sets, entities in deterministic store order so
// reruns pair candidates the same way.

use std::collections::BTreeMap;

use crate::model::FinancialEntity;

/// One set of duplicate candidates sharing a natural key.
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    pub natural_key: String,
    pub entities: Vec<FinancialEntity>,
}

/// Partition entities by natural key and keep only the groups with at least
/// two members. Entities without a natural key cannot be matched to anything
/// and are skipped.
pub fn group_by_natural_key(entities: Vec<FinancialEntity>) -> Vec<DuplicateGroup> {
    let mut map: BTreeMap<String, Vec<FinancialEntity>> = BTreeMap::new();
    for entity in entities {
        let Some(key) = entity.natural_key() else {
            continue;
        };
        map.entry(key).or_default().push(entity);
    }

    map.into_iter()
        .filter(|(_, members)| members.len() >= 2)
        .map(|(natural_key, entities)| DuplicateGroup {
            natural_key,
            entities,
        })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
