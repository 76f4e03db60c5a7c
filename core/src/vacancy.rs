//! Vacancy catalogue for job / school-seat assignment.
//!
//! Per type, zones holding vacancies live in one dense array. The first
//! `active` slots are exactly the zones with at least one vacant id; a zone
//! whose last id is taken is swapped with the last active slot and the
//! logical length shrinks by one. Zone order carries no meaning, so the
//! O(1) removal is free to reorder.
//!
//! A zone's vacancy count is the length of its id list, so
//! `count(T, Z) == len(ids(T, Z))` holds by construction.

use crate::types::ZoneId;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;

#[derive(Debug, Clone)]
pub struct ZoneVacancies {
    pub zone:         ZoneId,
    /// Index of `zone` in the distance matrix.
    pub matrix_index: usize,
    /// Number of ids ever registered here. Never decremented.
    pub capacity:     usize,
    ids:              Vec<u64>,
}

impl ZoneVacancies {
    pub fn count(&self) -> usize {
        self.ids.len()
    }

    pub fn ids(&self) -> &[u64] {
        &self.ids
    }
}

#[derive(Debug, Clone, Default)]
pub struct TypeVacancies {
    slots:    Vec<ZoneVacancies>,
    active:   usize,
    position: HashMap<ZoneId, usize>,
}

impl TypeVacancies {
    /// Zones with at least one vacancy, in arbitrary order.
    pub fn active_zones(&self) -> &[ZoneVacancies] {
        &self.slots[..self.active]
    }

    pub fn zone(&self, zone: ZoneId) -> Option<&ZoneVacancies> {
        self.position.get(&zone).map(|&i| &self.slots[i])
    }

    pub fn remaining(&self) -> usize {
        self.active_zones().iter().map(|z| z.count()).sum()
    }

    fn push(&mut self, zone: ZoneId, matrix_index: usize, id: u64) {
        let slot = match self.position.get(&zone) {
            Some(&i) => i,
            None => {
                self.slots.push(ZoneVacancies { zone, matrix_index, capacity: 0, ids: Vec::new() });
                let i = self.slots.len() - 1;
                self.position.insert(zone, i);
                i
            }
        };
        self.slots[slot].ids.push(id);
        self.slots[slot].capacity += 1;
        if slot >= self.active {
            self.swap_slots(slot, self.active);
            self.active += 1;
        }
    }

    /// Pop one vacant id from the active slot at `slot`.
    fn take(&mut self, slot: usize) -> Option<(ZoneId, u64)> {
        if slot >= self.active {
            return None;
        }
        let zone = self.slots[slot].zone;
        let id = self.slots[slot].ids.pop()?;
        if self.slots[slot].ids.is_empty() {
            let last = self.active - 1;
            self.swap_slots(slot, last);
            self.active = last;
        }
        Some((zone, id))
    }

    fn swap_slots(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.slots.swap(a, b);
        self.position.insert(self.slots[a].zone, a);
        self.position.insert(self.slots[b].zone, b);
    }

    fn check(&self) -> Result<(), String> {
        for (i, s) in self.slots.iter().enumerate() {
            if self.position.get(&s.zone) != Some(&i) {
                return Err(format!("zone {} position index out of sync", s.zone));
            }
            let is_active = i < self.active;
            if is_active != (s.count() > 0) {
                return Err(format!(
                    "zone {} has count {} but active={is_active}",
                    s.zone,
                    s.count()
                ));
            }
        }
        Ok(())
    }
}

/// Vacant entity ids by type and zone.
#[derive(Debug, Clone)]
pub struct VacancyCatalogue<K: Ord> {
    types: BTreeMap<K, TypeVacancies>,
}

impl<K: Ord> Default for VacancyCatalogue<K> {
    fn default() -> Self {
        Self { types: BTreeMap::new() }
    }
}

impl<K: Copy + Ord + Debug> VacancyCatalogue<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one vacant entity.
    pub fn insert(&mut self, kind: K, zone: ZoneId, matrix_index: usize, id: u64) {
        self.types.entry(kind).or_default().push(zone, matrix_index, id);
    }

    /// `None` once the type has no vacancy left anywhere.
    pub fn get(&self, kind: K) -> Option<&TypeVacancies> {
        self.types.get(&kind)
    }

    pub fn has_vacancy(&self, kind: K) -> bool {
        self.types.contains_key(&kind)
    }

    pub fn count(&self, kind: K, zone: ZoneId) -> usize {
        self.types
            .get(&kind)
            .and_then(|t| t.zone(zone))
            .map_or(0, |z| z.count())
    }

    pub fn active_zone_ids(&self, kind: K) -> Vec<ZoneId> {
        self.types
            .get(&kind)
            .map(|t| t.active_zones().iter().map(|z| z.zone).collect())
            .unwrap_or_default()
    }

    /// Take the last vacant id of the active slot `slot` for `kind`.
    /// Drops the type entirely when its last active zone empties.
    pub fn take(&mut self, kind: K, slot: usize) -> Option<(ZoneId, u64)> {
        let vacancies = self.types.get_mut(&kind)?;
        let taken = vacancies.take(slot)?;
        if vacancies.active == 0 {
            self.types.remove(&kind);
            log::debug!("vacancies: type {kind:?} exhausted");
        }
        Some(taken)
    }

    pub fn remaining(&self, kind: K) -> usize {
        self.types.get(&kind).map_or(0, |t| t.remaining())
    }

    pub fn total_remaining(&self) -> usize {
        self.types.values().map(|t| t.remaining()).sum()
    }

    pub fn kinds(&self) -> impl Iterator<Item = K> + '_ {
        self.types.keys().copied()
    }

    /// Verify the active-set invariant for every type.
    pub fn check_invariants(&self) -> Result<(), String> {
        for (kind, t) in &self.types {
            t.check().map_err(|e| format!("{kind:?}: {e}"))?;
            if t.active == 0 {
                return Err(format!("{kind:?}: empty type still listed"));
            }
        }
        Ok(())
    }
}
