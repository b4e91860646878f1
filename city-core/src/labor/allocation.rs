//! Worker allocation planning.
//!
//! Professions within one social class substitute for each other. A plan is
//! computed against the current free counts and only committed when it covers
//! the whole requirement, so a failed assignment never leaves a building
//! half-staffed.

use std::collections::BTreeMap;

use crate::error::EconomyError;
use crate::types::{ClassTable, ProfessionId, SocialClass, WorkerRequirement};

use super::profession::Profession;

pub type Professions = BTreeMap<ProfessionId, Profession>;

/// Sum a requirement per social class.
pub fn class_requirements(
    requirement: &WorkerRequirement,
    professions: &Professions,
) -> Result<ClassTable<u32>, EconomyError> {
    let mut totals = ClassTable::splat(0u32);
    for (id, need) in requirement {
        let prof = professions
            .get(id)
            .ok_or_else(|| EconomyError::UnknownProfession(id.clone()))?;
        *totals.get_mut(prof.class()) += need;
    }
    Ok(totals)
}

/// Free workers per social class
pub fn class_availability(professions: &Professions) -> ClassTable<u32> {
    let mut free = ClassTable::splat(0u32);
    for prof in professions.values() {
        *free.get_mut(prof.class()) += prof.free();
    }
    free
}

/// Plan a full assignment of `requirement`.
///
/// The requested professions are served from their own pools first. Any
/// remainder is backfilled from the same class, taking from the profession
/// with the most free workers first.
pub fn plan_assignment(
    requirement: &WorkerRequirement,
    professions: &Professions,
) -> Result<WorkerRequirement, EconomyError> {
    let required = class_requirements(requirement, professions)?;
    let available = class_availability(professions);
    for class in SocialClass::all() {
        if required.get(class) > available.get(class) {
            return Err(EconomyError::InsufficientWorkers {
                class,
                required: *required.get(class),
                available: *available.get(class),
            });
        }
    }

    let mut free: BTreeMap<&ProfessionId, u32> =
        professions.iter().map(|(id, p)| (id, p.free())).collect();
    let mut plan = WorkerRequirement::new();
    let mut remainder = ClassTable::splat(0u32);

    for (id, need) in requirement {
        let Some(slot) = free.get_mut(id) else {
            continue;
        };
        let take = (*need).min(*slot);
        *slot -= take;
        if take > 0 {
            *plan.entry(id.clone()).or_insert(0) += take;
        }
        if let Some(prof) = professions.get(id) {
            *remainder.get_mut(prof.class()) += need - take;
        }
    }

    for class in SocialClass::all() {
        let mut left = *remainder.get(class);
        if left == 0 {
            continue;
        }
        let mut donors: Vec<(&ProfessionId, u32)> = free
            .iter()
            .filter(|(id, n)| **n > 0 && professions[**id].class() == class)
            .map(|(id, n)| (*id, *n))
            .collect();
        donors.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        for (id, n) in donors {
            if left == 0 {
                break;
            }
            let take = n.min(left);
            left -= take;
            *plan.entry(id.clone()).or_insert(0) += take;
        }
        if left > 0 {
            // Class availability was checked above
            return Err(EconomyError::InsufficientWorkers {
                class,
                required: *required.get(class),
                available: *available.get(class),
            });
        }
    }

    Ok(plan)
}

/// Scale every profession need by its class ratio, rounding down.
pub fn scale_requirement(
    requirement: &WorkerRequirement,
    ratios: &ClassTable<f64>,
    professions: &Professions,
) -> WorkerRequirement {
    requirement
        .iter()
        .filter_map(|(id, need)| {
            let ratio = professions
                .get(id)
                .map(|p| ratios.get(p.class()).clamp(0.0, 1.0))?;
            let scaled = (*need as f64 * ratio).floor() as u32;
            (scaled > 0).then(|| (id.clone(), scaled))
        })
        .collect()
}

/// `min(1, available / required)` per class; 1 where nothing is required
pub fn allocation_ratios(required: &ClassTable<u32>, available: &ClassTable<u32>) -> ClassTable<f64> {
    let mut ratios = ClassTable::splat(1.0);
    for class in SocialClass::all() {
        let need = *required.get(class);
        if need > 0 {
            *ratios.get_mut(class) = (*available.get(class) as f64 / need as f64).min(1.0);
        }
    }
    ratios
}

pub fn total_workers(requirement: &WorkerRequirement) -> u32 {
    requirement.values().sum()
}
