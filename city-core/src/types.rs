// Core ID types, enums and numeric aliases for the city economy

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use tsify_next::Tsify;

// ============================================================================
// Type Aliases
// ============================================================================

pub type ResourceId = String;
pub type ProfessionId = String;
pub type BuildingTypeId = String;
pub type ServiceId = String;
pub type DemandId = String;
pub type Quantity = f64;
pub type Price = f64;
/// Simulated milliseconds
pub type Millis = f64;

/// Resource amounts keyed by resource id. Ordered so iteration is deterministic.
pub type ResourceBundle = BTreeMap<ResourceId, Quantity>;

/// Worker counts keyed by profession.
pub type WorkerRequirement = BTreeMap<ProfessionId, u32>;

// ============================================================================
// IDs - Slotmap keys with u64 conversion for the WASM boundary
// ============================================================================

new_key_type! {
    pub struct BuildingId;
}

/// Trait for converting SlotMap keys to u64 for the WASM boundary
pub trait KeyToU64 {
    fn to_u64(self) -> u64;
}

impl KeyToU64 for BuildingId {
    fn to_u64(self) -> u64 {
        self.0.as_ffi()
    }
}

pub fn building_id_from_u64(raw: u64) -> BuildingId {
    BuildingId::from(slotmap::KeyData::from_ffi(raw))
}

/// Serializes a `BuildingId` as its u64 ffi value so JS sees a plain number.
pub mod building_id_ffi {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{BuildingId, KeyToU64, building_id_from_u64};

    pub fn serialize<S>(value: &BuildingId, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(value.to_u64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BuildingId, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(building_id_from_u64)
    }
}

// ============================================================================
// Resource Tiers
// ============================================================================

/// Resource rarity class. Sizes default storage caps.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Tsify,
)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub enum Tier {
    Raw = 1,
    Processed = 2,
    Advanced = 3,
    EndProduct = 4,
}

impl Tier {
    pub fn from_level(level: u8) -> Option<Tier> {
        match level {
            1 => Some(Tier::Raw),
            2 => Some(Tier::Processed),
            3 => Some(Tier::Advanced),
            4 => Some(Tier::EndProduct),
            _ => None,
        }
    }

    pub fn level(self) -> u8 {
        self as u8
    }

    pub fn all() -> impl Iterator<Item = Tier> {
        [Tier::Raw, Tier::Processed, Tier::Advanced, Tier::EndProduct].into_iter()
    }
}

// ============================================================================
// Social Classes
// ============================================================================

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Tsify,
)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "lowercase")]
pub enum SocialClass {
    Lower,
    Middle,
    Upper,
}

impl SocialClass {
    pub fn all() -> impl Iterator<Item = SocialClass> {
        [SocialClass::Lower, SocialClass::Middle, SocialClass::Upper].into_iter()
    }

    /// Class one step down, `None` for the lowest class
    pub fn below(self) -> Option<SocialClass> {
        match self {
            SocialClass::Lower => None,
            SocialClass::Middle => Some(SocialClass::Lower),
            SocialClass::Upper => Some(SocialClass::Middle),
        }
    }

    /// Class one step up, `None` for the highest class
    pub fn above(self) -> Option<SocialClass> {
        match self {
            SocialClass::Lower => Some(SocialClass::Middle),
            SocialClass::Middle => Some(SocialClass::Upper),
            SocialClass::Upper => None,
        }
    }
}

/// One value per social class
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassTable<T> {
    pub lower: T,
    pub middle: T,
    pub upper: T,
}

impl<T> ClassTable<T> {
    pub fn new(lower: T, middle: T, upper: T) -> Self {
        Self {
            lower,
            middle,
            upper,
        }
    }

    pub fn get(&self, class: SocialClass) -> &T {
        match class {
            SocialClass::Lower => &self.lower,
            SocialClass::Middle => &self.middle,
            SocialClass::Upper => &self.upper,
        }
    }

    pub fn get_mut(&mut self, class: SocialClass) -> &mut T {
        match class {
            SocialClass::Lower => &mut self.lower,
            SocialClass::Middle => &mut self.middle,
            SocialClass::Upper => &mut self.upper,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (SocialClass, &T)> {
        SocialClass::all().map(move |class| (class, self.get(class)))
    }
}

impl<T: Copy> ClassTable<T> {
    pub fn splat(value: T) -> Self {
        Self::new(value, value, value)
    }
}

// ============================================================================
// Building Priority
// ============================================================================

/// Labor allocation priority. Ordered so that sorting ascending puts `High` first.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Serialize,
    Deserialize,
    Tsify,
)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn all() -> impl Iterator<Item = Priority> {
        [Priority::High, Priority::Medium, Priority::Low].into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_levels() {
        for tier in Tier::all() {
            assert_eq!(Tier::from_level(tier.level()), Some(tier));
        }
        assert_eq!(Tier::from_level(0), None);
        assert_eq!(Tier::from_level(5), None);
    }

    #[test]
    fn test_class_ladder() {
        assert_eq!(SocialClass::Lower.below(), None);
        assert_eq!(SocialClass::Upper.above(), None);
        assert_eq!(SocialClass::Middle.above(), Some(SocialClass::Upper));
        assert_eq!(SocialClass::Middle.below(), Some(SocialClass::Lower));
    }

    #[test]
    fn test_class_table_access() {
        let mut table = ClassTable::new(1, 2, 3);
        *table.get_mut(SocialClass::Middle) += 10;
        assert_eq!(*table.get(SocialClass::Middle), 12);
        let collected: Vec<_> = table.iter().map(|(_, v)| *v).collect();
        assert_eq!(collected, vec![1, 12, 3]);
    }

    #[test]
    fn test_priority_sorts_high_first() {
        let mut priorities = vec![Priority::Low, Priority::High, Priority::Medium];
        priorities.sort();
        assert_eq!(priorities, vec![Priority::High, Priority::Medium, Priority::Low]);
    }

    #[test]
    fn test_building_id_ffi_roundtrip() {
        let mut map: slotmap::SlotMap<BuildingId, ()> = slotmap::SlotMap::with_key();
        let id = map.insert(());
        assert_eq!(building_id_from_u64(id.to_u64()), id);
    }
}
