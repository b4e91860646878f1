// Simulation events queued for the presentation layer

use serde::{Deserialize, Serialize};

use crate::production::ProductionState;
use crate::types::{BuildingId, BuildingTypeId, ProfessionId, ResourceBundle, SocialClass};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopulationChangeReason {
    Emigration,
    Immigration,
    ClassDemotion,
    UpwardMobility,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SimEvent {
    BuildingConstructed {
        #[serde(with = "crate::types::building_id_ffi")]
        building: BuildingId,
        building_type: BuildingTypeId,
    },
    BuildingRemoved {
        #[serde(with = "crate::types::building_id_ffi")]
        building: BuildingId,
        building_type: BuildingTypeId,
    },
    BuildingUpgraded {
        #[serde(with = "crate::types::building_id_ffi")]
        building: BuildingId,
        level: u32,
    },
    ProductionCompleted {
        #[serde(with = "crate::types::building_id_ffi")]
        building: BuildingId,
        outputs: ResourceBundle,
    },
    ProductionStateChanged {
        #[serde(with = "crate::types::building_id_ffi")]
        building: BuildingId,
        state: ProductionState,
        active: bool,
    },
    PopulationChanged {
        class: SocialClass,
        delta: i64,
        reason: PopulationChangeReason,
    },
    ProfessionPromoted {
        from: ProfessionId,
        to: ProfessionId,
        count: u32,
    },
    ProfessionDemoted {
        from: ProfessionId,
        to: ProfessionId,
        count: u32,
    },
    TaxCollected {
        tax_amount: f64,
        revenue: f64,
    },
    LocalEventStarted {
        id: String,
    },
    LocalEventExpired {
        id: String,
    },
}

/// FIFO of events produced during ticks and commands
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: Vec<SimEvent>,
}

impl EventQueue {
    pub fn push(&mut self, event: SimEvent) {
        self.events.push(event);
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = SimEvent>) {
        self.events.extend(events);
    }

    pub fn drain(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SimEvent> {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use slotmap::SlotMap;

    use super::*;

    #[test]
    fn test_event_json_uses_type_tag_and_numeric_ids() {
        let mut keys: SlotMap<BuildingId, ()> = SlotMap::with_key();
        let building = keys.insert(());
        let event = SimEvent::BuildingUpgraded { building, level: 2 };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "BuildingUpgraded");
        assert!(json["building"].is_u64());

        let back: SimEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_population_reason_wire_names() {
        let event = SimEvent::PopulationChanged {
            class: SocialClass::Middle,
            delta: -4,
            reason: PopulationChangeReason::ClassDemotion,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "PopulationChanged");
        assert_eq!(json["reason"], "class_demotion");

        let reasons: Vec<PopulationChangeReason> =
            serde_json::from_str(r#"["emigration", "immigration", "upward_mobility"]"#).unwrap();
        assert_eq!(
            reasons,
            vec![
                PopulationChangeReason::Emigration,
                PopulationChangeReason::Immigration,
                PopulationChangeReason::UpwardMobility,
            ]
        );
        assert!(serde_json::from_str::<PopulationChangeReason>(r#""added""#).is_err());
    }

    #[test]
    fn test_drain_empties_queue() {
        let mut queue = EventQueue::default();
        queue.push(SimEvent::LocalEventStarted { id: "festival".into() });
        queue.push(SimEvent::LocalEventExpired { id: "festival".into() });
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.drain().len(), 2);
        assert!(queue.is_empty());
    }
}
