// Domain error types
//
// Expected domain conditions (shortfalls, unknown ids) are returned as values.
// Display strings double as the user-facing `message` of structured results.

use crate::types::{Quantity, ResourceBundle, ResourceId, SocialClass};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EconomyError {
    #[error("insufficient resources: missing {}", format_missing(.missing))]
    InsufficientResources {
        missing: ResourceBundle,
    },

    #[error("insufficient {class:?} class workers: need {required}, {available} available")]
    InsufficientWorkers {
        class: SocialClass,
        required: u32,
        available: u32,
    },

    #[error("market only has {available} {resource} for sale, requested {requested}")]
    InsufficientInventory {
        resource: ResourceId,
        requested: Quantity,
        available: Quantity,
    },

    #[error("insufficient funds: cost {cost:.2}, have {available:.2}")]
    InsufficientFunds { cost: f64, available: f64 },

    #[error("not enough storage for {resource}: room for {available}, requested {requested}")]
    InsufficientStorage {
        resource: ResourceId,
        requested: Quantity,
        available: Quantity,
    },

    #[error("unknown resource: {0}")]
    UnknownResource(ResourceId),

    #[error("unknown building")]
    UnknownBuilding,

    #[error("unknown building type: {0}")]
    UnknownBuildingType(String),

    #[error("unknown profession: {0}")]
    UnknownProfession(String),

    #[error("building already at max level {0}")]
    MaxLevelReached(u32),

    #[error("invalid amount: {0}")]
    InvalidAmount(Quantity),
}

fn format_missing(missing: &ResourceBundle) -> String {
    missing
        .iter()
        .map(|(resource, qty)| format!("{qty} {resource}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors raised while parsing or validating an `EconomyConfig`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse economy config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid economy config: {reason}")]
    Invalid { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_resources_message_is_sorted() {
        let err = EconomyError::InsufficientResources {
            missing: [("wood".to_string(), 5.0), ("stone".to_string(), 2.0)].into(),
        };
        assert_eq!(
            err.to_string(),
            "insufficient resources: missing 2 stone, 5 wood"
        );
    }

    #[test]
    fn test_inventory_message() {
        let err = EconomyError::InsufficientInventory {
            resource: "ore".to_string(),
            requested: 100.0,
            available: 50.0,
        };
        assert_eq!(
            err.to_string(),
            "market only has 50 ore for sale, requested 100"
        );
    }
}
