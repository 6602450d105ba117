//! Pricing catalog

use parkdesk_api::{PricingRule, VehicleType};
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::{CoreError, CoreResult};

/// What a driver pays at entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryFee {
    pub base_fee: Decimal,
    /// Hours covered by the base fee
    pub base_hours: u32,
}

/// Billing parameters keyed by vehicle class (case-insensitive)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PricingCatalog {
    rules: HashMap<VehicleType, PricingRule>,
}

impl PricingCatalog {
    /// Build a catalog, enforcing one valid rule per vehicle class.
    pub fn from_rules(rules: impl IntoIterator<Item = PricingRule>) -> CoreResult<Self> {
        let mut map = HashMap::new();

        for rule in rules {
            validate_rule(&rule)?;
            let key = rule.vehicle_type.clone();
            if map.insert(key.clone(), rule).is_some() {
                return Err(CoreError::DuplicateRule(key));
            }
        }

        Ok(Self { rules: map })
    }

    /// Rule for a vehicle class. Callers must not substitute a default
    /// when this fails.
    pub fn lookup(&self, vehicle_type: &VehicleType) -> CoreResult<&PricingRule> {
        self.rules
            .get(vehicle_type)
            .ok_or_else(|| CoreError::RuleNotFound(vehicle_type.clone()))
    }

    pub fn get(&self, vehicle_type: &VehicleType) -> Option<&PricingRule> {
        self.rules.get(vehicle_type)
    }

    pub fn entry_fee(&self, vehicle_type: &VehicleType) -> CoreResult<EntryFee> {
        let rule = self.lookup(vehicle_type)?;
        Ok(EntryFee {
            base_fee: rule.base_fee,
            base_hours: rule.base_hours,
        })
    }

    /// Priced vehicle classes, sorted by key
    pub fn vehicle_types(&self) -> Vec<VehicleType> {
        let mut types: Vec<_> = self.rules.keys().cloned().collect();
        types.sort_by(|a, b| a.key().cmp(b.key()));
        types
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn validate_rule(rule: &PricingRule) -> CoreResult<()> {
    let invalid = |message: &str| CoreError::InvalidRule {
        vehicle_type: rule.vehicle_type.clone(),
        message: message.to_string(),
    };

    if rule.base_hours < 1 {
        return Err(invalid("base_hours must be at least 1"));
    }
    if rule.base_fee < Decimal::ZERO {
        return Err(invalid("base_fee cannot be negative"));
    }
    if rule.extra_hour_rate < Decimal::ZERO {
        return Err(invalid("extra_hour_rate cannot be negative"));
    }
    Ok(())
}
