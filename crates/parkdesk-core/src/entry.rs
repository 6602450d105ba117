//! Vehicle entry validation

use parkdesk_api::{VehicleEntryInput, VehicleType};

use crate::{CoreError, CoreResult, EntryFee, PricingCatalog};

pub const PHONE_DIGITS: usize = 10;

/// Operator input for a new entry, before normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRequest {
    pub phone: String,
    pub plate: String,
    pub vehicle_type: VehicleType,
}

impl EntryRequest {
    pub fn new(phone: impl Into<String>, plate: impl Into<String>, vehicle_type: VehicleType) -> Self {
        Self {
            phone: phone.into(),
            plate: plate.into(),
            vehicle_type,
        }
    }

    /// Normalize and check the request locally. Nothing is sent when this fails.
    pub fn validate(&self, catalog: &PricingCatalog) -> CoreResult<(VehicleEntryInput, EntryFee)> {
        let driver_phone = normalize_phone(&self.phone);
        if driver_phone.len() != PHONE_DIGITS {
            return Err(CoreError::InvalidPhone(self.phone.clone()));
        }

        let vehicle_number = normalize_plate(&self.plate);
        if vehicle_number.is_empty() {
            return Err(CoreError::MissingPlate);
        }

        let fee = catalog.entry_fee(&self.vehicle_type)?;

        Ok((
            VehicleEntryInput {
                driver_phone,
                vehicle_number,
                vehicle_type: self.vehicle_type.clone(),
            },
            fee,
        ))
    }
}

/// Keep only the digits of a phone number
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Trimmed, uppercase plate
pub fn normalize_plate(raw: &str) -> String {
    raw.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use rust_decimal::Decimal;

    fn catalog() -> PricingCatalog {
        PricingCatalog::from_rules(standard_rules()).unwrap()
    }

    #[test]
    fn valid_entry_is_normalized() {
        let request = EntryRequest::new("98765 43210", " kl01ab1234 ", VehicleType::Car);
        let (input, fee) = request.validate(&catalog()).unwrap();

        assert_eq!(input.driver_phone, "9876543210");
        assert_eq!(input.vehicle_number, "KL01AB1234");
        assert_eq!(input.vehicle_type, VehicleType::Car);
        assert_eq!(fee.base_fee, Decimal::from(50));
        assert_eq!(fee.base_hours, 2);
    }

    #[test]
    fn phone_must_have_ten_digits() {
        for phone in ["", "98765", "98765432101", "phone"] {
            let request = EntryRequest::new(phone, "KL01", VehicleType::Car);
            assert!(
                matches!(request.validate(&catalog()), Err(CoreError::InvalidPhone(_))),
                "phone={phone:?}"
            );
        }
    }

    #[test]
    fn plate_is_required() {
        let request = EntryRequest::new("9876543210", "   ", VehicleType::Bike);
        assert!(matches!(
            request.validate(&catalog()),
            Err(CoreError::MissingPlate)
        ));
    }

    #[test]
    fn unpriced_vehicle_type_rejected() {
        let request = EntryRequest::new("9876543210", "KL01", VehicleType::parse("truck"));
        let err = request.validate(&catalog()).unwrap_err();
        assert!(matches!(err, CoreError::RuleNotFound(_)));
        assert!(err.is_local_validation());
    }
}
