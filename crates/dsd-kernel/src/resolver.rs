//! [`ProfileResolver`] – vehicle identity to behavior profile.
//!
//! The resolver owns a read-only lookup table built once at start-up and
//! passed in explicitly. Lookup is an exact match on the two-part
//! [`VehicleId`]; anything else resolves to the default profile. Resolution
//! never fails.

use std::collections::HashMap;

use dsd_types::{DsdError, VehicleId};
use tracing::debug;

use crate::catalog;
use crate::profile::BehaviorProfile;

/// Maps vehicles to their [`BehaviorProfile`].
///
/// # Example
///
/// ```
/// use dsd_kernel::resolver::ProfileResolver;
/// use dsd_types::VehicleId;
///
/// let resolver = ProfileResolver::builtin();
/// let profile = resolver.resolve(&VehicleId::new("RSC", "Class66Pack02"));
/// assert_eq!(profile.name(), "class_66_ap");
///
/// let unknown = resolver.resolve(&VehicleId::new("Nobody", "Nothing"));
/// assert_eq!(unknown.name(), "generic");
/// ```
#[derive(Debug, Clone)]
pub struct ProfileResolver {
    table: HashMap<VehicleId, BehaviorProfile>,
    default: BehaviorProfile,
}

impl ProfileResolver {
    /// Build a resolver from an explicit table and fallback profile.
    pub fn new(table: HashMap<VehicleId, BehaviorProfile>, default: BehaviorProfile) -> Self {
        Self { table, default }
    }

    /// The built-in vehicle table with `generic` as the fallback.
    pub fn builtin() -> Self {
        let profiles = catalog::builtin_profiles();
        let by_name = |name: &str| profiles.iter().find(|p| p.name() == name).cloned();

        let table = catalog::builtin_vehicles()
            .into_iter()
            .filter_map(|(vehicle, name)| by_name(name).map(|p| (vehicle, p)))
            .collect();
        let default = by_name(catalog::DEFAULT_PROFILE)
            .unwrap_or_else(|| BehaviorProfile::new(catalog::DEFAULT_PROFILE));
        Self::new(table, default)
    }

    /// Layer `vehicle → profile name` overrides on top of the current table.
    ///
    /// # Errors
    ///
    /// Returns [`DsdError::Config`] when an override names a profile that is
    /// not in the built-in catalog.
    pub fn with_overrides<I, S>(mut self, overrides: I) -> Result<Self, DsdError>
    where
        I: IntoIterator<Item = (VehicleId, S)>,
        S: AsRef<str>,
    {
        for (vehicle, name) in overrides {
            let name = name.as_ref();
            let profile = catalog::profile(name).ok_or_else(|| {
                DsdError::Config(format!("vehicle {vehicle}: unknown profile '{name}'"))
            })?;
            debug!(vehicle = %vehicle, profile = name, "profile override");
            self.table.insert(vehicle, profile);
        }
        Ok(self)
    }

    /// The profile for `vehicle`, or the default profile when the vehicle is
    /// not in the table.
    pub fn resolve(&self, vehicle: &VehicleId) -> BehaviorProfile {
        match self.table.get(vehicle) {
            Some(profile) => profile.clone(),
            None => {
                debug!(vehicle = %vehicle, "no explicit profile; using default");
                self.default.clone()
            }
        }
    }

    pub fn default_profile(&self) -> &BehaviorProfile {
        &self.default
    }

    /// Number of explicitly mapped vehicles.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Default for ProfileResolver {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_entry_wins() {
        let resolver = ProfileResolver::builtin();
        let p = resolver.resolve(&VehicleId::new("JustTrains", "Voyager"));
        assert_eq!(p.name(), "class_220_221");
        assert_eq!(p.stop_channel(), "EmergencyStop");
    }

    #[test]
    fn unknown_vehicle_gets_default_important_set() {
        let resolver = ProfileResolver::builtin();
        let p = resolver.resolve(&VehicleId::new("DTG", "Class 55"));
        assert_eq!(
            p.important_channels(),
            resolver.default_profile().important_channels()
        );
        assert_eq!(p.name(), "generic");
    }

    #[test]
    fn lookup_is_exact_on_both_parts() {
        let resolver = ProfileResolver::builtin();
        assert_eq!(resolver.resolve(&VehicleId::new("RSC", "geml")).name(), "generic");
        assert_eq!(resolver.resolve(&VehicleId::new("DTG", "GEML")).name(), "generic");
        assert_eq!(resolver.resolve(&VehicleId::new("RSC", "GEML")).name(), "class_360");
    }

    #[test]
    fn injected_table_is_used() {
        let mut table = HashMap::new();
        table.insert(
            VehicleId::new("DTG", "Class 55"),
            BehaviorProfile::new("deltic").with_important(["Horn"]),
        );
        let resolver = ProfileResolver::new(table, BehaviorProfile::new("fallback"));
        assert_eq!(resolver.len(), 1);
        assert_eq!(resolver.resolve(&VehicleId::new("DTG", "Class 55")).name(), "deltic");
        assert_eq!(resolver.resolve(&VehicleId::new("DTG", "Other")).name(), "fallback");
    }

    #[test]
    fn overrides_replace_and_extend_the_table() {
        let resolver = ProfileResolver::builtin()
            .with_overrides([
                (VehicleId::new("RSC", "GEML"), "generic"),
                (VehicleId::new("DTG", "Class 55"), "class_40"),
            ])
            .unwrap();
        assert_eq!(resolver.resolve(&VehicleId::new("RSC", "GEML")).name(), "generic");
        assert_eq!(resolver.resolve(&VehicleId::new("DTG", "Class 55")).name(), "class_40");
    }

    #[test]
    fn override_with_unknown_profile_is_rejected() {
        let result = ProfileResolver::builtin()
            .with_overrides([(VehicleId::new("RSC", "GEML"), "class_999")]);
        assert!(matches!(result, Err(DsdError::Config(_))));
    }
}
