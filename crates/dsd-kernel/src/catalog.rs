//! Built-in vehicle profiles and the default vehicle table.
//!
//! Profile names are stable identifiers used in configuration overrides
//! (`"RSC.Class66Pack02" = "class_66_ap"`).

use std::time::Duration;

use dsd_types::{VehicleId, channels};

use crate::profile::BehaviorProfile;

/// Name of the fallback profile.
pub const DEFAULT_PROFILE: &str = "generic";

const ISOLATION_SETTLE: Duration = Duration::from_secs(2);

fn generic() -> BehaviorProfile {
    BehaviorProfile::new(DEFAULT_PROFILE).with_important([
        "AWSReset",
        "Bell",
        "Horn",
        "Regulator",
        channels::REVERSER,
        "TrainBrakeControl",
    ])
}

fn class_37_whl_south() -> BehaviorProfile {
    BehaviorProfile::new("class_37_whl_south").with_important([
        "AWSReset",
        "Horn",
        channels::REVERSER,
        "VirtualBrake",
        "VirtualThrottle",
    ])
}

fn class_40() -> BehaviorProfile {
    BehaviorProfile::new("class_40")
        .with_important(["AWSReset", channels::REVERSER, "VirtualBrake", "VirtualThrottle"])
        .with_isolation("DeadmanEnabled", 0.0, ISOLATION_SETTLE)
}

fn class_43_47() -> BehaviorProfile {
    BehaviorProfile::new("class_43_47").with_important([
        "AWSReset",
        "Horn",
        "Regulator",
        channels::REVERSER,
        "TrainBrakeControl",
    ])
}

fn class_66_ap() -> BehaviorProfile {
    BehaviorProfile::new("class_66_ap")
        .with_important([
            "AWSReset",
            "Horn",
            "Regulator",
            channels::REVERSER,
            "TrainBrakeControl",
        ])
        .with_isolation("DSDIsolation", 1.0, ISOLATION_SETTLE)
}

fn class_90() -> BehaviorProfile {
    BehaviorProfile::new("class_90")
        .with_important([
            "AWSReset",
            "Bell",
            "DRA",
            channels::REVERSER,
            "SpeedSet",
            "VirtualBrake",
            "VirtualThrottle",
        ])
        .with_isolation("DSDEnabled", 0.0, ISOLATION_SETTLE)
}

fn class_142_ap() -> BehaviorProfile {
    BehaviorProfile::new("class_142_ap").with_important([
        "AWSReset",
        channels::REVERSER,
        "VirtualBrake",
        "VirtualThrottle",
    ])
}

fn class_220_221() -> BehaviorProfile {
    BehaviorProfile::new("class_220_221")
        .with_important(["AWSReset", "Bell", "CombinedController", channels::REVERSER])
        .with_stop_channel(channels::EMERGENCY_STOP)
        .with_isolation("SafetyIsolation", 1.0, Duration::ZERO)
}

fn class_325() -> BehaviorProfile {
    BehaviorProfile::new("class_325")
        .with_important([
            "AWSReset",
            "Horn",
            channels::REVERSER,
            channels::THROTTLE_AND_BRAKE,
        ])
        .with_isolation("DSDIsolate", 1.0, Duration::ZERO)
}

fn class_360() -> BehaviorProfile {
    BehaviorProfile::new("class_360")
        .with_important([
            "AWSReset",
            "DRAButton",
            "Horn",
            channels::REVERSER,
            channels::THROTTLE_AND_BRAKE,
        ])
        .with_drift(channels::THROTTLE_AND_BRAKE)
}

fn class_377() -> BehaviorProfile {
    BehaviorProfile::new("class_377")
        .with_important([
            "AWSReset",
            "Bell",
            "DRAButton",
            "Horn",
            channels::REVERSER,
            channels::THROTTLE_AND_BRAKE,
        ])
        .with_isolation("VigilEnable", 0.0, Duration::ZERO)
}

fn class_378() -> BehaviorProfile {
    BehaviorProfile::new("class_378")
        .with_important([
            "AWSReset",
            "Bell",
            "DRA",
            "Horn",
            channels::REVERSER,
            channels::THROTTLE_AND_BRAKE,
        ])
        .with_isolation("DSD", 0.0, Duration::ZERO)
}

fn class_395() -> BehaviorProfile {
    BehaviorProfile::new("class_395")
        .with_important([
            "AWSReset",
            "DRAButton",
            "Horn",
            channels::REVERSER,
            channels::THROTTLE_AND_BRAKE,
        ])
        .with_drift(channels::THROTTLE_AND_BRAKE)
}

fn class_455_8() -> BehaviorProfile {
    BehaviorProfile::new("class_455_8")
        .with_important([
            "AWSReset",
            "Bell",
            "DRAButton",
            "Horn",
            "VirtualBrake",
            "VirtualThrottle",
        ])
        .with_isolation("DSD", 0.0, Duration::ZERO)
}

fn class_465() -> BehaviorProfile {
    BehaviorProfile::new("class_465")
        .with_important([
            "AWSReset",
            "Bell",
            "DRAButton",
            "Horn",
            channels::REVERSER,
            channels::THROTTLE_AND_BRAKE,
        ])
        .with_isolation("VigilEnable", 0.0, Duration::ZERO)
}

/// Vehicles that need no extra attentiveness channels (steam era and
/// similar): only the reverser and the pedal matter.
fn none() -> BehaviorProfile {
    BehaviorProfile::new("none")
}

/// Every built-in profile.
pub fn builtin_profiles() -> Vec<BehaviorProfile> {
    vec![
        generic(),
        class_37_whl_south(),
        class_40(),
        class_43_47(),
        class_66_ap(),
        class_90(),
        class_142_ap(),
        class_220_221(),
        class_325(),
        class_360(),
        class_377(),
        class_378(),
        class_395(),
        class_455_8(),
        class_465(),
        none(),
    ]
}

/// Look up a built-in profile by name.
pub fn profile(name: &str) -> Option<BehaviorProfile> {
    builtin_profiles().into_iter().find(|p| p.name() == name)
}

/// The built-in `vendor.name → profile` assignments.
pub fn builtin_vehicles() -> Vec<(VehicleId, &'static str)> {
    [
        ("AP_Waggonz", "Class90Pack", "class_90"),
        ("AP_Waggonz", "Class90Pack01", "class_90"),
        ("AP_Waggonz", "Class90Pack02", "class_90"),
        ("DTG", "Class378Pack01", "class_378"),
        ("JustTrains", "NL", "class_43_47"),
        ("JustTrains", "Voyager", "class_220_221"),
        ("Kuju", "RailSimulator", "none"),
        ("RSC", "BrightonMainLine", "generic"),
        ("RSC", "Class47Pack01", "class_43_47"),
        ("RSC", "Class66Pack02", "class_66_ap"),
        ("RSC", "Class70Pack01", "generic"),
        ("RSC", "Class465Pack01", "class_465"),
        ("RSC", "ECMLS", "generic"),
        ("RSC", "GEML", "class_360"),
        ("RSC", "KentHighSpeed", "class_395"),
        ("Thomson", "Class455Pack01", "generic"),
    ]
    .into_iter()
    .map(|(vendor, name, profile)| (VehicleId::new(vendor, name), profile))
    .collect()
}
