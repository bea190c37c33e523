//! Configuration validation
//!
//! All checks run at startup, before any device connects. A failure here is
//! fatal for the whole process.

use super::{DeviceConfig, DistributionConfig};
use crate::Result;
use std::collections::{BTreeMap, HashSet};

/// Validate the fleet against the loaded distribution configs
pub fn validate_fleet(
    devices: &[DeviceConfig],
    distributions: &BTreeMap<String, DistributionConfig>,
) -> Result<()> {
    if devices.is_empty() {
        anyhow::bail!("Device list is empty, nothing to simulate");
    }

    let mut seen_ids = HashSet::new();
    for device in devices {
        validate_device(device)?;

        if !seen_ids.insert(device.id) {
            anyhow::bail!("Duplicate device id {}", device.id);
        }

        if !distributions.contains_key(&device.distribution) {
            anyhow::bail!(
                "{} references unknown distribution \"{}\"",
                device.full_name(),
                device.distribution
            );
        }
    }

    Ok(())
}

/// Validate a single device record
pub fn validate_device(device: &DeviceConfig) -> Result<()> {
    if device.name.is_empty() {
        anyhow::bail!("Device {} has an empty name", device.id);
    }

    if device.topic.is_empty() {
        anyhow::bail!("{} has an empty telemetry topic", device.full_name());
    }

    if !device.frequency.is_finite() || device.frequency <= 0.0 {
        anyhow::bail!(
            "{} frequency must be a positive number of Hz, got {}",
            device.full_name(),
            device.frequency
        );
    }

    if !(0.0..=1.0).contains(&device.drop_rate) {
        anyhow::bail!(
            "{} drop_rate must be within [0, 1], got {}",
            device.full_name(),
            device.drop_rate
        );
    }

    if device.data_channels == 0 {
        anyhow::bail!("{} must have at least one data channel", device.full_name());
    }

    if device.qos > 2 {
        anyhow::bail!("{} qos must be 0, 1 or 2, got {}", device.full_name(), device.qos);
    }

    if device.range.lo > device.range.hi {
        anyhow::bail!(
            "{} value range is inverted: [{}, {}]",
            device.full_name(),
            device.range.lo,
            device.range.hi
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Range;

    fn device() -> DeviceConfig {
        DeviceConfig {
            id: 1,
            name: "thermo-1".to_string(),
            topic: "plant/thermo-1".to_string(),
            frequency: 2.0,
            drop_rate: 0.1,
            data_channels: 2,
            data_type: "temperature".to_string(),
            data_grade: "celsius".to_string(),
            range: Range::new(15.0, 35.0),
            distribution: "linear".to_string(),
            qos: 0,
        }
    }

    fn distributions() -> BTreeMap<String, DistributionConfig> {
        let mut map = BTreeMap::new();
        map.insert(
            "linear".to_string(),
            DistributionConfig::Continuous {
                range: Range::new(0.0, 1.0),
                inv_cdf: "linear".to_string(),
            },
        );
        map
    }

    #[test]
    fn test_valid_fleet() {
        validate_fleet(&[device()], &distributions()).unwrap();
    }

    #[test]
    fn test_empty_fleet_rejected() {
        assert!(validate_fleet(&[], &distributions()).is_err());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut second = device();
        second.name = "thermo-2".to_string();
        let err = validate_fleet(&[device(), second], &distributions()).unwrap_err();
        assert!(err.to_string().contains("Duplicate device id"));
    }

    #[test]
    fn test_unknown_distribution_rejected() {
        let mut bad = device();
        bad.distribution = "gaussian".to_string();
        let err = validate_fleet(&[bad], &distributions()).unwrap_err();
        assert!(err.to_string().contains("unknown distribution"));
    }

    #[test]
    fn test_zero_frequency_rejected() {
        let mut bad = device();
        bad.frequency = 0.0;
        assert!(validate_device(&bad).is_err());
    }

    #[test]
    fn test_drop_rate_bounds() {
        let mut bad = device();
        bad.drop_rate = 1.5;
        assert!(validate_device(&bad).is_err());
        bad.drop_rate = -0.1;
        assert!(validate_device(&bad).is_err());
        bad.drop_rate = 1.0;
        assert!(validate_device(&bad).is_ok());
    }

    #[test]
    fn test_zero_channels_rejected() {
        let mut bad = device();
        bad.data_channels = 0;
        assert!(validate_device(&bad).is_err());
    }

    #[test]
    fn test_bad_qos_rejected() {
        let mut bad = device();
        bad.qos = 3;
        assert!(validate_device(&bad).is_err());
    }
}
