use std::fmt;
use std::str::FromStr;

use serde::Serialize;

named_enum! {
    pub enum FirmwareBuild {
        Release => "Release",
        Candidate => "Candidate",
    }
}

named_enum! {
    pub enum FirmwareSignature {
        Msft => "Msft",
        Test => "Test",
        Unsigned => "Unsigned",
    }
}

/// ファームウェアのバージョン (major.minor.iteration)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct FirmwareVersion {
    pub major: u32,
    pub minor: u32,
    pub iteration: u32,
}

impl FirmwareVersion {
    pub fn new(major: u32, minor: u32, iteration: u32) -> Self {
        Self {
            major,
            minor,
            iteration,
        }
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.iteration)
    }
}

impl FromStr for FirmwareVersion {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '.');
        let mut next = || parts.next().unwrap_or("").parse::<u32>();
        Ok(Self {
            major: next()?,
            minor: next()?,
            iteration: next()?,
        })
    }
}

/// デバイスの各ファームウェアのバージョン
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HardwareVersion {
    pub rgb: FirmwareVersion,
    pub depth: FirmwareVersion,
    pub audio: FirmwareVersion,
    pub depth_sensor: FirmwareVersion,
    pub firmware_build: FirmwareBuild,
    pub firmware_signature: FirmwareSignature,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_firmware_version_display() {
        assert_eq!(FirmwareVersion::new(1, 6, 110).to_string(), "1.6.110");
    }

    #[test]
    fn test_firmware_version_parse() {
        assert_eq!("1.6.110".parse::<FirmwareVersion>().unwrap(), FirmwareVersion::new(1, 6, 110));
        assert!("1.6".parse::<FirmwareVersion>().is_err());
        assert!("1.6.x".parse::<FirmwareVersion>().is_err());
        assert!("".parse::<FirmwareVersion>().is_err());
    }

    #[test]
    fn test_firmware_enums() {
        assert_eq!("Release".parse::<FirmwareBuild>().unwrap(), FirmwareBuild::Release);
        assert_eq!(FirmwareSignature::Msft.to_string(), "Msft");
    }
}
