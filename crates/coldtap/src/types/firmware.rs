use derive_more::Display;

/// Build flavour of the card firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum FirmwareType {
    /// Development build, suffix `d SDK`
    #[display("d SDK")]
    Sdk,
    /// Production build, suffix `r`
    #[display("r")]
    Release,
    /// Anything else
    #[display("special")]
    Special,
}

impl FirmwareType {
    fn from_suffix(suffix: &str) -> Self {
        match suffix {
            "d SDK" => Self::Sdk,
            "r" => Self::Release,
            _ => Self::Special,
        }
    }
}

/// Firmware version as reported by the card, e.g. `4.12r`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display("{major}.{minor}{kind}")]
pub struct FirmwareVersion {
    /// Major version
    pub major: u32,
    /// Minor version
    pub minor: u32,
    /// Hotfix number, zero when absent
    pub hotfix: u32,
    /// Build flavour
    pub kind: FirmwareType,
}

impl FirmwareVersion {
    /// First version with multiple wallet slots
    pub const MULTIWALLET_AVAILABLE: Self = Self::new(4, 0);

    /// First version reporting whether the passcode is still the default one
    pub const PASSCODE_STATUS_AVAILABLE: Self = Self::new(4, 1);

    /// Release version `major.minor`
    pub const fn new(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor,
            hotfix: 0,
            kind: FirmwareType::Release,
        }
    }

    /// Parse the firmware string read from the card.
    ///
    /// Never fails: unparsable numbers read as zero and unknown suffixes as
    /// [`FirmwareType::Special`].
    pub fn parse(raw: &str) -> Self {
        let cleaned = raw.replace('\0', "");
        let split = cleaned
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(cleaned.len());
        let (numbers, suffix) = cleaned.split_at(split);

        let mut parts = numbers
            .split('.')
            .map(|part| part.parse::<u32>().unwrap_or_default());

        Self {
            major: parts.next().unwrap_or_default(),
            minor: parts.next().unwrap_or_default(),
            hotfix: parts.next().unwrap_or_default(),
            kind: FirmwareType::from_suffix(suffix.trim()),
        }
    }

    /// Numeric part only, ignoring the build flavour
    pub const fn triple(&self) -> (u32, u32, u32) {
        (self.major, self.minor, self.hotfix)
    }

    /// Whether this version is `min` or newer. The build flavour is ignored.
    pub fn is_at_least(&self, min: Self) -> bool {
        self.triple() >= min.triple()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let version = FirmwareVersion::parse("1.28d SDK\0");
        assert_eq!(version.triple(), (1, 28, 0));
        assert_eq!(version.kind, FirmwareType::Sdk);
        assert_eq!(version.to_string(), "1.28d SDK");

        let version = FirmwareVersion::parse("4.52r");
        assert_eq!(version.triple(), (4, 52, 0));
        assert_eq!(version.kind, FirmwareType::Release);

        let version = FirmwareVersion::parse("3.05.1 custom");
        assert_eq!(version.triple(), (3, 5, 1));
        assert_eq!(version.kind, FirmwareType::Special);
    }

    #[test]
    fn test_garbage() {
        let version = FirmwareVersion::parse("");
        assert_eq!(version.triple(), (0, 0, 0));
        assert_eq!(version.kind, FirmwareType::Special);
    }

    #[test]
    fn test_ordering() {
        let old = FirmwareVersion::parse("2.39r");
        let multi = FirmwareVersion::parse("4.11d SDK");

        assert!(!old.is_at_least(FirmwareVersion::MULTIWALLET_AVAILABLE));
        assert!(multi.is_at_least(FirmwareVersion::MULTIWALLET_AVAILABLE));
        assert!(multi.is_at_least(FirmwareVersion::PASSCODE_STATUS_AVAILABLE));
        assert!(!FirmwareVersion::parse("4.0r").is_at_least(FirmwareVersion::PASSCODE_STATUS_AVAILABLE));
        assert!(FirmwareVersion::parse("4.1d SDK").is_at_least(FirmwareVersion::PASSCODE_STATUS_AVAILABLE));
        assert!(FirmwareVersion::parse("4.1.2r").is_at_least(FirmwareVersion::PASSCODE_STATUS_AVAILABLE));
    }
}
