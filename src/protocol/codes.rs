use std::fmt;

use serde::{de, Deserialize, Deserializer};
use strum_macros::EnumString;

/// Operating mode of the unit.
///
/// On the wire modes are ASCII digits. The unit reports auto as either `'0'` (48)
/// or `'1'` (49); both decode to [AcMode::Auto], which always encodes as 49.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AcMode {
    Auto,
    Dry,
    Cool,
    Heat,
    Fan,

    /// A code outside the known table, kept as received.
    #[strum(disabled)]
    Unknown(u8),
}

/// Duplicate encoding of auto reported by some units.
pub const MODE_AUTO_ALIAS: u8 = b'0';

impl AcMode {
    pub fn from_code(code: u8) -> Self {
        match code {
            MODE_AUTO_ALIAS | b'1' => Self::Auto,
            b'2' => Self::Dry,
            b'3' => Self::Cool,
            b'4' => Self::Heat,
            b'6' => Self::Fan,
            other => Self::Unknown(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Auto => b'1',
            Self::Dry => b'2',
            Self::Cool => b'3',
            Self::Heat => b'4',
            Self::Fan => b'6',
            Self::Unknown(code) => code,
        }
    }

    /// Dry and fan-only modes ignore the setpoint, so the temperature controls are disabled.
    pub fn has_setpoint(self) -> bool {
        !matches!(self, Self::Dry | Self::Fan)
    }
}

impl fmt::Display for AcMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Dry => f.write_str("dry"),
            Self::Cool => f.write_str("cool"),
            Self::Heat => f.write_str("heat"),
            Self::Fan => f.write_str("fan"),
            Self::Unknown(code) => write!(f, "unknown ({code})"),
        }
    }
}

/// Fan speed of the unit.
///
/// `'A'` (65) is auto, `'3'..='7'` (51-55) are the five manual speeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum FanSpeed {
    #[strum(serialize = "auto")]
    Auto,
    #[strum(serialize = "1")]
    Speed1,
    #[strum(serialize = "2")]
    Speed2,
    #[strum(serialize = "3")]
    Speed3,
    #[strum(serialize = "4")]
    Speed4,
    #[strum(serialize = "5")]
    Speed5,

    #[strum(disabled)]
    Unknown(u8),
}

impl FanSpeed {
    pub fn from_code(code: u8) -> Self {
        match code {
            b'A' => Self::Auto,
            b'3' => Self::Speed1,
            b'4' => Self::Speed2,
            b'5' => Self::Speed3,
            b'6' => Self::Speed4,
            b'7' => Self::Speed5,
            other => Self::Unknown(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Auto => b'A',
            Self::Speed1 => b'3',
            Self::Speed2 => b'4',
            Self::Speed3 => b'5',
            Self::Speed4 => b'6',
            Self::Speed5 => b'7',
            Self::Unknown(code) => code,
        }
    }
}

impl fmt::Display for FanSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Speed1 => f.write_str("1"),
            Self::Speed2 => f.write_str("2"),
            Self::Speed3 => f.write_str("3"),
            Self::Speed4 => f.write_str("4"),
            Self::Speed5 => f.write_str("5"),
            Self::Unknown(code) => write!(f, "unknown ({code})"),
        }
    }
}

/// A mode/fan code as it appears in JSON: either a number or a string.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawCode {
    Number(u8),
    Text(String),
}

/// Deserialize a mode or fan code sent either as a number (`49`), a numeric
/// string (`"49"`) or a single ASCII character (`"A"`).
pub fn deserialize_code<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    match RawCode::deserialize(deserializer)? {
        RawCode::Number(code) => Ok(code),
        RawCode::Text(text) => {
            let text = text.trim();
            if let Ok(code) = text.parse::<u8>() {
                return Ok(code);
            }

            match text.as_bytes() {
                [byte] if byte.is_ascii() => Ok(*byte),
                _ => Err(de::Error::custom(format!("invalid code {text:?}"))),
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_mode_auto_alias_is_normalized() {
        for code in 0..=u8::MAX {
            let expected = if code == MODE_AUTO_ALIAS { b'1' } else { code };
            assert_eq!(AcMode::from_code(code).code(), expected, "code {code}");
        }

        assert_eq!(AcMode::from_code(48), AcMode::Auto);
        assert_eq!(AcMode::from_code(49), AcMode::Auto);
    }

    #[test]
    fn test_mode_setpoint() {
        assert!(AcMode::Auto.has_setpoint());
        assert!(AcMode::Cool.has_setpoint());
        assert!(AcMode::Heat.has_setpoint());
        assert!(AcMode::Unknown(0x99).has_setpoint());
        assert!(!AcMode::Dry.has_setpoint());
        assert!(!AcMode::Fan.has_setpoint());
    }

    #[test]
    fn test_fan_codes() {
        for code in 0..=u8::MAX {
            assert_eq!(FanSpeed::from_code(code).code(), code);
        }

        assert_eq!(FanSpeed::from_code(65), FanSpeed::Auto);
        assert_eq!(FanSpeed::from_code(55), FanSpeed::Speed5);
        assert_eq!(FanSpeed::from_code(1), FanSpeed::Unknown(1));
    }

    #[test]
    fn test_names() {
        assert_eq!(AcMode::from_str("COOL").unwrap(), AcMode::Cool);
        assert_eq!(FanSpeed::from_str("3").unwrap(), FanSpeed::Speed3);
        assert_eq!(FanSpeed::from_str("Auto").unwrap(), FanSpeed::Auto);
        assert!(AcMode::from_str("turbo").is_err());

        assert_eq!(AcMode::Unknown(7).to_string(), "unknown (7)");
    }

    #[test]
    fn test_deserialize_code() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(deserialize_with = "deserialize_code")]
            code: u8,
        }

        let parse = |json: &str| serde_json::from_str::<Holder>(json).map(|h| h.code);

        assert_eq!(parse(r#"{"code": 48}"#).unwrap(), 48);
        assert_eq!(parse(r#"{"code": "49"}"#).unwrap(), 49);
        assert_eq!(parse(r#"{"code": "A"}"#).unwrap(), b'A');
        assert_eq!(parse(r#"{"code": "1"}"#).unwrap(), 1);
        assert!(parse(r#"{"code": 300}"#).is_err());
        assert!(parse(r#"{"code": "auto"}"#).is_err());
        assert!(parse(r#"{"code": true}"#).is_err());
    }
}
