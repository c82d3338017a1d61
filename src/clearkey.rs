use std::{fmt, str::FromStr};

use base64::{Engine, prelude::BASE64_STANDARD_NO_PAD};
use thiserror::Error;

/// Clear-key KIDs and content keys are both 128-bit
const KEY_LEN: usize = 16;

#[derive(Error, Debug, PartialEq)]
pub enum KeyError {
    #[error("license `{0}` is missing the `keyId:key` separator")]
    MissingSeparator(String),
    #[error("{part} is not valid hex: {source}")]
    InvalidHex {
        part: &'static str,
        #[source]
        source: hex::FromHexError,
    },
    #[error("{part} must be 16 bytes, got {len}")]
    InvalidLength { part: &'static str, len: usize },
}

/// A decoded `keyId:key` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseKeyPair {
    pub key_id: [u8; KEY_LEN],
    pub key: [u8; KEY_LEN],
}

impl LicenseKeyPair {
    /// Renders the pair as a clear-key JSON Web Key Set
    ///
    /// Both values are standard base64 without `=` padding, whose alphabet
    /// needs no JSON escaping.
    #[must_use]
    pub fn to_license_json(&self) -> String {
        let k = BASE64_STANDARD_NO_PAD.encode(self.key);
        let kid = BASE64_STANDARD_NO_PAD.encode(self.key_id);
        format!(r#"{{"keys":[{{"kty":"oct","k":"{k}","kid":"{kid}"}}],"type":"temporary"}}"#)
    }
}

impl FromStr for LicenseKeyPair {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key_id, key) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| KeyError::MissingSeparator(s.to_string()))?;

        Ok(Self {
            key_id: decode_part("key id", key_id)?,
            key: decode_part("key", key)?,
        })
    }
}

impl fmt::Display for LicenseKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", hex::encode(self.key_id), hex::encode(self.key))
    }
}

fn decode_part(part: &'static str, value: &str) -> Result<[u8; KEY_LEN], KeyError> {
    let bytes = hex::decode(value).map_err(|source| KeyError::InvalidHex { part, source })?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| KeyError::InvalidLength { part, len })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    const PAIR: &str = "2c045f5adb26d391cc41cd01f00416fa:fc146771a9b096fc4cb57ffe769861be";

    fn encode_keys(hex_pair: &str) -> Result<String, KeyError> {
        Ok(hex_pair.parse::<LicenseKeyPair>()?.to_license_json())
    }

    #[test]
    fn encodes_jwk_set() {
        let json = encode_keys(PAIR).unwrap();
        assert_eq!(
            json,
            r#"{"keys":[{"kty":"oct","k":"/BRncamwlvxMtX/+dphhvg","kid":"LARfWtsm05HMQc0B8AQW+g"}],"type":"temporary"}"#
        );
    }

    #[test]
    fn round_trips_back_to_hex() {
        let json: Value = serde_json::from_str(&encode_keys(PAIR).unwrap()).unwrap();
        assert_eq!(json["type"], "temporary");
        let jwk = &json["keys"][0];
        assert_eq!(jwk["kty"], "oct");
        let kid = jwk["kid"].as_str().unwrap();
        let k = jwk["k"].as_str().unwrap();

        assert!(!kid.contains('=') && !k.contains('='));
        let kid = hex::encode(BASE64_STANDARD_NO_PAD.decode(kid).unwrap());
        let k = hex::encode(BASE64_STANDARD_NO_PAD.decode(k).unwrap());
        assert_eq!(format!("{kid}:{k}"), PAIR);
        assert_eq!(PAIR.parse::<LicenseKeyPair>().unwrap().to_string(), PAIR);
    }

    #[test]
    fn rejects_missing_separator() {
        assert!(matches!(
            encode_keys("2c045f5adb26d391cc41cd01f00416fa"),
            Err(KeyError::MissingSeparator(_))
        ));
    }

    #[test]
    fn rejects_bad_hex() {
        assert!(matches!(
            encode_keys("2c045f5adb26d391cc41cd01f00416f:fc146771a9b096fc4cb57ffe769861be"),
            Err(KeyError::InvalidHex { part: "key id", .. })
        ));
        assert!(matches!(
            encode_keys("2c045f5adb26d391cc41cd01f00416fa:zz146771a9b096fc4cb57ffe769861be"),
            Err(KeyError::InvalidHex { part: "key", .. })
        ));
    }

    #[test]
    fn rejects_short_keys() {
        assert_eq!(
            encode_keys("00:ff"),
            Err(KeyError::InvalidLength {
                part: "key id",
                len: 1
            })
        );
    }
}
