//! BIP32 派生路径
//!
//! 路径形如 `m/44'/60'/0'/0/0`：根标记为 `m` 或 `M`，根之后至少一段，
//! 以 `'`（或 `h`/`H`）结尾的段为强化派生

use std::{fmt, str::FromStr};

use crate::error::{EngineError, Result};

/// 强化派生偏移量
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// 以太坊默认路径
pub const DEFAULT_ETH_PATH: &str = "m/44'/60'/0'/0/0";

/// 路径中的一段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathSegment {
    pub index: u32,
    pub hardened: bool,
}

impl PathSegment {
    /// 传给 BIP32 的子索引（强化段加偏移量）
    pub fn child_index(&self) -> u32 {
        if self.hardened {
            self.index | HARDENED_OFFSET
        } else {
            self.index
        }
    }
}

/// 已校验的派生路径
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationPath {
    segments: Vec<PathSegment>,
}

impl DerivationPath {
    /// 解析并校验路径
    pub fn parse(path: &str) -> Result<Self> {
        let path = path.trim();
        let mut parts = path.split('/');

        match parts.next() {
            Some("m") | Some("M") => {}
            _ => {
                return Err(EngineError::InvalidPath(format!(
                    "path must start with 'm' or 'M': {}",
                    path
                )))
            }
        }

        let segments = parts
            .map(|part| Self::parse_segment(path, part))
            .collect::<Result<Vec<_>>>()?;

        if segments.is_empty() {
            return Err(EngineError::InvalidPath(format!(
                "path must contain at least one segment after the root: {}",
                path
            )));
        }

        Ok(Self { segments })
    }

    fn parse_segment(path: &str, part: &str) -> Result<PathSegment> {
        let (digits, hardened) = match part
            .strip_suffix('\'')
            .or_else(|| part.strip_suffix('h'))
            .or_else(|| part.strip_suffix('H'))
        {
            Some(d) => (d, true),
            None => (part, false),
        };

        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(EngineError::InvalidPath(format!(
                "invalid segment '{}' in {}",
                part, path
            )));
        }

        let index: u32 = digits.parse().map_err(|_| {
            EngineError::InvalidPath(format!("segment '{}' out of range in {}", part, path))
        })?;

        if index >= HARDENED_OFFSET {
            return Err(EngineError::InvalidPath(format!(
                "segment '{}' exceeds 2^31 - 1 in {}",
                part, path
            )));
        }

        Ok(PathSegment { index, hardened })
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }
}

impl FromStr for DerivationPath {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for segment in &self.segments {
            if segment.hardened {
                write!(f, "/{}'", segment.index)?;
            } else {
                write!(f, "/{}", segment.index)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_standard_path() {
        let path = DerivationPath::parse("m/44'/60'/0'/0/0").unwrap();
        let segments = path.segments();
        assert_eq!(segments.len(), 5);
        assert_eq!(segments[0].child_index(), 44 | HARDENED_OFFSET);
        assert_eq!(segments[1].child_index(), 60 | HARDENED_OFFSET);
        assert!(!segments[3].hardened);
        assert_eq!(path.to_string(), "m/44'/60'/0'/0/0");
    }

    #[test]
    fn test_uppercase_root_and_h_suffix() {
        let path = DerivationPath::parse("M/44h/60H/0'").unwrap();
        assert!(path.segments().iter().all(|s| s.hardened));
    }

    #[test]
    fn test_invalid_paths() {
        for bad in [
            "",
            "m",
            "m/",
            "44'/60'/0'/0/0",
            "x/44'/60'",
            "m/44'/abc",
            "m/2147483648",
            "m//0",
        ] {
            let err = DerivationPath::parse(bad).unwrap_err();
            assert!(
                matches!(err, EngineError::InvalidPath(_)),
                "expected InvalidPath for {:?}",
                bad
            );
        }
    }
}
