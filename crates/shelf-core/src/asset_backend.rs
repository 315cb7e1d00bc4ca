use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Remote asset gateway backends.
///
/// Defined in core because configuration selects it before any gateway is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetBackend {
    Cloudinary,
    Local,
}

impl FromStr for AssetBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cloudinary" => Ok(AssetBackend::Cloudinary),
            "local" => Ok(AssetBackend::Local),
            _ => Err(anyhow::anyhow!("Invalid asset backend: {}", s)),
        }
    }
}

impl Display for AssetBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AssetBackend::Cloudinary => write!(f, "cloudinary"),
            AssetBackend::Local => write!(f, "local"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(
            "Cloudinary".parse::<AssetBackend>().unwrap(),
            AssetBackend::Cloudinary
        );
        assert_eq!("LOCAL".parse::<AssetBackend>().unwrap(), AssetBackend::Local);
        assert!("s3".parse::<AssetBackend>().is_err());
    }
}
