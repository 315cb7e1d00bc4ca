//! Asset types shared by the gateway, the record store and the orchestrators.
//!
//! # Remote asset naming
//!
//! An uploaded asset is addressed by `<namespace>/<name>` and served from a URL whose last
//! two path segments are exactly that pair plus, for images, a format extension:
//!
//! - image: id `book-covers/cover_abc123`, URL `.../book-covers/cover_abc123.jpg`
//! - raw:   id `book-pdfs/novel_xyz789.pdf`, URL `.../book-pdfs/novel_xyz789.pdf`
//!
//! [`RemoteAssetRef::from_url`] inverts that scheme. Gateways must produce URLs that obey it,
//! otherwise teardown addresses the wrong object.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AppError;

/// Resource category of a remote asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetCategory {
    /// Image transcoded/served by format; ids carry no extension
    Image,
    /// Untranscoded binary; ids keep the file extension
    Raw,
}

impl AssetCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetCategory::Image => "image",
            AssetCategory::Raw => "raw",
        }
    }
}

impl Display for AssetCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// The two upload slots of a book
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetSlot {
    CoverImage,
    File,
}

impl AssetSlot {
    /// Multipart field name of the slot
    pub fn field_name(&self) -> &'static str {
        match self {
            AssetSlot::CoverImage => "coverImage",
            AssetSlot::File => "file",
        }
    }

    pub fn category(&self) -> AssetCategory {
        match self {
            AssetSlot::CoverImage => AssetCategory::Image,
            AssetSlot::File => AssetCategory::Raw,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AssetSlot::CoverImage => "cover image",
            AssetSlot::File => "book file",
        }
    }
}

/// A locally staged upload awaiting transfer to remote storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedAsset {
    pub path: PathBuf,
    pub mime_type: String,
    /// Client-supplied filename, kept as the remote target name
    pub original_filename: String,
}

impl StagedAsset {
    pub fn new(
        path: impl Into<PathBuf>,
        mime_type: impl Into<String>,
        original_filename: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            mime_type: mime_type.into(),
            original_filename: original_filename.into(),
        }
    }

    /// Format inferred from the mime subtype (`image/jpeg` -> `jpeg`).
    pub fn format(&self) -> Option<&str> {
        let subtype = self
            .mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .trim();
        if subtype.is_empty() {
            None
        } else {
            Some(subtype)
        }
    }
}

/// Identifier + category pair sufficient to address a stored asset for deletion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteAssetRef {
    pub asset_id: String,
    pub category: AssetCategory,
}

impl RemoteAssetRef {
    pub fn new(asset_id: impl Into<String>, category: AssetCategory) -> Self {
        Self {
            asset_id: asset_id.into(),
            category,
        }
    }

    /// Derive the reference of the asset served at `url`.
    ///
    /// Takes the last two path segments (`<namespace>/<file>`), percent-decoded. Image
    /// references drop the file extension, raw references keep the file name whole.
    pub fn from_url(url: &str, category: AssetCategory) -> Result<Self, AppError> {
        let parsed = Url::parse(url).map_err(|e| {
            AppError::Internal(format!("Stored asset URL is not absolute ({}): {}", e, url))
        })?;

        let segments: Vec<&str> = parsed
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        if segments.len() < 2 {
            return Err(AppError::Internal(format!(
                "Stored asset URL has no namespace segment: {}",
                url
            )));
        }

        let namespace = decode_segment(segments[segments.len() - 2], url)?;
        let file = decode_segment(segments[segments.len() - 1], url)?;

        let name = match category {
            AssetCategory::Image => file
                .rsplit_once('.')
                .map(|(stem, _)| stem)
                .unwrap_or(&file),
            AssetCategory::Raw => &file,
        };

        if name.is_empty() {
            return Err(AppError::Internal(format!(
                "Stored asset URL has an empty file name: {}",
                url
            )));
        }

        Ok(Self {
            asset_id: format!("{}/{}", namespace, name),
            category,
        })
    }
}

/// Asset ids are the decoded public names; URLs carry them percent-encoded.
fn decode_segment(segment: &str, url: &str) -> Result<String, AppError> {
    percent_decode_str(segment)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|e| {
            AppError::Internal(format!(
                "Stored asset URL has a segment that is not UTF-8 ({}): {}",
                e, url
            ))
        })
}

/// True if `value` is an absolute http(s) URL with a host.
pub fn is_remote_url(value: &str) -> bool {
    match Url::parse(value) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}
