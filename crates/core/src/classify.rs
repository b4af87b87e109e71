//! Content classification for cache-control policy
//!
//! HTML entry points reference hashed asset URLs and must revalidate, images
//! usually carry no content hash, and everything else is assumed hashed.

use serde::{Deserialize, Serialize};

use crate::types::UploadOption;

const IMAGE_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".webp", ".gif", ".bmp", ".tiff", ".ico", ".svg",
];

/// Caching category of a published file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheCategory {
    Html,
    Image,
    Other,
}

impl std::fmt::Display for CacheCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheCategory::Html => write!(f, "html"),
            CacheCategory::Image => write!(f, "image"),
            CacheCategory::Other => write!(f, "other"),
        }
    }
}

/// Classify a file name
pub fn classify(filename: &str) -> CacheCategory {
    if is_html(filename) {
        CacheCategory::Html
    } else if is_image(filename) {
        CacheCategory::Image
    } else {
        CacheCategory::Other
    }
}

/// `.html` suffix, any case
pub fn is_html(filename: &str) -> bool {
    filename.to_lowercase().ends_with(".html")
}

/// Exact, case-sensitive match of the extension against the image list
pub fn is_image(filename: &str) -> bool {
    extension(filename).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext))
}

/// Extension including the leading dot, taken from the last path element
fn extension(filename: &str) -> Option<&str> {
    let base = filename.rsplit('/').next().unwrap_or(filename);
    base.rfind('.').map(|idx| &base[idx..])
}

/// Cache-Control values per category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheControlConfig {
    pub html: String,
    /// 10 days
    pub image: String,
    /// 30 days
    pub other: String,
}

impl Default for CacheControlConfig {
    fn default() -> Self {
        Self {
            html: "no-cache".to_string(),
            image: "max-age=864000".to_string(),
            other: "max-age=2592000".to_string(),
        }
    }
}

impl CacheControlConfig {
    /// Configured value for a category
    pub fn value_for(&self, category: CacheCategory) -> &str {
        match category {
            CacheCategory::Html => &self.html,
            CacheCategory::Image => &self.image,
            CacheCategory::Other => &self.other,
        }
    }

    /// Upload options for a file name
    pub fn options_for(&self, filename: &str) -> Vec<UploadOption> {
        let value = self.value_for(classify(filename));
        vec![UploadOption::CacheControl(value.to_string())]
    }
}
