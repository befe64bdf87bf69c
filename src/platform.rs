//! URL platform classification
//!
//! Maps a URL to the coarse platform tag used for output-directory layout and
//! history filtering. Classification is pure and total: substring matching
//! against a fixed ordered rule table, case-insensitive, defaulting to
//! [`Platform::Other`]. Rule order matters because some domains could
//! substring-match more than one rule.

use serde::{Deserialize, Serialize};

/// Coarse classification of a URL's source site
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    /// youtube.com / youtu.be
    YouTube,
    /// twitter.com / x.com
    Twitter,
    /// facebook.com / fb.com / fb.me
    Facebook,
    /// instagram.com
    Instagram,
    /// tiktok.com
    TikTok,
    /// vimeo.com
    Vimeo,
    /// Anything unmatched
    Other,
}

impl Platform {
    /// Display name, also used as the per-platform output subdirectory
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::YouTube => "YouTube",
            Platform::Twitter => "Twitter",
            Platform::Facebook => "Facebook",
            Platform::Instagram => "Instagram",
            Platform::TikTok => "TikTok",
            Platform::Vimeo => "Vimeo",
            Platform::Other => "Other",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "youtube" => Ok(Platform::YouTube),
            "twitter" => Ok(Platform::Twitter),
            "facebook" => Ok(Platform::Facebook),
            "instagram" => Ok(Platform::Instagram),
            "tiktok" => Ok(Platform::TikTok),
            "vimeo" => Ok(Platform::Vimeo),
            "other" => Ok(Platform::Other),
            unknown => Err(format!("unknown platform '{unknown}'")),
        }
    }
}

/// Ordered rule table; the first matching substring wins
const RULES: &[(&str, Platform)] = &[
    ("youtube.com", Platform::YouTube),
    ("youtu.be", Platform::YouTube),
    ("twitter.com", Platform::Twitter),
    ("x.com", Platform::Twitter),
    ("facebook.com", Platform::Facebook),
    ("fb.com", Platform::Facebook),
    ("fb.me", Platform::Facebook),
    ("instagram.com", Platform::Instagram),
    ("tiktok.com", Platform::TikTok),
    ("vimeo.com", Platform::Vimeo),
];

/// Classify a URL by its source platform
///
/// Pure and total: no I/O, no failure mode.
pub fn classify(url: &str) -> Platform {
    let url_lower = url.to_lowercase();
    for (needle, platform) in RULES {
        if url_lower.contains(needle) {
            return *platform;
        }
    }
    Platform::Other
}
