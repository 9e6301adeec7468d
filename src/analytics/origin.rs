//! Acquisition-origin classification
//!
//! Maps the free-form `source` / `utm_source` fields captured by lead
//! forms and ad integrations onto one canonical channel label.

use serde::{Deserialize, Serialize};

/// Canonical acquisition channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Origin {
    #[serde(rename = "Google")]
    Google,
    #[serde(rename = "Meta")]
    Meta,
    #[serde(rename = "LinkedIn")]
    LinkedIn,
    #[serde(rename = "Website")]
    Website,
    #[serde(rename = "Indicação")]
    Referral,
    #[serde(rename = "Email Marketing")]
    EmailMarketing,
    #[serde(rename = "Não Rastreada")]
    Untracked,
    #[serde(rename = "Outros")]
    Other,
}

impl Origin {
    pub const ALL: [Self; 8] = [
        Self::Google,
        Self::Meta,
        Self::LinkedIn,
        Self::Website,
        Self::Referral,
        Self::EmailMarketing,
        Self::Untracked,
        Self::Other,
    ];

    /// Dashboard label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Google => "Google",
            Self::Meta => "Meta",
            Self::LinkedIn => "LinkedIn",
            Self::Website => "Website",
            Self::Referral => "Indicação",
            Self::EmailMarketing => "Email Marketing",
            Self::Untracked => "Não Rastreada",
            Self::Other => "Outros",
        }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Origin {
    type Err = String;

    /// Accepts the dashboard label (case-insensitive) or the variant name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|origin| {
                origin.label().to_lowercase() == wanted
                    || format!("{origin:?}").to_lowercase() == wanted
            })
            .ok_or_else(|| format!("unknown origin '{}'", s.trim()))
    }
}

/// Classify a lead's acquisition origin. First matching rule wins:
///
/// 1. `utm_source = go-ads` or `source = google-ads` → Google
/// 2. `utm_source = meta-ads` → Meta
/// 3. `source = linkedin` → LinkedIn
/// 4. `source = website` → Website
/// 5. `source = indicacao` → Indicação
/// 6. `source = email` → Email Marketing
/// 7. both fields absent (or empty) → Não Rastreada
/// 8. anything else → Outros
pub fn classify_origin(source: Option<&str>, utm_source: Option<&str>) -> Origin {
    let source = source.filter(|s| !s.is_empty());
    let utm_source = utm_source.filter(|s| !s.is_empty());

    match (source, utm_source) {
        (_, Some("go-ads")) | (Some("google-ads"), _) => Origin::Google,
        (_, Some("meta-ads")) => Origin::Meta,
        (Some("linkedin"), _) => Origin::LinkedIn,
        (Some("website"), _) => Origin::Website,
        (Some("indicacao"), _) => Origin::Referral,
        (Some("email"), _) => Origin::EmailMarketing,
        (None, None) => Origin::Untracked,
        _ => Origin::Other,
    }
}
