//! Static lookup tables for the portfolio table.
//!
//! The renderer never reaches for these directly; callers pass a [`Labels`]
//! value in, so tests can substitute their own tables.

use crate::types::Classification;

/// An emoji and the tooltip text shown next to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Badge {
    pub emoji: &'static str,
    pub label: &'static str,
}

/// Display tables used when rendering rows.
#[derive(Debug, Clone, Copy)]
pub struct Labels {
    pub scopes: &'static [(Classification, Badge)],
    /// Keyed by lowercase `Reason` tag.
    pub causes: &'static [(&'static str, Badge)],
    /// Emoji for a `Reason` that is missing or not in `causes`.
    pub unknown_cause_emoji: &'static str,
    /// Tooltip when `Reason` is empty.
    pub unknown_cause_label: &'static str,
    pub missing_icon: &'static str,
    pub missing_summary: &'static str,
    pub missing_why: &'static str,
}

pub const SCOPES: &[(Classification, Badge)] = &[
    (
        Classification::Local,
        Badge {
            emoji: "🏘️",
            label: "Local Giving",
        },
    ),
    (
        Classification::National,
        Badge {
            emoji: "🇺🇸",
            label: "National Giving",
        },
    ),
    (
        Classification::Global,
        Badge {
            emoji: "🌍",
            label: "Global Giving",
        },
    ),
];

pub const CAUSES: &[(&str, Badge)] = &[
    (
        "education",
        Badge {
            emoji: "🎓",
            label: "Education",
        },
    ),
    (
        "environment",
        Badge {
            emoji: "🌿",
            label: "Environment",
        },
    ),
    (
        "homeless",
        Badge {
            emoji: "🏠",
            label: "Housing & Stability",
        },
    ),
    (
        "church",
        Badge {
            emoji: "🙏",
            label: "Faith & Community",
        },
    ),
    (
        "food",
        Badge {
            emoji: "🍎",
            label: "Food Security",
        },
    ),
    (
        "justice",
        Badge {
            emoji: "⚖️",
            label: "Justice",
        },
    ),
    (
        "health",
        Badge {
            emoji: "🩺",
            label: "Health",
        },
    ),
];

/// Conventional favicon locations, probed in this order against the site origin.
pub const PROBE_PATHS: &[&str] = &[
    "/favicon.ico",
    "/favicon.png",
    "/apple-touch-icon.png",
    "/apple-touch-icon-precomposed.png",
    "/favicon-32x32.png",
    "/favicon-16x16.png",
    "/icon.png",
    "/logo.png",
    "/images/favicon.ico",
    "/images/favicon.png",
    "/img/favicon.ico",
    "/img/favicon.png",
    "/assets/favicon.ico",
    "/assets/favicon.png",
    "/static/favicon.ico",
    "/static/favicon.png",
    "/public/favicon.ico",
    "/public/favicon.png",
];

pub const DEFAULT_LABELS: Labels = Labels {
    scopes: SCOPES,
    causes: CAUSES,
    unknown_cause_emoji: "❓",
    unknown_cause_label: "Focus pending",
    missing_icon: "🌐",
    missing_summary: "Details coming soon.",
    missing_why: "Personal note coming soon while we document this grant.",
};

impl Default for Labels {
    fn default() -> Self {
        DEFAULT_LABELS
    }
}

impl Labels {
    pub fn scope(&self, classification: Classification) -> Option<Badge> {
        self.scopes
            .iter()
            .find(|(c, _)| *c == classification)
            .map(|(_, badge)| *badge)
    }

    /// Emoji and tooltip for a `Reason` tag.
    ///
    /// Unknown tags keep their raw text as the tooltip so the table still says
    /// something useful.
    pub fn cause<'a>(&self, reason: Option<&'a str>) -> (&'static str, &'a str) {
        let key = reason.map(|r| r.trim().to_lowercase()).unwrap_or_default();
        if let Some((_, badge)) = self.causes.iter().find(|(k, _)| *k == key) {
            return (badge.emoji, badge.label);
        }
        match reason.map(str::trim).filter(|r| !r.is_empty()) {
            Some(raw) => (self.unknown_cause_emoji, raw),
            None => (self.unknown_cause_emoji, self.unknown_cause_label),
        }
    }
}
