use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::BriefingError;

// ---------------------------------------------------------------------------
// Category: closed set of subjects partitioning newsletters and artifacts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Ai,
    Business,
    Tech,
    Health,
    Lifestyle,
    Finance,
    Travel,
    Education,
    Entertainment,
    Science,
    Sports,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Category::Ai,
        Category::Business,
        Category::Tech,
        Category::Health,
        Category::Lifestyle,
        Category::Finance,
        Category::Travel,
        Category::Education,
        Category::Entertainment,
        Category::Science,
        Category::Sports,
    ];

    /// Canonical string, as stored and as written into rendered headers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Ai => "AI",
            Category::Business => "BUSINESS",
            Category::Tech => "TECH",
            Category::Health => "HEALTH",
            Category::Lifestyle => "LIFESTYLE",
            Category::Finance => "FINANCE",
            Category::Travel => "TRAVEL",
            Category::Education => "EDUCATION",
            Category::Entertainment => "ENTERTAINMENT",
            Category::Science => "SCIENCE",
            Category::Sports => "SPORTS",
        }
    }

    /// Lower-case form used inside slugs.
    pub fn slug_fragment(&self) -> String {
        self.as_str().to_ascii_lowercase()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = BriefingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| BriefingError::Config(format!("unknown category '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Period: the two fixed run buckets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    /// Sunday run, covering the past week.
    Weekly,
    /// Wednesday run, covering the days since Sunday.
    Midweek,
}

impl Period {
    /// Derive the bucket from the weekday of the run.
    ///
    /// Sunday through Tuesday belong to the weekly bucket, Wednesday through
    /// Saturday to the midweek one.
    pub fn for_date(date: NaiveDate) -> Self {
        match date.weekday() {
            Weekday::Sun | Weekday::Mon | Weekday::Tue => Period::Weekly,
            Weekday::Wed | Weekday::Thu | Weekday::Fri | Weekday::Sat => Period::Midweek,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Period::Weekly => "weekly",
            Period::Midweek => "midweek",
        }
    }

    /// How far back the source feed is queried.
    pub fn lookback_days(&self) -> u32 {
        match self {
            Period::Weekly => 7,
            Period::Midweek => 3,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Period {
    type Err = BriefingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weekly" => Ok(Period::Weekly),
            "midweek" => Ok(Period::Midweek),
            other => Err(BriefingError::Config(format!("unknown period '{other}'"))),
        }
    }
}

/// Key under which the slug counter for `(category, period)` is stored.
pub fn slug_counter_key(category: Category, period: Period) -> String {
    format!("{}-{}", category.as_str(), period.label())
}

/// Slug for the `counter`-th artifact of `(category, period)`.
pub fn format_slug(category: Category, period: Period, counter: u64) -> String {
    format!("{}-{}-news-{}", period.label(), category.slug_fragment(), counter)
}

// ---------------------------------------------------------------------------
// Mood: writing tone, with its instruction text kept in a lookup table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mood {
    #[default]
    Professional,
    Humorous,
    Skeptical,
    Optimistic,
    Informal,
}

/// Descriptive record attached to a [`Mood`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoodProfile {
    pub name: &'static str,
    pub instruction: &'static str,
}

const MOOD_PROFILES: [(Mood, MoodProfile); 5] = [
    (
        Mood::Professional,
        MoodProfile {
            name: "professional",
            instruction: "Write in a professional, informative style suitable for a knowledgeable \
                          audience. Focus on clarity, accuracy, and an objective tone.",
        },
    ),
    (
        Mood::Humorous,
        MoodProfile {
            name: "humorous",
            instruction: "Write in an entertaining, playful, and engaging style with witty remarks \
                          and humor.",
        },
    ),
    (
        Mood::Skeptical,
        MoodProfile {
            name: "skeptical",
            instruction: "Write in a skeptical, critical tone. Question claims, highlight potential \
                          hype, and maintain a slightly doubtful perspective.",
        },
    ),
    (
        Mood::Optimistic,
        MoodProfile {
            name: "optimistic",
            instruction: "Write with an enthusiastic, positive, and optimistic tone. Highlight \
                          opportunities and the positive side of each development.",
        },
    ),
    (
        Mood::Informal,
        MoodProfile {
            name: "informal",
            instruction: "Write casually and conversationally, as if chatting with a friend. Keep it \
                          relatable and easygoing, without losing clarity.",
        },
    ),
];

impl Mood {
    pub fn profile(&self) -> &'static MoodProfile {
        MOOD_PROFILES
            .iter()
            .find(|(mood, _)| mood == self)
            .map(|(_, profile)| profile)
            .unwrap_or(&MOOD_PROFILES[0].1)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Professional => "PROFESSIONAL",
            Mood::Humorous => "HUMOROUS",
            Mood::Skeptical => "SKEPTICAL",
            Mood::Optimistic => "OPTIMISTIC",
            Mood::Informal => "INFORMAL",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.profile().name)
    }
}

impl FromStr for Mood {
    type Err = BriefingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MOOD_PROFILES
            .iter()
            .map(|(mood, _)| *mood)
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| BriefingError::Config(format!("unknown mood '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// NewsletterSource: one allowlisted sender
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsletterSource {
    pub name: String,
    pub address: String,
    pub category: Category,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Addresses of the active newsletters for `category`, in configuration order.
pub fn active_senders(newsletters: &[NewsletterSource], category: Category) -> Vec<String> {
    newsletters
        .iter()
        .filter(|n| n.active && n.category == category && n.address.contains('@'))
        .map(|n| n.address.clone())
        .collect()
}
