//! # Affirmation Categories
//!
//! A category is a behaviour-change domain ("smoking", "confidence", ...) with
//! three tables:
//!
//! - **templates**: sentence patterns containing one or more [`PLACEHOLDER`] slots
//! - **positive words**: the pool each slot draws from (at least two words)
//! - **transformations**: `(negative, positive)` pairs rewritten in the user's
//!   thought, applied in table order
//!
//! The built-in tables are registered once by [`CategoryRegistry::builtin`].
//! Custom categories can be built with [`Category::new`] and added with
//! [`CategoryRegistry::register`].

use log::debug;
use regex::{Regex, RegexBuilder};

use crate::error::{AffirmError, Result};

/// Slot marker inside a template.
pub const PLACEHOLDER: &str = "{word}";

type Table = (&'static str, &'static [&'static str], &'static [&'static str], &'static [(&'static str, &'static str)]);

const BUILTIN_TABLES: &[Table] = &[
    (
        "smoking",
        &[
            "I am {word} and free from cigarettes",
            "I breathe {word} air with every breath",
            "I choose a {word} life without smoking",
            "Every day I feel more {word} as a non-smoker",
            "I am {word} and in control of my cravings",
            "My lungs grow {word} and {word} each day",
        ],
        &["healthy", "free", "strong", "clean", "fresh", "calm", "clear"],
        &[
            ("cigarettes", "fresh air"),
            ("cigarette", "deep breath"),
            ("smoking", "breathing"),
            ("smoke", "breathe"),
            ("craving", "choosing health"),
            ("addicted", "free"),
        ],
    ),
    (
        "confidence",
        &[
            "I am {word} in every situation",
            "I feel {word} when I speak",
            "I am {word} and {word} around other people",
            "People enjoy my {word} presence",
            "I trust myself and feel {word}",
            "I walk into every room feeling {word}",
        ],
        &["confident", "bold", "outgoing", "capable", "worthy", "self-assured", "brave"],
        &[
            ("shy", "outgoing"),
            ("insecure", "secure"),
            ("nervous", "calm"),
            ("awkward", "at ease"),
            ("worthless", "worthy"),
            ("not good enough", "more than enough"),
        ],
    ),
    (
        "fitness",
        &[
            "I am {word} and full of energy",
            "I love moving my {word} body",
            "I feel {word} after every workout",
            "My body becomes more {word} every day",
            "I make {word} choices for my body",
            "I am {word} and {word} in my training",
        ],
        &["strong", "fit", "energetic", "active", "healthy", "powerful", "flexible"],
        &[
            ("lazy", "energetic"),
            ("tired", "energised"),
            ("unfit", "getting fitter"),
            ("out of shape", "shaping up"),
            ("skip the gym", "enjoy the gym"),
        ],
    ),
    (
        "sleep",
        &[
            "I am {word} as I drift off to sleep",
            "I fall asleep feeling {word}",
            "My mind is {word} and quiet at night",
            "I wake up feeling {word} and rested",
            "Each night I become more {word}",
            "I welcome {word} and deep sleep",
        ],
        &["relaxed", "peaceful", "calm", "rested", "serene", "safe", "refreshed"],
        &[
            ("insomnia", "restful nights"),
            ("awake", "drowsy"),
            ("restless", "restful"),
            ("racing", "slowing"),
            ("can't sleep", "sleep easily"),
        ],
    ),
    (
        "anxiety",
        &[
            "I am {word} and safe right now",
            "I breathe in and feel {word}",
            "I let go of worry and feel {word}",
            "My thoughts are {word} and clear",
            "With each breath I grow more {word}",
            "I handle challenges in a {word} way",
        ],
        &["calm", "safe", "grounded", "peaceful", "centred", "steady", "relaxed"],
        &[
            ("anxious", "calm"),
            ("worried", "at peace"),
            ("panic", "steady breathing"),
            ("scared", "safe"),
            ("overwhelmed", "grounded"),
        ],
    ),
    (
        "motivation",
        &[
            "I am {word} and ready to act",
            "I take {word} steps towards my goals",
            "I feel {word} when I start my day",
            "Every task I finish makes me more {word}",
            "I am {word} and {word} in everything I do",
            "My {word} energy carries me forward",
        ],
        &["motivated", "driven", "focused", "determined", "inspired", "productive", "unstoppable"],
        &[
            ("procrastinate", "take action"),
            ("unmotivated", "motivated"),
            ("give up", "keep going"),
            ("distracted", "focused"),
            ("stuck", "moving forward"),
        ],
    ),
    (
        "stress",
        &[
            "I am {word} under pressure",
            "I release tension and feel {word}",
            "I respond to challenges in a {word} way",
            "My body feels {word} and light",
            "I choose to stay {word} today",
            "Stress melts away and I feel {word}",
        ],
        &["relaxed", "calm", "balanced", "resilient", "composed", "peaceful", "patient"],
        &[
            ("stressed", "relaxed"),
            ("tense", "loose"),
            ("pressure", "opportunity"),
            ("exhausted", "recharging"),
            ("frustrated", "patient"),
        ],
    ),
    (
        "weight",
        &[
            "I am {word} and love my body",
            "I eat {word} food that nourishes me",
            "I feel {word} in my body every day",
            "I make {word} choices at every meal",
            "My body becomes {word} and {word}",
            "I enjoy being {word} and active",
        ],
        &["healthy", "light", "nourished", "balanced", "strong", "vibrant", "energetic"],
        &[
            ("overweight", "healthy"),
            ("fat", "nourished"),
            ("junk food", "healthy food"),
            ("overeat", "eat mindfully"),
            ("binge", "savour"),
        ],
    ),
];

/// A compiled `(negative, positive)` rewrite.
#[derive(Debug, Clone)]
pub struct Transformation {
    pattern: Regex,
    negative: String,
    positive: String,
}

impl Transformation {
    /// Case-insensitive literal match of `negative` as a whole word.
    ///
    /// Word boundaries are only required at ends of `negative` that are word
    /// characters, so `"can't (ever)"` still matches before a space.
    pub fn new(negative: &str, positive: &str) -> Result<Self> {
        let is_word = |c: char| c.is_alphanumeric() || c == '_';
        let mut escaped = regex::escape(negative);
        if negative.chars().next().is_some_and(is_word) {
            escaped.insert_str(0, r"\b");
        }
        if negative.chars().last().is_some_and(is_word) {
            escaped.push_str(r"\b");
        }

        let pattern = RegexBuilder::new(&escaped)
            .case_insensitive(true)
            .build()
            .map_err(|e| AffirmError::InvalidDefinition(format!("transformation `{negative}`: {e}")))?;

        Ok(Self {
            pattern,
            negative: negative.to_string(),
            positive: positive.to_string(),
        })
    }

    /// Rewrite every occurrence of the negative term.
    #[must_use]
    pub fn apply(&self, text: &str) -> String {
        self.pattern
            .replace_all(text, regex::NoExpand(&self.positive))
            .into_owned()
    }

    pub fn negative(&self) -> &str {
        &self.negative
    }

    pub fn positive(&self) -> &str {
        &self.positive
    }
}

/// Immutable category definition.
#[derive(Debug, Clone)]
pub struct Category {
    name: String,
    templates: Vec<String>,
    positive_words: Vec<String>,
    transformations: Vec<Transformation>,
}

impl Category {
    /// Build and validate a category.
    ///
    /// # Errors
    ///
    /// Returns [`AffirmError::InvalidDefinition`] if the name is blank, there
    /// are no templates, a template has no placeholder, or the word pool has
    /// fewer than two entries.
    pub fn new<S: AsRef<str>>(
        name: &str,
        templates: &[S],
        positive_words: &[S],
        transformations: &[(S, S)],
    ) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(AffirmError::InvalidDefinition("category name cannot be empty".into()));
        }
        if templates.is_empty() {
            return Err(AffirmError::InvalidDefinition(format!("`{name}` has no templates")));
        }
        if let Some(bad) = templates.iter().find(|t| !t.as_ref().contains(PLACEHOLDER)) {
            return Err(AffirmError::InvalidDefinition(format!(
                "`{name}` template has no {PLACEHOLDER} slot: {}",
                bad.as_ref()
            )));
        }
        if positive_words.len() < 2 {
            return Err(AffirmError::InvalidDefinition(format!(
                "`{name}` needs at least two positive words, found {}",
                positive_words.len()
            )));
        }

        let transformations = transformations
            .iter()
            .map(|(neg, pos)| Transformation::new(neg.as_ref(), pos.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: name.to_string(),
            templates: templates.iter().map(|t| t.as_ref().to_string()).collect(),
            positive_words: positive_words.iter().map(|w| w.as_ref().to_string()).collect(),
            transformations,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn templates(&self) -> &[String] {
        &self.templates
    }

    pub fn positive_words(&self) -> &[String] {
        &self.positive_words
    }

    pub fn transformations(&self) -> &[Transformation] {
        &self.transformations
    }

    /// Apply every transformation in registration order.
    ///
    /// Order matters: with `[(a, b), (b, c)]` an `a` ends up as `c`.
    #[must_use]
    pub fn transform(&self, text: &str) -> String {
        self.transformations
            .iter()
            .fold(text.to_string(), |acc, t| t.apply(&acc))
    }
}

/// Lookup table of categories by key, kept in registration order.
#[derive(Debug, Clone, Default)]
pub struct CategoryRegistry {
    categories: Vec<Category>,
}

impl CategoryRegistry {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in category set.
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::empty();
        for (name, templates, words, transformations) in BUILTIN_TABLES {
            registry.register(Category::new(name, templates, words, transformations)?);
        }
        debug!("Registered {} built-in categories", registry.categories.len());
        Ok(registry)
    }

    /// Add a category, replacing any existing one with the same key.
    pub fn register(&mut self, category: Category) {
        match self.categories.iter_mut().find(|c| c.name == category.name) {
            Some(existing) => *existing = category,
            None => self.categories.push(category),
        }
    }

    /// # Errors
    ///
    /// [`AffirmError::InvalidCategory`] when `name` is not registered.
    pub fn get(&self, name: &str) -> Result<&Category> {
        self.categories
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| AffirmError::InvalidCategory(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(Category::name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}
