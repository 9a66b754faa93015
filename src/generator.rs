//! # Affirmation Generator
//!
//! Turns a negative thought into a list of positive affirmations using the
//! template tables in [`crate::categories`]. Nothing here is learned; it is
//! plain substitution:
//!
//! 1. lower-case the thought
//! 2. run the category's transformations over it, in table order
//! 3. fill every `{word}` slot of every template with an independent draw
//!    from the category's positive-word pool
//! 4. append `I am {first} and {second}: {thought}` built from the first two
//!    pool words and the transformed thought
//! 5. drop exact duplicates, keeping first-seen order
//!
//! Two extra stages sit on top:
//!
//! - [`filter_for_wizard`] keeps only first-person lines and enforces the
//!   3..=15 quality gate used by the guided flow
//! - [`Generator::generate_custom`] adds ten lead-in variants of the user's
//!   own words before the template lines
//!
//! ## Example
//!
//! ```
//! use mantra::generator::Generator;
//!
//! let generator = Generator::new()?;
//! let lines = generator.generate("confidence", "I feel shy")?;
//! assert!(lines.last().unwrap().ends_with("i feel outgoing"));
//! # Ok::<(), mantra::AffirmError>(())
//! ```

use std::collections::HashSet;

use lazy_static::lazy_static;
use log::{debug, trace};
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};
use regex::{Captures, Regex};

use crate::categories::{Category, CategoryRegistry, PLACEHOLDER};
use crate::error::{AffirmError, Result};

/// Lines kept by the wizard filter.
pub const WIZARD_MAX_RESULTS: usize = 15;
/// Below this the wizard treats generation as failed.
pub const WIZARD_MIN_RESULTS: usize = 3;

const NEGATION_TOKENS: &[&str] = &["never", "not", "can't", "cannot", "won't", "don't"];

const FIRST_PERSON_PREFIXES: &[&str] = &["i am ", "i'm ", "i "];

const WORD_SUBSTITUTIONS: &[(&str, &str)] = &[
    ("fail", "succeed"),
    ("weak", "strong"),
    ("bad", "good"),
    ("hate", "love"),
    ("fear", "embrace"),
    ("impossible", "possible"),
    ("difficult", "achievable"),
];

const LEAD_INS: &[&str] = &[
    "I am capable of",
    "I choose to be",
    "I am becoming",
    "I allow myself to",
    "I am ready to",
    "I deserve to",
    "I am learning to",
    "I trust myself to",
    "I give myself permission to",
    "I am open to",
];

lazy_static! {
    static ref PLACEHOLDER_RE: Regex = Regex::new(&regex::escape(PLACEHOLDER)).unwrap();
    static ref NEGATION_RE: Regex = Regex::new(&whole_words(NEGATION_TOKENS.iter().copied())).unwrap();
    static ref SUBSTITUTION_RE: Regex =
        Regex::new(&whole_words(WORD_SUBSTITUTIONS.iter().map(|(negative, _)| *negative))).unwrap();
}

/// `\b(?:a|b|...)\b` over escaped words, longest first.
fn whole_words<'a>(words: impl Iterator<Item = &'a str>) -> String {
    let mut words: Vec<&str> = words.collect();
    words.sort_by_key(|w| std::cmp::Reverse(w.len()));
    let alternatives: Vec<String> = words.into_iter().map(regex::escape).collect();
    format!(r"\b(?:{})\b", alternatives.join("|"))
}

/// Template generator bound to a category registry.
#[derive(Debug, Clone)]
pub struct Generator {
    registry: CategoryRegistry,
}

impl Generator {
    /// Generator over the built-in categories.
    pub fn new() -> Result<Self> {
        Ok(Self::with_registry(CategoryRegistry::builtin()?))
    }

    #[must_use]
    pub fn with_registry(registry: CategoryRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &CategoryRegistry {
        &self.registry
    }

    /// Generate deduplicated affirmations using the thread RNG.
    ///
    /// # Errors
    ///
    /// [`AffirmError::InvalidCategory`] for an unregistered category.
    pub fn generate(&self, category: &str, negative_thought: &str) -> Result<Vec<String>> {
        self.generate_with_rng(category, negative_thought, &mut thread_rng())
    }

    pub fn generate_with_rng<R: Rng + ?Sized>(
        &self,
        category: &str,
        negative_thought: &str,
        rng: &mut R,
    ) -> Result<Vec<String>> {
        let candidates = self.generate_candidates(category, negative_thought, rng)?;
        Ok(dedup_preserving_order(candidates))
    }

    /// Template lines followed by the synthesized sentence, before deduplication.
    pub fn generate_candidates<R: Rng + ?Sized>(
        &self,
        category: &str,
        negative_thought: &str,
        rng: &mut R,
    ) -> Result<Vec<String>> {
        let category = self.registry.get(category)?;
        let thought = category.transform(&negative_thought.to_lowercase());
        trace!("Transformed thought for `{}': {thought}", category.name());

        let mut lines: Vec<String> = category
            .templates()
            .iter()
            .map(|template| fill_template(template, category.positive_words(), &mut *rng))
            .collect();
        lines.push(synthesize(category, &thought));

        debug!("Generated {} candidate lines for `{}'", lines.len(), category.name());
        Ok(lines)
    }

    /// Custom mode: lead-in variants of the user's own words, then the template lines.
    pub fn generate_custom(&self, category: &str, negative_thought: &str) -> Result<Vec<String>> {
        self.generate_custom_with_rng(category, negative_thought, &mut thread_rng())
    }

    pub fn generate_custom_with_rng<R: Rng + ?Sized>(
        &self,
        category: &str,
        negative_thought: &str,
        rng: &mut R,
    ) -> Result<Vec<String>> {
        let templated = self.generate_candidates(category, negative_thought, rng)?;
        let mut lines = custom_candidates(negative_thought);
        lines.extend(templated);
        Ok(dedup_preserving_order(lines))
    }

    /// Template generation followed by the wizard quality gate.
    pub fn generate_for_wizard(&self, category: &str, negative_thought: &str) -> Result<Vec<String>> {
        filter_for_wizard(self.generate(category, negative_thought)?)
    }
}

/// Replace each slot with its own draw; the same word may be drawn twice.
fn fill_template<R: Rng + ?Sized>(template: &str, pool: &[String], rng: &mut R) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |_: &Captures| {
            pool.choose(&mut *rng).cloned().unwrap_or_default()
        })
        .into_owned()
}

fn synthesize(category: &Category, thought: &str) -> String {
    let words = category.positive_words();
    format!("I am {} and {}: {thought}", words[0], words[1])
}

/// Ten lead-in variants of the cleaned-up thought.
///
/// Best-effort wording only; the output is not guaranteed to be grammatical.
#[must_use]
pub fn custom_candidates(negative_thought: &str) -> Vec<String> {
    let core = positive_core(negative_thought);
    LEAD_INS.iter().map(|lead| format!("{lead} {core}")).collect()
}

/// Strip the first-person prefix and negations, then swap negative words.
///
/// Words match whole, so punctuation next to them is kept as written.
#[must_use]
pub fn positive_core(negative_thought: &str) -> String {
    let lowered = negative_thought.trim().to_lowercase();
    let stripped = FIRST_PERSON_PREFIXES
        .iter()
        .find_map(|prefix| lowered.strip_prefix(prefix))
        .unwrap_or(&lowered);

    let without_negations = NEGATION_RE.replace_all(stripped, "");
    let swapped = SUBSTITUTION_RE.replace_all(&without_negations, |caps: &Captures| {
        WORD_SUBSTITUTIONS
            .iter()
            .find(|(negative, _)| *negative == &caps[0])
            .map_or_else(|| caps[0].to_string(), |(_, positive)| (*positive).to_string())
    });

    swapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep trimmed lines starting with `"I "`, deduplicate, cap at 15.
///
/// # Errors
///
/// [`AffirmError::InsufficientResults`] when fewer than three lines survive.
pub fn filter_for_wizard<I>(lines: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = String>,
{
    let kept: Vec<String> = dedup_preserving_order(
        lines
            .into_iter()
            .map(|line| line.trim().to_string())
            .filter(|line| line.starts_with("I ")),
    )
    .into_iter()
    .take(WIZARD_MAX_RESULTS)
    .collect();

    if kept.len() < WIZARD_MIN_RESULTS {
        return Err(AffirmError::InsufficientResults {
            found: kept.len(),
            required: WIZARD_MIN_RESULTS,
        });
    }
    Ok(kept)
}

fn dedup_preserving_order<I>(lines: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    lines
        .into_iter()
        .filter(|line| seen.insert(line.clone()))
        .collect()
}
