// src/models/remote.rs

//! Payloads returned by the remote language-learning service.
//!
//! Only the fields the scraper reads are modelled; everything else in the
//! upstream JSON is ignored.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::track::Example;

/// A user profile with its lesson trees.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub username: String,

    /// Lesson trees keyed by learning language ID
    #[serde(default)]
    pub language_data: HashMap<String, LanguageData>,
}

/// The lesson tree for one learning language.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LanguageData {
    /// Display name of the learning language (e.g. "French")
    #[serde(default)]
    pub language_string: String,

    #[serde(default)]
    pub skills: Vec<Skill>,
}

/// A lesson in the user's tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Skill {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub short: String,
    #[serde(default)]
    pub explanation: Option<String>,

    /// Names of the lessons this one depends on
    #[serde(default)]
    pub dependencies_name: Vec<String>,

    #[serde(default)]
    pub coords_x: i64,
    #[serde(default)]
    pub coords_y: i64,

    #[serde(default)]
    pub progress_v3_debug_info: Option<ProgressDebugInfo>,
}

impl Skill {
    /// On-screen ordering key: rows of ten cells.
    pub fn grid_position(&self) -> i64 {
        self.coords_y * 10 + self.coords_x
    }

    /// Lexeme IDs taught by this skill, in lesson order.
    pub fn lexeme_ids(&self) -> impl Iterator<Item = &str> {
        self.progress_v3_debug_info
            .iter()
            .flat_map(|info| info.lexeme_ids_by_lesson.values())
            .flatten()
            .map(String::as_str)
    }
}

/// Debug block holding the lexemes taught by each lesson of a skill.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressDebugInfo {
    /// Keyed by lesson number; JSON object keys are parsed as integers so
    /// that lesson 10 sorts after lesson 2.
    #[serde(default)]
    pub lexeme_ids_by_lesson: BTreeMap<u32, Vec<String>>,
}

/// A dictionary page for a single lexeme.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DictionaryItem {
    pub lexeme_id: String,

    #[serde(default)]
    pub from_language: String,
    #[serde(default)]
    pub learning_language: String,

    #[serde(default)]
    pub word: String,
    #[serde(default)]
    pub translations: String,

    #[serde(default)]
    pub alternative_forms: Vec<AlternativeForm>,
    #[serde(default)]
    pub related_lexemes: Vec<RelatedLexeme>,
}

impl DictionaryItem {
    /// Example sentences in display form.
    pub fn examples(&self) -> Vec<Example> {
        self.alternative_forms
            .iter()
            .map(|form| Example {
                sentence: form.example_sentence.clone(),
                translation: form.translation.clone(),
            })
            .collect()
    }
}

/// An alternative form with its example sentence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlternativeForm {
    #[serde(default)]
    pub example_sentence: String,
    #[serde(default)]
    pub translation: String,
}

/// A link to another dictionary page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelatedLexeme {
    #[serde(default)]
    pub anchor: String,
    pub url: String,
}

impl RelatedLexeme {
    /// The lexeme ID is the last path segment of the link.
    pub fn lexeme_id(&self) -> &str {
        match self.url.rfind('/') {
            Some(pos) => &self.url[pos + 1..],
            None => &self.url,
        }
    }
}
