// src/models/track.rs

//! In-memory language track graph.
//!
//! Lessons and words live in per-kind arenas indexed by their dense ID.
//! Cross references are stored as IDs, so two references to the same
//! entity always resolve to the same arena slot.

use serde::{Deserialize, Serialize};

/// Dense, zero-based lesson identifier.
pub type LessonId = u32;

/// Dense, zero-based word identifier.
pub type WordId = u32;

/// An entity that can exist before its defining record has been seen.
pub trait Placeholder {
    /// Name used in logs and errors.
    const KIND: &'static str;

    /// Create an entity with the given ID and empty fields.
    fn placeholder(id: u32) -> Self;

    /// The entity's own ID.
    fn id(&self) -> u32;

    /// Whether the entity still holds nothing but its ID.
    fn is_placeholder(&self) -> bool;
}

/// A lesson (skill) in the track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: LessonId,
    pub title: String,
    /// Unique within a track; dependencies are declared by name upstream.
    pub name: String,
    pub short_name: String,
    pub explanation: String,
    /// Order is significant and duplicates are allowed.
    pub dependencies: Vec<LessonId>,
    pub words: Vec<WordId>,
}

impl Placeholder for Lesson {
    const KIND: &'static str = "Lesson";

    fn placeholder(id: u32) -> Self {
        Self {
            id,
            title: String::new(),
            name: String::new(),
            short_name: String::new(),
            explanation: String::new(),
            dependencies: Vec::new(),
            words: Vec::new(),
        }
    }

    fn id(&self) -> u32 {
        self.id
    }

    fn is_placeholder(&self) -> bool {
        self.title.is_empty()
            && self.name.is_empty()
            && self.short_name.is_empty()
            && self.explanation.is_empty()
            && self.dependencies.is_empty()
            && self.words.is_empty()
    }
}

/// An example sentence with its translation, both rendered verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    pub sentence: String,
    pub translation: String,
}

/// A vocabulary item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    pub id: WordId,
    pub surface_form: String,
    /// Free text, not structured.
    pub translations: String,
    pub examples: Vec<Example>,
    /// Symmetric in practice, not enforced.
    pub related: Vec<WordId>,
}

impl Placeholder for Word {
    const KIND: &'static str = "Word";

    fn placeholder(id: u32) -> Self {
        Self {
            id,
            surface_form: String::new(),
            translations: String::new(),
            examples: Vec::new(),
            related: Vec::new(),
        }
    }

    fn id(&self) -> u32 {
        self.id
    }

    fn is_placeholder(&self) -> bool {
        self.surface_form.is_empty()
            && self.translations.is_empty()
            && self.examples.is_empty()
            && self.related.is_empty()
    }
}

/// Track header: which language is learned from which.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackHeader {
    pub learning_language_id: String,
    pub user_language_id: String,
    pub learning_language: String,
    pub user_language: String,
}

impl TrackHeader {
    /// Storage identifier of the track, e.g. `en-fr`.
    pub fn track_id(&self) -> String {
        track_id(&self.user_language_id, &self.learning_language_id)
    }
}

/// Storage identifier for a user-language / learning-language pair.
pub fn track_id(user_language_id: &str, learning_language_id: &str) -> String {
    format!("{}-{}", user_language_id, learning_language_id)
}

/// A full lesson and word graph for one language pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageTrack {
    pub header: TrackHeader,
    pub lessons: Vec<Lesson>,
    pub words: Vec<Word>,
}

impl LanguageTrack {
    pub fn new(header: TrackHeader) -> Self {
        Self {
            header,
            lessons: Vec::new(),
            words: Vec::new(),
        }
    }

    pub fn lesson(&self, id: LessonId) -> Option<&Lesson> {
        self.lessons.get(id as usize)
    }

    pub fn word(&self, id: WordId) -> Option<&Word> {
        self.words.get(id as usize)
    }

    /// Find a lesson by its unique name.
    pub fn lesson_by_name(&self, name: &str) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.name == name)
    }

    /// Resolve the word references of a lesson.
    pub fn lesson_words<'a>(&'a self, lesson: &'a Lesson) -> impl Iterator<Item = &'a Word> + 'a {
        lesson.words.iter().filter_map(|&id| self.word(id))
    }

    /// Resolve the dependency references of a lesson.
    pub fn lesson_dependencies<'a>(
        &'a self,
        lesson: &'a Lesson,
    ) -> impl Iterator<Item = &'a Lesson> + 'a {
        lesson.dependencies.iter().filter_map(|&id| self.lesson(id))
    }

    /// Resolve the related-word references of a word.
    pub fn related_words<'a>(&'a self, word: &'a Word) -> impl Iterator<Item = &'a Word> + 'a {
        word.related.iter().filter_map(|&id| self.word(id))
    }

    /// Number of lessons referenced but never defined.
    pub fn placeholder_lesson_count(&self) -> usize {
        self.lessons.iter().filter(|l| l.is_placeholder()).count()
    }

    /// Number of words referenced but never defined.
    pub fn placeholder_word_count(&self) -> usize {
        self.words.iter().filter(|w| w.is_placeholder()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_track() -> LanguageTrack {
        let mut track = LanguageTrack::new(TrackHeader {
            learning_language_id: "fr".into(),
            user_language_id: "en".into(),
            learning_language: "French".into(),
            user_language: "English".into(),
        });
        track.lessons.push(Lesson {
            name: "basics".into(),
            words: vec![0, 1],
            ..Lesson::placeholder(0)
        });
        track.words.push(Word {
            surface_form: "chat".into(),
            related: vec![1],
            ..Word::placeholder(0)
        });
        track.words.push(Word::placeholder(1));
        track
    }

    #[test]
    fn test_placeholder_is_empty() {
        assert!(Lesson::placeholder(3).is_placeholder());
        assert!(Word::placeholder(3).is_placeholder());
        assert_eq!(Word::placeholder(3).id(), 3);
    }

    #[test]
    fn test_reference_resolution() {
        let track = sample_track();
        let lesson = track.lesson_by_name("basics").unwrap();
        let words: Vec<_> = track.lesson_words(lesson).map(|w| w.id).collect();
        assert_eq!(words, vec![0, 1]);

        let chat = track.word(0).unwrap();
        let related: Vec<_> = track.related_words(chat).map(|w| w.id).collect();
        assert_eq!(related, vec![1]);
    }

    #[test]
    fn test_placeholder_counts() {
        let track = sample_track();
        assert_eq!(track.placeholder_lesson_count(), 0);
        assert_eq!(track.placeholder_word_count(), 1);
    }

    #[test]
    fn test_track_id() {
        let track = sample_track();
        assert_eq!(track.header.track_id(), "en-fr");
    }
}
