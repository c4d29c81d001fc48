// src/codec/track.rs

//! Language track stream encoding and decoding.
//!
//! ```text
//! Stream       := MAGIC Header Record*
//! Header       := Str Str Str Str   // learnLangId, userLangId, learnLangName, userLangName
//! LessonRecord := 0x00 u32(id) Str Str Str Str u16(n) u32[n] u16(m) u32[m]
//! WordRecord   := 0x01 u32(id) Str Str u16(n) (Str Str)[n] u16(m) u32[m]
//! Str          := u32(len) byte[len]
//! ```
//!
//! References are plain IDs and may point forward, backward, or at an entity
//! that is never defined. The decoder creates a placeholder the first time
//! an ID is seen and fills it in when (if) the defining record arrives.

use std::io::{Cursor, Write};

use crate::error::FormatError;
use crate::graph::placeholder_slot;
use crate::models::{Example, LanguageTrack, Lesson, LessonId, Placeholder, TrackHeader, Word, WordId};

use super::primitive::{
    ByteCursor, is_exhausted, read_string, read_u8, read_u16, read_u32, write_count,
    write_string, write_u8, write_u32,
};

/// Magic number at the start of every track.
pub const MAGIC: [u8; 4] = [0xE0, 0xCC, 0x3E, 0x5B];

/// Largest ID accepted by both the writer and the decoder.
///
/// A single reference can make the decoder grow a table up to this ID, so
/// the cap bounds placeholder memory to a few tens of MiB per entity kind.
pub const MAX_ENTITY_ID: u32 = (1 << 18) - 1;

/// Record kind marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordTag {
    Lesson = 0,
    Word = 1,
}

impl RecordTag {
    fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(RecordTag::Lesson),
            1 => Some(RecordTag::Word),
            _ => None,
        }
    }

    fn context(self) -> &'static str {
        match self {
            RecordTag::Lesson => "lesson record",
            RecordTag::Word => "word record",
        }
    }
}

// --- Encoding ---

/// Append-only track writer.
///
/// The magic number and header are written on construction; records are
/// appended in whatever order the caller finalizes them.
pub struct TrackWriter<W: Write> {
    writer: W,
    lessons_written: usize,
    words_written: usize,
}

impl<W: Write> TrackWriter<W> {
    /// Start a new track stream.
    pub fn new(mut writer: W, header: &TrackHeader) -> Result<Self, FormatError> {
        writer.write_all(&MAGIC)?;
        write_string(&mut writer, &header.learning_language_id)?;
        write_string(&mut writer, &header.user_language_id)?;
        write_string(&mut writer, &header.learning_language)?;
        write_string(&mut writer, &header.user_language)?;

        Ok(Self {
            writer,
            lessons_written: 0,
            words_written: 0,
        })
    }

    /// Append a lesson record. IDs are checked before anything is written.
    pub fn write_lesson(&mut self, lesson: &Lesson) -> Result<(), FormatError> {
        check_id::<Lesson>(lesson.id)?;
        check_ids::<Lesson>(&lesson.dependencies)?;
        check_ids::<Word>(&lesson.words)?;

        let w = &mut self.writer;
        write_u8(w, RecordTag::Lesson as u8)?;
        write_u32(w, lesson.id)?;

        write_string(w, &lesson.title)?;
        write_string(w, &lesson.name)?;
        write_string(w, &lesson.short_name)?;
        write_string(w, &lesson.explanation)?;

        write_count(w, "lesson dependencies", lesson.dependencies.len())?;
        for &dep in &lesson.dependencies {
            write_u32(w, dep)?;
        }

        write_count(w, "lesson words", lesson.words.len())?;
        for &word in &lesson.words {
            write_u32(w, word)?;
        }

        self.lessons_written += 1;
        Ok(())
    }

    /// Append a word record. IDs are checked before anything is written.
    pub fn write_word(&mut self, word: &Word) -> Result<(), FormatError> {
        check_id::<Word>(word.id)?;
        check_ids::<Word>(&word.related)?;

        let w = &mut self.writer;
        write_u8(w, RecordTag::Word as u8)?;
        write_u32(w, word.id)?;

        write_string(w, &word.surface_form)?;
        write_string(w, &word.translations)?;

        write_count(w, "word examples", word.examples.len())?;
        for example in &word.examples {
            write_string(w, &example.sentence)?;
            write_string(w, &example.translation)?;
        }

        write_count(w, "related words", word.related.len())?;
        for &related in &word.related {
            write_u32(w, related)?;
        }

        self.words_written += 1;
        Ok(())
    }

    pub fn lessons_written(&self) -> usize {
        self.lessons_written
    }

    pub fn words_written(&self) -> usize {
        self.words_written
    }

    /// Flush and hand back the sink.
    pub fn finish(mut self) -> Result<W, FormatError> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Encode a whole in-memory track: lessons first, then words.
pub fn encode_track(track: &LanguageTrack) -> Result<Vec<u8>, FormatError> {
    let mut writer = TrackWriter::new(Vec::new(), &track.header)?;
    for lesson in &track.lessons {
        writer.write_lesson(lesson)?;
    }
    for word in &track.words {
        writer.write_word(word)?;
    }
    writer.finish()
}

fn check_id<T: Placeholder>(id: u32) -> Result<u32, FormatError> {
    if id > MAX_ENTITY_ID {
        return Err(FormatError::IdOutOfRange {
            kind: T::KIND,
            id,
            max: MAX_ENTITY_ID,
        });
    }
    Ok(id)
}

fn check_ids<T: Placeholder>(ids: &[u32]) -> Result<(), FormatError> {
    ids.iter().try_for_each(|&id| check_id::<T>(id).map(|_| ()))
}

// --- Decoding ---

/// Placeholder tables filled while reading one stream.
#[derive(Default)]
struct DecodeContext {
    lessons: Vec<Lesson>,
    words: Vec<Word>,
}

impl DecodeContext {
    /// Read a lesson ID and make sure its slot exists.
    fn read_lesson_ref(&mut self, cursor: &mut ByteCursor<'_>) -> Result<LessonId, FormatError> {
        let id = check_id::<Lesson>(read_u32(cursor)?)?;
        placeholder_slot(&mut self.lessons, id);
        Ok(id)
    }

    /// Read a word ID and make sure its slot exists.
    fn read_word_ref(&mut self, cursor: &mut ByteCursor<'_>) -> Result<WordId, FormatError> {
        let id = check_id::<Word>(read_u32(cursor)?)?;
        placeholder_slot(&mut self.words, id);
        Ok(id)
    }

    fn decode_lesson(&mut self, cursor: &mut ByteCursor<'_>) -> Result<(), FormatError> {
        let id = self.read_lesson_ref(cursor)?;

        let title = read_string(cursor)?;
        let name = read_string(cursor)?;
        let short_name = read_string(cursor)?;
        let explanation = read_string(cursor)?;

        let dep_count = read_u16(cursor)?;
        let mut dependencies = Vec::with_capacity(dep_count as usize);
        for _ in 0..dep_count {
            dependencies.push(self.read_lesson_ref(cursor)?);
        }

        let word_count = read_u16(cursor)?;
        let mut words = Vec::with_capacity(word_count as usize);
        for _ in 0..word_count {
            words.push(self.read_word_ref(cursor)?);
        }

        // A repeated ID overwrites the earlier fields in place.
        let lesson = placeholder_slot(&mut self.lessons, id);
        lesson.title = title;
        lesson.name = name;
        lesson.short_name = short_name;
        lesson.explanation = explanation;
        lesson.dependencies = dependencies;
        lesson.words = words;
        Ok(())
    }

    fn decode_word(&mut self, cursor: &mut ByteCursor<'_>) -> Result<(), FormatError> {
        let id = self.read_word_ref(cursor)?;

        let surface_form = read_string(cursor)?;
        let translations = read_string(cursor)?;

        let example_count = read_u16(cursor)?;
        let mut examples = Vec::with_capacity(example_count as usize);
        for _ in 0..example_count {
            let sentence = read_string(cursor)?;
            let translation = read_string(cursor)?;
            examples.push(Example {
                sentence,
                translation,
            });
        }

        let related_count = read_u16(cursor)?;
        let mut related = Vec::with_capacity(related_count as usize);
        for _ in 0..related_count {
            related.push(self.read_word_ref(cursor)?);
        }

        let word = placeholder_slot(&mut self.words, id);
        word.surface_form = surface_form;
        word.translations = translations;
        word.examples = examples;
        word.related = related;
        Ok(())
    }
}

/// Map a read that ran off the end of the buffer to a truncation of the
/// structure that started at `offset`.
fn as_truncation(context: &'static str, offset: u64) -> impl FnOnce(FormatError) -> FormatError {
    move |error| match error {
        FormatError::OutOfBounds { .. } => FormatError::truncated(context, offset, error),
        other => other,
    }
}

fn decode_header(cursor: &mut ByteCursor<'_>) -> Result<TrackHeader, FormatError> {
    Ok(TrackHeader {
        learning_language_id: read_string(cursor)?,
        user_language_id: read_string(cursor)?,
        learning_language: read_string(cursor)?,
        user_language: read_string(cursor)?,
    })
}

/// Decode a complete track buffer.
///
/// Either the whole graph is returned or an error; there is no partial
/// result.
pub fn decode_track(bytes: &[u8]) -> Result<LanguageTrack, FormatError> {
    if bytes.len() < MAGIC.len() || bytes[..MAGIC.len()] != MAGIC {
        return Err(FormatError::InvalidMagic {
            found: bytes.iter().take(MAGIC.len()).copied().collect(),
        });
    }

    let mut cursor = Cursor::new(bytes);
    cursor.set_position(MAGIC.len() as u64);

    let header_start = cursor.position();
    let header = decode_header(&mut cursor).map_err(as_truncation("header", header_start))?;

    let mut ctx = DecodeContext::default();
    let mut records = 0usize;

    while !is_exhausted(&cursor) {
        let record_start = cursor.position();
        let raw_tag = read_u8(&mut cursor)?;
        let tag = RecordTag::from_u8(raw_tag).ok_or(FormatError::UnknownTag {
            tag: raw_tag,
            offset: record_start,
        })?;

        let result = match tag {
            RecordTag::Lesson => ctx.decode_lesson(&mut cursor),
            RecordTag::Word => ctx.decode_word(&mut cursor),
        };
        result.map_err(as_truncation(tag.context(), record_start))?;
        records += 1;
    }

    log::debug!(
        "Decoded track {}: {} record(s), {} lesson slot(s), {} word slot(s)",
        header.track_id(),
        records,
        ctx.lessons.len(),
        ctx.words.len()
    );

    Ok(LanguageTrack {
        header,
        lessons: ctx.lessons,
        words: ctx.words,
    })
}
