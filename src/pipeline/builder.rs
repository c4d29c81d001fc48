// src/pipeline/builder.rs

//! Incremental track builder.
//!
//! Walks the user's lesson tree in on-screen order, allocates dense IDs for
//! every lesson and lexeme it meets, and streams each record to a
//! [`TrackWriter`] as soon as its data is known. Word lookups are drained
//! breadth-first in batches of `max_concurrent` concurrent fetches, paced
//! and backed off by [`Backoff`] and bounded by a [`FailureBudget`].

use std::collections::HashSet;
use std::io::Write;

use futures::future;

use crate::codec::TrackWriter;
use crate::error::{AppError, FetchError, Result};
use crate::graph::{ExternalKey, IdentityTable};
use crate::models::{
    CrawlStats, CrawlerConfig, DictionaryItem, LanguageTrack, Lesson, Skill, TrackHeader, Word,
    WordId,
};
use crate::services::DictionarySource;

use super::backoff::Backoff;
use super::budget::FailureBudget;

/// Lifecycle of a word ID during a crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordState {
    /// ID allocated, no data yet
    Unresolved,
    /// Fetch in flight
    Resolving,
    /// Record written
    Resolved,
    /// Last fetch failed; may be requeued by a later pass
    Failed,
}

/// A pending dictionary lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Lookup {
    language: String,
    lexeme_id: String,
    word: WordId,
    /// Related-link hops from a lesson's own words
    depth: u32,
}

/// Everything a finished crawl produced.
#[derive(Debug)]
pub struct BuildOutput<W> {
    /// The writer's sink, holding the complete stream
    pub sink: W,
    /// The graph as the builder saw it; decoding `sink` yields the same
    pub track: LanguageTrack,
    pub stats: CrawlStats,
}

/// One crawl session.
pub struct TrackBuilder<'a, W: Write> {
    source: &'a dyn DictionarySource,
    config: &'a CrawlerConfig,
    header: TrackHeader,
    writer: TrackWriter<W>,
    lessons: IdentityTable<Lesson>,
    words: IdentityTable<Word>,
    states: Vec<WordState>,
    queue: Vec<Lookup>,
    budget: FailureBudget,
    backoff: Backoff,
    stats: CrawlStats,
}

impl<'a, W: Write> TrackBuilder<'a, W> {
    /// Start a session; the stream header is written immediately.
    pub fn new(
        source: &'a dyn DictionarySource,
        config: &'a CrawlerConfig,
        header: TrackHeader,
        sink: W,
    ) -> Result<Self> {
        let writer = TrackWriter::new(sink, &header)?;
        Ok(Self {
            source,
            config,
            header,
            writer,
            lessons: IdentityTable::new(),
            words: IdentityTable::new(),
            states: Vec::new(),
            queue: Vec::new(),
            budget: FailureBudget::new(config.failure_budget),
            backoff: Backoff::from_config(config),
            stats: CrawlStats::started(),
        })
    }

    /// Crawl every skill and finish the stream.
    pub async fn build(mut self, skills: &[Skill]) -> Result<BuildOutput<W>> {
        let mut ordered: Vec<&Skill> = skills.iter().collect();
        ordered.sort_by_key(|skill| skill.grid_position());

        // Every tree lesson gets its ID up front, so dependencies resolve
        // no matter where they sit in the grid.
        for skill in &ordered {
            let allocation = self.lessons.get_or_allocate(ExternalKey::new(&skill.name));
            if !allocation.is_new() {
                log::warn!(
                    "Lesson name '{}' appears more than once; later record wins",
                    skill.name
                );
            }
        }

        log::info!(
            "Building track {} from {} lesson(s)",
            self.header.track_id(),
            ordered.len()
        );

        for skill in ordered {
            self.build_lesson(skill).await?;
        }

        self.finish()
    }

    async fn build_lesson(&mut self, skill: &Skill) -> Result<()> {
        let id = self
            .lessons
            .lookup(&ExternalKey::new(&skill.name))
            .ok_or_else(|| AppError::crawl(&skill.name, "lesson was never allocated"))?;

        let mut dependencies = Vec::with_capacity(skill.dependencies_name.len());
        for name in &skill.dependencies_name {
            let allocation = self.lessons.get_or_allocate(ExternalKey::new(name));
            if allocation.is_new() {
                log::warn!(
                    "Lesson '{}' depends on unknown lesson '{}'; leaving a placeholder",
                    skill.name,
                    name
                );
            }
            dependencies.push(allocation.id());
        }

        let language = self.header.user_language_id.clone();
        let words: Vec<WordId> = skill
            .lexeme_ids()
            .map(|lexeme| self.enqueue(&language, lexeme, 0))
            .collect();

        let lesson = self
            .lessons
            .get_mut(id)
            .ok_or_else(|| AppError::crawl(&skill.name, "lesson slot missing"))?;
        lesson.title = skill.title.clone();
        lesson.name = skill.name.clone();
        lesson.short_name = skill.short.clone();
        lesson.explanation = skill.explanation.clone().unwrap_or_default();
        lesson.dependencies = dependencies;
        lesson.words = words;
        self.writer.write_lesson(lesson)?;
        self.stats.lessons += 1;

        log::info!(
            "Lesson '{}': {} word(s), {} queued lookup(s)",
            skill.name,
            lesson.words.len(),
            self.queue.len()
        );

        self.drain().await
    }

    /// Allocate (or reuse) the ID for a lexeme and queue it if it still
    /// needs data.
    fn enqueue(&mut self, language: &str, lexeme_id: &str, depth: u32) -> WordId {
        let allocation = self
            .words
            .get_or_allocate(ExternalKey::scoped(language, lexeme_id));
        let id = allocation.id();
        if allocation.is_new() {
            self.states.push(WordState::Unresolved);
        }

        let needs_data = matches!(
            self.states[id as usize],
            WordState::Unresolved | WordState::Failed
        );
        let within_depth = self
            .config
            .max_expansion_depth
            .is_none_or(|max| depth <= max);

        if needs_data && within_depth {
            self.queue.push(Lookup {
                language: language.to_string(),
                lexeme_id: lexeme_id.to_string(),
                word: id,
                depth,
            });
        }
        id
    }

    /// Take the queue, dropping duplicates and keys that no longer need a
    /// fetch. Keys that failed in an earlier pass get another chance.
    fn take_pending(&mut self) -> Vec<Lookup> {
        let mut seen = HashSet::new();
        let mut pending = Vec::new();

        for lookup in std::mem::take(&mut self.queue) {
            let state = &mut self.states[lookup.word as usize];
            match *state {
                WordState::Resolved | WordState::Resolving => continue,
                WordState::Failed => *state = WordState::Unresolved,
                WordState::Unresolved => {}
            }
            if seen.insert(lookup.word) {
                pending.push(lookup);
            }
        }
        pending
    }

    /// Repeat fetch passes until a pass discovers nothing new.
    async fn drain(&mut self) -> Result<()> {
        loop {
            let pending = self.take_pending();
            if pending.is_empty() {
                return Ok(());
            }
            log::info!("Looking up at most {} word(s)", pending.len());
            self.fetch_pass(&pending).await?;
        }
    }

    async fn fetch_pass(&mut self, pending: &[Lookup]) -> Result<()> {
        let cap = self.config.max_concurrent.max(1);
        let mut index = 0;

        while index < pending.len() {
            let end = (index + cap).min(pending.len());
            let batch: Vec<&Lookup> = pending[index..end]
                .iter()
                .filter(|lookup| self.states[lookup.word as usize] == WordState::Unresolved)
                .collect();

            if batch.is_empty() {
                index = end;
                continue;
            }

            self.backoff.pace().await;

            for lookup in &batch {
                self.states[lookup.word as usize] = WordState::Resolving;
            }

            let source = self.source;
            let results: Vec<std::result::Result<DictionaryItem, FetchError>> =
                future::join_all(batch.iter().map(|lookup| {
                    source.fetch_dictionary_item(&lookup.lexeme_id, &lookup.language)
                }))
                .await;
            self.stats.fetches += batch.len();

            let mut rate_limited = false;
            for (lookup, result) in batch.into_iter().zip(results) {
                match result {
                    Ok(item) => self.resolve(lookup, item)?,
                    Err(error) => {
                        if error.is_rate_limited() {
                            rate_limited = true;
                            self.stats.rate_limited += 1;
                            self.states[lookup.word as usize] = WordState::Unresolved;
                        } else {
                            self.states[lookup.word as usize] = WordState::Failed;
                        }
                        log::warn!("Not adding word {}: {}", lookup.lexeme_id, error);
                        self.budget.charge()?;
                    }
                }
            }

            if rate_limited {
                let delay = self.backoff.back_off().await;
                log::warn!(
                    "Rate limited; retrying batch {}..{} after {:?}",
                    index,
                    end,
                    delay
                );
                continue;
            }

            index = end;
        }
        Ok(())
    }

    /// Fill a word from its dictionary page, queue its related lexemes, and
    /// write its record.
    fn resolve(&mut self, lookup: &Lookup, item: DictionaryItem) -> Result<()> {
        let language = if item.from_language.is_empty() {
            lookup.language.clone()
        } else {
            item.from_language.clone()
        };

        let related: Vec<WordId> = item
            .related_lexemes
            .iter()
            .map(|link| self.enqueue(&language, link.lexeme_id(), lookup.depth + 1))
            .collect();

        let word = self
            .words
            .get_mut(lookup.word)
            .ok_or_else(|| AppError::crawl(&lookup.lexeme_id, "word slot missing"))?;
        word.surface_form = item.word.clone();
        word.translations = item.translations.clone();
        word.examples = item.examples();
        word.related = related;
        self.writer.write_word(word)?;

        self.states[lookup.word as usize] = WordState::Resolved;
        self.stats.words_resolved += 1;
        log::debug!("Added word {} ({})", item.word, lookup.lexeme_id);
        Ok(())
    }

    fn finish(mut self) -> Result<BuildOutput<W>> {
        self.stats.end_time = chrono::Utc::now();
        self.stats.failures = self.budget.failures();
        self.stats.words_failed = self
            .states
            .iter()
            .filter(|&&s| s == WordState::Failed)
            .count();
        self.stats.words_dangling = self
            .states
            .iter()
            .filter(|&&s| s != WordState::Resolved)
            .count();

        let sink = self.writer.finish()?;
        let track = LanguageTrack {
            header: self.header,
            lessons: self.lessons.into_entities(),
            words: self.words.into_entities(),
        };

        Ok(BuildOutput {
            sink,
            track,
            stats: self.stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::time::Instant;

    use super::*;
    use crate::codec::decode_track;
    use crate::models::{Placeholder, ProgressDebugInfo, RelatedLexeme, User};

    /// Scripted source: each lexeme maps to a list of responses, consumed
    /// one per call; the last one repeats.
    #[derive(Default)]
    struct ScriptedSource {
        responses: HashMap<String, Vec<std::result::Result<DictionaryItem, FetchError>>>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedSource {
        fn word(mut self, lexeme: &str, surface: &str, related: &[&str]) -> Self {
            let item = item(lexeme, surface, related);
            self.responses.insert(lexeme.to_string(), vec![Ok(item)]);
            self
        }

        fn script(
            mut self,
            lexeme: &str,
            responses: Vec<std::result::Result<DictionaryItem, FetchError>>,
        ) -> Self {
            self.responses.insert(lexeme.to_string(), responses);
            self
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }

        fn calls_for(&self, lexeme: &str) -> usize {
            self.calls().iter().filter(|(_, id)| id == lexeme).count()
        }
    }

    #[async_trait]
    impl DictionarySource for ScriptedSource {
        async fn fetch_user(&self, _username: &str) -> std::result::Result<User, FetchError> {
            Ok(User::default())
        }

        async fn fetch_dictionary_item(
            &self,
            lexeme_id: &str,
            into_language: &str,
        ) -> std::result::Result<DictionaryItem, FetchError> {
            let call_index = {
                let mut calls = self.calls.lock().unwrap();
                let n = calls.iter().filter(|(_, id)| id == lexeme_id).count();
                calls.push((into_language.to_string(), lexeme_id.to_string()));
                n
            };
            match self.responses.get(lexeme_id) {
                Some(script) => script[call_index.min(script.len() - 1)].clone(),
                None => Err(FetchError::Status {
                    url: lexeme_id.to_string(),
                    status: 404,
                    reason: "Not Found".into(),
                }),
            }
        }
    }

    fn item(lexeme: &str, surface: &str, related: &[&str]) -> DictionaryItem {
        DictionaryItem {
            lexeme_id: lexeme.to_string(),
            from_language: "en".into(),
            learning_language: "fr".into(),
            word: surface.to_string(),
            translations: format!("{surface}-en"),
            alternative_forms: Vec::new(),
            related_lexemes: related
                .iter()
                .map(|id| RelatedLexeme {
                    anchor: id.to_string(),
                    url: format!("/dictionary/French/x/{id}"),
                })
                .collect(),
        }
    }

    fn skill(name: &str, x: i64, y: i64, deps: &[&str], lexemes: &[&str]) -> Skill {
        let mut by_lesson = std::collections::BTreeMap::new();
        by_lesson.insert(1, lexemes.iter().map(|s| s.to_string()).collect());
        Skill {
            id: format!("id-{name}"),
            name: name.to_string(),
            title: name.to_uppercase(),
            short: name[..1].to_string(),
            explanation: None,
            dependencies_name: deps.iter().map(|s| s.to_string()).collect(),
            coords_x: x,
            coords_y: y,
            progress_v3_debug_info: Some(ProgressDebugInfo {
                lexeme_ids_by_lesson: by_lesson,
            }),
        }
    }

    fn header() -> TrackHeader {
        TrackHeader {
            learning_language_id: "fr".into(),
            user_language_id: "en".into(),
            learning_language: "French".into(),
            user_language: "English".into(),
        }
    }

    fn rate_limited(lexeme: &str) -> std::result::Result<DictionaryItem, FetchError> {
        Err(FetchError::RateLimited {
            url: lexeme.to_string(),
        })
    }

    async fn run(
        source: &ScriptedSource,
        config: &CrawlerConfig,
        skills: &[Skill],
    ) -> Result<BuildOutput<Vec<u8>>> {
        TrackBuilder::new(source, config, header(), Vec::new())?
            .build(skills)
            .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_decodes_to_built_graph() {
        let source = ScriptedSource::default()
            .word("a", "chat", &["b"])
            .word("b", "chien", &["a", "c"])
            .word("c", "oiseau", &[]);
        let config = CrawlerConfig::default();
        let skills = [skill("basics", 0, 0, &[], &["a"])];

        let output = run(&source, &config, &skills).await.unwrap();
        let decoded = decode_track(&output.sink).unwrap();
        assert_eq!(decoded, output.track);

        let chat = decoded.word(decoded.lessons[0].words[0]).unwrap();
        assert_eq!(chat.surface_form, "chat");
        let chien = decoded.word(chat.related[0]).unwrap();
        assert_eq!(chien.surface_form, "chien");
        // a <-> b cycle shares IDs
        assert_eq!(chien.related[0], chat.id);
        assert_eq!(output.stats.words_resolved, 3);
        assert_eq!(output.stats.words_dangling, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lessons_sorted_by_grid_position() {
        let source = ScriptedSource::default();
        let config = CrawlerConfig::default();
        let skills = [
            skill("food", 1, 1, &["basics"], &[]),
            skill("phrases", 5, 0, &["basics"], &[]),
            skill("basics", 0, 0, &[], &[]),
        ];

        let output = run(&source, &config, &skills).await.unwrap();
        let names: Vec<_> = output.track.lessons.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["basics", "phrases", "food"]);
        assert_eq!(output.track.lessons[2].dependencies, vec![0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_dependency_becomes_placeholder() {
        let source = ScriptedSource::default();
        let config = CrawlerConfig::default();
        let skills = [skill("food", 0, 0, &["ghost"], &[])];

        let output = run(&source, &config, &skills).await.unwrap();
        let decoded = decode_track(&output.sink).unwrap();
        let ghost = decoded.lesson(decoded.lessons[0].dependencies[0]).unwrap();
        assert!(ghost.is_placeholder());
        assert_eq!(decoded, output.track);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_lookup_fetched_once() {
        let source = ScriptedSource::default()
            .word("a", "chat", &["c"])
            .word("b", "chien", &["c"])
            .word("c", "animal", &[]);
        let config = CrawlerConfig::default();
        let skills = [skill("basics", 0, 0, &[], &["a", "b", "a"])];

        let output = run(&source, &config, &skills).await.unwrap();
        assert_eq!(source.calls_for("a"), 1);
        assert_eq!(source.calls_for("c"), 1);
        assert_eq!(output.track.lessons[0].words, vec![0, 1, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolved_words_not_refetched_across_lessons() {
        let source = ScriptedSource::default().word("a", "chat", &[]);
        let config = CrawlerConfig::default();
        let skills = [
            skill("basics", 0, 0, &[], &["a"]),
            skill("review", 1, 0, &["basics"], &["a"]),
        ];

        let output = run(&source, &config, &skills).await.unwrap();
        assert_eq!(source.calls_for("a"), 1);
        assert_eq!(output.track.lessons[1].words, vec![0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookups_use_user_language() {
        let source = ScriptedSource::default().word("a", "chat", &["b"]).word("b", "chien", &[]);
        let config = CrawlerConfig::default();
        let skills = [skill("basics", 0, 0, &[], &["a"])];

        run(&source, &config, &skills).await.unwrap();
        assert!(source.calls().iter().all(|(lang, _)| lang == "en"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_batch_is_retried_with_larger_delay() {
        let source = ScriptedSource::default()
            .word("a", "chat", &[])
            .script("b", vec![rate_limited("b"), Ok(item("b", "chien", &[]))]);
        let config = CrawlerConfig::default();
        let skills = [skill("basics", 0, 0, &[], &["a", "b"])];

        let start = Instant::now();
        let output = run(&source, &config, &skills).await.unwrap();

        // Seed 400ms doubled once before the retry.
        assert!(start.elapsed() >= Duration::from_millis(800));
        assert_eq!(source.calls_for("b"), 2);
        // The word resolved in the first attempt is not fetched again.
        assert_eq!(source.calls_for("a"), 1);
        assert_eq!(output.stats.rate_limited, 1);
        assert_eq!(output.stats.words_resolved, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_rate_limits_escalate() {
        let source = ScriptedSource::default().script(
            "a",
            vec![
                rate_limited("a"),
                rate_limited("a"),
                Ok(item("a", "chat", &[])),
            ],
        );
        let config = CrawlerConfig::default();
        let skills = [skill("basics", 0, 0, &[], &["a"])];

        let start = Instant::now();
        run(&source, &config, &skills).await.unwrap();
        // 800ms + 1600ms of backoff; pacing adds the running delay too.
        assert!(start.elapsed() >= Duration::from_millis(2400));
        assert_eq!(source.calls_for("a"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_word_stays_dangling() {
        let source = ScriptedSource::default().word("a", "chat", &["missing"]);
        let config = CrawlerConfig::default();
        let skills = [skill("basics", 0, 0, &[], &["a"])];

        let output = run(&source, &config, &skills).await.unwrap();
        let decoded = decode_track(&output.sink).unwrap();
        let missing = decoded.word(decoded.words[0].related[0]).unwrap();
        assert!(missing.is_placeholder());
        assert_eq!(output.stats.words_failed, 1);
        assert_eq!(output.stats.failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_budget_aborts_crawl() {
        let source = ScriptedSource::default();
        let config = CrawlerConfig {
            max_concurrent: 1,
            ..CrawlerConfig::default()
        };
        let lexemes: Vec<String> = (0..30).map(|i| format!("w{i}")).collect();
        let lexeme_refs: Vec<&str> = lexemes.iter().map(String::as_str).collect();
        let skills = [skill("basics", 0, 0, &[], &lexeme_refs)];

        let result = run(&source, &config, &skills).await;
        assert!(matches!(
            result,
            Err(AppError::BudgetExceeded {
                failures: 21,
                limit: 20
            })
        ));
        assert_eq!(source.calls().len(), 21);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_budget_stops_issuing_batches() {
        let source = ScriptedSource::default();
        let config = CrawlerConfig::default();
        let lexemes: Vec<String> = (0..50).map(|i| format!("w{i}")).collect();
        let lexeme_refs: Vec<&str> = lexemes.iter().map(String::as_str).collect();
        let skills = [skill("basics", 0, 0, &[], &lexeme_refs)];

        let result = run(&source, &config, &skills).await;
        assert!(matches!(result, Err(AppError::BudgetExceeded { .. })));
        // The third batch of ten crosses the limit; no fourth batch starts.
        assert_eq!(source.calls().len(), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expansion_depth_limit() {
        let source = ScriptedSource::default()
            .word("a", "chat", &["b"])
            .word("b", "chien", &["c"])
            .word("c", "oiseau", &[]);
        let config = CrawlerConfig {
            max_expansion_depth: Some(1),
            ..CrawlerConfig::default()
        };
        let skills = [skill("basics", 0, 0, &[], &["a"])];

        let output = run(&source, &config, &skills).await.unwrap();
        assert_eq!(source.calls_for("c"), 0);
        assert_eq!(output.stats.words_dangling, 1);
        let decoded = decode_track(&output.sink).unwrap();
        assert_eq!(decoded, output.track);
        assert!(decoded.word(2).unwrap().is_placeholder());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_word_retried_when_rediscovered() {
        let source = ScriptedSource::default()
            .script(
                "a",
                vec![
                    Err(FetchError::network("a", "connection reset")),
                    Ok(item("a", "chat", &[])),
                ],
            )
            .word("b", "chien", &[]);
        let config = CrawlerConfig::default();
        let skills = [
            skill("basics", 0, 0, &[], &["a"]),
            skill("review", 1, 0, &[], &["b", "a"]),
        ];

        let output = run(&source, &config, &skills).await.unwrap();
        assert_eq!(source.calls_for("a"), 2);
        assert_eq!(output.track.words[0].surface_form, "chat");
        assert_eq!(output.stats.words_failed, 0);
    }
}
