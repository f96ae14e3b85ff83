//! Whole-book outlining with the LLM.
//!
//! The premise is settled one choice at a time (genre, concept, logline,
//! theme), each step seeing the earlier ones. The logline is then expanded
//! into a paragraph, split into three acts around their disasters, and every
//! act is broken into chapters and sections. Characters land in the codex.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::cli::{BookArgs, LlmOptions, LlmOutlineArgs};
use crate::codex::NewEntry;
use crate::config::LlmConfig;
use crate::document::{Document, SavePolicy};
use crate::edit;
use crate::formats::ActId;
use crate::openai::{ChatClient, LlmError};
use crate::outline;
use crate::prompts::fill_template;

pub const PLOT_CATEGORY: &str = "Plots";
pub const CHARACTER_CATEGORY: &str = "Character";

const SYSTEM_PROMPT: &str = "You are a story structure assistant for novelists. \
Answer only with what is asked. Write every text value in the language with code {language}.";

const EXPAND_PROMPT: &str = "Genre: {genre}\nConcept: {concept}\nTheme: {theme}\nLogline: {logline}\n\n\
Expand this logline into one paragraph covering the premise, the major disasters \
(the turning points) and the ending. Reply with the paragraph only.";

const ACTS_PROMPT: &str = "Expanded logline:\n\n{expanded}\n\n\
Split the story into three acts. Act 1 ends with the first disaster, preferably an external one. \
Act 2 holds the midpoint disaster, followed by a third disaster caused by the protagonist's attempts \
to fix things. Act 3 deals with the consequences and reaches the ending. For every act give a short \
title, a description of what happens and its disaster point.";

const CAST_PROMPT: &str = "Genre: {genre}\nConcept: {concept}\nTheme: {theme}\nLogline: {logline}\n\n{request}";

const PROTAGONISTS_REQUEST: &str = "Describe the protagonists. The first one is the main hero, \
the character whose eyes we follow and who is changed by the story. Give each a name, \
a description and their transformation.";

const ANTAGONISTS_REQUEST: &str = "Describe the antagonists: characters or forces that oppose \
the protagonist and drive the conflict. The first one is the main opponent. Give each a name, \
a description and their transformation, if any.";

const CHAPTERS_PROMPT: &str = "Logline: {logline}\nCast: {cast}\n\n\
Act {number}: {title}\n{description}\nDisaster point: {disaster}\n\n\
Break this act into {chapters} chapters of {sections} sections each. Give every chapter a title \
and every section a title and a one or two sentence summary of what happens in it.";

const FALLBACK_TURN: &str = "A dramatic turn changes the course of the story.";

const DISASTER_KEYWORDS: [&str; 11] = [
    "disaster", "desastre", "collapse", "fail", "falha", "sacrif", "betray", "traiç", "risk",
    "risco", "consequ",
];

/// Premise choices given up front; each one skips its LLM step.
#[derive(Debug, Clone, Default)]
pub struct Premise {
    pub genre: Option<String>,
    pub concept: Option<String>,
    pub logline: Option<String>,
    pub theme: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutlineShape {
    pub chapters_per_act: u8,
    pub sections_per_chapter: u8,
}

impl Default for OutlineShape {
    fn default() -> Self {
        Self {
            chapters_per_act: 3,
            sections_per_chapter: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    #[serde(alias = "nome")]
    pub name: String,
    #[serde(default, alias = "descricao")]
    pub description: String,
    #[serde(default, alias = "transformacao")]
    pub transformation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedSection {
    pub title: String,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedChapter {
    pub title: String,
    #[serde(default)]
    pub sections: Vec<PlannedSection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedAct {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "disaster_point")]
    pub disaster: String,
    #[serde(default)]
    pub chapters: Vec<PlannedChapter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryPlan {
    pub genre: String,
    pub concept: String,
    pub logline: String,
    pub theme: String,
    pub expanded_logline: String,
    pub protagonists: Vec<Character>,
    pub antagonists: Vec<Character>,
    pub acts: Vec<PlannedAct>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Choice {
    Genre,
    Concept,
    Logline,
    Theme,
}

impl Choice {
    fn key(self) -> &'static str {
        match self {
            Self::Genre => "genres",
            Self::Concept => "concepts",
            Self::Logline => "loglines",
            Self::Theme => "themes",
        }
    }

    fn count(self) -> usize {
        match self {
            Self::Genre | Self::Logline => 6,
            Self::Concept | Self::Theme => 4,
        }
    }

    fn request(self) -> &'static str {
        match self {
            Self::Genre => "List {count} distinct fiction genres that would suit a new novel.",
            Self::Concept => {
                "Genre: {genre}\n\nList {count} distinct concepts. A concept is the central idea \
                 or premise that gives the whole work its purpose."
            }
            Self::Logline => {
                "Genre: {genre}\nConcept: {concept}\n\nWrite {count} loglines, one or two \
                 sentences each, naming the protagonist and the central conflict."
            }
            Self::Theme => {
                "Genre: {genre}\nConcept: {concept}\nLogline: {logline}\n\nList {count} themes. \
                 A theme is the message underneath the story, not its plot."
            }
        }
    }
}

fn string_list_schema(key: &str, min_items: usize) -> Value {
    json!({
        "type": "object",
        "properties": {
            key: { "type": "array", "items": { "type": "string" }, "minItems": min_items }
        },
        "required": [key],
    })
}

fn cast_schema(key: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            key: {
                "type": "array",
                "minItems": 1,
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "description": { "type": "string" },
                        "transformation": { "type": "string" }
                    },
                    "required": ["name", "description"]
                }
            }
        },
        "required": [key],
    })
}

fn acts_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "acts": {
                "type": "array",
                "minItems": 3,
                "items": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string" },
                        "description": { "type": "string" },
                        "disaster_point": { "type": "string" }
                    },
                    "required": ["title", "description", "disaster_point"]
                }
            }
        },
        "required": ["acts"],
    })
}

fn chapters_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "chapters": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string" },
                        "sections": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "title": { "type": "string" },
                                    "summary": { "type": "string" }
                                },
                                "required": ["title", "summary"]
                            }
                        }
                    },
                    "required": ["title", "sections"]
                }
            }
        },
        "required": ["chapters"],
    })
}

/// The array under `key`, else the first array value of the object, else
/// the reply itself when it is an array.
fn list_field<'a>(value: &'a Value, key: &str) -> Option<&'a Vec<Value>> {
    if let Some(items) = value.get(key).and_then(Value::as_array) {
        return Some(items);
    }
    match value {
        Value::Array(items) => Some(items),
        Value::Object(map) => map.values().find_map(Value::as_array),
        _ => None,
    }
}

fn string_list(value: &Value, key: &str) -> Vec<String> {
    list_field(value, key)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// Items under `key` that deserialize as `T`; the rest are skipped.
fn typed_list<T: serde::de::DeserializeOwned>(value: &Value, key: &str) -> Vec<T> {
    list_field(value, key)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        if matches!(ch, '.' | '!' | '?') && chars.peek().is_some_and(|(_, next)| next.is_whitespace())
        {
            let end = idx + ch.len_utf8();
            out.push(text[start..end].trim());
            start = end;
        }
    }
    out.push(text[start..].trim());
    out.retain(|sentence| !sentence.is_empty());
    out
}

/// Three acts built from the expanded logline alone, for replies that do
/// not describe three acts. Sentences naming a disaster come first, then
/// the longest remaining ones.
pub fn fallback_acts(expanded: &str) -> Vec<PlannedAct> {
    let all = sentences(expanded);
    let (mut turns, mut rest): (Vec<&str>, Vec<&str>) = all.into_iter().partition(|sentence| {
        let lower = sentence.to_lowercase();
        DISASTER_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
    });
    rest.sort_by_key(|sentence| std::cmp::Reverse(sentence.chars().count()));
    turns.extend(rest);
    turns.truncate(3);
    while turns.len() < 3 {
        turns.push(FALLBACK_TURN);
    }

    let shapes = [
        (
            "Setup",
            "The world, the cast and their motives; ends with the first external disaster.",
        ),
        (
            "Confrontation",
            "Complications and the protagonist's attempts to fix things; the midpoint disaster hits and their actions start to make matters worse.",
        ),
        (
            "Resolution",
            "The failed attempts culminate in a third disaster that pushes to the climax and the ending.",
        ),
    ];
    shapes
        .into_iter()
        .zip(turns)
        .map(|((title, description), disaster)| PlannedAct {
            title: title.to_owned(),
            description: description.to_owned(),
            disaster: disaster.to_owned(),
            chapters: Vec::new(),
        })
        .collect()
}

fn cast_names(groups: &[&[Character]]) -> String {
    let names = groups
        .iter()
        .flat_map(|cast| cast.iter())
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>();
    if names.is_empty() {
        "not defined".to_owned()
    } else {
        names.join(", ")
    }
}

pub struct StoryGenerator<'a> {
    client: &'a ChatClient,
    system: String,
}

impl<'a> StoryGenerator<'a> {
    pub fn new(client: &'a ChatClient, language: &str) -> Self {
        Self {
            client,
            system: fill_template(SYSTEM_PROMPT, &[("language", language)]),
        }
    }

    /// `Ok(None)` when the reply is not JSON; transport and API errors
    /// still fail.
    async fn structured(&self, name: &str, user: &str, schema: Value) -> anyhow::Result<Option<Value>> {
        match self.client.complete_json(&self.system, user, name, schema).await {
            Ok(value) => Ok(Some(value)),
            Err(err) if matches!(err.downcast_ref::<LlmError>(), Some(LlmError::InvalidJson(_))) => {
                tracing::warn!(name, error = %err, "structured reply ignored");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn choose(
        &self,
        given: Option<String>,
        choice: Choice,
        vars: &[(&str, &str)],
    ) -> anyhow::Result<String> {
        if let Some(given) = given.map(|g| g.trim().to_owned()).filter(|g| !g.is_empty()) {
            tracing::info!(step = choice.key(), chosen = %given, "premise given");
            return Ok(given);
        }

        let count = choice.count().to_string();
        let mut all_vars = vars.to_vec();
        all_vars.push(("count", &count));
        let user = fill_template(choice.request(), &all_vars);
        let reply = self
            .structured(
                choice.key(),
                &user,
                string_list_schema(choice.key(), choice.count()),
            )
            .await?
            .unwrap_or(Value::Null);

        let candidates = string_list(&reply, choice.key());
        let chosen = candidates
            .first()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("model suggested no {}", choice.key()))?;
        tracing::info!(step = choice.key(), ?candidates, %chosen, "premise chosen");
        Ok(chosen)
    }

    async fn cast(&self, key: &str, request: &str, vars: &[(&str, &str)]) -> anyhow::Result<Vec<Character>> {
        let mut all_vars = vars.to_vec();
        all_vars.push(("request", request));
        let user = fill_template(CAST_PROMPT, &all_vars);
        let Some(reply) = self.structured(key, &user, cast_schema(key)).await? else {
            return Ok(Vec::new());
        };
        let cast = typed_list::<Character>(&reply, key)
            .into_iter()
            .filter(|c| !c.name.trim().is_empty())
            .collect::<Vec<_>>();
        tracing::info!(role = key, names = ?cast.iter().map(|c| &c.name).collect::<Vec<_>>(), "cast generated");
        Ok(cast)
    }

    async fn acts(&self, expanded: &str) -> anyhow::Result<Vec<PlannedAct>> {
        let user = fill_template(ACTS_PROMPT, &[("expanded", expanded)]);
        let reply = self.structured("acts", &user, acts_schema()).await?;
        let mut acts = reply
            .map(|reply| typed_list::<PlannedAct>(&reply, "acts"))
            .unwrap_or_default();
        if acts.len() < 3 {
            tracing::warn!(acts = acts.len(), "reply did not describe three acts; splitting the logline");
            return Ok(fallback_acts(expanded));
        }
        acts.truncate(3);
        let defaults = fallback_acts(expanded);
        for (act, default) in acts.iter_mut().zip(defaults) {
            if act.title.trim().is_empty() {
                act.title = default.title;
            }
            act.chapters.clear();
        }
        Ok(acts)
    }

    async fn chapters(
        &self,
        act: &PlannedAct,
        number: usize,
        logline: &str,
        cast: &str,
        shape: OutlineShape,
    ) -> anyhow::Result<Vec<PlannedChapter>> {
        let number = number.to_string();
        let chapters = shape.chapters_per_act.to_string();
        let sections = shape.sections_per_chapter.to_string();
        let user = fill_template(
            CHAPTERS_PROMPT,
            &[
                ("logline", logline),
                ("cast", cast),
                ("number", &number),
                ("title", &act.title),
                ("description", &act.description),
                ("disaster", &act.disaster),
                ("chapters", &chapters),
                ("sections", &sections),
            ],
        );
        let Some(reply) = self.structured("chapters", &user, chapters_schema()).await? else {
            return Ok(Vec::new());
        };

        let mut planned = typed_list::<PlannedChapter>(&reply, "chapters");
        planned.truncate(usize::from(shape.chapters_per_act));
        for chapter in &mut planned {
            chapter
                .sections
                .truncate(usize::from(shape.sections_per_chapter));
        }
        tracing::info!(act = %act.title, chapters = planned.len(), "act broken into chapters");
        Ok(planned)
    }

    pub async fn plan(&self, premise: Premise, shape: OutlineShape) -> anyhow::Result<StoryPlan> {
        let genre = self.choose(premise.genre, Choice::Genre, &[]).await?;
        let concept = self
            .choose(premise.concept, Choice::Concept, &[("genre", &genre)])
            .await?;
        let logline = self
            .choose(
                premise.logline,
                Choice::Logline,
                &[("genre", &genre), ("concept", &concept)],
            )
            .await?;
        let theme = self
            .choose(
                premise.theme,
                Choice::Theme,
                &[("genre", &genre), ("concept", &concept), ("logline", &logline)],
            )
            .await?;

        let premise_vars = [
            ("genre", genre.as_str()),
            ("concept", concept.as_str()),
            ("theme", theme.as_str()),
            ("logline", logline.as_str()),
        ];
        let expanded = self
            .client
            .complete(&self.system, &fill_template(EXPAND_PROMPT, &premise_vars))
            .await?
            .content
            .trim()
            .to_owned();
        let expanded = if expanded.is_empty() {
            logline.clone()
        } else {
            expanded
        };

        let mut acts = self.acts(&expanded).await?;
        let protagonists = self
            .cast("protagonists", PROTAGONISTS_REQUEST, &premise_vars)
            .await?;
        let antagonists = self
            .cast("antagonists", ANTAGONISTS_REQUEST, &premise_vars)
            .await?;

        let cast = cast_names(&[protagonists.as_slice(), antagonists.as_slice()]);
        for (idx, act) in acts.iter_mut().enumerate() {
            act.chapters = self.chapters(act, idx + 1, &logline, &cast, shape).await?;
        }

        Ok(StoryPlan {
            genre,
            concept,
            logline,
            theme,
            expanded_logline: expanded,
            protagonists,
            antagonists,
            acts,
        })
    }
}

fn ensure_category(doc: &mut Document, name: &str) -> anyhow::Result<()> {
    if !doc.book().codex.categories.iter().any(|c| c == name) {
        doc.add_category(name)?;
    }
    Ok(())
}

fn character_description(character: &Character) -> String {
    let transformation = character.transformation.trim();
    if transformation.is_empty() {
        character.description.trim().to_owned()
    } else {
        format!("{}\n\nTransformation: {transformation}", character.description.trim())
    }
}

/// Writes the plan into the book: acts, chapters and sections after any
/// existing ones, the premise and every act in the plot category, the cast
/// in the character category.
pub fn apply_plan(doc: &mut Document, plan: &StoryPlan) -> anyhow::Result<Vec<ActId>> {
    ensure_category(doc, PLOT_CATEGORY)?;
    ensure_category(doc, CHARACTER_CATEGORY)?;

    doc.add_codex_entry(NewEntry {
        name: "Premise".to_owned(),
        category: PLOT_CATEGORY.to_owned(),
        description: format!(
            "{}\n\nConcept: {}\n\n{}",
            plan.logline, plan.concept, plan.expanded_logline
        ),
        tags: vec![plan.genre.clone(), plan.theme.clone()],
    })?;
    for (role, cast) in [
        ("protagonist", &plan.protagonists),
        ("antagonist", &plan.antagonists),
    ] {
        for character in cast {
            doc.add_codex_entry(NewEntry {
                name: character.name.trim().to_owned(),
                category: CHARACTER_CATEGORY.to_owned(),
                description: character_description(character),
                tags: vec![role.to_owned()],
            })?;
        }
    }

    let mut acts = Vec::with_capacity(plan.acts.len());
    for act in &plan.acts {
        let act_id = doc.add_act(&act.title)?;
        doc.add_codex_entry(NewEntry {
            name: act.title.clone(),
            category: PLOT_CATEGORY.to_owned(),
            description: format!("{}\n\nDisaster point: {}", act.description, act.disaster),
            tags: vec!["act".to_owned()],
        })?;
        for chapter in &act.chapters {
            let chapter_id = doc
                .add_chapter(act_id, &chapter.title)?
                .ok_or_else(|| anyhow::anyhow!("act {act_id} vanished while outlining"))?;
            for section in &chapter.sections {
                doc.add_section(act_id, chapter_id, &section.title, &section.summary)?;
            }
        }
        acts.push(act_id);
    }
    Ok(acts)
}

pub async fn run(
    book_args: &BookArgs,
    options: &LlmOptions,
    args: LlmOutlineArgs,
) -> anyhow::Result<()> {
    let mut doc = edit::open_document(book_args)?.with_policy(SavePolicy::Deferred);
    if !args.dry_run && !args.append && !doc.book().acts.is_empty() {
        anyhow::bail!(
            "book already has {} acts (use --append to add the outline after them)",
            doc.book().acts.len()
        );
    }

    let client = ChatClient::new(LlmConfig::load(options.llm_config.as_deref())?)?;
    let language = doc.book().language.clone();
    let premise = Premise {
        genre: args.genre,
        concept: args.concept,
        logline: args.logline,
        theme: args.theme,
    };
    let shape = OutlineShape {
        chapters_per_act: args.chapters_per_act,
        sections_per_chapter: args.sections_per_chapter,
    };
    let plan = StoryGenerator::new(&client, &language)
        .plan(premise, shape)
        .await?;

    if args.dry_run {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    let acts = apply_plan(&mut doc, &plan)?;
    doc.flush()?;
    tracing::info!(acts = acts.len(), location = %doc.location(), "outline written");
    print!("{}", outline::render_outline(doc.book(), None));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::Book;
    use crate::store::memory::MemoryStore;

    #[test]
    fn fallback_prefers_sentences_that_name_a_disaster() {
        let acts = fallback_acts(
            "Mira lands on the moon. The reactor fails and the colony goes dark! \
             She learns the truth about the warden and decides to stay. A betrayal splits the crew.",
        );
        assert_eq!(acts.len(), 3);
        assert_eq!(acts[0].disaster, "The reactor fails and the colony goes dark!");
        assert_eq!(acts[1].disaster, "A betrayal splits the crew.");
        assert_eq!(
            acts[2].disaster,
            "She learns the truth about the warden and decides to stay."
        );
        assert_eq!(acts[2].title, "Resolution");

        let short = fallback_acts("Only one line");
        assert_eq!(short[0].disaster, "Only one line");
        assert_eq!(short[2].disaster, FALLBACK_TURN);
    }

    #[test]
    fn lists_are_found_under_their_key_or_the_first_array() {
        assert_eq!(
            string_list(&json!({ "genres": [" Noir ", "", "Space opera"] }), "genres"),
            vec!["Noir", "Space opera"]
        );
        assert_eq!(
            string_list(&json!({ "items": ["Noir"] }), "genres"),
            vec!["Noir"]
        );
        assert_eq!(string_list(&json!(["Noir"]), "genres"), vec!["Noir"]);
        assert!(string_list(&json!("Noir"), "genres").is_empty());

        let cast: Vec<Character> = typed_list(
            &json!({ "protagonists": [{ "nome": "Mira", "descricao": "Pilot" }, { "role": "x" }] }),
            "protagonists",
        );
        assert_eq!(cast.len(), 1);
        assert_eq!(cast[0].name, "Mira");
        assert_eq!(cast[0].description, "Pilot");
    }

    #[test]
    fn plan_is_written_as_acts_chapters_sections_and_codex_entries() -> anyhow::Result<()> {
        let mut doc = Document::new(Book::new("Saga", "en-US"), Box::new(MemoryStore::default()));
        doc.add_act("Prologue")?;
        assert_eq!(
            doc.remove_category(CHARACTER_CATEGORY, |_| true)?,
            crate::codex::CategoryRemoval::Removed
        );

        let plan = StoryPlan {
            genre: "Space opera".to_owned(),
            concept: "Memory as currency".to_owned(),
            logline: "A pilot sells her past to save a colony.".to_owned(),
            theme: "Identity".to_owned(),
            expanded_logline: "Long form.".to_owned(),
            protagonists: vec![Character {
                name: "Mira".to_owned(),
                description: "Pilot".to_owned(),
                transformation: "Learns to let go".to_owned(),
            }],
            antagonists: Vec::new(),
            acts: vec![PlannedAct {
                title: "Landfall".to_owned(),
                description: "The crew arrives.".to_owned(),
                disaster: "The ship burns.".to_owned(),
                chapters: vec![PlannedChapter {
                    title: "Arrival".to_owned(),
                    sections: vec![PlannedSection {
                        title: "Dawn".to_owned(),
                        summary: "The ship lands.".to_owned(),
                    }],
                }],
            }],
        };

        let acts = apply_plan(&mut doc, &plan)?;
        let book = doc.book();
        assert_eq!(acts.len(), 1);
        assert_eq!(book.acts.len(), 2);
        let act = &book.acts[1];
        assert_eq!(act.id, acts[0]);
        assert_eq!(act.title, "Landfall");
        assert_eq!(act.chapters[0].sections[0].summary, "The ship lands.");

        assert!(book.codex.categories.iter().any(|c| c == CHARACTER_CATEGORY));
        let mira = book
            .codex
            .entries
            .iter()
            .find(|e| e.name == "Mira")
            .expect("character entry");
        assert_eq!(mira.category, CHARACTER_CATEGORY);
        assert_eq!(mira.description, "Pilot\n\nTransformation: Learns to let go");
        assert_eq!(mira.tags, vec!["protagonist".to_owned()]);
        assert!(book.codex.entries.iter().any(|e| e.name == "Premise"));
        Ok(())
    }
}
