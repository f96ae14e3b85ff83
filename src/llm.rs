use std::fmt::Write as _;
use std::io::Write as _;

use anyhow::Context as _;

use crate::cli::{BookArgs, LlmActionArgs, LlmArgs, LlmCommand, LlmConfigArgs, LlmGenerateArgs};
use crate::config::LlmConfig;
use crate::document::{Document, SectionPatch};
use crate::edit;
use crate::formats::{ActId, Book, Chapter, ChapterId, Pov, Section, SectionId, SectionSettings};
use crate::openai::{ChatClient, LlmError};
use crate::prompts::{self, PromptAction, PromptLibrary, fill_template};
use crate::storygen;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionRef {
    pub act: ActId,
    pub chapter: ChapterId,
    pub section: SectionId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

struct Located<'a> {
    act_title: &'a str,
    chapter: &'a Chapter,
    index: usize,
    section: &'a Section,
}

fn locate(book: &Book, at: SectionRef) -> anyhow::Result<Located<'_>> {
    let act = book
        .acts
        .iter()
        .find(|a| a.id == at.act)
        .ok_or_else(|| anyhow::anyhow!("act not found: {}", at.act))?;
    let chapter = act
        .chapters
        .iter()
        .find(|c| c.id == at.chapter)
        .ok_or_else(|| anyhow::anyhow!("chapter not found: {}", at.chapter))?;
    let index = chapter
        .sections
        .iter()
        .position(|s| s.id == at.section)
        .ok_or_else(|| anyhow::anyhow!("section not found: {}", at.section))?;
    Ok(Located {
        act_title: &act.title,
        chapter,
        index,
        section: &chapter.sections[index],
    })
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.trim().is_empty() {
        placeholder
    } else {
        value
    }
}

fn section_label(section: &Section, index: usize) -> String {
    if section.title.trim().is_empty() {
        format!("Section {}", index + 1)
    } else {
        section.title.clone()
    }
}

/// Every act, chapter and section summary with its tags.
pub fn book_structure(book: &Book) -> String {
    if book.acts.is_empty() {
        return "Book structure not available.".to_owned();
    }
    let mut out = String::new();
    for (act_idx, act) in book.acts.iter().enumerate() {
        let _ = writeln!(out, "\n=== ACT {}: {} ===", act_idx + 1, act.title);
        for (chapter_idx, chapter) in act.chapters.iter().enumerate() {
            let _ = writeln!(out, "\n  CHAPTER {}: {}", chapter_idx + 1, chapter.title);
            for (idx, section) in chapter.sections.iter().enumerate() {
                let tags = if section.tags.is_empty() {
                    String::new()
                } else {
                    format!(" [Tags: {}]", section.tag_labels().join(", "))
                };
                let _ = writeln!(
                    out,
                    "    {}. {}: {}{tags}",
                    idx + 1,
                    section_label(section, idx),
                    or_placeholder(&section.summary, "No summary")
                );
            }
        }
    }
    out
}

/// Up to two sections on each side of `index`, with their text when it
/// exists.
pub fn adjacent_sections(chapter: &Chapter, index: usize) -> String {
    let mut out = String::new();

    for idx in index.saturating_sub(2)..index {
        let position = if index - idx == 2 {
            "PREVIOUS SECTION 2"
        } else {
            "PREVIOUS SECTION 1"
        };
        describe_neighbour(
            &mut out,
            chapter,
            idx,
            position,
            "(Text not yet generated - use only the summary)",
        );
    }

    out.push_str("\n--- CURRENT SECTION (TO BE GENERATED) ---\n");
    out.push_str("This is the section you should generate now.\n");

    let end = chapter.sections.len().min(index + 3);
    for idx in (index + 1)..end {
        let position = if idx - index == 1 {
            "NEXT SECTION 1"
        } else {
            "NEXT SECTION 2"
        };
        describe_neighbour(
            &mut out,
            chapter,
            idx,
            position,
            "(Text not yet generated - use the summary to prepare the transition)",
        );
    }
    out
}

fn describe_neighbour(out: &mut String, chapter: &Chapter, idx: usize, position: &str, missing: &str) {
    let section = &chapter.sections[idx];
    let _ = writeln!(out, "\n--- {position}: {} ---", section_label(section, idx));
    let _ = writeln!(out, "Summary: {}", or_placeholder(&section.summary, "No summary"));
    let text = html_to_text(&section.content);
    if text.is_empty() {
        let _ = writeln!(out, "{missing}");
    } else {
        let _ = writeln!(out, "Full text:\n{text}");
    }
}

const NOTE_KEYWORDS: [(&str, &[&str]); 6] = [
    ("TONE/ATMOSPHERE", &["tom", "tone", "mood", "atmosfera", "atmosphere"]),
    (
        "POINT OF VIEW",
        &[
            "pov",
            "ponto de vista",
            "point of view",
            "perspectiva",
            "narrador",
            "primeira pessoa",
            "terceira pessoa",
        ],
    ),
    (
        "WRITING STYLE",
        &["estilo", "style", "writing style", "forma de escrita", "linguagem"],
    ),
    (
        "NARRATIVE PACE",
        &["ritmo", "pace", "velocidade", "lento", "rápido", "slow", "fast"],
    ),
    (
        "EMOTION/TENSION",
        &["emoção", "emotion", "sentimento", "feeling", "tensão", "tension"],
    ),
    (
        "DESCRIPTION",
        &["descrição", "description", "detalhes", "details", "visual", "sensorial"],
    ),
];

/// One bullet per note, labelled by the first keyword group it mentions.
pub fn special_instructions(notes: &[String]) -> String {
    notes
        .iter()
        .map(|note| note.trim())
        .filter(|note| !note.is_empty())
        .map(|note| {
            let lower = note.to_lowercase();
            let label = NOTE_KEYWORDS
                .iter()
                .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
                .map(|(label, _)| *label);
            match label {
                Some(label) => format!("• {label}: {note}"),
                None => format!("• {note}"),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn scene_settings(settings: &SectionSettings) -> String {
    let mut out = format!(
        "\n\nSCENE SETTINGS:\n- Point of View: Write in {}",
        settings.pov.phrase()
    );
    let narrator = settings.narrator.trim();
    if !narrator.is_empty() {
        let _ = write!(out, "\n- Narrator/Character: {narrator}");
    }
    out
}

fn author_notes(notes: &[String]) -> String {
    let notes = notes
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .enumerate()
        .map(|(i, n)| format!("{}. {n}", i + 1))
        .collect::<Vec<_>>();
    if notes.is_empty() {
        String::new()
    } else {
        format!("\nAuthor Notes:\n{}\n", notes.join("\n"))
    }
}

pub fn generation_prompt(
    book: &Book,
    at: SectionRef,
    library: &PromptLibrary,
) -> anyhow::Result<PromptPair> {
    let located = locate(book, at)?;
    let section = located.section;

    let instructions = special_instructions(&section.notes);
    let instructions = if instructions.is_empty() {
        instructions
    } else {
        format!("\n\nSPECIAL INSTRUCTIONS FOR THIS SECTION:\n{instructions}")
    };
    let tags = if section.tags.is_empty() {
        "No tags".to_owned()
    } else {
        section.tag_labels().join(", ")
    };

    let structure = book_structure(book);
    let adjacent = adjacent_sections(located.chapter, located.index);
    let settings = scene_settings(&section.settings);
    let notes = author_notes(&section.notes);
    let vars = [
        ("bookStructure", structure.as_str()),
        ("adjacentSections", adjacent.as_str()),
        ("specialInstructions", instructions.as_str()),
        ("sceneSettings", settings.as_str()),
        ("bookTitle", or_placeholder(&book.title, "Untitled Book")),
        ("actTitle", located.act_title),
        ("chapterTitle", or_placeholder(&located.chapter.title, "Unknown Chapter")),
        ("sectionTitle", section.title.as_str()),
        ("summary", or_placeholder(&section.summary, "No summary provided")),
        ("tags", tags.as_str()),
        ("authorNotes", notes.as_str()),
    ];

    let template = library.get(PromptAction::Generate);
    Ok(PromptPair {
        system: fill_template(&template.system_prompt, &vars),
        user: fill_template(&template.user_prompt, &vars),
    })
}

/// Prompt for a text action over the section's current text. `target_pov`
/// only matters for `ChangePov` and defaults to the section's own setting.
pub fn action_prompt(
    book: &Book,
    at: SectionRef,
    library: &PromptLibrary,
    action: PromptAction,
    target_pov: Option<Pov>,
) -> anyhow::Result<PromptPair> {
    if action == PromptAction::Generate {
        return generation_prompt(book, at, library);
    }
    let section = locate(book, at)?.section;
    let text = html2md::parse_html(&section.content);
    if text.trim().is_empty() {
        anyhow::bail!("section {} has no text to {}", at.section, action.key());
    }
    let pov = target_pov.unwrap_or(section.settings.pov);

    let template = library.get(action);
    let vars = [("text", text.trim()), ("targetPOV", pov.phrase())];
    Ok(PromptPair {
        system: fill_template(&template.system_prompt, &vars),
        user: fill_template(&template.user_prompt, &vars),
    })
}

/// Plain model output → HTML paragraphs. Blank lines separate paragraphs,
/// single newlines become `<br>`.
pub fn format_text_content(text: &str) -> String {
    let mut paragraphs: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.trim().lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line.trim());
        }
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }

    paragraphs
        .into_iter()
        .map(|lines| format!("<p>{}</p>", lines.join("<br>")))
        .collect()
}

/// Section HTML as a single line of text, entities decoded.
pub fn html_to_text(html: &str) -> String {
    html2md::parse_html(html)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn word_count(html: &str) -> usize {
    html_to_text(html).split_whitespace().count()
}

async fn call(
    client: &ChatClient,
    prompt: &PromptPair,
    stream: bool,
    on_chunk: impl FnMut(&str, &str) -> anyhow::Result<()>,
) -> anyhow::Result<String> {
    let text = if stream {
        client
            .complete_stream(&prompt.system, &prompt.user, on_chunk)
            .await?
    } else {
        client.complete(&prompt.system, &prompt.user).await?.content
    };
    if text.trim().is_empty() {
        return Err(LlmError::EmptyResponse.into());
    }
    Ok(text)
}

/// Drafts the section from its context and writes the result as HTML. The
/// section is only touched once the whole response has arrived.
pub async fn generate_section(
    doc: &mut Document,
    client: &ChatClient,
    library: &PromptLibrary,
    at: SectionRef,
    stream: bool,
    on_chunk: impl FnMut(&str, &str) -> anyhow::Result<()>,
) -> anyhow::Result<String> {
    let prompt = generation_prompt(doc.book(), at, library)?;
    tracing::info!(act = %at.act, chapter = %at.chapter, section = %at.section, stream, "generate section");

    let text = call(client, &prompt, stream, on_chunk)
        .await
        .context("generate section text")?;
    let html = format_text_content(&text);
    doc.update_section(
        at.act,
        at.chapter,
        at.section,
        SectionPatch {
            content: Some(html.clone()),
            ..SectionPatch::default()
        },
    )?;
    tracing::info!(words = word_count(&html), "section generated");
    Ok(html)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ActionOptions {
    pub target_pov: Option<Pov>,
    pub stream: bool,
    /// Write the result back: a summary into the section summary, anything
    /// else into the section content.
    pub apply: bool,
}

pub async fn run_action(
    doc: &mut Document,
    client: &ChatClient,
    library: &PromptLibrary,
    action: PromptAction,
    at: SectionRef,
    options: ActionOptions,
    on_chunk: impl FnMut(&str, &str) -> anyhow::Result<()>,
) -> anyhow::Result<String> {
    if action == PromptAction::Generate {
        return generate_section(doc, client, library, at, options.stream, on_chunk).await;
    }

    let prompt = action_prompt(doc.book(), at, library, action, options.target_pov)?;
    tracing::info!(action = action.key(), section = %at.section, "llm action");
    let text = call(client, &prompt, options.stream, on_chunk)
        .await
        .with_context(|| format!("llm action {}", action.key()))?;

    if options.apply {
        let patch = if action == PromptAction::Summarize {
            SectionPatch {
                summary: Some(text.trim().to_owned()),
                ..SectionPatch::default()
            }
        } else {
            SectionPatch {
                content: Some(format_text_content(&text)),
                ..SectionPatch::default()
            }
        };
        doc.update_section(at.act, at.chapter, at.section, patch)?;
    }
    Ok(text)
}

fn print_chunk(delta: &str, _accumulated: &str) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(delta.as_bytes()).context("write stream to stdout")?;
    stdout.flush().context("flush stdout")?;
    Ok(())
}

pub async fn run(book_args: &BookArgs, args: LlmArgs) -> anyhow::Result<()> {
    match args.command {
        LlmCommand::Models => {
            let config = LlmConfig::load(args.llm.llm_config.as_deref())?;
            let client = ChatClient::new(config)?;
            for model in client.list_models().await.context("list models")? {
                println!("{}\t{}", model.id, model.owned_by);
            }
        }
        LlmCommand::Config(config_args) => configure(&args.llm, config_args)?,
        LlmCommand::Generate(generate) => generate_cmd(book_args, &args.llm, generate).await?,
        LlmCommand::Action(action) => action_cmd(book_args, &args.llm, action).await?,
        LlmCommand::Outline(outline) => storygen::run(book_args, &args.llm, outline).await?,
    }
    Ok(())
}

fn configure(options: &crate::cli::LlmOptions, args: LlmConfigArgs) -> anyhow::Result<()> {
    let path = options.llm_config.as_deref();
    let mut config = match path {
        Some(path) => LlmConfig::read_file(path)?.unwrap_or_default(),
        None => LlmConfig::default(),
    };

    let changed = args.api_url.is_some()
        || args.api_key.is_some()
        || args.model.is_some()
        || args.temperature.is_some()
        || args.max_tokens.is_some();
    if let Some(api_url) = args.api_url {
        config.api_url = api_url;
    }
    if let Some(api_key) = args.api_key {
        config.api_key = api_key;
    }
    if let Some(model) = args.model {
        config.model = model;
    }
    if let Some(temperature) = args.temperature {
        config.temperature = temperature;
    }
    if let Some(max_tokens) = args.max_tokens {
        config.max_tokens = max_tokens;
    }

    if changed {
        let Some(path) = path else {
            anyhow::bail!("missing --llm-config (file to store LLM settings)");
        };
        config.save(path)?;
        tracing::info!(path = %path.display(), "llm config saved");
    }

    config.apply_env(|key| std::env::var(key).ok());
    println!("apiUrl\t{}", config.api_url);
    println!("apiKey\t{}", config.masked_key());
    println!("model\t{}", config.model);
    println!("temperature\t{}", config.temperature);
    println!("maxTokens\t{}", config.max_tokens);
    let missing = config.missing_fields();
    if !missing.is_empty() {
        println!("missing\t{}", missing.join(", "));
    }
    Ok(())
}

async fn generate_cmd(
    book_args: &BookArgs,
    options: &crate::cli::LlmOptions,
    args: LlmGenerateArgs,
) -> anyhow::Result<()> {
    let mut doc = edit::open_document(book_args)?;
    let library = prompts::load_library(options, &doc.book().language)?;
    let at = SectionRef {
        act: args.act,
        chapter: args.chapter,
        section: args.section,
    };

    if args.print_prompt {
        let prompt = generation_prompt(doc.book(), at, &library)?;
        println!("{}\n\n{}", prompt.system, prompt.user);
        return Ok(());
    }

    let client = ChatClient::new(LlmConfig::load(options.llm_config.as_deref())?)?;
    let html = generate_section(&mut doc, &client, &library, at, args.stream, print_chunk).await?;
    if args.stream {
        println!();
    } else {
        println!("{html}");
    }
    Ok(())
}

async fn action_cmd(
    book_args: &BookArgs,
    options: &crate::cli::LlmOptions,
    args: LlmActionArgs,
) -> anyhow::Result<()> {
    let mut doc = edit::open_document(book_args)?;
    let library = prompts::load_library(options, &doc.book().language)?;
    let at = SectionRef {
        act: args.act,
        chapter: args.chapter,
        section: args.section,
    };

    if args.print_prompt {
        let prompt = action_prompt(doc.book(), at, &library, args.action, args.pov)?;
        println!("{}\n\n{}", prompt.system, prompt.user);
        return Ok(());
    }

    let client = ChatClient::new(LlmConfig::load(options.llm_config.as_deref())?)?;
    let action_options = ActionOptions {
        target_pov: args.pov,
        stream: args.stream,
        apply: args.apply,
    };
    let text = run_action(
        &mut doc,
        &client,
        &library,
        args.action,
        at,
        action_options,
        print_chunk,
    )
    .await?;
    if args.stream {
        println!();
    } else {
        println!("{}", text.trim());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::{Act, Tag};

    fn chapter_with(sections: &[(&str, &str, &str)]) -> Chapter {
        let mut chapter = Chapter::new(ChapterId(1), "Landing");
        chapter.sections = sections
            .iter()
            .enumerate()
            .map(|(i, (title, summary, content))| {
                let mut section = Section::new(SectionId(i as u32 + 1), *title);
                section.summary = (*summary).to_owned();
                section.content = (*content).to_owned();
                section
            })
            .collect();
        chapter
    }

    #[test]
    fn adjacent_context_covers_two_on_each_side() {
        let chapter = chapter_with(&[
            ("A", "a", "<p>Alpha text</p>"),
            ("B", "b", ""),
            ("C", "c", ""),
            ("D", "", ""),
            ("E", "e", ""),
            ("F", "f", ""),
        ]);
        let context = adjacent_sections(&chapter, 2);

        assert!(context.contains("--- PREVIOUS SECTION 2: A ---\nSummary: a\nFull text:\nAlpha text\n"));
        assert!(context.contains("--- PREVIOUS SECTION 1: B ---"));
        assert!(context.contains("(Text not yet generated - use only the summary)"));
        assert!(context.contains("--- CURRENT SECTION (TO BE GENERATED) ---"));
        assert!(context.contains("--- NEXT SECTION 1: D ---\nSummary: No summary\n"));
        assert!(context.contains("--- NEXT SECTION 2: E ---"));
        assert!(!context.contains(": F ---"));
    }

    #[test]
    fn neighbour_text_has_entities_decoded() {
        let chapter = chapter_with(&[
            ("A", "a", "<p>Tom &amp; Jerry said &quot;hi&quot;</p><p>Then&nbsp;left.</p>"),
            ("B", "b", ""),
        ]);
        let context = adjacent_sections(&chapter, 1);
        assert!(context.contains("Full text:\nTom & Jerry said \"hi\" Then left.\n"));
        assert!(!context.contains("&amp;"));
        assert!(!context.contains("&quot;"));
    }

    #[test]
    fn notes_are_classified_by_first_matching_keyword_group() {
        let notes = vec![
            "Dark mood, slow pace".to_owned(),
            "  ".to_owned(),
            "Ritmo rápido".to_owned(),
            "Mention the ring".to_owned(),
        ];
        assert_eq!(
            special_instructions(&notes),
            "• TONE/ATMOSPHERE: Dark mood, slow pace\n• NARRATIVE PACE: Ritmo rápido\n• Mention the ring"
        );
    }

    #[test]
    fn generation_prompt_fills_every_context_block() -> anyhow::Result<()> {
        let mut chapter = chapter_with(&[("Arrival", "The ship lands", "")]);
        let section = &mut chapter.sections[0];
        section.tags = vec![Tag::free("Mira"), Tag::free("night")];
        section.notes = vec!["tone: eerie".to_owned()];
        section.settings = SectionSettings {
            pov: Pov::FirstPerson,
            narrator: "Mira".to_owned(),
        };
        let mut book = Book::new("Saga", "en-US");
        book.acts.push(Act {
            id: ActId(1),
            title: "Beginning".to_owned(),
            chapters: vec![chapter],
        });

        let at = SectionRef {
            act: ActId(1),
            chapter: ChapterId(1),
            section: SectionId(1),
        };
        let prompt = generation_prompt(&book, at, &PromptLibrary::builtin())?;

        assert!(prompt.system.contains("=== ACT 1: Beginning ==="));
        assert!(prompt.system.contains("1. Arrival: The ship lands [Tags: Mira, night]"));
        assert!(prompt.system.contains("SPECIAL INSTRUCTIONS FOR THIS SECTION:\n• TONE/ATMOSPHERE: tone: eerie"));
        assert!(prompt.system.contains("- Point of View: Write in first person (I/we)\n- Narrator/Character: Mira"));
        assert!(prompt.user.contains("BOOK: Saga\nACT: Beginning\nCHAPTER: Landing"));
        assert!(prompt.user.contains("Tags/Themes: Mira, night\n\nAuthor Notes:\n1. tone: eerie\n"));
        assert!(!prompt.user.contains('{'));

        let missing = SectionRef {
            section: SectionId(9),
            ..at
        };
        assert!(generation_prompt(&book, missing, &PromptLibrary::builtin()).is_err());
        Ok(())
    }

    #[test]
    fn text_content_becomes_paragraphs_with_line_breaks() {
        assert_eq!(
            format_text_content("  First line\nsecond line\n\n\n  Next para \n"),
            "<p>First line<br>second line</p><p>Next para</p>"
        );
        assert_eq!(format_text_content("   "), "");
    }

    #[test]
    fn word_count_ignores_markup_and_entities() {
        assert_eq!(word_count("<p>One&nbsp;two</p><p>three <b>four</b></p>"), 4);
        assert_eq!(word_count("<p>Tom &amp; Jerry</p>"), 3);
        assert_eq!(word_count(""), 0);
    }
}
