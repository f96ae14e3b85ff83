//! Prompt templates for the LLM actions.
//!
//! Every action has a system and a user template with `{variable}`
//! placeholders. The base set is either built in or read from a language
//! pack (`prompts-<lang>.json`); user overrides live in a YAML file and win
//! over the base set until reset.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::cli::{LlmOptions, PromptsArgs, PromptsCommand};
use crate::formats::DEFAULT_LANGUAGE;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
pub enum PromptAction {
    #[serde(rename = "generate")]
    Generate,
    #[serde(rename = "summarize")]
    Summarize,
    #[serde(rename = "expand")]
    Expand,
    #[serde(rename = "rewrite")]
    Rewrite,
    #[serde(rename = "changePOV")]
    ChangePov,
    #[serde(rename = "continueStory")]
    ContinueStory,
    #[serde(rename = "addDialogue")]
    AddDialogue,
    #[serde(rename = "improveDescription")]
    ImproveDescription,
}

impl PromptAction {
    pub const ALL: [PromptAction; 8] = [
        PromptAction::Generate,
        PromptAction::Summarize,
        PromptAction::Expand,
        PromptAction::Rewrite,
        PromptAction::ChangePov,
        PromptAction::ContinueStory,
        PromptAction::AddDialogue,
        PromptAction::ImproveDescription,
    ];

    /// Key used in prompt files.
    pub fn key(self) -> &'static str {
        match self {
            PromptAction::Generate => "generate",
            PromptAction::Summarize => "summarize",
            PromptAction::Expand => "expand",
            PromptAction::Rewrite => "rewrite",
            PromptAction::ChangePov => "changePOV",
            PromptAction::ContinueStory => "continueStory",
            PromptAction::AddDialogue => "addDialogue",
            PromptAction::ImproveDescription => "improveDescription",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptTemplate {
    pub name: String,
    pub system_prompt: String,
    pub user_prompt: String,
}

impl PromptTemplate {
    fn new(name: &str, system_prompt: &str, user_prompt: &str) -> Self {
        Self {
            name: name.to_owned(),
            system_prompt: system_prompt.to_owned(),
            user_prompt: user_prompt.to_owned(),
        }
    }

    /// `system\n\nuser`, the single-string form used for editing.
    pub fn combined(&self) -> String {
        format!("{}\n\n{}", self.system_prompt, self.user_prompt)
    }
}

/// Replaces `{name}` for every supplied variable in one left-to-right pass,
/// so substituted text is never scanned again. Placeholders without a value
/// are left as they are.
pub fn fill_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut filled = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        filled.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let resolved = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(var, _)| *var == name)
                .map(|(_, value)| (*value, close))
        });
        match resolved {
            Some((value, close)) => {
                filled.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                filled.push('{');
                rest = after;
            }
        }
    }
    filled.push_str(rest);
    filled
}

/// `pt*` → `pt-BR`, `en*` → `en-US`; anything else passes through and an
/// empty code means the default language.
pub fn normalize_language_code(code: &str) -> String {
    let code = code.trim();
    if code.is_empty() {
        return DEFAULT_LANGUAGE.to_owned();
    }
    let normalized = code.to_lowercase().replace('_', "-");
    if normalized.starts_with("pt") {
        "pt-BR".to_owned()
    } else if normalized.starts_with("en") {
        "en-US".to_owned()
    } else {
        code.to_owned()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguagePack {
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub prompts: BTreeMap<PromptAction, PromptTemplate>,
}

#[derive(Debug, Clone)]
pub struct PromptLibrary {
    base: BTreeMap<PromptAction, PromptTemplate>,
    overrides: BTreeMap<PromptAction, PromptTemplate>,
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptLibrary {
    pub fn builtin() -> Self {
        Self {
            base: PromptAction::ALL
                .into_iter()
                .map(|action| (action, builtin(action)))
                .collect(),
            overrides: BTreeMap::new(),
        }
    }

    /// Base set from `<dir>/prompts-<lang>.json`, falling back to the
    /// default language's pack and then to the built-in prompts. Actions a
    /// pack leaves out keep their built-in template.
    pub fn from_language_pack(dir: &Path, language: &str) -> anyhow::Result<Self> {
        let mut library = Self::builtin();
        let wanted = normalize_language_code(language);
        let mut candidates = vec![wanted.clone()];
        if wanted != DEFAULT_LANGUAGE {
            candidates.push(DEFAULT_LANGUAGE.to_owned());
        }

        for lang in candidates {
            let path = dir.join(format!("prompts-{lang}.json"));
            let raw = match std::fs::read_to_string(&path) {
                Ok(raw) => raw,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    tracing::warn!(language = %lang, path = %path.display(), "prompt pack not found");
                    continue;
                }
                Err(err) => {
                    return Err(anyhow::Error::new(err)
                        .context(format!("read prompt pack: {}", path.display())));
                }
            };
            let pack: LanguagePack = serde_json::from_str(&raw)
                .with_context(|| format!("parse prompt pack: {}", path.display()))?;
            tracing::info!(language = %lang, prompts = pack.prompts.len(), "loaded prompt pack");
            library.base.extend(pack.prompts);
            return Ok(library);
        }

        Ok(library)
    }

    /// Applies overrides from a YAML file. A missing file means none.
    pub fn load_overrides(&mut self, path: &Path) -> anyhow::Result<()> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => {
                return Err(anyhow::Error::new(err)
                    .context(format!("read prompt overrides: {}", path.display())));
            }
        };
        let overrides: BTreeMap<PromptAction, PromptTemplate> = serde_yaml::from_str(&raw)
            .with_context(|| format!("parse prompt overrides: {}", path.display()))?;
        self.overrides = overrides;
        Ok(())
    }

    pub fn save_overrides(&self, path: &Path) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(&self.overrides).context("serialize prompt overrides")?;
        crate::store::write_atomic(path, yaml.as_bytes())
            .with_context(|| format!("write prompt overrides: {}", path.display()))
    }

    pub fn get(&self, action: PromptAction) -> PromptTemplate {
        self.overrides
            .get(&action)
            .or_else(|| self.base.get(&action))
            .cloned()
            .unwrap_or_else(|| builtin(action))
    }

    pub fn is_custom(&self, action: PromptAction) -> bool {
        self.overrides.contains_key(&action)
    }

    /// Replaces the templates of `action` from the single-string form: the
    /// text before the first blank line is the system prompt. Without a
    /// blank line the whole text becomes the user prompt.
    pub fn set(&mut self, action: PromptAction, combined: &str) {
        let mut template = self.get(action);
        match combined.split_once("\n\n") {
            Some((system, user)) => {
                template.system_prompt = system.to_owned();
                template.user_prompt = user.to_owned();
            }
            None => template.user_prompt = combined.to_owned(),
        }
        self.overrides.insert(action, template);
    }

    pub fn reset(&mut self, action: PromptAction) -> bool {
        self.overrides.remove(&action).is_some()
    }
}

/// Base library for `language`, with overrides applied.
pub fn load_library(options: &LlmOptions, language: &str) -> anyhow::Result<PromptLibrary> {
    let mut library = match options.prompt_packs.as_deref() {
        Some(dir) => PromptLibrary::from_language_pack(dir, language)?,
        None => PromptLibrary::builtin(),
    };
    if let Some(path) = options.prompts.as_deref() {
        library.load_overrides(path)?;
    }
    Ok(library)
}

pub fn run(args: PromptsArgs) -> anyhow::Result<()> {
    let language = args.language.as_deref().unwrap_or(DEFAULT_LANGUAGE);
    let mut library = load_library(&args.llm, language)?;

    match args.command {
        PromptsCommand::List => {
            for action in PromptAction::ALL {
                let template = library.get(action);
                let marker = if library.is_custom(action) { " (custom)" } else { "" };
                println!("{}\t{}{marker}", action.key(), template.name);
            }
        }
        PromptsCommand::Show { action } => {
            println!("{}", library.get(action).combined());
        }
        PromptsCommand::Set {
            action,
            template,
            template_file,
        } => {
            let combined = match (template, template_file) {
                (Some(template), _) => template,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("read template: {}", path.display()))?,
                (None, None) => anyhow::bail!("missing --template or --template-file"),
            };
            library.set(action, &combined);
            save(&library, &args.llm)?;
            tracing::info!(action = action.key(), "prompt updated");
        }
        PromptsCommand::Reset { action } => {
            if library.reset(action) {
                save(&library, &args.llm)?;
                tracing::info!(action = action.key(), "prompt reset");
            } else {
                tracing::info!(action = action.key(), "prompt already at default");
            }
        }
    }
    Ok(())
}

fn save(library: &PromptLibrary, options: &LlmOptions) -> anyhow::Result<()> {
    let Some(path) = options.prompts.as_deref() else {
        anyhow::bail!("missing --prompts (file to store prompt overrides)");
    };
    library.save_overrides(path)
}

const GENERATE_SYSTEM: &str = "You are a creative writer specialized in engaging and coherent narratives.

COMPLETE BOOK CONTEXT:
{bookStructure}

ADJACENT SECTIONS CONTEXT:
{adjacentSections}

IMPORTANT INSTRUCTIONS:
1. Maintain logical and narrative continuity between sections
2. If there is text from previous sections, ensure the transition is natural and fluid
3. If there is text from following sections, prepare an appropriate transition that connects to them
4. Respect the events and developments established in the summaries of all sections
5. Maintain consistency of characters, tone, and narrative style
6. Use the summaries as a guide to ensure the narrative flows logically through the book{specialInstructions}{sceneSettings}";

const GENERATE_USER: &str = "Based on the complete context provided, generate the detailed narrative text for the following section:

BOOK: {bookTitle}
ACT: {actTitle}
CHAPTER: {chapterTitle}

CURRENT SECTION:
Summary: {summary}
Tags/Themes: {tags}
{authorNotes}
ATTENTION:
- Ensure the generated text connects naturally with previous sections (if provided)
- Set the stage for following sections (if provided)
- Remain faithful to the current section's summary
- Preserve narrative continuity and temporal logic
- Use an engaging and detailed style

Generate the complete text for this section now:";

fn builtin(action: PromptAction) -> PromptTemplate {
    match action {
        PromptAction::Generate => {
            PromptTemplate::new("Generate Section Text", GENERATE_SYSTEM, GENERATE_USER)
        }
        PromptAction::Summarize => PromptTemplate::new(
            "Summarize Text",
            "You are an assistant who creates concise and informative summaries.",
            "Create a concise summary of the following text, capturing the main points:\n\n{text}\n\nCreate a summary in a single paragraph.",
        ),
        PromptAction::Expand => PromptTemplate::new(
            "Expand Text",
            "You are a creative writer who adds details and depth to narratives.",
            "Expand the following text, adding more details, descriptions, and development:\n\n{text}\n\nMaintain the original style and tone, but make the narrative richer and more detailed.",
        ),
        PromptAction::Rewrite => PromptTemplate::new(
            "Rewrite Text",
            "You are an experienced editor who improves writing quality.",
            "Rewrite the following text improving clarity, flow, and narrative impact:\n\n{text}\n\nKeep the same information and tone, but improve the writing quality.",
        ),
        PromptAction::ChangePov => PromptTemplate::new(
            "Change Point of View",
            "You are an expert in narrative and literary points of view.",
            "Rewrite the following text changing the point of view to: {targetPOV}\n\nOriginal text:\n{text}\n\nKeep the content and events, but adapt the narrative perspective.",
        ),
        PromptAction::ContinueStory => PromptTemplate::new(
            "Continue Story",
            "You are a creative writer who naturally continues narratives.",
            "Continue the following story in a natural and engaging way:\n\n{text}\n\nWrite the next paragraph or section, maintaining the style and tone.",
        ),
        PromptAction::AddDialogue => PromptTemplate::new(
            "Add Dialogue",
            "You are an expert at writing natural and engaging dialogue.",
            "Add natural dialogue to the following narrative text:\n\n{text}\n\nInsert dialogues between characters that are relevant and natural to the context.",
        ),
        PromptAction::ImproveDescription => PromptTemplate::new(
            "Improve Descriptions",
            "You are an expert at creating vivid and sensory descriptions.",
            "Improve the descriptions in the following text, adding more sensory details:\n\n{text}\nAdd more vivid descriptions of settings, characters, and environments.",
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_template_replaces_known_variables_only() {
        let filled = fill_template(
            "Rewrite in {targetPOV}:\n{text}\n{unknown}",
            &[("text", "Once."), ("targetPOV", "first person")],
        );
        assert_eq!(filled, "Rewrite in first person:\nOnce.\n{unknown}");
    }

    #[test]
    fn substituted_text_is_not_filled_again() {
        let filled = fill_template(
            "Summary: {summary}\nTags: {tags}",
            &[("summary", "The sign reads {tags}"), ("tags", "No tags")],
        );
        assert_eq!(filled, "Summary: The sign reads {tags}\nTags: No tags");

        assert_eq!(
            fill_template("{{text}} {text", &[("text", "x")]),
            "{x} {text"
        );
    }

    #[test]
    fn language_codes_normalise_to_supported_packs() {
        assert_eq!(normalize_language_code("pt_PT"), "pt-BR");
        assert_eq!(normalize_language_code("EN"), "en-US");
        assert_eq!(normalize_language_code("fr-FR"), "fr-FR");
        assert_eq!(normalize_language_code(""), "pt-BR");
    }

    #[test]
    fn set_splits_on_the_first_blank_line_and_reset_restores() {
        let mut library = PromptLibrary::builtin();
        library.set(PromptAction::Rewrite, "Be terse.\n\nRewrite:\n\n{text}");
        let custom = library.get(PromptAction::Rewrite);
        assert_eq!(custom.system_prompt, "Be terse.");
        assert_eq!(custom.user_prompt, "Rewrite:\n\n{text}");
        assert_eq!(custom.name, "Rewrite Text");

        library.set(PromptAction::Expand, "Only user text");
        assert_eq!(library.get(PromptAction::Expand).user_prompt, "Only user text");

        assert!(library.reset(PromptAction::Rewrite));
        assert!(!library.reset(PromptAction::Rewrite));
        assert_eq!(library.get(PromptAction::Rewrite), builtin(PromptAction::Rewrite));
    }

    #[test]
    fn overrides_round_trip_through_yaml() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let path = temp.path().join("prompts.yaml");

        let mut library = PromptLibrary::builtin();
        library.set(PromptAction::ChangePov, "sys\n\nuser {text}");
        library.save_overrides(&path)?;
        assert!(std::fs::read_to_string(&path)?.contains("changePOV:"));

        let mut reloaded = PromptLibrary::builtin();
        reloaded.load_overrides(&path)?;
        assert!(reloaded.is_custom(PromptAction::ChangePov));
        assert_eq!(reloaded.get(PromptAction::ChangePov).system_prompt, "sys");
        Ok(())
    }

    #[test]
    fn language_pack_falls_back_to_default_language() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        std::fs::write(
            temp.path().join("prompts-pt-BR.json"),
            r#"{
                "metadata": { "version": "1.0" },
                "prompts": {
                    "summarize": { "name": "Resumir", "systemPrompt": "Resuma.", "userPrompt": "{text}" }
                }
            }"#,
        )?;

        let library = PromptLibrary::from_language_pack(temp.path(), "de-DE")?;
        assert_eq!(library.get(PromptAction::Summarize).name, "Resumir");
        assert_eq!(library.get(PromptAction::Expand), builtin(PromptAction::Expand));
        Ok(())
    }
}
