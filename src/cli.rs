use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::formats::{ActId, ChapterId, CodexEntryId, Pov, SectionId};
use crate::prompts::PromptAction;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(flatten)]
    pub book: BookArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct BookArgs {
    /// Book JSON file (desktop mode).
    #[arg(long, global = true, default_value = "book.json")]
    pub book: PathBuf,

    /// Keep the book in a local-storage directory instead of `--book`.
    #[arg(long, global = true)]
    pub storage_dir: Option<PathBuf>,

    /// Book loaded when the store holds none yet.
    #[arg(long, global = true)]
    pub bundled: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create an empty book.
    Init(InitArgs),
    /// Print the book outline.
    Show(ShowArgs),
    Act {
        #[command(subcommand)]
        command: ActCommand,
    },
    Chapter {
        #[command(subcommand)]
        command: ChapterCommand,
    },
    Section {
        #[command(subcommand)]
        command: SectionCommand,
    },
    Codex {
        #[command(subcommand)]
        command: CodexCommand,
    },
    /// Show only chapters with a section carrying every given tag.
    Filter(FilterArgs),
    /// Render the manuscript to Markdown.
    Export(ExportArgs),
    Llm(LlmArgs),
    Prompts(PromptsArgs),
    /// Serve the host-process channel on stdin/stdout.
    Ipc(IpcArgs),
}

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Book title (default: "Novo Livro").
    #[arg(long)]
    pub title: Option<String>,

    /// Book language (default: pt-BR).
    #[arg(long)]
    pub language: Option<String>,

    /// Overwrite an existing book.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Only show chapters matching every tag.
    #[arg(long)]
    pub tag: Vec<String>,

    /// Print the stored JSON instead of the outline.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Subcommand)]
pub enum ActCommand {
    Add {
        title: String,
    },
    Rename {
        #[arg(long)]
        act: ActId,
        title: String,
    },
    Delete {
        #[arg(long)]
        act: ActId,
    },
}

#[derive(Debug, Subcommand)]
pub enum ChapterCommand {
    Add {
        #[arg(long)]
        act: ActId,
        title: String,
    },
    Update {
        #[arg(long)]
        act: ActId,
        #[arg(long)]
        chapter: ChapterId,
        #[arg(long)]
        title: Option<String>,
        /// Whether the chapter takes part in chapter numbering.
        #[arg(long)]
        numbering: Option<bool>,
        /// Whether the chapter appears in the exported manuscript.
        #[arg(long)]
        visible_in_final: Option<bool>,
    },
    Delete {
        #[arg(long)]
        act: ActId,
        #[arg(long)]
        chapter: ChapterId,
    },
    /// Drag-and-drop move: drop `--chapter` onto `--target`.
    Move {
        #[arg(long)]
        chapter: ChapterId,
        #[arg(long)]
        target: ChapterId,
        /// Act holding the dragged chapter (default: looked up).
        #[arg(long)]
        from_act: Option<ActId>,
        /// Act holding the target (default: looked up).
        #[arg(long)]
        to_act: Option<ActId>,
    },
}

#[derive(Debug, Clone, Copy, Args)]
pub struct SectionPath {
    #[arg(long)]
    pub act: ActId,
    #[arg(long)]
    pub chapter: ChapterId,
    #[arg(long)]
    pub section: SectionId,
}

#[derive(Debug, Subcommand)]
pub enum SectionCommand {
    Add {
        #[arg(long)]
        act: ActId,
        #[arg(long)]
        chapter: ChapterId,
        title: String,
        #[arg(long, default_value = "")]
        summary: String,
    },
    Update {
        #[command(flatten)]
        at: SectionPath,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        summary: Option<String>,
        /// HTML content.
        #[arg(long, conflicts_with = "content_file")]
        content: Option<String>,
        #[arg(long)]
        content_file: Option<PathBuf>,
        #[arg(long, value_enum)]
        pov: Option<Pov>,
        #[arg(long)]
        narrator: Option<String>,
    },
    Delete {
        #[command(flatten)]
        at: SectionPath,
    },
    /// Append an author note.
    Note {
        #[command(flatten)]
        at: SectionPath,
        text: String,
    },
    /// Replace the section tags (none clears them).
    Tag {
        #[command(flatten)]
        at: SectionPath,
        tags: Vec<String>,
        /// Accept tags that are not in the codex vocabulary.
        #[arg(long)]
        allow_free_tags: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum CodexCommand {
    Category {
        #[command(subcommand)]
        command: CategoryCommand,
    },
    Entry {
        #[command(subcommand)]
        command: EntryCommand,
    },
    /// Print the tagging vocabulary.
    Vocabulary,
}

#[derive(Debug, Subcommand)]
pub enum CategoryCommand {
    Add {
        name: String,
    },
    Remove {
        name: String,
        /// Remove even when entries still use the category.
        #[arg(long)]
        yes: bool,
    },
    List,
}

#[derive(Debug, Subcommand)]
pub enum EntryCommand {
    Add {
        name: String,
        #[arg(long)]
        category: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        tag: Vec<String>,
    },
    Update {
        id: CodexEntryId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Replace the entry tags.
        #[arg(long)]
        tag: Vec<String>,
        #[arg(long, conflicts_with = "tag")]
        clear_tags: bool,
    },
    Delete {
        id: CodexEntryId,
    },
    List {
        #[arg(long)]
        category: Option<String>,
        /// Case-insensitive match on name or description.
        #[arg(long)]
        search: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct FilterArgs {
    #[arg(long)]
    pub tag: Vec<String>,

    /// Suggest vocabulary words containing this text instead.
    #[arg(long)]
    pub complete: Option<String>,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Output Markdown file (`-` for stdout).
    #[arg(long)]
    pub out: PathBuf,

    /// Overwrite existing output file.
    #[arg(long)]
    pub force: bool,

    /// Include chapters marked as not visible in the final book.
    #[arg(long)]
    pub include_hidden: bool,
}

#[derive(Debug, Clone, Args)]
pub struct LlmOptions {
    /// JSON file with apiUrl, apiKey, model, temperature, maxTokens.
    #[arg(long, global = true)]
    pub llm_config: Option<PathBuf>,

    /// YAML file with prompt overrides.
    #[arg(long, global = true)]
    pub prompts: Option<PathBuf>,

    /// Directory with `prompts-<lang>.json` language packs.
    #[arg(long, global = true)]
    pub prompt_packs: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct LlmArgs {
    #[command(flatten)]
    pub llm: LlmOptions,

    #[command(subcommand)]
    pub command: LlmCommand,
}

#[derive(Debug, Subcommand)]
pub enum LlmCommand {
    /// List the models offered by the API.
    Models,
    /// Show the effective settings, or store new ones.
    Config(LlmConfigArgs),
    /// Draft a section from its summary and surrounding context.
    Generate(LlmGenerateArgs),
    /// Run a text action on a section.
    Action(LlmActionArgs),
    /// Outline a whole book: premise, cast, three acts, chapters and sections.
    Outline(LlmOutlineArgs),
}

#[derive(Debug, Args)]
pub struct LlmConfigArgs {
    #[arg(long)]
    pub api_url: Option<String>,
    #[arg(long)]
    pub api_key: Option<String>,
    #[arg(long)]
    pub model: Option<String>,
    #[arg(long)]
    pub temperature: Option<f32>,
    #[arg(long)]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Args)]
pub struct LlmGenerateArgs {
    #[arg(long)]
    pub act: ActId,
    #[arg(long)]
    pub chapter: ChapterId,
    #[arg(long)]
    pub section: SectionId,

    /// Stream the response as it is produced.
    #[arg(long)]
    pub stream: bool,

    /// Print the prompt instead of calling the API.
    #[arg(long)]
    pub print_prompt: bool,
}

#[derive(Debug, Args)]
pub struct LlmActionArgs {
    #[arg(value_enum)]
    pub action: PromptAction,
    #[arg(long)]
    pub act: ActId,
    #[arg(long)]
    pub chapter: ChapterId,
    #[arg(long)]
    pub section: SectionId,

    /// Target point of view for `change-pov`.
    #[arg(long, value_enum)]
    pub pov: Option<Pov>,

    /// Write the result back into the section.
    #[arg(long)]
    pub apply: bool,

    #[arg(long)]
    pub stream: bool,

    #[arg(long)]
    pub print_prompt: bool,
}

#[derive(Debug, Args)]
pub struct LlmOutlineArgs {
    /// Use this genre instead of asking the model.
    #[arg(long)]
    pub genre: Option<String>,
    #[arg(long)]
    pub concept: Option<String>,
    #[arg(long)]
    pub logline: Option<String>,
    #[arg(long)]
    pub theme: Option<String>,

    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(1..=20))]
    pub chapters_per_act: u8,
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(1..=20))]
    pub sections_per_chapter: u8,

    /// Add the outline after existing acts instead of refusing a non-empty book.
    #[arg(long)]
    pub append: bool,

    /// Print the plan as JSON and leave the book untouched.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Args)]
pub struct PromptsArgs {
    #[command(flatten)]
    pub llm: LlmOptions,

    /// Language whose prompt pack is the base set.
    #[arg(long, global = true)]
    pub language: Option<String>,

    #[command(subcommand)]
    pub command: PromptsCommand,
}

#[derive(Debug, Subcommand)]
pub enum PromptsCommand {
    List,
    Show {
        #[arg(value_enum)]
        action: PromptAction,
    },
    /// Override a prompt. The text before the first blank line is the
    /// system prompt.
    Set {
        #[arg(value_enum)]
        action: PromptAction,
        #[arg(long, conflicts_with = "template_file")]
        template: Option<String>,
        #[arg(long)]
        template_file: Option<PathBuf>,
    },
    Reset {
        #[arg(value_enum)]
        action: PromptAction,
    },
}

#[derive(Debug, Args)]
pub struct IpcArgs {
    /// Autosave interval for edits pushed by the host.
    #[arg(long, default_value_t = 2000)]
    pub autosave_ms: u64,
}
