//! # Carrel CLI (`carrel`)
//!
//! The `carrel` binary is the terminal interface to a retrieval-augmented
//! research corpus. It provides commands for cited question answering,
//! document indexing and inspection, project assembly, and backend health.
//!
//! ## Usage
//!
//! ```bash
//! carrel --config ./config/carrel.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `carrel chat` | Interactive Q&A session with persistent history |
//! | `carrel ask "<question>"` | One-shot question with cited answer |
//! | `carrel session show` | Inspect the persisted session |
//! | `carrel docs list` | List indexed documents |
//! | `carrel index folder <path>` | Index every PDF in a folder |
//! | `carrel upload <path>...` | Upload local PDFs to the backend |
//! | `carrel projects export <id>` | Export a project write-up |
//! | `carrel health --watch` | Poll backend health |
//! | `carrel stats` | Corpus metadata quality statistics |
//!
//! ## Examples
//!
//! ```bash
//! # Index a directory of papers
//! carrel index folder ./papers
//!
//! # Ask with retrieval filters scoped to recent work
//! carrel session filters --year-min 2020
//! carrel ask "how does retrieval scale with corpus size?"
//!
//! # Attach a document to a project and export
//! carrel projects source add <project-id> <doc-id> --relevance high
//! carrel projects export <project-id> --format markdown --out survey.md
//!
//! # Watch backend health every poll interval
//! carrel health --watch
//! ```

mod api;
mod chat;
mod client;
mod config;
mod documents;
mod health;
mod indexing;
mod persist;
mod projects;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::api::HttpBackend;
use crate::client::Client;

/// Carrel, a terminal client for a retrieval-augmented research corpus.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/carrel.example.toml` for a full example; a missing
/// file means built-in defaults.
#[derive(Parser)]
#[command(
    name = "carrel",
    about = "Carrel: cited Q&A, corpus management, and write-up assembly from the terminal",
    version,
    long_about = "Carrel is a terminal client for a retrieval-augmented research corpus: ask \
    questions and get answers with ranked citations, index and inspect PDF documents, and \
    assemble research projects into exportable write-ups."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/carrel.toml`. Backend, chat, session, cache,
    /// and health settings are read from this file.
    #[arg(long, global = true, default_value = "./config/carrel.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Start an interactive question-and-answer session.
    ///
    /// Restores the persisted conversation, then reads questions from stdin
    /// until EOF or `/quit`. Slash commands (`/filters`, `/history`,
    /// `/clear`, `/help`) manage the session; everything else is sent to
    /// the backend as a question.
    Chat,

    /// Ask a single question and print the cited answer.
    ///
    /// The question and answer are appended to the persisted session, so a
    /// later `carrel chat` continues the same conversation.
    Ask {
        /// The question to ask.
        question: String,

        /// Number of passages to retrieve (defaults to `[chat].top_k`).
        #[arg(long)]
        top_k: Option<u32>,
    },

    /// Inspect or modify the persisted chat session.
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Inspect and manage indexed documents.
    Docs {
        #[command(subcommand)]
        action: DocsAction,
    },

    /// Index files already visible to the backend.
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },

    /// Upload local PDF files to the backend for indexing.
    ///
    /// Accepts files and directories; directories are walked recursively
    /// for `.pdf` files. Each file is uploaded separately, and one failed
    /// upload does not stop the rest.
    Upload {
        /// PDF files or directories to upload.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Manage research projects: sources, sections, export.
    Projects {
        #[command(subcommand)]
        action: ProjectsAction,
    },

    /// Check backend health.
    Health {
        /// Keep polling and print one status line per interval.
        #[arg(long)]
        watch: bool,
    },

    /// Show corpus metadata quality statistics.
    Stats,
}

/// Session management subcommands.
#[derive(Subcommand)]
enum SessionAction {
    /// Print the session file path, active filters, and message history.
    Show,

    /// Clear the persisted session.
    ///
    /// With no flags both the message history and the filters are cleared.
    Clear {
        /// Clear only the message history.
        #[arg(long)]
        messages_only: bool,

        /// Clear only the retrieval filters.
        #[arg(long)]
        filters_only: bool,
    },

    /// Show or update retrieval filters.
    ///
    /// With no flags the active filters are printed. Updates merge into the
    /// existing filters; `--reset` clears them first.
    Filters {
        /// Only retrieve from documents published in or after this year.
        #[arg(long)]
        year_min: Option<i32>,

        /// Only retrieve from documents published in or before this year.
        #[arg(long)]
        year_max: Option<i32>,

        /// Only retrieve from documents by this author (repeatable).
        #[arg(long = "author")]
        authors: Vec<String>,

        /// Clear all filters before applying the other flags.
        #[arg(long)]
        reset: bool,
    },
}

/// Document subcommands.
#[derive(Subcommand)]
enum DocsAction {
    /// List indexed documents.
    List {
        /// Page number (20 documents per page).
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Filter by indexing status: `pending`, `indexed`, or `error`.
        #[arg(long)]
        status: Option<String>,

        /// Case-insensitive title search.
        #[arg(long)]
        search: Option<String>,
    },

    /// Show a document's full metadata.
    Show {
        /// Document ID.
        id: String,
    },

    /// Delete a document from the corpus.
    Delete {
        /// Document ID.
        id: String,
    },

    /// Generate a short summary of a document.
    Summarize {
        /// Document ID.
        id: String,
    },

    /// List the references extracted from a document.
    Refs {
        /// Document ID.
        id: String,
    },

    /// Print a direct link to a document's PDF.
    Link {
        /// Document ID.
        id: String,

        /// Link to this page of the PDF.
        #[arg(long)]
        page: Option<u32>,
    },

    /// Download a document's PDF.
    Pdf {
        /// Document ID.
        id: String,

        /// Output file path.
        #[arg(long)]
        out: PathBuf,
    },
}

/// Indexing subcommands.
#[derive(Subcommand)]
enum IndexAction {
    /// Index a single file by its path on the backend.
    File {
        /// Path to the file, as seen by the backend.
        path: PathBuf,

        /// Document title (overrides extracted metadata).
        #[arg(long)]
        title: Option<String>,

        /// Document author (repeatable).
        #[arg(long = "author")]
        authors: Vec<String>,

        /// Publication year.
        #[arg(long)]
        year: Option<i32>,
    },

    /// Index every PDF in a folder on the backend.
    Folder {
        /// Path to the folder, as seen by the backend.
        path: PathBuf,
    },

    /// Re-extract and re-embed documents already in the corpus.
    ///
    /// With no IDs the whole corpus is reindexed.
    Reindex {
        /// Document IDs to reindex.
        ids: Vec<String>,
    },

    /// Delete the entire index.
    Reset {
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },
}

/// Project subcommands.
#[derive(Subcommand)]
enum ProjectsAction {
    /// List projects.
    List {
        /// Filter by status: `draft`, `in_progress`, or `completed`.
        #[arg(long)]
        status: Option<String>,
    },

    /// Create a new project.
    Create {
        /// Project title.
        #[arg(long)]
        title: String,

        /// Project description.
        #[arg(long)]
        description: Option<String>,
    },

    /// Show a project with its sources and sections.
    Show {
        /// Project ID.
        id: String,
    },

    /// Update a project's title, description, or status.
    Update {
        /// Project ID.
        id: String,

        /// New title.
        #[arg(long)]
        title: Option<String>,

        /// New description.
        #[arg(long)]
        description: Option<String>,

        /// New status: `draft`, `in_progress`, or `completed`.
        #[arg(long)]
        status: Option<String>,
    },

    /// Delete a project.
    Delete {
        /// Project ID.
        id: String,
    },

    /// Manage a project's sources (attached documents).
    Source {
        #[command(subcommand)]
        action: SourceAction,
    },

    /// Manage a project's write-up sections.
    Section {
        #[command(subcommand)]
        action: SectionAction,
    },

    /// Export a project as a formatted document.
    Export {
        /// Project ID.
        id: String,

        /// Output format: `markdown` or `docx`.
        #[arg(long, default_value = "docx")]
        format: String,

        /// Citation style for the bibliography.
        #[arg(long, default_value = "apa")]
        style: String,

        /// Leave the bibliography out of the export.
        #[arg(long)]
        no_bibliography: bool,

        /// Output file path (defaults to the backend-provided filename).
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

/// Project source subcommands.
#[derive(Subcommand)]
enum SourceAction {
    /// Attach a document to a project.
    ///
    /// A document can be attached to a given project at most once.
    Add {
        /// Project ID.
        project: String,

        /// Document ID to attach.
        document: String,

        /// Notes on why this source matters.
        #[arg(long)]
        notes: Option<String>,

        /// Relevance: `low`, `medium`, `high`, or `critical`.
        #[arg(long, default_value = "medium")]
        relevance: String,
    },

    /// Update an attached source's notes, highlights, or relevance.
    Update {
        /// Project ID.
        project: String,

        /// Source ID (not the document ID).
        source: String,

        /// New notes.
        #[arg(long)]
        notes: Option<String>,

        /// Highlighted passage (repeatable, replaces existing highlights).
        #[arg(long = "highlight")]
        highlights: Vec<String>,

        /// New relevance: `low`, `medium`, `high`, or `critical`.
        #[arg(long)]
        relevance: Option<String>,
    },

    /// Detach a source from a project.
    Rm {
        /// Project ID.
        project: String,

        /// Source ID.
        source: String,
    },
}

/// Project section subcommands.
#[derive(Subcommand)]
enum SectionAction {
    /// Add a section to a project's write-up.
    Add {
        /// Project ID.
        project: String,

        /// Section kind (e.g., `introduction`, `methods`, `discussion`).
        #[arg(long)]
        kind: String,

        /// Section title.
        #[arg(long)]
        title: Option<String>,

        /// Section content (markdown).
        #[arg(long)]
        content: Option<String>,
    },

    /// Update a section's title, content, position, or status.
    Update {
        /// Project ID.
        project: String,

        /// Section ID.
        section: String,

        /// New title.
        #[arg(long)]
        title: Option<String>,

        /// New content (markdown).
        #[arg(long)]
        content: Option<String>,

        /// New position in the write-up (0-based).
        #[arg(long)]
        order: Option<u32>,

        /// New status: `draft`, `review`, or `final`.
        #[arg(long)]
        status: Option<String>,
    },

    /// Remove a section from a project.
    Rm {
        /// Project ID.
        project: String,

        /// Section ID.
        section: String,
    },

    /// Put a project's sections in the given order.
    ///
    /// Every section of the project must be listed exactly once.
    Reorder {
        /// Project ID.
        project: String,

        /// Section IDs in the desired order.
        #[arg(required = true)]
        sections: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let backend = HttpBackend::new(&cfg.backend)?;

    match cli.command {
        Commands::Chat => {
            let mut client = Client::new(backend, &cfg);
            chat::run_chat(&mut client).await?;
        }
        Commands::Ask { question, top_k } => {
            let mut client = Client::new(backend, &cfg);
            chat::run_ask(&mut client, &question, top_k).await?;
        }
        Commands::Session { action } => {
            let mut client = Client::new(backend, &cfg);
            match action {
                SessionAction::Show => {
                    chat::run_session_show(&client, &cfg.session.path);
                }
                SessionAction::Clear {
                    messages_only,
                    filters_only,
                } => {
                    chat::run_session_clear(&mut client, messages_only, filters_only)?;
                }
                SessionAction::Filters {
                    year_min,
                    year_max,
                    authors,
                    reset,
                } => {
                    chat::run_session_filters(&mut client, year_min, year_max, authors, reset);
                }
            }
        }
        Commands::Docs { action } => {
            let mut client = Client::without_persistence(backend, &cfg);
            match action {
                DocsAction::List {
                    page,
                    status,
                    search,
                } => {
                    documents::run_list(&mut client, page, status, search).await?;
                }
                DocsAction::Show { id } => {
                    documents::run_show(&mut client, &id).await?;
                }
                DocsAction::Delete { id } => {
                    documents::run_delete(&mut client, &id).await?;
                }
                DocsAction::Summarize { id } => {
                    documents::run_summarize(&mut client, &id).await?;
                }
                DocsAction::Refs { id } => {
                    documents::run_refs(&mut client, &id).await?;
                }
                DocsAction::Link { id, page } => {
                    documents::run_link(&client, &id, page);
                }
                DocsAction::Pdf { id, out } => {
                    documents::run_pdf(&mut client, &id, &out).await?;
                }
            }
        }
        Commands::Index { action } => {
            let mut client = Client::without_persistence(backend, &cfg);
            match action {
                IndexAction::File {
                    path,
                    title,
                    authors,
                    year,
                } => {
                    indexing::run_index_file(&mut client, &path, title, authors, year).await?;
                }
                IndexAction::Folder { path } => {
                    indexing::run_index_folder(&mut client, &path).await?;
                }
                IndexAction::Reindex { ids } => {
                    indexing::run_reindex(&mut client, ids).await?;
                }
                IndexAction::Reset { yes } => {
                    indexing::run_reset(&mut client, yes).await?;
                }
            }
        }
        Commands::Upload { paths } => {
            let mut client = Client::without_persistence(backend, &cfg);
            indexing::run_upload(&mut client, &paths).await?;
        }
        Commands::Projects { action } => {
            let mut client = Client::without_persistence(backend, &cfg);
            match action {
                ProjectsAction::List { status } => {
                    projects::run_list(&mut client, status).await?;
                }
                ProjectsAction::Create { title, description } => {
                    projects::run_create(&mut client, title, description).await?;
                }
                ProjectsAction::Show { id } => {
                    projects::run_show(&mut client, &id).await?;
                }
                ProjectsAction::Update {
                    id,
                    title,
                    description,
                    status,
                } => {
                    projects::run_update(&mut client, &id, title, description, status).await?;
                }
                ProjectsAction::Delete { id } => {
                    projects::run_delete(&mut client, &id).await?;
                }
                ProjectsAction::Source { action } => match action {
                    SourceAction::Add {
                        project,
                        document,
                        notes,
                        relevance,
                    } => {
                        projects::run_source_add(&mut client, &project, document, notes, &relevance)
                            .await?;
                    }
                    SourceAction::Update {
                        project,
                        source,
                        notes,
                        highlights,
                        relevance,
                    } => {
                        projects::run_source_update(
                            &mut client,
                            &project,
                            &source,
                            notes,
                            highlights,
                            relevance,
                        )
                        .await?;
                    }
                    SourceAction::Rm { project, source } => {
                        projects::run_source_rm(&mut client, &project, &source).await?;
                    }
                },
                ProjectsAction::Section { action } => match action {
                    SectionAction::Add {
                        project,
                        kind,
                        title,
                        content,
                    } => {
                        projects::run_section_add(&mut client, &project, kind, title, content)
                            .await?;
                    }
                    SectionAction::Update {
                        project,
                        section,
                        title,
                        content,
                        order,
                        status,
                    } => {
                        projects::run_section_update(
                            &mut client,
                            &project,
                            &section,
                            title,
                            content,
                            order,
                            status,
                        )
                        .await?;
                    }
                    SectionAction::Rm { project, section } => {
                        projects::run_section_rm(&mut client, &project, &section).await?;
                    }
                    SectionAction::Reorder { project, sections } => {
                        projects::run_section_reorder(&mut client, &project, sections).await?;
                    }
                },
                ProjectsAction::Export {
                    id,
                    format,
                    style,
                    no_bibliography,
                    out,
                } => {
                    projects::run_export(&mut client, &id, &format, &style, no_bibliography, out)
                        .await?;
                }
            }
        }
        Commands::Health { watch } => {
            let mut client = Client::without_persistence(backend, &cfg);
            health::run_health(&mut client, watch, cfg.health.poll_secs).await?;
        }
        Commands::Stats => {
            let mut client = Client::without_persistence(backend, &cfg);
            health::run_stats(&mut client).await?;
        }
    }

    Ok(())
}
