use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use log::{LevelFilter, debug};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};
use weft_engine::{Language, ParseError, ParseOptions, Registry, Session};
use weft_errors::{LineIndex, Renderer};

#[derive(Parser)]
#[command(version, about = "Parse and format files with the sample languages")]
struct Options {
    /// One of off, error, warn, info, debug, trace.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a file and print it back, or print its parse tree.
    Parse {
        path: Utf8PathBuf,
        /// Language to parse with instead of the one the extension implies.
        #[arg(long)]
        lang: Option<String>,
        /// Complete input that ends early.
        #[arg(long)]
        partial: bool,
        /// Skip over broken elements.
        #[arg(long)]
        recover: bool,
        #[arg(long)]
        tree: bool,
    },
    /// Print a file rendered from its semantic tree alone.
    Format {
        path: Utf8PathBuf,
        #[arg(long)]
        lang: Option<String>,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    let options = Options::parse();
    init_logging(&options.log_level)?;
    let registry = weft_langs::registry().context("failed to build the sample languages")?;

    match options.command {
        Command::Parse { path, lang, partial, recover, tree } => {
            let options = ParseOptions {
                partial_values: partial,
                error_recovery: recover,
                ..ParseOptions::default()
            };
            let file = SourceFile::read(path)?;
            let language = language_for(&registry, &file.path, lang.as_deref())?;
            let Some(mut session) = file.parse(&*language, &options) else {
                return Ok(ExitCode::FAILURE);
            };

            if tree {
                print!("{}", session.debug_tree());
            } else {
                print!("{}", session.text()?);
            }
            Ok(if session.errors().is_empty() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Command::Format { path, lang } => {
            let file = SourceFile::read(path)?;
            let language = language_for(&registry, &file.path, lang.as_deref())?;
            let Some(mut session) = file.parse(&*language, &ParseOptions::default()) else {
                return Ok(ExitCode::FAILURE);
            };
            println!("{}", session.format()?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_logging(level: &str) -> anyhow::Result<()> {
    let level: LevelFilter =
        level.parse().map_err(|error| anyhow!("invalid log level `{level}`: {error}"))?;
    TermLogger::init(
        level,
        ConfigBuilder::new().set_time_format_custom(&[]).build(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .map_err(|error| anyhow!("failed to initialize logging: {error}"))
}

fn language_for(
    registry: &Registry,
    path: &Utf8Path,
    name: Option<&str>,
) -> anyhow::Result<Arc<dyn Language>> {
    if let Some(name) = name {
        let known = registry.names().collect::<Vec<_>>().join(", ");
        return registry
            .get(name)
            .with_context(|| format!("unknown language `{name}`, expected one of {known}"));
    }
    let extension = path
        .extension()
        .with_context(|| format!("cannot tell the language of `{path}`, pass --lang"))?;
    registry
        .for_extension(extension)
        .with_context(|| format!("no language for `.{extension}` files, pass --lang"))
}

struct SourceFile {
    path: Utf8PathBuf,
    text: String,
}

impl SourceFile {
    fn read(path: Utf8PathBuf) -> anyhow::Result<Self> {
        let text =
            std::fs::read_to_string(&path).with_context(|| format!("failed to read `{path}`"))?;
        Ok(Self { path, text })
    }

    /// Parses the file and reports every error on stderr. Returns `None` if
    /// the parse failed outright.
    fn parse(&self, language: &dyn Language, options: &ParseOptions) -> Option<Box<dyn Session>> {
        debug!("parsing `{}` as {}", self.path, language.name());
        match language.parse(&self.text, options) {
            Ok(session) => {
                self.report(session.errors());
                Some(session)
            }
            Err(error) => {
                self.report(&[error]);
                None
            }
        }
    }

    fn report(&self, errors: &[ParseError]) {
        let renderer = Renderer::styled();
        let index = LineIndex::new(&self.text);
        for error in errors {
            let diagnostic = error.to_diagnostic();
            debug!("{}:{}", self.path, diagnostic.location(&index));
            eprintln!("{}", diagnostic.render(&renderer, self.path.as_str(), &self.text));
        }
    }
}
