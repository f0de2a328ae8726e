//! Code Player CLI - sandboxed live preview for HTML, CSS and JavaScript.

mod colors;
mod console;
mod export;
mod project;
mod run;
mod serve;
mod watch;

use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::project::ProjectFiles;

#[derive(Parser)]
#[command(name = "codeplayer")]
#[command(about = "Sandboxed live preview for HTML, CSS and JavaScript")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Which files make up a project.
#[derive(clap::Args)]
struct ProjectArgs {
    /// Project directory
    dir: String,

    /// Markup file, relative to the directory
    #[arg(long)]
    html: Option<String>,

    /// Stylesheet, relative to the directory
    #[arg(long)]
    css: Option<String>,

    /// Script file, relative to the directory
    #[arg(long)]
    js: Option<String>,
}

impl ProjectArgs {
    fn files(&self) -> anyhow::Result<ProjectFiles> {
        ProjectFiles::new(&self.dir, self.html.as_deref(), self.css.as_deref(), self.js.as_deref())
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a project once and print its console
    Run {
        #[command(flatten)]
        project: ProjectArgs,

        /// Extra time to collect console output after the render, in ms
        #[arg(long, default_value = "100")]
        wait_ms: u64,
    },

    /// Watch a project and re-run on changes
    Watch {
        #[command(flatten)]
        project: ProjectArgs,

        /// Extra time to collect console output after each render, in ms
        #[arg(long, default_value = "100")]
        wait_ms: u64,

        /// Clear screen before each run
        #[arg(long)]
        clear: bool,
    },

    /// Start the playground server
    Serve {
        /// Host address to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Export a project as a single HTML document
    Export {
        #[command(flatten)]
        project: ProjectArgs,

        /// Output path (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Static preview without console capture
        #[arg(long = "static")]
        static_preview: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run { project, wait_ms } => {
            run::execute(&project.files()?, Duration::from_millis(wait_ms)).await?;
        }

        Commands::Watch {
            project,
            wait_ms,
            clear,
        } => {
            watch::execute(&project.files()?, Duration::from_millis(wait_ms), clear).await?;
        }

        Commands::Serve { host, port } => {
            serve::execute(&host, port).await?;
        }

        Commands::Export {
            project,
            output,
            static_preview,
        } => {
            export::execute(&project.files()?, output.as_deref(), static_preview)?;
        }
    }

    Ok(())
}
