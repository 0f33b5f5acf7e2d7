use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tidemark::config::{ExpansionMode, OutputFormat};
use tidemark::runner::{Command, run};
use tidemark::TidemarkConfig;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliOutputFormat {
    Plain,
    Json,
    Md,
    Mermaid,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(f: CliOutputFormat) -> Self {
        match f {
            CliOutputFormat::Plain => OutputFormat::Plain,
            CliOutputFormat::Json => OutputFormat::Json,
            CliOutputFormat::Md => OutputFormat::Markdown,
            CliOutputFormat::Mermaid => OutputFormat::Mermaid,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Structural indexing and change-impact analysis for Python repositories", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: CliCommand,

    /// Repository root
    #[arg(short, long, global = true)]
    path: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, global = true)]
    format: Option<CliOutputFormat>,

    /// Write output to this file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Extra directory name to skip (repeatable)
    #[arg(long, global = true)]
    ignore: Vec<String>,

    /// Honour .gitignore files
    #[arg(long, global = true)]
    gitignore: bool,

    /// Refuse repositories whose source files exceed this many megabytes
    #[arg(long, global = true)]
    max_size_mb: Option<u64>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Print the structural index of every source file
    Index,
    /// Print the dependency graph and its import cycles
    Graph {
        /// Also resolve plain `import x.y` statements
        #[arg(long)]
        direct_imports: bool,
    },
    /// Rank files by relevance to a query
    Rank {
        query: String,
        /// Number of files to return
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
    /// Classify the impact of a proposed change
    Analyze {
        /// Description of the change
        description: String,
        /// JSON opinion from an external collaborator
        #[arg(long)]
        opinion: Option<PathBuf>,
        /// Follow imports until no new file is reached
        #[arg(long)]
        transitive: bool,
    },
    /// List every graph neighbour of a file
    Modules { file: String },
    /// Print the structure context block for a query
    Context {
        query: String,
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
    /// Re-index whenever a source file changes
    Watch {
        /// Re-emit the structure context for this query instead of the graph
        #[arg(long)]
        query: Option<String>,
    },
    /// Generate shell completions
    Completions { shell: clap_complete::Shell },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    // 1. Load from file or default
    let mut config = TidemarkConfig::load_from_file().unwrap_or_default();

    // 2. Override with CLI args
    if let Some(p) = args.path {
        config.path = p;
    }
    if let Some(f) = args.format {
        config.output_format = f.into();
    }
    if !args.ignore.is_empty() {
        // CLI ignores ADD to config ignores
        config.ignore_dirs.extend(args.ignore);
    }
    if args.gitignore {
        config.respect_gitignore = true;
    }
    if let Some(mb) = args.max_size_mb {
        config.max_repo_size_mb = Some(mb);
    }
    if args.verbose {
        config.verbose = true;
    }

    let command = match args.command {
        CliCommand::Completions { shell } => {
            clap_complete::generate(shell, &mut Args::command(), "tidemark", &mut std::io::stdout());
            return Ok(());
        }
        CliCommand::Index => Command::Index,
        CliCommand::Graph { direct_imports } => {
            if direct_imports {
                config.include_direct_imports = true;
            }
            Command::Graph
        }
        CliCommand::Rank { query, top_k } => {
            if let Some(k) = top_k {
                config.top_k = k;
            }
            Command::Rank { query }
        }
        CliCommand::Analyze {
            description,
            opinion,
            transitive,
        } => {
            if transitive {
                config.impact.expansion = ExpansionMode::Transitive;
            }
            Command::Analyze {
                description,
                opinion,
            }
        }
        CliCommand::Modules { file } => Command::Modules { file },
        CliCommand::Context { query, top_k } => {
            if let Some(k) = top_k {
                config.top_k = k;
            }
            Command::Context { query }
        }
        CliCommand::Watch { query } => Command::Watch { query },
    };

    run(config, command, args.output.as_deref())
}
