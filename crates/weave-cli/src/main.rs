use clap::Parser;
use std::path::{Path, PathBuf};
use weave::error::TracedError;
use weave::{Engine, Options};

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(err) = cli.run() {
        if !err.is_empty() {
            eprintln!("{err}");
        }
        std::process::exit(1);
    }
}

/// Weave: a token level source-to-source macro preprocessor.
///
/// Macros are declared in the source file itself:
///
///     macro { unless (···c) } >> { if (!(···c)) }
///
/// and every later match of the pattern is replaced by the expansion.
#[derive(Debug, Parser)]
#[command(
    name = "weave",
    author = "The Weave Project",
    version = "0.1",
    about,
    long_about,
    max_term_width(100)
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to a JSON file with engine options.
    ///
    /// The file contains an object with any of the keys `salt`, `hygiene`,
    ///     `trim_declarations` and `max_nesting_depth`.
    /// Flags passed on the command line take precedence over the file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Salt used to build expansion ids, and thus the names of renamed variables.
    ///
    /// If not provided a random salt is used.
    /// Pass a fixed salt to get reproducible output.
    #[arg(long, global = true)]
    salt: Option<String>,

    /// Do not rename free variables in macro expansions.
    #[arg(long, global = true)]
    no_hygiene: bool,

    /// Keep whitespace after macro declarations in the output.
    #[arg(long, global = true)]
    keep_declarations: bool,

    /// Maximum depth of nested expansion cycles.
    #[arg(long, global = true)]
    max_nesting_depth: Option<usize>,

    /// Log more. Pass twice to trace every macro application.
    ///
    /// The `RUST_LOG` environment variable takes precedence over this flag.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn run(&self) -> Result<(), String> {
        match &self.command {
            Command::Expand(expand) => expand.run(self.options()?),
            Command::Tokens(tokens) => tokens.run(self.options()?),
            Command::Doc(doc) => doc.run(),
        }
    }

    fn options(&self) -> Result<Options, String> {
        let mut options = match &self.config {
            None => Options::default(),
            Some(path) => {
                let data = read(path)?;
                serde_json::from_str(&data)
                    .map_err(|err| format!("failed to parse options in {}: {err}", path.display()))?
            }
        };
        if let Some(salt) = &self.salt {
            options.salt = Some(salt.clone());
        }
        if self.no_hygiene {
            options.hygiene = false;
        }
        if self.keep_declarations {
            options.trim_declarations = false;
        }
        if let Some(depth) = self.max_nesting_depth {
            options.max_nesting_depth = depth;
        }
        tracing::debug!(?options, "resolved engine options");
        Ok(options)
    }
}

#[derive(Clone, Debug, clap::Subcommand)]
enum Command {
    /// Expand the macros in a source file.
    Expand(Expand),

    /// Print the tokens of a source file.
    ///
    /// This is useful to check how a pattern will be read:
    ///     every pattern is made of the same tokens as the source.
    Tokens(Tokens),

    /// Print the documentation of the built-in expanders.
    ///
    /// With no name, lists every expander with a one line summary.
    Doc(Doc),
}

#[derive(Clone, Debug, Parser)]
struct Expand {
    /// Path to the source file.
    path: PathBuf,

    /// Output path for the expanded source.
    ///
    /// If not provided, the expanded source is printed to standard out.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl Expand {
    fn run(&self, options: Options) -> Result<(), String> {
        let source = read(&self.path)?;
        let mut engine =
            Engine::new_with_built_ins(weave_stdlib::built_in_expanders()).with_options(options);
        let output = engine
            .expand_source(&source)
            .map_err(|err| TracedError::new(err, &self.path.display().to_string(), &source).to_string())?;
        match &self.output {
            None => print!("{output}"),
            Some(path) => std::fs::write(path, output)
                .map_err(|err| format!("failed to write {}: {err}", path.display()))?,
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Parser)]
struct Tokens {
    /// Path to the source file.
    path: PathBuf,

    /// Print the tokens as a JSON array.
    #[arg(long)]
    json: bool,
}

impl Tokens {
    fn run(&self, options: Options) -> Result<(), String> {
        let source = read(&self.path)?;
        let engine = Engine::new().with_options(options);
        let tokens = engine
            .lex(&source)
            .map_err(|err| TracedError::new(err, &self.path.display().to_string(), &source).to_string())?
            .to_vec();
        if self.json {
            let json = serde_json::to_string_pretty(&tokens).map_err(|err| err.to_string())?;
            println!("{json}");
            return Ok(());
        }
        for token in tokens {
            let line = token.line().map(|l| l.to_string()).unwrap_or_default();
            let kind = match token.kind().name() {
                Some(name) => name.to_string(),
                None => format!("{:?}", token.kind()),
            };
            println!("{line:>5} {kind:<12} {:?}", token.text());
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Parser)]
struct Doc {
    /// Name of the expander, without the leading `··`.
    name: Option<String>,
}

impl Doc {
    fn run(&self) -> Result<(), String> {
        let expanders = weave_stdlib::built_in_expanders();
        match &self.name {
            Some(name) => match expanders.get(name.as_str()) {
                Some(built_in) => {
                    print!("{}", built_in.doc());
                    Ok(())
                }
                None => {
                    let mut err = format!("unknown expander `{name}`");
                    if let Some(closest) =
                        weave_stdext::suggest::closest(expanders.keys().copied(), name)
                    {
                        err.push_str(&format!("; did you mean `{closest}`?"));
                    }
                    Err(err)
                }
            },
            None => {
                let mut names: Vec<&str> = expanders.keys().copied().collect();
                names.sort();
                for name in names {
                    let summary = expanders[name].doc().lines().next().unwrap_or_default();
                    println!("··{name:<12} {summary}");
                }
                Ok(())
            }
        }
    }
}

fn read(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|err| format!("failed to read {}: {err}", path.display()))
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::EnvFilter;
    let filter = match std::env::var("RUST_LOG") {
        Ok(_) => EnvFilter::from_default_env(),
        Err(_) => EnvFilter::new(match verbose {
            0 => "warn",
            1 => "weave=debug",
            _ => "weave=trace",
        }),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}
