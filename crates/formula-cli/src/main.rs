use clap::{Args, Parser, Subcommand};
use formula_lexer::{Lexer, TokenKind};
use formula_parser::ParseOptions;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "formula")]
#[command(about = "Parse formula templates and inspect their tokens and AST")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the AST as JSON
    Parse(Input),

    /// Print the token stream as JSON
    Tokens(Input),

    /// Check a template for errors without printing output
    Check(Input),
}

#[derive(Args)]
struct Input {
    /// Template file to read
    #[arg(required_unless_present = "source", conflicts_with = "source")]
    path: Option<String>,

    /// Template text given inline
    #[arg(short = 'e', long = "expr")]
    source: Option<String>,

    /// Parse the input as a single expression
    #[arg(long)]
    eval: bool,

    /// Treat `|` as bitwise or instead of a filter
    #[arg(long)]
    no_filter: bool,
}

impl Input {
    fn options(&self) -> ParseOptions {
        ParseOptions {
            eval_mode: self.eval,
            allow_filter: !self.no_filter,
        }
    }

    fn label(&self) -> &str {
        self.path.as_deref().unwrap_or("<expr>")
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "formula=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Parse(input) => cmd_parse(&input),
        Command::Tokens(input) => cmd_tokens(&input),
        Command::Check(input) => cmd_check(&input),
    }
}

fn read_source(input: &Input) -> String {
    if let Some(source) = &input.source {
        return source.clone();
    }

    let path = input.label();
    let p = Path::new(path);
    if !p.exists() {
        eprintln!("Error: file not found: {path}");
        std::process::exit(1);
    }
    match std::fs::read_to_string(p) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading {path}: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_parse(input: &Input) {
    let source = read_source(input);
    match render_ast(&source, input.options()) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

fn cmd_tokens(input: &Input) {
    let source = read_source(input);
    match render_tokens(&source, input.options()) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

fn cmd_check(input: &Input) {
    let source = read_source(input);

    if let Err(e) = formula_parser::parse(&source, input.options()) {
        eprintln!("{}: {e}", input.label());
        std::process::exit(1);
    }

    eprintln!("OK: {}", input.label());
}

/// Parse `source` and render the AST as pretty JSON.
fn render_ast(source: &str, options: ParseOptions) -> Result<String, String> {
    let ast = formula_parser::parse(source, options).map_err(|e| e.to_string())?;
    serde_json::to_string_pretty(&ast).map_err(|e| e.to_string())
}

/// Lex `source` and render every token up to and including EOF as pretty JSON.
fn render_tokens(source: &str, options: ParseOptions) -> Result<String, String> {
    let tokens = Lexer::tokenize(source, options).map_err(|e| e.to_string())?;
    tracing::debug!(
        count = tokens.len(),
        scripts = tokens.iter().filter(|t| t.kind == TokenKind::OpenScript).count(),
        "tokenized"
    );
    serde_json::to_string_pretty(&tokens).map_err(|e| e.to_string())
}
