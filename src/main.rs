//! tome - inspect and convert UMD and plain-text books

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use tome::{Book, FormatRegistry, Options, Part, Value};

#[derive(Parser)]
#[command(name = "tome")]
#[command(version, about = "Inspect and convert UMD and plain-text books", long_about = None)]
#[command(after_help = "EXAMPLES:
    tome info novel.umd                 Show metadata and chapters
    tome convert novel.umd novel.txt    Convert UMD to text
    tome cat novel.umd 0                Print the first chapter")]
struct Cli {
    /// Log more (repeat for trace output)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show book metadata and the chapter tree
    Info {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Input format (default: file extension)
        #[arg(short, long)]
        format: Option<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Convert a book to another format
    Convert {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Input format (default: input extension)
        #[arg(long)]
        from: Option<String>,

        /// Output format (default: output extension)
        #[arg(long)]
        to: Option<String>,

        /// Codec option as key=value (repeatable)
        #[arg(short = 'o', long = "option", value_name = "KEY=VALUE", value_parser = parse_option)]
        options: Vec<(String, Value)>,
    },
    /// Print the text of one part, addressed like 0/2/-1
    Cat {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        #[arg(value_name = "PATH")]
        path: String,

        /// Input format (default: file extension)
        #[arg(short, long)]
        format: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    let registry = FormatRegistry::with_builtin();
    debug!("parsers: {:?}, makers: {:?}", registry.parsers(), registry.makers());

    let result = match cli.command {
        Command::Info {
            input,
            format,
            json,
        } => show_info(&registry, &input, format.as_deref(), json),
        Command::Convert {
            input,
            output,
            from,
            to,
            options,
        } => convert(&registry, &input, &output, from.as_deref(), to.as_deref(), options),
        Command::Cat {
            input,
            path,
            format,
        } => cat(&registry, &input, &path, format.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn parse_option(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {raw:?}"))?;
    let value = match value {
        "true" => Value::Boolean(true),
        "false" => Value::Boolean(false),
        other => match other.parse::<i64>() {
            Ok(n) => Value::Integer(n),
            Err(_) => Value::String(other.to_string()),
        },
    };
    Ok((key.trim().to_string(), value))
}

#[derive(Serialize)]
struct PartInfo {
    title: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<PartInfo>,
}

impl PartInfo {
    fn new(part: &Part) -> Self {
        Self {
            title: part.title().to_string(),
            children: part.iter().map(PartInfo::new).collect(),
        }
    }
}

#[derive(Serialize)]
struct BookInfo {
    attributes: BTreeMap<String, String>,
    items: Vec<String>,
    depth: usize,
    chapters: Vec<PartInfo>,
}

fn show_info(
    registry: &FormatRegistry,
    input: &Path,
    format: Option<&str>,
    json: bool,
) -> Result<(), String> {
    let book = registry
        .read_book(input, format, &Options::new())
        .map_err(|e| e.to_string())?;

    if json {
        let info = BookInfo {
            attributes: book
                .attributes()
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            items: book.items().map(|(name, _)| name.to_string()).collect(),
            depth: book.depth(),
            chapters: book.iter().map(PartInfo::new).collect(),
        };
        let text = serde_json::to_string_pretty(&info).map_err(|e| e.to_string())?;
        println!("{text}");
        return Ok(());
    }

    print_metadata(&book);
    println!("Chapters: {}", book.len());
    book.walk(|part, level| {
        println!("{}{}", "  ".repeat(level), part.title());
        true
    });
    Ok(())
}

fn print_metadata(book: &Book) {
    println!("Title: {}", book.title());
    if let Some(author) = book.author() {
        println!("Author: {author}");
    }
    if let Some(date) = book.date() {
        println!("Date: {date}");
    }
    for (name, value) in book.attributes().iter() {
        if matches!(name, "title" | "author" | "date" | "intro") {
            continue;
        }
        println!("{name}: {value}");
    }
    if book.item_count() > 0 {
        println!("Items: {}", book.item_count());
    }
}

fn convert(
    registry: &FormatRegistry,
    input: &Path,
    output: &Path,
    from: Option<&str>,
    to: Option<&str>,
    options: Vec<(String, Value)>,
) -> Result<(), String> {
    let options: Options = options.into_iter().collect();
    let book = registry
        .convert(input, from, output, to, &options)
        .map_err(|e| e.to_string())?;
    eprintln!(
        "{} -> {} ({} chapters)",
        input.display(),
        output.display(),
        book.len()
    );
    Ok(())
}

fn cat(registry: &FormatRegistry, input: &Path, path: &str, format: Option<&str>) -> Result<(), String> {
    let indices = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| s.trim().parse::<isize>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("bad path {path:?}: {e}"))?;

    let book = registry
        .read_book(input, format, &Options::new())
        .map_err(|e| e.to_string())?;
    let part = book
        .find_by_path(&indices)
        .ok_or_else(|| format!("no part at {path}"))?;
    let text = part.text().map_err(|e| e.to_string())?;
    println!("{text}");
    Ok(())
}
