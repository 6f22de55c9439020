//! `schema-cli`: inspect, validate and edit JSON Schema data models

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use schema_model::prelude::*;
use schema_model::FileSchemaStore;
use serde_json::Value;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn cli() -> Command {
    let file = || {
        Arg::new("file")
            .required(true)
            .value_parser(value_parser!(PathBuf))
            .help("Schema document (JSON)")
    };
    let pointer = |name: &'static str, help: &'static str| Arg::new(name).required(true).help(help);

    Command::new("schema-cli")
        .version(schema_model::VERSION)
        .about("Inspect, validate and edit JSON Schema data models")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Model configuration (TOML)"),
        )
        .subcommand(Command::new("inspect").about("Print the node tree").arg(file()))
        .subcommand(
            Command::new("validate")
                .about("Report problems; exits non-zero if any")
                .arg(file()),
        )
        .subcommand(
            Command::new("normalize")
                .about("Load and write back in canonical form")
                .arg(file())
                .arg(
                    Arg::new("out")
                        .long("out")
                        .value_parser(value_parser!(PathBuf))
                        .help("Output file (stdout if omitted)"),
                ),
        )
        .subcommand(
            Command::new("add-field")
                .about("Add a field with a generated name")
                .arg(file())
                .arg(
                    Arg::new("parent")
                        .long("parent")
                        .default_value("#")
                        .help("Parent pointer"),
                )
                .arg(
                    Arg::new("kind")
                        .long("kind")
                        .default_value("string")
                        .help("object, array, string, number, integer, boolean, allOf, anyOf or oneOf"),
                ),
        )
        .subcommand(
            Command::new("add-type")
                .about("Add a definition with a generated name")
                .arg(file())
                .arg(Arg::new("name").long("name").help("Base name")),
        )
        .subcommand(
            Command::new("rename")
                .about("Rename a property or definition")
                .arg(file())
                .arg(pointer("pointer", "Node to rename"))
                .arg(Arg::new("name").required(true).help("New name")),
        )
        .subcommand(
            Command::new("move")
                .about("Move a node under another parent")
                .arg(file())
                .arg(pointer("pointer", "Node to move"))
                .arg(pointer("parent", "New parent"))
                .arg(
                    Arg::new("index")
                        .long("index")
                        .value_parser(value_parser!(usize))
                        .help("Position among the new siblings (end if omitted)"),
                ),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete a node and its subtree")
                .arg(file())
                .arg(pointer("pointer", "Node to delete"))
                .arg(
                    Arg::new("force")
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Also delete references to the node"),
                ),
        )
        .subcommand(
            Command::new("set-restriction")
                .about("Set a restriction keyword")
                .arg(file())
                .arg(pointer("pointer", "Node to restrict"))
                .arg(Arg::new("key").required(true).help("Restriction keyword"))
                .arg(Arg::new("value").required(true).help("JSON value")),
        )
        .subcommand(Command::new("config-schema").about("Print the JSON Schema of the configuration file"))
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();

    match run(&cli().get_matches()).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(matches: &ArgMatches) -> Result<ExitCode> {
    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => ModelConfig::from_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => ModelConfig::default(),
    };

    let Some((name, args)) = matches.subcommand() else {
        bail!("no command given");
    };
    tracing::debug!(command = name, "running");

    if name == "config-schema" {
        println!("{}", serde_json::to_string_pretty(&ModelConfig::json_schema())?);
        return Ok(ExitCode::SUCCESS);
    }

    let file = args
        .get_one::<PathBuf>("file")
        .context("missing schema file")?;
    let mut session = open(file, config).await?;

    match name {
        "inspect" => {
            print!("{}", render_tree(session.model())?);
            return Ok(ExitCode::SUCCESS);
        }
        "validate" => {
            let issues = session.model().validate()?;
            for issue in &issues {
                println!("{issue}");
            }
            if issues.is_empty() {
                println!("{}: ok", file.display());
                return Ok(ExitCode::SUCCESS);
            }
            return Ok(ExitCode::FAILURE);
        }
        "normalize" => {
            let document = session.model().to_canonical_schema()?;
            let text = serde_json::to_string_pretty(&document)?;
            match args.get_one::<PathBuf>("out") {
                Some(out) => tokio::fs::write(out, format!("{text}\n"))
                    .await
                    .with_context(|| format!("writing {}", out.display()))?,
                None => println!("{text}"),
            }
            return Ok(ExitCode::SUCCESS);
        }
        _ => {}
    }

    let summary = edit(session.model_mut(), name, args)?;
    tracing::info!(revision = session.model().revision()?, "edit applied");
    session.save().await.context("saving schema")?;
    println!("{summary}");
    Ok(ExitCode::SUCCESS)
}

/// Open `file` through a store rooted at its directory
async fn open(file: &Path, config: ModelConfig) -> Result<EditorSession<FileSchemaStore>> {
    let root = file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = file
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("{} is not a file name", file.display()))?;

    EditorSession::open(FileSchemaStore::new(root), name, config)
        .await
        .with_context(|| format!("opening {}", file.display()))
}

/// Apply one edit command; returns a one-line summary
fn edit(model: &mut SchemaModel, command: &str, args: &ArgMatches) -> Result<String> {
    let pointer_arg = |name: &str| -> Result<SchemaPointer> {
        let raw = args.get_one::<String>(name).with_context(|| format!("missing {name}"))?;
        raw.parse().with_context(|| format!("invalid pointer '{raw}'"))
    };

    let summary = match command {
        "add-field" => {
            let kind = parse_kind(args.get_one::<String>("kind").map_or("string", String::as_str))?;
            let node = model.add_field(&pointer_arg("parent")?, kind)?;
            format!("added {}", node.pointer())
        }
        "add-type" => {
            let base = args
                .get_one::<String>("name")
                .map_or(model.config().default_definition_name.as_str(), String::as_str)
                .to_string();
            let node = model.add_field_type(&base)?;
            format!("added {}", node.pointer())
        }
        "rename" => {
            let name = args.get_one::<String>("name").context("missing name")?;
            let renamed = model.rename_node(&pointer_arg("pointer")?, name)?;
            format!("renamed to {renamed}")
        }
        "move" => {
            let index = args.get_one::<usize>("index").copied().unwrap_or(usize::MAX);
            let moved = model.move_node(&pointer_arg("pointer")?, &pointer_arg("parent")?, index)?;
            format!("moved to {moved}")
        }
        "delete" => {
            let policy = if args.get_flag("force") {
                DeletePolicy::Cascade
            } else {
                model.config().delete_policy
            };
            let removed = model.delete_node_with(&pointer_arg("pointer")?, policy)?;
            format!("deleted {} node(s)", removed.len())
        }
        "set-restriction" => {
            let key = args.get_one::<String>("key").context("missing key")?;
            let raw = args.get_one::<String>("value").context("missing value")?;
            let value: Value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()));
            let pointer = pointer_arg("pointer")?;
            model.set_restriction(&pointer, key, value)?;
            format!("set {key} on {pointer}")
        }
        other => bail!("unknown command '{other}'"),
    };
    Ok(summary)
}

fn parse_kind(name: &str) -> Result<NodeKind> {
    NodeKind::from_type_name(name)
        .or_else(|| CombinationKind::from_keyword(name).map(NodeKind::Combination))
        .with_context(|| format!("unknown kind '{name}'"))
}

/// Indented tree of the document, definitions last
fn render_tree(model: &SchemaModel) -> Result<String> {
    let mut out = String::new();
    let table = model.table()?;
    render_node(model, &SchemaPointer::root(), 0, &mut out)?;
    let definitions = table.definitions_pointer();
    if !table.get(definitions)?.children().is_empty() {
        render_node(model, definitions, 0, &mut out)?;
    }
    Ok(out)
}

fn render_node(model: &SchemaModel, pointer: &SchemaPointer, depth: usize, out: &mut String) -> Result<()> {
    let node = model.node(pointer)?;
    let mut line = format!("{:indent$}{}: {}", "", node.name(), node.kind(), indent = depth * 2);
    if node.is_required() {
        line.push_str(" (required)");
    }
    if node.is_nullable() {
        line.push_str(" (nullable)");
    }
    if let Some(target) = node.reference_target() {
        let _ = write!(line, " -> {target}");
    }
    for (key, value) in node.restrictions() {
        let _ = write!(line, " {key}={value}");
    }
    out.push_str(&line);
    out.push('\n');

    for child in node.children() {
        render_node(model, child, depth + 1, out)?;
    }
    Ok(())
}
