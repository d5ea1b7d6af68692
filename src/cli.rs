//! CLI argument parsing for Lodestone
//!
//! Defines the Command enum and parse_args() function for all CLI commands.

use anyhow::Result;
use std::path::PathBuf;

pub fn print_usage() {
    eprintln!("Lodestone - Build-cache database inspection tool");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  lodestone <command> [arguments]");
    eprintln!("  lodestone --help");
    eprintln!();
    eprintln!("  lodestone status --db <FILE> [--json]");
    eprintln!("  lodestone walk --db <FILE>");
    eprintln!("  lodestone results --db <FILE> --id <ID>");
    eprintln!("  lodestone links --db <FILE> --id <ID>");
    eprintln!("  lodestone check --db <FILE> [--json]");
    eprintln!("  lodestone release --db <FILE> --result <ID>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  status   Show cache database statistics");
    eprintln!("  walk     List all cache-key node ids");
    eprintln!("  results  List results stored for a node");
    eprintln!("  links    List outgoing links of a node");
    eprintln!("  check    Validate structural invariants (exit 1 on failure)");
    eprintln!("  release  Release a result and reclaim unreachable nodes");
    eprintln!();
    eprintln!("Status arguments:");
    eprintln!("  --db <FILE>         Path to cache database");
    eprintln!("  --json              Emit JSON instead of human output");
    eprintln!();
    eprintln!("Walk arguments:");
    eprintln!("  --db <FILE>         Path to cache database");
    eprintln!();
    eprintln!("Results arguments:");
    eprintln!("  --db <FILE>         Path to cache database");
    eprintln!("  --id <ID>           Cache-key node id to list results for");
    eprintln!();
    eprintln!("Links arguments:");
    eprintln!("  --db <FILE>         Path to cache database");
    eprintln!("  --id <ID>           Cache-key node id to list links for");
    eprintln!();
    eprintln!("Check arguments:");
    eprintln!("  --db <FILE>         Path to cache database");
    eprintln!("  --json              Emit the validation report as JSON");
    eprintln!();
    eprintln!("Release arguments:");
    eprintln!("  --db <FILE>         Path to cache database");
    eprintln!("  --result <ID>       Result id to release");
}

pub enum Command {
    Status { db_path: PathBuf, json: bool },
    Walk { db_path: PathBuf },
    Results { db_path: PathBuf, id: String },
    Links { db_path: PathBuf, id: String },
    Check { db_path: PathBuf, json: bool },
    Release { db_path: PathBuf, result_id: String },
    Version,
    Help,
}

pub fn parse_args() -> Result<Command> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        return Err(anyhow::anyhow!("Missing command"));
    }

    let command = &args[1];

    match command.as_str() {
        "--help" | "-h" | "help" => Ok(Command::Help),
        "--version" | "-V" | "version" => Ok(Command::Version),
        "status" => {
            let (db_path, json) = parse_db_and_json(&args)?;
            Ok(Command::Status { db_path, json })
        }
        "walk" => {
            let (db_path, _) = parse_db_and_json(&args)?;
            Ok(Command::Walk { db_path })
        }
        "results" => {
            let (db_path, id) = parse_db_and_value(&args, "--id")?;
            Ok(Command::Results { db_path, id })
        }
        "links" => {
            let (db_path, id) = parse_db_and_value(&args, "--id")?;
            Ok(Command::Links { db_path, id })
        }
        "check" => {
            let (db_path, json) = parse_db_and_json(&args)?;
            Ok(Command::Check { db_path, json })
        }
        "release" => {
            let (db_path, result_id) = parse_db_and_value(&args, "--result")?;
            Ok(Command::Release { db_path, result_id })
        }
        _ => Err(anyhow::anyhow!("Unknown command: {}", command)),
    }
}

/// Parse `--db <FILE>` plus an optional `--json` flag.
fn parse_db_and_json(args: &[String]) -> Result<(PathBuf, bool)> {
    let mut db_path: Option<PathBuf> = None;
    let mut json = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--db" => {
                if i + 1 >= args.len() {
                    return Err(anyhow::anyhow!("--db requires an argument"));
                }
                db_path = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--json" => {
                json = true;
                i += 1;
            }
            _ => {
                return Err(anyhow::anyhow!("Unknown argument: {}", args[i]));
            }
        }
    }

    let db_path = db_path.ok_or_else(|| anyhow::anyhow!("--db is required"))?;
    Ok((db_path, json))
}

/// Parse `--db <FILE>` plus one required string flag.
fn parse_db_and_value(args: &[String], flag: &str) -> Result<(PathBuf, String)> {
    let mut db_path: Option<PathBuf> = None;
    let mut value: Option<String> = None;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--db" => {
                if i + 1 >= args.len() {
                    return Err(anyhow::anyhow!("--db requires an argument"));
                }
                db_path = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            arg if arg == flag => {
                if i + 1 >= args.len() {
                    return Err(anyhow::anyhow!("{} requires an argument", flag));
                }
                value = Some(args[i + 1].clone());
                i += 2;
            }
            _ => {
                return Err(anyhow::anyhow!("Unknown argument: {}", args[i]));
            }
        }
    }

    let db_path = db_path.ok_or_else(|| anyhow::anyhow!("--db is required"))?;
    let value = value.ok_or_else(|| anyhow::anyhow!("{} is required", flag))?;
    Ok((db_path, value))
}
