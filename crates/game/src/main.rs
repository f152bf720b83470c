use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process::ExitCode;

use engine::{
    assign_rules, read_level, resolve_app_paths, write_level, AppPaths, InteractableKind,
    InteractableStore, InteractionOutcome, LevelSession, RuleCatalog, TileCoord,
    DEFAULT_RULE_COUNT,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::from(1)
        }
    }
}

#[derive(Debug, Default)]
struct CommonOptions {
    seed: Option<u64>,
    count: Option<usize>,
    catalog_path: Option<String>,
}

impl CommonOptions {
    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    fn catalog(&self) -> Result<RuleCatalog, String> {
        match &self.catalog_path {
            Some(path) => read_catalog_file(Path::new(path)),
            None => Ok(RuleCatalog::built_in()),
        }
    }
}

/// Optional catalog override file: `{ "rules": [...], "npc_names": [...] }`.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    rules: Vec<String>,
    #[serde(default)]
    npc_names: Vec<String>,
}

fn read_catalog_file(path: &Path) -> Result<RuleCatalog, String> {
    let raw = fs::read_to_string(path)
        .map_err(|error| format!("failed to read catalog '{}': {error}", path.display()))?;
    let mut deserializer = serde_json::Deserializer::from_str(&raw);
    let parsed: CatalogFile = serde_path_to_error::deserialize(&mut deserializer)
        .map_err(|error| format!("invalid catalog '{}': {error}", path.display()))?;
    if parsed.rules.is_empty() {
        return Err(format!("catalog '{}' has no rules", path.display()));
    }
    Ok(RuleCatalog::new(parsed.rules, parsed.npc_names))
}

fn run_cli() -> Result<(), String> {
    init_tracing();

    let args = env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() {
        return Err(usage_text());
    }
    if args[0] == "-h" || args[0] == "--help" {
        println!("{}", usage_text());
        return Ok(());
    }

    let mut options = CommonOptions::default();
    let mut index = 0usize;
    while index < args.len() {
        match args[index].as_str() {
            "--seed" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --seed".to_string())?;
                options.seed = Some(
                    value
                        .parse::<u64>()
                        .map_err(|_| format!("invalid --seed value '{value}' (expected u64)"))?,
                );
                index += 2;
            }
            "--count" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --count".to_string())?;
                options.count = Some(
                    value
                        .parse::<usize>()
                        .map_err(|_| format!("invalid --count value '{value}' (expected usize)"))?,
                );
                index += 2;
            }
            "--catalog" => {
                let value = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --catalog".to_string())?;
                options.catalog_path = Some(value.clone());
                index += 2;
            }
            _ => break,
        }
    }

    let command = args
        .get(index)
        .ok_or_else(|| "missing subcommand".to_string())?
        .as_str();
    let command_args = &args[(index + 1)..];
    let level = command_args
        .first()
        .ok_or_else(|| format!("{command} requires a level name"))?
        .as_str();
    if command_args.len() > 1 {
        return Err(format!("{command} takes a single level name"));
    }

    let paths = resolve_app_paths().map_err(|error| error.to_string())?;
    match command {
        "inspect" => inspect_level(&paths, level),
        "randomize" => randomize_level(&paths, level, &options),
        "play" => play_level(&paths, level, &options),
        other => Err(format!("unknown subcommand '{other}'")),
    }
}

fn inspect_level(paths: &AppPaths, level: &str) -> Result<(), String> {
    let path = paths.level_file(level);
    let document = read_level(&path).map_err(|error| error.to_string())?;
    let mut store = InteractableStore::new();
    let loaded = document.load_interactables(&mut store, level);

    println!(
        "level {level}: {loaded} interactables, rule_count={}",
        document
            .rule_count()
            .map(|count| count.to_string())
            .unwrap_or_else(|| format!("(default {DEFAULT_RULE_COUNT})"))
    );
    for item in store.interactables(level) {
        println!("  {}", describe(item.id.0, &item.kind, &item.tiles, item.pinned));
    }
    Ok(())
}

fn randomize_level(paths: &AppPaths, level: &str, options: &CommonOptions) -> Result<(), String> {
    let path = paths.level_file(level);
    let mut document = read_level(&path).map_err(|error| error.to_string())?;
    let mut store = InteractableStore::new();
    document.load_interactables(&mut store, level);

    let rule_count = options
        .count
        .or_else(|| document.rule_count())
        .unwrap_or(DEFAULT_RULE_COUNT);
    let catalog = options.catalog()?;
    let summary = assign_rules(&mut store, level, rule_count, &catalog, &mut options.rng())
        .map_err(|error| error.to_string())?;
    write_level(&mut document, &store, level).map_err(|error| error.to_string())?;

    info!(
        level,
        candidate_count = summary.candidate_count,
        assigned_count = summary.assigned_count,
        path = %path.display(),
        "level_randomized_and_saved"
    );
    println!(
        "assigned {} of {} candidates in {level}",
        summary.assigned_count, summary.candidate_count
    );
    Ok(())
}

fn play_level(paths: &AppPaths, level: &str, options: &CommonOptions) -> Result<(), String> {
    let catalog = options.catalog()?;
    let mut session = LevelSession::load(
        &paths.level_file(level),
        level,
        &catalog,
        options.rng(),
        options.count,
    );

    println!("playing {level}. Enter 'x y' to interact, 'rules' to list, 'quit' to leave.");
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("> ");
        stdout.flush().map_err(|error| error.to_string())?;
        let mut line = String::new();
        let read = stdin
            .lock()
            .read_line(&mut line)
            .map_err(|error| error.to_string())?;
        if read == 0 {
            break;
        }
        let trimmed = line.trim();
        match trimmed {
            "" => continue,
            "quit" | "exit" => break,
            "rules" => {
                println!("collected {} rule(s):", session.collected_rule_count());
                for rule in session.collected_rules() {
                    println!("  - {rule}");
                }
            }
            _ => match parse_coord(trimmed) {
                Some(coord) => {
                    let outcome = session.interact(coord);
                    println!("{}", outcome.message());
                    if matches!(outcome, InteractionOutcome::RuleFound { .. }) {
                        println!("({} collected)", session.collected_rule_count());
                    }
                }
                None => println!("expected 'x y', 'rules', or 'quit'"),
            },
        }
    }
    Ok(())
}

fn parse_coord(input: &str) -> Option<TileCoord> {
    let mut parts = input.split_whitespace();
    let x = parts.next()?.parse::<i32>().ok()?;
    let y = parts.next()?.parse::<i32>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(TileCoord::new(x, y))
}

fn describe(id: u64, kind: &InteractableKind, tiles: &[TileCoord], pinned: bool) -> String {
    let place = if tiles.len() == 1 {
        format!("({}, {})", tiles[0].x, tiles[0].y)
    } else {
        format!("({}, {}) +{} tiles", tiles[0].x, tiles[0].y, tiles.len() - 1)
    };
    let pin = if pinned { " [authored]" } else { "" };
    match kind {
        InteractableKind::Empty => format!("#{id} empty {place}"),
        InteractableKind::Note { rule } => match rule {
            Some(text) => format!("#{id} note {place}{pin}: {text}"),
            None => format!("#{id} note {place}: (no rule)"),
        },
        InteractableKind::Npc { name, rule } => {
            let name = name.as_deref().unwrap_or("(unnamed)");
            match rule {
                Some(text) => format!("#{id} npc {place} {name}{pin}: {text}"),
                None => format!("#{id} npc {place} {name}: (no rule)"),
            }
        }
        InteractableKind::Door {
            required_rule_count,
            ..
        } => format!("#{id} door {place}: requires {required_rule_count} rules"),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn usage_text() -> String {
    [
        "game - interactable registry and rule randomization driver",
        "",
        "Usage:",
        "  game inspect <level>",
        "  game [--seed <u64>] [--count <n>] [--catalog <file>] randomize <level>",
        "  game [--seed <u64>] [--count <n>] [--catalog <file>] play <level>",
        "",
        "Levels are read from <root>/assets/levels/<level>.json; set",
        "PASSAGE_ROOT to point at the project root explicitly.",
    ]
    .join("\n")
}
