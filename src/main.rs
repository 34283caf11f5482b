use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use wikilink::link::Link;
use wikilink::site::{Site, SiteInfo, SiteRegistry, Sites};
use wikilink::wikibase::{
    EditOptions, EntityEdit, EntityId, Repository, RepositoryError, WikibaseEntity,
};

#[derive(Debug, Parser)]
#[command(name = "wikilink")]
#[command(about = "Resolve wiki links and diff Wikibase entities")]
struct CommandLine {
    /// Verbosity level (-v, -vv, -vvv), overridden by RUST_LOG
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Site configuration as FAMILY:CODE=PATH, from a siteinfo API response (.json) or an
    /// XML dump (anything else)
    #[arg(long = "siteinfo", value_name = "FAMILY:CODE=PATH", global = true)]
    siteinfo: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve link texts and print them as JSON, one per line
    Resolve {
        /// The site the links were found on
        #[arg(long, value_name = "FAMILY:CODE")]
        source: String,
        texts: Vec<String>,
    },
    /// Print the wbeditentity request that turns BASELINE into CURRENT
    Diff { baseline: PathBuf, current: PathBuf },
}

/// Answers nothing; the entities of the `diff` command come from files.
#[derive(Debug)]
struct OfflineRepository;

fn offline() -> RepositoryError {
    RepositoryError::UnexpectedResponse("no repository configured".into())
}

impl Repository for OfflineRepository {
    fn concept_base_uri(&self) -> &str {
        "http://www.wikidata.org/entity/"
    }

    fn load_entity(&self, _: &EntityId) -> Result<Value, RepositoryError> {
        Err(offline())
    }

    fn edit_entity(&self, _: &EntityEdit, _: &EditOptions) -> Result<Value, RepositoryError> {
        Err(offline())
    }

    fn add_claim(&self, _: &EntityId, _: &Value, _: &EditOptions) -> Result<Value, RepositoryError> {
        Err(offline())
    }

    fn set_claim(&self, _: &Value, _: &EditOptions) -> Result<Value, RepositoryError> {
        Err(offline())
    }

    fn remove_claims(&self, _: &[&str], _: &EditOptions) -> Result<Value, RepositoryError> {
        Err(offline())
    }

    fn set_reference(&self, _: &str, _: &Value, _: Option<&str>, _: &EditOptions) -> Result<Value, RepositoryError> {
        Err(offline())
    }

    fn remove_references(&self, _: &str, _: &[&str], _: &EditOptions) -> Result<Value, RepositoryError> {
        Err(offline())
    }

    fn set_qualifier(&self, _: &str, _: &Value, _: &EditOptions) -> Result<Value, RepositoryError> {
        Err(offline())
    }

    fn remove_qualifiers(&self, _: &str, _: &[&str], _: &EditOptions) -> Result<Value, RepositoryError> {
        Err(offline())
    }
}

fn split_site(spec: &str) -> Result<(&str, &str), Box<dyn Error>> {
    spec.split_once(':')
        .filter(|(family, code)| !family.is_empty() && !code.is_empty())
        .ok_or_else(|| format!("expected FAMILY:CODE, got {spec:?}").into())
}

fn load_site_info(spec: &str) -> Result<SiteInfo, Box<dyn Error>> {
    let (site, path) = spec
        .split_once('=')
        .ok_or_else(|| format!("expected FAMILY:CODE=PATH, got {spec:?}"))?;
    let (family, code) = split_site(site)?;
    let path = Path::new(path);
    let reader = BufReader::new(File::open(path)?);

    let site_info = if path.extension().is_some_and(|ext| ext == "json") {
        let json: Value = serde_json::from_reader(reader)?;
        SiteInfo::from_api_json(family, code, &json)?
    } else {
        SiteInfo::from_dump_header(reader)?
    };
    tracing::info!(
        message = "Loaded site",
        site = %site_info.sitename(),
        namespaces = site_info.namespaces().len()
    );
    Ok(site_info)
}

fn resolve(sites: Arc<dyn Sites>, source: &str, texts: &[String]) -> Result<(), Box<dyn Error>> {
    let (family, code) = split_site(source)?;
    let source = Site::load(&sites, family, code)?;

    for text in texts {
        let link = Link::new(text, &source);
        let output = match link.parsed() {
            Ok(parsed) => json!({
                "text": text,
                "site": parsed.site().sitename().as_str(),
                "namespace": parsed.namespace(),
                "title": parsed.title(),
                "section": parsed.section(),
                "anchor": link.anchor(),
                "interwiki": parsed.is_interwiki(),
                "canonical": parsed.canonical_title(),
            }),
            Err(e) => json!({
                "text": text,
                "error": e.to_string(),
                "reason": e.reason().map(|reason| reason.to_string()),
            }),
        };
        println!("{output}");
    }
    Ok(())
}

fn read_json(path: &Path) -> Result<Value, Box<dyn Error>> {
    let file = File::open(path)
        .map_err(|e| format!("cannot open {}: {e}", path.display()))?;
    let json: Value = serde_json::from_reader(BufReader::new(file))?;
    // a whole wbgetentities response holding a single entity
    match json.get("entities").and_then(Value::as_object) {
        Some(entities) if entities.len() == 1 => Ok(entities.values().next().cloned().unwrap_or(Value::Null)),
        _ => Ok(json),
    }
}

fn diff(baseline: &Path, current: &Path) -> Result<(), Box<dyn Error>> {
    let repo: Arc<dyn Repository> = Arc::new(OfflineRepository);
    let baseline = read_json(baseline)?;
    let before = WikibaseEntity::from_json(repo.clone(), &baseline)?;
    let after = WikibaseEntity::from_json(repo, &read_json(current)?)?;
    if before.id() != after.id() {
        return Err(format!("cannot diff {} against {}", after.id(), before.id()).into());
    }

    let edit = EntityEdit::new(after.id(), after.to_json(Some(&baseline))?);
    println!("{}", serde_json::to_string_pretty(&edit)?);
    Ok(())
}

fn run(args: CommandLine) -> Result<(), Box<dyn Error>> {
    let mut registry = SiteRegistry::new();
    for spec in &args.siteinfo {
        registry.register(load_site_info(spec)?);
    }
    let sites: Arc<dyn Sites> = Arc::new(registry);

    match &args.command {
        Command::Resolve { source, texts } => resolve(sites, source, texts),
        Command::Diff { baseline, current } => diff(baseline, current),
    }
}

fn main() -> ExitCode {
    let args = CommandLine::parse();

    let default_level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install the log subscriber: {e}");
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(message = "Failed", error = %e);
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
