//! CLI entry point for `kc2spicedb`.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use kc2spicedb::output::formatter::{self, Artifacts};
use kc2spicedb::parser::structure::JsonSchemaValidator;
use kc2spicedb::translate::SchemaSource;
use kc2spicedb::{TranslateOptions, Translator};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "openai")]
use kc2spicedb::enhance::openai::{OpenAiEnhancer, DEFAULT_MODEL};
#[cfg(feature = "openai")]
use kc2spicedb::enhance::EnhanceConfig;

#[derive(Parser)]
#[command(
    name = "kc2spicedb",
    version,
    about = "Translate Keycloak realm exports into SpiceDB schemas"
)]
struct Cli {
    /// Log debug detail to standard error
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Translate realm exports and write `.zed` schema files
    Translate(TranslateArgs),
    /// Translate one realm export and print the schema to standard output
    Preview(PreviewArgs),
}

#[derive(Args)]
struct TranslateArgs {
    /// Realm export files, or directories whose `*.json` files are translated
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Schema output file (single input only)
    #[arg(short, long, value_name = "FILE", conflicts_with = "output_dir")]
    output: Option<PathBuf>,

    /// Directory for output files (default: next to each input)
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Also write `<name>_report.md`
    #[arg(long)]
    report: bool,

    /// Also write `<name>_relationships.txt`
    #[arg(long)]
    relationships: bool,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

#[derive(Args)]
struct PreviewArgs {
    /// Realm export file
    input: PathBuf,

    #[command(flatten)]
    pipeline: PipelineArgs,
}

#[derive(Args)]
struct PipelineArgs {
    /// Use the deterministic schema without asking an enhancer
    #[arg(long)]
    no_enhance: bool,

    /// Drop unresolved role references with a warning instead of failing
    #[arg(long)]
    lenient: bool,

    /// JSON Schema every realm export must satisfy
    #[arg(long, value_name = "FILE")]
    json_schema: Option<PathBuf>,

    /// Seconds to wait for each enhancement attempt
    #[cfg(feature = "openai")]
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    enhance_timeout: u64,

    /// Retry a failed enhancement attempt once
    #[cfg(feature = "openai")]
    #[arg(long)]
    enhance_retry: bool,

    /// Chat model used for enhancement
    #[cfg(feature = "openai")]
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// API key for the enhancement service
    #[cfg(feature = "openai")]
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Chat-completions URL of an OpenAI-compatible service
    #[cfg(feature = "openai")]
    #[arg(long, value_name = "URL")]
    endpoint: Option<String>,
}

impl PipelineArgs {
    fn options(&self) -> TranslateOptions {
        TranslateOptions {
            enhance: cfg!(feature = "openai") && !self.no_enhance,
            strict: !self.lenient,
        }
    }

    fn translator(&self) -> Result<Translator, String> {
        let mut translator = Translator::new();
        if let Some(path) = &self.json_schema {
            translator = translator.with_structural_validator(JsonSchemaValidator::from_path(path)?);
        }
        self.configure_enhancer(translator)
    }

    #[cfg(feature = "openai")]
    fn configure_enhancer(&self, translator: Translator) -> Result<Translator, String> {
        let Some(api_key) = self.api_key.as_ref().filter(|_| !self.no_enhance) else {
            return Ok(translator);
        };
        let config = EnhanceConfig::default()
            .with_timeout(std::time::Duration::from_secs(self.enhance_timeout))
            .with_max_retries(u32::from(self.enhance_retry));
        let mut enhancer =
            OpenAiEnhancer::new(api_key.clone(), self.model.clone(), config.timeout())
                .map_err(|e| e.to_string())?;
        if let Some(endpoint) = &self.endpoint {
            enhancer = enhancer.with_endpoint(endpoint.clone());
        }
        Ok(translator.with_enhancer(enhancer, config))
    }

    #[cfg(not(feature = "openai"))]
    fn configure_enhancer(&self, translator: Translator) -> Result<Translator, String> {
        Ok(translator)
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match &cli.command {
        Command::Translate(args) => run_translate(args),
        Command::Preview(args) => run_preview(args),
    };
    process::exit(code);
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "kc2spicedb=debug"
    } else {
        "kc2spicedb=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_translate(args: &TranslateArgs) -> i32 {
    let inputs = match collect_inputs(&args.inputs) {
        Ok(inputs) => inputs,
        Err(e) => {
            eprintln!("Error: {e}");
            return 2;
        }
    };
    if inputs.is_empty() {
        eprintln!("No realm export files found");
        return 2;
    }
    if args.output.is_some() && inputs.len() > 1 {
        eprintln!("--output can only be used with a single input");
        return 2;
    }

    let translator = match args.pipeline.translator() {
        Ok(translator) => translator,
        Err(e) => {
            eprintln!("Error: {e}");
            return 2;
        }
    };
    let options = args.pipeline.options();
    let artifacts = Artifacts {
        report: args.report,
        relationships: args.relationships,
    };

    let mut failed = false;
    let mut io_failed = false;
    for input in &inputs {
        let raw = match std::fs::read_to_string(input) {
            Ok(raw) => raw,
            Err(e) => {
                eprintln!("Error reading {}: {e}", input.display());
                io_failed = true;
                continue;
            }
        };

        let translation = match translator.translate(&raw, &options) {
            Ok(translation) => translation,
            Err(e) => {
                eprintln!("Error translating {}: {e}", input.display());
                failed = true;
                continue;
            }
        };
        if args.relationships && translation.source != SchemaSource::Baseline {
            warn!(
                "{}: relationships are only derived for the deterministic schema",
                input.display()
            );
        }

        let target = schema_path(args, input);
        match formatter::write_output(&target, &translation, artifacts) {
            Ok(paths) => {
                for path in paths {
                    info!("wrote {}", path.display());
                }
            }
            Err(e) => {
                eprintln!("Error writing output: {e}");
                io_failed = true;
            }
        }
    }

    if io_failed {
        2
    } else if failed {
        1
    } else {
        0
    }
}

fn run_preview(args: &PreviewArgs) -> i32 {
    let raw = match std::fs::read_to_string(&args.input) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("Error reading {}: {e}", args.input.display());
            return 2;
        }
    };
    let translator = match args.pipeline.translator() {
        Ok(translator) => translator,
        Err(e) => {
            eprintln!("Error: {e}");
            return 2;
        }
    };

    match translator.translate(&raw, &args.pipeline.options()) {
        Ok(translation) => {
            print!("{}", translation.schema);
            0
        }
        Err(e) => {
            eprintln!("Error translating {}: {e}", args.input.display());
            1
        }
    }
}

/// Expand directories into their `*.json` files, sorted by file name.
fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>, String> {
    let mut inputs = Vec::new();
    for path in paths {
        if !path.is_dir() {
            inputs.push(path.clone());
            continue;
        }
        let entries = std::fs::read_dir(path)
            .map_err(|e| format!("Failed to read directory {}: {e}", path.display()))?;
        let mut found = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == "json"))
            .collect::<Vec<_>>();
        found.sort();
        inputs.extend(found);
    }
    Ok(inputs)
}

fn schema_path(args: &TranslateArgs, input: &Path) -> PathBuf {
    if let Some(output) = &args.output {
        return output.clone();
    }
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("realm");
    let dir = match &args.output_dir {
        Some(dir) => dir.as_path(),
        None => input.parent().unwrap_or(Path::new("")),
    };
    dir.join(format!("{stem}.zed"))
}
