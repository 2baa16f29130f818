mod wizard;

use clap::{Args, Parser, Subcommand, ValueEnum};
use form_spec::{
    EvalOptions, FieldValue, FormLibrary, FormSchema, FormSession, FormValues, JsonFileStore,
    ValidationResult, build_render_payload, derive_all_with, form_json_schema, render_json_ui,
    render_text, validate,
};
use serde::Deserialize;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use wizard::{PromptContext, Verbosity, WizardPresenter, parse_answer};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

const DEFAULT_LOG_FILTER: &str = "form_spec=warn,form_cli=info";

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Form schema CLI",
    long_about = "Checks form schemas, evaluates derived fields and validation rules, and fills forms in a text shell"
)]
struct Cli {
    /// JSON file holding the saved forms.
    #[arg(long, global = true, env = "FORM_STORE", default_value = "forms.json")]
    store: PathBuf,
    /// Optional JSON config file (expression limits).
    #[arg(long, global = true, env = "FORM_CLI_CONFIG")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum RenderMode {
    Text,
    Json,
}

/// Where to read the schema from: a file or the store.
#[derive(Args, Clone, Debug)]
#[group(required = true, multiple = false)]
struct SchemaSource {
    /// Path to a FormSchema JSON file.
    #[arg(long, value_name = "SPEC")]
    spec: Option<PathBuf>,
    /// Id of a form saved in the store.
    #[arg(long, value_name = "ID")]
    form: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// List the forms saved in the store.
    List,
    /// Render a form with its current (or supplied) values.
    Show {
        #[command(flatten)]
        source: SchemaSource,
        /// JSON file with field values.
        #[arg(long, value_name = "VALUES")]
        values: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = RenderMode::Text)]
        format: RenderMode,
    },
    /// Save a FormSchema JSON file into the store, replacing a form with the same id.
    Import {
        #[arg(long, value_name = "SPEC")]
        spec: PathBuf,
    },
    /// Remove a form from the store.
    Delete {
        #[arg(long, value_name = "ID")]
        form: String,
    },
    /// Report schema invariant violations.
    Check {
        #[command(flatten)]
        source: SchemaSource,
    },
    /// Validate field values against a schema.
    Validate {
        #[command(flatten)]
        source: SchemaSource,
        #[arg(long, value_name = "VALUES")]
        values: PathBuf,
    },
    /// Recompute derived fields and print the updated values.
    Derive {
        #[command(flatten)]
        source: SchemaSource,
        #[arg(long, value_name = "VALUES")]
        values: PathBuf,
    },
    /// Fill a form in interactively.
    Fill {
        #[command(flatten)]
        source: SchemaSource,
        /// Show derived values and diagnostics after each answer.
        #[arg(long, alias = "debug")]
        verbose: bool,
        /// Print the submitted values as JSON.
        #[arg(long)]
        values_json: bool,
        /// Also write the submitted values to this file.
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Print the JSON Schema of the FormSchema document.
    Schema,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CliConfig {
    eval: EvalOptions,
}

fn main() -> CliResult<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let store = JsonFileStore::new(&cli.store);

    match cli.command {
        Command::List => run_list(store),
        Command::Show {
            source,
            values,
            format,
        } => run_show(store, &config, &source, values.as_deref(), format),
        Command::Import { spec } => run_import(store, &spec),
        Command::Delete { form } => run_delete(store, &form),
        Command::Check { source } => run_check(store, &config, &source),
        Command::Validate { source, values } => run_validate(store, &config, &source, &values),
        Command::Derive { source, values } => run_derive(store, &config, &source, &values),
        Command::Fill {
            source,
            verbose,
            values_json,
            out,
        } => run_fill(store, &config, &source, verbose, values_json, out.as_deref()),
        Command::Schema => {
            println!("{}", serde_json::to_string_pretty(&form_json_schema())?);
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> CliResult<CliConfig> {
    let Some(path) = path else {
        return Ok(CliConfig::default());
    };
    let raw = fs::read_to_string(path)
        .map_err(|err| format!("failed to read config {}: {}", path.display(), err))?;
    let config = serde_json::from_str(&raw)?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

fn load_schema(store: JsonFileStore, source: &SchemaSource) -> CliResult<FormSchema> {
    if let Some(path) = &source.spec {
        let raw = fs::read_to_string(path)?;
        return Ok(serde_json::from_str(&raw)?);
    }
    let id = source.form.as_deref().ok_or("either --spec or --form is required")?;
    let library = FormLibrary::load(store)?;
    library
        .get(id)
        .cloned()
        .ok_or_else(|| format!("form '{}' is not in the store", id).into())
}

fn load_values(path: &Path) -> CliResult<FormValues> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn run_list(store: JsonFileStore) -> CliResult<()> {
    let library = FormLibrary::load(store)?;
    if library.forms().is_empty() {
        println!("No forms saved.");
        return Ok(());
    }
    for form in library.forms() {
        println!(
            "{}  {}  ({} fields, created {})",
            form.id,
            form.title,
            form.fields.len(),
            form.created_at.to_rfc3339()
        );
    }
    Ok(())
}

fn run_show(
    store: JsonFileStore,
    config: &CliConfig,
    source: &SchemaSource,
    values_path: Option<&Path>,
    format: RenderMode,
) -> CliResult<()> {
    let schema = load_schema(store, source)?;
    let session = match values_path {
        Some(path) => FormSession::with_values(&schema, load_values(path)?, config.eval),
        None => FormSession::with_options(&schema, config.eval),
    };
    let errors = if values_path.is_some() {
        validate(&schema, session.values()).errors
    } else {
        Default::default()
    };
    let payload = build_render_payload(&schema, session.values(), &errors);
    match format {
        RenderMode::Text => println!("{}", render_text(&payload)),
        RenderMode::Json => println!("{}", serde_json::to_string_pretty(&render_json_ui(&payload))?),
    }
    Ok(())
}

fn run_import(store: JsonFileStore, spec_path: &Path) -> CliResult<()> {
    let raw = fs::read_to_string(spec_path)?;
    let schema: FormSchema = serde_json::from_str(&raw)?;
    let issues = schema.check();
    for issue in &issues {
        tracing::warn!(form = %schema.id, %issue, "schema issue");
    }
    let mut library = FormLibrary::load(store)?;
    let id = schema.id.clone();
    library.upsert_form(schema)?;
    println!("Saved form {} ({} issue(s))", id, issues.len());
    Ok(())
}

fn run_delete(store: JsonFileStore, form_id: &str) -> CliResult<()> {
    let mut library = FormLibrary::load(store)?;
    if library.delete_form(form_id)? {
        println!("Deleted form {}", form_id);
        Ok(())
    } else {
        Err(format!("form '{}' is not in the store", form_id).into())
    }
}

fn run_check(store: JsonFileStore, config: &CliConfig, source: &SchemaSource) -> CliResult<()> {
    let schema = load_schema(store, source)?;
    let issues = schema.check_with(&config.eval);
    if issues.is_empty() {
        println!("Schema {} is consistent.", schema.id);
        return Ok(());
    }
    println!("Schema {} has {} issue(s):", schema.id, issues.len());
    for issue in &issues {
        println!("  {}", issue);
    }
    Err("schema check failed".into())
}

fn run_validate(
    store: JsonFileStore,
    config: &CliConfig,
    source: &SchemaSource,
    values_path: &Path,
) -> CliResult<()> {
    let schema = load_schema(store, source)?;
    let values = load_values(values_path)?;
    let values = derive_all_with(&schema.fields, &values, &config.eval).into_values();

    let result = validate(&schema, &values);
    println!(
        "Validation result: {}",
        if result.valid { "valid" } else { "invalid" }
    );
    describe_validation(&result);

    if result.valid {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

fn describe_validation(result: &ValidationResult) {
    if !result.errors.is_empty() {
        println!("Errors:");
        for (field_id, message) in &result.errors {
            println!("  {} - {}", field_id, message);
        }
    }
    if !result.rule_errors.is_empty() {
        println!("Rules that could not be applied:");
        for (field_id, error) in &result.rule_errors {
            println!("  {} - {}", field_id, error);
        }
    }
}

fn run_derive(
    store: JsonFileStore,
    config: &CliConfig,
    source: &SchemaSource,
    values_path: &Path,
) -> CliResult<()> {
    let schema = load_schema(store, source)?;
    let values = load_values(values_path)?;
    let derivation = derive_all_with(&schema.fields, &values, &config.eval);
    for failure in &derivation.failures {
        eprintln!("{} not updated: {}", failure.field_id, failure.error);
    }
    println!("{}", serde_json::to_string_pretty(&derivation.values)?);
    Ok(())
}

fn run_fill(
    store: JsonFileStore,
    config: &CliConfig,
    source: &SchemaSource,
    verbose: bool,
    values_json: bool,
    out: Option<&Path>,
) -> CliResult<()> {
    let schema = load_schema(store, source)?;
    let mut session = FormSession::with_options(&schema, config.eval);
    let mut presenter = WizardPresenter::new(Verbosity::from_verbose(verbose), values_json);
    let stdin = io::stdin();
    let mut input = stdin.lock();

    loop {
        let payload = session.render();
        presenter.show_header(&payload);
        let editable: Vec<_> = payload
            .fields
            .iter()
            .filter(|field| !field.read_only)
            .collect();

        for (position, field) in editable.iter().enumerate() {
            let prompt = PromptContext::new(field, position + 1, editable.len());
            loop {
                presenter.show_prompt(&prompt);
                let line = read_line(&mut input)?;
                let value = match parse_answer(field, &line) {
                    Ok(Some(value)) => value,
                    Ok(None) => session
                        .values()
                        .get(&field.id)
                        .cloned()
                        .unwrap_or(FieldValue::Unset),
                    Err(err) => {
                        presenter.show_parse_error(&err);
                        continue;
                    }
                };
                let outcome = session.set_value(&field.id, value)?;
                presenter.show_edit(&outcome, session.values());
                if outcome.error.is_none() {
                    break;
                }
            }
        }

        match session.submit() {
            Ok(values) => {
                presenter.show_completion(&values);
                if let Some(path) = out {
                    fs::write(path, serde_json::to_string_pretty(&values)?)?;
                }
                return Ok(());
            }
            Err(result) => {
                presenter.show_rejected(&result);
                if result.errors.is_empty() {
                    return Err("form has validation rules that cannot be applied".into());
                }
            }
        }
    }
}

fn read_line(input: &mut impl BufRead) -> CliResult<String> {
    io::stdout().flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err("input ended before the form was complete".into());
    }
    Ok(line)
}
