//! envconf CLI - Command-line interface for environment-aware configuration
//!
//! Usage:
//!   envconf -l app.yaml -l local.properties -t database properties
//!   envconf -l app.yaml -t database --env prod get db.url
//!   envconf -l app.yaml -t database resolve beans.yaml --format json
//!   envconf environments app.yaml

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use envconf_core::{
    AllowList, ConfigurerOptions, DefinitionTree, DocumentFormat, EnvironmentDocument,
    EnvironmentFallback, Error, ErrorKind, PlaceholderConfigurer, PropertySet,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// envconf - Environment-aware configuration with placeholder resolution
#[derive(Parser)]
#[command(name = "envconf")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    sources: SourceArgs,

    /// Enable verbose logging (sets log level to DEBUG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Options shared by every command that loads locations
#[derive(Args, Debug, Default)]
struct SourceArgs {
    /// Options file (YAML or JSON); flags below override its values
    #[arg(long, global = true)]
    options: Option<PathBuf>,

    /// Source location, repeatable; later locations win
    #[arg(short, long = "location", global = true)]
    locations: Vec<PathBuf>,

    /// Allowed configuration types, comma-separated; repeatable
    #[arg(short, long = "types", global = true)]
    types: Vec<String>,

    /// Environment override (defaults to $SERVER_ENVIRONMENT, then the document default)
    #[arg(short, long, global = true)]
    env: Option<String>,

    /// Encoding label for flat property files (e.g. ISO-8859-1)
    #[arg(long, global = true)]
    encoding: Option<String>,

    /// Skip locations that cannot be read or parsed
    #[arg(long, global = true)]
    ignore_missing: bool,

    /// Resolved value that means "no value"
    #[arg(long, global = true)]
    null_value: Option<String>,

    /// Fail on placeholders that cannot be resolved
    #[arg(long, global = true)]
    strict: bool,

    /// Process environment variables in lookups [default: fallback, or the options file's value]
    #[arg(long, value_enum, global = true)]
    env_vars: Option<EnvVars>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum EnvVars {
    /// Only loaded properties
    Never,
    /// Loaded properties first, then environment variables
    Fallback,
    /// Environment variables first
    Override,
}

impl From<EnvVars> for EnvironmentFallback {
    fn from(mode: EnvVars) -> Self {
        match mode {
            EnvVars::Never => EnvironmentFallback::Never,
            EnvVars::Fallback => EnvironmentFallback::Fallback,
            EnvVars::Override => EnvironmentFallback::Override,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the merged property set
    Properties {
        /// Resolve placeholders in every value
        #[arg(short, long)]
        resolve: bool,

        /// Output format: text, json, yaml
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print one resolved property
    Get {
        /// Property name (e.g., db.url)
        key: String,

        /// Default value if the property is not defined
        #[arg(short, long)]
        default: Option<String>,
    },

    /// Resolve placeholders in a definitions file and print the result
    Resolve {
        /// Definitions file (YAML or JSON)
        definitions: PathBuf,

        /// Definition excluded from resolution
        #[arg(long)]
        own: Option<String>,

        /// Output format: yaml, json
        #[arg(short, long, default_value = "yaml")]
        format: String,
    },

    /// List the environments declared by a structured document
    Environments {
        /// Structured document (.yaml, .yml or .json)
        document: PathBuf,

        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

/// Run the CLI with the given arguments
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    // ENVCONF_LOG takes precedence; otherwise WARN, or DEBUG with --verbose
    let filter = EnvFilter::try_from_env("ENVCONF_LOG").unwrap_or_else(|_| {
        let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
        EnvFilter::default().add_directive(level.into())
    });
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    match cli.command {
        Commands::Properties { resolve, format } => {
            cmd_properties(&cli.sources, resolve, &format)
        }
        Commands::Get { key, default } => cmd_get(&cli.sources, &key, default),
        Commands::Resolve {
            definitions,
            own,
            format,
        } => cmd_resolve(&cli.sources, definitions, own, &format),
        Commands::Environments { document, format } => cmd_environments(document, &format),
    }
}

/// Options file first, then flag overrides
fn build_options(args: &SourceArgs) -> Result<ConfigurerOptions, Error> {
    let mut options = match &args.options {
        Some(path) => ConfigurerOptions::from_file(path)?,
        None => ConfigurerOptions::default(),
    };

    if !args.locations.is_empty() {
        options.locations = args.locations.clone();
    }
    if !args.types.is_empty() {
        options.configuration_types = args.types.iter().map(|t| AllowList::parse(t)).collect();
    }
    if args.env.is_some() {
        options.environment = args.env.clone();
    }
    if args.encoding.is_some() {
        options.file_encoding = args.encoding.clone();
    }
    if args.ignore_missing {
        options.ignore_resource_not_found = true;
    }
    if args.null_value.is_some() {
        options.placeholder.null_value = args.null_value.clone();
    }
    if args.strict {
        options.placeholder.ignore_unresolvable = false;
    }
    match args.env_vars {
        Some(mode) => options.placeholder.environment_fallback = mode.into(),
        None if args.options.is_none() => {
            options.placeholder.environment_fallback = EnvironmentFallback::Fallback
        }
        None => {}
    }

    Ok(options)
}

/// 2 for load and usage failures, 1 for resolution failures
fn exit_code_for(err: &Error) -> ExitCode {
    match err.kind {
        ErrorKind::ResourceOpen
        | ErrorKind::ResourceRead
        | ErrorKind::MalformedDocument
        | ErrorKind::Parse => ExitCode::from(2),
        _ => ExitCode::from(1),
    }
}

fn report(err: &Error) -> ExitCode {
    eprintln!("{} {}", "✗".red(), err);
    exit_code_for(err)
}

fn load_configurer(args: &SourceArgs) -> Result<PlaceholderConfigurer, ExitCode> {
    let options = build_options(args).map_err(|e| report(&e))?;
    if options.locations.is_empty() {
        eprintln!(
            "{}: No locations given; use --location or an options file",
            "Error".red()
        );
        return Err(ExitCode::from(2));
    }
    Ok(PlaceholderConfigurer::new(options))
}

fn cmd_properties(args: &SourceArgs, resolve: bool, format: &str) -> ExitCode {
    let configurer = match load_configurer(args) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let loaded = match configurer.load_properties() {
        Ok(loaded) => loaded,
        Err(e) => return report(&e),
    };
    if !loaded.skipped.is_empty() {
        log::info!("{} locations were skipped", loaded.skipped.len());
    }

    let properties = if resolve {
        let resolver = match configurer.build_resolver(loaded.properties) {
            Ok(resolver) => resolver,
            Err(e) => return report(&e),
        };
        let mut resolved = PropertySet::new();
        for (key, raw) in resolver.properties().iter() {
            match resolver.resolve(raw) {
                Ok(Some(value)) => {
                    resolved.insert(key, value);
                }
                Ok(None) => {
                    resolved.insert(key, "null");
                }
                Err(e) => {
                    let e = e.with_help(format!("While resolving property '{}'", key));
                    return report(&e);
                }
            }
        }
        resolved
    } else {
        loaded.properties
    };

    let output = match format {
        "json" => serde_json::to_string_pretty(&properties)
            .map(|s| s + "\n")
            .map_err(|e| e.to_string()),
        "yaml" => serde_yaml::to_string(&properties).map_err(|e| e.to_string()),
        _ => Ok(properties
            .iter()
            .map(|(k, v)| format!("{}={}\n", k, v))
            .collect::<String>()),
    };

    match output {
        Ok(content) => {
            print!("{}", content);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            ExitCode::from(1)
        }
    }
}

fn cmd_get(args: &SourceArgs, key: &str, default: Option<String>) -> ExitCode {
    let configurer = match load_configurer(args) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let loaded = match configurer.load_properties() {
        Ok(loaded) => loaded,
        Err(e) => return report(&e),
    };
    let resolver = match configurer.build_resolver(loaded.properties) {
        Ok(resolver) => resolver,
        Err(e) => return report(&e),
    };

    if !resolver.contains(key) {
        return match default {
            Some(default_val) => {
                println!("{}", default_val);
                ExitCode::SUCCESS
            }
            None => {
                eprintln!("{}: Property '{}' not found", "Error".red(), key);
                ExitCode::from(1)
            }
        };
    }

    match resolver.get(key) {
        Ok(Some(value)) => {
            println!("{}", value);
            ExitCode::SUCCESS
        }
        Ok(None) => {
            println!("null");
            ExitCode::SUCCESS
        }
        Err(e) => report(&e),
    }
}

fn cmd_resolve(
    args: &SourceArgs,
    definitions: PathBuf,
    own: Option<String>,
    format: &str,
) -> ExitCode {
    let mut configurer_options = match build_options(args) {
        Ok(o) => o,
        Err(e) => return report(&e),
    };
    if own.is_some() {
        configurer_options.own_definition = own;
    }
    let configurer = PlaceholderConfigurer::new(configurer_options);

    let mut tree = match DefinitionTree::from_file(&definitions) {
        Ok(t) => t,
        Err(e) => return report(&e),
    };

    match configurer.post_process(&mut tree) {
        Ok(Some(properties)) => {
            log::debug!("Resolved definitions against {} properties", properties.len());
        }
        Ok(None) => {
            eprintln!(
                "{} No locations given; definitions are printed unchanged",
                "⚠".yellow()
            );
        }
        Err(e) => return report(&e),
    }

    let output = match format {
        "json" => serde_json::to_string_pretty(&tree)
            .map(|s| s + "\n")
            .map_err(|e| e.to_string()),
        _ => serde_yaml::to_string(&tree).map_err(|e| e.to_string()),
    };

    match output {
        Ok(content) => {
            print!("{}", content);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            ExitCode::from(1)
        }
    }
}

fn cmd_environments(document: PathBuf, format: &str) -> ExitCode {
    let Some(doc_format) = document
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(DocumentFormat::from_filename)
    else {
        eprintln!(
            "{}: {} is not a structured document (.yaml, .yml or .json)",
            "Error".red(),
            document.display()
        );
        return ExitCode::from(2);
    };

    let content = match std::fs::read_to_string(&document) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{} {}: {}", "✗".red(), document.display(), e);
            return ExitCode::from(2);
        }
    };

    let parsed = match EnvironmentDocument::parse(&content, doc_format) {
        Ok(d) => d,
        Err(e) => return report(&e.with_resource(document.display().to_string())),
    };

    if format == "json" {
        let environments: Vec<_> = parsed
            .environment_names()
            .map(|name| {
                let types: Vec<_> = parsed
                    .entries_for(name)
                    .iter()
                    .map(|e| e.config_type())
                    .collect();
                serde_json::json!({ "name": name, "types": types })
            })
            .collect();
        let json = serde_json::json!({
            "default": parsed.default_environment(),
            "environments": environments,
        });
        match serde_json::to_string_pretty(&json) {
            Ok(s) => println!("{}", s),
            Err(e) => {
                eprintln!("{}: {}", "Error".red(), e);
                return ExitCode::from(1);
            }
        }
        return ExitCode::SUCCESS;
    }

    for name in parsed.environment_names() {
        let types: Vec<_> = parsed
            .entries_for(name)
            .iter()
            .map(|e| e.config_type())
            .collect();
        if name == parsed.default_environment() {
            println!("{} {} [{}]", "*".green(), name.bold(), types.join(", "));
        } else {
            println!("  {} [{}]", name, types.join(", "));
        }
    }

    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = parse(&["envconf", "get", "db.url", "-l", "app.yaml", "-t", "database,cache"]);

        assert_eq!(cli.sources.locations, vec![PathBuf::from("app.yaml")]);
        assert_eq!(cli.sources.types, vec!["database,cache"]);
        assert!(matches!(cli.command, Commands::Get { ref key, .. } if key == "db.url"));
    }

    #[test]
    fn test_flags_build_options() {
        let cli = parse(&[
            "envconf",
            "-l",
            "a.properties",
            "-l",
            "app.yaml",
            "-t",
            "database",
            "-t",
            "cache, web",
            "--env",
            "prod",
            "--encoding",
            "ISO-8859-1",
            "--ignore-missing",
            "--null-value",
            "@null",
            "--strict",
            "properties",
        ]);
        let options = build_options(&cli.sources).unwrap();

        assert_eq!(options.locations.len(), 2);
        assert_eq!(options.configuration_types.len(), 2);
        assert!(options.configuration_types[1].contains("web"));
        assert_eq!(options.environment.as_deref(), Some("prod"));
        assert_eq!(options.file_encoding.as_deref(), Some("ISO-8859-1"));
        assert!(options.ignore_resource_not_found);
        assert_eq!(options.placeholder.null_value.as_deref(), Some("@null"));
        assert!(!options.placeholder.ignore_unresolvable);
    }

    #[test]
    fn test_defaults_without_flags() {
        let cli = parse(&["envconf", "properties"]);
        let mut options = build_options(&cli.sources).unwrap();

        assert_eq!(options.placeholder.environment_fallback, EnvironmentFallback::Fallback);
        options.placeholder.environment_fallback = EnvironmentFallback::Never;
        assert_eq!(options, ConfigurerOptions::default());
    }

    #[test]
    fn test_env_vars_flag() {
        let cli = parse(&["envconf", "--env-vars", "override", "properties"]);
        let options = build_options(&cli.sources).unwrap();
        assert_eq!(options.placeholder.environment_fallback, EnvironmentFallback::Override);

        assert!(Cli::try_parse_from(["envconf", "--env-vars", "always", "properties"]).is_err());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            exit_code_for(&Error::resource_read("a.properties", "bad")),
            ExitCode::from(2)
        );
        assert_eq!(
            exit_code_for(&Error::circular_reference("a", vec!["a".into(), "a".into()])),
            ExitCode::from(1)
        );
    }
}
