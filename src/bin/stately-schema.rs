//! Stately Schema CLI
//!
//! Command-line interface for compiling schema bundles, validating data,
//! and linting OpenAPI documents.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use stately_schema::{
    lint_document, load_document_auto, load_json, write_bundles, Compiler, EntityEntryPoints,
    OutputConfig, RelativePathPlugin, Severity, ValidateOptions, Validator,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stately-schema")]
#[command(about = "Compile OpenAPI schemas into node bundles and validate data against them")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile an OpenAPI document into schema bundles
    Generate {
        /// OpenAPI source: file path or URL (http:// or https://)
        openapi: String,

        /// Directory to write schemas.json and schemas.runtime.json into
        out_dir: PathBuf,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,

        /// Compile every schema instead of only entity entry points
        #[arg(long)]
        all_schemas: bool,
    },

    /// Validate a data file against a named schema
    Validate {
        /// OpenAPI source: file path or URL (http:// or https://)
        openapi: String,

        /// Schema name, e.g. Task
        schema: String,

        /// JSON data file to validate
        data: PathBuf,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,

        /// Depth at which validation stops descending
        #[arg(long, default_value_t = ValidateOptions::default().max_depth)]
        max_depth: usize,

        /// Depth at which a warning is logged
        #[arg(long, default_value_t = ValidateOptions::default().warn_depth)]
        warn_depth: usize,
    },

    /// Lint an OpenAPI document (broken refs, entity mappings)
    Lint {
        /// OpenAPI source: file path or URL (http:// or https://)
        openapi: String,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Generate {
            openapi,
            out_dir,
            pretty,
            all_schemas,
        } => run_generate(&openapi, &out_dir, pretty, all_schemas),

        Commands::Validate {
            openapi,
            schema,
            data,
            json,
            max_depth,
            warn_depth,
        } => {
            let options = ValidateOptions::new()
                .max_depth(max_depth)
                .warn_depth(warn_depth);
            run_validate(&openapi, &schema, &data, json, options)
        }

        Commands::Lint {
            openapi,
            format,
            strict,
        } => run_lint(&openapi, &format, strict),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn run_generate(source: &str, out_dir: &Path, pretty: bool, all_schemas: bool) -> Result<(), u8> {
    let document = load_document_auto(source).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let mut compiler = Compiler::new().with_plugin(RelativePathPlugin);
    if !all_schemas {
        compiler = compiler.with_plugin(EntityEntryPoints);
    }
    let output = compiler.compile(&document);

    let config = OutputConfig::new(out_dir).pretty(pretty);
    let written = write_bundles(&output, &config).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}

fn run_validate(
    source: &str,
    schema_name: &str,
    data_path: &Path,
    json_output: bool,
    options: ValidateOptions,
) -> Result<(), u8> {
    let document = load_document_auto(source).map_err(|e| {
        report_error(json_output, &format!("loading document: {}", e));
        e.exit_code() as u8
    })?;
    let data = load_json(data_path).map_err(|e| {
        report_error(json_output, &format!("loading data: {}", e));
        e.exit_code() as u8
    })?;

    let output = Compiler::new().with_plugin(RelativePathPlugin).compile(&document);
    let Some(node) = output.get(schema_name) else {
        report_error(json_output, &format!("schema not found: {}", schema_name));
        return Err(2);
    };

    let result = Validator::new(output.arena()).validate("", &data, node, options);
    if result.valid {
        if json_output {
            println!(r#"{{"valid":true}}"#);
        } else {
            println!("Valid");
        }
        return Ok(());
    }

    if json_output {
        let output = serde_json::json!({
            "valid": false,
            "errors": result.errors
        });
        println!("{}", output);
    } else {
        eprintln!("Validation failed:");
        for error in &result.errors {
            eprintln!("  {}", error);
        }
    }
    Err(1)
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", serde_json::json!({ "valid": false, "error": msg }));
    } else {
        eprintln!("Error: {}", msg);
    }
}

fn run_lint(source: &str, format: &str, strict: bool) -> Result<(), u8> {
    let document = load_document_auto(source).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let result = lint_document(&document);
    let passed = result.is_ok() && (!strict || result.warnings == 0);

    if format == "json" {
        let rendered = serde_json::to_string_pretty(&result).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?;
        println!("{}", rendered);
    } else {
        println!("Linting {} ...\n", source);

        for diag in &result.diagnostics {
            let (color, label) = match diag.severity {
                Severity::Error => ("\x1b[31m", "error"),
                Severity::Warning => ("\x1b[33m", "warning"),
            };
            println!(
                "  {}{}[{}]\x1b[0m: {}{} - {}",
                color, label, diag.code, diag.schema, diag.path, diag.message
            );
        }

        println!();
        if passed {
            println!(
                "\x1b[32m✓ {} schemas checked, all passed\x1b[0m",
                result.schemas_checked
            );
        } else {
            println!(
                "\x1b[31m✗ {} schemas checked ({} errors, {} warnings)\x1b[0m",
                result.schemas_checked, result.errors, result.warnings
            );
        }
    }

    if passed {
        Ok(())
    } else {
        Err(1)
    }
}
