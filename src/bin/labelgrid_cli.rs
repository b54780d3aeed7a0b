//! LabelGrid CLI - Template Inspection and Editing
//!
//! Commands: validate, variables, nodes, layout, split, unsplit, fingerprint
//! Outputs JSON to stdout, logs to stderr
//! Exit codes: 0 success, 1 I/O failure, 2 rejected or invalid document

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use labelgrid_core::{
    hashing::document_fingerprint,
    operations::{split_leaf, unsplit},
    paths::list_nodes,
    validate_template, Direction, EditorConfig, EditorSession, TemplateDoc, Validation,
};

#[derive(Parser)]
#[command(name = "labelgrid-cli")]
#[command(about = "LabelGrid CLI - split-tree label templates")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Editor config (preview size, scale)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a template file
    Validate { file: PathBuf },

    /// List required variables and macros
    Variables { file: PathBuf },

    /// List nodes in pre-order
    Nodes { file: PathBuf },

    /// Compute pixel rectangles for every node
    Layout {
        file: PathBuf,
        #[arg(long)]
        width_mm: Option<f64>,
        #[arg(long)]
        height_mm: Option<f64>,
        /// Pixels per millimetre
        #[arg(long)]
        scale: Option<f64>,
    },

    /// Split a leaf and print the resulting document
    Split {
        file: PathBuf,
        id: String,
        #[arg(value_enum)]
        direction: DirectionArg,
    },

    /// Collapse a split into its first leaf and print the resulting document
    Unsplit { file: PathBuf, id: String },

    /// SHA-256 of the canonical document JSON
    Fingerprint { file: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum DirectionArg {
    V,
    H,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::V => Direction::Vertical,
            DirectionArg::H => Direction::Horizontal,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match EditorConfig::load(path) {
            Ok(c) => c,
            Err(e) => {
                print_json(&serde_json::json!({"error": e.to_string()}));
                return ExitCode::FAILURE;
            }
        },
        None => EditorConfig::default(),
    };

    match cli.command {
        Commands::Validate { file } => {
            let value = match read_json(&file) {
                Ok(v) => v,
                Err(code) => return code,
            };
            let validation = validate_template(&value);
            print_json(&serde_json::json!({
                "valid": validation.is_ok() && validation.issues().is_empty(),
                "shape_ok": validation.is_ok(),
                "issues": validation.issue_strings(),
            }));
            if validation.is_ok() && validation.issues().is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            }
        }

        Commands::Variables { file } => with_session(&file, |session| {
            print_json(&session.variables());
            ExitCode::SUCCESS
        }),

        Commands::Nodes { file } => with_session(&file, |session| {
            print_json(&list_nodes(&session.doc().layout));
            ExitCode::SUCCESS
        }),

        Commands::Layout { file, width_mm, height_mm, scale } => with_session(&file, |session| {
            let mut target = config.preview;
            target.width_mm = width_mm.unwrap_or(target.width_mm);
            target.height_mm = height_mm.unwrap_or(target.height_mm);
            let scale = scale.unwrap_or(config.scale_px_per_mm);
            print_json(&session.layout(target, scale));
            ExitCode::SUCCESS
        }),

        Commands::Split { file, id, direction } => with_session(&file, |session| {
            let direction = Direction::from(direction);
            if !session.apply(|doc| split_leaf(doc, &id, direction)) {
                tracing::warn!(node_id = %id, "split had no effect");
            }
            print_doc(session.doc())
        }),

        Commands::Unsplit { file, id } => with_session(&file, |session| {
            if !session.apply(|doc| unsplit(doc, &id)) {
                tracing::warn!(node_id = %id, "unsplit had no effect");
            }
            print_doc(session.doc())
        }),

        Commands::Fingerprint { file } => with_session(&file, |session| {
            match document_fingerprint(session.doc()) {
                Ok(fingerprint) => {
                    print_json(&serde_json::json!({"fingerprint": fingerprint}));
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    print_json(&serde_json::json!({"error": e.to_string()}));
                    ExitCode::FAILURE
                }
            }
        }),
    }
}

fn read_json(path: &Path) -> Result<serde_json::Value, ExitCode> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        let message = format!("Failed to read {}: {}", path.display(), e);
        print_json(&serde_json::json!({ "error": message }));
        ExitCode::FAILURE
    })?;
    serde_json::from_str(&text).map_err(|e| {
        print_json(&serde_json::json!({"valid": false, "issues": [format!("$: {}", e)]}));
        ExitCode::from(2)
    })
}

/// Load `path` into a session, rejecting shape-invalid documents.
fn with_session<F>(path: &Path, run: F) -> ExitCode
where
    F: FnOnce(&mut EditorSession) -> ExitCode,
{
    let value = match read_json(path) {
        Ok(v) => v,
        Err(code) => return code,
    };
    match validate_template(&value) {
        Validation::Valid { doc, issues } => {
            for issue in &issues {
                tracing::warn!(%issue, "validation issue");
            }
            let mut session = EditorSession::from_doc(doc);
            run(&mut session)
        }
        Validation::Invalid { issues } => {
            let issues: Vec<String> = issues.iter().map(ToString::to_string).collect();
            print_json(&serde_json::json!({"valid": false, "issues": issues}));
            ExitCode::from(2)
        }
    }
}

fn print_doc(doc: &TemplateDoc) -> ExitCode {
    print_json(doc);
    ExitCode::SUCCESS
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap());
}
