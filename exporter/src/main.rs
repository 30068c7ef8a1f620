//! metabase-export CLI - Download Metabase cards as CSV files
//!
//! # Commands
//!
//! ```bash
//! metabase-export export --card-id 123                      # One card, Metabase format
//! metabase-export export --card-id 123 --card-id 456        # Several cards
//! metabase-export export --card-id 123 --param status=active --param start_date=2025-08-01
//! metabase-export export --card-id 123 --delimiter ';' --decimal-comma --quote-all --bom
//! metabase-export reformat input.csv -o output.csv --delimiter ';' --decimal-comma
//! ```
//!
//! Environment (or `.env`): `METABASE_HOST`, `OUTPUT_DIR`, optional
//! `FILE_PREFIX`, and either `METABASE_API_KEY` or
//! `METABASE_USERNAME` + `METABASE_PASSWORD`.

use clap::{Args, Parser, Subcommand};
use metabase_export::logs::{init_logging, log_error, log_info, log_success};
use metabase_export::{
    export_cards, parse_params, reformat_with_report, ExportPlan, MetabaseClient, ReformatOptions,
    Settings,
};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "metabase-export")]
#[command(about = "Export CSVs from Metabase cards", long_about = None)]
struct Cli {
    /// Debug-level logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download cards and save them to OUTPUT_DIR
    Export {
        /// Metabase card (question) ID. Repeatable.
        #[arg(long = "card-id", required = true)]
        card_ids: Vec<u64>,

        /// Card parameter in the form name=value. Repeatable.
        #[arg(long = "param")]
        params: Vec<String>,

        /// Fixed filename to write (only valid with a single --card-id)
        #[arg(long)]
        filename: Option<String>,

        /// Do not include timestamp in filenames
        #[arg(long)]
        no_timestamp: bool,

        /// Use METABASE_API_KEY auth instead of username/password
        #[arg(long)]
        use_api_key: bool,

        /// Number of retries on failure
        #[arg(long, default_value = "2")]
        retries: u32,

        /// Back up an existing output file (timestamped) before overwriting
        #[arg(long)]
        backup: bool,

        /// Directory for backups (default: next to the file); created if missing
        #[arg(long)]
        backup_dir: Option<PathBuf>,

        /// Export with Metabase's own value formatting
        #[arg(long)]
        format_rows: bool,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Reformat a local CSV file (Metabase format) without contacting the server
    Reformat {
        /// Input CSV file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        format: OutputArgs,
    },
}

/// Output CSV format flags shared by both commands
#[derive(Args)]
struct OutputArgs {
    /// Quote every field
    #[arg(long)]
    quote_all: bool,

    /// Convert numbers to decimal-comma notation (1,234.5 -> 1.234,50)
    #[arg(long)]
    decimal_comma: bool,

    /// Output delimiter
    #[arg(long, default_value = ",")]
    delimiter: char,

    /// Prepend a UTF-8 byte-order mark (for Excel)
    #[arg(long)]
    bom: bool,
}

impl OutputArgs {
    fn to_options(&self) -> ReformatOptions {
        ReformatOptions {
            quote_all: self.quote_all,
            numeric_rewrite: self.decimal_comma,
            delimiter: self.delimiter,
            add_bom: self.bom,
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Export {
            card_ids,
            params,
            filename,
            no_timestamp,
            use_api_key,
            retries,
            backup,
            backup_dir,
            format_rows,
            output,
        } => {
            let plan = ExportPlan {
                card_ids,
                params: Vec::new(),
                filename,
                timestamp: !no_timestamp,
                retries,
                backup,
                backup_dir,
                format_rows,
                reformat: output.to_options(),
            };
            cmd_export(plan, &params, use_api_key).await
        }

        Commands::Reformat {
            input,
            output,
            format,
        } => cmd_reformat(&input, output.as_deref(), &format.to_options()),
    };

    if let Err(e) = result {
        log_error(format!("Error: {}", e));
        std::process::exit(1);
    }
}

async fn cmd_export(
    mut plan: ExportPlan,
    raw_params: &[String],
    use_api_key: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    plan.params = parse_params(raw_params)?;
    plan.validate()?;

    let settings = Settings::from_env(use_api_key)?;
    log_info(format!("Metabase: {}", settings.host));
    log_info(format!("Output: {}", settings.output_dir.display()));

    let client = MetabaseClient::connect(&settings).await?;
    export_cards(&client, &settings, &plan).await?;

    Ok(())
}

fn cmd_reformat(
    input: &Path,
    output: Option<&Path>,
    options: &ReformatOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    options.target_dialect()?;
    log_info(format!("Reformatting: {}", input.display()));

    let raw = fs::read(input)?;
    let (data, report) = reformat_with_report(&raw, options);
    if !report.passthrough {
        log_success(format!(
            "{} rows, {} cells, {} numeric cells rewritten",
            report.rows, report.cells, report.cells_rewritten
        ));
    }

    match output {
        Some(p) => {
            fs::write(p, &data)?;
            log_success(format!("Output written to: {}", p.display()));
        }
        None => std::io::stdout().write_all(&data)?,
    }

    Ok(())
}
