//! # Parchment CLI
//!
//! ## Usage
//!
//! ```bash
//! # Render every page of a template to PDF
//! parchment render award.json -o award.pdf
//!
//! # Placeholder values for data-bound elements
//! parchment render award.json --preview
//!
//! # Editor markup for the second page
//! parchment preview award.json --page 1
//!
//! # A sample template to start from
//! parchment example > award.json
//! ```

use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;

use parchment::{EngineConfig, ParchmentError};

/// Parchment - certificate template renderer
#[derive(Parser, Debug)]
#[command(name = "parchment")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a template document to PDF
    Render {
        /// Template document (JSON)
        input: PathBuf,

        /// Output file
        #[arg(short, long, default_value = "output.pdf")]
        output: PathBuf,

        /// Show placeholder values instead of recipient data
        #[arg(long)]
        preview: bool,

        /// Engine configuration (JSON)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
    /// Print the HTML preview of one page
    Preview {
        /// Template document (JSON)
        input: PathBuf,

        /// Zero-based page index
        #[arg(long, default_value = "0")]
        page: usize,
    },
    /// Print a sample template document
    Example,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("✗ {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), ParchmentError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            input,
            output,
            preview,
            config,
        } => {
            let config = match config {
                Some(path) => EngineConfig::load(path)?,
                None => EngineConfig::default(),
            };
            let json = fs::read_to_string(&input)?;
            let pdf = parchment::render_json_with(&json, preview, &config)?;
            fs::write(&output, &pdf)?;
            eprintln!("✓ Written {} bytes to {}", pdf.len(), output.display());
        }
        Commands::Preview { input, page } => {
            let json = fs::read_to_string(&input)?;
            println!("{}", parchment::preview_json(&json, page)?);
        }
        Commands::Example => print!("{}", example_template_json()),
    }
    Ok(())
}

fn example_template_json() -> &'static str {
    r##"{
  "name": "Course completion",
  "contextId": 1,
  "pages": [
    {
      "width": 297,
      "height": 210,
      "leftMargin": 10,
      "rightMargin": 10,
      "elements": [
        { "type": "border", "name": "Frame", "data": { "width": 3 }, "colour": "#1f3a5f" },
        {
          "type": "text", "name": "Heading",
          "data": { "text": "Certificate of Completion" },
          "font": "timesb", "fontsize": 32, "colour": "#1f3a5f",
          "posx": 148.5, "posy": 35, "refpoint": "TOP_CENTER"
        },
        {
          "type": "text", "name": "Awarded to",
          "data": { "text": "This certifies that" },
          "fontsize": 14, "posx": 148.5, "posy": 65, "refpoint": "TOP_CENTER"
        },
        {
          "type": "studentname", "name": "Recipient",
          "font": "helveticab", "fontsize": 26,
          "posx": 148.5, "posy": 80, "refpoint": "TOP_CENTER"
        },
        {
          "type": "coursename", "name": "Course",
          "data": { "field": "fullname" },
          "fontsize": 16, "posx": 148.5, "posy": 105, "refpoint": "TOP_CENTER"
        },
        {
          "type": "date", "name": "Completed",
          "data": { "dateitem": -2, "dateformat": "2" },
          "fontsize": 12, "posx": 40, "posy": 170, "refpoint": "TOP_LEFT"
        },
        {
          "type": "code", "name": "Code",
          "fontsize": 10, "posx": 257, "posy": 170, "refpoint": "TOP_RIGHT"
        },
        {
          "type": "qrcode", "name": "Verify",
          "data": { "width": 25, "height": 25 },
          "posx": 136, "posy": 150
        }
      ]
    }
  ]
}
"##
}
