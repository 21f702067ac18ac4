//! Render dashboard sections to static HTML files
//!
//! Also prints groupwise aggregates as CSV for quick checks against the
//! spreadsheet.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use risk_load_explorer::aggregate::write_aggregates_csv;
use risk_load_explorer::{DashboardConfig, DashboardSession, Section, ViewRequest};
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "render_dashboard", about = "Exploratory risk load dashboard renderer")]
struct Cli {
    /// JSON config file; missing fields take their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Spreadsheet or CSV with one row per account
    #[arg(long)]
    data: Option<PathBuf>,

    /// Workbook sheet name
    #[arg(long)]
    sheet: Option<String>,

    /// Region GeoJSON URL or path
    #[arg(long)]
    regions_url: Option<String>,

    /// Commune GeoJSON URL or path
    #[arg(long)]
    communes_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render one section to an HTML file
    Render {
        /// Section slug or menu label
        #[arg(long, default_value = "overview")]
        section: String,
        /// Univariate variable
        #[arg(long)]
        var: Option<String>,
        #[arg(long)]
        x: Option<String>,
        #[arg(long)]
        y: Option<String>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        out: PathBuf,
    },
    /// Render every section with default selections into a directory
    RenderAll {
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Print count and mean risk load / AAL per group as CSV
    Aggregate {
        #[arg(long, default_value = "cluster_geo")]
        by: String,
    },
}

fn build_config(cli: &Cli) -> Result<DashboardConfig> {
    let mut config = match &cli.config {
        Some(path) => DashboardConfig::from_json_file(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => DashboardConfig::default(),
    };
    if let Some(data) = &cli.data {
        config.data_path = data.clone();
    }
    if let Some(sheet) = &cli.sheet {
        config.sheet = sheet.clone();
    }
    if let Some(url) = &cli.regions_url {
        config.regions_source = url.clone();
    }
    if let Some(url) = &cli.communes_url {
        config.communes_source = url.clone();
    }
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = build_config(&cli)?;
    let session = DashboardSession::new(config);
    let start = Instant::now();

    match cli.command {
        Command::Render { section, var, x, y, color, out } => {
            let request = ViewRequest {
                section: section.parse()?,
                variable: var,
                x,
                y,
                color,
            };
            let html = session.render(&request).context("Failed to render section")?;
            fs::write(&out, html).with_context(|| format!("Failed to write {}", out.display()))?;
            println!("Wrote {} to {} in {:?}", request.section, out.display(), start.elapsed());
        }
        Command::RenderAll { out_dir } => {
            fs::create_dir_all(&out_dir)
                .with_context(|| format!("Failed to create {}", out_dir.display()))?;
            // Sections share the session, so each input is still loaded once
            let written: Vec<PathBuf> = Section::ALL
                .par_iter()
                .map(|section| -> Result<PathBuf> {
                    let html = session
                        .render(&ViewRequest::new(*section))
                        .with_context(|| format!("Failed to render {}", section.slug()))?;
                    let path = out_dir.join(format!("{}.html", section.slug()));
                    fs::write(&path, html).with_context(|| format!("Failed to write {}", path.display()))?;
                    Ok(path)
                })
                .collect::<Result<_>>()?;
            for (section, path) in Section::ALL.iter().zip(&written) {
                println!("  {:<16} -> {}", section.label(), path.display());
            }
            println!("Rendered {} sections in {:?}", Section::ALL.len(), start.elapsed());
        }
        Command::Aggregate { by } => {
            let records = session.aggregate(&by)?;
            write_aggregates_csv(std::io::stdout().lock(), &records)?;
        }
    }

    Ok(())
}
