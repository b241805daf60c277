//! Shared command setup: options, workbook loading and one pipeline run

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use jobprofit_core::{build_fact_tables, AllocationMode, FactOutputs, PipelineOptions};
use jobprofit_loader::{load_workbook, LoadedWorkbook};

use crate::OutputFormat;

/// Global flags every subcommand sees
#[derive(Clone, Debug)]
pub struct Settings {
    pub config: Option<PathBuf>,
    pub alloc: Option<AllocationMode>,
    pub format: OutputFormat,
}

impl Settings {
    /// Options from the config file (if any) with `--alloc` applied on top
    pub fn options(&self) -> Result<PipelineOptions> {
        let options = match &self.config {
            Some(path) => PipelineOptions::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => PipelineOptions::default(),
        };
        Ok(match self.alloc {
            Some(mode) => options.allocation(mode),
            None => options,
        })
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }
}

/// A loaded workbook and the options it will be processed with
pub struct Session {
    pub workbook: LoadedWorkbook,
    pub options: PipelineOptions,
}

impl Session {
    pub fn open(file: &Path, settings: &Settings) -> Result<Self> {
        let options = settings.options()?;
        let workbook = load_workbook(file)?;
        Ok(Self { workbook, options })
    }

    /// Run the pipeline; fails when no timesheet sheet was detected
    pub fn build(&self) -> Result<FactOutputs> {
        let timesheet = self.workbook.require_timesheet()?;
        Ok(build_fact_tables(
            timesheet,
            self.workbook.revrec.as_ref(),
            self.workbook.quotes.as_ref(),
            &self.options,
        ))
    }
}
