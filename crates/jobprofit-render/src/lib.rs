//! # jobprofit-render
//!
//! Rendering backends for jobprofit pipeline outputs.
//!
//! This crate provides:
//! - Multi-sheet Excel export of every output table
//! - JSON output of the whole bundle or any report value
//! - Column-aligned text tables, KPI blocks and a bundle overview
//!
//! ## Example
//!
//! ```rust
//! use jobprofit_core::{build_fact_tables, Cell, PipelineOptions, RawTable, Renderer};
//! use jobprofit_render::{ExcelExporter, JsonRenderer, TextRenderer};
//!
//! let timesheet = RawTable::new(["[Job] Job No.", "[Time] Date", "[Time] Actual Hrs"])
//!     .with_row(vec![Cell::from("100"), Cell::from("2024-03-15"), Cell::from(2.0)]);
//! let outputs = build_fact_tables(&timesheet, None, None, &PipelineOptions::default());
//!
//! // Excel workbook, one sheet per table
//! let xlsx = ExcelExporter::new().render(&outputs)?;
//! assert_eq!(&xlsx[0..2], b"PK");
//!
//! // JSON bundle
//! let json = JsonRenderer::new().pretty().render(&outputs)?;
//! assert!(json.contains("fact_job_task_month"));
//!
//! // Console overview
//! let text = TextRenderer::new().render(&outputs)?;
//! assert!(text.contains("Data QA"));
//! # Ok::<(), jobprofit_core::RenderError>(())
//! ```

pub mod excel;
pub mod json;
pub mod text;

pub use excel::{sheet_name, ExcelExporter};
pub use json::JsonRenderer;
pub use text::{format_money, format_pct, TextRenderer};
