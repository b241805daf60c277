//! JSON output
//!
//! Serialises the pipeline bundle (or any serialisable report) with
//! `serde_json`. Dates come out as `YYYY-MM-DD` strings and undefined
//! ratios as `null`.

use jobprofit_core::{FactOutputs, RenderError, Renderer};
use serde::Serialize;

/// JSON renderer
#[derive(Clone, Debug, Default)]
pub struct JsonRenderer {
    /// Indented output
    pub pretty: bool,
}

impl JsonRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indent the output (builder pattern)
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    /// Serialise any report value
    pub fn to_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, RenderError> {
        let json = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        json.map_err(|e| RenderError::Format(format!("JSON serialisation failed: {e}")))
    }
}

impl Renderer for JsonRenderer {
    type Output = String;

    fn render(&self, outputs: &FactOutputs) -> Result<String, RenderError> {
        self.to_json(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobprofit_core::{build_fact_tables, Cell, PipelineOptions, RawTable};

    fn outputs() -> FactOutputs {
        let timesheet = RawTable::new(["[Job] Job No.", "[Job Task] Name", "[Time] Date", "[Time] Actual Hrs"])
            .with_row(vec![
                Cell::from("100"),
                Cell::from("Design"),
                Cell::from("2024-03-15"),
                Cell::from(4.0),
            ]);
        build_fact_tables(&timesheet, None, None, &PipelineOptions::default())
    }

    #[test]
    fn bundle_serialises_with_dates_and_nulls() {
        let json = JsonRenderer::new().render(&outputs()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        let row = &value["fact_job_task_month"][0];
        assert_eq!(row["job_no"], "100");
        assert_eq!(row["month_key"], "2024-03-01");
        assert!(row["gm_pct"].is_null());
        // no base rate: flagged
        assert_eq!(value["qa"]["flagged"]["hours_gt0_cost_eq0"].as_array().map(Vec::len), Some(1));
        assert!(!json.contains('\n'));
    }

    #[test]
    fn pretty_output_is_indented() {
        let json = JsonRenderer::new().pretty().render(&outputs()).unwrap();
        assert!(json.contains("\n  \"fact_job_task_month\""));
    }

    #[test]
    fn round_trips_through_serde() {
        let original = outputs();
        let json = JsonRenderer::new().render(&original).unwrap();
        let parsed: FactOutputs = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, original);
    }
}
