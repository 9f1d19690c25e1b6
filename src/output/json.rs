use super::{EstimateOutput, Formatter, iso8601_timestamp};

pub struct JsonFormatter;

#[derive(serde::Serialize)]
struct JsonLine<'a> {
    ts: String,
    #[serde(flatten)]
    output: &'a EstimateOutput,
}

impl Formatter for JsonFormatter {
    fn format(&self, output: &EstimateOutput) -> String {
        let line = JsonLine {
            ts: iso8601_timestamp(),
            output,
        };
        // Plain data with string keys; serialization cannot fail
        serde_json::to_string(&line).unwrap_or_default()
    }
}
