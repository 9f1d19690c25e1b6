use super::{EstimateOutput, Formatter, iso8601_timestamp};

pub struct CsvFormatter;

fn opt(v: Option<f64>, precision: usize) -> String {
    v.map_or(String::new(), |v| format!("{:.*}", precision, v))
}

impl Formatter for CsvFormatter {
    fn format(&self, output: &EstimateOutput) -> String {
        let d = output.distances;
        format!(
            "{},{},{},{},{},{},{},{},{},{},{}",
            iso8601_timestamp(),
            output.iteration.map_or(String::new(), |i| i.to_string()),
            opt(output.position.map(|p| p.x), 4),
            opt(output.position.map(|p| p.y), 4),
            opt(output.shown.map(|p| p.x), 4),
            opt(output.shown.map(|p| p.y), 4),
            opt(output.residual, 4),
            opt(d.map(|d| d[0]), 4),
            opt(d.map(|d| d[1]), 4),
            opt(d.map(|d| d[2]), 4),
            output.is_available()
        )
    }

    fn header(&self) -> Option<&'static str> {
        Some("ts,iteration,x,y,shown_x,shown_y,residual,d1,d2,d3,available")
    }
}
