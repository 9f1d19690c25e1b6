use super::{EstimateOutput, Formatter};

pub struct TextFormatter {
    verbose: bool,
}

impl TextFormatter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl Formatter for TextFormatter {
    fn format(&self, output: &EstimateOutput) -> String {
        let distances = output.distances.map_or("-".to_string(), |d| {
            format!("{:.2} | {:.2} | {:.2}", d[0], d[1], d[2])
        });

        let (Some(shown), Some(raw)) = (output.shown, output.position) else {
            return format!("Position: unavailable  D: {}", distances);
        };

        if self.verbose {
            let residual = output
                .residual
                .map_or("-".to_string(), |r| format!("{:.3}", r));
            format!(
                "Position: ({:>6.2}, {:>6.2}) (raw: ({:.3}, {:.3})) D: {} [residual: {}, iter: {}]",
                shown.x,
                shown.y,
                raw.x,
                raw.y,
                distances,
                residual,
                output.iteration.unwrap_or(0)
            )
        } else {
            format!(
                "Position: ({:>6.2}, {:>6.2})  D: {}",
                shown.x, shown.y, distances
            )
        }
    }
}
