use thiserror::Error;

/// The error taxonomy for one monitor entry's evaluation.
///
/// None of these ever escape a sensor tick: the [`SensorPipeline`](crate::pipeline::SensorPipeline)
/// catches each one, logs it at the severity the variant implies, and taints the
/// offending name rather than propagating failure to the caller.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("sensor {sensor} is missing required field {field}")]
    Config { sensor: String, field: &'static str },

    #[error("transport error probing {argument}: {source}")]
    Transport {
        argument: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("could not parse {raw:?} as a number for {name}")]
    Parse { name: String, raw: String },

    #[error("unknown variable {0}")]
    UnknownVariable(String),

    #[error("vector operands for {name} disagree in width ({left} vs {right})")]
    DimensionMismatch {
        name: String,
        left: usize,
        right: usize,
    },

    #[error("result for {name} is not finite")]
    NotFinite { name: String },

    #[error("{name} triggered its nonzero guard with a zero result")]
    PolicyViolation { name: String },

    #[error("sink enqueue failed: {0}")]
    Sink(String),

    #[error("expression parse error: {0}")]
    ExpressionSyntax(String),
}
