use thiserror::Error;

#[derive(Debug, Error)]
pub enum StationError {
    #[error(transparent)]
    Device(#[from] rlt_device::DeviceError),

    #[error("analyzer: {0}")]
    Analyzer(String),

    #[error("remote app control: {0}")]
    Lifecycle(String),

    #[error("station config: {0}")]
    Config(String),

    #[error("operator input: {0}")]
    Input(String),

    #[error("sweep: {0}")]
    Sweep(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}
