use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Agent(#[from] agent::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("The planner returned a plan without any research steps")]
    EmptyPlan,

    #[error("Json error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
