use thiserror::Error;

use crate::section::SectionId;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Unknown section: {0}")]
    UnknownSection(SectionId),

    #[error("History API error: {0}")]
    History(String),

    #[error("Navigation service has stopped")]
    ServiceStopped,
}

pub type Result<T> = std::result::Result<T, Error>;
