// ==========================================
// Coffee ETL - pipeline errors
// ==========================================
// Stage-level faults only. Row rejections, transform fallbacks
// and failed load batches are counted, never raised.
// ==========================================

use crate::broker::BrokerError;
use crate::config::ConfigError;
use crate::loader::LoadError;
use crate::quality::QualityError;
use crate::source::SourceError;
use crate::zone::ZoneError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Zone(#[from] ZoneError),

    #[error(transparent)]
    Quality(#[from] QualityError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
