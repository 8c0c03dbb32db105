use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use rand_distr::uniform::Error as UniformError;

/// The result type used in the entire training engine.
pub type Result<T> = std::result::Result<T, EngineErr>;

/// The training engine's error type.
///
/// An unrecognized loss kind is not an error: the engine substitutes the phase
/// default and reports a warning instead.
#[derive(Debug)]
pub enum EngineErr {
    Io(io::Error),
    Json(serde_json::Error),
    Weights(safetensors::SafeTensorError),
    Shape(ndarray::ShapeError),
    Init(UniformError),
    InvalidConfig(String),
    InvalidWeights(String),
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    EmptyLoader {
        what: &'static str,
    },
}

impl Display for EngineErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineErr::Io(e) => write!(f, "io error: {e}"),
            EngineErr::Json(e) => write!(f, "json error: {e}"),
            EngineErr::Weights(e) => write!(f, "weights file error: {e}"),
            EngineErr::Shape(e) => write!(f, "tensor shape error: {e}"),
            EngineErr::Init(e) => write!(f, "parameter initialization error: {e}"),
            EngineErr::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            EngineErr::InvalidWeights(msg) => write!(f, "invalid weights file: {msg}"),
            EngineErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch for {what}, got {got} and expected {expected}"
            ),
            EngineErr::EmptyLoader { what } => {
                write!(f, "the {what} loader doesn't yield any batch")
            }
        }
    }
}

impl Error for EngineErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EngineErr::Io(e) => Some(e),
            EngineErr::Json(e) => Some(e),
            EngineErr::Weights(e) => Some(e),
            EngineErr::Shape(e) => Some(e),
            EngineErr::Init(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for EngineErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for EngineErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<safetensors::SafeTensorError> for EngineErr {
    fn from(value: safetensors::SafeTensorError) -> Self {
        Self::Weights(value)
    }
}

impl From<ndarray::ShapeError> for EngineErr {
    fn from(value: ndarray::ShapeError) -> Self {
        Self::Shape(value)
    }
}

impl From<UniformError> for EngineErr {
    fn from(value: UniformError) -> Self {
        Self::Init(value)
    }
}
