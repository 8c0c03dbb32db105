mod dense;
mod linear;
mod predictor;

pub use dense::Dense;
pub use linear::LinearPredictor;
pub use predictor::TrajPredictor;
