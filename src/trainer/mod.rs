mod horizon;
mod persist;
mod phase;
mod traj_pred_engine;

pub use horizon::HorizonReport;
pub use persist::{load_params, save_params};
pub use phase::{Phase, Stage};
pub use traj_pred_engine::TrajPredEngine;
