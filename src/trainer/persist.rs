use std::{collections::HashMap, fs, path::Path};

use safetensors::{
    SafeTensors,
    tensor::{Dtype, TensorView},
};

use crate::{EngineErr, Result};

const PARAMS_TENSOR: &str = "params";

/// Writes a flat parameter vector as a single `f32` safetensors tensor.
///
/// # Arguments
/// * `path` - The file to write, its parent directory must exist.
/// * `name` - The run name, stored in the file's metadata.
/// * `params` - The parameters.
pub fn save_params(path: &Path, name: &str, params: &[f32]) -> Result<()> {
    let bytes: &[u8] = bytemuck::cast_slice(params);
    let view = TensorView::new(Dtype::F32, vec![params.len()], bytes)?;

    let metadata = HashMap::from([("name".to_string(), name.to_string())]);
    let serialized = safetensors::serialize([(PARAMS_TENSOR, view)], &Some(metadata))?;

    fs::write(path, serialized)?;
    Ok(())
}

/// Reads a parameter vector written by `save_params`.
///
/// # Arguments
/// * `path` - The weights file.
///
/// # Returns
/// The parameters, or an error if the file can't be read or doesn't hold a flat `f32` tensor.
pub fn load_params(path: &Path) -> Result<Vec<f32>> {
    let bytes = fs::read(path)?;
    let tensors = SafeTensors::deserialize(&bytes)?;
    let view = tensors.tensor(PARAMS_TENSOR)?;

    if view.dtype() != Dtype::F32 || view.shape().len() != 1 {
        return Err(EngineErr::InvalidWeights(format!(
            "expected a flat F32 tensor, got {:?} of shape {:?}",
            view.dtype(),
            view.shape()
        )));
    }

    Ok(bytemuck::pod_collect_to_vec(view.data()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_survive_a_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run");
        let params = [0.5, -1.25, 3.0, f32::MIN_POSITIVE];

        save_params(&path, "run", &params).unwrap();
        assert_eq!(load_params(&path).unwrap(), params);
    }

    #[test]
    fn stores_the_run_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("named");
        save_params(&path, "named", &[1.0]).unwrap();

        let bytes = fs::read(&path).unwrap();
        let (_, metadata) = SafeTensors::read_metadata(&bytes).unwrap();
        let extra = metadata.metadata().as_ref().unwrap();
        assert_eq!(extra.get("name").map(String::as_str), Some("named"));
    }

    #[test]
    fn rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage");
        fs::write(&path, b"not a weights file").unwrap();
        assert!(load_params(&path).is_err());
    }
}
