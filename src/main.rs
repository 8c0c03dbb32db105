use std::env;

use anyhow::{Context, Result, bail};
use log::info;
use rand::{SeedableRng, rngs::StdRng};

use traj_pred_engine::{
    EngineConfig, TrajPredEngine,
    arch::{LinearPredictor, TrajPredictor},
    data::{TrajDataset, TrajLoader},
    optimization::Adam,
};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let [_, config_path, train_path, val_path] = args.as_slice() else {
        bail!("usage: traj-pred <config.json> <train.json> <val.json>");
    };

    let config = EngineConfig::from_json_file(config_path)
        .with_context(|| format!("failed to load the config at {config_path}"))?;
    let train = TrajDataset::from_json_file(train_path)
        .with_context(|| format!("failed to load the training set at {train_path}"))?;
    let val = TrajDataset::from_json_file(val_path)
        .with_context(|| format!("failed to load the validation set at {val_path}"))?;

    if (train.hist_len(), train.fut_len()) != (val.hist_len(), val.fut_len()) {
        bail!(
            "the training set has {}/{} history/future positions but the validation set {}/{}",
            train.hist_len(),
            train.fut_len(),
            val.hist_len(),
            val.fut_len()
        );
    }

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let net = LinearPredictor::new(train.hist_len(), train.fut_len());
    let init = net.init_params(&mut rng)?;
    let optimizer = Adam::with_defaults(config.learning_rate);
    info!(
        "{} tracks for training, {} for validation, {} parameters",
        train.len(),
        val.len(),
        net.size()
    );

    let eval_only = config.eval_only;
    let weights = config.weights_path();
    let train_loader =
        TrajLoader::new(train, config.batch_size).shuffled(StdRng::from_rng(&mut rng));
    let val_loader = TrajLoader::new(val, config.batch_size);

    let mut engine = TrajPredEngine::new(net, optimizer, train_loader, val_loader, config, None)?
        .with_params(init)?;

    if eval_only {
        engine
            .load_model(&weights)
            .with_context(|| format!("failed to load the weights at {}", weights.display()))?;
    }

    engine.start()?;

    if eval_only {
        let report = engine.evaluate()?;
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}
