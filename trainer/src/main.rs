use std::{env, io, path::PathBuf};

use log::info;

use trainer::{Driver, RunConfig, TrainingEvent};

const CONFIG_VAR: &str = "TRAINER_CONFIG";
const DATA_ROOT_VAR: &str = "DATA_ROOT";

fn main() -> io::Result<()> {
    env_logger::init();

    let mut config = match env::var(CONFIG_VAR) {
        Ok(path) => {
            info!("loading config from {path}");
            RunConfig::from_json_file(path)?
        }
        Err(_) => RunConfig::default(),
    };

    if let Ok(root) = env::var(DATA_ROOT_VAR) {
        config.data_root = PathBuf::from(root);
    }

    let mut driver = Driver::setup(config)?;
    driver.run(|event| match event {
        TrainingEvent::EpochDone { .. } => info!("{event}"),
        event => println!("{event}"),
    })?;

    Ok(())
}
