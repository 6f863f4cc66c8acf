use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use log::debug;

use json2dataset::{ConvertConfig, Opts, Outcome};

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let opts = Opts::parse();
    debug!("{:?}", opts);

    if let Outcome::Reloaded(summary) = json2dataset::run(ConvertConfig::from(opts))? {
        println!("{}", summary);
    }

    Ok(())
}
