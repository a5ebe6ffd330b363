mod cli;
mod toy_core;

use std::time::Duration;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    // Realtime loop by default; `--bake` or `--cancel` for the bake pipeline
    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("--bake") => cli::run_bake(None),
        Some("--cancel") => cli::run_bake(Some(Duration::from_millis(300))),
        _ => cli::run_realtime(),
    }
}
