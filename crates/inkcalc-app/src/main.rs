//! Main application entry point.

use inkcalc_app::{Script, run_script};
use inkcalc_core::{CalcConfig, HttpBackend};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    env_logger::init();
    log::info!("Starting InkCalc");

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: inkcalc <script.json>");
        return ExitCode::from(2);
    };

    match run(&path).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("inkcalc: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = CalcConfig::from_env()?;
    let backend = HttpBackend::new(&config)?;
    log::info!("Using backend {}", backend.endpoint());

    let script = Script::load(path)?;
    let report = run_script(&config, &script, &backend).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
