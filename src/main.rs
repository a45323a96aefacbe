use dsmr_sim::{open_channel, Config, Emitter, Template};
use log::{error, info, warn};
use std::path::Path;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

/// Exit status after a second interrupt, 128 + SIGINT.
const INTERRUPTED: u8 = 130;

#[derive(Debug, PartialEq)]
enum InterruptAction {
    Cancel,
    Exit,
}

/// The first interrupt stops after the telegram in flight, any further one
/// exits right away, e.g. while a write to a stuck port blocks.
fn interrupt_action(interrupts: u32) -> InterruptAction {
    if interrupts <= 1 {
        return InterruptAction::Cancel;
    }
    return InterruptAction::Exit;
}

/* Two workers so interrupts are handled while a channel write blocks the other one */
#[tokio::main(worker_threads = 2)]
async fn main() -> ExitCode {
    // Initialize logging
    let default_filter = std::env::var("DSMR_SIM_LOG_LEVEL").unwrap_or("info".to_string());
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(default_filter));

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let template = match &config.template {
        Some(path) => Template::from_file(Path::new(path)),
        None => Ok(Template::default()),
    };
    let template = match template {
        Ok(t) => t,
        Err(e) => {
            error!("Template error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    /* Nothing is sent if the port cannot be opened */
    let channel = match open_channel(&config) {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        let mut interrupts = 0;
        while tokio::signal::ctrl_c().await.is_ok() {
            interrupts += 1;
            match interrupt_action(interrupts) {
                InterruptAction::Cancel => {
                    info!("Interrupted, stopping. Interrupt again to exit immediately");
                    interrupt.cancel();
                }
                InterruptAction::Exit => {
                    warn!("Interrupted again, exiting");
                    std::process::exit(INTERRUPTED.into());
                }
            }
        }
    });

    let emitter = Emitter::from_config(&config, template, channel);
    let result = emitter.run(cancel).await;

    // Keep the last progress line visible
    println!();

    match result {
        Ok(sent) => {
            info!("{} telegrams sent to {}", sent, config.port);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
