use clap::Parser;

use std::thread;

use dmrlink_config::{toml_config, SessionConfig};
use dmrlink_core::{debug, CallType, DmrId};
use dmrlink_entities::{Engine, EngineCommand, EngineEvent};
use tracing::{error, info, warn};

/// Load configuration file
fn load_config_from_toml(cfg_path: &str) -> SessionConfig {
    match toml_config::from_file(cfg_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration from {}: {}", cfg_path, e);
            std::process::exit(1);
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "DMRlink network client",
    long_about = "Connects to a DMR network server using the provided TOML configuration file"
)]
struct Args {
    /// Config file (required)
    #[arg(help = "TOML config with server/station parameters")]
    config: String,

    /// Override the talkgroup to monitor
    #[arg(long)]
    talkgroup: Option<DmrId>,
}

fn main() {
    let args = Args::parse();
    let config = load_config_from_toml(&args.config);
    let _log_guard = debug::setup_logging_default(config.debug_log.clone());

    let (mut engine, commands, events) = Engine::new(config);
    let engine_thread = thread::spawn(move || engine.run());

    // Ctrl+C requests a graceful close; the engine sends RPTCL on the way out
    let shutdown_commands = commands.clone();
    ctrlc::set_handler(move || {
        let _ = shutdown_commands.send(EngineCommand::Disconnect);
        let _ = shutdown_commands.send(EngineCommand::Shutdown);
    })
    .expect("failed to set Ctrl+C handler");

    if let Some(talkgroup) = args.talkgroup {
        let _ = commands.send(EngineCommand::SetTalkgroup(talkgroup));
        let _ = commands.send(EngineCommand::SetCallType(CallType::Group));
    }
    let _ = commands.send(EngineCommand::Connect);

    for event in events {
        match event {
            EngineEvent::SessionUp => info!("logged in"),
            EngineEvent::SessionDown(reason) => {
                warn!(%reason, "session lost");
                let _ = commands.send(EngineCommand::Shutdown);
            }
            EngineEvent::AuthFailed(reason) => {
                error!(%reason, "authentication failed");
                let _ = commands.send(EngineCommand::Shutdown);
            }
            EngineEvent::CallRejected(reason) => warn!(%reason, "call rejected"),
            EngineEvent::LcReceived { stream_id, lc } => {
                info!(
                    stream_id,
                    src_id = lc.src_id,
                    dst_id = lc.dst_id,
                    call_type = %lc.call_type,
                    "call in progress"
                );
            }
            EngineEvent::VoiceReceived { .. } => {
                // No vocoder attached; voice payloads are dropped here
            }
            EngineEvent::RemoteCallEnded { stream_id, lc } => match lc {
                Some(lc) => info!(stream_id, src_id = lc.src_id, "call ended"),
                None => info!(stream_id, "call ended"),
            },
        }
    }

    let _ = engine_thread.join();
}
