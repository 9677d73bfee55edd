//! Process entry point for a standalone Manager.

use std::process::ExitCode as ProcessExitCode;
use std::sync::Arc;

use clap::Parser;
use rtcomp_manager::{ExitCode, Manager};

#[derive(Parser, Debug)]
#[command(name = "rtcomp-managerd", about = "RT component middleware process manager")]
struct Args {
    /// Configuration file path (overridden by RTCOMP_MANAGER_CONFIG).
    #[arg(long)]
    config: Option<String>,

    /// Run the broker event loop on the calling thread instead of a worker.
    #[arg(long, default_value_t = false)]
    block: bool,
}

fn main() -> ProcessExitCode {
    let args = Args::parse();
    let mut argv: Vec<String> = Vec::new();
    if let Some(config) = &args.config {
        argv.push("--config".to_string());
        argv.push(config.clone());
    }

    let manager = match Manager::init(&argv) {
        Ok(manager) => manager,
        Err(err) => {
            eprintln!("manager init failed: {err}");
            return ProcessExitCode::from(ExitCode::InitFailure.code() as u8);
        }
    };

    if let Err(err) = manager.activate(|_mgr: &Arc<Manager>| Ok(())) {
        eprintln!("manager activate failed: {err}");
        return ProcessExitCode::from(ExitCode::BrokerInitFailure.code() as u8);
    }

    if let Err(err) = manager.run(args.block) {
        eprintln!("manager run failed: {err}");
        return ProcessExitCode::from(ExitCode::BrokerInitFailure.code() as u8);
    }

    ProcessExitCode::from(ExitCode::Normal.code() as u8)
}
