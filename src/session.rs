use anyhow::{Context, Result};
use colored::*;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::output::{print_debug, print_error, print_info, print_success, print_warning};

/// Swallows interrupts for as long as it is held.
///
/// Enter it before handing the terminal to the prompt and the `aws` child so
/// that Ctrl+C reaches the foreground child instead of killing this process.
/// Handlers are reset on exec, so the child keeps its own interrupt handling.
pub struct InterruptScope {
    listener: JoinHandle<()>,
}

impl InterruptScope {
    pub fn enter() -> Self {
        let listener = tokio::spawn(async {
            while tokio::signal::ctrl_c().await.is_ok() {
                eprintln!();
                print_warning("Interrupt received. Ignoring in main process...");
            }
        });

        Self { listener }
    }

    #[cfg(test)]
    fn is_active(&self) -> bool {
        !self.listener.is_finished()
    }
}

impl Drop for InterruptScope {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

pub fn session_args(instance_id: &str, region: &str, profile: Option<&str>) -> Vec<String> {
    let mut args = vec![
        "ssm".to_string(),
        "start-session".to_string(),
        "--target".to_string(),
        instance_id.to_string(),
        "--region".to_string(),
        region.to_string(),
    ];

    if let Some(profile) = profile {
        args.push("--profile".to_string());
        args.push(profile.to_string());
    }

    args
}

async fn run_session(program: &str, args: &[String]) -> Result<ExitStatus> {
    Command::new(program)
        .args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .with_context(|| format!("could not run '{}'", program))
}

/// Runs `aws ssm start-session` in the foreground and reports how it ended.
/// Spawn failures are logged, not returned.
///
/// Returns the child's exit code, `None` if it never ran or died by signal.
pub async fn start_session(config: &Config, instance_id: &str) -> Option<i32> {
    print_info(&format!(
        "Starting SSM session for instance: {}",
        instance_id.green()
    ));

    let args = session_args(instance_id, &config.region, config.explicit_profile());
    print_debug(
        &format!("Running: {} {}", config.aws_cli, args.join(" ")),
        config.verbose,
    );

    match run_session(&config.aws_cli, &args).await {
        Ok(status) => {
            match status.code() {
                Some(0) => print_success("SSM session ended with exit code 0"),
                Some(code) => print_info(&format!("SSM session ended with exit code {}", code)),
                None => print_warning("SSM session was terminated by a signal"),
            }
            status.code()
        }
        Err(e) => {
            print_error(&format!("Failed to start SSM session: {:#}", e));
            None
        }
    }
}
