use std::{env, env::VarError};

/// There's no real CLI for the server. Any argument prints the help text and the current configuration.
///
/// Returns true if the help was printed, in which case the caller should exit.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 13] = [
        "RUST_LOG",
        "FPS_HOST",
        "FPS_PORT",
        "FPS_DATABASE_URL",
        "FPS_RUN_MIGRATIONS",
        "FPS_BILLING_WORKER",
        "FPS_BILLING_INTERVAL_SECS",
        "FPS_FEE_RATE_BPS",
        "FPS_PLATFORM_RECEIVER_NAME",
        "FPS_AUTO_APPROVE_MAX_SCORE",
        "FPS_AUTO_REJECT_MIN_SCORE",
        "FPS_HIGH_RISK_ACTION",
        "FPS_ORDER_EXPIRY_HOURS",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    });
    let secret = if env::var("FPS_GATEWAY_SECRET").is_ok_and(|s| !s.is_empty()) { "Set" } else { "Not set" };
    println!("  {:<35} {secret:<15}", "FPS_GATEWAY_SECRET");
}
