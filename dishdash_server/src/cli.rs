use std::{env, env::VarError};

pub enum CliCommand {
    /// No arguments were given. Start the server.
    Run,
    /// Help was printed. Exit.
    Help,
    /// Print a signed bearer token for the named sibling service and exit.
    IssueServiceToken(String),
}

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> CliCommand {
    let args = env::args().skip(1).collect::<Vec<String>>();
    parse_args(&args)
}

fn parse_args(args: &[String]) -> CliCommand {
    match args {
        [] => CliCommand::Run,
        [flag, name] if flag == "--issue-service-token" && !name.trim().is_empty() => {
            CliCommand::IssueServiceToken(name.trim().to_string())
        },
        _ => {
            display_readme();
            display_envs();
            CliCommand::Help
        },
    }
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 17] = [
        "RUST_LOG",
        "DD_HOST",
        "DD_PORT",
        "DD_DATABASE_URL",
        "DD_GATEWAY_URL",
        "DD_CURRENCY",
        "DD_WEBHOOK_TOLERANCE_SECS",
        "DD_SIDE_EFFECT_TIMEOUT_MS",
        "DD_OUTBOX_INTERVAL_SECS",
        "DD_OUTBOX_MAX_ATTEMPTS",
        "DD_DEFAULT_DELIVERY_FEE",
        "DD_REQUIRE_PAYMENT_BEFORE_CONFIRM",
        "DD_AUTO_CONFIRM_ON_PAYMENT",
        "DD_SYNC_ORDER_WITH_DELIVERY",
        "DD_GLOBAL_LOCATION_BROADCAST",
        "DD_NOTIFY_RELAY_URL",
        "DD_TOKEN_LIFETIME_HOURS",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
