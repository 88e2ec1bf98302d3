use std::{env, env::VarError};

/// The server takes no arguments. Any argument prints the help text and the current configuration, and returns true.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
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
    const DISPLAY_ENVS: [&str; 11] = [
        "RUST_LOG",
        "TSY_HOST",
        "TSY_PORT",
        "TSY_DATABASE_URL",
        "TSY_SERVER_BASE_URL",
        "TSY_CLIENT_BASE_URL",
        "TSY_REQUIRE_BUYER_IDENTITY",
        "TSY_ESEWA_ENV",
        "TSY_ESEWA_MERCHANT_CODE",
        "TSY_KHALTI_BASE_URL",
        "TSY_KHALTI_TIMEOUT_SECS",
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
