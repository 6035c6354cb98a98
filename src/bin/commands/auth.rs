use anyhow::{anyhow, Result};
use std::io::{IsTerminal, Write};

const SIGNUP_URL: &str = "https://cloud.projectdiscovery.io/?ref=api_key";

/// Whether an API key can be asked for interactively
pub fn can_prompt() -> bool {
    std::io::stdin().is_terminal() && std::io::stderr().is_terminal()
}

/// Ask for an API key on the terminal
pub fn prompt_api_key() -> Result<String> {
    eprintln!("Get a free API key from {}", SIGNUP_URL);
    eprint!("Enter API key (exit to abort): ");
    std::io::stderr().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    let key = input.trim();
    if key.is_empty() || key.eq_ignore_ascii_case("exit") {
        return Err(anyhow!("no API key provided"));
    }
    Ok(key.to_string())
}
