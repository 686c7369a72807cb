//! Interactive credential prompts

use crate::app::services::portal_client::Credentials;
use crate::{Error, Result};
use std::io::{self, BufRead, Write};

/// Ask for a single non-empty line
pub fn prompt_line<R: BufRead, W: Write>(reader: &mut R, writer: &mut W, label: &str) -> Result<String> {
    write_prompt(writer, label)?;

    let mut input = String::new();
    reader
        .read_line(&mut input)
        .map_err(|e| Error::io("Failed to read user input", e))?;

    let value = input.trim_end_matches(['\r', '\n']).to_string();
    non_empty(value, label)
}

/// Ask for a secret from a reader, without echoing it back to the writer
pub fn prompt_secret<R: BufRead, W: Write>(reader: &mut R, writer: &mut W, label: &str) -> Result<String> {
    write_prompt(writer, label)?;

    let value = rpassword::read_password_from_bufread(reader)
        .map_err(|e| Error::io("Failed to read password", e))?;
    non_empty(value, label)
}

/// Ask for a secret on the terminal with echo turned off
fn prompt_terminal_secret(label: &str) -> Result<String> {
    let value = rpassword::prompt_password(format!("{}: ", label))
        .map_err(|e| Error::io("Failed to read password", e))?;
    non_empty(value, label)
}

fn write_prompt<W: Write>(writer: &mut W, label: &str) -> Result<()> {
    write!(writer, "{}: ", label)
        .and_then(|_| writer.flush())
        .map_err(|e| Error::io("Failed to write prompt", e))
}

fn non_empty(value: String, label: &str) -> Result<String> {
    if value.trim().is_empty() {
        return Err(Error::configuration(format!("{} cannot be empty", label)));
    }
    Ok(value)
}

/// Complete the credentials from the terminal where the command line left them out
pub fn resolve_credentials(username: Option<String>, password: Option<String>) -> Result<Credentials> {
    let username = match username {
        Some(username) => username,
        None => {
            let stdin = io::stdin();
            prompt_line(&mut stdin.lock(), &mut io::stdout(), "Username")?
        }
    };
    let password = match password {
        Some(password) => password,
        None => prompt_terminal_secret("Password")?,
    };

    Ok(Credentials::new(username.trim(), password))
}
