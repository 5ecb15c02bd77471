// Terminal output and prompts
use std::io::{self, IsTerminal, Write};

use colored::Colorize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Info,
    Progress,
    Match,
    Success,
    Warning,
    Error,
}

/// Interactive line-based I/O used by the session.
#[allow(async_fn_in_trait)]
pub trait Prompter {
    /// Show `prompt` and read one trimmed line.
    async fn ask(&mut self, prompt: &str) -> io::Result<String>;

    fn say(&mut self, tone: Tone, message: &str);
}

/// Colored stdin/stdout terminal
pub struct Console;

impl Console {
    pub fn new() -> Self {
        // Plain output when piped
        if !io::stdout().is_terminal() {
            colored::control::set_override(false);
        }
        Console
    }

    pub fn print_intro(&self) {
        println!();
        println!("{}", "╔══════════════════════════════════════════╗".green());
        println!("{}", "║        ( SPOTTED )  on  ( SPOTIFY )      ║".green());
        println!("{}", "╚══════════════════════════════════════════╝".green());
        println!("{}", "      Welcome to Spotted on Spotify!".green().bold());
        println!();
    }
}

impl Prompter for Console {
    async fn ask(&mut self, prompt: &str) -> io::Result<String> {
        read_line(prompt).await
    }

    fn say(&mut self, tone: Tone, message: &str) {
        print(tone, message);
    }
}

pub fn print(tone: Tone, message: &str) {
    match tone {
        Tone::Info => println!("{}", message.white()),
        Tone::Progress => println!("{}", message),
        Tone::Match => println!("{}", message.cyan()),
        Tone::Success => println!("{}", message.bright_green()),
        Tone::Warning => println!("{}", message.yellow()),
        Tone::Error => eprintln!("{}", message.red()),
    }
}

/// Blocking stdin read on the blocking pool; EOF is an error.
pub async fn read_line(prompt: &str) -> io::Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed"));
        }
        Ok(line.trim().to_string())
    })
    .await
    .map_err(io::Error::other)?
}
