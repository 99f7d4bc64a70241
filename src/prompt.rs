use std::io::{self, Write};

pub const PROMPT: &str = "$ ";

pub struct Prompt {
    text: String,
}

impl Prompt {
    pub fn new() -> Self {
        Self {
            text: String::from(PROMPT),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Print the prompt without a newline and flush so it shows up before
    /// the read blocks.
    pub fn display(&self) -> io::Result<()> {
        let mut stdout = io::stdout();
        stdout.write_all(self.text.as_bytes())?;
        stdout.flush()
    }
}

impl Default for Prompt {
    fn default() -> Self {
        Self::new()
    }
}
