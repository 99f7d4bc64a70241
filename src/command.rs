/// Split a raw input line into owned words. No quoting or escaping.
pub fn tokenize(line: &str) -> Vec<String> {
    line.split_whitespace().map(|s| s.to_string()).collect()
}

#[derive(Debug, PartialEq)]
pub enum Command {
    Empty,
    Exit,
    /// `target` is `None` for a bare `cd`. `extra` is set when more than one
    /// argument was given.
    Cd {
        target: Option<String>,
        extra: bool,
    },
    External {
        argv: Vec<String>,
        background: bool,
    },
}

impl Command {
    pub fn parse(mut tokens: Vec<String>) -> Self {
        match tokens.first().map(String::as_str) {
            None => return Command::Empty,
            Some("exit") => return Command::Exit,
            Some("cd") => {
                return Command::Cd {
                    target: tokens.get(1).cloned(),
                    extra: tokens.len() > 2,
                }
            }
            Some(_) => {}
        }

        let background = tokens.last().map(|t| t == "&").unwrap_or(false);
        if background {
            tokens.pop();
        }
        if tokens.is_empty() {
            return Command::Empty;
        }
        Command::External {
            argv: tokens,
            background,
        }
    }

    pub fn from_line(line: &str) -> Self {
        Command::parse(tokenize(line))
    }
}
