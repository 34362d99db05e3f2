//! Structured command lines
//!
//! Every channel takes a single shell string. `ShellCommand` builds that
//! string from a program and an argument list, quoting each argument so
//! that untrusted values (package names, property values) are passed as
//! one word.

use std::fmt;

use crate::error::CommandError;

/// Quote a single word for a POSIX shell.
///
/// Words made only of safe characters are returned unchanged; anything else
/// is wrapped in single quotes with embedded quotes written as `'\''`.
pub fn quote(word: &str) -> String {
    if !word.is_empty() && word.chars().all(is_safe_char) {
        return word.to_string();
    }

    let mut quoted = String::with_capacity(word.len() + 2);
    quoted.push('\'');
    for c in word.chars() {
        if c == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(c);
        }
    }
    quoted.push('\'');
    quoted
}

fn is_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | '=' | '@' | ',' | '+')
}

/// A program plus arguments, rendered as one shell string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    program: String,
    args: Vec<String>,
}

impl ShellCommand {
    /// Start a command for `program`
    pub fn new(program: impl Into<String>) -> Result<Self, CommandError> {
        let program = program.into();
        if program.trim().is_empty() {
            return Err(CommandError::EmptyProgram);
        }
        reject_nul(&program)?;
        Ok(Self {
            program,
            args: Vec::new(),
        })
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Result<Self, CommandError> {
        let arg = arg.into();
        reject_nul(&arg)?;
        self.args.push(arg);
        Ok(self)
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Result<Self, CommandError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for arg in args {
            self = self.arg(arg)?;
        }
        Ok(self)
    }

    /// Render the shell string
    pub fn render(&self) -> String {
        let mut line = quote(&self.program);
        for arg in &self.args {
            line.push(' ');
            line.push_str(&quote(arg));
        }
        line
    }

    /// Join several commands so each runs only if the previous succeeded
    pub fn chain(commands: &[ShellCommand]) -> String {
        commands
            .iter()
            .map(ShellCommand::render)
            .collect::<Vec<_>>()
            .join(" && ")
    }
}

impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn reject_nul(value: &str) -> Result<(), CommandError> {
    if value.contains('\0') {
        return Err(CommandError::NulByte(value.replace('\0', "\\0")));
    }
    Ok(())
}

/// A validated Android package name (`com.example.app`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageName(String);

impl PackageName {
    /// Validate a package name.
    ///
    /// At least two dot-separated segments, each starting with a letter and
    /// containing only ASCII letters, digits and underscores.
    pub fn parse(name: &str) -> Result<Self, CommandError> {
        let segments: Vec<&str> = name.split('.').collect();
        let valid = segments.len() >= 2
            && segments.iter().all(|segment| {
                let mut chars = segment.chars();
                matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
                    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            });

        if valid {
            Ok(Self(name.to_string()))
        } else {
            Err(CommandError::InvalidPackageName(name.to_string()))
        }
    }

    /// The name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
