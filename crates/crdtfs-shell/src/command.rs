//! Shell command language.
//!
//! One command per line, words split on whitespace. `write` and `append`
//! take the rest of the line as text. Blank lines and `#` comments are
//! skipped.

use std::io::Write;
use std::time::UNIX_EPOCH;

use crdtfs_kernel::{CrdtFs, FileAttr, SetAttr};
use thiserror::Error;

pub const HELP: &str = "\
commands:
  ls <dir>                      list a directory
  mkdir <dir>                   create a directory
  touch <file>                  create a file or update its times
  write <file> <offset> <text>  write text at a byte offset
  append <file> <text>          write text at the end of a file
  cat <file> [offset len]       print file content
  stat <path>                   print attributes
  mv <old> <new>                rename a file or directory
  rm <file>                     remove a file
  rmdir <dir>                   remove an empty directory
  truncate <file> <size>        set a file's length
  chmod <octal> <path>          set permission bits
  refresh                       re-read the path map now
  help                          show this text";

/// Errors parsing one line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid number '{0}'")]
    Number(String),
}

/// A parsed shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ls(String),
    Mkdir(String),
    Touch(String),
    Write { path: String, offset: u64, text: String },
    Append { path: String, text: String },
    Cat { path: String, range: Option<(u64, u32)> },
    Stat(String),
    Mv { from: String, to: String },
    Rm(String),
    Rmdir(String),
    Truncate { path: String, size: u64 },
    Chmod { perm: u32, path: String },
    Refresh,
    Help,
}

impl Command {
    /// Parse one line. `Ok(None)` for blank lines and comments.
    pub fn parse(line: &str) -> Result<Option<Self>, ParseError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let (name, rest) = split_word(line);
        let args: Vec<&str> = rest.split_whitespace().collect();
        let cmd = match (name, args.as_slice()) {
            ("ls", [dir]) => Command::Ls(dir.to_string()),
            ("ls", []) => Command::Ls("/".to_string()),
            ("mkdir", [dir]) => Command::Mkdir(dir.to_string()),
            ("touch", [file]) => Command::Touch(file.to_string()),
            ("write", [_, _, ..]) => {
                let (path, rest) = split_word(rest);
                let (offset, text) = split_word(rest);
                if text.is_empty() {
                    return Err(ParseError::Usage("write <file> <offset> <text>"));
                }
                Command::Write {
                    path: path.to_string(),
                    offset: number(offset)?,
                    text: text.to_string(),
                }
            }
            ("append", [_, _, ..]) => {
                let (path, text) = split_word(rest);
                Command::Append {
                    path: path.to_string(),
                    text: text.to_string(),
                }
            }
            ("cat", [file]) => Command::Cat {
                path: file.to_string(),
                range: None,
            },
            ("cat", [file, offset, len]) => Command::Cat {
                path: file.to_string(),
                range: Some((number(offset)?, number(len)?)),
            },
            ("stat", [path]) => Command::Stat(path.to_string()),
            ("mv", [from, to]) => Command::Mv {
                from: from.to_string(),
                to: to.to_string(),
            },
            ("rm", [file]) => Command::Rm(file.to_string()),
            ("rmdir", [dir]) => Command::Rmdir(dir.to_string()),
            ("truncate", [file, size]) => Command::Truncate {
                path: file.to_string(),
                size: number(size)?,
            },
            ("chmod", [perm, path]) => Command::Chmod {
                perm: u32::from_str_radix(perm, 8)
                    .map_err(|_| ParseError::Number(perm.to_string()))?,
                path: path.to_string(),
            },
            ("refresh", []) => Command::Refresh,
            ("help", []) => Command::Help,
            (name, _) => return Err(usage_for(name)),
        };
        Ok(Some(cmd))
    }

    /// Run against `fs`, printing results to `out`.
    pub async fn execute(&self, fs: &CrdtFs, out: &mut impl Write) -> anyhow::Result<()> {
        match self {
            Command::Ls(dir) => {
                for entry in fs.readdir(dir)? {
                    let suffix = if entry.kind.is_dir() { "/" } else { "" };
                    writeln!(out, "{}{}", entry.name, suffix)?;
                }
            }
            Command::Mkdir(dir) => {
                fs.mkdir(dir).await?;
            }
            Command::Touch(file) => {
                if fs.lookup(file)?.is_some() {
                    fs.setattr(file, SetAttr::touch()).await?;
                } else {
                    fs.create(file).await?;
                }
            }
            Command::Write { path, offset, text } => {
                let n = fs.write(path, *offset, text.as_bytes()).await?;
                writeln!(out, "wrote {} bytes", n)?;
            }
            Command::Append { path, text } => {
                let end = fs.getattr(path).await?.size;
                let n = fs.write(path, end, text.as_bytes()).await?;
                writeln!(out, "wrote {} bytes", n)?;
            }
            Command::Cat { path, range } => {
                let data = match range {
                    Some((offset, len)) => fs.read(path, *offset, *len).await?,
                    None => {
                        let size = fs.getattr(path).await?.size;
                        fs.read(path, 0, u32::try_from(size).unwrap_or(u32::MAX))
                            .await?
                    }
                };
                writeln!(out, "{}", String::from_utf8_lossy(&data))?;
            }
            Command::Stat(path) => {
                let attr = fs.getattr(path).await?;
                writeln!(out, "{}", format_attr(&attr))?;
            }
            Command::Mv { from, to } => fs.rename(from, to).await?,
            Command::Rm(file) => fs.unlink(file).await?,
            Command::Rmdir(dir) => fs.rmdir(dir).await?,
            Command::Truncate { path, size } => fs.truncate(path, *size).await?,
            Command::Chmod { perm, path } => {
                fs.setattr(path, SetAttr::new().with_perm(*perm)).await?;
            }
            Command::Refresh => {
                let entries = fs.refresh().await?;
                writeln!(out, "{} entries", entries)?;
            }
            Command::Help => writeln!(out, "{}", HELP)?,
        }
        Ok(())
    }
}

fn format_attr(attr: &FileAttr) -> String {
    let kind = if attr.is_dir() { "directory" } else { "file" };
    let mtime = attr
        .mtime
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!(
        "{} mode={:o} size={} nlink={} mtime={} inode={}",
        kind, attr.mode, attr.size, attr.nlink, mtime, attr.key
    )
}

fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim_start()),
        None => (s, ""),
    }
}

fn number<T: std::str::FromStr>(s: &str) -> Result<T, ParseError> {
    s.parse().map_err(|_| ParseError::Number(s.to_string()))
}

fn usage_for(name: &str) -> ParseError {
    let usage = match name {
        "ls" => "ls <dir>",
        "mkdir" => "mkdir <dir>",
        "touch" => "touch <file>",
        "write" => "write <file> <offset> <text>",
        "append" => "append <file> <text>",
        "cat" => "cat <file> [offset len]",
        "stat" => "stat <path>",
        "mv" => "mv <old> <new>",
        "rm" => "rm <file>",
        "rmdir" => "rmdir <dir>",
        "truncate" => "truncate <file> <size>",
        "chmod" => "chmod <octal> <path>",
        "refresh" => "refresh",
        "help" => "help",
        other => return ParseError::Unknown(other.to_string()),
    };
    ParseError::Usage(usage)
}
