use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;

use crate::document::ElementPath;
use crate::history::CommitId;
use crate::landmarks::{Side, Vec3};

/// Where `load` puts the landmarks it reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadTarget {
    Pairs(Side),
    NonParticipating,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Add { side: Side, position: Vec3 },
    AddNonParticipating(Vec3),
    Move { name: String, side: Side, position: Vec3 },
    Rename { old: String, new: String },
    Delete(ElementPath),
    Blend(f32),
    Normals(bool),
    Clear,
    New,
    Select(ElementPath),
    Hover(ElementPath),
    Isolate(ElementPath),
    Scale(f32),
    Undo,
    Redo,
    Log,
    Checkout(CommitId),
    Show,
    Load { target: LoadTarget, path: PathBuf },
    Open(PathBuf),
    Save(PathBuf),
    Write,      // save to the remembered path
    Export(PathBuf),
    Quit,
    ForceQuit,  // quit even with unsaved changes
    Help,
    Unknown(String),
}

fn command_regex() -> &'static Regex {
    static COMMAND_RE: OnceLock<Regex> = OnceLock::new();
    COMMAND_RE.get_or_init(|| Regex::new(r"^(\S+)(?:\s+(.*))?$").unwrap())
}

fn parse_position(args: &[&str]) -> Option<Vec3> {
    match args {
        [x, y, z] => Some(Vec3::new(x.parse().ok()?, y.parse().ok()?, z.parse().ok()?)),
        _ => None,
    }
}

fn parse_path(args: &[&str]) -> Option<ElementPath> {
    match args {
        [path] => Some(ElementPath::from(*path)),
        _ => None,
    }
}

fn parse_toggle(arg: &str) -> Option<bool> {
    match arg {
        "on" | "true" | "1" => Some(true),
        "off" | "false" | "0" => Some(false),
        _ => None,
    }
}

impl Command {
    /// Parse one input line. Returns None for a known command with bad
    /// arguments and for blank lines.
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return None;
        }

        let caps = command_regex().captures(trimmed)?;
        let verb = caps.get(1)?.as_str();
        let rest = caps.get(2).map_or("", |m| m.as_str());
        let args: Vec<&str> = rest.split_whitespace().collect();

        match (verb, args.as_slice()) {
            ("add", [side, coords @ ..]) => Some(Command::Add {
                side: side.parse().ok()?,
                position: parse_position(coords)?,
            }),
            ("addnp", coords) => Some(Command::AddNonParticipating(parse_position(coords)?)),
            ("move" | "mv", [name, side, coords @ ..]) => Some(Command::Move {
                name: name.to_string(),
                side: side.parse().ok()?,
                position: parse_position(coords)?,
            }),
            ("rename", [old, new]) => Some(Command::Rename {
                old: old.to_string(),
                new: new.to_string(),
            }),
            ("del" | "delete" | "rm", paths) => Some(Command::Delete(parse_path(paths)?)),
            ("blend", [factor]) => Some(Command::Blend(factor.parse().ok()?)),
            ("normals", [toggle]) => Some(Command::Normals(parse_toggle(toggle)?)),
            ("select", paths) => Some(Command::Select(parse_path(paths)?)),
            ("hover", paths) => Some(Command::Hover(parse_path(paths)?)),
            ("isolate", paths) => Some(Command::Isolate(parse_path(paths)?)),
            ("scale", [factor]) => Some(Command::Scale(factor.parse().ok()?)),
            ("checkout" | "co", [id]) => Some(Command::Checkout(id.parse().ok()?)),
            ("load", [target, _, ..]) => {
                // file names may contain spaces
                let path = rest.trim_start().strip_prefix(target)?.trim();
                let target = match *target {
                    "np" | "nonparticipating" => LoadTarget::NonParticipating,
                    side => LoadTarget::Pairs(side.parse().ok()?),
                };
                Some(Command::Load { target, path: PathBuf::from(path) })
            }
            ("open", [_, ..]) => Some(Command::Open(PathBuf::from(rest.trim()))),
            ("save", [_, ..]) => Some(Command::Save(PathBuf::from(rest.trim()))),
            ("export", [_, ..]) => Some(Command::Export(PathBuf::from(rest.trim()))),
            ("clear", []) => Some(Command::Clear),
            ("new", []) => Some(Command::New),
            ("undo" | "u", []) => Some(Command::Undo),
            ("redo" | "r", []) => Some(Command::Redo),
            ("log", []) => Some(Command::Log),
            ("show" | "ls", []) => Some(Command::Show),
            ("w", []) => Some(Command::Write),
            ("q" | "quit", []) => Some(Command::Quit),
            ("q!", []) => Some(Command::ForceQuit),
            ("help" | "h" | "?", []) => Some(Command::Help),
            (
                "add" | "move" | "mv" | "rename" | "blend" | "normals" | "scale" | "checkout" | "co"
                | "load" | "open" | "save" | "export" | "clear" | "new" | "undo" | "u" | "redo"
                | "r" | "log" | "show" | "ls" | "w" | "q" | "quit" | "q!" | "help" | "h" | "?",
                _,
            ) => None,
            _ => Some(Command::Unknown(trimmed.to_string())),
        }
    }
}
