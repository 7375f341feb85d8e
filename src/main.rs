use std::fs::File;
use std::io::{self, BufRead, Write};
use std::panic;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use undoable::command::{Command, LoadTarget};
use undoable::config::AppConfig;
use undoable::document::Document;
use undoable::error::HistoryError;
use undoable::history::History;
use undoable::landmarks::actions::{self, ActionError, LandmarkHistory};
use undoable::landmarks::csvio::{self, CsvFlags};
use undoable::landmarks::{LandmarkDocument, LandmarkError, Side};

struct Args {
    config: Option<PathBuf>,
    landmarks: Option<PathBuf>,
    document: Option<PathBuf>,
}

/// Parse command line arguments
fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut config = None;
    let mut landmarks = None;
    let mut document = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-c" | "--config" => {
                if i + 1 < args.len() {
                    config = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                } else {
                    eprintln!("Error: --config requires an argument");
                    std::process::exit(1);
                }
            }
            "-l" | "--landmarks" => {
                if i + 1 < args.len() {
                    landmarks = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                } else {
                    eprintln!("Error: --landmarks requires an argument");
                    std::process::exit(1);
                }
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            arg if arg.starts_with('-') => {
                eprintln!("Unknown option: {}", arg);
                std::process::exit(1);
            }
            _ => {
                document = Some(PathBuf::from(&args[i]));
                i += 1;
            }
        }
    }

    Args { config, landmarks, document }
}

fn print_help() {
    eprintln!("undoable - a line-oriented landmark editor with undo/redo");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    undoable [OPTIONS] [DOCUMENT]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -c, --config <FILE>      Load settings from a TOML file");
    eprintln!("    -l, --landmarks <FILE>   Start with source landmarks read from a CSV file");
    eprintln!("    -h, --help               Print this help message");
    eprintln!();
    eprintln!("DOCUMENT is a TOML file written by `save`. It is opened if it exists.");
    eprintln!();
    print_commands();
}

fn print_commands() {
    eprintln!("COMMANDS:");
    eprintln!("    add src|dst X Y Z        add a landmark to one side");
    eprintln!("    addnp X Y Z              add a non-participating landmark");
    eprintln!("    move NAME src|dst X Y Z  set one side of a landmark");
    eprintln!("    rename OLD NEW           rename a landmark");
    eprintln!("    del PATH                 delete an element");
    eprintln!("    blend F                  set the blending factor");
    eprintln!("    normals on|off           toggle recalculating normals");
    eprintln!("    clear | new              clear all landmarks, or start a new document");
    eprintln!("    select|hover|isolate PATH");
    eprintln!("    scale F                  set the decoration scale factor");
    eprintln!("    undo | redo | log | checkout ID | show");
    eprintln!("    load src|dst|np FILE     import landmarks from CSV");
    eprintln!("    open FILE                open a saved document");
    eprintln!("    save FILE                save the whole document as TOML");
    eprintln!("    w                        save to the last saved or opened file");
    eprintln!("    export FILE              export paired landmarks to CSV");
    eprintln!("    q | q!");
}

/// Log panics before the default hook prints them
fn install_panic_hook() {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        if let Some(location) = info.location() {
            error!(
                file = location.file(),
                line = location.line(),
                "panic occured"
            );
        } else {
            error!("panic occured");
        }

        if let Some(s) = info.payload().downcast_ref::<&str>() {
            error!(message = %s);
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            error!(message = %s);
        }

        default_hook(info);
    }));
}

fn load_config(path: Option<&Path>) -> AppConfig {
    let Some(path) = path else {
        return AppConfig::default();
    };
    match AppConfig::from_file(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn open(path: &Path) -> Result<File, ActionError> {
    File::open(path).map_err(|e| ActionError::Landmark(LandmarkError::Io(e)))
}

fn or_dash<T: ToString>(value: Option<&T>) -> String {
    value.map_or_else(|| "-".to_string(), T::to_string)
}

fn show(history: &LandmarkHistory, out: &mut impl Write) -> io::Result<()> {
    let doc = history.document();
    for pair in &doc.pairs {
        writeln!(
            out,
            "  {:<16} src {:<24} dst {}",
            pair.name,
            or_dash(pair.source.as_ref()),
            or_dash(pair.destination.as_ref())
        )?;
    }
    for lm in &doc.non_participating {
        writeln!(out, "  {:<16} np  {}", lm.name, lm.location)?;
    }
    writeln!(
        out,
        "blend {}  normals {}  paired {}/{}",
        doc.blending_factor,
        if doc.recalculate_normals { "on" } else { "off" },
        doc.count_fully_paired(),
        doc.pairs.len()
    )?;

    let sticky = history.sticky();
    writeln!(
        out,
        "selected {}  hovered {}  isolated {}  scale {}",
        or_dash(sticky.selected.as_ref()),
        or_dash(sticky.hovered.as_ref()),
        or_dash(sticky.isolated.as_ref()),
        sticky.scale_factor
    )?;
    writeln!(
        out,
        "head {}{}{}",
        history.head(),
        if history.is_dirty() { " (modified)" } else { "" },
        if history.is_up_to_date_with_saved() { " (saved)" } else { "" }
    )
}

fn log(history: &LandmarkHistory, out: &mut impl Write) -> io::Result<()> {
    for commit in history.lineage() {
        let marker = if commit.id() == history.head() { "*" } else { " " };
        let saved = if history.saved_commit() == Some(commit.id()) { " [saved]" } else { "" };
        writeln!(out, "{} {:>6} {}{}", marker, commit.id().to_string(), commit.message(), saved)?;
    }
    Ok(())
}

/// Run one command. Returns false once the session should end.
fn execute(history: &mut LandmarkHistory, command: Command, out: &mut impl Write) -> Result<bool, ActionError> {
    let io_err = |e: io::Error| ActionError::Landmark(LandmarkError::Io(e));

    match command {
        Command::Add { side, position } => {
            let name = actions::add_landmark(history, side, position)?;
            writeln!(out, "added {} {}", name, side.path_segment()).map_err(io_err)?;
        }
        Command::AddNonParticipating(position) => {
            let name = actions::add_non_participating_landmark(history, position)?;
            writeln!(out, "added {}", name).map_err(io_err)?;
        }
        Command::Move { name, side, position } => {
            if !actions::set_landmark_position(history, &name, side, position)? {
                writeln!(out, "no landmark named {}", name).map_err(io_err)?;
            }
        }
        Command::Rename { old, new } => {
            let renamed = actions::rename_landmark(history, &old, &new)?
                || actions::rename_non_participating_landmark(history, &old, &new)?;
            if !renamed {
                writeln!(out, "cannot rename {} to {}", old, new).map_err(io_err)?;
            }
        }
        Command::Delete(path) => {
            if !actions::delete_element(history, &path)? {
                writeln!(out, "nothing at {}", path).map_err(io_err)?;
            }
        }
        Command::Blend(factor) => {
            actions::set_blend_factor(history, factor)?;
        }
        Command::Normals(enabled) => {
            actions::set_recalculating_normals(history, enabled)?;
        }
        Command::Clear => {
            actions::clear_everything(history)?;
        }
        Command::New => {
            actions::create_new_document(history)?;
        }
        Command::Select(path) | Command::Hover(path) | Command::Isolate(path)
            if !history.document().contains_element(&path) =>
        {
            writeln!(out, "nothing at {}", path).map_err(io_err)?;
        }
        Command::Select(path) => history.sticky_mut().selected = Some(path),
        Command::Hover(path) => history.sticky_mut().hovered = Some(path),
        Command::Isolate(path) => history.sticky_mut().isolated = Some(path),
        Command::Scale(factor) => history.sticky_mut().scale_factor = factor,
        Command::Undo => {
            if !history.undo()? {
                writeln!(out, "nothing to undo").map_err(io_err)?;
            }
        }
        Command::Redo => {
            if !history.redo()? {
                writeln!(out, "nothing to redo").map_err(io_err)?;
            }
        }
        Command::Log => log(history, out).map_err(io_err)?,
        Command::Checkout(id) => match history.checkout(id) {
            Ok(()) => {}
            Err(HistoryError::CheckoutNotFound(id)) => {
                writeln!(out, "no commit {}", id).map_err(io_err)?;
            }
            Err(e) => return Err(e.into()),
        },
        Command::Show => show(history, out).map_err(io_err)?,
        Command::Load { target, path } => {
            let reader = open(&path)?;
            let n = match target {
                LoadTarget::Pairs(side) => actions::load_landmarks_from_csv(history, side, reader)?,
                LoadTarget::NonParticipating => {
                    actions::load_non_participating_landmarks_from_csv(history, reader)?
                }
            };
            writeln!(out, "loaded {} landmarks from {}", n, path.display()).map_err(io_err)?;
        }
        Command::Open(path) => {
            actions::open_document(history, &path)?;
            writeln!(out, "opened {}", path.display()).map_err(io_err)?;
        }
        Command::Save(path) => {
            actions::save_document_as(history, &path)?;
            if history.is_dirty() {
                writeln!(out, "saved the last commit; uncommitted edits were not written").map_err(io_err)?;
            }
        }
        Command::Write => {
            if !actions::save_document(history)? {
                writeln!(out, "no file name (use save FILE)").map_err(io_err)?;
            }
        }
        Command::Export(path) => {
            let file = File::create(&path).map_err(io_err)?;
            csvio::write_pairs(history.document(), file, CsvFlags::default())?;
            info!(path = %path.display(), "exported paired landmarks");
        }
        Command::Quit => {
            if history.is_up_to_date_with_saved() {
                return Ok(false);
            }
            writeln!(out, "unsaved changes (use w or save FILE, or q! to quit anyway)").map_err(io_err)?;
        }
        Command::ForceQuit => return Ok(false),
        Command::Help => print_commands(),
        Command::Unknown(input) => {
            writeln!(out, "unknown command: {}", input).map_err(io_err)?;
        }
    }

    Ok(true)
}

fn main() -> io::Result<()> {
    let args = parse_args();
    let config = load_config(args.config.as_deref());

    // level() was checked when the config was parsed
    let level = config.level().unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
    info!("undoable started");
    match config.to_toml() {
        Ok(text) => debug!(config = %text, "effective config"),
        Err(e) => warn!(error = %e, "could not render config"),
    }

    install_panic_hook();

    let mut history: LandmarkHistory = match History::new(
        LandmarkDocument::default(),
        "created new document",
        config.history,
    ) {
        Ok(history) => history,
        Err(e) => {
            error!(error = %e, "failed to create history");
            return Err(io::Error::other(e));
        }
    };

    if let Some(path) = args.document.as_deref().filter(|p| p.exists()) {
        if let Err(e) = actions::open_document(&mut history, path) {
            error!(error = %e, path = %path.display(), "failed to open document");
            return Err(io::Error::other(e));
        }
    } else if let Some(path) = &args.document {
        // a new file; `w` writes there
        history.set_filesystem_path(Some(path.clone()));
    }

    if let Some(path) = &args.landmarks {
        let loaded = open(path)
            .and_then(|reader| actions::load_landmarks_from_csv(&mut history, Side::Source, reader));
        match loaded {
            Ok(n) => info!(count = n, path = %path.display(), "loaded landmarks"),
            Err(e) => {
                error!(error = %e, path = %path.display(), "failed to load landmarks");
                return Err(io::Error::other(e));
            }
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    for line in stdin.lock().lines() {
        let line = line?;
        let Some(command) = Command::parse(&line) else {
            if !line.trim().is_empty() && !line.trim_start().starts_with('#') {
                writeln!(stdout, "bad arguments: {}", line.trim())?;
            }
            continue;
        };

        match execute(&mut history, command, &mut stdout) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                warn!(error = %e, "command failed");
                writeln!(stdout, "error: {}", e)?;
            }
        }
        stdout.flush()?;
    }

    info!("undoable exiting");
    Ok(())
}
