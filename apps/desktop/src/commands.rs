//! Interactive session: line commands mapped onto controller actions.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use client_core::{ActionRejected, Phase, Resolution, SessionController, SessionSnapshot};
use shared::{
    domain::{has_accepted_extension, InputItem, ACCEPTED_EXTENSIONS},
    protocol::ArtifactRef,
};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::warn;

pub const HELP: &str = "\
commands:
  add <file>...          select audio files (appended to the selection)
  clear                  clear the selection
  remove <index>         remove the selected file at <index>
  url <url>              ingest audio from a URL
  upload                 upload the selected files
  tempo <60..180>        set tempo
  pitch <-12..12>        set pitch shift in semitones
  mix <0..100>           set effect mix
  generate               generate a remix from the selected files
  download <index> [out] download a stem listed under artifacts
  status                 probe the backend
  show                   print the session
  help                   print this help
  quit                   end the session";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Add(Vec<PathBuf>),
    Clear,
    Remove(usize),
    Url(String),
    Upload,
    Tempo(i32),
    Pitch(i32),
    Mix(i32),
    Generate,
    Download {
        index: usize,
        output: Option<PathBuf>,
    },
    Status,
    Show,
    Help,
    Quit,
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<SessionCommand>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match verb.to_ascii_lowercase().as_str() {
        "add" => {
            if args.is_empty() {
                bail!("usage: add <file>...");
            }
            SessionCommand::Add(args.iter().map(PathBuf::from).collect())
        }
        "clear" => SessionCommand::Clear,
        "remove" | "rm" => SessionCommand::Remove(single_arg(&args, "remove <index>")?),
        // URLs keep their original spelling; an empty one is judged by the controller.
        "url" => SessionCommand::Url(args.join(" ")),
        "upload" => SessionCommand::Upload,
        "tempo" => SessionCommand::Tempo(single_arg(&args, "tempo <bpm>")?),
        "pitch" => SessionCommand::Pitch(single_arg(&args, "pitch <semitones>")?),
        "mix" => SessionCommand::Mix(single_arg(&args, "mix <percent>")?),
        "generate" | "gen" => SessionCommand::Generate,
        "download" => match args.as_slice() {
            [index] => SessionCommand::Download {
                index: parse_number(index)?,
                output: None,
            },
            [index, output] => SessionCommand::Download {
                index: parse_number(index)?,
                output: Some(PathBuf::from(output)),
            },
            _ => bail!("usage: download <index> [output]"),
        },
        "status" => SessionCommand::Status,
        "show" | "ls" => SessionCommand::Show,
        "help" | "?" => SessionCommand::Help,
        "quit" | "exit" => SessionCommand::Quit,
        other => bail!("unknown command '{other}', try 'help'"),
    };
    Ok(Some(command))
}

fn single_arg<T: std::str::FromStr>(args: &[&str], usage: &str) -> Result<T> {
    match args {
        [value] => parse_number(value),
        _ => bail!("usage: {usage}"),
    }
}

fn parse_number<T: std::str::FromStr>(raw: &str) -> Result<T> {
    raw.parse::<T>()
        .map_err(|_| anyhow!("'{raw}' is not a valid number"))
}

/// Reads selected files into memory. Extensions outside the accepted list
/// are only warned about; the service has the final say.
pub async fn read_inputs(paths: &[PathBuf]) -> Result<Vec<InputItem>> {
    let mut items = Vec::with_capacity(paths.len());
    for path in paths {
        let name = file_name(path)?;
        if !has_accepted_extension(&name) {
            warn!(
                file = %name,
                accepted = ?ACCEPTED_EXTENSIONS,
                "file extension is outside the accepted audio types"
            );
        }
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read input file '{}'", path.display()))?;
        items.push(InputItem::new(name, bytes));
    }
    Ok(items)
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("'{}' does not name a file", path.display()))
}

pub fn describe(snapshot: &SessionSnapshot) -> String {
    let mut out = String::new();
    let phase = match snapshot.phase {
        Phase::Idle => "idle".to_string(),
        Phase::InFlight(operation) => format!("busy ({operation:?})"),
    };
    out.push_str(&format!("status:  {}\n", snapshot.status_message));
    out.push_str(&format!("phase:   {phase}\n"));
    out.push_str(&format!(
        "backend: {}\n",
        snapshot.backend_status.as_deref().unwrap_or("unknown")
    ));
    out.push_str(&format!(
        "params:  tempo={} pitch={} effect_mix={}\n",
        snapshot.params.tempo.get(),
        snapshot.params.pitch_shift.get(),
        snapshot.params.effect_mix.get()
    ));
    out.push_str(&format!(
        "ready:   {}\n",
        if snapshot.ready { "yes" } else { "no" }
    ));
    out.push_str("inputs:\n");
    for (index, name) in snapshot.input_names.iter().enumerate() {
        out.push_str(&format!("  [{index}] {name}\n"));
    }
    if !snapshot.artifacts.is_empty() {
        out.push_str("artifacts:\n");
        for (index, artifact) in snapshot.artifacts.iter().enumerate() {
            out.push_str(&format!("  [{index}] {}\n", artifact.path()));
        }
    }
    if let Some(result) = &snapshot.last_result {
        let payload = serde_json::to_string_pretty(&result.payload)
            .unwrap_or_else(|_| result.payload.to_string());
        out.push_str(&format!(
            "last result ({}):\n{payload}\n",
            result.received_at.to_rfc3339()
        ));
    }
    out
}

pub async fn write_artifact(
    artifact: &ArtifactRef,
    output: Option<&Path>,
    bytes: &[u8],
) -> Result<PathBuf> {
    let target = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(artifact.file_name()));
    tokio::fs::write(&target, bytes)
        .await
        .with_context(|| format!("failed to write '{}'", target.display()))?;
    Ok(target)
}

/// Runs one command. Returns `false` when the session should end.
pub async fn execute(session: &SessionController, command: SessionCommand) -> Result<bool> {
    let outcome: Result<(), ActionRejected> = match command {
        SessionCommand::Quit => return Ok(false),
        SessionCommand::Help => {
            println!("{HELP}");
            return Ok(true);
        }
        SessionCommand::Show => {
            print!("{}", describe(&session.snapshot().await));
            return Ok(true);
        }
        SessionCommand::Add(paths) => {
            let items = read_inputs(&paths).await?;
            session.select_files(items).await
        }
        SessionCommand::Clear => session.select_files(Vec::new()).await,
        SessionCommand::Remove(index) => session.remove_file(index).await.map(|_| ()),
        SessionCommand::Url(url) => session.submit_url(&url).await.map(|_| ()),
        SessionCommand::Upload => session.upload().await.map(|_| ()),
        SessionCommand::Generate => session.generate().await.map(|_| ()),
        SessionCommand::Tempo(value) => session.set_tempo(value).await.map(|applied| {
            println!("tempo = {applied}");
        }),
        SessionCommand::Pitch(value) => session.set_pitch_shift(value).await.map(|applied| {
            println!("pitch = {applied}");
        }),
        SessionCommand::Mix(value) => session.set_effect_mix(value).await.map(|applied| {
            println!("effect mix = {applied}");
        }),
        SessionCommand::Status => session.refresh_backend_status().await.map(|shown| {
            println!("backend: {shown}");
        }),
        SessionCommand::Download { index, output } => {
            let snapshot = session.snapshot().await;
            let Some(artifact) = snapshot.artifacts.get(index).cloned() else {
                bail!(
                    "no artifact at index {index} ({} available)",
                    snapshot.artifacts.len()
                );
            };
            match session.download_artifact(artifact.clone()).await {
                Ok(Resolution::Succeeded(bytes)) => {
                    let target = write_artifact(&artifact, output.as_deref(), &bytes).await?;
                    println!("saved {}", target.display());
                    Ok(())
                }
                Ok(Resolution::Failed) => Ok(()),
                Err(rejected) => Err(rejected),
            }
        }
    };

    if let Err(rejected) = outcome {
        match rejected {
            ActionRejected::Precondition(_) => {}
            other => println!("not run: {other}"),
        }
    }
    println!("{}", session.snapshot().await.status_message);
    Ok(true)
}

pub async fn run_interactive(session: &SessionController) -> Result<()> {
    if let Ok(shown) = session.refresh_backend_status().await {
        println!("backend: {shown}");
    }
    println!("{}", session.snapshot().await.status_message);
    println!("type 'help' for commands");

    let mut stdout = io::stdout();
    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        stdout.write_all(b"remixer> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };
        match execute(session, command).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => println!("error: {err:#}"),
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
