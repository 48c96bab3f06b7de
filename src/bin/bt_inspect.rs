use anyhow::{bail, Context, Result};
use serde::Serialize;

use bt_dump::body::TrackedFrame;
use bt_dump::recording::RecordingReader;

struct Args {
    path: String,
    json: bool,
}

fn parse_args() -> Result<Args> {
    // 使い方: bt_inspect <file.btd> [--json]
    let mut path = None;
    let mut json = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--json" => json = true,
            a if a.starts_with("--") => bail!("unknown option: {}", a),
            _ if path.is_some() => bail!("only one recording can be inspected at a time"),
            _ => path = Some(arg),
        }
    }
    match path {
        Some(path) => Ok(Args { path, json }),
        None => bail!("usage: bt_inspect <file.btd> [--json]"),
    }
}

#[derive(Serialize)]
struct FrameLine<'a> {
    index: u64,
    #[serde(flatten)]
    frame: &'a TrackedFrame,
}

fn text_line(index: u64, frame: &TrackedFrame) -> String {
    let ids: Vec<String> = frame.bodies.iter().map(|b| b.id.to_string()).collect();
    format!(
        "#{:<6} t={:>12} ({:.3}s) bodies={} [{}]",
        index,
        frame.device_timestamp,
        frame.timestamp_secs(),
        frame.body_count(),
        ids.join(", ")
    )
}

fn main() -> Result<()> {
    let args = parse_args()?;
    let mut reader = RecordingReader::open(&args.path)
        .with_context(|| format!("failed to read header of {}", args.path))?;

    if args.json {
        println!("{}", serde_json::to_string(reader.header())?);
    } else {
        for line in reader.header().lines() {
            println!("{}", line);
        }
        println!();
    }

    let mut bodies = 0usize;
    loop {
        let index = reader.frames_read();
        let frame = match reader.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => bail!("{}: record {} is invalid: {}", args.path, index, e),
        };
        bodies += frame.body_count();
        if args.json {
            println!("{}", serde_json::to_string(&FrameLine { index, frame: &frame })?);
        } else {
            println!("{}", text_line(index, &frame));
        }
    }

    if !args.json {
        println!();
        println!("{} frames, {} bodies", reader.frames_read(), bodies);
    }
    Ok(())
}
