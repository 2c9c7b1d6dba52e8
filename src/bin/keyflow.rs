// Keyflow CLI
// Validates keymap files and replays scripted key sequences through the engine

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;

use keyflow_core::config::default_path;
use keyflow_core::output::led_hints;
use keyflow_core::{
    DetectedOs, Engine, EngineConfig, HidReport, KeyEvent, KeyId, LedHint, ManualClock,
    RecordingSink, ScanLoop, Tick,
};

/// Tap-hold, combo and one-shot keymap engine
#[derive(Parser, Debug)]
#[command(name = "keyflow")]
#[command(version)]
#[command(about = "Tap-hold, combo and one-shot keymap engine", long_about = None)]
struct Args {
    /// TOML keymap file (defaults to the user config directory)
    #[arg(short, long, value_name = "KEYMAP")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Validate the keymap, print a summary and exit
    #[arg(long)]
    check_config: bool,

    /// Replay a script of timed key events and print the HID reports
    #[arg(short, long, value_name = "SCRIPT")]
    replay: Option<PathBuf>,

    /// Host OS reported before the replay starts
    #[arg(long, value_name = "OS")]
    os: Option<DetectedOs>,
}

/// One line of a replay script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Down(Tick, KeyId),
    Up(Tick, KeyId),
    Tick(Tick),
    Detect(Tick, DetectedOs),
}

impl Step {
    fn time(&self) -> Tick {
        match *self {
            Step::Down(t, _) | Step::Up(t, _) | Step::Tick(t) | Step::Detect(t, _) => t,
        }
    }
}

/// Parse `<ms> down <pos>`, `<ms> up <pos>`, `<ms> tick` or `<ms> detect <os>`.
/// Blank lines and `#` comments yield `None`.
fn parse_step(line: &str) -> Result<Option<Step>> {
    let line = line.split('#').next().unwrap_or("").trim();
    if line.is_empty() {
        return Ok(None);
    }

    let mut words = line.split_whitespace();
    let time: Tick = words
        .next()
        .ok_or_else(|| anyhow!("missing timestamp"))?
        .parse()
        .context("timestamp must be milliseconds")?;
    let verb = words.next().ok_or_else(|| anyhow!("missing event"))?;
    let arg = words.next();
    if words.next().is_some() {
        bail!("trailing words after '{}'", verb);
    }

    let position = |arg: Option<&str>| -> Result<KeyId> {
        let pos = arg.ok_or_else(|| anyhow!("'{}' needs a key position", verb))?;
        Ok(KeyId(pos.parse::<u16>().with_context(|| format!("bad key position '{pos}'"))?))
    };

    let step = match verb.to_ascii_lowercase().as_str() {
        "down" => Step::Down(time, position(arg)?),
        "up" => Step::Up(time, position(arg)?),
        "tick" => Step::Tick(time),
        "detect" => {
            let os = arg.ok_or_else(|| anyhow!("'detect' needs an OS name"))?;
            Step::Detect(
                time,
                os.parse::<DetectedOs>()
                    .map_err(|_| anyhow!("unknown OS '{os}'"))?,
            )
        }
        other => bail!("unknown event '{}'", other),
    };
    Ok(Some(step))
}

fn parse_script(content: &str) -> Result<Vec<Step>> {
    let mut steps = Vec::new();
    for (index, line) in content.lines().enumerate() {
        if let Some(step) = parse_step(line).with_context(|| format!("line {}", index + 1))? {
            steps.push(step);
        }
    }
    Ok(steps)
}

fn format_report(report: &HidReport) -> String {
    let bytes: Vec<String> = report
        .to_bytes()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();
    format!("{}  {}", bytes.join(" "), report)
}

struct Application {
    config: EngineConfig,
    path: PathBuf,
}

impl Application {
    fn load(path: PathBuf) -> Result<Self> {
        let config = EngineConfig::from_toml_path(&path)
            .with_context(|| format!("failed to load keymap {}", path.display()))?;
        log::info!("Loaded keymap '{}' from {}", config.keymap.name(), path.display());
        Ok(Self { config, path })
    }

    fn print_summary(&self) {
        let keymap = &self.config.keymap;
        println!("{}: keymap '{}' is valid", self.path.display(), keymap.name());
        println!("  keys:   {}", keymap.key_count());
        for layer in keymap.layers() {
            let hints = led_hints(layer);
            let dual = hints.iter().filter(|h| **h == LedHint::Highlight).count();
            let unassigned = hints.iter().filter(|h| **h == LedHint::Off).count();
            println!(
                "  layer:  {} ({} mod-taps, {} unassigned)",
                layer.name(),
                dual,
                unassigned
            );
        }
        println!("  combos: {}", self.config.combos.len());
        println!("  macros: {}", self.config.macros.len());
        let timing = &self.config.timing;
        println!(
            "  timing: tapping {}ms, quick tap {}ms, combo {}ms",
            timing.tapping_term, timing.quick_tap_term, timing.combo_term
        );
    }

    fn replay(self, script: &Path, os: Option<DetectedOs>) -> Result<()> {
        let content = fs::read_to_string(script)
            .with_context(|| format!("failed to read script {}", script.display()))?;
        let steps = parse_script(&content)
            .with_context(|| format!("in script {}", script.display()))?;

        let engine = Engine::new(self.config)?;
        let start = steps.first().map(Step::time).unwrap_or(0);
        let mut scan = ScanLoop::new(engine, ManualClock::new(start), RecordingSink::new());
        if let Some(os) = os {
            scan.host_detected(os);
            Self::flush(&mut scan, start);
        }

        for step in steps {
            scan.clock_mut().set(step.time());
            match step {
                Step::Down(t, key) => scan.scan([KeyEvent::press(key, t)]),
                Step::Up(t, key) => scan.scan([KeyEvent::release(key, t)]),
                Step::Tick(_) => scan.scan(std::iter::empty::<KeyEvent>()),
                Step::Detect(_, os) => scan.host_detected(os),
            }
            Self::flush(&mut scan, step.time());
        }

        if let Some(deadline) = scan.engine().next_deadline() {
            log::warn!("Script ended with a timer still pending (due at {})", deadline);
        }
        if scan.overruns() > 0 {
            log::warn!("{} queue overruns during replay", scan.overruns());
        }
        Ok(())
    }

    fn flush(scan: &mut ScanLoop<ManualClock, RecordingSink>, time: Tick) {
        let sink = scan.sink_mut();
        for report in &sink.reports {
            println!("{time:>8}  {}", format_report(report));
        }
        for indicator in &sink.indicators {
            println!("{time:>8}  {:?}", indicator);
        }
        sink.clear();
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let path = match args.config.clone() {
        Some(path) => path,
        None => default_path().ok_or_else(|| anyhow!("no config directory, pass --config"))?,
    };
    let app = Application::load(path)?;

    if args.check_config {
        app.print_summary();
        return Ok(());
    }

    match &args.replay {
        Some(script) => app.replay(script, args.os),
        None => {
            app.print_summary();
            println!("nothing to do; pass --replay <SCRIPT> to run a key sequence");
            Ok(())
        }
    }
}
