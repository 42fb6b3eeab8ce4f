//! Stimulus Scrambler CLI
//!
//! Command-line interface for the stimscramble library.
//! Provides an interactive shell for phase-scrambling audio and warping
//! frame sequences.

use clap::{Arg, ArgAction, Command};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use stimscramble_lib::{
    audio_io::{self, AudioInfo},
    record::{load_json, save_json, PhaseScrambleRecord, WarpRecord},
    utils::{self, presets},
    BatchConfig, Frame, FrameBatchProcessor, PhaseScrambleOutcome, ScrambleError, ShiftSource,
    SpectralPhaseScrambler, WarpFieldSet, WarpParameters,
};

#[cfg(feature = "image")]
use stimscramble_lib::image_io;

/// Randomization settings collected from flags and `set` commands
#[derive(Debug, Clone)]
struct Settings {
    max_shift: f64,
    params: WarpParameters,
    seed: Option<u64>,
    parallel: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_shift: std::f64::consts::PI,
            params: WarpParameters::default(),
            seed: None,
            parallel: true,
        }
    }
}

/// A phase scramble together with the randomization it was made with
struct ScrambledAudio {
    outcome: PhaseScrambleOutcome,
    source: ShiftSource,
    seed: Option<u64>,
}

/// A warped sequence together with the parameters and fields that made it
struct WarpedFrames {
    frames: Vec<Frame>,
    fields: WarpFieldSet,
    params: WarpParameters,
    seed: Option<u64>,
}

impl WarpedFrames {
    fn record(&self) -> WarpRecord {
        let (width, height) = self
            .frames
            .first()
            .map(|f| (f.width(), f.height()))
            .unwrap_or((0, 0));
        WarpRecord::new(self.params, self.seed, width, height, self.fields.clone())
    }
}

/// Application state
struct AppState {
    settings: Settings,
    audio: Option<(AudioInfo, Vec<Vec<f64>>)>,
    scrambled: Option<ScrambledAudio>,
    frames: Vec<Frame>,
    warped: Option<WarpedFrames>,
}

impl AppState {
    fn new(settings: Settings) -> Self {
        Self {
            settings,
            audio: None,
            scrambled: None,
            frames: Vec::new(),
            warped: None,
        }
    }
}

/// Print the help message showing available commands
fn print_help() {
    println!("Available commands:");
    println!("  load_audio <filename>                  - Load an audio file");
    println!("  scramble_audio [max_shift]             - Phase-scramble the loaded audio");
    println!("  replay_audio <record.json>             - Phase-scramble with a stored shift vector");
    println!("  save_audio <filename> [record.json]    - Save scrambled audio (and its shift record)");
    println!("  scramble_file <in> <out> [record.json] - Load, scramble and save in one go");
    #[cfg(feature = "image")]
    {
        println!("  load_frames <file> [file...]           - Load image files as a frame sequence");
        println!("  save_frames <dir> [prefix]             - Save warped frames as PNG files");
    }
    println!("  warp [max_distortion steps]            - Warp the loaded frames with new fields");
    println!("  replay_warp <record.json>              - Warp the loaded frames with stored fields");
    println!("  save_fields <record.json>              - Save the fields of the last warp");
    println!("  set <parameter> <value>                - Set max_shift, max_distortion, steps, seed, parallel");
    println!("  config                                 - Show current settings");
    println!("  presets                                - List warp presets");
    println!("  preset <id|name>                       - Load a warp preset");
    println!("  status                                 - Show what is loaded and processed");
    println!("  help                                   - Show this help message");
    println!("  quit                                   - Exit the program");
    println!();
    println!("Examples:");
    println!("  set seed 1234");
    println!("  load_audio speech.wav");
    println!("  scramble_audio 3.14159");
    println!("  save_audio speech_scrambled.wav speech_shifts.json");
    println!("  load_frames frame_001.png frame_002.png frame_003.png");
    println!("  preset strong");
    println!("  warp");
    println!("  save_frames warped/ clip");
    println!("  save_fields clip_fields.json");
}

/// Check the argument count of a command (including the command word)
fn check_args(parts: &[&str], min: usize, max: usize, usage: &str) -> Result<(), ScrambleError> {
    let got = parts.len() - 1;
    if got < min || got > max {
        let expected = if min == max {
            format!("{} ({})", min, usage)
        } else {
            format!("{} to {} ({})", min, max, usage)
        };
        return Err(ScrambleError::ArgumentCount { expected, got });
    }
    Ok(())
}

fn parse_number(name: &str, value: &str) -> Result<f64, ScrambleError> {
    value
        .parse::<f64>()
        .map_err(|_| ScrambleError::DomainValidation(format!("{} must be numeric, got '{}'", name, value)))
}

fn print_config(settings: &Settings) {
    println!("Current Settings:");
    println!("  Max phase shift: {}", utils::format_phase(settings.max_shift));
    println!("  Max distortion: {}", settings.params.max_distortion);
    println!("  Steps: {}", settings.params.steps);
    match settings.seed {
        Some(seed) => println!("  Seed: {}", seed),
        None => println!("  Seed: none (OS entropy)"),
    }
    println!("  Parallel frames: {}", settings.parallel);
}

fn print_status(state: &AppState) {
    println!("Status:");
    match &state.audio {
        Some((info, _)) => println!(
            "  Audio: {} channel(s), {} Hz, {}",
            info.channels,
            info.sample_rate,
            utils::format_time(info.duration_seconds)
        ),
        None => println!("  Audio: not loaded"),
    }
    match &state.scrambled {
        Some(scrambled) => println!(
            "  Scrambled audio: {} shifted bins",
            scrambled.outcome.shifts.len()
        ),
        None => println!("  Scrambled audio: none"),
    }
    match state.frames.first() {
        Some(first) => println!(
            "  Frames: {} of {}x{} ({} plane(s))",
            state.frames.len(),
            first.width(),
            first.height(),
            first.plane_count()
        ),
        None => println!("  Frames: not loaded"),
    }
    match &state.warped {
        Some(warped) => println!(
            "  Warped frames: {} (max distortion {}, {} steps)",
            warped.frames.len(),
            warped.params.max_distortion,
            warped.params.steps
        ),
        None => println!("  Warped frames: none"),
    }
}

fn set_parameter(settings: &mut Settings, param: &str, value: &str) -> Result<(), ScrambleError> {
    match param {
        "max_shift" => {
            let max_shift = parse_number("max_shift", value)?;
            // Validate through the same path the core uses
            ShiftSource::from_arguments(Some(max_shift), None)?;
            settings.max_shift = max_shift;
        }
        "max_distortion" => {
            let max_distortion = parse_number("max_distortion", value)?;
            settings.params =
                WarpParameters::from_values(&[max_distortion, settings.params.steps as f64])?;
        }
        "steps" => {
            let steps = parse_number("steps", value)?;
            settings.params =
                WarpParameters::from_values(&[settings.params.max_distortion as f64, steps])?;
        }
        "seed" => {
            settings.seed = match value {
                "none" => None,
                _ => Some(value.parse::<u64>().map_err(|_| {
                    ScrambleError::DomainValidation(format!("seed must be an integer or 'none', got '{}'", value))
                })?),
            };
        }
        "parallel" => {
            settings.parallel = match value {
                "on" | "true" | "1" => true,
                "off" | "false" | "0" => false,
                _ => {
                    return Err(ScrambleError::DomainValidation(format!(
                        "parallel must be on or off, got '{}'",
                        value
                    )))
                }
            };
        }
        _ => {
            return Err(ScrambleError::DomainValidation(format!(
                "unknown parameter '{}' (max_shift, max_distortion, steps, seed, parallel)",
                param
            )))
        }
    }
    Ok(())
}

fn scramble_loaded(
    state: &mut AppState,
    source: ShiftSource,
    seed: Option<u64>,
) -> Result<(), ScrambleError> {
    let (info, channels) = state
        .audio
        .as_ref()
        .ok_or_else(|| ScrambleError::DomainValidation("no audio loaded".to_string()))?;
    let mut rng = utils::make_rng(seed);
    let outcome = SpectralPhaseScrambler::new().scramble(channels, &source, &mut rng)?;
    println!("{}", utils::phase_summary(info, &outcome));
    state.scrambled = Some(ScrambledAudio {
        outcome,
        source,
        seed,
    });
    Ok(())
}

/// Warp the loaded frames with fresh fields, or with the fields and
/// parameters of a stored record
fn warp_loaded(state: &mut AppState, stored: Option<WarpRecord>) -> Result<(), ScrambleError> {
    if state.frames.is_empty() {
        return Err(ScrambleError::DomainValidation("no frames loaded".to_string()));
    }
    let warped = match stored {
        Some(record) => {
            let processor = FrameBatchProcessor::new(BatchConfig::new(record.params, state.settings.parallel));
            let frames = processor.warp_sequence_with_fields(&state.frames, &record.fields)?;
            WarpedFrames {
                frames,
                fields: record.fields,
                params: record.params,
                seed: record.seed,
            }
        }
        None => {
            let params = state.settings.params;
            let seed = state.settings.seed;
            let processor = FrameBatchProcessor::new(BatchConfig::new(params, state.settings.parallel));
            let outcome = processor.warp_sequence(&state.frames, &mut utils::make_rng(seed))?;
            WarpedFrames {
                frames: outcome.frames,
                fields: outcome.fields,
                params,
                seed,
            }
        }
    };
    println!("Warped {} frame(s)", warped.frames.len());
    state.warped = Some(warped);
    Ok(())
}

/// Process a user command
fn process_command(command: &str, state: &mut AppState) -> Result<(), ScrambleError> {
    let parts: Vec<&str> = command.split_whitespace().collect();

    if parts.is_empty() {
        return Ok(());
    }

    match parts[0] {
        "load_audio" => {
            check_args(&parts, 1, 1, "load_audio <filename>")?;
            println!("Loading file: {}", parts[1]);
            let (info, channels) = audio_io::read_audio_file(parts[1])?;
            println!(
                "Loaded {} channel(s), {} Hz, {}",
                info.channels,
                info.sample_rate,
                utils::format_time(info.duration_seconds)
            );
            state.audio = Some((info, channels));
            state.scrambled = None;
        }

        "scramble_audio" => {
            check_args(&parts, 0, 1, "scramble_audio [max_shift]")?;
            let max_shift = match parts.get(1) {
                Some(value) => parse_number("max_shift", value)?,
                None => state.settings.max_shift,
            };
            let source = ShiftSource::from_arguments(Some(max_shift), None)?;
            let seed = state.settings.seed;
            scramble_loaded(state, source, seed)?;
        }

        "replay_audio" => {
            check_args(&parts, 1, 1, "replay_audio <record.json>")?;
            let record: PhaseScrambleRecord = load_json(parts[1])?;
            let source = ShiftSource::from_arguments(record.max_shift, Some(record.shifts))?;
            scramble_loaded(state, source, record.seed)?;
        }

        "save_audio" => {
            check_args(&parts, 1, 2, "save_audio <filename> [record.json]")?;
            let (info, _) = state
                .audio
                .as_ref()
                .ok_or_else(|| ScrambleError::DomainValidation("no audio loaded".to_string()))?;
            let scrambled = state.scrambled.as_ref().ok_or_else(|| {
                ScrambleError::DomainValidation("no scrambled audio, run scramble_audio first".to_string())
            })?;
            utils::save_scrambled_audio(
                info,
                &scrambled.outcome,
                &scrambled.source,
                scrambled.seed,
                parts[1],
                parts.get(2),
            )?;
            println!("File saved successfully!");
        }

        "scramble_file" => {
            check_args(&parts, 2, 3, "scramble_file <in> <out> [record.json]")?;
            let source = ShiftSource::from_arguments(Some(state.settings.max_shift), None)?;
            let (info, outcome) = utils::load_and_scramble(parts[1], &source, state.settings.seed)?;
            println!("{}", utils::phase_summary(&info, &outcome));
            utils::save_scrambled_audio(
                &info,
                &outcome,
                &source,
                state.settings.seed,
                parts[2],
                parts.get(3),
            )?;
            println!("File saved successfully!");
        }

        #[cfg(feature = "image")]
        "load_frames" => {
            check_args(&parts, 1, usize::MAX, "load_frames <file> [file...]")?;
            state.frames = image_io::load_frame_sequence(&parts[1..])?;
            state.warped = None;
            if let Some(first) = state.frames.first() {
                println!(
                    "Loaded {} frame(s) of {}x{}",
                    state.frames.len(),
                    first.width(),
                    first.height()
                );
            }
        }

        #[cfg(feature = "image")]
        "save_frames" => {
            check_args(&parts, 1, 2, "save_frames <dir> [prefix]")?;
            let warped = state.warped.as_ref().ok_or_else(|| {
                ScrambleError::DomainValidation("no warped frames, run warp first".to_string())
            })?;
            let prefix = parts.get(2).copied().unwrap_or("warped");
            let written = image_io::save_frame_sequence(&warped.frames, parts[1], prefix)?;
            println!("Saved {} frame(s)", written.len());
        }

        "warp" => {
            check_args(&parts, 0, 2, "warp [max_distortion steps]")?;
            if parts.len() > 1 {
                let values = parts[1..]
                    .iter()
                    .map(|v| parse_number("warp parameter", v))
                    .collect::<Result<Vec<_>, _>>()?;
                state.settings.params = WarpParameters::from_values(&values)?;
            }
            warp_loaded(state, None)?;
        }

        "replay_warp" => {
            check_args(&parts, 1, 1, "replay_warp <record.json>")?;
            let record: WarpRecord = load_json(parts[1])?;
            warp_loaded(state, Some(record))?;
        }

        "save_fields" => {
            check_args(&parts, 1, 1, "save_fields <record.json>")?;
            let warped = state.warped.as_ref().ok_or_else(|| {
                ScrambleError::DomainValidation("no warp to save, run warp first".to_string())
            })?;
            save_json(&warped.record(), parts[1])?;
            println!("Fields saved to {}", parts[1]);
        }

        "set" => {
            check_args(&parts, 2, 2, "set <parameter> <value>")?;
            set_parameter(&mut state.settings, parts[1], parts[2])?;
            println!("{} set to {}", parts[1], parts[2]);
        }

        "config" => print_config(&state.settings),

        "presets" => {
            println!("Available warp presets:");
            for preset in presets::list_presets() {
                println!("  {}: {:<10} {}", preset.id, preset.name, preset.description);
            }
        }

        "preset" => {
            check_args(&parts, 1, 1, "preset <id|name>")?;
            let preset = presets::find(parts[1]).ok_or_else(|| {
                ScrambleError::DomainValidation(format!("unknown preset '{}'", parts[1]))
            })?;
            state.settings.params = preset.params;
            println!("Loaded preset: {}", preset.name);
        }

        "status" => print_status(state),

        "help" => print_help(),

        _ => {
            println!("Unknown command: {}", parts[0]);
            println!("Type 'help' for available commands");
        }
    }

    Ok(())
}

fn main() {
    // Parse command line arguments
    let matches = Command::new("Stimulus Scrambler")
        .version(stimscramble_lib::VERSION)
        .about("Phase-scrambled audio and diffeomorphically warped frames for psychophysics")
        .arg(
            Arg::new("audio")
                .long("audio")
                .short('a')
                .help("Audio file to load on startup")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .short('s')
                .help("Seed for reproducible fields and shifts")
                .value_name("SEED"),
        )
        .arg(
            Arg::new("max-shift")
                .long("max-shift")
                .help("Maximum phase shift in radians")
                .value_name("RADIANS"),
        )
        .arg(
            Arg::new("max-distortion")
                .long("max-distortion")
                .short('d')
                .help("Maximum warp distortion in canvas pixels")
                .value_name("PIXELS"),
        )
        .arg(
            Arg::new("steps")
                .long("steps")
                .help("Resampling steps per warp quadrant")
                .value_name("STEPS"),
        )
        .arg(
            Arg::new("sequential")
                .long("sequential")
                .help("Warp frames one after another instead of in parallel")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    println!("Stimulus Scrambler v{}", stimscramble_lib::VERSION);
    println!("Type 'help' for available commands\n");

    // Initialize the library
    stimscramble_lib::init();

    let mut settings = Settings::default();
    for (flag, param) in [
        ("seed", "seed"),
        ("max-shift", "max_shift"),
        ("max-distortion", "max_distortion"),
        ("steps", "steps"),
    ] {
        if let Some(value) = matches.get_one::<String>(flag) {
            match set_parameter(&mut settings, param, value) {
                Ok(()) => println!("Set {} to {}", param, value),
                Err(e) => eprintln!("Invalid --{}: {}", flag, e),
            }
        }
    }
    if matches.get_flag("sequential") {
        settings.parallel = false;
    }

    let mut state = AppState::new(settings);

    // Load file from command line if provided
    if let Some(filename) = matches.get_one::<String>("audio") {
        if let Err(e) = process_command(&format!("load_audio {}", filename), &mut state) {
            eprintln!("Error loading file: {}", e);
        }
    }

    // Setup readline
    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Failed to create readline: {}", e);
            std::process::exit(1);
        }
    };

    // Main command loop
    loop {
        let readline = rl.readline("scramble> ");
        match readline {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(trimmed).ok();
                if trimmed == "quit" || trimmed == "exit" {
                    break;
                }
                log::debug!("Command: {}", trimmed);
                if let Err(e) = process_command(trimmed, &mut state) {
                    log::debug!("Command failed: {:?}", e);
                    println!("Error: {}", e);
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    println!("Goodbye!");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_args() {
        let parts = ["warp", "10"];
        assert!(matches!(
            check_args(&parts, 0, 0, "warp"),
            Err(ScrambleError::ArgumentCount { got: 1, .. })
        ));
        assert!(check_args(&parts, 0, 2, "warp [a b]").is_ok());
    }

    #[test]
    fn test_set_parameter() {
        let mut settings = Settings::default();
        set_parameter(&mut settings, "steps", "5").unwrap();
        set_parameter(&mut settings, "max_distortion", "30").unwrap();
        set_parameter(&mut settings, "seed", "99").unwrap();
        set_parameter(&mut settings, "parallel", "off").unwrap();
        assert_eq!(settings.params, WarpParameters::new(30, 5).unwrap());
        assert_eq!(settings.seed, Some(99));
        assert!(!settings.parallel);

        assert!(set_parameter(&mut settings, "steps", "0").is_err());
        assert!(set_parameter(&mut settings, "steps", "2.5").is_err());
        assert!(set_parameter(&mut settings, "max_shift", "-1").is_err());
        assert!(set_parameter(&mut settings, "max_shift", "abc").is_err());
        assert!(set_parameter(&mut settings, "colour", "red").is_err());
        assert_eq!(settings.params.steps, 5);
    }

    #[test]
    fn test_commands_without_data() {
        let mut state = AppState::new(Settings::default());
        assert!(process_command("scramble_audio", &mut state).is_err());
        assert!(process_command("warp", &mut state).is_err());
        assert!(matches!(
            process_command("warp 10", &mut state),
            Err(ScrambleError::ShapeMismatch(_))
        ));
        assert!(process_command("preset strong", &mut state).is_ok());
        assert_eq!(state.settings.params, presets::strong());
    }

    #[test]
    fn test_warp_command_on_frames() {
        let mut state = AppState::new(Settings {
            seed: Some(5),
            ..Settings::default()
        });
        state.frames = vec![Frame::filled(6, 4, 1, 128.0).unwrap(); 2];
        process_command("warp 4 2", &mut state).unwrap();
        let warped = state.warped.as_ref().unwrap();
        let (frames, fields) = (&warped.frames, &warped.fields);
        assert_eq!(frames.len(), 2);
        assert_eq!((fields.width(), fields.height()), (12, 8));
        // A flat frame stays flat whatever the warp
        assert!(frames[0].plane(0).iter().all(|&v| (v - 128.0).abs() < 1e-9));
    }

    fn gradient_frames(count: usize) -> Vec<Frame> {
        (0..count)
            .map(|n| {
                let plane = (0..48).map(|i| ((i * 5 + n * 17) % 255) as f64).collect();
                Frame::new(8, 6, vec![plane]).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_saved_fields_keep_warp_settings() {
        let path = std::env::temp_dir().join(format!("stimscramble_cli_fields_{}.json", std::process::id()));
        let mut state = AppState::new(Settings {
            seed: Some(17),
            ..Settings::default()
        });
        state.frames = gradient_frames(2);

        process_command("warp 8 4", &mut state).unwrap();
        let warped_frames = state.warped.as_ref().unwrap().frames.clone();

        // Settings changed after the warp must not leak into the record
        process_command("preset mild", &mut state).unwrap();
        process_command("set seed 99", &mut state).unwrap();
        process_command(&format!("save_fields {}", path.display()), &mut state).unwrap();

        let record: WarpRecord = load_json(&path).unwrap();
        assert_eq!(record.params, WarpParameters::new(8, 4).unwrap());
        assert_eq!(record.seed, Some(17));
        assert_eq!((record.frame_width, record.frame_height), (8, 6));

        process_command(&format!("replay_warp {}", path.display()), &mut state).unwrap();
        std::fs::remove_file(&path).ok();

        let replayed = state.warped.as_ref().unwrap();
        assert_eq!(replayed.params, WarpParameters::new(8, 4).unwrap());
        assert_eq!(replayed.frames, warped_frames);
        // Replaying leaves the shell settings alone
        assert_eq!(state.settings.params, presets::mild());
    }

    #[test]
    fn test_saved_audio_record_keeps_scramble_seed() {
        let dir = std::env::temp_dir();
        let wav = dir.join(format!("stimscramble_cli_audio_{}.wav", std::process::id()));
        let json = dir.join(format!("stimscramble_cli_shifts_{}.json", std::process::id()));

        let mut state = AppState::new(Settings {
            seed: Some(5),
            ..Settings::default()
        });
        let samples: Vec<f64> = (0..64).map(|i| (i as f64 * 0.3).sin()).collect();
        state.audio = Some((AudioInfo::new(8000, 1, samples.len()), vec![samples]));

        process_command("scramble_audio 1.5", &mut state).unwrap();
        process_command("set seed 9", &mut state).unwrap();
        process_command(
            &format!("save_audio {} {}", wav.display(), json.display()),
            &mut state,
        )
        .unwrap();

        let record: PhaseScrambleRecord = load_json(&json).unwrap();
        std::fs::remove_file(&wav).ok();
        std::fs::remove_file(&json).ok();

        assert_eq!(record.seed, Some(5));
        assert_eq!(record.max_shift, Some(1.5));
        assert_eq!(record.shifts, state.scrambled.as_ref().unwrap().outcome.shifts);
    }
}
