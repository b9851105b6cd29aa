use clap::Parser;
use pokey2midi::compiler::{ConvertOptions, TimbreChangePolicy};
use pokey2midi::pokey::VideoStandard;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pokey2midi")]
#[command(version)]
#[command(about = "POKEY register dump to MIDI converter", long_about = None)]
struct Args {
    /// Input register dump (plain text or gzip)
    input: PathBuf,

    /// Output MIDI file (default: input with a .mid extension)
    output: Option<PathBuf>,

    /// Retrigger notes on every register change
    #[arg(long)]
    all: bool,

    /// Keep the silence before the first note
    #[arg(long)]
    no_trim: bool,

    /// Put all distortion selectors of a channel on one track
    #[arg(long)]
    no_split: bool,

    /// Retrigger on every volume rise instead of merging decays
    #[arg(long)]
    no_merge: bool,

    /// Use channel volume instead of note velocity
    #[arg(long)]
    use_vol: bool,

    /// Emit program changes per distortion selector
    #[arg(long)]
    use_inst: bool,

    /// Programs for selectors 0-7, comma separated
    #[arg(long, value_delimiter = ',')]
    instruments: Option<Vec<u8>>,

    /// Loudness multiplier
    #[arg(long)]
    boost: Option<f64>,

    /// Known tempo of the music, in BPM
    #[arg(long)]
    bpm: Option<f64>,

    /// Ticks per quarter note (rounded to a multiple of 24)
    #[arg(long)]
    timebase: Option<u32>,

    /// Assume PAL clocks
    #[arg(long, conflicts_with = "ntsc")]
    pal: bool,

    /// Assume NTSC clocks
    #[arg(long)]
    ntsc: bool,

    /// Give noise channels a pseudo-pitch
    #[arg(long)]
    debug_noise: bool,

    /// Start a new note when only the distortion changes
    #[arg(long)]
    retrigger_timbre: bool,

    /// Estimate the tempo from low notes
    #[arg(long)]
    guess_tempo: bool,

    /// JSON file with conversion options
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the compiled song as JSON
    #[arg(long)]
    dump_song: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    /// Layer command-line flags over the base options
    fn apply(&self, options: &mut ConvertOptions) -> Result<(), pokey2midi::Error> {
        if self.all {
            options.always_retrigger = true;
        }
        if self.no_trim {
            options.trim_silence = false;
        }
        if self.no_split {
            options.split_timbre = false;
        }
        if self.no_merge {
            options.merge_decays = false;
        }
        if self.use_vol {
            options.channel_volume = true;
        }
        if self.use_inst {
            options.use_instruments = true;
        }
        if let Some(programs) = &self.instruments {
            options.instruments = programs.as_slice().try_into().map_err(|_| {
                pokey2midi::Error::Config(format!("expected 8 instruments, got {}", programs.len()))
            })?;
        }
        if let Some(boost) = self.boost {
            options.boost = boost;
        }
        if self.bpm.is_some() {
            options.force_tempo = self.bpm;
        }
        if self.timebase.is_some() {
            options.force_timebase = self.timebase;
        }
        if self.pal {
            options.standard = Some(VideoStandard::Pal);
        }
        if self.ntsc {
            options.standard = Some(VideoStandard::Ntsc);
        }
        if self.debug_noise {
            options.debug_noise = true;
        }
        if self.retrigger_timbre {
            options.timbre_change = TimbreChangePolicy::Retrigger;
        }
        if self.guess_tempo {
            options.guess_tempo = true;
        }
        Ok(())
    }
}

fn main() -> Result<(), pokey2midi::Error> {
    let args = Args::parse();

    let level = if args.verbose {
        log::LevelFilter::Debug
    } else if args.quiet {
        log::LevelFilter::Warn
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();

    let mut options = match &args.config {
        Some(path) => ConvertOptions::from_json_file(path)?,
        None => ConvertOptions::default(),
    };
    args.apply(&mut options)?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension("mid"));

    let compiler = pokey2midi::Compiler::with_options(options);
    let conversion = compiler.convert_file(&args.input, &output)?;

    if let Some(path) = &args.dump_song {
        log::info!("Writing compiled song to \"{}\"", path.display());
        let json = serde_json::to_string_pretty(&conversion.song)?;
        std::fs::write(path, json)?;
    }

    log::debug!("{}", serde_json::to_string(&conversion.report)?);
    Ok(())
}
