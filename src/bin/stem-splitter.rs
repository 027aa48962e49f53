use clap::{Parser, Subcommand};
use spectral_stem_splitter::{
    model::onnx::{model_path, OnnxSeparator},
    set_split_progress_callback, ModelLoader, Separator, SeparationConfig, SplitOptions,
    SplitProgress, StemCount, StemSplitter,
};
use std::{path::PathBuf, process};

#[derive(Parser)]
#[command(name = "stem-splitter")]
#[command(about = "Spectral-mask audio stem separation tool", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a stereo audio file into stems
    Split {
        #[arg(short, long)]
        input: String,

        #[arg(short, long, default_value = ".")]
        output: String,

        /// 2, 4 or 5
        #[arg(short, long, default_value_t = 2)]
        stems: u8,

        /// Directory holding spleeter_<n>stems.onnx
        #[arg(short, long, default_value = "models")]
        model_dir: PathBuf,

        #[arg(short, long)]
        quiet: bool,
    },

    /// List stem layouts
    List,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Split {
            input,
            output,
            stems,
            model_dir,
            quiet,
        } => handle_split(input, output, stems, model_dir, quiet),
        Commands::List => handle_list(),
    };

    match result {
        Ok(()) => process::exit(0),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn handle_split(
    input: String,
    output: String,
    stems: u8,
    model_dir: PathBuf,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !std::path::Path::new(&input).exists() {
        return Err(format!("Input file not found: {}", input).into());
    }
    let stems = StemCount::try_from(stems)?;

    if !quiet {
        setup_progress_callback();
        eprintln!("🎵 Stem Splitter");
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("Input:  {}", input);
        eprintln!("Output: {}", output);
        eprintln!("Stems:  {} ({})", stems, stems.labels().join(", "));
        eprintln!("Models: {}", model_dir.display());
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!();
    }

    let loader: ModelLoader = Box::new(move |n: StemCount| -> anyhow::Result<Box<dyn Separator>> {
        let sep = OnnxSeparator::load(&model_path(&model_dir, n), n)?;
        Ok(Box::new(sep) as Box<dyn Separator>)
    });

    let opts = SplitOptions {
        output_dir: output,
        stems,
        config: SeparationConfig::default(),
    };

    let mut splitter = StemSplitter::new(loader, opts.config.clone());
    let result = splitter.split_file(&input, &opts)?;

    if !quiet {
        eprintln!();
        eprintln!("✅ Split completed successfully!");
        eprintln!();
        eprintln!("Output files:");
        for (label, path) in &result.stems {
            eprintln!("  {:<14} {}", format!("{label}:"), path);
        }
    } else {
        // Quiet mode: just print paths
        for (_, path) in &result.stems {
            println!("{}", path);
        }
    }

    Ok(())
}

fn handle_list() -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📋 Stem layouts");
    eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for stems in [StemCount::Two, StemCount::Four, StemCount::Five] {
        let marker = if stems == StemCount::Two { " (default)" } else { "" };
        eprintln!("  • {}: {}{}", stems, stems.labels().join(", "), marker);
    }
    eprintln!();
    eprintln!("Use --stems <n> to pick a layout");

    Ok(())
}

fn setup_progress_callback() {
    set_split_progress_callback(|progress| match progress {
        SplitProgress::Stage(stage) => {
            let stage_name = match stage {
                "engine_preload" => "Loading model",
                "read_audio" => "Reading audio file",
                "infer" => "Processing audio",
                "reconstruct" => "Reconstructing stems",
                "write_stems" => "Writing stems",
                _ => stage,
            };
            eprintln!("⏳ {}", stage_name);
        }
        SplitProgress::Patches {
            done,
            total,
            percent,
        } => {
            eprint!("\r🔄 Processing: {}/{} patches ({:.0}%)", done, total, percent);
            if done >= total {
                eprintln!();
            }
        }
        SplitProgress::Finished => {
            // Summary is printed by handle_split
        }
    });
}
