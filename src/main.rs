mod args;

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use media_kit::Result;
use media_kit::assembler::{AssemblyConfig, assemble_video};
use media_kit::asset_collector::{AssetOrder, collect_assets};
use media_kit::frame_sampler::extract_frames;
use media_kit::media::FfmpegBackend;
use media_kit::qr_generation::{QrOptions, create_qrcode_file, parse_color};
use media_kit::toolbox::{self, ToolRunner};

use crate::args::{AssembleArgs, Cli, Commands, ExtractArgs, QrArgs, ToolCommand, ToolsArgs};

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn run_qr(args: QrArgs) -> Result<()> {
    let options = QrOptions {
        data: args.url,
        color: parse_color(&args.color)?,
        module_size: args.size,
        style: args.style,
        version: args.qr_version,
        error_correction: args.error_correction,
    };
    create_qrcode_file(&options, args.output.as_deref(), args.verify)?;
    Ok(())
}

fn run_assemble(args: AssembleArgs) -> Result<()> {
    let config = AssemblyConfig {
        fps: args.fps,
        image_seconds: args.image_seconds,
        loop_count: args.loops,
        clip_pacing: args.clip_pacing,
    };
    config.validate()?;
    let order = if args.randomise {
        AssetOrder::Shuffled { seed: args.seed }
    } else {
        AssetOrder::Natural
    };

    let assets = collect_assets(&args.images, Some(&args.clips), order)?;
    let backend = FfmpegBackend::new(&args.encoder_opts)?;
    let report = assemble_video(&assets, &config, &backend, &args.output)?;

    for skipped in &report.skipped {
        log::warn!("Not included: {} ({})", skipped.path.display(), skipped.reason);
    }
    log::info!(
        "{} frames from {} images and {} clips",
        report.frames_written,
        report.images_written,
        report.clips_written
    );
    Ok(())
}

fn run_extract(args: ExtractArgs) -> Result<()> {
    log::info!("Video path={}", args.video_path.display());
    log::info!("Output folder={}", args.output_folder.display());
    let backend = FfmpegBackend::new("")?;
    extract_frames(&backend, &args.video_path, &args.output_folder, args.interval)?;
    Ok(())
}

fn run_tools(args: ToolsArgs) -> Result<()> {
    let runner = ToolRunner::new(Duration::from_secs(args.timeout));
    match args.command {
        ToolCommand::Convert {
            input,
            format,
            output_dir,
        } => {
            let output = toolbox::convert_video(&runner, &input, &format, &output_dir)?;
            log::info!("Converted video saved as {}", output.display());
        }
        ToolCommand::Audio { input, output_dir } => {
            let output = toolbox::extract_audio(&runner, &input, &output_dir)?;
            log::info!("Audio saved as {}", output.display());
        }
        ToolCommand::Frames { input, output_dir } => {
            toolbox::extract_all_frames(&runner, &input, &output_dir)?;
            log::info!("Frames saved in {}", output_dir.display());
        }
        ToolCommand::Previews {
            input,
            output_dir,
            count,
        } => {
            let previews = toolbox::create_previews(&runner, &input, &output_dir, count)?;
            log::info!("{} of {} previews created", previews.len(), count);
        }
        ToolCommand::Formats { url } => {
            print!("{}", toolbox::list_formats(&runner, &url)?);
        }
        ToolCommand::Download {
            url,
            format,
            output_dir,
        } => {
            let stdout = toolbox::download_video(&runner, &url, format.as_deref(), &output_dir)?;
            log::debug!("{}", stdout.trim());
            log::info!("Download complete, saved in {}", output_dir.display());
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Qr(args) => run_qr(args),
        Commands::Assemble(args) => run_assemble(args),
        Commands::Extract(args) => run_extract(args),
        Commands::Tools(args) => run_tools(args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
