use std::error::Error;
use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use env_logger::Env;

use tubeload::downloader::utils::format_duration;
use tubeload::{
    default_download_dir, ProgressEvent, VideoDownloader, YtDlpEngine, DEFAULT_AUDIO_QUALITY_KBPS,
};

/// Download YouTube videos and audio via yt-dlp.
#[derive(Parser, Debug)]
#[command(name = "tubeload", version, about)]
struct Cli {
    /// Video URL
    url: String,

    /// Output directory (defaults to $DEFAULT_DOWNLOAD_PATH or ./downloads)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// List available formats and exit
    #[arg(short, long)]
    list: bool,

    /// Index of the format to download, as shown by --list
    #[arg(short, long, default_value_t = 0)]
    format_index: usize,

    /// Extract audio as mp3 instead of downloading video
    #[arg(short, long)]
    audio: bool,

    /// Audio bitrate in kbps (with --audio)
    #[arg(short, long, default_value_t = DEFAULT_AUDIO_QUALITY_KBPS)]
    bitrate: u32,

    /// Output filename without extension (defaults to the video title)
    #[arg(short = 'n', long)]
    filename: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let output_dir = match cli.output_dir {
        Some(dir) => dir,
        None => default_download_dir()?,
    };

    let mut downloader = VideoDownloader::new(YtDlpEngine::new());
    downloader.set_observer(Box::new(print_progress));

    let session = downloader.fetch_video_info(&cli.url).await?;
    println!("{}", session.title);
    println!(
        "{} | {}",
        session.channel,
        format_duration(session.duration_secs)
    );

    if cli.list {
        if session.offerings.is_empty() {
            println!("No downloadable video formats found.");
        }
        for offering in &session.offerings {
            println!("  [{}] {}", offering.index, offering.label);
        }
        return Ok(());
    }

    let filename = cli.filename.as_deref();
    let path = if cli.audio {
        downloader
            .download_audio(&session, &output_dir, filename, cli.bitrate)
            .await?
    } else {
        downloader
            .download_video(&session, cli.format_index, &output_dir, filename)
            .await?
    };

    println!("Saved to {}", path.display());
    Ok(())
}

fn print_progress(event: ProgressEvent) {
    match event {
        ProgressEvent::Downloading {
            percent,
            speed,
            eta,
            filename,
            ..
        } => {
            print!("\r{} {} ETA {} {}        ", percent, speed, eta, filename);
            let _ = std::io::stdout().flush();
        }
        ProgressEvent::Processing { message } => println!("\n{}", message),
        ProgressEvent::Complete { message } => println!("{}", message),
        ProgressEvent::Error { message } => eprintln!("\n{}", message),
    }
}
