use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use tts_reader::book::export::export_chapters;

/// Extract an EPUB into clean chapter text files.
#[derive(Parser)]
#[command(name = "epub_to_txt")]
struct Cli {
    /// Path to the .epub file
    epub_path: PathBuf,

    /// Output directory for chapter txt files
    #[arg(long, default_value = "sample/epub_out")]
    out_dir: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tts_reader::logging::init(None)?;
    let cli = Cli::parse();

    let start = Instant::now();
    let count = export_chapters(&cli.epub_path, &cli.out_dir)?;
    println!(
        "Wrote {} chapter file(s) to: {} in {:.2?}",
        count,
        cli.out_dir.display(),
        start.elapsed()
    );
    Ok(())
}
