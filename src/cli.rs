//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use music_get::config::{CONFIG_FILE_NAME, DEFAULT_CONCURRENCY, DEFAULT_DOWNLOAD_DIR};

/// Download songs, artists, albums and playlists from music platforms.
///
/// Supported sites: music.163.com, y.qq.com, music.migu.cn, www.kugou.com,
/// www.kuwo.cn.
#[derive(Parser, Debug)]
#[command(name = "music-get")]
#[command(author, version, about)]
pub struct Args {
    /// Song, artist, album or playlist URL
    pub url: String,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Overwrite files that already exist
    #[arg(short, long)]
    pub force: bool,

    /// Maximum concurrent downloads (1-16)
    #[arg(short = 'n', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=16))]
    pub concurrency: u8,

    /// Preferred bitrate in kbps (128, 192 or 320; anything else means highest)
    #[arg(short, long)]
    pub bitrate: Option<u32>,

    /// Download directory
    #[arg(short, long, default_value = DEFAULT_DOWNLOAD_DIR)]
    pub output: PathBuf,

    /// Configuration file holding session cookies and the bitrate preference
    #[arg(long, default_value = CONFIG_FILE_NAME)]
    pub config: PathBuf,
}
