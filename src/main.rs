use clap::{
    ArgAction, CommandFactory, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use clap_complete::{Shell, generate};
use tracing_subscriber::EnvFilter;

use dashtune::{
    cli::{self, SavedKind, Transport},
    config::{self, Config},
    error,
    types::SearchKind,
};

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::White.on_default() | Effects::BOLD)
        .usage(AnsiColor::White.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightBlue.on_default())
        .placeholder(AnsiColor::BrightGreen.on_default())
}

#[derive(Parser, Debug, Clone)]
#[clap(
  version = env!("CARGO_PKG_VERSION"),
  name=env!("CARGO_PKG_NAME"),
  bin_name=env!("CARGO_PKG_NAME"),
  author=env!("CARGO_PKG_AUTHORS"),
  about=env!("CARGO_PKG_DESCRIPTION"),
  styles=styles(),
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Log in to Spotify in the browser
    Auth,

    /// Forget the stored Spotify session
    Logout,

    /// Show login state and account
    Status,

    /// List your playlists
    Playlists(PageOptions),

    /// List the tracks of a playlist
    Tracks(TracksOptions),

    /// Search the catalog
    Search(SearchOptions),

    /// List saved tracks or albums
    Saved(SavedOptions),

    /// Show what is playing
    Now,

    /// Play a track, album, playlist or artist URI, or resume without one
    Play(PlayOptions),

    /// Pause playback
    Pause,

    /// Resume playback
    Resume,

    /// Toggle between playing and paused
    Toggle,

    /// Skip to the next track
    Next,

    /// Go back to the previous track
    Previous,

    /// Seek within the current track
    Seek(SeekOptions),

    /// Set the volume
    Volume(VolumeOptions),

    /// Follow playback until Ctrl-C
    Watch,

    /// Get shell completions
    Completions(CompletionsOption),
}

#[derive(Parser, Debug, Clone)]
pub struct PageOptions {
    /// Page size (1-50)
    #[clap(long, default_value_t = 20)]
    pub limit: u32,

    #[clap(long, default_value_t = 0)]
    pub offset: u32,
}

#[derive(Parser, Debug, Clone)]
pub struct TracksOptions {
    /// Playlist id
    pub playlist_id: String,

    #[clap(flatten)]
    pub page: PageOptions,
}

#[derive(Parser, Debug, Clone)]
pub struct SearchOptions {
    pub query: String,

    /// Result type(s) to include; can be repeated
    #[clap(long = "type", value_enum, action = ArgAction::Append, num_args = 1)]
    pub kinds: Vec<SearchKind>,

    #[clap(long, default_value_t = 10)]
    pub limit: u32,
}

#[derive(Parser, Debug, Clone)]
pub struct SavedOptions {
    #[clap(value_enum)]
    pub kind: SavedKind,

    #[clap(flatten)]
    pub page: PageOptions,
}

#[derive(Parser, Debug, Clone)]
pub struct PlayOptions {
    /// Spotify URI, e.g. spotify:album:4aawyAB9vmqN3uQ7FjRGTy
    pub uri: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct SeekOptions {
    /// Position in seconds
    pub seconds: u64,
}

#[derive(Parser, Debug, Clone)]
pub struct VolumeOptions {
    /// Volume in percent
    #[clap(value_parser = clap::value_parser!(u8).range(0..=100))]
    pub percent: u8,
}

#[derive(Parser, Debug, Clone)]
pub struct CompletionsOption {
    shell: Shell,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("DASHTUNE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = config::load_env().await {
        error!("Cannot load environment. Err: {}", e);
    }

    let cli = Cli::parse();

    if let Command::Completions(opt) = &cli.command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(opt.shell, &mut cmd, name, &mut std::io::stdout());
        return;
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => error!("{}. See {}", e, config::env_path().display()),
    };
    let auth = cli::auth_flow(config);

    match cli.command {
        Command::Auth => cli::auth(auth).await,
        Command::Logout => cli::logout(auth).await,
        Command::Status => cli::status(auth).await,
        Command::Playlists(page) => cli::playlists(auth, page.limit, page.offset).await,
        Command::Tracks(opt) => {
            cli::tracks(auth, opt.playlist_id, opt.page.limit, opt.page.offset).await
        }
        Command::Search(opt) => cli::search(auth, opt.query, opt.kinds, opt.limit).await,
        Command::Saved(opt) => cli::saved(auth, opt.kind, opt.page.limit, opt.page.offset).await,
        Command::Now => cli::now(auth).await,
        Command::Play(opt) => cli::play(auth, opt.uri).await,
        Command::Pause => cli::transport(auth, Transport::Pause).await,
        Command::Resume => cli::transport(auth, Transport::Resume).await,
        Command::Toggle => cli::transport(auth, Transport::Toggle).await,
        Command::Next => cli::transport(auth, Transport::Next).await,
        Command::Previous => cli::transport(auth, Transport::Previous).await,
        Command::Seek(opt) => {
            cli::transport(auth, Transport::Seek(opt.seconds.saturating_mul(1000))).await
        }
        Command::Volume(opt) => cli::transport(auth, Transport::Volume(opt.percent)).await,
        Command::Watch => cli::watch(auth).await,
        Command::Completions(_) => {}
    }
}
