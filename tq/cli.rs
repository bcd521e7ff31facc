mod display;
mod error;
mod preferences;
mod scores;
mod storage;

use clap::{Parser, Subcommand};
use display::{render_scores, render_status, StatusReport};
use error::App;
use preferences::{Preferences, PREFERENCES_FILE};
use scores::{Scoreboard, SortBy};
use std::path::PathBuf;
use std::time::Duration;
use storage::ScoreStore;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::{fs, process::Command};
use zbus::{fdo, proxy, Connection};

type StdResult<T> = std::result::Result<T, App>;

const NOT_RUNNING: &str = "tunequiz is not running, start it with `tq start`";
const EMPTY_URL: &str = "Please enter a YouTube URL";
const FOLLOW_INTERVAL: Duration = Duration::from_millis(250);

#[proxy(
    interface = "org.tunequiz.Player",
    default_service = "org.tunequiz.Player",
    default_path = "/org/tunequiz/Player"
)]
trait QuizPlayer {
    async fn test_connection(&self) -> zbus::Result<()>;
    async fn load(&self, url: &str) -> zbus::Result<()>;
    async fn play(&self) -> zbus::Result<()>;
    async fn pause(&self) -> zbus::Result<()>;
    async fn toggle(&self) -> zbus::Result<bool>;
    async fn set_volume(&self, percent: f64) -> zbus::Result<()>;
    async fn begin_seek(&self) -> zbus::Result<()>;
    async fn seek_change(&self, percent: f64) -> zbus::Result<()>;
    async fn end_seek(&self) -> zbus::Result<()>;
    async fn toggle_title(&self) -> zbus::Result<bool>;
    async fn status(&self) -> zbus::Result<String>;
    async fn stop(&self) -> zbus::Result<()>;
}

#[derive(Parser)]
#[command(
    name = "tq",
    about = "Keep score and play the mystery tune.",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Add a player with score 0")]
    Add(AddCommand),

    #[command(about = "Remove a player")]
    Remove(PlayerRef),

    #[command(about = "Give a player one point")]
    Plus(PlayerRef),

    #[command(about = "Take one point from a player")]
    Minus(PlayerRef),

    #[command(about = "Change a player's score by an amount")]
    Adjust(AdjustCommand),

    #[command(about = "Show the score table")]
    Scores(ScoresCommand),

    #[command(about = "Select the sort key, or toggle it when none is given")]
    Sort(SortCommand),

    #[command(about = "Set every score back to 0")]
    ResetScores(ConfirmArgs),

    #[command(about = "Remove all players")]
    ResetAll(ConfirmArgs),

    #[command(about = "Start the tunequiz audio player")]
    Start,

    #[command(about = "Stop the tunequiz audio player")]
    Stop,

    #[command(about = "Load a YouTube URL")]
    Load(LoadCommand),

    #[command(about = "Resume playback")]
    Play,

    #[command(about = "Pause playback")]
    Pause,

    #[command(about = "Switch between play and pause")]
    Toggle,

    #[command(about = "Jump to a position, in percent of the track")]
    Seek(PercentArg),

    #[command(about = "Set the volume, in percent")]
    Volume(PercentArg),

    #[command(about = "Reveal or hide the track title")]
    Title,

    #[command(about = "Show the player status")]
    Status(StatusCommand),
}

#[derive(Parser)]
struct AddCommand {
    #[arg(required = true, num_args = 1.., help = "Player name")]
    name: Vec<String>,
}

#[derive(Parser)]
struct PlayerRef {
    #[arg(help = "Player id, name, or row number in the score table")]
    player: String,
}

#[derive(Parser)]
struct AdjustCommand {
    #[arg(help = "Player id, name, or row number in the score table")]
    player: String,
    #[arg(allow_negative_numbers = true, help = "Points to add, negative to subtract")]
    delta: i32,
}

#[derive(Parser)]
struct ScoresCommand {
    #[arg(short = 's', long = "sort", value_enum, help = "Sort key for this listing only")]
    sort: Option<SortBy>,
}

#[derive(Parser)]
struct SortCommand {
    #[arg(value_enum)]
    key: Option<SortBy>,
}

#[derive(Parser)]
struct ConfirmArgs {
    #[arg(short = 'y', long = "yes", help = "Skip the confirmation prompt")]
    yes: bool,
}

#[derive(Parser)]
struct LoadCommand {
    #[arg(default_value = "", help = "YouTube URL")]
    url: String,
}

#[derive(Parser)]
struct PercentArg {
    #[arg(allow_negative_numbers = true)]
    percent: f64,
}

#[derive(Parser)]
struct StatusCommand {
    #[arg(short = 'f', long = "follow", help = "Keep refreshing until Ctrl-C")]
    follow: bool,
}

struct Paths {
    data_dir: PathBuf,
    preferences: PathBuf,
}

#[tokio::main]
async fn main() -> StdResult<()> {
    let cli = Cli::parse();
    let paths = initialize_directories().await?;
    match cli.command {
        Commands::Add(cmd) => add_player(&paths, &cmd.name.join(" ")).await,
        Commands::Remove(cmd) => remove_player(&paths, &cmd.player).await,
        Commands::Plus(cmd) => adjust_score(&paths, &cmd.player, 1).await,
        Commands::Minus(cmd) => adjust_score(&paths, &cmd.player, -1).await,
        Commands::Adjust(cmd) => adjust_score(&paths, &cmd.player, cmd.delta).await,
        Commands::Scores(cmd) => show_scores(&paths, cmd.sort).await,
        Commands::Sort(cmd) => select_sort(&paths, cmd.key).await,
        Commands::ResetScores(cmd) => reset(&paths, Reset::Scores, cmd.yes).await,
        Commands::ResetAll(cmd) => reset(&paths, Reset::All, cmd.yes).await,
        command => {
            let connection = Connection::session().await?;
            let proxy = QuizPlayerProxy::new(&connection).await?;
            handle_player_command(command, &proxy).await
        }
    }
}

async fn initialize_directories() -> StdResult<Paths> {
    let home_dir = std::env::var("HOME")?;
    let base_dir = PathBuf::from(format!("{home_dir}/.config/tunequiz"));
    let data_dir = base_dir.join("data");
    fs::create_dir_all(&data_dir).await?;
    Ok(Paths {
        data_dir,
        preferences: base_dir.join(PREFERENCES_FILE),
    })
}

async fn load_board(paths: &Paths) -> StdResult<(ScoreStore, Scoreboard)> {
    let store = ScoreStore::new(&paths.data_dir);
    let board = store.load().await?;
    Ok((store, board))
}

async fn current_sort(paths: &Paths) -> StdResult<SortBy> {
    Ok(Preferences::load(&paths.preferences).await?.sort_by)
}

async fn add_player(paths: &Paths, name: &str) -> StdResult<()> {
    let (store, mut board) = load_board(paths).await?;
    let trimmed = name.trim();
    if board
        .players()
        .iter()
        .any(|player| player.name.eq_ignore_ascii_case(trimmed))
    {
        eprintln!("Note: a player called {trimmed:?} already exists, use the id to tell them apart");
    }
    if let Some(player) = board.add(name) {
        println!("Added {} ({})", player.name, player.id);
        store.save(&board).await?;
    }
    Ok(())
}

async fn remove_player(paths: &Paths, query: &str) -> StdResult<()> {
    let (store, mut board) = load_board(paths).await?;
    let sort_by = current_sort(paths).await?;
    let Some(id) = board.find(query, sort_by).map(|player| player.id.clone()) else {
        eprintln!("No player matches {query:?}");
        return Ok(());
    };
    if let Some(player) = board.remove(&id) {
        store.save(&board).await?;
        println!("Removed {}", player.name);
    }
    Ok(())
}

async fn adjust_score(paths: &Paths, query: &str, delta: i32) -> StdResult<()> {
    let (store, mut board) = load_board(paths).await?;
    let sort_by = current_sort(paths).await?;
    let Some((id, name)) = board
        .find(query, sort_by)
        .map(|player| (player.id.clone(), player.name.clone()))
    else {
        eprintln!("No player matches {query:?}");
        return Ok(());
    };
    let score = match delta {
        1 => board.increment(&id),
        -1 => board.decrement(&id),
        _ => board.adjust(&id, delta),
    };
    if let Some(score) = score {
        store.save(&board).await?;
        println!("{name}: {score}");
    }
    Ok(())
}

async fn show_scores(paths: &Paths, sort: Option<SortBy>) -> StdResult<()> {
    let (_, board) = load_board(paths).await?;
    let sort_by = match sort {
        Some(sort_by) => sort_by,
        None => current_sort(paths).await?,
    };
    println!("{}", render_scores(&board.sorted(sort_by), sort_by));
    Ok(())
}

async fn select_sort(paths: &Paths, key: Option<SortBy>) -> StdResult<()> {
    let mut prefs = Preferences::load(&paths.preferences).await?;
    prefs.sort_by = key.unwrap_or(prefs.sort_by.toggled());
    prefs.save(&paths.preferences).await?;
    println!("Sorting by {}", prefs.sort_by);
    Ok(())
}

#[derive(Clone, Copy, Debug)]
enum Reset {
    Scores,
    All,
}

impl Reset {
    fn question(self) -> &'static str {
        match self {
            Reset::Scores => "Are you sure you want to reset all scores?",
            Reset::All => "Are you sure you want to remove all players?",
        }
    }
}

async fn reset(paths: &Paths, reset: Reset, yes: bool) -> StdResult<()> {
    let (store, mut board) = load_board(paths).await?;
    if board.is_empty() {
        println!("No players added yet.");
        return Ok(());
    }
    let count = board.len();
    let mut stdin = BufReader::new(tokio::io::stdin());
    if !gated_reset(&mut board, reset, yes, &mut stdin).await? {
        println!("Cancelled");
        return Ok(());
    }
    store.save(&board).await?;
    match reset {
        Reset::Scores => println!("Reset scores of {count} players"),
        Reset::All => println!("Removed {count} players"),
    }
    Ok(())
}

/// Applies the reset only after a "y" answer, or straight away with `--yes`.
async fn gated_reset<R>(
    board: &mut Scoreboard,
    reset: Reset,
    yes: bool,
    input: &mut R,
) -> StdResult<bool>
where
    R: AsyncBufRead + Unpin,
{
    if !yes && !confirm(reset.question(), input).await? {
        return Ok(false);
    }
    match reset {
        Reset::Scores => board.reset_scores(),
        Reset::All => board.reset_all(),
    }
    Ok(true)
}

async fn confirm<R>(question: &str, input: &mut R) -> StdResult<bool>
where
    R: AsyncBufRead + Unpin,
{
    println!("{question} (y/n)");
    let mut answer = String::new();
    input.read_line(&mut answer).await?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

async fn is_tunequiz_running(proxy: &QuizPlayerProxy<'_>) -> bool {
    proxy.test_connection().await.is_ok()
}

async fn handle_player_command(command: Commands, proxy: &QuizPlayerProxy<'_>) -> StdResult<()> {
    if let Commands::Start = command {
        return start_tunequiz(proxy).await;
    }
    if !is_tunequiz_running(proxy).await {
        eprintln!("{NOT_RUNNING}");
        return Ok(());
    }
    match command {
        Commands::Stop => {
            proxy.stop().await?;
            println!("tunequiz stopped");
        }
        Commands::Load(cmd) => load_url(proxy, &cmd.url).await?,
        Commands::Play => {
            proxy.play().await?;
            print_status(proxy).await?;
        }
        Commands::Pause => {
            proxy.pause().await?;
            print_status(proxy).await?;
        }
        Commands::Toggle => {
            let playing = proxy.toggle().await?;
            println!("{}", if playing { "Playing" } else { "Paused" });
        }
        Commands::Seek(arg) => {
            proxy.begin_seek().await?;
            proxy.seek_change(arg.percent).await?;
            proxy.end_seek().await?;
            print_status(proxy).await?;
        }
        Commands::Volume(arg) => {
            proxy.set_volume(arg.percent).await?;
            print_status(proxy).await?;
        }
        Commands::Title => {
            let shown = proxy.toggle_title().await?;
            let report = fetch_status(proxy).await?;
            match (shown, report.title) {
                (true, Some(title)) => println!("{title}"),
                (true, None) => println!("No title yet"),
                (false, _) => println!("Title hidden"),
            }
        }
        Commands::Status(cmd) if cmd.follow => follow_status(proxy).await?,
        Commands::Status(_) => print_status(proxy).await?,
        // Score keeping never talks to the player.
        Commands::Add(_)
        | Commands::Remove(_)
        | Commands::Plus(_)
        | Commands::Minus(_)
        | Commands::Adjust(_)
        | Commands::Scores(_)
        | Commands::Sort(_)
        | Commands::ResetScores(_)
        | Commands::ResetAll(_)
        | Commands::Start => {}
    }
    Ok(())
}

async fn load_url(proxy: &QuizPlayerProxy<'_>, url: &str) -> StdResult<()> {
    if url.trim().is_empty() {
        eprintln!("{EMPTY_URL}");
        return Ok(());
    }
    println!("Loading...");
    match proxy.load(url).await {
        Ok(()) => println!("Loaded, title hidden. Use `tq play` to start."),
        Err(zbus::Error::MethodError(_, Some(message), _)) => eprintln!("{message}"),
        Err(zbus::Error::FDO(e)) => match *e {
            fdo::Error::Failed(message) => eprintln!("{message}"),
            other => return Err(zbus::Error::FDO(Box::new(other)).into()),
        },
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

async fn fetch_status(proxy: &QuizPlayerProxy<'_>) -> StdResult<StatusReport> {
    let json = proxy.status().await?;
    Ok(serde_json::from_str(&json)?)
}

async fn print_status(proxy: &QuizPlayerProxy<'_>) -> StdResult<()> {
    println!("{}", render_status(&fetch_status(proxy).await?));
    Ok(())
}

async fn follow_status(proxy: &QuizPlayerProxy<'_>) -> StdResult<()> {
    let mut ticker = tokio::time::interval(FOLLOW_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let text = render_status(&fetch_status(proxy).await?);
                // Clear the screen and home the cursor before each frame.
                println!("\x1b[2J\x1b[H{text}");
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

async fn start_tunequiz(proxy: &QuizPlayerProxy<'_>) -> StdResult<()> {
    if is_tunequiz_running(proxy).await {
        println!("tunequiz is already running");
        return Ok(());
    }

    let current_exe_path = std::env::current_exe()?;
    let exe_dir = current_exe_path.parent().ok_or_else(|| {
        App::InvalidInput("Failed to get the directory of the executable".to_string())
    })?;
    let tunequiz_path = exe_dir.join("tunequiz");

    if !tunequiz_path.exists() {
        return Err(App::InvalidInput(
            "tunequiz executable not found in the same directory".to_string(),
        ));
    }

    let child = Command::new(tunequiz_path).spawn()?;
    println!("tunequiz started, process ID: {:?}", child.id());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board() -> Scoreboard {
        let mut board = Scoreboard::default();
        for (name, points) in [("Ada", 3), ("Grace", 5)] {
            let id = board.add(name).unwrap().id.clone();
            board.adjust(&id, points);
        }
        board
    }

    #[tokio::test]
    async fn declined_resets_leave_the_board_alone() {
        for answer in ["n\n", "\n", "", "yes\n"] {
            for reset in [Reset::Scores, Reset::All] {
                let mut board = board();
                let before = board.clone();
                let mut input = answer.as_bytes();
                assert!(!gated_reset(&mut board, reset, false, &mut input).await.unwrap());
                assert_eq!(board, before, "answer {answer:?} changed the board");
            }
        }
    }

    #[tokio::test]
    async fn confirmed_reset_scores_keeps_players() {
        for answer in ["y\n", "Y\n", "  y  \n"] {
            let mut board = board();
            let mut input = answer.as_bytes();
            assert!(gated_reset(&mut board, Reset::Scores, false, &mut input).await.unwrap());
            assert_eq!(board.len(), 2);
            assert!(board.players().iter().all(|player| player.score == 0));
        }
    }

    #[tokio::test]
    async fn confirmed_reset_all_empties_the_board() {
        let mut board = board();
        let mut input = "Y\n".as_bytes();
        assert!(gated_reset(&mut board, Reset::All, false, &mut input).await.unwrap());
        assert!(board.is_empty());
    }

    #[tokio::test]
    async fn yes_flag_skips_the_prompt() {
        let mut board = board();
        let mut input: &[u8] = b"";
        assert!(gated_reset(&mut board, Reset::All, true, &mut input).await.unwrap());
        assert!(board.is_empty());
    }
}
