use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{
        disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
    tty::IsTty,
};
use itertools::Itertools;
use std::{
    error::Error,
    io::{self, stdin, Stdout, Write},
    path::PathBuf,
};
use time_humanize::{Accuracy, HumanTime, Tense};
use tracing::Level;
use typespeed::{
    clock::SystemClock,
    config::{ConfigStore, FileConfigStore},
    driver::{Completion, Outcome, TypingTest},
    generator::TextGenerator,
    leaderboard::{FileScoreStore, Leaderboard, ScoreEntry},
    runtime::{CrosstermEventSource, FixedTicker, Runner},
    session::Session,
};

/// typing speed test with a per-difficulty leaderboard
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Type the generated passage as fast and accurately as you can. Results are ranked per difficulty and kept between runs."
)]
pub struct Cli {
    /// difficulty to play, as named in the settings file
    #[clap(short = 'd', long, default_value = "medium")]
    difficulty: String,

    /// settings file to use instead of the default location
    #[clap(short = 'c', long)]
    config: Option<PathBuf>,

    /// leaderboard file to use instead of the configured one
    #[clap(long)]
    scores_file: Option<PathBuf>,

    /// word list file (json or one word per line)
    #[clap(short = 'w', long)]
    words_file: Option<PathBuf>,

    /// bundled word list to draw from
    #[clap(short = 'l', long)]
    word_list: Option<String>,

    /// seed for passage generation
    #[clap(long)]
    seed: Option<u64>,

    /// print the leaderboard and exit
    #[clap(long)]
    list_scores: bool,

    /// delete all recorded scores
    #[clap(long)]
    clear_scores: bool,

    /// log debug output to stderr
    #[clap(short = 'v', long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    let config_store = cli
        .config
        .as_ref()
        .map(FileConfigStore::with_path)
        .unwrap_or_else(FileConfigStore::new);
    let mut settings = config_store.load();
    tracing::debug!(path = %config_store.path().display(), "settings loaded");
    if let Some(ref path) = cli.scores_file {
        settings.scores_file = Some(path.clone());
    }
    if let Some(ref path) = cli.words_file {
        settings.word_list_file = Some(path.clone());
    }
    if let Some(ref name) = cli.word_list {
        settings.word_list = name.clone();
    }
    settings.validate()?;

    let mut board = Leaderboard::open(
        FileScoreStore::with_path(settings.scores_path()),
        &settings.difficulties,
        settings.max_high_scores,
    );

    if cli.clear_scores {
        board.clear()?;
        println!("cleared all scores in {}", board.store().path().display());
        if !cli.list_scores {
            return Ok(());
        }
    }

    if cli.list_scores {
        print_scores(&board)?;
        return Ok(());
    }

    if !settings.difficulties.contains(&cli.difficulty) {
        let mut cmd = Cli::command();
        cmd.error(
            ErrorKind::InvalidValue,
            format!(
                "unknown difficulty '{}' (available: {})",
                cli.difficulty,
                settings.difficulties.names().join(", ")
            ),
        )
        .exit();
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let words = settings.load_words()?;
    let generator = cli.seed.map_or_else(TextGenerator::new, TextGenerator::seeded);
    let session = Session::new(settings.difficulties.clone(), words, generator, SystemClock);
    let mut test = TypingTest::new(session);
    test.start(&cli.difficulty)?;

    let completion = run_terminal(&mut test, &mut board)?;
    match completion {
        Some(completion) => print_completion(&completion),
        None => println!("attempt abandoned, nothing recorded"),
    }
    Ok(())
}

/// Restores the terminal even when the loop bails out early
struct TerminalGuard;

impl TerminalGuard {
    fn enter(out: &mut Stdout) -> io::Result<Self> {
        enable_raw_mode()?;
        execute!(out, EnterAlternateScreen, Hide)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let mut out = io::stdout();
        let _ = execute!(out, Show, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

fn run_terminal(
    test: &mut TypingTest,
    board: &mut Leaderboard,
) -> Result<Option<Completion>, Box<dyn Error>> {
    let mut out = io::stdout();
    let _guard = TerminalGuard::enter(&mut out)?;
    let runner = Runner::new(CrosstermEventSource::new(), FixedTicker::default());

    loop {
        render(&mut out, test)?;
        match test.handle(&runner.step(), board)? {
            Outcome::Continue => {}
            Outcome::Finished(completion) => return Ok(Some(completion)),
            Outcome::Aborted => return Ok(None),
        }
    }
}

fn render(out: &mut Stdout, test: &TypingTest) -> io::Result<()> {
    let session = test.session();
    let live = test.live_metrics();
    let clock = match session.remaining() {
        Some(secs) => format!("{secs}s left"),
        None => format!("{:.0}s", session.elapsed()),
    };

    queue!(
        out,
        MoveTo(0, 0),
        Clear(ClearType::All),
        SetForegroundColor(Color::Cyan),
        Print(format!(
            "{} | {clock} | {:.1} wpm | {:.1}% | esc to quit",
            session.difficulty().unwrap_or_default(),
            live.wpm,
            live.accuracy
        )),
        ResetColor,
        MoveTo(0, 2),
    )?;

    let mut typed = test.typed().chars();
    for expected in session.target_text().chars() {
        let color = match typed.next() {
            Some(c) if c == expected => Color::Green,
            Some(_) => Color::Red,
            None => Color::DarkGrey,
        };
        queue!(out, SetForegroundColor(color), Print(expected))?;
    }
    queue!(out, ResetColor)?;
    out.flush()
}

fn print_completion(completion: &Completion) {
    let result = completion.result;
    println!(
        "{}: {} wpm, {:.1}% accuracy in {:.1}s",
        completion.reason, result.wpm, result.accuracy, result.time
    );
    if completion.is_new_best {
        println!("new personal best!");
    } else if let Some(ref best) = completion.personal_best {
        println!("personal best: {} wpm ({:.1}%)", best.wpm, best.accuracy);
    }
    if let Some(ref e) = completion.save_error {
        eprintln!("warning: {e}");
    }
}

fn print_scores(board: &Leaderboard) -> Result<(), Box<dyn Error>> {
    println!("top {} per difficulty", board.max_entries());
    for difficulty in board.difficulties() {
        let scores = board.get_scores(difficulty)?;
        println!("{difficulty}");
        if scores.is_empty() {
            println!("  no scores yet");
            continue;
        }
        for (rank, entry) in scores.iter().enumerate() {
            println!(
                "  {:>2}. {:>6.1} wpm {:>6.1}%  {}",
                rank + 1,
                entry.wpm,
                entry.accuracy,
                when(entry)
            );
        }
        let summary = board.summary(difficulty)?;
        if let (Some(wpm), Some(acc)) = (summary.mean_wpm, summary.mean_accuracy) {
            println!("      avg {wpm:.1} wpm {acc:.1}%");
        }
    }
    Ok(())
}

fn when(entry: &ScoreEntry) -> String {
    let now = chrono::Local::now().naive_local();
    entry
        .recorded_at()
        .and_then(|at| (now - at).to_std().ok())
        .map(|ago| HumanTime::from(ago).to_text_en(Accuracy::Rough, Tense::Past))
        .unwrap_or_else(|| entry.timestamp.clone())
}
