use audiopoll_core::WillingToPay;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};

/// One line typed at the interactive prompt.
#[derive(Parser, Debug)]
#[command(name = "", no_binary_name = true, disable_version_flag = true)]
struct ShellLine {
    #[command(subcommand)]
    command: ShellCommand,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ShellCommand {
    /// Identify yourself. Quote names that contain spaces.
    #[command(visible_alias = "id")]
    Identity {
        first_name: String,
        last_name: String,
        email: String,
    },

    /// List the available courses.
    #[command(visible_alias = "ls")]
    Courses,

    /// Listen to a course, or switch to another one.
    Pick { course_id: String },

    /// Start or resume playback.
    Play,

    /// Pause playback.
    Pause,

    /// Play if paused, pause if playing.
    #[command(visible_alias = "p")]
    Toggle,

    /// Jump to a position, in seconds or mm:ss.
    Seek {
        #[arg(value_parser = parse_time)]
        to: f64,
    },

    /// Move relative to the current position, in seconds.
    Skip {
        #[arg(allow_negative_numbers = true)]
        delta: f64,
    },

    /// Skip forward by the configured step.
    #[command(visible_alias = "fwd")]
    Forward,

    /// Skip back by the configured step.
    Back,

    /// Set the playback rate (0.5, 1, 1.5, 2, 5 ...).
    Rate {
        #[arg(value_parser = parse_rate)]
        multiplier: f64,
    },

    /// Reload the current course from the start.
    Restart,

    /// One-line player.
    #[command(visible_alias = "s")]
    Status,

    /// Full player.
    Player,

    /// Send your feedback once the form is unlocked.
    #[command(visible_alias = "fb")]
    Feedback {
        /// Stars, 1 to 5.
        rating: u8,

        /// Comment; several words are joined with spaces.
        #[arg(required = true, num_args = 1..)]
        comments: Vec<String>,

        /// Would you pay for such a course: oui, non or peut-etre.
        #[arg(long, value_parser = parse_willing)]
        pay: Option<WillingToPay>,

        /// Acceptable amount, asked when the answer is oui or peut-etre.
        #[arg(long)]
        amount: Option<String>,
    },

    /// Courses you have not reviewed yet.
    Next,

    /// Leave the program.
    #[command(visible_aliases = ["exit", "q"])]
    Quit,
}

/// `Ok(None)` for a blank line. Help requests come back as a clap error
/// whose rendering is the help text.
pub fn parse(line: &str) -> Result<Option<ShellCommand>, clap::Error> {
    let Some(words) = shlex::split(line) else {
        return Err(ShellLine::command().error(ErrorKind::InvalidValue, "unbalanced quotes"));
    };
    if words.is_empty() {
        return Ok(None);
    }
    ShellLine::try_parse_from(words).map(|parsed| Some(parsed.command))
}

/// Seconds (`95`, `95.5`) or clock time (`1:35`).
pub fn parse_time(raw: &str) -> Result<f64, String> {
    let value = match raw.split_once(':') {
        Some((m, s)) => {
            let minutes: u32 = m.parse().map_err(|_| format!("bad minutes in {raw}"))?;
            let seconds: f64 = s.parse().map_err(|_| format!("bad seconds in {raw}"))?;
            if !(0.0..60.0).contains(&seconds) {
                return Err(format!("seconds out of range in {raw}"));
            }
            f64::from(minutes) * 60.0 + seconds
        }
        None => raw.parse().map_err(|_| format!("not a time: {raw}"))?,
    };
    if !(value.is_finite() && value >= 0.0) {
        return Err(format!("not a time: {raw}"));
    }
    Ok(value)
}

fn parse_rate(raw: &str) -> Result<f64, String> {
    raw.trim_end_matches('x')
        .parse()
        .map_err(|_| format!("not a rate: {raw}"))
}

fn parse_willing(raw: &str) -> Result<WillingToPay, String> {
    WillingToPay::parse(raw).ok_or_else(|| format!("expected oui, non or peut-etre, got {raw}"))
}
