//! COD CLI - arbitrary-precision pi calculator.
//!
//! A command-line interface for computing pi using the `cod-core` library.
//! Supports console or file output, strategy comparison, and inspection of the
//! tail of a saved result.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use cod_core::output::{write_chunked, DEFAULT_CHUNK_CHARS};
use cod_core::{
    compute_pi_with, last_chars, pi_file_name, run_all_strategies, write_pi_file, Evaluation,
    PiComputation, PiError, PiOptions, RESULT_PREFIX,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::debug;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Delay between letters in typewriter mode.
const LETTER_DELAY: Duration = Duration::from_millis(30);

/// Evaluation strategy selection.
#[derive(Clone, Copy, PartialEq, Debug, ValueEnum)]
enum Strategy {
    /// Adaptive: parallel for large term ranges, sequential otherwise.
    Adaptive,
    /// Sequential: depth-first recursion on one thread.
    Sequential,
    /// Parallel: both halves of every large split run concurrently.
    Parallel,
    /// All: runs every strategy and compares performance (benchmarking mode).
    All,
}

impl Strategy {
    fn evaluation(self) -> Option<Evaluation> {
        match self {
            Strategy::Adaptive => Some(Evaluation::Adaptive),
            Strategy::Sequential => Some(Evaluation::Sequential),
            Strategy::Parallel => Some(Evaluation::Parallel),
            Strategy::All => None,
        }
    }
}

/// Where the result goes.
#[derive(Clone, Copy, PartialEq, Debug, ValueEnum)]
enum Output {
    /// Print the digits to standard output.
    Console,
    /// Save the digits to a timestamp-named text file.
    File,
}

/// CLI arguments structure.
#[derive(Parser)]
#[command(name = "cod", version, about = "Circumference Over Diameter: pi calculator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Number of digits after the decimal point (positional argument).
    #[arg(conflicts_with = "digits", allow_negative_numbers = true)]
    number: Option<i64>,

    /// Number of digits after the decimal point, using `--digits`.
    #[arg(long, conflicts_with = "number", allow_negative_numbers = true)]
    digits: Option<i64>,

    /// Evaluation strategy.
    #[arg(short, long, value_enum, default_value_t = Strategy::Adaptive)]
    strategy: Strategy,

    /// Output destination. Prompted for when no digit count is given.
    #[arg(short, long, value_enum)]
    output: Option<Output>,

    /// Directory for result files.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Print banner and messages letter by letter.
    #[arg(long)]
    typewriter: bool,

    /// Show detailed result analysis (terms, precision, size).
    #[arg(short, long)]
    detail: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Print the last characters of a result file, newlines escaped.
    Tail {
        /// Result file to inspect.
        file: PathBuf,
        /// Number of characters to print.
        #[arg(long, default_value_t = 100)]
        count: usize,
    },
}

/// Line printer with optional letter-by-letter animation.
struct Printer {
    typewriter: bool,
}

impl Printer {
    fn say(&self, text: &str) -> io::Result<()> {
        self.write_line(&mut io::stdout().lock(), text)
    }

    fn write_line(&self, out: &mut impl Write, text: &str) -> io::Result<()> {
        if !self.typewriter {
            return writeln!(out, "{}", text);
        }
        for c in text.chars() {
            write!(out, "{}", c)?;
            out.flush()?;
            std::thread::sleep(LETTER_DELAY);
        }
        writeln!(out)
    }
}

/// Answer to the output prompt that names no known destination.
#[derive(Debug)]
struct InvalidChoice(String);

impl std::fmt::Display for InvalidChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown output choice '{}'", self.0)
    }
}

impl std::error::Error for InvalidChoice {}

/// Reads an output answer; an empty answer picks the console.
fn parse_output(answer: &str) -> Result<Output, InvalidChoice> {
    match answer.to_ascii_lowercase().as_str() {
        "" | "c" | "console" => Ok(Output::Console),
        "f" | "file" => Ok(Output::File),
        _ => Err(InvalidChoice(answer.to_string())),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the result.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let printer = Printer {
        typewriter: cli.typewriter,
    };

    if let Err(err) = run(&cli, &printer) {
        eprintln!("{}", error_message(&err));
        std::process::exit(1);
    }
    Ok(())
}

fn run(cli: &Cli, printer: &Printer) -> anyhow::Result<()> {
    if let Some(Commands::Tail { file, count }) = &cli.command {
        let text = std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;
        println!("{}", last_chars(&text, *count));
        return Ok(());
    }

    printer.say(&format!("Circumference Over Diameter v{}", VERSION))?;

    // Handle digit count (positional OR --digits OR prompt)
    let (digits, output) = match cli.digits.or(cli.number) {
        Some(digits) => (digits, cli.output.unwrap_or(Output::Console)),
        None => prompt(printer, cli.output)?,
    };
    cod_core::validate_digits(digits)?;

    // Pre-warm the system for consistent performance
    cod_core::prewarm_system();

    let num_cpus = std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1);
    debug!(digits, strategy = ?cli.strategy, output = ?output, num_cpus, "starting");

    println!("--- Execution Configuration ---");
    println!("Environment: {} logical processors.", num_cpus);
    println!("Calculating pi to {} digits", format_number(digits as u64));

    let computation = match cli.strategy.evaluation() {
        Some(evaluation) => run_single(digits, evaluation)?,
        None => run_comparison(digits)?,
    };

    match output {
        Output::Console => print_pi(&computation.pi)?,
        Output::File => {
            let path = save_pi(&cli.out_dir, &computation.pi)?;
            printer.say(&format!("Pi saved to: {}", path.display()))?;
        }
    }

    printer.say(&format!(
        "Total calculation time: {}",
        format_duration(computation.elapsed)
    ))?;

    if cli.detail {
        print_detail(&computation);
    }
    Ok(())
}

/// Asks for the digit count and, unless given on the command line, the output.
fn prompt(printer: &Printer, output: Option<Output>) -> anyhow::Result<(i64, Output)> {
    let stdin = io::stdin();
    let mut input = stdin.lock();

    printer.say("How many digits of pi after the decimal point?")?;
    let digits: i64 = read_answer(&mut input)?.parse()?;

    let output = match output {
        Some(output) => output,
        None => {
            printer.say("Print to (c)onsole or save to (f)ile? [c]")?;
            parse_output(&read_answer(&mut input)?)?
        }
    };
    Ok((digits, output))
}

fn read_answer(input: &mut impl BufRead) -> anyhow::Result<String> {
    let mut line = String::new();
    input.read_line(&mut line).context("failed to read input")?;
    Ok(line.trim().to_string())
}

/// Computes pi with one strategy behind a progress bar.
fn run_single(digits: i64, evaluation: Evaluation) -> anyhow::Result<PiComputation> {
    println!("Strategy: {}", evaluation);
    println!();
    println!("--- Starting Execution ---");

    let pb = ProgressBar::new(1_000);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("Progress: {percent:>3}% [{bar:40.green/dim}] ETA: {eta}")?
            .progress_chars("█▓░"),
    );

    let pb_clone = pb.clone();
    let options = PiOptions {
        evaluation,
        cancel: None,
        progress: Some(Box::new(move |p: f64| {
            pb_clone.set_position((p * 1_000.0) as u64)
        })),
    };

    let result = compute_pi_with(digits, &options);
    pb.finish_and_clear();
    Ok(result?)
}

/// Runs every strategy concurrently and prints a comparison table.
fn run_comparison(digits: i64) -> anyhow::Result<PiComputation> {
    println!("Strategy: Parallel comparison of all strategies.");
    println!();

    let mut results = run_all_strategies(digits)?;
    results.sort_by(|a, b| a.1.cmp(&b.1));

    let consistent = results.windows(2).all(|w| w[0].2 == w[1].2);

    println!("--- Comparison Summary ---");
    println!("{:<20} {:>10}   Status", "Strategy", "Duration");
    for (strategy, duration, _) in &results {
        println!(
            "{:<20} {:>10}   ✅ Success",
            strategy.to_string(),
            format_duration(*duration)
        );
    }
    println!();
    if consistent {
        println!("Global Status: Success. All results are consistent.");
    } else {
        println!("Global Status: WARNING. Results differ!");
    }

    let (strategy, elapsed, pi) = results
        .into_iter()
        .next()
        .context("no strategy produced a result")?;
    debug!(fastest = %strategy, "comparison done");

    let digits = digits as u64;
    Ok(PiComputation {
        digits,
        pi,
        elapsed,
        terms: cod_core::term_count(digits),
        precision_bits: cod_core::precision_bits(digits),
    })
}

fn print_pi(pi: &str) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();
    write!(out, "{}", RESULT_PREFIX)?;
    write_chunked(&mut out, pi, DEFAULT_CHUNK_CHARS)?;
    writeln!(out)?;
    Ok(())
}

/// Writes the result file and returns its absolute path.
fn save_pi(dir: &Path, pi: &str) -> anyhow::Result<PathBuf> {
    let path = dir.join(pi_file_name(SystemTime::now()));
    let file =
        File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    write_pi_file(&mut writer, pi)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(std::fs::canonicalize(&path).unwrap_or(path))
}

fn print_detail(c: &PiComputation) {
    println!();
    println!("--- Detailed result analysis ---");
    println!("Number of digits     : {}", format_number(c.digits));
    println!("Series terms         : {}", format_number(c.terms));
    println!("Working precision    : {} bits", format_number(c.precision_bits));
    println!("Calculation time     : {}", format_duration(c.elapsed));
}

/// Maps a failure to the user-facing message.
fn error_message(err: &anyhow::Error) -> String {
    if err.is::<std::num::ParseIntError>() || err.is::<InvalidChoice>() {
        return "VALUE ERROR: Invalid value.".to_string();
    }
    match err.downcast_ref::<PiError>() {
        Some(PiError::InvalidDigitCount { .. }) | Some(PiError::InvalidRange { .. }) => {
            "VALUE ERROR: Invalid value.".to_string()
        }
        Some(PiError::ResourceExhausted { .. }) => {
            "MEMORY ERROR: Not enough memory to complete calculation.".to_string()
        }
        _ => format!("UNKNOWN ERROR: {:#}", err),
    }
}

/// Formats a duration into a human-readable string (ms or s).
fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1 {
        let micros = duration.as_micros();
        format!("{:.2}ms", micros as f64 / 1000.0)
    } else if millis < 1000 {
        format!("{}ms", millis)
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

/// Formats a large number with comma separators for readability (e.g., "1,000,000").
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_groups_thousands() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1_000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn format_duration_units() {
        assert_eq!(format_duration(Duration::from_micros(250)), "0.25ms");
        assert_eq!(format_duration(Duration::from_millis(42)), "42ms");
        assert_eq!(format_duration(Duration::from_millis(1_500)), "1.50s");
    }

    #[test]
    fn error_message_categories() {
        let value = anyhow::Error::from(PiError::InvalidDigitCount { digits: -1 });
        assert_eq!(error_message(&value), "VALUE ERROR: Invalid value.");

        let memory = anyhow::Error::from(PiError::ResourceExhausted {
            required_bytes: 2,
            limit_bytes: 1,
        });
        assert_eq!(
            error_message(&memory),
            "MEMORY ERROR: Not enough memory to complete calculation."
        );

        let parse = anyhow::Error::from("3.5".parse::<i64>().unwrap_err());
        assert_eq!(error_message(&parse), "VALUE ERROR: Invalid value.");

        let choice = anyhow::Error::from(InvalidChoice("x".into()));
        assert_eq!(error_message(&choice), "VALUE ERROR: Invalid value.");

        let other = anyhow::anyhow!("disk on fire");
        assert_eq!(error_message(&other), "UNKNOWN ERROR: disk on fire");
    }

    #[test]
    fn read_answer_trims() {
        let mut input = io::Cursor::new("  42 \nf\n");
        assert_eq!(read_answer(&mut input).unwrap(), "42");
        assert_eq!(read_answer(&mut input).unwrap(), "f");
        assert_eq!(read_answer(&mut input).unwrap(), "");
    }

    #[test]
    fn parse_output_rejects_unknown_answers() {
        assert_eq!(parse_output("").unwrap(), Output::Console);
        assert_eq!(parse_output("C").unwrap(), Output::Console);
        assert_eq!(parse_output("file").unwrap(), Output::File);
        assert!(parse_output("x").is_err());
        assert!(parse_output("b").is_err());
    }

    /// Writer whose every write fails.
    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn printer_reports_write_errors() {
        for typewriter in [false, true] {
            let printer = Printer { typewriter };
            assert!(printer.write_line(&mut Broken, "pi").is_err());

            let mut buf = Vec::new();
            printer.write_line(&mut buf, "pi").unwrap();
            assert_eq!(buf, b"pi\n");
        }
    }

    #[test]
    fn strategy_maps_to_evaluation() {
        assert_eq!(Strategy::Parallel.evaluation(), Some(Evaluation::Parallel));
        assert_eq!(Strategy::All.evaluation(), None);
    }
}
