//! Interactive terminal exam loop.

use anyhow::Context;
use std::io::Write;
use std::str::FromStr;
use std::time::Duration;

use exam_core::model::{ExamResult, QuestionFilter};
use services::{ExamEngine, ExamError, ExamTimer};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::sync::oneshot;

const HELP: &str = "commands: n (next), p (previous), g <n> (go to question), a <n> (answer), s (submit), q (quit)";
const AGAIN_PROMPT: &str = "Start another exam? [y/N] ";

//
// ─── COMMANDS ──────────────────────────────────────────────────────────────────
//

/// One line of user input. Numbers are 1-based as shown on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamCommand {
    Next,
    Previous,
    GoTo(usize),
    Answer(usize),
    Submit,
    Quit,
    Help,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty input")]
    Empty,
    #[error("unknown command `{0}`")]
    Unknown(String),
    #[error("`{command}` needs a number from 1 up")]
    BadNumber { command: &'static str },
}

fn parse_number(raw: Option<&str>, command: &'static str) -> Result<usize, CommandError> {
    raw.and_then(|s| s.parse::<usize>().ok())
        .filter(|n| *n >= 1)
        .ok_or(CommandError::BadNumber { command })
}

impl FromStr for ExamCommand {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let Some(head) = parts.next() else {
            return Err(CommandError::Empty);
        };
        let arg = parts.next();
        match head.to_ascii_lowercase().as_str() {
            "n" | "next" => Ok(Self::Next),
            "p" | "prev" | "previous" => Ok(Self::Previous),
            "g" | "go" => parse_number(arg, "g").map(Self::GoTo),
            "a" | "answer" => parse_number(arg, "a").map(Self::Answer),
            "s" | "submit" => Ok(Self::Submit),
            "q" | "quit" => Ok(Self::Quit),
            "h" | "help" | "?" => Ok(Self::Help),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

//
// ─── RENDERING ─────────────────────────────────────────────────────────────────
//

fn format_clock(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

fn render_question(
    engine: &ExamEngine,
    timer: Option<&ExamTimer>,
    out: &mut impl Write,
) -> std::io::Result<()> {
    let Some(question) = engine.current() else {
        return Ok(());
    };
    let progress = engine.progress();
    let chosen = engine.answer(question.id());

    write!(
        out,
        "\nQuestion {} of {} (answered {})",
        progress.current, progress.total, progress.answered
    )?;
    if let Some(timer) = timer {
        write!(out, " [time left {}]", format_clock(timer.remaining()))?;
    }
    writeln!(out)?;
    writeln!(out, "{}", question.text())?;
    for (i, option) in question.options().iter().enumerate() {
        let marker = if chosen == Some(i) { '*' } else { ' ' };
        writeln!(out, "{marker} {}) {option}", i + 1)?;
    }
    Ok(())
}

/// Print the score line followed by one block per question.
///
/// # Errors
///
/// Returns write errors from `out`.
pub fn render_result(result: &ExamResult, out: &mut impl Write) -> std::io::Result<()> {
    writeln!(
        out,
        "\nScore: {}/{} correct, {} wrong, {:.2}% in {}",
        result.correct_count(),
        result.total_questions(),
        result.wrong_count(),
        result.percentage(),
        format_clock(result.elapsed_seconds()),
    )?;
    for row in result.review() {
        let mark = if row.is_correct { "correct" } else { "wrong" };
        writeln!(out, "\n{}. {} [{mark}]", row.position, row.text)?;
        writeln!(out, "   Correct answer: {}", row.correct_option)?;
        writeln!(
            out,
            "   Your answer: {}",
            row.chosen_option.as_deref().unwrap_or("Not Answered")
        )?;
        if !row.explanation.is_empty() {
            writeln!(out, "   Explanation: {}", row.explanation)?;
        }
    }
    Ok(())
}

//
// ─── LOOP ──────────────────────────────────────────────────────────────────────
//

/// How an interactive exam ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ExamOutcome {
    Submitted(ExamResult),
    TimedOut(ExamResult),
    Abandoned,
}

/// Load an exam and drive it from `lines` until submit, quit, end of input,
/// or timer expiry.
///
/// # Errors
///
/// Returns load failures (e.g. no matching questions), input errors, and
/// scoring failures. A failed history write is reported on `out` and does
/// not abort the run.
pub async fn run_exam<R, W>(
    engine: &mut ExamEngine,
    filter: &QuestionFilter,
    count: usize,
    time_limit: Option<Duration>,
    lines: &mut Lines<R>,
    out: &mut W,
) -> anyhow::Result<ExamOutcome>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let loaded = engine.load_questions(filter, count).await?;
    writeln!(out, "Loaded {loaded} question(s). {HELP}")?;

    let mut timer = ExamTimer::new();
    let (expired_tx, expired_rx) = oneshot::channel::<()>();
    if let Some(limit) = time_limit {
        timer.start(
            limit,
            |remaining| tracing::trace!(remaining, "exam timer tick"),
            move || {
                let _ = expired_tx.send(());
            },
        );
    }
    let expiry = async move {
        // A dropped sender means no timer is running.
        if expired_rx.await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    tokio::pin!(expiry);

    let show_clock = time_limit.is_some();
    render_question(engine, show_clock.then_some(&timer), out)?;

    let timed_out = loop {
        write!(out, "> ")?;
        out.flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line.context("reading input")?,
            () = &mut expiry => break true,
        };
        let Some(line) = line else {
            writeln!(out, "\nInput closed; exam abandoned.")?;
            return Ok(ExamOutcome::Abandoned);
        };

        let command = match line.parse::<ExamCommand>() {
            Ok(command) => command,
            Err(CommandError::Empty) => continue,
            Err(err) => {
                writeln!(out, "{err}. {HELP}")?;
                continue;
            }
        };

        match command {
            ExamCommand::Next => {
                engine.next();
            }
            ExamCommand::Previous => {
                engine.previous();
            }
            ExamCommand::GoTo(n) => {
                if n > engine.progress().total {
                    writeln!(out, "No question {n}.")?;
                    continue;
                }
                engine.go_to(n - 1);
            }
            ExamCommand::Answer(n) => {
                let Some(question) = engine.current() else {
                    continue;
                };
                if !question.has_option(n - 1) {
                    writeln!(out, "No option {n}.")?;
                    continue;
                }
                let id = question.id().clone();
                engine.save_answer(id, n - 1);
            }
            ExamCommand::Submit => break false,
            ExamCommand::Quit => {
                timer.stop();
                writeln!(out, "Exam abandoned.")?;
                return Ok(ExamOutcome::Abandoned);
            }
            ExamCommand::Help => {
                writeln!(out, "{HELP}")?;
                continue;
            }
        }
        render_question(engine, show_clock.then_some(&timer), out)?;
    };

    timer.stop();
    if timed_out {
        writeln!(out, "\nTime is up.")?;
    }

    let result = submit(engine, out).await?;
    render_result(&result, out)?;
    Ok(if timed_out {
        ExamOutcome::TimedOut(result)
    } else {
        ExamOutcome::Submitted(result)
    })
}

/// Run exams back to back on one engine until the candidate declines another
/// or input ends.
///
/// The engine keeps its attempt tracker between exams, so later exams skip
/// questions already served until the filter's pool is exhausted.
///
/// # Errors
///
/// Same as [`run_exam`].
pub async fn run_session<R, W>(
    engine: &mut ExamEngine,
    filter: &QuestionFilter,
    count: usize,
    time_limit: Option<Duration>,
    input: R,
    out: &mut W,
) -> anyhow::Result<Vec<ExamOutcome>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut outcomes = Vec::new();
    loop {
        let outcome = run_exam(engine, filter, count, time_limit, &mut lines, out).await?;
        outcomes.push(outcome);

        write!(out, "\n{AGAIN_PROMPT}")?;
        out.flush()?;
        let answer = lines.next_line().await.context("reading input")?;
        let again = answer.is_some_and(|a| matches!(a.trim().to_ascii_lowercase().as_str(), "y" | "yes"));
        if !again {
            writeln!(out)?;
            return Ok(outcomes);
        }
    }
}

async fn submit(engine: &mut ExamEngine, out: &mut impl Write) -> anyhow::Result<ExamResult> {
    match engine.submit_exam().await {
        Ok(result) => Ok(result),
        Err(ExamError::Persistence(err)) => {
            writeln!(out, "warning: result not saved ({err}); retrying once")?;
            if let Err(err) = engine.finalize_result().await {
                writeln!(out, "warning: result still not saved ({err})")?;
            }
            engine
                .session()
                .and_then(|s| s.result())
                .cloned()
                .context("scored result missing after submit")
        }
        Err(err) => Err(err.into()),
    }
}
