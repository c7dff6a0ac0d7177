use std::ffi::OsString;
use std::io::{BufRead, Write};
use std::sync::Arc;

use clap::{ArgMatches, CommandFactory, FromArgMatches};
use tracing::info;

use volley::app::{ConsoleReporter, RunController, RunReporter};
use volley::args::{LARGE_RUN_THRESHOLD, TesterArgs};
use volley::config::{RunConfig, apply_config, default_config_path, load_config};
use volley::error::AppResult;
use volley::logger::init_logging;
use volley::shutdown::RunFlag;
use volley::shutdown_handlers::setup_signal_shutdown_handler;

pub(crate) fn run() -> AppResult<()> {
    let Some((mut args, matches)) = parse_args()? else {
        return Ok(());
    };

    init_logging(args.verbose, args.no_color);

    if let Some(config) = load_config(args.config.as_deref())? {
        apply_config(&mut args, &matches, &config)?;
    }
    let config = RunConfig::from_args(&args)?;

    if !args.yes && config.num_requests.get() > LARGE_RUN_THRESHOLD {
        let stdin = std::io::stdin();
        let confirmed = confirm_large_run(
            config.num_requests.get(),
            &mut stdin.lock(),
            &mut std::io::stdout(),
        )?;
        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run_async(config, args.no_color))
}

fn parse_args() -> AppResult<Option<(TesterArgs, ArgMatches)>> {
    let mut cmd = TesterArgs::command();
    let raw_args: Vec<OsString> = std::env::args_os().collect();

    if should_show_help(&raw_args) {
        cmd.print_help()?;
        println!();
        return Ok(None);
    }

    let matches = cmd.get_matches_from(raw_args);
    let args = TesterArgs::from_arg_matches(&matches)?;

    Ok(Some((args, matches)))
}

fn should_show_help(raw_args: &[OsString]) -> bool {
    let treat_as_empty =
        matches!(raw_args, [] | [_]) || matches!(raw_args, [_, second] if second == "--");
    if !treat_as_empty {
        return false;
    }

    default_config_path().is_none()
}

/// Asks before sending a very large number of requests. Only `yes` proceeds.
fn confirm_large_run<R, W>(requests: u64, input: &mut R, output: &mut W) -> AppResult<bool>
where
    R: BufRead,
    W: Write,
{
    writeln!(
        output,
        "Warning: you are about to send {} requests. Only test services you are authorized to load.",
        requests
    )?;
    write!(output, "Type 'yes' to continue: ")?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}

async fn run_async(config: RunConfig, no_color: bool) -> AppResult<()> {
    let run_flag = RunFlag::new();
    let signal_handle = setup_signal_shutdown_handler(&run_flag);
    let reporter: Arc<dyn RunReporter> = Arc::new(ConsoleReporter::new(no_color));

    let outcome = match RunController::new(config, run_flag.clone(), reporter) {
        Ok(controller) => controller.run().await,
        Err(err) => Err(err),
    };
    signal_handle.abort();

    let report = outcome?;
    if report.interrupted {
        info!(
            "Run interrupted after {} of {} requests",
            report.statistics.total, report.target
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use volley::error::AppError;

    fn answer(input: &str) -> AppResult<(bool, String)> {
        let mut reader = Cursor::new(input.as_bytes().to_vec());
        let mut output = Vec::new();
        let confirmed = confirm_large_run(20_000, &mut reader, &mut output)?;
        Ok((confirmed, String::from_utf8_lossy(&output).into_owned()))
    }

    #[test]
    fn only_yes_confirms_large_run() -> AppResult<()> {
        for (input, expected) in [
            ("yes\n", true),
            ("  YES  \n", true),
            ("y\n", false),
            ("no\n", false),
            ("", false),
        ] {
            let (confirmed, _) = answer(input)?;
            if confirmed != expected {
                return Err(AppError::Io {
                    source: std::io::Error::other(format!(
                        "Unexpected confirmation for {:?}",
                        input
                    )),
                });
            }
        }
        Ok(())
    }

    #[test]
    fn prompt_mentions_request_count() -> AppResult<()> {
        let (_, prompt) = answer("no\n")?;
        if !prompt.contains("20000 requests") || !prompt.ends_with("Type 'yes' to continue: ") {
            return Err(AppError::Io {
                source: std::io::Error::other(format!("Unexpected prompt: {}", prompt)),
            });
        }
        Ok(())
    }

    #[test]
    fn help_shown_only_without_arguments() -> AppResult<()> {
        let with_url = [OsString::from("volley"), OsString::from("-u")];
        if should_show_help(&with_url) {
            return Err(AppError::Io {
                source: std::io::Error::other("Help should not be shown with arguments"),
            });
        }
        Ok(())
    }
}
