//! Keyboard controls for `logtail watch`, one command per stdin line.
//!
//! | Input               | Action                              |
//! |---------------------|-------------------------------------|
//! | `/<pattern>`        | set the filter (debounced)          |
//! | `/`                 | clear the filter                    |
//! | `o <file> [amount]` | open another file                   |
//! | `e`                 | toggle error focus                  |
//! | `f`                 | toggle follow mode                  |
//! | `s`                 | stop the stream                     |
//! | `r`                 | reload the current file             |
//! | `q`                 | quit                                |

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::connection::protocol::Amount;
use crate::session::Control;

/// Parse one input line. Blank lines yield `None`.
pub fn parse_control(line: &str, default_amount: Amount) -> Result<Option<Control>> {
    let line = line.trim_end_matches(['\r', '\n']);

    if let Some(pattern) = line.strip_prefix('/') {
        return Ok(Some(Control::FilterInput(pattern.to_string())));
    }

    let line = line.trim();
    let control = match line {
        "" => return Ok(None),
        "e" => Control::ToggleErrorFocus,
        "f" => Control::ToggleFollow,
        "s" => Control::Stop,
        "r" => Control::Reload,
        "q" => Control::Quit,
        _ => match line.strip_prefix("o ") {
            Some(args) => parse_open(args.trim(), default_amount)?,
            None => bail!("unknown control '{line}' (try /pattern, o <file>, e, f, s, r, q)"),
        },
    };
    Ok(Some(control))
}

/// `<file>` or `<file> <amount>`.
fn parse_open(args: &str, default_amount: Amount) -> Result<Control> {
    let (file, amount) = match args.rsplit_once(' ') {
        Some((file, amount)) if amount.parse::<Amount>().is_ok() => (
            file.trim(),
            amount.parse::<Amount>().context("invalid amount")?,
        ),
        _ => (args, default_amount),
    };
    if file.is_empty() {
        bail!("'o' needs a file name");
    }
    Ok(Control::Open {
        file: file.to_string(),
        amount,
    })
}

/// Forward stdin lines to `controls` until `q`, end of input, or the
/// receiver going away.
pub async fn forward_stdin(controls: UnboundedSender<Control>, default_amount: Amount) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "stdin closed");
                break;
            }
        };
        match parse_control(&line, default_amount) {
            Ok(Some(control)) => {
                let quit = control == Control::Quit;
                if controls.send(control).is_err() || quit {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => eprintln!("{e}"),
        }
    }
}
