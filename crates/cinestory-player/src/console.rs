//! Line-oriented console commands.
//!
//! | Line | Intent |
//! |---|---|
//! | `continue` | continue past a title card |
//! | `pause` | toggle pause |
//! | `<n>` | select the n-th visible choice, counting from 1 |
//! | `ended` | the video of the current block finished |
//! | `setup key=value,...` | complete character setup |
//! | `quit` | end the session |

use std::collections::BTreeMap;

use cinestory_core::error::DomainError;
use cinestory_playback::domain::commands::PlayerIntent;
use cinestory_playback::domain::snapshot::RenderSnapshot;

/// What a console line asks for.
#[derive(Debug)]
pub enum ConsoleCommand {
    /// Forward an intent to the session.
    Intent(PlayerIntent),
    /// Stop the session and exit.
    Quit,
}

/// Parses one line against the snapshot the player is looking at.
///
/// Choice numbers and `ended` are resolved against `snapshot`, so the
/// session receives authored choice indices and the current media cue.
///
/// # Errors
///
/// Returns `DomainError::Validation` for unknown commands, out-of-range
/// choice numbers, `ended` without a block on screen, and malformed setup
/// allocations.
pub fn parse_line(line: &str, snapshot: &RenderSnapshot) -> Result<ConsoleCommand, DomainError> {
    let line = line.trim();
    let (word, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(word, rest)| (word, rest.trim()));

    let intent = match word {
        "continue" | "c" => PlayerIntent::proceed(),
        "pause" | "p" => PlayerIntent::toggle_pause(),
        "quit" | "q" => return Ok(ConsoleCommand::Quit),
        "ended" => {
            let cue = snapshot
                .block
                .as_ref()
                .map(|block| block.cue)
                .ok_or_else(|| DomainError::Validation("no block is on screen".into()))?;
            PlayerIntent::media_ended(cue)
        }
        "setup" => PlayerIntent::complete_setup(parse_allocation(rest)?),
        other => {
            let number: usize = other
                .parse()
                .map_err(|_| DomainError::Validation(format!("unknown command: {other}")))?;
            let choice = number
                .checked_sub(1)
                .and_then(|position| snapshot.choices.get(position))
                .ok_or_else(|| DomainError::Validation(format!("no choice numbered {number}")))?;
            PlayerIntent::select(choice.index)
        }
    };
    Ok(ConsoleCommand::Intent(intent))
}

fn parse_allocation(pairs: &str) -> Result<BTreeMap<String, i64>, DomainError> {
    pairs
        .split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| DomainError::Validation(format!("expected key=value, got {pair}")))?;
            let points = value.trim().parse::<i64>().map_err(|e| {
                DomainError::Validation(format!("points for {} must be a number: {e}", key.trim()))
            })?;
            Ok((key.trim().to_owned(), points))
        })
        .collect()
}
