//! Interactive choice of which technologies the optimiser may use.
use crate::technology::TechnologyID;
use anyhow::Result;
use std::io::{BufRead, Write};
use strum::IntoEnumIterator;

/// Parse a yes/no answer. An empty answer means `default`.
fn parse_answer(answer: &str, default: bool) -> Option<bool> {
    match answer.trim().to_lowercase().as_str() {
        "" => Some(default),
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Ask whether to use each technology in turn, returning the ones the user turned down.
///
/// Technologies in `disabled` are offered with "no" as the default answer. If the input runs out,
/// the remaining technologies keep their defaults.
pub fn prompt_disabled_technologies<R, W>(
    mut input: R,
    mut output: W,
    disabled: &[TechnologyID],
) -> Result<Vec<TechnologyID>>
where
    R: BufRead,
    W: Write,
{
    let mut chosen = Vec::new();
    for id in TechnologyID::iter() {
        let default = !disabled.contains(&id);
        let use_technology = loop {
            let hint = if default { "[Y/n]" } else { "[y/N]" };
            write!(output, "Use {id}? {hint} ")?;
            output.flush()?;

            let mut answer = String::new();
            if input.read_line(&mut answer)? == 0 {
                break default;
            }
            match parse_answer(&answer, default) {
                Some(answer) => break answer,
                None => writeln!(output, "Please answer y or n.")?,
            }
        };

        if !use_technology {
            chosen.push(id);
        }
    }

    Ok(chosen)
}
