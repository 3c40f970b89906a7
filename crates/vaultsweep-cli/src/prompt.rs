use std::collections::HashSet;
use std::io::{self, BufRead, BufReader, Write};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use vaultsweep_dedup::{DedupError, DuplicateReviewer, DuplicateSet, ReviewDecision};

/// Terminal review: pick the cipher to keep in every set, then confirm.
///
/// Prompts go to stderr so `--json` output on stdout stays parseable.
pub struct PromptReviewer {
    io: Mutex<PromptIo>,
}

struct PromptIo {
    input: Box<dyn BufRead + Send>,
    output: Box<dyn Write + Send>,
}

#[derive(Debug, PartialEq, Eq)]
enum Choice {
    Keep(usize),
    Skip,
    Quit,
    Invalid,
}

impl PromptReviewer {
    pub fn stdio() -> Self {
        Self::new(Box::new(BufReader::new(io::stdin())), Box::new(io::stderr()))
    }

    pub fn new(input: Box<dyn BufRead + Send>, output: Box<dyn Write + Send>) -> Self {
        Self {
            io: Mutex::new(PromptIo { input, output }),
        }
    }

    fn run(&self, sets: &[DuplicateSet]) -> io::Result<Option<ReviewDecision>> {
        let mut guard = self.io.lock().unwrap_or_else(PoisonError::into_inner);
        let PromptIo { input, output } = &mut *guard;

        let mut keep = Vec::new();
        for (set_idx, set) in sets.iter().enumerate() {
            writeln!(output, "\n[{}/{}] {}", set_idx + 1, sets.len(), set.key)?;
            for (member_idx, cipher) in set.ciphers.iter().enumerate() {
                let trash = if cipher.is_deleted() { "  (trash)" } else { "" };
                writeln!(
                    output,
                    "  {}) {:<32} {}{trash}",
                    member_idx + 1,
                    cipher.display_name(),
                    cipher.id
                )?;
            }

            loop {
                write!(
                    output,
                    "Keep which? [1-{}, s = skip, q = quit] (1): ",
                    set.ciphers.len()
                )?;
                output.flush()?;

                let Some(line) = read_line(input.as_mut())? else {
                    return Ok(None);
                };
                match parse_choice(&line, set.ciphers.len()) {
                    Choice::Keep(member_idx) => {
                        keep.push((set_idx, member_idx));
                        break;
                    }
                    Choice::Skip => break,
                    Choice::Quit => return Ok(None),
                    Choice::Invalid => writeln!(output, "  not a valid choice: {}", line.trim())?,
                }
            }
        }

        let selected = selection(sets, &keep);
        if selected.is_empty() {
            return Ok(Some(ReviewDecision::default()));
        }

        write!(output, "\nDelete {} ciphers? [y/N]: ", selected.len())?;
        output.flush()?;
        let confirmed = read_line(input.as_mut())?
            .is_some_and(|l| matches!(l.trim().to_lowercase().as_str(), "y" | "yes"));

        Ok(Some(ReviewDecision {
            confirmed,
            delete_cipher_ids: selected,
        }))
    }
}

#[async_trait]
impl DuplicateReviewer for PromptReviewer {
    async fn review(&self, sets: &[DuplicateSet]) -> vaultsweep_dedup::Result<Option<ReviewDecision>> {
        self.run(sets).map_err(|e| DedupError::Review(e.to_string()))
    }
}

/// `None` on end of input.
fn read_line(input: &mut dyn BufRead) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}

fn parse_choice(line: &str, members: usize) -> Choice {
    match line.trim().to_lowercase().as_str() {
        "" => Choice::Keep(0),
        "s" | "skip" => Choice::Skip,
        "q" | "quit" => Choice::Quit,
        other => match other.parse::<usize>() {
            Ok(n) if (1..=members).contains(&n) => Choice::Keep(n - 1),
            _ => Choice::Invalid,
        },
    }
}

/// Members of reviewed sets other than their kept cipher, minus anything
/// kept by another set.
fn selection(sets: &[DuplicateSet], keep: &[(usize, usize)]) -> Vec<String> {
    let kept: HashSet<&str> = keep
        .iter()
        .map(|&(set, member)| sets[set].ciphers[member].id.as_str())
        .collect();

    let mut seen = HashSet::new();
    keep.iter()
        .flat_map(|&(set, _)| sets[set].ciphers.iter())
        .map(|c| c.id.as_str())
        .filter(|id| !kept.contains(id) && seen.insert(*id))
        .map(str::to_string)
        .collect()
}
