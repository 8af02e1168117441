use std::borrow::Cow;

use hcl::Body;

use super::classify::is_applied;
use super::locate::{ByteRange, locate};
use crate::error::Result;
use crate::terraform::{Directive, StateView};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedDeletion {
    pub directive: Directive,
    pub range: ByteRange,
}

/// Non-overlapping block ranges to delete from one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionPlan {
    deletions: Vec<PlannedDeletion>,
}

impl DeletionPlan {
    pub fn is_empty(&self) -> bool {
        self.deletions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.deletions.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlannedDeletion> {
        self.deletions.iter()
    }

    /// Deletes every planned range, last one first so earlier offsets stay valid.
    pub fn apply(&self, source: &[u8]) -> Vec<u8> {
        let mut ranges: Vec<ByteRange> = self.deletions.iter().map(|d| d.range).collect();
        ranges.sort_by(|a, b| b.start.cmp(&a.start));

        let mut buffer = source.to_vec();
        for range in ranges {
            let end = range.end + line_terminator_len(&buffer[range.end..]);
            buffer.drain(range.start..end);
            collapse_blank_lines(&mut buffer, range.start);
        }
        buffer
    }
}

/// Classifies every directive block in `source` and records the ranges of
/// those already applied. With no state, every directive is planned.
pub fn plan_deletions(source: &[u8], state: Option<&dyn StateView>) -> Result<DeletionPlan> {
    let text = std::str::from_utf8(source)?;
    let body: Body = hcl::parse(text)?;

    let mut plan = DeletionPlan::default();
    let mut claimed: Vec<ByteRange> = Vec::new();

    for block in body.blocks() {
        let Some(directive) = Directive::from_block(block)? else {
            continue;
        };
        if !is_applied(&directive, state)? {
            tracing::debug!(
                kind = %directive.kind(),
                target = %directive.describe(),
                "directive not applied yet"
            );
            continue;
        }

        match locate(source, &directive, &claimed)? {
            Some(range) => {
                claimed.push(range);
                plan.deletions.push(PlannedDeletion { directive, range });
            }
            None => {
                tracing::warn!(
                    kind = %directive.kind(),
                    target = %directive.describe(),
                    "applied directive has no matching block in the source text"
                );
            }
        }
    }

    Ok(plan)
}

/// Removes every applied directive block from `source`.
///
/// Returns `Cow::Borrowed` when nothing was deleted.
pub fn apply_all_deletions<'a>(
    source: &'a [u8],
    state: Option<&dyn StateView>,
) -> Result<Cow<'a, [u8]>> {
    let plan = plan_deletions(source, state)?;
    if plan.is_empty() {
        return Ok(Cow::Borrowed(source));
    }
    Ok(Cow::Owned(plan.apply(source)))
}

fn line_terminator_len(rest: &[u8]) -> usize {
    if rest.starts_with(b"\r\n") {
        2
    } else if rest.starts_with(b"\n") {
        1
    } else {
        0
    }
}

/// Collapses the newline run around `at` to two line terminators when it
/// holds three or more.
fn collapse_blank_lines(buffer: &mut Vec<u8>, at: usize) {
    let mut run_start = at;
    let mut before = 0;
    loop {
        if run_start >= 2 && &buffer[run_start - 2..run_start] == b"\r\n" {
            run_start -= 2;
        } else if run_start >= 1 && buffer[run_start - 1] == b'\n' {
            run_start -= 1;
        } else {
            break;
        }
        before += 1;
    }

    let mut run_end = at;
    let mut after = 0;
    loop {
        let len = line_terminator_len(&buffer[run_end..]);
        if len == 0 {
            break;
        }
        run_end += len;
        after += 1;
    }

    if before + after < 3 {
        return;
    }

    let crlf = if before > 0 {
        at >= 2 && &buffer[at - 2..at] == b"\r\n"
    } else {
        buffer[at..].starts_with(b"\r\n")
    };
    let terminator: &[u8] = if crlf { b"\r\n\r\n" } else { b"\n\n" };
    buffer.splice(run_start..run_end, terminator.iter().copied());
}
