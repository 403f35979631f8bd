use winnow::combinator::{alt, separated};
use winnow::error::ModalResult;
use winnow::prelude::*;
use winnow::token::{rest, take_until};

use crate::types::{Component, Path};

use super::PathSyntax;

// -- Segments ---------------------------------------------------------------

/// Separator-delimited runs of text. Each run may be empty; the last one
/// extends to the end of the input.
fn segments<'i>(input: &mut &'i str, sep: &str) -> ModalResult<Vec<&'i str>> {
    separated(1.., alt((take_until(0.., sep), rest)), sep).parse_next(input)
}

// -- Components -------------------------------------------------------------

fn component(token: &str, syntax: &PathSyntax) -> Component {
    if token == syntax.any_token() {
        Component::AnyInLevel
    } else if token == syntax.many_token() {
        Component::ManyLevels
    } else {
        Component::Named(token.to_owned())
    }
}

/// Parse a full path string. The empty string is the empty path.
pub(crate) fn parse_path(input: &str, syntax: &PathSyntax) -> Result<Path, String> {
    if input.is_empty() {
        return Ok(Path::root());
    }
    let mut remaining = input;
    let tokens = segments(&mut remaining, syntax.separator()).map_err(|e| e.to_string())?;
    if !remaining.is_empty() {
        return Err(format!("unparsed trailing input '{remaining}'"));
    }
    Ok(tokens.into_iter().map(|t| component(t, syntax)).collect())
}
