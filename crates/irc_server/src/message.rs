//! IRC line codec (§4.C2): `[":" prefix SP] command SP param *(SP param) CRLF`,
//! with the final param optionally introduced by `:` and allowed to contain
//! spaces. Grounded in the nom-combinator grammar of `parsers.rs` and in the
//! parse/render algorithm of the original `message.c` (strip CRLF, split on
//! runs of spaces, a leading `:` token is the prefix, the command is
//! upcased, a token starting with `:` marks the start of the trailing
//! long parameter).

use crate::error::ParseError;
use nom::{
    IResult, Parser,
    bytes::complete::{take_while, take_while1},
    character::complete::char,
    combinator::opt,
    sequence::preceded,
};

pub const MAX_LINE_OCTETS: usize = 512;
pub const MAX_PARAMS: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
    /// True if the last parameter must be rendered with a leading `:`
    /// (either because it was parsed that way, or because the handler
    /// that built it contains a space/starts with `:`/is empty).
    pub long_last: bool,
}

impl Message {
    pub fn new(command: impl Into<String>, params: Vec<String>) -> Self {
        let long_last = params
            .last()
            .is_some_and(|p| p.is_empty() || p.contains(' ') || p.starts_with(':'));
        Message {
            prefix: None,
            command: command.into(),
            params,
            long_last,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Forces the last parameter to render with a leading `:` even if it
    /// contains no space (used by e.g. PONG's trailing token per §6).
    pub fn force_trailing(mut self) -> Self {
        self.long_last = true;
        self
    }

    /// Parses one already CRLF/LF-stripped line.
    pub fn parse(line: &str) -> Result<Message, ParseError> {
        if line.len() + 2 > MAX_LINE_OCTETS {
            return Err(ParseError::LineTooLong);
        }
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return Err(ParseError::Empty);
        }

        let (rest, prefix) = parse_prefix(line).map_err(|_: nom::Err<nom::error::Error<&str>>| ParseError::PrefixWithoutCommand)?;
        if prefix.is_some() && rest.is_empty() {
            return Err(ParseError::PrefixWithoutCommand);
        }

        let (mut rest, command) =
            take_while1::<_, _, nom::error::Error<&str>>(|c: char| c != ' ')(rest)
                .map_err(|_| ParseError::Empty)?;

        let mut params = Vec::new();
        let mut long_last = false;
        loop {
            let (r, _) = take_while::<_, _, nom::error::Error<&str>>(|c| c == ' ')(rest).unwrap();
            rest = r;
            if rest.is_empty() {
                break;
            }
            if params.len() == MAX_PARAMS {
                return Err(ParseError::TooManyParams);
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_string());
                long_last = true;
                break;
            }
            let (r, middle) = take_while1::<_, _, nom::error::Error<&str>>(|c: char| c != ' ')(rest)
                .map_err(|_| ParseError::Empty)?;
            params.push(middle.to_string());
            rest = r;
        }

        Ok(Message {
            prefix: prefix.map(str::to_string),
            command: command.to_ascii_uppercase(),
            params,
            long_last,
        })
    }

    /// Exact inverse of `parse`, modulo the documented normalizations
    /// (command upcased, trailing empties not distinguished from absent).
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(prefix) = &self.prefix {
            out.push(':');
            out.push_str(prefix);
            out.push(' ');
        }
        out.push_str(&self.command);
        for (i, param) in self.params.iter().enumerate() {
            out.push(' ');
            if i == self.params.len() - 1 && self.long_last {
                out.push(':');
            }
            out.push_str(param);
        }
        out.push_str("\r\n");
        out
    }
}

fn parse_prefix(input: &str) -> IResult<&str, Option<&str>> {
    let (rest, prefix) =
        opt(preceded(char(':'), take_while1(|c: char| c != ' '))).parse(input)?;
    if prefix.is_some() {
        let rest = rest.strip_prefix(' ').unwrap_or(rest);
        Ok((rest, prefix))
    } else {
        Ok((rest, prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_command() {
        let m = Message::parse("NICK alice").unwrap();
        assert_eq!(m.command, "NICK");
        assert_eq!(m.params, vec!["alice"]);
        assert!(!m.long_last);
    }

    #[test]
    fn parses_prefix_and_trailing() {
        let m = Message::parse(":alice!a@b PRIVMSG #test :hi there").unwrap();
        assert_eq!(m.prefix.as_deref(), Some("alice!a@b"));
        assert_eq!(m.command, "PRIVMSG");
        assert_eq!(m.params, vec!["#test", "hi there"]);
        assert!(m.long_last);
    }

    #[test]
    fn upcases_command() {
        let m = Message::parse("nick alice").unwrap();
        assert_eq!(m.command, "NICK");
    }

    #[test]
    fn empty_line_is_error() {
        assert_eq!(Message::parse(""), Err(ParseError::Empty));
        assert_eq!(Message::parse("\r\n"), Err(ParseError::Empty));
    }

    #[test]
    fn prefix_without_command_is_error() {
        assert_eq!(Message::parse(":alice"), Err(ParseError::PrefixWithoutCommand));
    }

    #[test]
    fn too_many_params_is_a_parse_error() {
        let mut line = String::from("CMD");
        for i in 0..20 {
            line.push_str(&format!(" p{i}"));
        }
        assert_eq!(Message::parse(&line), Err(ParseError::TooManyParams));
    }

    #[test]
    fn exactly_max_params_parses_fine() {
        let mut line = String::from("CMD");
        for i in 0..MAX_PARAMS {
            line.push_str(&format!(" p{i}"));
        }
        let m = Message::parse(&line).unwrap();
        assert_eq!(m.params.len(), MAX_PARAMS);
    }

    #[test]
    fn round_trip_law() {
        for line in [
            "NICK alice",
            "USER alice 0 * :Alice Smith",
            ":irc.example.org 001 alice :Welcome",
        ] {
            let parsed = Message::parse(line).unwrap();
            let rendered = parsed.render();
            let reparsed = Message::parse(rendered.trim_end()).unwrap();
            assert_eq!(parsed, reparsed);
        }
    }
}
