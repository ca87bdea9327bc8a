//! The red/amber/green rule language.
//!
//! One rule per line; blank lines and lines starting with `#` are ignored.
//!
//! ```text
//! red   if output =~ /^Assertion .* failed/
//! green if status == 0 and stdout !~ /FAILED/
//! default amber
//! ```
//!
//! Subjects are `stdout`, `stderr`, `output` (stdout followed by stderr) and
//! `status`. Streams take `=~` / `!~` with a `/regex/` literal (`\/` for a
//! literal slash, an optional trailing `i` for case-insensitive). `status`
//! takes `== != < <= > >=` and an integer. Conditions are joined with `and`.
//! Rules are tried top to bottom; `default <colour>` must be the last rule.
//! Regexes run in multi-line mode, so `^` and `$` match at line boundaries.

use regex::{Regex, RegexBuilder};

use crate::colour::Colour;

/// A rules file that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct RuleParseError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn holds(self, lhs: i64, rhs: i64) -> bool {
        match self {
            CmpOp::Eq => lhs == rhs,
            CmpOp::Ne => lhs != rhs,
            CmpOp::Lt => lhs < rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Ge => lhs >= rhs,
        }
    }
}

#[derive(Debug, Clone)]
enum Condition {
    Pattern {
        stream: Stream,
        regex: Regex,
        negated: bool,
    },
    Status {
        op: CmpOp,
        value: i64,
    },
}

impl Condition {
    fn holds(&self, stdout: &str, stderr: &str, output: &str, status: i32) -> bool {
        match self {
            Condition::Pattern {
                stream,
                regex,
                negated,
            } => {
                let text = match stream {
                    Stream::Stdout => stdout,
                    Stream::Stderr => stderr,
                    Stream::Output => output,
                };
                regex.is_match(text) != *negated
            }
            Condition::Status { op, value } => op.holds(i64::from(status), *value),
        }
    }
}

#[derive(Debug, Clone)]
struct Rule {
    colour: Colour,
    conditions: Vec<Condition>,
}

/// A parsed rules file.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
    default: Colour,
}

impl RuleSet {
    pub fn parse(src: &str) -> Result<Self, RuleParseError> {
        let mut rules = Vec::new();
        let mut default: Option<(usize, Colour)> = None;

        for (index, raw) in src.lines().enumerate() {
            let line = index + 1;
            let text = raw.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            if let Some((default_line, _)) = default {
                return Err(RuleParseError {
                    line,
                    message: format!("rule after 'default' on line {default_line} is unreachable"),
                });
            }

            let mut cursor = Cursor::new(text, line);
            let head = cursor.word()?;
            if head == "default" {
                let colour = cursor.colour()?;
                cursor.end()?;
                default = Some((line, colour));
                continue;
            }

            let colour = parse_colour(head, line)?;
            cursor.keyword("if")?;
            let mut conditions = vec![cursor.condition()?];
            while !cursor.at_end() {
                cursor.keyword("and")?;
                conditions.push(cursor.condition()?);
            }
            rules.push(Rule { colour, conditions });
        }

        let (_, default) = default.ok_or_else(|| RuleParseError {
            line: src.lines().count(),
            message: "missing 'default <colour>' rule".to_string(),
        })?;

        Ok(Self { rules, default })
    }

    /// Colour of the first rule whose conditions all hold, else the default.
    pub fn classify(&self, stdout: &str, stderr: &str, status: i32) -> Colour {
        let output = format!("{stdout}{stderr}");
        self.rules
            .iter()
            .find(|rule| {
                rule.conditions
                    .iter()
                    .all(|c| c.holds(stdout, stderr, &output, status))
            })
            .map(|rule| rule.colour)
            .unwrap_or(self.default)
    }

    /// Number of conditional rules (the default excluded).
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn parse_colour(word: &str, line: usize) -> Result<Colour, RuleParseError> {
    word.parse::<Colour>()
        .map_err(|message| RuleParseError { line, message })
}

struct Cursor<'s> {
    text: &'s str,
    pos: usize,
    line: usize,
}

impl<'s> Cursor<'s> {
    fn new(text: &'s str, line: usize) -> Self {
        Self { text, pos: 0, line }
    }

    fn error(&self, message: impl Into<String>) -> RuleParseError {
        RuleParseError {
            line: self.line,
            message: message.into(),
        }
    }

    fn rest(&self) -> &'s str {
        &self.text[self.pos..]
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn at_end(&mut self) -> bool {
        self.skip_ws();
        self.rest().is_empty()
    }

    fn end(&mut self) -> Result<(), RuleParseError> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.error(format!("unexpected '{}'", self.rest())))
        }
    }

    /// A run of letters, digits and underscores.
    fn word(&mut self) -> Result<&'s str, RuleParseError> {
        self.skip_ws();
        let rest = self.rest();
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(self.error(format!("expected a word at '{rest}'")));
        }
        self.pos += len;
        Ok(&rest[..len])
    }

    fn keyword(&mut self, expected: &str) -> Result<(), RuleParseError> {
        let found = self.word()?;
        if found == expected {
            Ok(())
        } else {
            Err(self.error(format!("expected '{expected}', found '{found}'")))
        }
    }

    fn colour(&mut self) -> Result<Colour, RuleParseError> {
        let word = self.word()?;
        parse_colour(word, self.line)
    }

    fn operator(&mut self) -> Result<&'s str, RuleParseError> {
        self.skip_ws();
        let rest = self.rest();
        let len = rest
            .find(|c: char| !matches!(c, '=' | '!' | '<' | '>' | '~'))
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(self.error(format!("expected an operator at '{rest}'")));
        }
        self.pos += len;
        Ok(&rest[..len])
    }

    fn integer(&mut self) -> Result<i64, RuleParseError> {
        self.skip_ws();
        let rest = self.rest();
        let sign = usize::from(rest.starts_with('-'));
        let digits = rest[sign..]
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len() - sign);
        let literal = &rest[..sign + digits];
        let value = literal
            .parse::<i64>()
            .map_err(|_| self.error(format!("expected an integer at '{rest}'")))?;
        self.pos += literal.len();
        Ok(value)
    }

    /// `/pattern/` with an optional `i` flag.
    fn regex(&mut self) -> Result<Regex, RuleParseError> {
        self.skip_ws();
        let rest = self.rest();
        let Some(body) = rest.strip_prefix('/') else {
            return Err(self.error(format!("expected '/regex/' at '{rest}'")));
        };

        let mut pattern = String::new();
        let mut consumed = None;
        let mut chars = body.char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some((_, '/')) => pattern.push('/'),
                    Some((_, escaped)) => {
                        pattern.push('\\');
                        pattern.push(escaped);
                    }
                    None => break,
                },
                '/' => {
                    consumed = Some(1 + i + 1);
                    break;
                }
                other => pattern.push(other),
            }
        }
        let consumed = consumed.ok_or_else(|| self.error("unterminated regex"))?;
        self.pos += consumed;

        let case_insensitive = if self.rest().starts_with('i') {
            self.pos += 1;
            true
        } else {
            false
        };

        RegexBuilder::new(&pattern)
            .multi_line(true)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|e| self.error(format!("invalid regex /{pattern}/: {e}")))
    }

    fn condition(&mut self) -> Result<Condition, RuleParseError> {
        let subject = self.word()?;
        let stream = match subject {
            "stdout" => Some(Stream::Stdout),
            "stderr" => Some(Stream::Stderr),
            "output" => Some(Stream::Output),
            "status" => None,
            other => return Err(self.error(format!("unknown subject '{other}'"))),
        };
        let op = self.operator()?;

        match stream {
            Some(stream) => {
                let negated = match op {
                    "=~" => false,
                    "!~" => true,
                    other => {
                        return Err(self.error(format!("'{other}' cannot be applied to {subject}")))
                    }
                };
                let regex = self.regex()?;
                Ok(Condition::Pattern {
                    stream,
                    regex,
                    negated,
                })
            }
            None => {
                let op = match op {
                    "==" => CmpOp::Eq,
                    "!=" => CmpOp::Ne,
                    "<" => CmpOp::Lt,
                    "<=" => CmpOp::Le,
                    ">" => CmpOp::Gt,
                    ">=" => CmpOp::Ge,
                    other => {
                        return Err(self.error(format!("'{other}' cannot be applied to status")))
                    }
                };
                let value = self.integer()?;
                Ok(Condition::Status { op, value })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GCC_ASSERT: &str = r#"
# gcc, assert.h
red   if output =~ /Assertion .* failed/
green if status == 0
default amber
"#;

    #[test]
    fn test_first_matching_rule_wins() {
        let rules = RuleSet::parse(GCC_ASSERT).unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(
            rules.classify("", "hiker.c:9: answer: Assertion `6*9 == 42' failed.", 134),
            Colour::Red
        );
        assert_eq!(rules.classify("All tests passed", "", 0), Colour::Green);
        assert_eq!(
            rules.classify("", "hiker.c:3: error: 'sdsd' undeclared", 2),
            Colour::Amber
        );
    }

    #[test]
    fn test_sanity_triple_falls_to_default() {
        let rules = RuleSet::parse(GCC_ASSERT).unwrap();
        assert_eq!(rules.classify("ssd", "sdsd", 42), Colour::Amber);
    }

    #[test]
    fn test_and_negation_and_anchors() {
        let rules = RuleSet::parse(
            "red if stdout =~ /^\\d+ examples, [1-9]\\d* failures?$/ and stderr !~ /Error/\n\
             green if stdout =~ /^\\d+ examples, 0 failures$/\n\
             default amber\n",
        )
        .unwrap();

        assert_eq!(rules.classify("Finished\n1 example, 1 failure\n", "", 1), Colour::Amber);
        assert_eq!(rules.classify("Finished\n3 examples, 1 failure\n", "", 1), Colour::Red);
        assert_eq!(
            rules.classify("3 examples, 1 failure", "SyntaxError", 1),
            Colour::Amber
        );
        assert_eq!(rules.classify("3 examples, 0 failures", "", 0), Colour::Green);
    }

    #[test]
    fn test_escaped_slash_and_case_flag() {
        let rules = RuleSet::parse("red if output =~ /tests\\/hiker FAILED/i\ndefault green").unwrap();
        assert_eq!(rules.classify("TESTS/HIKER failed", "", 1), Colour::Red);
        assert_eq!(rules.classify("tests hiker failed", "", 1), Colour::Green);
    }

    #[test]
    fn test_status_comparisons() {
        let rules = RuleSet::parse(
            "amber if status >= 2\nred if status != 0\ngreen if status == 0\ndefault amber",
        )
        .unwrap();
        assert_eq!(rules.classify("", "", 2), Colour::Amber);
        assert_eq!(rules.classify("", "", 1), Colour::Red);
        assert_eq!(rules.classify("", "", -1), Colour::Red);
        assert_eq!(rules.classify("", "", 0), Colour::Green);
    }

    #[test]
    fn test_classification_is_pure() {
        let rules = RuleSet::parse(GCC_ASSERT).unwrap();
        let first = rules.classify("x", "Assertion `a' failed", 134);
        let second = rules.classify("x", "Assertion `a' failed", 134);
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_default_rejected() {
        let err = RuleSet::parse("red if status != 0").unwrap_err();
        assert!(err.message.contains("default"));
    }

    #[test]
    fn test_rule_after_default_rejected() {
        let err = RuleSet::parse("default amber\nred if status == 1").unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_syntax_errors_carry_line_numbers() {
        let cases = [
            ("default amber\n", None),
            ("purple if status == 0\ndefault amber", Some(1)),
            ("# c\nred when status == 0\ndefault amber", Some(2)),
            ("red if exit == 0\ndefault amber", Some(1)),
            ("red if status =~ /0/\ndefault amber", Some(1)),
            ("red if stdout == 3\ndefault amber", Some(1)),
            ("red if stdout =~ /unterminated\ndefault amber", Some(1)),
            ("red if stdout =~ /(/\ndefault amber", Some(1)),
            ("red if status == 0 or status == 1\ndefault amber", Some(1)),
            ("red if status == x\ndefault amber", Some(1)),
        ];
        for (src, expected_line) in cases {
            let result = RuleSet::parse(src);
            match expected_line {
                None => assert!(result.is_ok(), "{src:?} should parse"),
                Some(line) => assert_eq!(result.unwrap_err().line, line, "{src:?}"),
            }
        }
    }

    #[test]
    fn test_ruby_lambda_is_not_accepted() {
        let src = "lambda { |stdout, stderr, status|\n  return :green if status == 0\n}";
        assert!(RuleSet::parse(src).is_err());
    }
}
