//! Format patterns
//!
//! A pattern such as `{date:%H:%M:%S} {level}: {message}` is compiled once per
//! configuration activation into a list of [`Token`]s. Rendering a record
//! walks the tokens in order and never re-parses the pattern.
//!
//! Grammar: text outside braces is copied verbatim; `{name}` or
//! `{name:sub-format}` is a token. Only `date` accepts a sub-format.

use super::caller::UNAVAILABLE;
use super::error::{LoggerError, Result};
use super::fields::RequiredFields;
use super::log_record::LogRecord;
use super::throwable::NEW_LINE;
use super::timestamp::DateFormat;
use chrono::Locale;

/// Pattern used when none is configured or the configured one is invalid
pub const DEFAULT_FORMAT: &str =
    "{date:%Y-%m-%d %H:%M:%S} [{thread}] {class}.{method}()\n{level}: {message}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    Date(DateFormat),
    Level,
    Thread,
    Class,
    Method,
    File,
    Line,
    /// Message followed by the exception, if any
    Message,
    MessageOnly,
    Exception,
}

impl Token {
    fn required_fields(&self) -> RequiredFields {
        match self {
            Token::Literal(_) => RequiredFields::empty(),
            Token::Date(_) => RequiredFields::DATE,
            Token::Level => RequiredFields::LEVEL,
            Token::Thread => RequiredFields::THREAD,
            Token::Class => RequiredFields::CLASS,
            Token::Method => RequiredFields::METHOD,
            Token::File => RequiredFields::FILE,
            Token::Line => RequiredFields::LINE,
            Token::Message => RequiredFields::MESSAGE | RequiredFields::EXCEPTION,
            Token::MessageOnly => RequiredFields::MESSAGE,
            Token::Exception => RequiredFields::EXCEPTION,
        }
    }

    fn parse(pattern: &str, body: &str) -> Result<Token> {
        let (name, sub_format) = match body.split_once(':') {
            Some((name, sub_format)) => (name.trim(), Some(sub_format)),
            None => (body.trim(), None),
        };

        let token = match name {
            "date" => {
                let format = match sub_format {
                    Some(spec) => DateFormat::parse(spec)
                        .map_err(|message| LoggerError::pattern(pattern, message))?,
                    None => DateFormat::default(),
                };
                return Ok(Token::Date(format));
            }
            "level" => Token::Level,
            "thread" => Token::Thread,
            "class" => Token::Class,
            "method" => Token::Method,
            "file" => Token::File,
            "line" => Token::Line,
            "message" => Token::Message,
            "message-only" => Token::MessageOnly,
            "exception" => Token::Exception,
            "" => return Err(LoggerError::pattern(pattern, "empty token")),
            unknown => {
                return Err(LoggerError::pattern(
                    pattern,
                    format!("unknown token '{}'", unknown),
                ))
            }
        };

        if sub_format.is_some() {
            return Err(LoggerError::pattern(
                pattern,
                format!("token '{}' does not take a sub-format", name),
            ));
        }
        Ok(token)
    }
}

/// A pattern compiled into renderer tokens
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    source: String,
    tokens: Vec<Token>,
    locale: Locale,
    required: RequiredFields,
}

impl CompiledPattern {
    /// Compile with the POSIX locale
    pub fn compile(pattern: &str) -> Result<Self> {
        Self::compile_with_locale(pattern, Locale::POSIX)
    }

    pub fn compile_with_locale(pattern: &str, locale: Locale) -> Result<Self> {
        let mut tokens = Vec::new();
        let mut literal = String::new();
        let mut rest = pattern;

        while let Some(open) = rest.find('{') {
            literal.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let close = after.find('}').ok_or_else(|| {
                let offset = pattern.len() - rest.len() + open;
                LoggerError::pattern(pattern, format!("unterminated token at offset {}", offset))
            })?;

            if !literal.is_empty() {
                tokens.push(Token::Literal(std::mem::take(&mut literal)));
            }
            tokens.push(Token::parse(pattern, &after[..close])?);
            rest = &after[close + 1..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            tokens.push(Token::Literal(literal));
        }

        let required = tokens
            .iter()
            .fold(RequiredFields::empty(), |acc, token| acc | token.required_fields());

        Ok(Self {
            source: pattern.to_string(),
            tokens,
            locale,
            required,
        })
    }

    /// [`DEFAULT_FORMAT`], assembled without parsing
    pub fn fallback(locale: Locale) -> Self {
        let tokens = vec![
            Token::Date(DateFormat::default()),
            Token::Literal(" [".to_string()),
            Token::Thread,
            Token::Literal("] ".to_string()),
            Token::Class,
            Token::Literal(".".to_string()),
            Token::Method,
            Token::Literal("()\n".to_string()),
            Token::Level,
            Token::Literal(": ".to_string()),
            Token::Message,
        ];
        let required = tokens
            .iter()
            .fold(RequiredFields::empty(), |acc, token| acc | token.required_fields());

        Self {
            source: DEFAULT_FORMAT.to_string(),
            tokens,
            locale,
            required,
        }
    }

    /// The pattern string this was compiled from
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn required_fields(&self) -> RequiredFields {
        self.required
    }

    /// Render `record` followed by the platform line terminator
    pub fn render(&self, record: &LogRecord) -> String {
        let mut out = String::with_capacity(128);
        self.render_into(record, &mut out);
        out.push_str(NEW_LINE);
        out
    }

    /// Render `record` without a trailing line terminator
    pub fn render_into(&self, record: &LogRecord, out: &mut String) {
        for token in &self.tokens {
            match token {
                Token::Literal(text) => out.push_str(text),
                Token::Date(format) => {
                    if let Some(timestamp) = &record.timestamp {
                        out.push_str(&format.format(timestamp, self.locale));
                    }
                }
                Token::Level => out.push_str(record.level.to_str()),
                Token::Thread => push_opt(out, record.thread.as_deref()),
                Token::Class => push_opt(out, record.class.as_deref()),
                Token::Method => push_opt(out, record.method.as_deref()),
                Token::File => push_opt(out, record.file),
                Token::Line => match record.line {
                    Some(line) => out.push_str(&line.to_string()),
                    None => out.push_str(UNAVAILABLE),
                },
                Token::Message => match (&record.message, &record.exception) {
                    (Some(message), Some(exception)) if !message.is_empty() => {
                        out.push_str(message);
                        out.push_str(": ");
                        out.push_str(exception);
                    }
                    (_, Some(exception)) => out.push_str(exception),
                    (Some(message), None) => out.push_str(message),
                    (None, None) => {}
                },
                Token::MessageOnly => push_opt(out, record.message.as_deref()),
                Token::Exception => push_opt(out, record.exception.as_deref()),
            }
        }
    }
}

fn push_opt(out: &mut String, value: Option<&str>) {
    if let Some(value) = value {
        out.push_str(value);
    }
}
