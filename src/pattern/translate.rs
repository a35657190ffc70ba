// pattern/translate.rs
use crate::error::{Result, WatchError};

/// Token types for pattern scanning
#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Char(char),
    Escaped(char),
    Slash,
    OpenParen,
    CloseParen,
    Pipe,
    OpenBracket,
    CloseBracket,
    OpenBrace,
    CloseBrace,
    Question,
    Star,
    Plus,
    At,
    Exclamation,
    Comma,
    Dot,
}

/// Tokenizes the pattern, resolving backslash escapes
fn tokenize(s: &str) -> Vec<Token> {
    let mut out = Vec::new();
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(next) = chars.next() {
                    out.push(Token::Escaped(next));
                } else {
                    out.push(Token::Char('\\'));
                }
            }
            '/' => out.push(Token::Slash),
            '(' => out.push(Token::OpenParen),
            ')' => out.push(Token::CloseParen),
            '|' => out.push(Token::Pipe),
            '[' => out.push(Token::OpenBracket),
            ']' => out.push(Token::CloseBracket),
            '{' => out.push(Token::OpenBrace),
            '}' => out.push(Token::CloseBrace),
            '?' => out.push(Token::Question),
            '*' => out.push(Token::Star),
            '+' => out.push(Token::Plus),
            '@' => out.push(Token::At),
            '!' => out.push(Token::Exclamation),
            ',' => out.push(Token::Comma),
            '.' => out.push(Token::Dot),
            ch => out.push(Token::Char(ch)),
        }
    }
    out
}

/// Escapes a character for regex if necessary
fn regex_escape_char(c: char) -> String {
    match c {
        '.' | '+' | '?' | '*' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|' | '\\' => {
            format!("\\{}", c)
        }
        other => other.to_string(),
    }
}

/// Collects tokens until a balanced pair of start/end tokens is found
fn collect_until_balanced<I>(
    tokens: &mut std::iter::Peekable<I>,
    start: Token,
    end: Token,
) -> Result<Vec<Token>>
where
    I: Iterator<Item = Token>,
{
    let mut out = Vec::new();
    let mut depth = 1usize;

    for token in tokens.by_ref() {
        if token == start {
            depth += 1;
        } else if token == end {
            depth -= 1;
            if depth == 0 {
                break;
            }
        }
        out.push(token);
    }

    if depth != 0 {
        return Err(WatchError::InvalidPattern(
            "unbalanced delimiters in pattern".into(),
        ));
    }
    Ok(out)
}

/// Converts tokens back to pattern text
fn tokens_to_string(tokens: &[Token]) -> String {
    let mut s = String::new();
    for token in tokens {
        match token {
            Token::Char(c) => s.push(*c),
            Token::Escaped(c) => {
                s.push('\\');
                s.push(*c);
            }
            Token::Slash => s.push('/'),
            Token::OpenParen => s.push('('),
            Token::CloseParen => s.push(')'),
            Token::Pipe => s.push('|'),
            Token::OpenBracket => s.push('['),
            Token::CloseBracket => s.push(']'),
            Token::OpenBrace => s.push('{'),
            Token::CloseBrace => s.push('}'),
            Token::Question => s.push('?'),
            Token::Star => s.push('*'),
            Token::Plus => s.push('+'),
            Token::At => s.push('@'),
            Token::Exclamation => s.push('!'),
            Token::Comma => s.push(','),
            Token::Dot => s.push('.'),
        }
    }
    s
}

/// Strips the `^`/`$` anchors from a nested translation result
fn unanchored(regex: String) -> String {
    regex
        .trim_start_matches('^')
        .trim_end_matches('$')
        .to_string()
}

/// Translates an extended-glob group `op(a|b|..)` into a regex group
fn process_extglob(tokens: &[Token], operator: &Token) -> Result<String> {
    let mut alternatives = Vec::new();
    let mut current = Vec::new();
    let mut depth = 0;

    for token in tokens {
        if *token == Token::OpenParen {
            depth += 1;
        } else if *token == Token::CloseParen {
            depth -= 1;
        }

        if *token == Token::Pipe && depth == 0 {
            alternatives.push(current.clone());
            current.clear();
        } else {
            current.push(*token);
        }
    }

    if !current.is_empty() {
        alternatives.push(current);
    }

    let mut regex_alternatives = Vec::new();
    for alt in alternatives {
        let alt_str = tokens_to_string(&alt);
        regex_alternatives.push(unanchored(to_regex(&alt_str)?));
    }

    let alternatives_str = regex_alternatives.join("|");

    match operator {
        Token::Question => Ok(format!("(?:{})?", alternatives_str)),
        Token::Star => Ok(format!("(?:{})*", alternatives_str)),
        Token::Plus => Ok(format!("(?:{})+", alternatives_str)),
        Token::At => Ok(format!("(?:{})", alternatives_str)),
        // would need lookahead, which the regex engine rejects
        Token::Exclamation => Err(WatchError::InvalidPattern(
            "negated groups are not supported".into(),
        )),
        _ => Err(WatchError::InvalidPattern(
            "invalid extended-glob operator".into(),
        )),
    }
}

/// Translates a `[...]` character class, `[!...]` negating it
fn process_character_class(tokens: &[Token]) -> String {
    let mut class = String::new();
    let mut negated = false;
    let mut first_token = true;

    for token in tokens {
        if first_token {
            first_token = false;
            if let Token::Exclamation = token {
                negated = true;
                continue;
            }
        }

        match token {
            Token::Char(c) => class.push(*c),
            Token::Escaped(c) => {
                class.push('\\');
                class.push(*c);
            }
            other => class.push_str(&tokens_to_string(&[*other])),
        }
    }

    if negated {
        format!("[^{}]", class)
    } else {
        format!("[{}]", class)
    }
}

/// Translates a glob pattern (segment or full `/`-separated path) into an
/// anchored regex
///
/// `*` and `?` never cross a separator; a whole-segment `**` spans zero or
/// more levels. Extended groups (`@(a|b)`, bare `(a|b)`, `[..]`, `{a,b}`)
/// are supported the way the upstream matchers treat them, with dotfiles
/// always eligible.
pub fn to_regex(pattern: &str) -> Result<String> {
    let tokens = tokenize(pattern);
    let mut output = String::new();
    let mut tokens_iter = tokens.into_iter().peekable();
    let mut at_segment_start = true;

    while let Some(token) = tokens_iter.next() {
        let starts_segment = at_segment_start;
        at_segment_start = false;
        match token {
            Token::Slash => {
                output.push('/');
                at_segment_start = true;
            }
            Token::Question if tokens_iter.peek() == Some(&Token::OpenParen) => {
                tokens_iter.next();
                let inner =
                    collect_until_balanced(&mut tokens_iter, Token::OpenParen, Token::CloseParen)?;
                output.push_str(&process_extglob(&inner, &Token::Question)?);
            }
            Token::Question => output.push_str("[^/]"),
            Token::Star => {
                if tokens_iter.peek() == Some(&Token::OpenParen) {
                    tokens_iter.next();
                    let inner = collect_until_balanced(
                        &mut tokens_iter,
                        Token::OpenParen,
                        Token::CloseParen,
                    )?;
                    output.push_str(&process_extglob(&inner, &Token::Star)?);
                } else if tokens_iter.peek() == Some(&Token::Star) {
                    tokens_iter.next();
                    if starts_segment && tokens_iter.peek() == Some(&Token::Slash) {
                        // "**/" spans zero or more whole levels
                        tokens_iter.next();
                        output.push_str("(?:.*/)?");
                        at_segment_start = true;
                    } else if starts_segment && tokens_iter.peek().is_none() {
                        output.push_str(".*");
                    } else {
                        // embedded "**" degrades to a plain star
                        output.push_str("[^/]*");
                    }
                } else {
                    output.push_str("[^/]*");
                }
            }
            Token::At if tokens_iter.peek() == Some(&Token::OpenParen) => {
                tokens_iter.next();
                let inner =
                    collect_until_balanced(&mut tokens_iter, Token::OpenParen, Token::CloseParen)?;
                output.push_str(&process_extglob(&inner, &Token::At)?);
            }
            Token::Exclamation if tokens_iter.peek() == Some(&Token::OpenParen) => {
                tokens_iter.next();
                let inner =
                    collect_until_balanced(&mut tokens_iter, Token::OpenParen, Token::CloseParen)?;
                output.push_str(&process_extglob(&inner, &Token::Exclamation)?);
            }
            Token::Plus if tokens_iter.peek() == Some(&Token::OpenParen) => {
                tokens_iter.next();
                let inner =
                    collect_until_balanced(&mut tokens_iter, Token::OpenParen, Token::CloseParen)?;
                output.push_str(&process_extglob(&inner, &Token::Plus)?);
            }
            Token::OpenParen => {
                // bare group: alternation passes through with translated arms
                let inner =
                    collect_until_balanced(&mut tokens_iter, Token::OpenParen, Token::CloseParen)?;
                output.push_str(&process_extglob(&inner, &Token::At)?);
            }
            Token::OpenBracket => {
                let inner = collect_until_balanced(
                    &mut tokens_iter,
                    Token::OpenBracket,
                    Token::CloseBracket,
                )?;
                output.push_str(&process_character_class(&inner));
            }
            Token::OpenBrace => {
                let inner =
                    collect_until_balanced(&mut tokens_iter, Token::OpenBrace, Token::CloseBrace)?;
                let inner_str = tokens_to_string(&inner);
                let regex_alternatives: Vec<String> = inner_str
                    .split(',')
                    .map(|alt| to_regex(alt).map(unanchored))
                    .collect::<Result<Vec<_>>>()?;
                output.push_str("(?:");
                output.push_str(&regex_alternatives.join("|"));
                output.push(')');
            }
            Token::Escaped(c) => output.push_str(&regex_escape_char(c)),
            Token::Char(c) => output.push_str(&regex_escape_char(c)),
            Token::Dot => output.push_str("\\."),
            other => output.push_str(&regex_escape_char(
                tokens_to_string(&[other]).chars().next().unwrap_or(' '),
            )),
        }
    }

    Ok(format!("^{}$", output))
}

/// Regex matching exactly the unescaped literal text of `pattern`; the
/// fallback when translation fails, keeping matcher construction total.
pub fn literal_regex(pattern: &str) -> String {
    let mut literal = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                literal.push(next);
                continue;
            }
        }
        literal.push(c);
    }
    format!("^{}$", regex::escape(&literal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    fn matches(pattern: &str, text: &str) -> bool {
        Regex::new(&to_regex(pattern).unwrap())
            .unwrap()
            .is_match(text)
    }

    #[test]
    fn stars_stay_inside_a_segment() {
        assert!(matches("*.log", "app.log"));
        assert!(matches("*.log", ".hidden.log"));
        assert!(!matches("*.log", "sub/app.log"));
        assert!(matches("file?.txt", "file1.txt"));
        assert!(!matches("file?.txt", "file/.txt"));
    }

    #[test]
    fn globstar_spans_zero_or_more_levels() {
        assert!(matches("/var/log/**/*.log", "/var/log/app.log"));
        assert!(matches("/var/log/**/*.log", "/var/log/a/b/app.log"));
        assert!(!matches("/var/log/**/*.log", "/var/log/a/b/app.txt"));
        assert!(matches("/srv/**", "/srv/deep/file"));
    }

    #[test]
    fn groups_and_classes() {
        assert!(matches("(bar|baz)", "bar"));
        assert!(!matches("(bar|baz)", "bax"));
        assert!(matches("@(a|b)c", "ac"));
        assert!(matches("file[0-9].txt", "file3.txt"));
        assert!(matches("[!a]x", "bx"));
        assert!(!matches("[!a]x", "ax"));
    }

    #[test]
    fn braces_expand_to_alternation() {
        assert!(matches("file.{txt,md}", "file.txt"));
        assert!(matches("file.{txt,md}", "file.md"));
        assert!(!matches("file.{txt,md}", "file.rs"));
    }

    #[test]
    fn escapes_are_literal() {
        assert!(matches("a\\(b\\)", "a(b)"));
        assert!(!matches("a\\(b\\)", "ab"));
    }

    #[test]
    fn unbalanced_input_errors_and_literal_fallback_holds() {
        assert!(to_regex("foo[bar").is_err());
        let re = Regex::new(&literal_regex("foo[bar")).unwrap();
        assert!(re.is_match("foo[bar"));
    }
}
