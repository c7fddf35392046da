/// A unit produced by [`tokenize`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A word with its quotes removed
    Word(String),
    /// A control operator (`&&`, `||`, `|`, `;`, `&`) or a grouping
    /// character (`(`, `)`, backtick) that starts a new command position
    Operator(String),
}

impl Token {
    pub fn as_word(&self) -> Option<&str> {
        match self {
            Token::Word(word) => Some(word),
            Token::Operator(_) => None,
        }
    }

    pub fn is_operator(&self) -> bool {
        matches!(self, Token::Operator(_))
    }
}

/// Split a compound command into its independently scheduled subcommands.
///
/// Splits on `&&`, `||`, `;`, `|`, `&` and newlines outside of quotes.
/// Redirections such as `2>&1` and `&>` are kept intact.
pub fn split_into_subcommands(command: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = command.chars().peekable();

    while let Some(ch) = chars.next() {
        if let Some(open) = quote {
            current.push(ch);
            if ch == open {
                quote = None;
            } else if ch == '\\' && open == '"' {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            continue;
        }

        match ch {
            '\'' | '"' => {
                quote = Some(ch);
                current.push(ch);
            }
            '\\' => {
                current.push(ch);
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            '&' if is_redirection_ampersand(&current, chars.peek().copied()) => {
                current.push(ch);
            }
            ';' | '\n' => flush(&mut parts, &mut current),
            '|' | '&' => {
                if chars.peek() == Some(&ch) {
                    chars.next();
                }
                flush(&mut parts, &mut current);
            }
            _ => current.push(ch),
        }
    }

    flush(&mut parts, &mut current);
    parts
}

/// Split a command into words and operators.
///
/// Quotes are removed from words. Operators inside quotes are part of the
/// word. Newlines are reported as `;`.
pub fn tokenize(command: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = command.chars().peekable();

    while let Some(ch) = chars.next() {
        if let Some(open) = quote {
            if ch == open {
                quote = None;
            } else if ch == '\\' && open == '"' {
                word.push(chars.next().unwrap_or(ch));
            } else {
                word.push(ch);
            }
            continue;
        }

        match ch {
            '\'' | '"' => {
                quote = Some(ch);
                in_word = true;
            }
            '\\' => {
                if let Some(escaped) = chars.next() {
                    word.push(escaped);
                }
                in_word = true;
            }
            c if c.is_whitespace() && c != '\n' => {
                end_word(&mut tokens, &mut word, &mut in_word);
            }
            '&' if is_redirection_ampersand(&word, chars.peek().copied()) => {
                word.push(ch);
                in_word = true;
            }
            '|' | '&' => {
                end_word(&mut tokens, &mut word, &mut in_word);
                let mut op = ch.to_string();
                if chars.peek() == Some(&ch) {
                    chars.next();
                    op.push(ch);
                }
                tokens.push(Token::Operator(op));
            }
            ';' | '\n' => {
                end_word(&mut tokens, &mut word, &mut in_word);
                tokens.push(Token::Operator(";".to_string()));
            }
            '(' | ')' | '`' => {
                end_word(&mut tokens, &mut word, &mut in_word);
                tokens.push(Token::Operator(ch.to_string()));
            }
            _ => {
                word.push(ch);
                in_word = true;
            }
        }
    }

    end_word(&mut tokens, &mut word, &mut in_word);
    tokens
}

/// `&` belongs to a redirection in `2>&1`, `>&2` and `&>file`
fn is_redirection_ampersand(preceding: &str, next: Option<char>) -> bool {
    preceding.ends_with('>') || preceding.ends_with('<') || next == Some('>')
}

fn flush(parts: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        parts.push(trimmed.to_string());
    }
    current.clear();
}

fn end_word(tokens: &mut Vec<Token>, word: &mut String, in_word: &mut bool) {
    if *in_word {
        tokens.push(Token::Word(std::mem::take(word)));
        *in_word = false;
    }
}
