/// Splits a directive argument string into words the way a POSIX shell would: whitespace
/// separates words, single quotes keep everything literal, double quotes keep whitespace and
/// honour `\"` and `\\`, a bare backslash escapes the next character.
///
/// Unterminated quotes are closed at the end of the input.
pub fn split_words(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                for quoted in chars.by_ref() {
                    if quoted == '\'' {
                        break;
                    }
                    current.push(quoted);
                }
            }
            '"' => {
                in_word = true;
                while let Some(quoted) = chars.next() {
                    match quoted {
                        '"' => break,
                        '\\' if matches!(chars.peek(), Some('"') | Some('\\')) => {
                            if let Some(escaped) = chars.next() {
                                current.push(escaped);
                            }
                        }
                        other => current.push(other),
                    }
                }
            }
            '\\' => {
                in_word = true;
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            other => {
                in_word = true;
                current.push(other);
            }
        }
    }

    if in_word {
        words.push(current);
    }
    words
}

/// Quotes a word so that `split_words` returns it unchanged.
pub fn quote_word(word: &str) -> String {
    let safe = !word.is_empty()
        && word.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | '=' | ',' | '@' | '%' | '+' | '{' | '}'));

    if safe {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', "'\\''"))
}

/// Joins words into one shell command line.
pub fn join_words(words: &[String]) -> String {
    words.iter().map(|word| quote_word(word)).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_plain_words() {
        assert_eq!(split_words("  -N 2   --exclusive "), vec!["-N", "2", "--exclusive"]);
    }

    #[test]
    fn test_split_respects_quotes() {
        assert_eq!(split_words(r#"--job-name="my job" --env='A=b c'"#), vec!["--job-name=my job", "--env=A=b c"]);
        assert_eq!(split_words(r#"say "a \"quoted\" word""#), vec!["say", r#"a "quoted" word"#]);
        assert_eq!(split_words("''"), vec![""]);
    }

    #[test]
    fn test_quote_word_survives_split() {
        let words = vec!["echo".to_string(), "hello world".to_string(), "it's".to_string()];
        assert_eq!(split_words(&join_words(&words)), words);
    }
}
