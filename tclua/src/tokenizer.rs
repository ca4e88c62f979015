//! The Tclua Tokenizer
//!
//! Tclua scripts are processed in two stages before evaluation.  [`split_commands`]
//! breaks a script into commands, each tagged with the source line on which it begins;
//! then [`tokenize`] breaks a single command into raw words.
//!
//! The tokenizer scans character by character rather than splitting on whitespace, so
//! that grouped words survive intact:
//!
//! * `"..."` is one word, quotes retained.  Backslash escapes are recognized (an
//!   escaped quote doesn't end the word) but copied verbatim; they are decoded when the
//!   string literal is evaluated.
//! * `{...}` is one word, braces retained, with nesting tracked.
//! * `[...]` is one word, brackets retained, with nesting tracked; it is executed as a
//!   nested command when the word is evaluated.
//! * `$name`, `${name}` and `$name.field`/`$name(field)` form one word beginning with `$`.
//! * Any other run of non-space characters is a bare word.
//!
//! An unterminated group consumes the rest of the input.  No substitution happens here;
//! words are expanded downstream, by the expression evaluator.
//!
//! ```
//! use tclua::tokenizer::tokenize;
//!
//! assert_eq!(tokenize("set x \"a b\""), vec!["set", "x", "\"a b\""]);
//! assert_eq!(tokenize("{a {b} c}"), vec!["{a {b} c}"]);
//! ```

/// A command extracted from a script, with the 1-based line on which it begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandText {
    pub line: usize,
    pub text: String,
}

/// Returns true for characters allowed in a `$name` variable reference.
pub fn is_var_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '(' || c == ')' || c == '.' || c == ':'
}

/// Splits a line of script text into raw word tokens.
pub fn tokenize(input: &str) -> Vec<String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];

        match c {
            '"' => {
                current.push(c);
                pos += 1;
                while pos < chars.len() && chars[pos] != '"' {
                    if chars[pos] == '\\' && pos + 1 < chars.len() {
                        current.push(chars[pos]);
                        pos += 1;
                    }
                    current.push(chars[pos]);
                    pos += 1;
                }
                if pos < chars.len() {
                    current.push(chars[pos]);
                    pos += 1;
                }
                tokens.push(std::mem::take(&mut current));
            }
            '{' | '[' => {
                let (open, close) = if c == '{' { ('{', '}') } else { ('[', ']') };
                let mut depth = 1;
                current.push(c);
                pos += 1;

                while pos < chars.len() && depth > 0 {
                    let ch = chars[pos];
                    current.push(ch);

                    if ch == open {
                        depth += 1;
                    } else if ch == close {
                        depth -= 1;
                    }
                    pos += 1;
                }
                tokens.push(std::mem::take(&mut current));
            }
            '$' => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                current.push(c);
                pos += 1;

                if pos < chars.len() && chars[pos] == '{' {
                    while pos < chars.len() && chars[pos] != '}' {
                        current.push(chars[pos]);
                        pos += 1;
                    }
                    if pos < chars.len() {
                        current.push('}');
                        pos += 1;
                    }
                } else {
                    while pos < chars.len() && is_var_char(chars[pos]) {
                        current.push(chars[pos]);
                        pos += 1;
                    }
                }
                tokens.push(std::mem::take(&mut current));
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                pos += 1;
            }
            _ => {
                current.push(c);
                pos += 1;
            }
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

/// Splits a script into commands.  A command ends at a newline or semicolon that isn't
/// inside braces, brackets or quotes.  A `#` where a command would begin starts a
/// comment that runs to the end of the line.  Blank commands are dropped.
///
/// Line numbers are 1-based and relative to the start of `script`.
pub fn split_commands(script: &str) -> Vec<CommandText> {
    let mut commands = Vec::new();
    let mut current = String::new();
    let mut line = 1;
    let mut start_line = 1;
    let mut braces = 0usize;
    let mut brackets = 0usize;
    let mut in_quote = false;
    let mut chars = script.chars().peekable();

    while let Some(c) = chars.next() {
        let at_start = current.trim().is_empty();

        if at_start && c == '#' && braces == 0 && brackets == 0 && !in_quote {
            while let Some(&next) = chars.peek() {
                if next == '\n' {
                    break;
                }
                chars.next();
            }
            current.clear();
            continue;
        }

        if at_start && !c.is_whitespace() {
            start_line = line;
        }

        match c {
            '\\' if braces == 0 => {
                current.push(c);
                if let Some(next) = chars.next() {
                    if next == '\n' {
                        line += 1;
                    }
                    current.push(next);
                }
                continue;
            }
            '\n' => {
                if braces == 0 && brackets == 0 && !in_quote {
                    push_command(&mut commands, &mut current, start_line);
                } else {
                    current.push(c);
                }
                line += 1;
                continue;
            }
            ';' if braces == 0 && brackets == 0 && !in_quote => {
                push_command(&mut commands, &mut current, start_line);
                continue;
            }
            '"' if braces == 0 && brackets == 0 => in_quote = !in_quote,
            '{' if !in_quote => braces += 1,
            '}' if !in_quote => braces = braces.saturating_sub(1),
            '[' if braces == 0 && !in_quote => brackets += 1,
            ']' if braces == 0 && !in_quote => brackets = brackets.saturating_sub(1),
            _ => {}
        }

        current.push(c);
    }

    push_command(&mut commands, &mut current, start_line);
    commands
}

/// Returns true if the script has no unterminated quote, brace or bracket, i.e., if it
/// could be evaluated as it stands.
pub fn is_complete(script: &str) -> bool {
    let mut braces = 0usize;
    let mut brackets = 0usize;
    let mut in_quote = false;
    let mut chars = script.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' if braces == 0 => {
                chars.next();
            }
            '"' if braces == 0 && brackets == 0 => in_quote = !in_quote,
            '{' if !in_quote => braces += 1,
            '}' if !in_quote => braces = braces.saturating_sub(1),
            '[' if braces == 0 && !in_quote => brackets += 1,
            ']' if braces == 0 && !in_quote => brackets = brackets.saturating_sub(1),
            _ => {}
        }
    }

    braces == 0 && brackets == 0 && !in_quote
}

/// Given a command's text and the words [`tokenize`] produced from it, returns the
/// number of newlines that precede each word.  Control commands use this to number the
/// lines of bodies that don't begin on the command's first line.
pub fn word_line_offsets(text: &str, words: &[String]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(words.len());
    let mut pos = 0;
    let mut newlines = 0;

    for word in words {
        match text[pos..].find(word.as_str()) {
            Some(i) => {
                newlines += text[pos..pos + i].matches('\n').count();
                offsets.push(newlines);
                newlines += word.matches('\n').count();
                pos += i + word.len();
            }
            None => offsets.push(newlines),
        }
    }

    offsets
}

fn push_command(commands: &mut Vec<CommandText>, current: &mut String, line: usize) {
    let text = current.trim();
    if !text.is_empty() {
        commands.push(CommandText {
            line,
            text: text.to_string(),
        });
    }
    current.clear();
}

/// Strips one level of enclosing braces, if present.
pub fn strip_braces(word: &str) -> &str {
    strip_pair(word, '{', '}')
}

/// Strips one level of enclosing brackets, if present.
pub fn strip_brackets(word: &str) -> &str {
    strip_pair(word, '[', ']')
}

fn strip_pair(word: &str, open: char, close: char) -> &str {
    if word.len() >= 2 && word.starts_with(open) && word.ends_with(close) {
        &word[1..word.len() - 1]
    } else {
        word
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_word() {
        assert_eq!(tokenize("set x \"a b\""), vec!["set", "x", "\"a b\""]);
        assert_eq!(tokenize("puts \"a\\\"b\""), vec!["puts", "\"a\\\"b\""]);
    }

    #[test]
    fn test_unterminated_quote() {
        assert_eq!(tokenize("puts \"abc def"), vec!["puts", "\"abc def"]);
    }

    #[test]
    fn test_braced_word() {
        assert_eq!(tokenize("{a {b} c}"), vec!["{a {b} c}"]);
        assert_eq!(
            tokenize("if {$x > 1} {puts $x}"),
            vec!["if", "{$x > 1}", "{puts $x}"]
        );
        assert_eq!(tokenize("x {a \\} b}"), vec!["x", "{a \\}", "b}"]);
        assert_eq!(
            tokenize("set p {C:\\dir\\} ; puts x"),
            vec!["set", "p", "{C:\\dir\\}", ";", "puts", "x"]
        );
        assert_eq!(tokenize("x {a {b"), vec!["x", "{a {b"]);
    }

    #[test]
    fn test_bracketed_word() {
        assert_eq!(
            tokenize("set y [expr $x * [f 2]]"),
            vec!["set", "y", "[expr $x * [f 2]]"]
        );
    }

    #[test]
    fn test_variables() {
        assert_eq!(tokenize("puts $x"), vec!["puts", "$x"]);
        assert_eq!(tokenize("puts ${my var}"), vec!["puts", "${my var}"]);
        assert_eq!(tokenize("puts $p.name"), vec!["puts", "$p.name"]);
        assert_eq!(tokenize("puts $p(age)"), vec!["puts", "$p(age)"]);
        assert_eq!(tokenize("puts $m::version"), vec!["puts", "$m::version"]);
        assert_eq!(tokenize("a$b"), vec!["a", "$b"]);
        assert_eq!(tokenize("$x+1"), vec!["$x", "+1"]);
    }

    #[test]
    fn test_whitespace() {
        assert_eq!(tokenize("   set \t x   1  "), vec!["set", "x", "1"]);
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn test_split_commands() {
        let cmds = split_commands("set a 1\nset b 2; set c 3\n\n  puts $a");
        let texts: Vec<&str> = cmds.iter().map(|c| c.text.as_str()).collect();
        let lines: Vec<usize> = cmds.iter().map(|c| c.line).collect();
        assert_eq!(texts, vec!["set a 1", "set b 2", "set c 3", "puts $a"]);
        assert_eq!(lines, vec![1, 2, 2, 4]);
    }

    #[test]
    fn test_split_multiline_body() {
        let script = "proc add {a b} {\n    return [expr $a + $b]\n}\nputs [add 1 2]";
        let cmds = split_commands(script);
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[0].line, 1);
        assert!(cmds[0].text.ends_with('}'));
        assert_eq!(cmds[1].line, 4);
        assert_eq!(cmds[1].text, "puts [add 1 2]");
    }

    #[test]
    fn test_split_quotes_and_comments() {
        let cmds = split_commands("# a comment\nputs \"a; b\"\n  # another\nputs x");
        let texts: Vec<&str> = cmds.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["puts \"a; b\"", "puts x"]);
        assert_eq!(cmds[0].line, 2);
        assert_eq!(cmds[1].line, 4);
    }

    #[test]
    fn test_is_complete() {
        assert!(is_complete("abc"));
        assert!(is_complete("a {bc} [def] \"ghi\" xyz"));
        assert!(is_complete("puts \"{\""));

        assert!(!is_complete("a {bc"));
        assert!(!is_complete("a [bc"));
        assert!(!is_complete("a \"bc"));
        assert!(!is_complete("proc f {} {\n  puts x\n"));

        // Backslashes have no effect inside braces.
        assert!(is_complete("set p {C:\\dir\\}"));
    }

    #[test]
    fn test_split_backslash_in_braces() {
        let cmds = split_commands("set p {C:\\dir\\}\nputs x");
        let texts: Vec<&str> = cmds.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["set p {C:\\dir\\}", "puts x"]);
    }

    #[test]
    fn test_word_line_offsets() {
        let text = "if {$x} {\n  puts a\n} else {\n  puts b\n}";
        let words = tokenize(text);
        assert_eq!(words.len(), 5);
        assert_eq!(word_line_offsets(text, &words), vec![0, 0, 0, 2, 2]);
    }

    #[test]
    fn test_strip() {
        assert_eq!(strip_braces("{a b}"), "a b");
        assert_eq!(strip_braces("ab"), "ab");
        assert_eq!(strip_braces("{"), "{");
        assert_eq!(strip_brackets("[f x]"), "f x");
    }
}
