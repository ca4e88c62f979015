//! The Expression Evaluator
//!
//! Tclua expressions are lexed into tokens and then parsed and evaluated in a single
//! precedence-climbing pass.  From lowest to highest precedence:
//!
//! | Level | Operators              | Notes                                 |
//! |-------|------------------------|---------------------------------------|
//! | 1     | `\|\|`                 | short-circuit, yields a boolean       |
//! | 2     | `&&`                   | short-circuit, yields a boolean       |
//! | 3     | `==` `!=`              |                                       |
//! | 4     | `<` `>` `<=` `>=`      |                                       |
//! | 5     | `\|`                   | bitwise or                            |
//! | 6     | `~`                    | bitwise xor (binary position)         |
//! | 7     | `&`                    | bitwise and                           |
//! | 8     | `<<` `>>`              |                                       |
//! | 9     | `+` `-`                | `+` on a string concatenates          |
//! | 10    | `*` `/` `%`            |                                       |
//! | 11    | `!` `~` `-`            | unary                                 |
//! | 12    | `^`                    | power, right-associative              |
//!
//! Power binds tighter than the unary operators, so `-2^2` is `-4`.
//!
//! Primary terms are numeric literals, quoted strings (with `$var` and `[cmd]`
//! substitution), brace literals (returned verbatim), bracketed commands, `$variable`
//! references, the words `true` and `false`, other bare words (as strings), and
//! parenthesized sub-expressions.
//!
//! While the right side of a short-circuited `&&` or `||` is being parsed, evaluation is
//! suppressed: no variables are read and no commands run.

use crate::interp::Interp;
use crate::tokenizer::strip_braces;
use crate::types::InterpError;
use crate::types::TcluaResult;
use crate::value::Value;

/// Expression operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    BitOr,
    Tilde,
    BitAnd,
    Shl,
    Shr,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Not,
    Pow,
    LParen,
    RParen,
}

impl Op {
    fn symbol(self) -> &'static str {
        match self {
            Op::Or => "||",
            Op::And => "&&",
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Gt => ">",
            Op::Le => "<=",
            Op::Ge => ">=",
            Op::BitOr => "|",
            Op::Tilde => "~",
            Op::BitAnd => "&",
            Op::Shl => "<<",
            Op::Shr => ">>",
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Mod => "%",
            Op::Not => "!",
            Op::Pow => "^",
            Op::LParen => "(",
            Op::RParen => ")",
        }
    }

    /// The precedence of the operator in binary position, if it has one.
    fn binary_precedence(self) -> Option<u8> {
        match self {
            Op::Or => Some(1),
            Op::And => Some(2),
            Op::Eq | Op::Ne => Some(3),
            Op::Lt | Op::Gt | Op::Le | Op::Ge => Some(4),
            Op::BitOr => Some(5),
            Op::Tilde => Some(6),
            Op::BitAnd => Some(7),
            Op::Shl | Op::Shr => Some(8),
            Op::Add | Op::Sub => Some(9),
            Op::Mul | Op::Div | Op::Mod => Some(10),
            Op::Not | Op::Pow | Op::LParen | Op::RParen => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Op(Op),
    Var(String),
    Quoted(String),
    Word(String),
    Brace(String),
    Bracket(String),
    End,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => Value::from(*n).to_string(),
            Token::Op(op) => op.symbol().to_string(),
            Token::Var(name) => format!("${}", name),
            Token::Quoted(s) => format!("\"{}\"", s),
            Token::Word(w) => w.clone(),
            Token::Brace(s) => format!("{{{}}}", s),
            Token::Bracket(s) => format!("[{}]", s),
            Token::End => "end of expression".to_string(),
        }
    }
}

/// Evaluates an expression string in the context of the interpreter.
pub(crate) fn evaluate(interp: &mut Interp, expr: &str) -> TcluaResult {
    let tokens = lex(expr)?;
    let mut parser = ExprParser {
        interp,
        tokens,
        pos: 0,
        no_eval: 0,
    };

    let value = parser.parse_binary(1)?;

    match parser.peek() {
        Token::End => Ok(value),
        token => Err(InterpError::syntax(format!(
            "Unexpected token: {}",
            token.describe()
        ))),
    }
}

/// Evaluates a condition for `if`, `while` and `for`, stripping one level of braces.
pub(crate) fn evaluate_condition(interp: &mut Interp, cond: &str) -> Result<bool, InterpError> {
    Ok(evaluate(interp, strip_braces(cond))?.is_truthy())
}

struct ExprParser<'a> {
    interp: &'a mut Interp,
    tokens: Vec<Token>,
    pos: usize,
    no_eval: usize,
}

impl<'a> ExprParser<'a> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn next(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn evaluating(&self) -> bool {
        self.no_eval == 0
    }

    fn parse_binary(&mut self, min_prec: u8) -> TcluaResult {
        let mut left = self.parse_unary()?;

        loop {
            let (op, prec) = match self.peek() {
                Token::Op(op) => match op.binary_precedence() {
                    Some(prec) if prec >= min_prec => (*op, prec),
                    _ => break,
                },
                _ => break,
            };
            self.next();

            if op == Op::And || op == Op::Or {
                let decided = self.evaluating()
                    && (if op == Op::And {
                        !left.is_truthy()
                    } else {
                        left.is_truthy()
                    });

                if decided {
                    self.no_eval += 1;
                }
                let right = self.parse_binary(prec + 1);
                if decided {
                    self.no_eval -= 1;
                }
                let right = right?;

                left = if !self.evaluating() {
                    Value::Null
                } else if decided {
                    Value::Boolean(op == Op::Or)
                } else {
                    Value::Boolean(right.is_truthy())
                };
                continue;
            }

            let right = self.parse_binary(prec + 1)?;
            left = if self.evaluating() {
                apply_binary(op, &left, &right)?
            } else {
                Value::Null
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> TcluaResult {
        let op = match self.peek() {
            Token::Op(op @ (Op::Not | Op::Tilde | Op::Sub)) => *op,
            _ => return self.parse_power(),
        };
        self.next();

        let operand = self.parse_unary()?;
        if !self.evaluating() {
            return Ok(Value::Null);
        }

        match op {
            Op::Not => Ok(Value::Boolean(!operand.is_truthy())),
            Op::Tilde => Ok(Value::from((!integer_operand(op, &operand)?) as f64)),
            _ => match operand {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(InterpError::type_mismatch(format!(
                    "Unary '-' requires a number, got {}",
                    operand.type_name()
                ))),
            },
        }
    }

    fn parse_power(&mut self) -> TcluaResult {
        let base = self.parse_primary()?;

        if self.peek() != &Token::Op(Op::Pow) {
            return Ok(base);
        }
        self.next();

        // Right-associative; the exponent may itself be negated.
        let exponent = self.parse_unary()?;

        if self.evaluating() {
            apply_binary(Op::Pow, &base, &exponent)
        } else {
            Ok(Value::Null)
        }
    }

    fn parse_primary(&mut self) -> TcluaResult {
        match self.next() {
            Token::Number(n) => Ok(Value::Number(n)),
            Token::Var(name) => {
                if self.evaluating() {
                    self.interp.var(&name)
                } else {
                    Ok(Value::Null)
                }
            }
            Token::Quoted(raw) => {
                if self.evaluating() {
                    Ok(Value::from(substitute(self.interp, &raw)?))
                } else {
                    Ok(Value::Null)
                }
            }
            Token::Word(word) => match word.as_str() {
                "true" => Ok(Value::Boolean(true)),
                "false" => Ok(Value::Boolean(false)),
                _ => Ok(Value::from(word)),
            },
            Token::Brace(text) => Ok(Value::from(text)),
            Token::Bracket(script) => {
                if self.evaluating() {
                    self.interp.eval_substitution(&script)
                } else {
                    Ok(Value::Null)
                }
            }
            Token::Op(Op::LParen) => {
                let value = self.parse_binary(1)?;
                if self.peek() != &Token::Op(Op::RParen) {
                    return Err(InterpError::syntax("Expected ')'"));
                }
                self.next();
                Ok(value)
            }
            Token::End => Err(InterpError::syntax("Unexpected end of expression")),
            token => Err(InterpError::syntax(format!(
                "Unexpected token: {}",
                token.describe()
            ))),
        }
    }
}

//-----------------------------------------------------------------------------------------
// Operators

fn apply_binary(op: Op, left: &Value, right: &Value) -> TcluaResult {
    match op {
        Op::Add => {
            if let Value::String(s) = left {
                let mut out = s.to_string();
                out.push_str(&right.to_string());
                return Ok(Value::from(out));
            }
            let (l, r) = numeric_operands(op, left, right)?;
            Ok(Value::Number(l + r))
        }
        Op::Sub => {
            if left.is_string() {
                return Err(InterpError::runtime("Cannot subtract from a string"));
            }
            let (l, r) = numeric_operands(op, left, right)?;
            Ok(Value::Number(l - r))
        }
        Op::Mul => {
            let (l, r) = numeric_operands(op, left, right)?;
            Ok(Value::Number(l * r))
        }
        Op::Div => {
            let (l, r) = numeric_operands(op, left, right)?;
            if r == 0.0 {
                return Err(InterpError::division_by_zero());
            }
            Ok(Value::Number(l / r))
        }
        Op::Mod => {
            let (l, r) = numeric_operands(op, left, right)?;
            if r == 0.0 {
                return Err(InterpError::division_by_zero());
            }
            Ok(Value::Number(l % r))
        }
        Op::Pow => {
            let (l, r) = numeric_operands(op, left, right)?;
            Ok(Value::Number(l.powf(r)))
        }
        Op::Eq => Ok(Value::Boolean(values_equal(left, right))),
        Op::Ne => Ok(Value::Boolean(!values_equal(left, right))),
        Op::Lt | Op::Gt | Op::Le | Op::Ge => {
            let ordering = compare(op, left, right)?;
            Ok(Value::Boolean(match op {
                Op::Lt => ordering.is_lt(),
                Op::Gt => ordering.is_gt(),
                Op::Le => ordering.is_le(),
                _ => ordering.is_ge(),
            }))
        }
        Op::BitOr | Op::Tilde | Op::BitAnd | Op::Shl | Op::Shr => {
            let l = integer_operand(op, left)?;
            let r = integer_operand(op, right)?;
            let result = match op {
                Op::BitOr => l | r,
                Op::Tilde => l ^ r,
                Op::BitAnd => l & r,
                _ => {
                    if !(0..64).contains(&r) {
                        return Err(InterpError::runtime(format!(
                            "shift count out of range: {}",
                            r
                        )));
                    }
                    if op == Op::Shl {
                        l << r
                    } else {
                        l >> r
                    }
                }
            };
            Ok(Value::from(result as f64))
        }
        _ => Err(InterpError::syntax(format!(
            "Unexpected operator: {}",
            op.symbol()
        ))),
    }
}

fn numeric_operands(op: Op, left: &Value, right: &Value) -> Result<(f64, f64), InterpError> {
    let l = left.as_number().ok_or_else(|| operand_error(op, "left", left))?;
    let r = right.as_number().ok_or_else(|| operand_error(op, "right", right))?;
    Ok((l, r))
}

fn operand_error(op: Op, side: &str, value: &Value) -> InterpError {
    InterpError::type_mismatch(format!(
        "{} operand of '{}' must be a number, got {}",
        side,
        op.symbol(),
        value.type_name()
    ))
}

fn integer_operand(op: Op, value: &Value) -> Result<i64, InterpError> {
    match value.as_number() {
        Some(n) if n.fract() == 0.0 && n.is_finite() => Ok(n as i64),
        _ => Err(InterpError::type_mismatch(format!(
            "operands of '{}' must be integers, got \"{}\"",
            op.symbol(),
            value
        ))),
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Table(a), Value::Table(b)) => a == b,
        (Value::Table(_), _) | (_, Value::Table(_)) => false,
        (Value::Null, Value::Null) => true,
        _ => match (left.as_number(), right.as_number()) {
            (Some(l), Some(r)) => l == r,
            _ => left.to_string() == right.to_string(),
        },
    }
}

fn compare(op: Op, left: &Value, right: &Value) -> Result<std::cmp::Ordering, InterpError> {
    if let (Value::Table(_), _) | (_, Value::Table(_)) = (left, right) {
        return Err(InterpError::type_mismatch(format!(
            "cannot compare tables with '{}'",
            op.symbol()
        )));
    }

    match (left.as_number(), right.as_number()) {
        (Some(l), Some(r)) => Ok(l.partial_cmp(&r).unwrap_or(std::cmp::Ordering::Equal)),
        _ => Ok(left.to_string().cmp(&right.to_string())),
    }
}

//-----------------------------------------------------------------------------------------
// Lexer

fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !"+-*/%^()=<>!&|~$\"{}[]".contains(c)
}

/// Scans a variable name starting at `pos` (just past the `$`).  Parentheses must
/// balance, and a `.` or `::` is part of the name only when a name character follows.
/// Returns the name and the position after it.
pub(crate) fn scan_var_name(chars: &[char], mut pos: usize) -> (String, usize) {
    if pos < chars.len() && chars[pos] == '{' {
        let start = pos + 1;
        let mut end = start;
        while end < chars.len() && chars[end] != '}' {
            end += 1;
        }
        let name: String = chars[start..end].iter().collect();
        return (name, (end + 1).min(chars.len()));
    }

    let start = pos;
    let mut depth = 0;

    while pos < chars.len() {
        let c = chars[pos];
        if c.is_alphanumeric() || c == '_' {
            pos += 1;
        } else if c == '.' && starts_name(chars, pos + 1) {
            pos += 1;
        } else if c == ':' && chars.get(pos + 1) == Some(&':') && starts_name(chars, pos + 2) {
            pos += 2;
        } else if c == '(' {
            depth += 1;
            pos += 1;
        } else if c == ')' && depth > 0 {
            depth -= 1;
            pos += 1;
        } else {
            break;
        }
    }

    (chars[start..pos].iter().collect(), pos)
}

fn starts_name(chars: &[char], pos: usize) -> bool {
    chars
        .get(pos)
        .map_or(false, |c| c.is_alphanumeric() || *c == '_')
}

/// Scans a group delimited by `open`/`close` starting at the opening character,
/// returning the inner text, the position after the group, and whether the group was
/// closed.
fn scan_group(chars: &[char], pos: usize, open: char, close: char) -> (String, usize, bool) {
    let mut depth = 1;
    let mut end = pos + 1;

    while end < chars.len() {
        let c = chars[end];
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                let inner = chars[pos + 1..end].iter().collect();
                return (inner, end + 1, true);
            }
        }
        end += 1;
    }

    let end = end.min(chars.len());
    (chars[pos + 1..end].iter().collect(), end, false)
}

fn lex(expr: &str) -> Result<Vec<Token>, InterpError> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];
        let next = chars.get(pos + 1).copied();

        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && next.is_some_and(|n| n.is_ascii_digit())) {
            let start = pos;
            while pos < chars.len() {
                let ch = chars[pos];
                let signed_exponent = (ch == '+' || ch == '-')
                    && matches!(chars[pos - 1], 'e' | 'E')
                    && chars[start..pos - 1].iter().all(|d| d.is_ascii_digit() || *d == '.');
                if ch.is_alphanumeric() || ch == '.' || ch == '_' || signed_exponent {
                    pos += 1;
                } else {
                    break;
                }
            }
            let text: String = chars[start..pos].iter().collect();
            let number = text
                .parse::<f64>()
                .map_err(|_| InterpError::syntax(format!("Invalid number: {}", text)))?;
            tokens.push(Token::Number(number));
            continue;
        }

        let two = next.map(|n| [c, n]);
        let double = match two {
            Some(['|', '|']) => Some(Op::Or),
            Some(['&', '&']) => Some(Op::And),
            Some(['=', '=']) => Some(Op::Eq),
            Some(['!', '=']) => Some(Op::Ne),
            Some(['<', '=']) => Some(Op::Le),
            Some(['>', '=']) => Some(Op::Ge),
            Some(['<', '<']) => Some(Op::Shl),
            Some(['>', '>']) => Some(Op::Shr),
            _ => None,
        };
        if let Some(op) = double {
            tokens.push(Token::Op(op));
            pos += 2;
            continue;
        }

        let single = match c {
            '|' => Some(Op::BitOr),
            '&' => Some(Op::BitAnd),
            '<' => Some(Op::Lt),
            '>' => Some(Op::Gt),
            '!' => Some(Op::Not),
            '~' => Some(Op::Tilde),
            '+' => Some(Op::Add),
            '-' => Some(Op::Sub),
            '*' => Some(Op::Mul),
            '/' => Some(Op::Div),
            '%' => Some(Op::Mod),
            '^' => Some(Op::Pow),
            '(' => Some(Op::LParen),
            ')' => Some(Op::RParen),
            _ => None,
        };
        if let Some(op) = single {
            tokens.push(Token::Op(op));
            pos += 1;
            continue;
        }

        match c {
            '$' => {
                let (name, end) = scan_var_name(&chars, pos + 1);
                if name.is_empty() {
                    tokens.push(Token::Word("$".to_string()));
                    pos += 1;
                } else {
                    tokens.push(Token::Var(name));
                    pos = end;
                }
            }
            '"' => {
                let start = pos + 1;
                let mut end = start;
                while end < chars.len() && chars[end] != '"' {
                    end += if chars[end] == '\\' { 2 } else { 1 };
                }
                let end = end.min(chars.len());
                tokens.push(Token::Quoted(chars[start..end].iter().collect()));
                pos = (end + 1).min(chars.len());
            }
            '{' => {
                let (inner, end, _) = scan_group(&chars, pos, '{', '}');
                tokens.push(Token::Brace(inner));
                pos = end;
            }
            '[' => {
                let (inner, end, _) = scan_group(&chars, pos, '[', ']');
                tokens.push(Token::Bracket(inner));
                pos = end;
            }
            '=' => {
                return Err(InterpError::syntax("Unexpected character: ="));
            }
            _ => {
                let start = pos;
                while pos < chars.len() && is_word_char(chars[pos]) {
                    pos += 1;
                }
                if pos == start {
                    return Err(InterpError::syntax(format!("Unexpected character: {}", c)));
                }
                tokens.push(Token::Word(chars[start..pos].iter().collect()));
            }
        }
    }

    tokens.push(Token::End);
    Ok(tokens)
}

//-----------------------------------------------------------------------------------------
// String substitution

/// Decodes the body of a quoted string literal: backslash escapes are translated and
/// `$var`, `${var}` and `[command]` are replaced by their values.
pub(crate) fn substitute(interp: &mut Interp, raw: &str) -> Result<String, InterpError> {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::new();
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];
        match c {
            '\\' if pos + 1 < chars.len() => {
                out.push(match chars[pos + 1] {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => other,
                });
                pos += 2;
            }
            '$' => {
                let (name, end) = scan_var_name(&chars, pos + 1);
                if name.is_empty() {
                    out.push('$');
                    pos += 1;
                } else {
                    out.push_str(&interp.var(&name)?.to_string());
                    pos = end;
                }
            }
            '[' => {
                let (script, end, closed) = scan_group(&chars, pos, '[', ']');
                if !closed {
                    return Err(InterpError::syntax("missing close-bracket"));
                }
                out.push_str(&interp.eval_substitution(&script)?.to_string());
                pos = end;
            }
            _ => {
                out.push(c);
                pos += 1;
            }
        }
    }

    Ok(out)
}
