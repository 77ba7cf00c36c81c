//! A small shunting-yard parser and tree-walk evaluator for the fixed operator set
//! `+ - * / & ^ |`. Kept free of any external expression-evaluation crate: the
//! grammar is tiny and fixed, so a hand-rolled parser is both simpler and avoids
//! pulling in a general-purpose math evaluator for six operators.

use std::collections::BTreeSet;

use crate::error::CollectorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    BitAnd,
    BitXor,
    BitOr,
}

impl BinOp {
    fn from_char(c: char) -> Option<Self> {
        Some(match c {
            '+' => Self::Add,
            '-' => Self::Sub,
            '*' => Self::Mul,
            '/' => Self::Div,
            '&' => Self::BitAnd,
            '^' => Self::BitXor,
            '|' => Self::BitOr,
            _ => return None,
        })
    }

    /// Precedence follows libmatheval's table: bitwise operators bind looser than
    /// arithmetic ones, with `|` loosest and `&` tightest among the three.
    fn precedence(self) -> u8 {
        match self {
            Self::BitOr => 1,
            Self::BitXor => 2,
            Self::BitAnd => 3,
            Self::Add | Self::Sub => 4,
            Self::Mul | Self::Div => 5,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Expr {
    Num(f64),
    Var(String),
    Bin(BinOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, CollectorError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() || c == '.' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let num = text
                .parse::<f64>()
                .map_err(|_| CollectorError::ExpressionSyntax(format!("bad number {text:?}")))?;
            tokens.push(Token::Num(num));
        } else if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            tokens.push(Token::Ident(text));
        } else if c == '(' {
            tokens.push(Token::LParen);
            i += 1;
        } else if c == ')' {
            tokens.push(Token::RParen);
            i += 1;
        } else if "+-*/&^|".contains(c) {
            tokens.push(Token::Op(c));
            i += 1;
        } else {
            return Err(CollectorError::ExpressionSyntax(format!(
                "unexpected character {c:?}"
            )));
        }
    }
    Ok(tokens)
}

/// Parses an infix expression into an AST via the shunting-yard algorithm.
pub fn parse(input: &str) -> Result<Expr, CollectorError> {
    let tokens = tokenize(input)?;
    let mut output: Vec<Expr> = Vec::new();
    let mut ops: Vec<Token> = Vec::new();

    let apply = |output: &mut Vec<Expr>, op: char| -> Result<(), CollectorError> {
        let bin = BinOp::from_char(op)
            .ok_or_else(|| CollectorError::ExpressionSyntax(format!("bad operator {op:?}")))?;
        let rhs = output
            .pop()
            .ok_or_else(|| CollectorError::ExpressionSyntax("missing operand".into()))?;
        let lhs = output
            .pop()
            .ok_or_else(|| CollectorError::ExpressionSyntax("missing operand".into()))?;
        output.push(Expr::Bin(bin, Box::new(lhs), Box::new(rhs)));
        Ok(())
    };

    for token in tokens {
        match token {
            Token::Num(n) => output.push(Expr::Num(n)),
            Token::Ident(name) => output.push(Expr::Var(name)),
            Token::Op(op) => {
                let prec = BinOp::from_char(op)
                    .ok_or_else(|| {
                        CollectorError::ExpressionSyntax(format!("bad operator {op:?}"))
                    })?
                    .precedence();
                while let Some(Token::Op(top)) = ops.last() {
                    let top_prec = BinOp::from_char(*top).map(BinOp::precedence).unwrap_or(0);
                    if top_prec >= prec {
                        let top = *top;
                        ops.pop();
                        apply(&mut output, top)?;
                    } else {
                        break;
                    }
                }
                ops.push(Token::Op(op));
            }
            Token::LParen => ops.push(Token::LParen),
            Token::RParen => {
                loop {
                    match ops.pop() {
                        Some(Token::Op(op)) => apply(&mut output, op)?,
                        Some(Token::LParen) => break,
                        _ => {
                            return Err(CollectorError::ExpressionSyntax(
                                "unbalanced parentheses".into(),
                            ))
                        }
                    }
                }
            }
        }
    }

    while let Some(token) = ops.pop() {
        match token {
            Token::Op(op) => apply(&mut output, op)?,
            Token::LParen => {
                return Err(CollectorError::ExpressionSyntax(
                    "unbalanced parentheses".into(),
                ))
            }
            Token::RParen => unreachable!(),
        }
    }

    if output.len() != 1 {
        return Err(CollectorError::ExpressionSyntax(
            "expression does not reduce to a single value".into(),
        ));
    }
    Ok(output.remove(0))
}

/// Collects the set of distinct variable tokens referenced by an expression.
pub fn collect_variables(expr: &Expr) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    fn walk(expr: &Expr, out: &mut BTreeSet<String>) {
        match expr {
            Expr::Num(_) => {}
            Expr::Var(name) => {
                out.insert(name.clone());
            }
            Expr::Bin(_, lhs, rhs) => {
                walk(lhs, out);
                walk(rhs, out);
            }
        }
    }
    walk(expr, &mut out);
    out
}

/// Evaluates an expression, resolving variable references through `lookup`.
///
/// Bitwise operators truncate both operands to `i64`, apply the operator, and cast
/// the result back to `f64` — this mirrors the host matheval semantics the original
/// collector relied on.
pub fn eval(
    expr: &Expr,
    lookup: &mut dyn FnMut(&str) -> Result<f64, CollectorError>,
) -> Result<f64, CollectorError> {
    match expr {
        Expr::Num(n) => Ok(*n),
        Expr::Var(name) => lookup(name),
        Expr::Bin(op, lhs, rhs) => {
            let l = eval(lhs, lookup)?;
            let r = eval(rhs, lookup)?;
            Ok(match op {
                BinOp::Add => l + r,
                BinOp::Sub => l - r,
                BinOp::Mul => l * r,
                BinOp::Div => l / r,
                BinOp::BitAnd => ((l as i64) & (r as i64)) as f64,
                BinOp::BitXor => ((l as i64) ^ (r as i64)) as f64,
                BinOp::BitOr => ((l as i64) | (r as i64)) as f64,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_table(vals: &[(&str, f64)]) -> impl FnMut(&str) -> Result<f64, CollectorError> + '_ {
        move |name: &str| {
            vals.iter()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| *v)
                .ok_or_else(|| CollectorError::UnknownVariable(name.to_string()))
        }
    }

    #[test]
    fn precedence_respects_arithmetic() {
        let expr = parse("2 + 3 * 4").unwrap();
        let mut lookup = lookup_table(&[]);
        assert_eq!(eval(&expr, &mut lookup).unwrap(), 14.0);
    }

    #[test]
    fn variables_resolve_through_lookup() {
        let expr = parse("a/b").unwrap();
        let mut lookup = lookup_table(&[("a", 10.0), ("b", 2.0)]);
        assert_eq!(eval(&expr, &mut lookup).unwrap(), 5.0);
    }

    #[test]
    fn bitwise_truncates_before_operating() {
        let expr = parse("a & b").unwrap();
        let mut lookup = lookup_table(&[("a", 6.9), ("b", 3.0)]);
        assert_eq!(eval(&expr, &mut lookup).unwrap(), 2.0);
    }

    #[test]
    fn unknown_variable_errors() {
        let expr = parse("a+1").unwrap();
        let mut lookup = lookup_table(&[]);
        assert!(matches!(
            eval(&expr, &mut lookup),
            Err(CollectorError::UnknownVariable(name)) if name == "a"
        ));
    }

    #[test]
    fn collects_distinct_variables() {
        let expr = parse("a + b * a").unwrap();
        let vars = collect_variables(&expr);
        assert_eq!(vars.len(), 2);
    }
}
