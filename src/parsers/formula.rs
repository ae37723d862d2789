//! # 化学式解析器
//!
//! 将化学式字符串解析为 元素 -> 化学计量数 的映射。
//!
//! ## 语法
//! ```text
//! formula := part (ADDUCT coeff? part)*
//! part    := group+
//! group   := (ELEMENT | OPEN part CLOSE) coeff?
//! coeff   := NUMBER            (支持小数，如 0.5 或 .5)
//! OPEN    := "(" | "["         CLOSE := ")" | "]"
//! ADDUCT  := "·" | "*"         (结晶水等加合物，如 CuSO4·5H2O)
//! ```
//!
//! ## 示例
//! - `LiNi0.5Mn0.25Co0.25O2` -> {Li: 1, Ni: 0.5, Mn: 0.25, Co: 0.25, O: 2}
//! - `Ca(OH)2` -> {Ca: 1, O: 2, H: 2}
//! - `K4[Fe(CN)6]` -> {K: 4, Fe: 1, C: 6, N: 6}
//!
//! ## 依赖关系
//! - 被 `models/compound.rs` 调用
//! - 使用 `xas/elements.rs` 识别元素符号

use crate::error::{Result, XasError};
use crate::xas::elements;

use std::collections::BTreeMap;

/// 元素计数映射
pub type ElementCounts = BTreeMap<&'static str, f64>;

/// 词法单元
#[derive(Debug, Clone, PartialEq)]
enum Token {
    Element(&'static str),
    Number(f64),
    Open(char),
    Close(char),
    Adduct,
}

/// 解析化学式
pub fn parse(formula: &str) -> Result<ElementCounts> {
    let trimmed = formula.trim();
    if trimmed.is_empty() {
        return Err(error(formula, "formula is empty"));
    }

    let tokens = tokenize(trimmed)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        formula: trimmed,
    };
    let counts = parser.parse_formula()?;

    if !counts.values().any(|count| *count > 0.0) {
        return Err(error(trimmed, "no element has a positive count"));
    }

    Ok(counts)
}

fn error(formula: &str, reason: impl Into<String>) -> XasError {
    XasError::ParseError {
        formula: formula.to_string(),
        reason: reason.into(),
    }
}

/// 词法分析
fn tokenize(formula: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = formula.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_uppercase() {
            let start = i;
            i += 1;
            while i < chars.len() && chars[i].is_ascii_lowercase() {
                i += 1;
            }
            let symbol: String = chars[start..i].iter().collect();
            let element = elements::lookup(&symbol)
                .ok_or_else(|| error(formula, format!("unknown element '{}'", symbol)))?;
            tokens.push(Token::Element(element));
        } else if c.is_ascii_digit() || c == '.' {
            let start = i;
            let mut seen_dot = false;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                if chars[i] == '.' {
                    // 小数点后必须跟数字
                    let followed_by_digit = chars.get(i + 1).is_some_and(|n| n.is_ascii_digit());
                    if seen_dot || !followed_by_digit {
                        let text: String = chars[start..=i].iter().collect();
                        return Err(error(formula, format!("invalid coefficient '{}'", text)));
                    }
                    seen_dot = true;
                }
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let value: f64 = text
                .parse()
                .map_err(|_| error(formula, format!("invalid coefficient '{}'", text)))?;
            tokens.push(Token::Number(value));
        } else {
            match c {
                '(' | '[' => tokens.push(Token::Open(c)),
                ')' | ']' => tokens.push(Token::Close(c)),
                '·' | '*' => tokens.push(Token::Adduct),
                _ => {
                    return Err(error(
                        formula,
                        format!("unexpected character '{}' at position {}", c, i),
                    ))
                }
            }
            i += 1;
        }
    }

    Ok(tokens)
}

/// 递归下降语法分析器
struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    formula: &'a str,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn parse_formula(&mut self) -> Result<ElementCounts> {
        let mut total = self.parse_part()?;

        while let Some(Token::Adduct) = self.peek() {
            self.pos += 1;
            let multiplier = self.parse_coefficient().unwrap_or(1.0);
            let part = self.parse_part()?;
            merge(&mut total, &part, multiplier);
        }

        match self.peek() {
            None => Ok(total),
            Some(Token::Close(c)) => Err(error(self.formula, format!("unbalanced '{}'", c))),
            Some(token) => Err(error(
                self.formula,
                format!("unexpected token {:?}", token),
            )),
        }
    }

    /// group+，遇到右括号、加合符号或结尾时停止
    fn parse_part(&mut self) -> Result<ElementCounts> {
        let mut counts = ElementCounts::new();
        let mut groups = 0;

        loop {
            match self.peek() {
                Some(Token::Element(symbol)) => {
                    self.pos += 1;
                    let count = self.parse_coefficient().unwrap_or(1.0);
                    *counts.entry(*symbol).or_insert(0.0) += count;
                }
                Some(Token::Open(open)) => {
                    self.pos += 1;
                    let inner = self.parse_part()?;
                    self.expect_close(*open)?;
                    let multiplier = self.parse_coefficient().unwrap_or(1.0);
                    merge(&mut counts, &inner, multiplier);
                }
                Some(Token::Number(_)) => {
                    return Err(error(
                        self.formula,
                        "coefficient must follow an element or a group",
                    ));
                }
                Some(Token::Close(_)) | Some(Token::Adduct) | None => break,
            }
            groups += 1;
        }

        if groups == 0 {
            return Err(error(self.formula, "expected an element or a group"));
        }
        Ok(counts)
    }

    fn parse_coefficient(&mut self) -> Option<f64> {
        if let Some(Token::Number(value)) = self.peek() {
            self.pos += 1;
            Some(*value)
        } else {
            None
        }
    }

    fn expect_close(&mut self, open: char) -> Result<()> {
        let expected = if open == '(' { ')' } else { ']' };
        match self.peek() {
            Some(Token::Close(c)) if *c == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(Token::Close(c)) => Err(error(
                self.formula,
                format!("mismatched '{}' closing '{}'", c, open),
            )),
            _ => Err(error(self.formula, format!("unbalanced '{}'", open))),
        }
    }
}

fn merge(target: &mut ElementCounts, source: &ElementCounts, multiplier: f64) {
    for (symbol, count) in source {
        *target.entry(*symbol).or_insert(0.0) += count * multiplier;
    }
}
