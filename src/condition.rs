//! 条件表达式求值器
//! 负责解析规则的condition字段：十进制整数操作数（引用match下标）
//! 通过 and / or / not 与括号组合，优先级 not > and > or
//! 纯函数实现，无任何内部状态，可并发调用

use std::collections::HashMap;

use crate::error::{WaResult, WebanalyzerError};

/// 词法单元
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// match下标（以字符串形式在输入映射中查找）
    Operand(String),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

/// 词法分析：拆分为Token序列
/// 关键字不区分大小写，数字序列作为一个操作数整体读取
fn tokenize(expression: &str) -> WaResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = expression.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\r' | '\n' => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '0'..='9' => {
                let mut number = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() {
                        number.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Operand(number));
            }
            'a'..='z' | 'A'..='Z' => {
                let mut word = String::new();
                while let Some(&w) = chars.peek() {
                    if w.is_ascii_alphabetic() {
                        word.push(w);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match word.to_ascii_lowercase().as_str() {
                    "and" => tokens.push(Token::And),
                    "or" => tokens.push(Token::Or),
                    "not" => tokens.push(Token::Not),
                    other => {
                        return Err(WebanalyzerError::ConditionError(format!(
                            "未知关键字：{}",
                            other
                        )));
                    }
                }
            }
            other => {
                return Err(WebanalyzerError::ConditionError(format!(
                    "非法字符：{}",
                    other
                )));
            }
        }
    }

    Ok(tokens)
}

/// 递归下降解析器（持有Token流与输入映射，边解析边求值）
struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    inputs: &'a HashMap<String, bool>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// or层：and表达式序列
    fn parse_or(&mut self) -> WaResult<bool> {
        let mut value = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.advance();
            let rhs = self.parse_and()?;
            value = value || rhs;
        }
        Ok(value)
    }

    /// and层：not表达式序列
    fn parse_and(&mut self) -> WaResult<bool> {
        let mut value = self.parse_not()?;
        while self.peek() == Some(&Token::And) {
            self.advance();
            let rhs = self.parse_not()?;
            value = value && rhs;
        }
        Ok(value)
    }

    /// not层：前缀not可嵌套
    fn parse_not(&mut self) -> WaResult<bool> {
        if self.peek() == Some(&Token::Not) {
            self.advance();
            let value = self.parse_not()?;
            return Ok(!value);
        }
        self.parse_primary()
    }

    /// 原子层：括号分组或操作数
    fn parse_primary(&mut self) -> WaResult<bool> {
        match self.advance().cloned() {
            Some(Token::LParen) => {
                let value = self.parse_or()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err(WebanalyzerError::ConditionError(
                        "缺少右括号".to_string(),
                    )),
                }
            }
            Some(Token::Operand(index)) => {
                self.inputs.get(&index).copied().ok_or_else(|| {
                    WebanalyzerError::ConditionError(format!(
                        "操作数{}没有对应的match结果",
                        index
                    ))
                })
            }
            Some(token) => Err(WebanalyzerError::ConditionError(format!(
                "意外的Token：{:?}",
                token
            ))),
            None => Err(WebanalyzerError::ConditionError(
                "表达式意外结束".to_string(),
            )),
        }
    }
}

/// 求值条件表达式
/// 参数：
/// - `expression`: 条件表达式字符串，如 "0 and (1 or 2)"
/// - `inputs`: match下标（字符串）到布尔结果的映射
pub fn evaluate(expression: &str, inputs: &HashMap<String, bool>) -> WaResult<bool> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(WebanalyzerError::ConditionError(
            "空条件表达式".to_string(),
        ));
    }

    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        inputs,
    };
    let value = parser.parse_or()?;

    // 尾部残留Token视为语法错误
    if parser.pos != tokens.len() {
        return Err(WebanalyzerError::ConditionError(format!(
            "表达式尾部存在多余Token：{:?}",
            tokens[parser.pos]
        )));
    }

    Ok(value)
}
