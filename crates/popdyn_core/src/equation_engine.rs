//! Whitelisted expression language for user-supplied vector fields.
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := '-' unary | power
//! power   := primary (('^' | '**') unary)?
//! primary := number | 'x' | 'y' | func '(' expr ')' | '(' expr ')'
//! func    := sin | cos | exp | log | sqrt
//! ```
//!
//! `X` and `Y` are accepted as aliases of `x` and `y`. Nothing else resolves:
//! there are no parameters, assignments or attribute lookups. Inputs longer than
//! [`MAX_LENGTH`] characters or nested deeper than [`MAX_DEPTH`] are rejected.

use crate::error::ExpressionError;
use crate::traits::{constant, Scalar};

/// Longest accepted expression, in characters.
pub const MAX_LENGTH: usize = 1024;

/// Deepest accepted nesting of parentheses, calls, signs and exponents.
pub const MAX_DEPTH: usize = 128;

/// Variable names in index order.
pub const VARIABLES: [&str; 2] = ["x", "y"];

/// OpCodes for the Stack-based Virtual Machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpCode {
    /// Pushes a constant `f64` value onto the stack.
    LoadConst(f64),
    /// Pushes the value of a variable (0 = x, 1 = y) onto the stack.
    LoadVar(usize),
    /// Pops top two values (b, a), pushes (a + b).
    Add,
    /// Pops top two values (b, a), pushes (a - b).
    Sub,
    /// Pops top two values (b, a), pushes (a * b).
    Mul,
    /// Pops top two values (b, a), pushes (a / b).
    Div,
    /// Pops top two values (b, a), pushes (a ^ b).
    Pow,
    Sin,
    Cos,
    Exp,
    /// Natural logarithm.
    Log,
    Sqrt,
    /// Pops top value (a), pushes -a.
    Neg,
}

/// Represents a compiled sequence of operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bytecode {
    pub ops: Vec<OpCode>,
}

/// Stack-based Virtual Machine for evaluating compiled expressions.
pub struct VM;

impl VM {
    /// Executes the bytecode against `vars` (`[x, y]`).
    ///
    /// Malformed bytecode never panics; it evaluates to NaN, which the callers
    /// treat as a failed evaluation.
    pub fn execute<T: Scalar>(bytecode: &Bytecode, vars: &[T], stack: &mut Vec<T>) -> T {
        stack.clear();

        for op in &bytecode.ops {
            let value = match op {
                OpCode::LoadConst(val) => constant(*val),
                OpCode::LoadVar(idx) => vars.get(*idx).copied().unwrap_or_else(T::nan),
                OpCode::Add => binary(stack, |a, b| a + b),
                OpCode::Sub => binary(stack, |a, b| a - b),
                OpCode::Mul => binary(stack, |a, b| a * b),
                OpCode::Div => binary(stack, |a, b| a / b),
                OpCode::Pow => binary(stack, |a, b| a.powf(b)),
                OpCode::Sin => pop(stack).sin(),
                OpCode::Cos => pop(stack).cos(),
                OpCode::Exp => pop(stack).exp(),
                OpCode::Log => pop(stack).ln(),
                OpCode::Sqrt => pop(stack).sqrt(),
                OpCode::Neg => -pop(stack),
            };
            stack.push(value);
        }

        if stack.len() == 1 {
            pop(stack)
        } else {
            T::nan()
        }
    }
}

fn pop<T: Scalar>(stack: &mut Vec<T>) -> T {
    stack.pop().unwrap_or_else(T::nan)
}

fn binary<T: Scalar>(stack: &mut Vec<T>, op: impl Fn(T, T) -> T) -> T {
    let b = pop(stack);
    let a = pop(stack);
    op(a, b)
}

// --- AST & Parser ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sin,
    Cos,
    Exp,
    Log,
    Sqrt,
}

impl Function {
    fn lookup(name: &str) -> Option<Self> {
        match name {
            "sin" => Some(Function::Sin),
            "cos" => Some(Function::Cos),
            "exp" => Some(Function::Exp),
            "log" => Some(Function::Log),
            "sqrt" => Some(Function::Sqrt),
            _ => None,
        }
    }

    fn opcode(self) -> OpCode {
        match self {
            Function::Sin => OpCode::Sin,
            Function::Cos => OpCode::Cos,
            Function::Exp => OpCode::Exp,
            Function::Log => OpCode::Log,
            Function::Sqrt => OpCode::Sqrt,
        }
    }
}

/// Abstract Syntax Tree nodes for expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    /// Index into [`VARIABLES`].
    Variable(usize),
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
    Neg(Box<Expr>),
    Call(Function, Box<Expr>),
}

/// Compiles an AST (`Expr`) into `Bytecode`.
pub fn compile(expr: &Expr) -> Bytecode {
    let mut ops = Vec::new();
    compile_recursive(expr, &mut ops);
    Bytecode { ops }
}

fn compile_recursive(expr: &Expr, ops: &mut Vec<OpCode>) {
    match expr {
        Expr::Number(n) => ops.push(OpCode::LoadConst(*n)),
        Expr::Variable(idx) => ops.push(OpCode::LoadVar(*idx)),
        Expr::Binary(left, op, right) => {
            compile_recursive(left, ops);
            compile_recursive(right, ops);
            ops.push(match op {
                BinaryOp::Add => OpCode::Add,
                BinaryOp::Sub => OpCode::Sub,
                BinaryOp::Mul => OpCode::Mul,
                BinaryOp::Div => OpCode::Div,
                BinaryOp::Pow => OpCode::Pow,
            });
        }
        Expr::Neg(operand) => {
            compile_recursive(operand, ops);
            ops.push(OpCode::Neg);
        }
        Expr::Call(func, arg) => {
            compile_recursive(arg, ops);
            ops.push(func.opcode());
        }
    }
}

/// Parses and compiles in one go.
pub fn compile_expression(input: &str) -> Result<Bytecode, ExpressionError> {
    parse(input).map(|expr| compile(&expr))
}

/// Parses a string expression into an AST.
pub fn parse(input: &str) -> Result<Expr, ExpressionError> {
    let length = input.chars().count();
    if length > MAX_LENGTH {
        return Err(ExpressionError::TooLong {
            length,
            limit: MAX_LENGTH,
        });
    }
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ExpressionError::Empty);
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.parse_expression()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(ExpressionError::UnexpectedToken(token.describe())),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {n}"),
            Token::Identifier(name) => format!("\"{name}\""),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::Slash => "'/'".to_string(),
            Token::Caret => "'^'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExpressionError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(position, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_ascii_digit() || c == '.' {
            let mut literal = String::new();
            while let Some(&(_, d)) = chars.peek() {
                if d.is_ascii_digit() || d == '.' {
                    literal.push(d);
                    chars.next();
                } else if (d == 'e' || d == 'E') && !literal.contains(['e', 'E']) {
                    // exponent, optionally signed
                    literal.push(d);
                    chars.next();
                    if let Some(&(_, sign)) = chars.peek() {
                        if sign == '+' || sign == '-' {
                            literal.push(sign);
                            chars.next();
                        }
                    }
                } else {
                    break;
                }
            }
            let value = literal
                .parse::<f64>()
                .map_err(|_| ExpressionError::InvalidNumber(literal.clone()))?;
            tokens.push(Token::Number(value));
        } else if c.is_ascii_alphabetic() {
            let mut ident = String::new();
            while let Some(&(_, d)) = chars.peek() {
                if d.is_ascii_alphanumeric() || d == '_' {
                    ident.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Identifier(ident));
        } else {
            let token = match c {
                '+' => Token::Plus,
                '-' => Token::Minus,
                '*' => Token::Star,
                '/' => Token::Slash,
                '^' => Token::Caret,
                '(' => Token::LParen,
                ')' => Token::RParen,
                _ => {
                    return Err(ExpressionError::UnexpectedCharacter {
                        character: c,
                        position,
                    })
                }
            };
            chars.next();
            // `**` is the same as `^`
            if token == Token::Star && matches!(chars.peek(), Some(&(_, '*'))) {
                chars.next();
                tokens.push(Token::Caret);
            } else {
                tokens.push(token);
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_expression(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_term()?;

        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.consume();
            let right = self.parse_term()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => break,
            };
            self.consume();
            let right = self.parse_unary()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    // Every recursive path passes through here, so this is where nesting is counted.
    fn parse_unary(&mut self) -> Result<Expr, ExpressionError> {
        if self.depth >= MAX_DEPTH {
            return Err(ExpressionError::TooDeep(MAX_DEPTH));
        }
        self.depth += 1;
        let expr = self.parse_signed();
        self.depth -= 1;
        expr
    }

    fn parse_signed(&mut self) -> Result<Expr, ExpressionError> {
        if let Some(Token::Minus) = self.peek() {
            self.consume();
            let expr = self.parse_unary()?;
            return Ok(Expr::Neg(Box::new(expr)));
        }
        if let Some(Token::Plus) = self.peek() {
            self.consume();
            return self.parse_unary();
        }
        self.parse_power()
    }

    // Right associative: 2^3^2 == 2^(3^2); -x^2 == -(x^2).
    fn parse_power(&mut self) -> Result<Expr, ExpressionError> {
        let base = self.parse_primary()?;
        if let Some(Token::Caret) = self.peek() {
            self.consume();
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary(
                Box::new(base),
                BinaryOp::Pow,
                Box::new(exponent),
            ));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, ExpressionError> {
        match self.consume() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Identifier(name)) => {
                if let Some(Token::LParen) = self.peek() {
                    let func = Function::lookup(&name)
                        .ok_or_else(|| ExpressionError::UnknownFunction(name.clone()))?;
                    self.consume(); // eat '('
                    let arg = self.parse_expression()?;
                    self.expect_closing()?;
                    Ok(Expr::Call(func, Box::new(arg)))
                } else {
                    resolve_variable(&name).map(Expr::Variable)
                }
            }
            Some(Token::LParen) => {
                let expr = self.parse_expression()?;
                self.expect_closing()?;
                Ok(expr)
            }
            Some(token) => Err(ExpressionError::UnexpectedToken(token.describe())),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }

    fn expect_closing(&mut self) -> Result<(), ExpressionError> {
        match self.consume() {
            Some(Token::RParen) => Ok(()),
            _ => Err(ExpressionError::MissingClosingParen),
        }
    }
}

fn resolve_variable(name: &str) -> Result<usize, ExpressionError> {
    match name {
        "x" | "X" => Ok(0),
        "y" | "Y" => Ok(1),
        _ => Err(ExpressionError::UnknownVariable(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(input: &str, x: f64, y: f64) -> f64 {
        let code = compile_expression(input).expect("expression should compile");
        let mut stack = Vec::new();
        VM::execute(&code, &[x, y], &mut stack)
    }

    #[test]
    fn evaluates_arithmetic_with_precedence() {
        assert_eq!(eval("1 + 2 * 3", 0.0, 0.0), 7.0);
        assert_eq!(eval("(1 + 2) * 3", 0.0, 0.0), 9.0);
        assert_eq!(eval("8 / 4 / 2", 0.0, 0.0), 1.0);
        assert_eq!(eval("2 ^ 3 ^ 2", 0.0, 0.0), 512.0);
        assert_eq!(eval("-x^2", 3.0, 0.0), -9.0);
        assert_eq!(eval("x ** 2 + y", 3.0, 1.0), 10.0);
        assert_eq!(eval("2.5e-1 * 4", 0.0, 0.0), 1.0);
    }

    #[test]
    fn evaluates_whitelisted_functions() {
        let x: f64 = 0.7;
        let y: f64 = 2.0;
        assert!((eval("sin(y)", x, y) - y.sin()).abs() < 1e-15);
        assert!((eval("cos(X)", x, y) - x.cos()).abs() < 1e-15);
        assert!((eval("exp(x) - log(y)", x, y) - (x.exp() - y.ln())).abs() < 1e-15);
        assert!((eval("sqrt(x*x + y*y)", x, y) - x.hypot(y)).abs() < 1e-12);
    }

    #[test]
    fn rejects_anything_outside_the_grammar() {
        assert_eq!(
            parse("z + 1").unwrap_err(),
            ExpressionError::UnknownVariable("z".to_string())
        );
        assert_eq!(
            parse("tan(x)").unwrap_err(),
            ExpressionError::UnknownFunction("tan".to_string())
        );
        assert!(parse("np.sin(Y)").is_err());
        assert!(matches!(
            parse("__import__('os')").unwrap_err(),
            ExpressionError::UnexpectedCharacter { .. }
        ));
        assert_eq!(parse("   ").unwrap_err(), ExpressionError::Empty);
        assert_eq!(parse("1 +").unwrap_err(), ExpressionError::UnexpectedEnd);
        assert_eq!(
            parse("sin(x").unwrap_err(),
            ExpressionError::MissingClosingParen
        );
        assert!(matches!(
            parse("x y").unwrap_err(),
            ExpressionError::UnexpectedToken(_)
        ));
        assert!(matches!(
            parse("1.2.3").unwrap_err(),
            ExpressionError::InvalidNumber(_)
        ));
    }

    #[test]
    fn rejects_runaway_nesting_and_length() {
        let deep = format!("{}x{}", "(".repeat(200_000), ")".repeat(200_000));
        assert!(matches!(
            parse(&deep).unwrap_err(),
            ExpressionError::TooLong { .. }
        ));

        let nested = |levels: usize| format!("{}x{}", "(".repeat(levels), ")".repeat(levels));
        assert_eq!(
            parse(&nested(MAX_DEPTH)).unwrap_err(),
            ExpressionError::TooDeep(MAX_DEPTH)
        );
        assert_eq!(eval(&nested(MAX_DEPTH - 1), 2.0, 0.0), 2.0);
        assert_eq!(
            parse(&"-".repeat(500)).unwrap_err(),
            ExpressionError::TooDeep(MAX_DEPTH)
        );
        assert_eq!(
            parse(&format!("x{}", "^x".repeat(200))).unwrap_err(),
            ExpressionError::TooDeep(MAX_DEPTH)
        );
        // Long flat chains stay within the length cap and parse.
        assert_eq!(eval(&vec!["x"; 300].join("+"), 1.0, 0.0), 300.0);
    }

    #[test]
    fn malformed_bytecode_yields_nan() {
        let code = Bytecode {
            ops: vec![OpCode::Add],
        };
        let mut stack = Vec::new();
        assert!(VM::execute::<f64>(&code, &[0.0, 0.0], &mut stack).is_nan());
    }
}
