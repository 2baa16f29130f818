use super::lexer::{Token, TokenKind};
use super::{BinaryOp, Expr, ExprError, UnaryOp};

const BOUND_NAME: &str = "values";

/// Recursive-descent parser over the token stream.
pub(super) struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl Parser {
    pub(super) fn new(tokens: Vec<Token>, max_depth: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            max_depth,
        }
    }

    pub(super) fn parse(mut self) -> Result<Expr, ExprError> {
        if self.tokens.is_empty() {
            return Err(ExprError::Empty);
        }
        let expr = self.expression()?;
        match self.tokens.get(self.pos) {
            None => Ok(expr),
            Some(token) => Err(unexpected(token)),
        }
    }

    fn expression(&mut self) -> Result<Expr, ExprError> {
        self.enter()?;
        let expr = self.conditional();
        self.depth -= 1;
        expr
    }

    fn enter(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(ExprError::TooDeep {
                max: self.max_depth,
            });
        }
        Ok(())
    }

    fn conditional(&mut self) -> Result<Expr, ExprError> {
        let condition = self.or()?;
        if !self.eat(&TokenKind::Question) {
            return Ok(condition);
        }
        let then = self.expression()?;
        self.expect(&TokenKind::Colon)?;
        let otherwise = self.expression()?;
        Ok(Expr::Conditional {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn or(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(&[(TokenKind::OrOr, BinaryOp::Or)], Self::and)
    }

    fn and(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(&[(TokenKind::AndAnd, BinaryOp::And)], Self::equality)
    }

    fn equality(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(
            &[(TokenKind::EqEq, BinaryOp::Eq), (TokenKind::NotEq, BinaryOp::Ne)],
            Self::comparison,
        )
    }

    fn comparison(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(
            &[
                (TokenKind::Lt, BinaryOp::Lt),
                (TokenKind::Le, BinaryOp::Le),
                (TokenKind::Gt, BinaryOp::Gt),
                (TokenKind::Ge, BinaryOp::Ge),
            ],
            Self::additive,
        )
    }

    fn additive(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(
            &[(TokenKind::Plus, BinaryOp::Add), (TokenKind::Minus, BinaryOp::Sub)],
            Self::multiplicative,
        )
    }

    fn multiplicative(&mut self) -> Result<Expr, ExprError> {
        self.binary_level(
            &[
                (TokenKind::Star, BinaryOp::Mul),
                (TokenKind::Slash, BinaryOp::Div),
                (TokenKind::Percent, BinaryOp::Rem),
            ],
            Self::unary,
        )
    }

    fn binary_level(
        &mut self,
        operators: &[(TokenKind, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr, ExprError>,
    ) -> Result<Expr, ExprError> {
        let mut left = next(self)?;
        let mut chained = 0;
        'outer: loop {
            for (token, op) in operators {
                if self.eat(token) {
                    // Each folded operator nests the tree one level deeper.
                    self.enter()?;
                    chained += 1;
                    let right = next(self)?;
                    left = Expr::Binary {
                        op: *op,
                        left: Box::new(left),
                        right: Box::new(right),
                    };
                    continue 'outer;
                }
            }
            self.depth -= chained;
            return Ok(left);
        }
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        let op = if self.eat(&TokenKind::Minus) {
            UnaryOp::Neg
        } else if self.eat(&TokenKind::Bang) {
            UnaryOp::Not
        } else {
            return self.postfix();
        };
        self.enter()?;
        let operand = self.unary();
        self.depth -= 1;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand?),
        })
    }

    fn postfix(&mut self) -> Result<Expr, ExprError> {
        let mut expr = self.primary()?;
        let mut chained = 0;
        while self.eat(&TokenKind::Dot) {
            self.enter()?;
            chained += 1;
            self.length_property()?;
            expr = Expr::Length(Box::new(expr));
        }
        self.depth -= chained;
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        let token = self.advance().ok_or(ExprError::UnexpectedEnd)?;
        match token.kind {
            TokenKind::Number(number) => Ok(Expr::Number(number)),
            TokenKind::Str(text) => Ok(Expr::Str(text)),
            TokenKind::LParen => {
                let inner = self.expression()?;
                self.expect(&TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                BOUND_NAME => self.bound_values(token.offset),
                _ => Err(ExprError::UnknownIdentifier {
                    name,
                    offset: token.offset,
                }),
            },
            _ => Err(unexpected(&token)),
        }
    }

    fn bound_values(&mut self, offset: usize) -> Result<Expr, ExprError> {
        if self.eat(&TokenKind::LBracket) {
            let index = self.expression()?;
            self.expect(&TokenKind::RBracket)?;
            return Ok(Expr::Parent(Box::new(index)));
        }
        if self.eat(&TokenKind::Dot) {
            self.length_property()?;
            return Ok(Expr::ParentCount);
        }
        Err(ExprError::BareValues { offset })
    }

    fn length_property(&mut self) -> Result<(), ExprError> {
        let token = self.advance().ok_or(ExprError::UnexpectedEnd)?;
        match token.kind {
            TokenKind::Ident(name) if name == "length" => Ok(()),
            TokenKind::Ident(name) => Err(ExprError::UnknownProperty {
                name,
                offset: token.offset,
            }),
            _ => Err(unexpected(&token)),
        }
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.tokens.get(self.pos).is_some_and(|token| &token.kind == kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<(), ExprError> {
        if self.eat(kind) {
            return Ok(());
        }
        match self.tokens.get(self.pos) {
            Some(token) => Err(unexpected(token)),
            None => Err(ExprError::UnexpectedEnd),
        }
    }
}

fn unexpected(token: &Token) -> ExprError {
    ExprError::UnexpectedToken {
        found: token.kind.describe(),
        offset: token.offset,
    }
}
