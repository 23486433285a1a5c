// Copyright 2018-2026 the Deno authors. MIT license.

//! Expression-level script evaluation for the local engine.
//!
//! Supported: number/string/boolean/null/undefined literals, array and
//! object literals, global identifiers, member and index access, calls,
//! `new`, unary `! - + typeof void`, arithmetic, comparison, equality,
//! `instanceof`, `&&`, `||`, `?:`, assignment, `var`/`let`/`const`
//! declarations (bound on the global object) and `throw`.

use super::LocalEngine;
use super::heap::ErrorClass;
use super::heap::PropertyKey;
use super::heap::to_slot;
use crate::engine::Engine;
use crate::engine::EngineError;
use crate::engine::EngineResult;
use crate::engine::ValueKind;
use crate::value::RawValue;

#[derive(Debug, Clone, PartialEq)]
enum Token {
  Number(f64),
  String(String),
  Ident(String),
  Punct(&'static str),
  Eof,
}

const PUNCTUATORS: &[&str] = &[
  "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "(", ")", "[", "]", "{",
  "}", ",", ".", ";", ":", "?", "=", "+", "-", "*", "/", "%", "<", ">", "!",
];

fn tokenize(source: &str) -> Result<Vec<Token>, String> {
  let chars: Vec<char> = source.chars().collect();
  let mut tokens = Vec::new();
  let mut i = 0;
  while i < chars.len() {
    let c = chars[i];
    if c.is_whitespace() {
      i += 1;
      continue;
    }
    if c == '/' && chars.get(i + 1) == Some(&'/') {
      while i < chars.len() && chars[i] != '\n' {
        i += 1;
      }
      continue;
    }
    if c == '/' && chars.get(i + 1) == Some(&'*') {
      i += 2;
      while i < chars.len()
        && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/'))
      {
        i += 1;
      }
      if i >= chars.len() {
        return Err("Invalid or unexpected token".into());
      }
      i += 2;
      continue;
    }
    let starts_number = c.is_ascii_digit()
      || (c == '.' && chars.get(i + 1).is_some_and(|c| c.is_ascii_digit()));
    if starts_number {
      let (number, next) = read_number(&chars, i)?;
      tokens.push(Token::Number(number));
      i = next;
      continue;
    }
    if c == '"' || c == '\'' {
      let (text, next) = read_string(&chars, i)?;
      tokens.push(Token::String(text));
      i = next;
      continue;
    }
    if c.is_alphabetic() || c == '_' || c == '$' {
      let start = i;
      while i < chars.len()
        && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$')
      {
        i += 1;
      }
      tokens.push(Token::Ident(chars[start..i].iter().collect()));
      continue;
    }
    let rest: String = chars[i..chars.len().min(i + 3)].iter().collect();
    match PUNCTUATORS.iter().find(|p| rest.starts_with(**p)) {
      Some(punct) => {
        tokens.push(Token::Punct(*punct));
        i += punct.len();
      }
      None => return Err(format!("Invalid or unexpected token '{c}'")),
    }
  }
  tokens.push(Token::Eof);
  Ok(tokens)
}

fn read_number(chars: &[char], start: usize) -> Result<(f64, usize), String> {
  let mut i = start;
  if chars[i] == '0' && matches!(chars.get(i + 1), Some('x' | 'X')) {
    i += 2;
    let digits_start = i;
    while i < chars.len() && chars[i].is_ascii_hexdigit() {
      i += 1;
    }
    let digits: String = chars[digits_start..i].iter().collect();
    let value = u64::from_str_radix(&digits, 16)
      .map_err(|_| "Invalid or unexpected token".to_string())?;
    return Ok((value as f64, i));
  }
  while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
    i += 1;
  }
  if i < chars.len() && matches!(chars[i], 'e' | 'E') {
    i += 1;
    if i < chars.len() && matches!(chars[i], '+' | '-') {
      i += 1;
    }
    while i < chars.len() && chars[i].is_ascii_digit() {
      i += 1;
    }
  }
  let text: String = chars[start..i].iter().collect();
  let value = text
    .parse::<f64>()
    .map_err(|_| format!("Invalid number '{text}'"))?;
  Ok((value, i))
}

fn read_string(chars: &[char], start: usize) -> Result<(String, usize), String> {
  let quote = chars[start];
  let mut text = String::new();
  let mut i = start + 1;
  loop {
    let Some(&c) = chars.get(i) else {
      return Err("Invalid or unexpected token".into());
    };
    i += 1;
    if c == quote {
      return Ok((text, i));
    }
    if c == '\n' {
      return Err("Invalid or unexpected token".into());
    }
    if c != '\\' {
      text.push(c);
      continue;
    }
    let Some(&escape) = chars.get(i) else {
      return Err("Invalid or unexpected token".into());
    };
    i += 1;
    match escape {
      'n' => text.push('\n'),
      't' => text.push('\t'),
      'r' => text.push('\r'),
      'b' => text.push('\u{8}'),
      'f' => text.push('\u{c}'),
      'v' => text.push('\u{b}'),
      '0' => text.push('\0'),
      '\n' => {}
      'x' | 'u' => {
        let width = if escape == 'x' { 2 } else { 4 };
        let digits: String = chars.get(i..i + width).unwrap_or(&[]).iter().collect();
        let code = u32::from_str_radix(&digits, 16)
          .map_err(|_| "Invalid hexadecimal escape sequence".to_string())?;
        text.push(char::from_u32(code).unwrap_or('\u{fffd}'));
        i += width;
      }
      other => text.push(other),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum UnaryOp {
  Not,
  Negate,
  Plus,
  Typeof,
  Void,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  Rem,
  StrictEq,
  StrictNe,
  Eq,
  Ne,
  Lt,
  Gt,
  Le,
  Ge,
  InstanceOf,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum LogicalOp {
  And,
  Or,
}

#[derive(Debug, Clone)]
enum Expr {
  Number(f64),
  String(String),
  Bool(bool),
  Null,
  Undefined,
  This,
  Ident(String),
  Array(Vec<Expr>),
  Object(Vec<(String, Expr)>),
  Member(Box<Expr>, String),
  Index(Box<Expr>, Box<Expr>),
  Call(Box<Expr>, Vec<Expr>),
  New(Box<Expr>, Vec<Expr>),
  Unary(UnaryOp, Box<Expr>),
  Binary(BinaryOp, Box<Expr>, Box<Expr>),
  Logical(LogicalOp, Box<Expr>, Box<Expr>),
  Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
  Assign(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone)]
enum Stmt {
  Expr(Expr),
  Var(Vec<(String, Option<Expr>)>),
  Throw(Expr),
  Empty,
}

struct Parser {
  tokens: Vec<Token>,
  pos: usize,
}

impl Parser {
  fn peek(&self) -> &Token {
    &self.tokens[self.pos.min(self.tokens.len() - 1)]
  }

  fn advance(&mut self) -> Token {
    let token = self.peek().clone();
    if self.pos < self.tokens.len() - 1 {
      self.pos += 1;
    }
    token
  }

  fn is_punct(&self, punct: &str) -> bool {
    matches!(self.peek(), Token::Punct(p) if *p == punct)
  }

  fn is_keyword(&self, keyword: &str) -> bool {
    matches!(self.peek(), Token::Ident(name) if name == keyword)
  }

  fn eat(&mut self, punct: &str) -> bool {
    let matched = self.is_punct(punct);
    if matched {
      self.advance();
    }
    matched
  }

  fn expect(&mut self, punct: &str) -> Result<(), String> {
    if self.eat(punct) {
      Ok(())
    } else {
      Err(self.unexpected())
    }
  }

  fn unexpected(&self) -> String {
    match self.peek() {
      Token::Eof => "Unexpected end of input".into(),
      Token::Number(number) => format!("Unexpected number {number}"),
      Token::String(_) => "Unexpected string".into(),
      Token::Ident(name) => format!("Unexpected identifier '{name}'"),
      Token::Punct(punct) => format!("Unexpected token '{punct}'"),
    }
  }

  fn identifier(&mut self) -> Result<String, String> {
    match self.peek().clone() {
      Token::Ident(name) => {
        self.advance();
        Ok(name)
      }
      _ => Err(self.unexpected()),
    }
  }

  fn program(&mut self) -> Result<Vec<Stmt>, String> {
    let mut statements = Vec::new();
    while *self.peek() != Token::Eof {
      statements.push(self.statement()?);
    }
    Ok(statements)
  }

  fn statement(&mut self) -> Result<Stmt, String> {
    if self.eat(";") {
      return Ok(Stmt::Empty);
    }
    let statement = if self.is_keyword("var")
      || self.is_keyword("let")
      || self.is_keyword("const")
    {
      self.advance();
      let mut declarations = Vec::new();
      loop {
        let name = self.identifier()?;
        let init = if self.eat("=") {
          Some(self.assignment()?)
        } else {
          None
        };
        declarations.push((name, init));
        if !self.eat(",") {
          break;
        }
      }
      Stmt::Var(declarations)
    } else if self.is_keyword("throw") {
      self.advance();
      Stmt::Throw(self.expression()?)
    } else {
      Stmt::Expr(self.expression()?)
    };
    self.eat(";");
    Ok(statement)
  }

  fn expression(&mut self) -> Result<Expr, String> {
    self.assignment()
  }

  fn assignment(&mut self) -> Result<Expr, String> {
    let target = self.conditional()?;
    if !self.eat("=") {
      return Ok(target);
    }
    if !matches!(target, Expr::Ident(_) | Expr::Member(..) | Expr::Index(..)) {
      return Err("Invalid left-hand side in assignment".into());
    }
    let value = self.assignment()?;
    Ok(Expr::Assign(Box::new(target), Box::new(value)))
  }

  fn conditional(&mut self) -> Result<Expr, String> {
    let test = self.logical_or()?;
    if !self.eat("?") {
      return Ok(test);
    }
    let consequent = self.assignment()?;
    self.expect(":")?;
    let alternate = self.assignment()?;
    Ok(Expr::Conditional(
      Box::new(test),
      Box::new(consequent),
      Box::new(alternate),
    ))
  }

  fn logical_or(&mut self) -> Result<Expr, String> {
    let mut left = self.logical_and()?;
    while self.eat("||") {
      let right = self.logical_and()?;
      left = Expr::Logical(LogicalOp::Or, Box::new(left), Box::new(right));
    }
    Ok(left)
  }

  fn logical_and(&mut self) -> Result<Expr, String> {
    let mut left = self.binary(0)?;
    while self.eat("&&") {
      let right = self.binary(0)?;
      left = Expr::Logical(LogicalOp::And, Box::new(left), Box::new(right));
    }
    Ok(left)
  }

  fn binary_op(&self) -> Option<(BinaryOp, u8)> {
    let op = match self.peek() {
      Token::Punct("===") => (BinaryOp::StrictEq, 0),
      Token::Punct("!==") => (BinaryOp::StrictNe, 0),
      Token::Punct("==") => (BinaryOp::Eq, 0),
      Token::Punct("!=") => (BinaryOp::Ne, 0),
      Token::Punct("<") => (BinaryOp::Lt, 1),
      Token::Punct(">") => (BinaryOp::Gt, 1),
      Token::Punct("<=") => (BinaryOp::Le, 1),
      Token::Punct(">=") => (BinaryOp::Ge, 1),
      Token::Ident(name) if name == "instanceof" => (BinaryOp::InstanceOf, 1),
      Token::Punct("+") => (BinaryOp::Add, 2),
      Token::Punct("-") => (BinaryOp::Sub, 2),
      Token::Punct("*") => (BinaryOp::Mul, 3),
      Token::Punct("/") => (BinaryOp::Div, 3),
      Token::Punct("%") => (BinaryOp::Rem, 3),
      _ => return None,
    };
    Some(op)
  }

  fn binary(&mut self, min_precedence: u8) -> Result<Expr, String> {
    let mut left = self.unary()?;
    while let Some((op, precedence)) = self.binary_op() {
      if precedence < min_precedence {
        break;
      }
      self.advance();
      let right = self.binary(precedence + 1)?;
      left = Expr::Binary(op, Box::new(left), Box::new(right));
    }
    Ok(left)
  }

  fn unary(&mut self) -> Result<Expr, String> {
    let op = match self.peek() {
      Token::Punct("!") => UnaryOp::Not,
      Token::Punct("-") => UnaryOp::Negate,
      Token::Punct("+") => UnaryOp::Plus,
      Token::Ident(name) if name == "typeof" => UnaryOp::Typeof,
      Token::Ident(name) if name == "void" => UnaryOp::Void,
      _ => return self.postfix(),
    };
    self.advance();
    Ok(Expr::Unary(op, Box::new(self.unary()?)))
  }

  fn postfix(&mut self) -> Result<Expr, String> {
    let mut expr = if self.is_keyword("new") {
      self.new_expression()?
    } else {
      self.primary()?
    };
    loop {
      if self.eat(".") {
        let name = self.identifier()?;
        expr = Expr::Member(Box::new(expr), name);
      } else if self.eat("[") {
        let index = self.expression()?;
        self.expect("]")?;
        expr = Expr::Index(Box::new(expr), Box::new(index));
      } else if self.eat("(") {
        let args = self.arguments()?;
        expr = Expr::Call(Box::new(expr), args);
      } else {
        return Ok(expr);
      }
    }
  }

  fn new_expression(&mut self) -> Result<Expr, String> {
    self.advance();
    let mut callee = if self.is_keyword("new") {
      self.new_expression()?
    } else {
      self.primary()?
    };
    loop {
      if self.eat(".") {
        let name = self.identifier()?;
        callee = Expr::Member(Box::new(callee), name);
      } else if self.eat("[") {
        let index = self.expression()?;
        self.expect("]")?;
        callee = Expr::Index(Box::new(callee), Box::new(index));
      } else {
        break;
      }
    }
    let args = if self.eat("(") {
      self.arguments()?
    } else {
      Vec::new()
    };
    Ok(Expr::New(Box::new(callee), args))
  }

  fn arguments(&mut self) -> Result<Vec<Expr>, String> {
    let mut args = Vec::new();
    while !self.eat(")") {
      args.push(self.assignment()?);
      if !self.eat(",") {
        self.expect(")")?;
        break;
      }
    }
    Ok(args)
  }

  fn primary(&mut self) -> Result<Expr, String> {
    let start = self.pos;
    match self.advance() {
      Token::Number(number) => Ok(Expr::Number(number)),
      Token::String(text) => Ok(Expr::String(text)),
      Token::Ident(name) => Ok(match name.as_str() {
        "true" => Expr::Bool(true),
        "false" => Expr::Bool(false),
        "null" => Expr::Null,
        "undefined" => Expr::Undefined,
        "this" => Expr::This,
        _ => Expr::Ident(name),
      }),
      Token::Punct("(") => {
        let expr = self.expression()?;
        self.expect(")")?;
        Ok(expr)
      }
      Token::Punct("[") => {
        let mut elements = Vec::new();
        while !self.eat("]") {
          elements.push(self.assignment()?);
          if !self.eat(",") {
            self.expect("]")?;
            break;
          }
        }
        Ok(Expr::Array(elements))
      }
      Token::Punct("{") => {
        let mut properties = Vec::new();
        while !self.eat("}") {
          let key = match self.peek().clone() {
            Token::Ident(name) | Token::String(name) => name,
            Token::Number(number) => super::number_to_string(number),
            _ => return Err(self.unexpected()),
          };
          self.advance();
          self.expect(":")?;
          properties.push((key, self.assignment()?));
          if !self.eat(",") {
            self.expect("}")?;
            break;
          }
        }
        Ok(Expr::Object(properties))
      }
      _ => {
        self.pos = start;
        Err(self.unexpected())
      }
    }
  }
}

struct Interpreter<'a> {
  engine: &'a LocalEngine,
}

impl Interpreter<'_> {
  fn run(&self, program: &[Stmt]) -> EngineResult<RawValue> {
    let mut completion = self.engine.undefined();
    for statement in program {
      match statement {
        Stmt::Empty => {}
        Stmt::Expr(expr) => completion = self.eval(expr)?,
        Stmt::Var(declarations) => {
          for (name, init) in declarations {
            let key = PropertyKey::named(name);
            let global = self.engine.global();
            match init {
              Some(init) => {
                let value = self.eval(init)?;
                self.engine.set(global, &key, value)?;
              }
              None if !self.engine.has(global, &key)? => {
                self.engine.set(global, &key, self.engine.undefined())?;
              }
              None => {}
            }
          }
        }
        Stmt::Throw(expr) => {
          let value = self.eval(expr)?;
          self.engine.throw(value);
          return Err(EngineError::pending_exception());
        }
      }
    }
    Ok(completion)
  }

  fn describe(expr: &Expr) -> String {
    match expr {
      Expr::Ident(name) => name.clone(),
      Expr::This => "this".into(),
      Expr::Member(object, name) => format!("{}.{name}", Self::describe(object)),
      Expr::Index(object, _) => format!("{}[...]", Self::describe(object)),
      Expr::Call(callee, _) => format!("{}(...)", Self::describe(callee)),
      _ => "expression".into(),
    }
  }

  fn lookup(&self, name: &str) -> EngineResult<Option<RawValue>> {
    let key = PropertyKey::named(name);
    let global = self.engine.global();
    if !self.engine.has(global, &key)? {
      return Ok(None);
    }
    self.engine.get(global, &key).map(Some)
  }

  fn eval_args(&self, args: &[Expr]) -> EngineResult<Vec<RawValue>> {
    args.iter().map(|arg| self.eval(arg)).collect()
  }

  fn number(&self, value: f64) -> EngineResult<RawValue> {
    self.engine.create_number(value)
  }

  fn eval(&self, expr: &Expr) -> EngineResult<RawValue> {
    let engine = self.engine;
    match expr {
      Expr::Number(number) => self.number(*number),
      Expr::String(text) => Ok(engine.alloc_str(text)),
      Expr::Bool(value) => Ok(engine.boolean(*value)),
      Expr::Null => Ok(engine.null()),
      Expr::Undefined => Ok(engine.undefined()),
      Expr::This => Ok(engine.global()),
      Expr::Ident(name) => match self.lookup(name)? {
        Some(value) => Ok(value),
        None => Err(engine.throw_error(
          ErrorClass::ReferenceError,
          &format!("{name} is not defined"),
        )),
      },
      Expr::Array(elements) => {
        let values = self.eval_args(elements)?;
        Ok(engine.array_from(values.into_iter().map(to_slot).collect()))
      }
      Expr::Object(properties) => {
        let object = engine.create_object()?;
        for (key, value) in properties {
          let value = self.eval(value)?;
          engine.set(object, &PropertyKey::named(key), value)?;
        }
        Ok(object)
      }
      Expr::Member(object, name) => {
        let object = self.eval(object)?;
        engine.get(object, &PropertyKey::named(name))
      }
      Expr::Index(object, index) => {
        let object = self.eval(object)?;
        let index = self.eval(index)?;
        let key = engine.to_property_key(index)?;
        engine.get(object, &key)
      }
      Expr::Call(callee, args) => {
        let (function, this) = match &**callee {
          Expr::Member(object, name) => {
            let object = self.eval(object)?;
            (engine.get(object, &PropertyKey::named(name))?, object)
          }
          Expr::Index(object, index) => {
            let object = self.eval(object)?;
            let index = self.eval(index)?;
            let key = engine.to_property_key(index)?;
            (engine.get(object, &key)?, object)
          }
          other => (self.eval(other)?, engine.undefined()),
        };
        let args = self.eval_args(args)?;
        if engine.type_of(function) != ValueKind::Function {
          return Err(engine.throw_error(
            ErrorClass::TypeError,
            &format!("{} is not a function", Self::describe(callee)),
          ));
        }
        engine.call(function, this, &args)
      }
      Expr::New(callee, args) => {
        let constructor = self.eval(callee)?;
        let args = self.eval_args(args)?;
        if engine.type_of(constructor) != ValueKind::Function {
          return Err(engine.throw_error(
            ErrorClass::TypeError,
            &format!("{} is not a constructor", Self::describe(callee)),
          ));
        }
        engine.construct_value(constructor, &args)
      }
      Expr::Unary(UnaryOp::Typeof, operand) => {
        let value = match &**operand {
          Expr::Ident(name) => self.lookup(name)?,
          other => Some(self.eval(other)?),
        };
        let kind = value
          .map(|value| engine.type_of(value))
          .unwrap_or(ValueKind::Undefined);
        Ok(engine.alloc_str(type_name(kind)))
      }
      Expr::Unary(op, operand) => {
        let value = self.eval(operand)?;
        match op {
          UnaryOp::Not => Ok(engine.boolean(!engine.to_boolean(value))),
          UnaryOp::Negate => self.number(-engine.to_number(value)?),
          UnaryOp::Plus => self.number(engine.to_number(value)?),
          UnaryOp::Void | UnaryOp::Typeof => Ok(engine.undefined()),
        }
      }
      Expr::Logical(op, left, right) => {
        let left = self.eval(left)?;
        let truthy = engine.to_boolean(left);
        match (op, truthy) {
          (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(left),
          _ => self.eval(right),
        }
      }
      Expr::Conditional(test, consequent, alternate) => {
        let test = self.eval(test)?;
        if engine.to_boolean(test) {
          self.eval(consequent)
        } else {
          self.eval(alternate)
        }
      }
      Expr::Binary(op, left, right) => {
        let left = self.eval(left)?;
        let right = self.eval(right)?;
        self.binary(*op, left, right)
      }
      Expr::Assign(target, value) => match &**target {
        Expr::Ident(name) => {
          let value = self.eval(value)?;
          engine.set(engine.global(), &PropertyKey::named(name), value)?;
          Ok(value)
        }
        Expr::Member(object, name) => {
          let object = self.eval(object)?;
          let value = self.eval(value)?;
          engine.set(object, &PropertyKey::named(name), value)?;
          Ok(value)
        }
        Expr::Index(object, index) => {
          let object = self.eval(object)?;
          let index = self.eval(index)?;
          let key = engine.to_property_key(index)?;
          let value = self.eval(value)?;
          engine.set(object, &key, value)?;
          Ok(value)
        }
        _ => Err(engine.throw_error(
          ErrorClass::SyntaxError,
          "Invalid left-hand side in assignment",
        )),
      },
    }
  }

  fn binary(
    &self,
    op: BinaryOp,
    left: RawValue,
    right: RawValue,
  ) -> EngineResult<RawValue> {
    let engine = self.engine;
    match op {
      BinaryOp::Add => {
        let stringy = |value: RawValue| {
          let kind = engine.type_of(value);
          kind == ValueKind::String || kind.is_object()
        };
        if stringy(left) || stringy(right) {
          let mut units = engine.to_string_units(left)?.to_vec();
          units.extend_from_slice(&engine.to_string_units(right)?);
          engine.create_string(&units)
        } else {
          self.number(engine.to_number(left)? + engine.to_number(right)?)
        }
      }
      BinaryOp::Sub => {
        self.number(engine.to_number(left)? - engine.to_number(right)?)
      }
      BinaryOp::Mul => {
        self.number(engine.to_number(left)? * engine.to_number(right)?)
      }
      BinaryOp::Div => {
        self.number(engine.to_number(left)? / engine.to_number(right)?)
      }
      BinaryOp::Rem => {
        self.number(engine.to_number(left)? % engine.to_number(right)?)
      }
      BinaryOp::StrictEq => Ok(engine.boolean(engine.strict_equals(left, right))),
      BinaryOp::StrictNe => {
        Ok(engine.boolean(!engine.strict_equals(left, right)))
      }
      BinaryOp::Eq => Ok(engine.boolean(self.loose_equals(left, right)?)),
      BinaryOp::Ne => Ok(engine.boolean(!self.loose_equals(left, right)?)),
      BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => {
        let ordering = if engine.type_of(left) == ValueKind::String
          && engine.type_of(right) == ValueKind::String
        {
          Some(engine.to_string_units(left)?.cmp(&engine.to_string_units(right)?))
        } else {
          engine
            .to_number(left)?
            .partial_cmp(&engine.to_number(right)?)
        };
        let result = ordering.is_some_and(|ordering| match op {
          BinaryOp::Lt => ordering.is_lt(),
          BinaryOp::Gt => ordering.is_gt(),
          BinaryOp::Le => ordering.is_le(),
          _ => ordering.is_ge(),
        });
        Ok(engine.boolean(result))
      }
      BinaryOp::InstanceOf => {
        Ok(engine.boolean(engine.instance_of(left, right)?))
      }
    }
  }

  fn loose_equals(&self, left: RawValue, right: RawValue) -> EngineResult<bool> {
    let engine = self.engine;
    let (a, b) = (engine.type_of(left), engine.type_of(right));
    if a == b {
      return Ok(engine.strict_equals(left, right));
    }
    Ok(match (a, b) {
      (ValueKind::Null, ValueKind::Undefined)
      | (ValueKind::Undefined, ValueKind::Null) => true,
      (ValueKind::Number | ValueKind::String | ValueKind::Boolean, _)
        if matches!(
          b,
          ValueKind::Number | ValueKind::String | ValueKind::Boolean
        ) =>
      {
        engine.to_number(left)? == engine.to_number(right)?
      }
      _ => false,
    })
  }
}

fn type_name(kind: ValueKind) -> &'static str {
  match kind {
    ValueKind::Undefined => "undefined",
    ValueKind::Null => "object",
    ValueKind::Boolean => "boolean",
    ValueKind::Number => "number",
    ValueKind::String => "string",
    ValueKind::Symbol => "symbol",
    ValueKind::Object | ValueKind::External => "object",
    ValueKind::Function => "function",
  }
}

pub(super) fn evaluate(
  engine: &LocalEngine,
  source: &str,
) -> EngineResult<RawValue> {
  let program = tokenize(source).and_then(|tokens| {
    Parser { tokens, pos: 0 }.program()
  });
  match program {
    Ok(program) => Interpreter { engine }.run(&program),
    Err(message) => Err(engine.throw_error(ErrorClass::SyntaxError, &message)),
  }
}

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use super::*;

  fn run(engine: &LocalEngine, source: &str) -> EngineResult<RawValue> {
    evaluate(engine, source)
  }

  fn number(engine: &LocalEngine, source: &str) -> f64 {
    let value = run(engine, source).unwrap();
    engine.number_value(value).unwrap()
  }

  fn string(engine: &LocalEngine, source: &str) -> String {
    let value = run(engine, source).unwrap();
    String::from_utf16_lossy(&engine.string_value(value).unwrap())
  }

  fn thrown_message(engine: &LocalEngine, source: &str) -> String {
    assert_eq!(run(engine, source), Err(EngineError::pending_exception()));
    let error = engine.take_exception().unwrap();
    let rendered = engine.to_string_units(error).unwrap();
    String::from_utf16_lossy(&rendered)
  }

  #[test]
  fn arithmetic_and_precedence() {
    let engine = LocalEngine::new();
    assert_eq!(number(&engine, "1+2"), 3.0);
    assert_eq!(number(&engine, "2 + 3 * 4 - 1"), 13.0);
    assert_eq!(number(&engine, "(2 + 3) * 4 % 7"), 6.0);
    assert_eq!(number(&engine, "-0x10 / 4"), -4.0);
    assert_eq!(number(&engine, "1.5e2"), 150.0);
  }

  #[test]
  fn strings_and_coercion() {
    let engine = LocalEngine::new();
    assert_eq!(string(&engine, "'a' + 1 + 2"), "a12");
    assert_eq!(string(&engine, "\"\\u0041\\n\".length + ''"), "2");
    assert_eq!(string(&engine, "typeof missing"), "undefined");
    assert_eq!(string(&engine, "typeof Object"), "function");
    assert_eq!(string(&engine, "[1, null, 'x'] + ''"), "1,,x");
  }

  #[test]
  fn globals_and_declarations() {
    let engine = LocalEngine::new();
    run(&engine, "var a = 2; let b = { c: [5, 6] }").unwrap();
    assert_eq!(number(&engine, "a * b.c[1]"), 12.0);
    run(&engine, "b.c[2] = 7").unwrap();
    assert_eq!(number(&engine, "b.c.length"), 3.0);
    assert_eq!(string(&engine, "a === 2 && b.c[0] == '5' ? 'yes' : 'no'"), "yes");
  }

  #[test]
  fn errors_are_thrown() {
    let engine = LocalEngine::new();
    assert_eq!(thrown_message(&engine, "throw new Error('x')"), "Error: x");
    assert_eq!(
      thrown_message(&engine, "nope + 1"),
      "ReferenceError: nope is not defined"
    );
    assert_eq!(
      thrown_message(&engine, "Object.keys()"),
      "TypeError: Object.keys is not a function"
    );
    assert_eq!(
      thrown_message(&engine, "1 +"),
      "SyntaxError: Unexpected end of input"
    );
  }

  #[test]
  fn promises_from_script() {
    let engine = LocalEngine::new();
    let value = run(
      &engine,
      "var p = new Promise(Object); p instanceof Promise",
    )
    .unwrap();
    assert!(engine.bool_value(value).unwrap());
  }
}
