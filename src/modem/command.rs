//! Typed AT command construction.
//!
//! A command is a name plus ordered parameters; rendering produces the
//! exact on-wire text, so call sites never splice strings by hand.

use std::fmt::Write as _;

#[derive(Debug, Clone)]
pub struct AtCommand {
    name: &'static str,
    params: Vec<Param>,
}

#[derive(Debug, Clone)]
enum Param {
    Int(i64),
    /// Rendered inside double quotes.
    Quoted(String),
}

impl AtCommand {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            params: Vec::new(),
        }
    }

    pub fn int(mut self, value: impl Into<i64>) -> Self {
        self.params.push(Param::Int(value.into()));
        self
    }

    pub fn quoted(mut self, value: impl Into<String>) -> Self {
        self.params.push(Param::Quoted(value.into()));
        self
    }

    pub fn render(&self) -> String {
        let mut out = String::from(self.name);
        for (i, param) in self.params.iter().enumerate() {
            out.push(if i == 0 { '=' } else { ',' });
            match param {
                Param::Int(v) => {
                    let _ = write!(out, "{}", v);
                }
                Param::Quoted(s) => {
                    let _ = write!(out, "\"{}\"", s);
                }
            }
        }
        out
    }
}
