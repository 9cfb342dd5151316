// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::collections::BTreeMap;

use crate::Error;

/// Named values substituted into a [`CommandTemplate`]
pub type Params = BTreeMap<&'static str, String>;

/// A program and its argument tokens, where tokens may carry `{name}` placeholders
///
/// Substitution is per token, a substituted value never splits into more arguments.
#[derive(Clone, Debug)]
pub struct CommandTemplate {
    name: &'static str,
    program: String,
    tokens: Vec<&'static str>,
}

impl CommandTemplate {
    pub fn new(name: &'static str, program: impl Into<String>, tokens: &[&'static str]) -> Self {
        Self {
            name,
            program: program.into(),
            tokens: tokens.to_vec(),
        }
    }

    /// Splits a whitespace separated pipeline description into tokens
    pub fn from_line(name: &'static str, line: &'static str) -> Self {
        let mut tokens = line.split_whitespace();
        let program = tokens.next().unwrap_or_default();

        Self {
            name,
            program: program.to_string(),
            tokens: tokens.collect(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Returns the program and the argument vector with every placeholder replaced
    pub fn render(&self, params: &Params) -> Result<(String, Vec<String>), Error> {
        let args = self
            .tokens
            .iter()
            .map(|token| self.render_token(token, params))
            .collect::<Result<Vec<_>, _>>()?;

        Ok((self.program.clone(), args))
    }

    fn render_token(&self, token: &str, params: &Params) -> Result<String, Error> {
        let mut out = String::with_capacity(token.len());
        let mut rest = token;

        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let end = after.find('}').ok_or_else(|| {
                Error::precondition(self.name, format!("unterminated placeholder in `{}`", token))
            })?;

            let key = &after[..end];
            let value = params.get(key).ok_or_else(|| {
                Error::precondition(self.name, format!("no value for parameter `{}`", key))
            })?;

            out.push_str(value);
            rest = &after[end + 1..];
        }

        out.push_str(rest);
        Ok(out)
    }
}
