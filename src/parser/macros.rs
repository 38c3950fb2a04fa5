//! `#define` macro table and expander
//!
//! Object-like and function-like macros are supported; stringizing (`#`) and
//! token pasting (`##`) are not. Expansion is eager: arguments are expanded
//! before substitution and the result is rescanned, with the names of macros
//! currently being expanded kept in an active list so self-references stay
//! literal. Every token produced by an expansion is stamped with the location
//! of the invocation so later errors point at user code.

use super::ast::SourceLocation;
use super::lexer::{LexError, Token, TokenKind};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Macro {
    /// `None` for object-like macros
    pub params: Option<Vec<String>>,
    pub body: Vec<Token>,
}

#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    macros: FxHashMap<String, Macro>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, name: String, params: Option<Vec<String>>, body: Vec<Token>) {
        log::trace!("#define {} ({} tokens)", name, body.len());
        self.macros.insert(name, Macro { params, body });
    }

    pub fn undefine(&mut self, name: &str) {
        self.macros.remove(name);
    }

    pub fn get(&self, name: &str) -> Option<&Macro> {
        self.macros.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn is_function_like(&self, name: &str) -> bool {
        self.macros
            .get(name)
            .is_some_and(|m| m.params.is_some())
    }

    /// Expand every macro invocation in `tokens`, stamping results with `at`.
    pub fn expand(&self, tokens: Vec<Token>, at: SourceLocation) -> Result<Vec<Token>, LexError> {
        let mut active = Vec::new();
        self.expand_with(tokens, at, &mut active)
    }

    fn expand_with(
        &self,
        tokens: Vec<Token>,
        at: SourceLocation,
        active: &mut Vec<String>,
    ) -> Result<Vec<Token>, LexError> {
        let mut output = Vec::with_capacity(tokens.len());
        let mut i = 0;

        while i < tokens.len() {
            let token = &tokens[i];
            let name = match &token.kind {
                TokenKind::Ident(name) if !active.contains(name) => name,
                _ => {
                    output.push(token.clone().relocated(at));
                    i += 1;
                    continue;
                }
            };
            let Some(mac) = self.macros.get(name) else {
                output.push(token.clone().relocated(at));
                i += 1;
                continue;
            };

            match &mac.params {
                None => {
                    active.push(name.clone());
                    let expanded = self.expand_with(mac.body.clone(), at, active)?;
                    active.pop();
                    output.extend(expanded);
                    i += 1;
                }
                Some(params) => {
                    // A function-like macro name not followed by '(' is an ordinary identifier
                    if tokens.get(i + 1).map(|t| &t.kind) != Some(&TokenKind::LParen) {
                        output.push(token.clone().relocated(at));
                        i += 1;
                        continue;
                    }
                    let (args, next) = collect_arguments(&tokens, i + 1, name, at)?;
                    let args = normalize_arguments(args, params.len());
                    if args.len() != params.len() {
                        return Err(LexError::MacroArity {
                            name: name.clone(),
                            expected: params.len(),
                            found: args.len(),
                            location: at,
                        });
                    }

                    let mut expanded_args = Vec::with_capacity(args.len());
                    for arg in args {
                        expanded_args.push(self.expand_with(arg, at, active)?);
                    }

                    let mut substituted = Vec::new();
                    for body_token in &mac.body {
                        let param_index = match &body_token.kind {
                            TokenKind::Ident(id) => params.iter().position(|p| p == id),
                            _ => None,
                        };
                        match param_index {
                            Some(idx) => substituted.extend(expanded_args[idx].iter().cloned()),
                            None => substituted.push(body_token.clone()),
                        }
                    }

                    active.push(name.clone());
                    let rescanned = self.expand_with(substituted, at, active)?;
                    active.pop();
                    output.extend(rescanned);
                    i = next;
                }
            }
        }

        Ok(output)
    }
}

/// Split the parenthesised argument list starting at `open` into top-level
/// comma-separated token runs. Returns the runs and the index after `)`.
fn collect_arguments(
    tokens: &[Token],
    open: usize,
    name: &str,
    at: SourceLocation,
) -> Result<(Vec<Vec<Token>>, usize), LexError> {
    let mut args = vec![Vec::new()];
    let mut depth = 0usize;
    let mut i = open + 1;

    while let Some(token) = tokens.get(i) {
        match token.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen if depth == 0 => return Ok((args, i + 1)),
            TokenKind::RParen => depth -= 1,
            TokenKind::Comma if depth == 0 => {
                args.push(Vec::new());
                i += 1;
                continue;
            }
            TokenKind::Eof => break,
            _ => {}
        }
        if let Some(current) = args.last_mut() {
            current.push(token.clone());
        }
        i += 1;
    }

    log::debug!("unterminated invocation of macro '{}'", name);
    Err(LexError::Unterminated {
        what: "macro invocation",
        location: at,
    })
}

/// `F()` passes zero arguments to a zero-parameter macro, not one empty one.
fn normalize_arguments(args: Vec<Vec<Token>>, param_count: usize) -> Vec<Vec<Token>> {
    if param_count == 0 && args.len() == 1 && args[0].is_empty() {
        Vec::new()
    } else {
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::lexer::Lexer;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_object_like_macro() {
        let tokens = kinds("#define MAXLINE 1000\nint a[MAXLINE];");
        assert!(tokens.iter().any(|k| matches!(
            k,
            TokenKind::IntLiteral { value: 1000, .. }
        )));
        assert!(!tokens
            .iter()
            .any(|k| matches!(k, TokenKind::Ident(name) if name == "MAXLINE")));
    }

    #[test]
    fn test_function_like_macro() {
        let tokens = kinds("#define MAX(a, b) ((a) > (b) ? (a) : (b))\nx = MAX(1, y);");
        let idents = tokens
            .iter()
            .filter(|k| matches!(k, TokenKind::Ident(name) if name == "y"))
            .count();
        assert_eq!(idents, 2);
        assert!(tokens.contains(&TokenKind::Question));
    }

    #[test]
    fn test_nested_macros_expand() {
        let tokens = kinds("#define A B\n#define B 7\nA");
        assert!(matches!(tokens[0], TokenKind::IntLiteral { value: 7, .. }));
    }

    #[test]
    fn test_self_reference_stays_literal() {
        let tokens = kinds("#define foo foo + 1\nfoo");
        assert!(matches!(&tokens[0], TokenKind::Ident(name) if name == "foo"));
        assert_eq!(tokens[1], TokenKind::Plus);
    }

    #[test]
    fn test_function_macro_without_parens_is_identifier() {
        let tokens = kinds("#define f(x) x\nint f;");
        assert!(matches!(&tokens[1], TokenKind::Ident(name) if name == "f"));
    }

    #[test]
    fn test_undef() {
        let tokens = kinds("#define N 3\n#undef N\nN");
        assert!(matches!(&tokens[0], TokenKind::Ident(name) if name == "N"));
    }

    #[test]
    fn test_arity_mismatch() {
        let err = Lexer::new("#define SQ(x) ((x)*(x))\nSQ(1, 2)")
            .tokenize()
            .unwrap_err();
        assert!(matches!(err, LexError::MacroArity { expected: 1, found: 2, .. }));
    }

    #[test]
    fn test_expanded_tokens_take_invocation_location() {
        let tokens = Lexer::new("#define N 3\n\n  N").tokenize().unwrap();
        assert_eq!(tokens[0].location, SourceLocation::new(3, 3));
    }
}
