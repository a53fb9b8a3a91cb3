//! Access-scope rewriting of read queries.
//!
//! Only the first node pattern of the first MATCH clause is restricted. The
//! restriction requires that node to carry the tenant's partition label or the
//! shared label and is ANDed with whatever filter the clause already has.

pub mod tokenizer;

use tracing::debug;

use crate::config::PartitionScheme;
use crate::data::TenantId;
use tokenizer::{tokenize, Token, TokenKind};

/// Variable inserted into an anonymous anchor pattern.
pub const ANCHOR_VARIABLE: &str = "scope_anchor";

/// Keywords that end the pattern list or the WHERE expression of a clause.
const CLAUSE_KEYWORDS: &[&str] = &[
    "WHERE", "RETURN", "WITH", "MATCH", "OPTIONAL", "UNWIND", "CALL", "UNION", "ORDER", "SKIP",
    "LIMIT", "CREATE", "MERGE", "SET", "DELETE", "DETACH", "REMOVE", "FOREACH", "LOAD", "FINISH",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The query has no MATCH clause at all.
    NoMatchClause,
    /// The first MATCH is not followed by a node pattern.
    NoNodePattern,
    /// The anchor pattern never closes.
    UnbalancedPattern,
    /// The clause has a `WHERE` keyword with no predicate after it.
    EmptyFilter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteOutcome {
    Scoped,
    AlreadyScoped,
    Skipped(SkipReason),
}

/// Result of scoping one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedQuery {
    pub text: String,
    pub outcome: RewriteOutcome,
    /// Variable the restriction applies to, when one was found or inserted.
    pub variable: Option<String>,
}

impl ScopedQuery {
    fn skipped(query: &str, reason: SkipReason) -> Self {
        Self {
            text: query.to_string(),
            outcome: RewriteOutcome::Skipped(reason),
            variable: None,
        }
    }

    pub fn is_scoped(&self) -> bool {
        matches!(self.outcome, RewriteOutcome::Scoped | RewriteOutcome::AlreadyScoped)
    }
}

/// Renders a label so it can be spliced into query text.
pub fn quote_label(label: &str) -> String {
    let mut chars = label.chars();
    let plain = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        label.to_string()
    } else {
        format!("`{}`", label.replace('`', "``"))
    }
}

#[derive(Debug, Clone)]
pub struct ScopeRewriter {
    scheme: PartitionScheme,
}

/// Significant (non-trivia) tokens with access to the source text.
struct Cursor<'a> {
    source: &'a str,
    tokens: Vec<Token>,
}

impl<'a> Cursor<'a> {
    fn new(source: &'a str) -> Self {
        let tokens = tokenize(source).into_iter().filter(|t| !t.is_trivia()).collect();
        Self { source, tokens }
    }

    fn get(&self, index: usize) -> Option<&Token> {
        self.tokens.get(index)
    }

    fn is_punct(&self, index: usize, c: char) -> bool {
        self.get(index).map_or(false, |t| t.is_punct(c))
    }

    fn is_name(&self, index: usize) -> bool {
        self.get(index)
            .map_or(false, |t| matches!(t.kind, TokenKind::Word | TokenKind::QuotedName))
    }

    fn text(&self, index: usize) -> &'a str {
        self.tokens[index].text(self.source)
    }

    fn is_word(&self, index: usize, word: &str) -> bool {
        self.get(index).map_or(false, |t| t.is_word(self.source, word))
    }

    /// A keyword used as a property key or label (`n.limit`, `:Match`) is not a keyword,
    /// and neither is the `WITH` of `STARTS WITH` / `ENDS WITH`.
    fn is_keyword(&self, index: usize, keywords: &[&str]) -> bool {
        let Some(token) = self.get(index) else {
            return false;
        };
        if token.kind != TokenKind::Word {
            return false;
        }
        if index > 0 {
            if self.is_punct(index - 1, '.') || self.is_punct(index - 1, ':') {
                return false;
            }
            if token.is_word(self.source, "WITH")
                && (self.is_word(index - 1, "STARTS") || self.is_word(index - 1, "ENDS"))
            {
                return false;
            }
        }
        keywords.iter().any(|k| token.is_word(self.source, k))
    }

    /// Whether the filter spanning `first..end` is `restriction` on its own, or
    /// ends with `AND restriction` where the AND joins the whole filter.
    ///
    /// Tokens are compared, so a restriction spelled inside a literal or under
    /// a top-level OR does not count.
    fn carries_restriction(&self, first: usize, end: usize, restriction: &str) -> bool {
        let wanted: Vec<&str> = Cursor::new(restriction)
            .tokens
            .iter()
            .map(|t| t.text(restriction))
            .collect();
        let filter: Vec<&str> = (first..end).map(|i| self.text(i)).collect();
        if filter == wanted {
            return true;
        }
        if filter.len() < wanted.len() + 2 || !filter.ends_with(&wanted) {
            return false;
        }

        let and_index = end - wanted.len() - 1;
        if !self.is_keyword(and_index, &["AND"]) {
            return false;
        }
        // AND binds tighter than OR and XOR, so neither may appear unbracketed before it.
        let mut depth = 0usize;
        for index in first..and_index {
            match self.tokens[index].kind {
                TokenKind::Punct('(' | '[' | '{') => depth += 1,
                TokenKind::Punct(')' | ']' | '}') => match depth.checked_sub(1) {
                    Some(d) => depth = d,
                    None => return false,
                },
                TokenKind::Word if depth == 0 && self.is_keyword(index, &["OR", "XOR"]) => {
                    return false;
                }
                _ => {}
            }
        }
        depth == 0
    }

    /// Index of the bracket closing the one at `open`, if any.
    fn matching_close(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        for (index, token) in self.tokens.iter().enumerate().skip(open) {
            match token.kind {
                TokenKind::Punct('(' | '[' | '{') => depth += 1,
                TokenKind::Punct(')' | ']' | '}') => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Some(index);
                    }
                }
                _ => {}
            }
        }
        None
    }

    /// First index at or after `from` holding a clause keyword, `;` or an
    /// unmatched closing bracket, scanning only at bracket depth zero.
    fn clause_boundary(&self, from: usize) -> usize {
        let mut depth = 0usize;
        for index in from..self.tokens.len() {
            match self.tokens[index].kind {
                TokenKind::Punct('(' | '[' | '{') => depth += 1,
                TokenKind::Punct(')' | ']' | '}') => {
                    if depth == 0 {
                        return index;
                    }
                    depth -= 1;
                }
                TokenKind::Punct(';') if depth == 0 => return index,
                TokenKind::Word if depth == 0 && self.is_keyword(index, CLAUSE_KEYWORDS) => {
                    return index;
                }
                _ => {}
            }
        }
        self.tokens.len()
    }
}

impl ScopeRewriter {
    pub fn new(scheme: PartitionScheme) -> Self {
        Self { scheme }
    }

    pub fn scheme(&self) -> &PartitionScheme {
        &self.scheme
    }

    /// Restriction predicate for `variable` and `tenant_id`.
    pub fn restriction(&self, variable: &str, tenant_id: &TenantId) -> String {
        format!(
            "({v}:{partition} OR {v}:{shared})",
            v = variable,
            partition = quote_label(&self.scheme.partition_label(tenant_id)),
            shared = quote_label(self.scheme.shared_label()),
        )
    }

    pub fn rewrite(&self, query: &str, tenant_id: &TenantId) -> ScopedQuery {
        let cursor = Cursor::new(query);

        let Some(match_index) = (0..cursor.tokens.len())
            .find(|&i| cursor.is_keyword(i, &["MATCH"]))
        else {
            return ScopedQuery::skipped(query, SkipReason::NoMatchClause);
        };

        // Skip a named path (`p = ...`) and a path function (`shortestPath(...)`).
        let mut open = match_index + 1;
        if cursor.is_name(open) && cursor.is_punct(open + 1, '=') {
            open += 2;
        }
        let mut wrapper = None;
        if cursor.is_name(open) && cursor.is_punct(open + 1, '(') && cursor.is_punct(open + 2, '(') {
            wrapper = Some(open + 1);
            open += 2;
        }
        if !cursor.is_punct(open, '(') {
            return ScopedQuery::skipped(query, SkipReason::NoNodePattern);
        }
        let Some(close) = cursor.matching_close(open) else {
            return ScopedQuery::skipped(query, SkipReason::UnbalancedPattern);
        };
        // The clause continues after the path function's closing parenthesis.
        let pattern_end = match wrapper {
            Some(wrapper_open) => match cursor.matching_close(wrapper_open) {
                Some(wrapper_close) => wrapper_close,
                None => return ScopedQuery::skipped(query, SkipReason::UnbalancedPattern),
            },
            None => close,
        };

        let mut edits: Vec<(usize, usize, String)> = Vec::new();

        let variable = if cursor.is_name(open + 1) {
            cursor.text(open + 1).to_string()
        } else {
            let name = self.fresh_variable(&cursor);
            let at = cursor.tokens[open].end;
            edits.push((at, at, name.clone()));
            name
        };
        let restriction = self.restriction(&variable, tenant_id);

        let boundary = cursor.clause_boundary(pattern_end + 1);
        if cursor.is_keyword(boundary, &["WHERE"]) {
            let expr_first = boundary + 1;
            let expr_end = cursor.clause_boundary(expr_first);
            if expr_end == expr_first {
                // Leave the syntax error for the store to report.
                return ScopedQuery::skipped(query, SkipReason::EmptyFilter);
            }
            let start = cursor.tokens[expr_first].start;
            let end = cursor.tokens[expr_end - 1].end;
            let existing = &query[start..end];
            if cursor.carries_restriction(expr_first, expr_end, &restriction) {
                debug!(variable = %variable, "Query already carries the tenant restriction");
                return ScopedQuery {
                    text: query.to_string(),
                    outcome: RewriteOutcome::AlreadyScoped,
                    variable: Some(variable),
                };
            }
            edits.push((start, end, format!("({}) AND {}", existing, restriction)));
        } else {
            let at = cursor.tokens[boundary - 1].end;
            edits.push((at, at, format!(" WHERE {}", restriction)));
        }

        let mut text = query.to_string();
        edits.sort_by(|a, b| b.0.cmp(&a.0));
        for (start, end, replacement) in edits {
            text.replace_range(start..end, &replacement);
        }

        debug!(variable = %variable, "Injected tenant restriction into first MATCH clause");
        ScopedQuery {
            text,
            outcome: RewriteOutcome::Scoped,
            variable: Some(variable),
        }
    }

    fn fresh_variable(&self, cursor: &Cursor<'_>) -> String {
        let taken = |name: &str| {
            cursor.tokens.iter().any(|t| {
                let text = t.text(cursor.source);
                match t.kind {
                    TokenKind::Word => text == name,
                    TokenKind::QuotedName => {
                        let inner = text.trim_start_matches('`').trim_end_matches('`');
                        inner.replace("``", "`") == name
                    }
                    _ => false,
                }
            })
        };
        if !taken(ANCHOR_VARIABLE) {
            return ANCHOR_VARIABLE.to_string();
        }
        (1..)
            .map(|n| format!("{}{}", ANCHOR_VARIABLE, n))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| ANCHOR_VARIABLE.to_string())
    }
}

impl Default for ScopeRewriter {
    fn default() -> Self {
        Self::new(PartitionScheme::default())
    }
}
