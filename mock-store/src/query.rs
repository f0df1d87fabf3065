//! Query-string filters in the PostgREST dialect.
//!
//! Supported: `select=*`, `order=id.asc|id.desc`, and `<column>=<op>.<value>`
//! with `eq`/`neq` on `id`, `done` and `title`, and `like`/`ilike` on `title`.

use std::cmp::Ordering;

use crate::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

impl Order {
    pub fn compare(self, a: &Row, b: &Row) -> Ordering {
        match self {
            Order::Asc => a.id.cmp(&b.id),
            Order::Desc => b.id.cmp(&a.id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    IdEq(i64),
    IdNeq(i64),
    DoneEq(bool),
    TitleEq(String),
    TitleNeq(String),
    TitleLike { pattern: String, ignore_case: bool },
}

impl Filter {
    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Filter::IdEq(id) => row.id == *id,
            Filter::IdNeq(id) => row.id != *id,
            Filter::DoneEq(done) => row.done == *done,
            Filter::TitleEq(title) => row.title == *title,
            Filter::TitleNeq(title) => row.title != *title,
            Filter::TitleLike {
                pattern,
                ignore_case,
            } => like(pattern, &row.title, *ignore_case),
        }
    }
}

/// Parsed query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub filters: Vec<Filter>,
    pub order: Order,
}

impl Selection {
    pub fn parse(params: &[(String, String)]) -> Result<Self, String> {
        let mut selection = Selection::default();
        for (key, value) in params {
            match key.as_str() {
                "select" => {}
                "order" => selection.order = parse_order(value)?,
                column => selection.filters.push(parse_filter(column, value)?),
            }
        }
        Ok(selection)
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }
}

fn parse_order(value: &str) -> Result<Order, String> {
    match value {
        "id" | "id.asc" => Ok(Order::Asc),
        "id.desc" => Ok(Order::Desc),
        other => Err(format!("unsupported order `{other}`")),
    }
}

fn parse_filter(column: &str, value: &str) -> Result<Filter, String> {
    let (op, arg) = value
        .split_once('.')
        .ok_or_else(|| format!("filter on `{column}` has no operator"))?;

    match (column, op) {
        ("id", "eq") => parse_id(arg).map(Filter::IdEq),
        ("id", "neq") => parse_id(arg).map(Filter::IdNeq),
        ("done", "eq") => arg
            .parse()
            .map(Filter::DoneEq)
            .map_err(|_| format!("`{arg}` is not a boolean")),
        ("title", "eq") => Ok(Filter::TitleEq(arg.to_string())),
        ("title", "neq") => Ok(Filter::TitleNeq(arg.to_string())),
        ("title", "like") => Ok(Filter::TitleLike {
            pattern: arg.to_string(),
            ignore_case: false,
        }),
        ("title", "ilike") => Ok(Filter::TitleLike {
            pattern: arg.to_string(),
            ignore_case: true,
        }),
        ("id" | "done" | "title", op) => Err(format!("operator `{op}` not supported on `{column}`")),
        _ => Err(format!("column `{column}` does not exist")),
    }
}

fn parse_id(arg: &str) -> Result<i64, String> {
    arg.parse().map_err(|_| format!("`{arg}` is not an integer"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    /// `%` or `*`
    Any,
    /// `_`
    One,
    Lit(char),
}

fn tokenize(pattern: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '\\' => Token::Lit(chars.next().unwrap_or('\\')),
            '%' | '*' => Token::Any,
            '_' => Token::One,
            c => Token::Lit(c),
        });
    }
    tokens
}

/// SQL `LIKE` matching; `\` escapes the next character.
pub fn like(pattern: &str, text: &str, ignore_case: bool) -> bool {
    let tokens = tokenize(pattern);
    let text: Vec<char> = text.chars().collect();
    let same = |a: char, b: char| a == b || (ignore_case && a.to_lowercase().eq(b.to_lowercase()));

    let (mut p, mut t) = (0, 0);
    // Resume point after the most recent `Any`: (token index, text index).
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match tokens.get(p) {
            Some(Token::Any) => {
                p += 1;
                backtrack = Some((p, t));
            }
            Some(Token::One) => {
                p += 1;
                t += 1;
            }
            Some(Token::Lit(c)) if same(*c, text[t]) => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((bp, bt)) => {
                    p = bp;
                    t = bt + 1;
                    backtrack = Some((bp, bt + 1));
                }
                None => return false,
            },
        }
    }
    tokens[p..].iter().all(|token| *token == Token::Any)
}
