//! Naming mask expressions
//!
//! A mask is literal text interleaved with `${...}` placeholders. Each
//! placeholder names a variable followed by an optional `|`-separated
//! pipeline of filters, each taking `:`-separated arguments:
//!
//! ```
//! use grabbag::mask::NamingMask;
//! use grabbag::media::MediaItem;
//!
//! let mask = NamingMask::new("${itemUrl[hostname]}/${file|upper}.${ext}");
//! let item = MediaItem::from_url("https://example.com/pics/cat.jpg").unwrap();
//! assert_eq!(mask.evaluate(&item), "example.com/CAT.jpg");
//! ```
//!
//! Compiling never fails. Unknown variables and filters evaluate to the
//! `BADVAR`/`BADFILTER` sentinels and the first such problem is kept in
//! [`NamingMask::error`].

pub mod date;
pub mod error;
pub mod filters;
pub mod tokenize;
pub mod value;
pub mod variables;

use regex::Regex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

pub use error::MaskError;
use error::{BAD_FILTER, BAD_VARIABLE};
use filters::{FilterFn, compile_filter};
use tokenize::tokenize;
pub use value::Value;
use variables::resolve_variable;

use crate::file::naming::sanitize_path;
use crate::media::MediaItem;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("Invalid regex pattern"));

type Evaluator = Box<dyn Fn(&MediaItem) -> String + Send + Sync>;

enum Token {
    Literal(String),
    Placeholder(Evaluator),
}

/// A compiled naming mask with its own `inum` counter
pub struct NamingMask {
    expression: String,
    tokens: Vec<Token>,
    inum: Arc<AtomicU64>,
    error: Option<MaskError>,
}

impl std::fmt::Debug for NamingMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamingMask")
            .field("expression", &self.expression)
            .field("tokens", &self.tokens.len())
            .field("inum", &self.inum.load(Ordering::Relaxed))
            .field("error", &self.error)
            .finish()
    }
}

impl NamingMask {
    pub fn new(expression: &str) -> Self {
        let mut mask = Self {
            expression: String::new(),
            tokens: Vec::new(),
            inum: Arc::new(AtomicU64::new(1)),
            error: None,
        };
        mask.compile(expression);
        mask
    }

    /// Replace the compiled expression. Clears the recorded error and resets `inum`.
    pub fn compile(&mut self, expression: &str) {
        self.expression = expression.to_string();
        self.tokens.clear();
        self.error = None;
        self.reset();

        let mut index = 0;
        for caps in PLACEHOLDER.captures_iter(expression) {
            let Some(whole) = caps.get(0) else { continue };

            if whole.start() > index {
                self.tokens
                    .push(Token::Literal(expression[index..whole.start()].to_string()));
            }
            let placeholder = self.compile_placeholder(&caps[1]);
            self.tokens.push(Token::Placeholder(placeholder));
            index = whole.end();
        }

        if index < expression.len() {
            self.tokens.push(Token::Literal(expression[index..].to_string()));
        }

        if let Some(error) = &self.error {
            tracing::debug!("Naming mask '{}' compiled with error: {}", expression, error);
        }
    }

    fn compile_placeholder(&mut self, body: &str) -> Evaluator {
        let mut stages = tokenize(body, '|').into_iter();
        let variable_name = stages.next().unwrap_or_default();

        let variable = match resolve_variable(&variable_name, &self.inum) {
            Ok(variable) => variable,
            Err(error) => {
                self.record_error(error);
                return Box::new(|_: &MediaItem| BAD_VARIABLE.to_string());
            }
        };

        let mut pipeline: Vec<FilterFn> = Vec::new();
        for stage in stages {
            let filter: FilterFn = match compile_filter(&stage, &self.inum) {
                Ok(filter) => filter,
                Err(error) => {
                    self.record_error(error);
                    Box::new(|_: Value, _: &MediaItem| Value::text(BAD_FILTER))
                }
            };
            pipeline.push(filter);
        }

        Box::new(move |item: &MediaItem| {
            let initial = variable(item).normalize();
            pipeline
                .iter()
                .fold(initial, |value, filter| filter(value, item).normalize())
                .into_text()
        })
    }

    fn record_error(&mut self, error: MaskError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Restart the auto-increment counter at 1
    pub fn reset(&self) {
        self.inum.store(1, Ordering::Relaxed);
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First compile problem, if any
    pub fn error(&self) -> Option<&MaskError> {
        self.error.as_ref()
    }

    /// Evaluate and sanitize the result as a relative path
    pub fn evaluate(&self, item: &MediaItem) -> String {
        sanitize_path(&self.evaluate_raw(item))
    }

    /// Evaluate without sanitizing
    pub fn evaluate_raw(&self, item: &MediaItem) -> String {
        self.tokens
            .iter()
            .map(|token| match token {
                Token::Literal(text) => text.clone(),
                Token::Placeholder(evaluate) => evaluate(item),
            })
            .collect()
    }

    /// Evaluate every item in order and store the result as its `mask_name`
    pub fn apply(&self, items: &mut [MediaItem]) {
        for item in items.iter_mut() {
            item.mask_name = Some(self.evaluate(item));
        }
    }
}
