use std::fmt;

/// Intermediate value flowing through a placeholder pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Empty,
    Text(String),
    Number(f64),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Optional text, absent becomes `Empty`
    pub fn from_option(s: Option<&str>) -> Self {
        s.map(Value::text).unwrap_or(Value::Empty)
    }

    /// Logically empty: neither a number nor a non-empty string.
    ///
    /// Numbers are never empty, so a zero counter still renders as `0`.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Empty => true,
            Value::Text(s) => s.is_empty(),
            Value::Number(_) => false,
        }
    }

    /// Coerce logically empty values to `Empty` at a stage boundary
    pub fn normalize(self) -> Self {
        if self.is_empty() { Value::Empty } else { self }
    }

    pub fn into_text(self) -> String {
        match self {
            Value::Empty => String::new(),
            Value::Text(s) => s,
            Value::Number(n) => format_number(n),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Text(s) => f.write_str(s),
            Value::Number(n) => f.write_str(&format_number(*n)),
        }
    }
}

/// Integral values print without a fractional part
fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
