use thiserror::Error;

/// Output of a placeholder whose variable is unknown
pub const BAD_VARIABLE: &str = "BADVAR";
/// Output of a pipeline stage whose filter is unknown
pub const BAD_FILTER: &str = "BADFILTER";
/// Output of a filter given a malformed regex argument
pub const BAD_REGEX: &str = "BADREGEX";
/// Output of a URL variable with a missing or unknown parameter
pub const BAD_PARAM: &str = "BADPARAM";
/// Output of `defVar` naming an unknown variable
pub const BAD_ARGUMENT: &str = "BADARG";

/// Compile-time problems recorded on a naming mask. Never fatal to evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MaskError {
    #[error("Unknown naming mask variable '{0}'")]
    BadVariable(String),

    #[error("Unknown naming mask filter '{0}'")]
    BadFilter(String),
}
